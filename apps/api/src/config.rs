use std::str::FromStr;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub port: u16,
    pub rust_log: String,
    /// Seconds between scheduled scrape sweeps. 0 disables the scheduler.
    pub scrape_interval_secs: u64,
    pub scrape_concurrency: usize,
    pub scrape_cycle_timeout_secs: u64,
    pub fetch_timeout_secs: u64,
    pub fetch_max_attempts: u32,
    pub fetch_backoff_ms: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            database_max_connections: env_or("DATABASE_MAX_CONNECTIONS", 10)?,
            port: env_or("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            scrape_interval_secs: env_or("SCRAPE_INTERVAL_SECS", 3600)?,
            scrape_concurrency: env_or("SCRAPE_CONCURRENCY", 4)?,
            scrape_cycle_timeout_secs: env_or("SCRAPE_CYCLE_TIMEOUT_SECS", 300)?,
            fetch_timeout_secs: env_or("FETCH_TIMEOUT_SECS", 30)?,
            fetch_max_attempts: env_or("FETCH_MAX_ATTEMPTS", 3)?,
            fetch_backoff_ms: env_or("FETCH_BACKOFF_MS", 500)?,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn env_or<T: FromStr>(key: &str, default: T) -> Result<T> {
    match std::env::var(key) {
        Ok(raw) => parse_value(key, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| anyhow::anyhow!("{key} has an invalid value: '{raw}'"))
}
