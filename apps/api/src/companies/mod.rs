//! Company lookups needed by scraping. Company CRUD lives elsewhere.

use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::company::Company;
use crate::scraping::rule::ScrapingRule;

const COMPANY_COLUMNS: &str =
    "id, name, careers_url, logo_url, is_active, last_scraped_at, created_at, updated_at";

#[async_trait]
pub trait CompanyDirectory: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Company>, sqlx::Error>;

    async fn list_active(&self) -> Result<Vec<Company>, sqlx::Error>;

    /// The company's active scraping rule, newest first, if it has one.
    async fn scraping_rule(&self, company_id: Uuid) -> Result<Option<ScrapingRule>, sqlx::Error>;

    async fn mark_last_scraped_at(&self, company_id: Uuid) -> Result<(), sqlx::Error>;
}

#[derive(Clone)]
pub struct PgCompanyDirectory {
    pool: PgPool,
}

impl PgCompanyDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CompanyDirectory for PgCompanyDirectory {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Company>, sqlx::Error> {
        let sql = format!("SELECT {COMPANY_COLUMNS} FROM companies WHERE id = $1");
        sqlx::query_as::<_, Company>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn list_active(&self) -> Result<Vec<Company>, sqlx::Error> {
        let sql = format!("SELECT {COMPANY_COLUMNS} FROM companies WHERE is_active ORDER BY name");
        sqlx::query_as::<_, Company>(&sql).fetch_all(&self.pool).await
    }

    async fn scraping_rule(&self, company_id: Uuid) -> Result<Option<ScrapingRule>, sqlx::Error> {
        let rule: Option<Json<ScrapingRule>> = sqlx::query_scalar(
            r#"
            SELECT selectors FROM scraping_rules
            WHERE company_id = $1 AND is_active
            ORDER BY updated_at DESC
            LIMIT 1
            "#,
        )
        .bind(company_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(rule.map(|Json(rule)| rule))
    }

    async fn mark_last_scraped_at(&self, company_id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE companies SET last_scraped_at = NOW(), updated_at = NOW() WHERE id = $1")
            .bind(company_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
