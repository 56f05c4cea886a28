pub mod extractor;
pub mod fetcher;
pub mod handlers;
pub mod reconciler;
pub mod rule;
pub mod scheduler;
