use serde::{Deserialize, Serialize};

/// Selector mapping for one company's careers page.
///
/// Stored as JSON in `scraping_rules.selectors`. Every selector other than
/// `job_container` is evaluated inside a matched container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapingRule {
    pub job_container: String,
    pub title: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub job_type: Option<String>,
    #[serde(default)]
    pub salary_range: Option<String>,
    pub link: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Attribute on the container element holding the posting's external id.
    #[serde(default = "default_external_id_attribute")]
    pub external_id_attribute: String,
}

fn default_external_id_attribute() -> String {
    "data-job-id".to_string()
}

impl Default for ScrapingRule {
    /// Rule used for companies that have no active rule of their own.
    fn default() -> Self {
        Self {
            job_container: ".job-listing".to_string(),
            title: ".title".to_string(),
            location: Some(".location".to_string()),
            department: None,
            job_type: None,
            salary_range: None,
            link: "a".to_string(),
            description: None,
            external_id_attribute: default_external_id_attribute(),
        }
    }
}
