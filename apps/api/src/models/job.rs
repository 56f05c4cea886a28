use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A persisted posting. `(company_id, external_id)` is the natural key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct JobRecord {
    pub id: Uuid,
    pub company_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub department: Option<String>,
    pub job_type: Option<String>,
    pub salary_range: Option<String>,
    pub job_url: String,
    pub external_id: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A posting as observed on a careers page, before it is reconciled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCandidate {
    pub company_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub department: Option<String>,
    pub job_type: Option<String>,
    pub salary_range: Option<String>,
    pub job_url: String,
    pub external_id: String,
}

/// The closed set of columns a reconciliation refresh may write.
///
/// Every field is written on update; `None` clears the column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobUpdate {
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub department: Option<String>,
    pub job_type: Option<String>,
    pub salary_range: Option<String>,
    pub job_url: String,
    pub is_active: bool,
}

impl JobUpdate {
    /// Refresh taken from a fresh observation. Always reactivates the record.
    pub fn refresh_from(candidate: &JobCandidate) -> Self {
        Self {
            title: candidate.title.clone(),
            description: candidate.description.clone(),
            location: candidate.location.clone(),
            department: candidate.department.clone(),
            job_type: candidate.job_type.clone(),
            salary_range: candidate.salary_range.clone(),
            job_url: candidate.job_url.clone(),
            is_active: true,
        }
    }

    pub fn apply_to(&self, record: &mut JobRecord, now: DateTime<Utc>) {
        record.title = self.title.clone();
        record.description = self.description.clone();
        record.location = self.location.clone();
        record.department = self.department.clone();
        record.job_type = self.job_type.clone();
        record.salary_range = self.salary_range.clone();
        record.job_url = self.job_url.clone();
        record.is_active = self.is_active;
        record.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(title: &str) -> JobCandidate {
        JobCandidate {
            company_id: Uuid::new_v4(),
            title: title.to_string(),
            description: None,
            location: Some("Remote".to_string()),
            department: None,
            job_type: None,
            salary_range: None,
            job_url: "https://example.com/jobs/1".to_string(),
            external_id: "1".to_string(),
        }
    }

    #[test]
    fn test_refresh_reactivates_and_overwrites_fields() {
        let created = Utc::now();
        let mut record = JobRecord {
            id: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
            title: "Engineer".to_string(),
            description: Some("old".to_string()),
            location: None,
            department: Some("R&D".to_string()),
            job_type: None,
            salary_range: None,
            job_url: "https://example.com/old".to_string(),
            external_id: "1".to_string(),
            is_active: false,
            created_at: created,
            updated_at: created,
        };
        let id = record.id;
        let later = created + chrono::Duration::minutes(5);

        JobUpdate::refresh_from(&candidate("Senior Engineer")).apply_to(&mut record, later);

        assert_eq!(record.id, id);
        assert_eq!(record.title, "Senior Engineer");
        assert!(record.is_active);
        assert_eq!(record.description, None);
        assert_eq!(record.department, None);
        assert_eq!(record.location.as_deref(), Some("Remote"));
        assert_eq!(record.job_url, "https://example.com/jobs/1");
        assert_eq!(record.created_at, created);
        assert_eq!(record.updated_at, later);
    }
}
