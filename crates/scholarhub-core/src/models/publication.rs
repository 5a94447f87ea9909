use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A cached entry from a researcher's external work list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalPublication {
    pub researcher_id: Uuid,
    /// Semantic Scholar paper id.
    pub source_paper_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub venue: Option<String>,
    #[serde(default)]
    pub citation_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    #[serde(default)]
    pub is_imported: bool,
    pub last_fetched: DateTime<Utc>,
}

impl ExternalPublication {
    pub fn is_fresh(&self, now: DateTime<Utc>, max_age_days: i64) -> bool {
        now.signed_duration_since(self.last_fetched) < chrono::Duration::days(max_age_days)
    }
}
