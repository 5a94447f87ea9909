use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::DataSource;
use crate::error::HubError;

/// A paper persisted in the local database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperEntity {
    pub id: Uuid,
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abstract_text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publication_date: Option<NaiveDate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub venue: Option<String>,

    #[serde(default)]
    pub citation_count: u32,

    #[serde(default)]
    pub keywords: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default)]
    pub external_ids: PaperExternalIds,

    #[serde(default)]
    pub import_status: ImportStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub import_failure_reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_source: Option<DataSource>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_import_attempt: Option<DateTime<Utc>>,

    /// Raw payloads keyed by source name.
    #[serde(default)]
    pub raw_data: serde_json::Map<String, serde_json::Value>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaperEntity {
    pub fn new(title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            title: title.into(),
            doi: None,
            abstract_text: None,
            publication_date: None,
            venue: None,
            citation_count: 0,
            keywords: Vec::new(),
            url: None,
            external_ids: PaperExternalIds::default(),
            import_status: ImportStatus::Unattempted,
            import_failure_reason: None,
            data_source: None,
            last_import_attempt: None,
            raw_data: serde_json::Map::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_doi(mut self, doi: impl Into<String>) -> Self {
        self.doi = Some(doi.into());
        self
    }

    pub fn year(&self) -> Option<i32> {
        use chrono::Datelike;
        self.publication_date.map(|d| d.year())
    }
}

/// Per-source identifiers. A Crossref record is identified by its DOI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperExternalIds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_scholar: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openalex: Option<String>,
}

impl PaperExternalIds {
    pub fn get(&self, source: DataSource) -> Option<&str> {
        match source {
            DataSource::SemanticScholar => self.semantic_scholar.as_deref(),
            DataSource::OpenAlex => self.openalex.as_deref(),
            DataSource::Crossref | DataSource::Orcid => None,
        }
    }

    /// Returns the slot for `source`, or `None` when the source has no paper id column.
    pub fn slot_mut(&mut self, source: DataSource) -> Option<&mut Option<String>> {
        match source {
            DataSource::SemanticScholar => Some(&mut self.semantic_scholar),
            DataSource::OpenAlex => Some(&mut self.openalex),
            DataSource::Crossref | DataSource::Orcid => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportStatus {
    #[default]
    Unattempted,
    Success,
    Failed,
}

impl std::fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unattempted => write!(f, "unattempted"),
            Self::Success => write!(f, "success"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for ImportStatus {
    type Err = HubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unattempted" => Ok(Self::Unattempted),
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            other => Err(HubError::ValidationError(format!("unknown import status: {other}"))),
        }
    }
}
