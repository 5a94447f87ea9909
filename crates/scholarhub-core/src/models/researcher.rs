use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::DataSource;

const AVATAR_SERVICE: &str = "https://ui-avatars.com/api/";

/// A researcher persisted in the local database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearcherEntity {
    pub id: Uuid,
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affiliation: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_position: Option<String>,

    #[serde(default)]
    pub affiliation_history: Vec<AffiliationRecord>,

    #[serde(default)]
    pub aliases: BTreeSet<String>,

    #[serde(default)]
    pub external_ids: ResearcherExternalIds,

    #[serde(default)]
    pub metrics: ResearcherMetrics,

    #[serde(default)]
    pub research_interests: Vec<String>,

    #[serde(default)]
    pub research_concepts: Vec<ResearchConcept>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_research_area: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,

    /// Generated profile text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    #[serde(default)]
    pub data_quality_score: u8,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_enriched: Option<DateTime<Utc>>,

    #[serde(default)]
    pub data_sources: Vec<DataSource>,

    #[serde(default)]
    pub raw_data: serde_json::Map<String, serde_json::Value>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ResearcherEntity {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            name: name.into(),
            email: None,
            affiliation: None,
            current_position: None,
            affiliation_history: Vec::new(),
            aliases: BTreeSet::new(),
            external_ids: ResearcherExternalIds::default(),
            metrics: ResearcherMetrics::default(),
            research_interests: Vec::new(),
            research_concepts: Vec::new(),
            primary_research_area: None,
            url: None,
            avatar_url: None,
            summary: None,
            data_quality_score: 0,
            last_enriched: None,
            data_sources: Vec::new(),
            raw_data: serde_json::Map::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_external_id(&self) -> bool {
        let ids = &self.external_ids;
        ids.orcid.is_some()
            || ids.semantic_scholar.is_some()
            || ids.openalex.is_some()
            || ids.scopus.is_some()
    }

    /// True when the avatar is missing or still the generated initials image.
    pub fn needs_avatar(&self) -> bool {
        self.avatar_url
            .as_deref()
            .is_none_or(|url| url.is_empty() || is_placeholder_avatar(url))
    }
}

/// Initials avatar used until a real picture is known.
pub fn placeholder_avatar_url(name: &str) -> String {
    let encoded = name.split_whitespace().collect::<Vec<_>>().join("+");
    format!("{AVATAR_SERVICE}?name={encoded}&background=635BFF&color=fff")
}

pub fn is_placeholder_avatar(url: &str) -> bool {
    url.starts_with(AVATAR_SERVICE)
}

/// Per-source identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearcherExternalIds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orcid: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_scholar: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openalex: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopus: Option<String>,
}

impl ResearcherExternalIds {
    pub fn get(&self, source: DataSource) -> Option<&str> {
        match source {
            DataSource::Orcid => self.orcid.as_deref(),
            DataSource::SemanticScholar => self.semantic_scholar.as_deref(),
            DataSource::OpenAlex => self.openalex.as_deref(),
            DataSource::Crossref => None,
        }
    }

    pub fn slot_mut(&mut self, source: DataSource) -> Option<&mut Option<String>> {
        match source {
            DataSource::Orcid => Some(&mut self.orcid),
            DataSource::SemanticScholar => Some(&mut self.semantic_scholar),
            DataSource::OpenAlex => Some(&mut self.openalex),
            DataSource::Crossref => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearcherMetrics {
    pub h_index: u32,
    pub i10_index: u32,
    pub paper_count: u32,
    pub total_citations: u32,
}

/// One employment or affiliation period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffiliationRecord {
    pub institution: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_year: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_year: Option<i32>,

    /// ROR id or OpenAlex institution id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_org_id: Option<String>,

    pub source: DataSource,
}

impl AffiliationRecord {
    pub fn new(institution: impl Into<String>, source: DataSource) -> Self {
        Self {
            institution: institution.into(),
            department: None,
            role: None,
            start_year: None,
            end_year: None,
            external_org_id: None,
            source,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchConcept {
    pub concept: String,
    /// Relevance in `[0, 1]`.
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u32>,
}
