use chrono::NaiveDate;
use scholarhub_core::{AffiliationRecord, DataSource, ResearchConcept};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A paper record as returned by one source, already normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPaper {
    pub source: DataSource,
    /// The record's id at `source` (short form for OpenAlex, DOI for Crossref).
    pub source_id: Option<String>,
    pub doi: Option<String>,
    pub title: String,
    pub abstract_text: Option<String>,
    pub authors: Vec<NormalizedAuthor>,
    pub publication_date: Option<NaiveDate>,
    pub venue: Option<String>,
    pub citation_count: Option<u32>,
    pub keywords: Vec<String>,
    pub url: Option<String>,
    pub raw: Value,
}

impl NormalizedPaper {
    pub fn new(source: DataSource, title: impl Into<String>) -> Self {
        Self {
            source,
            source_id: None,
            doi: None,
            title: title.into(),
            abstract_text: None,
            authors: Vec::new(),
            publication_date: None,
            venue: None,
            citation_count: None,
            keywords: Vec::new(),
            url: None,
            raw: Value::Null,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedAuthor {
    pub name: String,
    pub source_author_id: Option<String>,
    pub orcid: Option<String>,
    pub affiliation: Option<String>,
    pub position: usize,
}

impl NormalizedAuthor {
    pub fn new(name: impl Into<String>, position: usize) -> Self {
        Self {
            name: name.into(),
            source_author_id: None,
            orcid: None,
            affiliation: None,
            position,
        }
    }
}

/// A researcher profile in the shape every profile source produces.
///
/// Metrics stay `None` when the source did not report them, which the merge
/// distinguishes from a reported zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorProfile {
    pub source: DataSource,
    pub source_author_id: Option<String>,
    pub orcid: Option<String>,
    pub scopus_id: Option<String>,
    pub display_name: Option<String>,
    pub aliases: Vec<String>,
    pub affiliation: Option<String>,
    pub current_position: Option<String>,
    pub affiliation_history: Vec<AffiliationRecord>,
    pub h_index: Option<u32>,
    pub i10_index: Option<u32>,
    pub paper_count: Option<u32>,
    pub total_citations: Option<u32>,
    /// Self-reported keywords.
    pub research_interests: Vec<String>,
    pub research_concepts: Vec<ResearchConcept>,
    pub homepage: Option<String>,
    /// Public profile page at the source.
    pub profile_url: Option<String>,
    pub raw: Value,
}

impl AuthorProfile {
    pub fn empty(source: DataSource) -> Self {
        Self {
            source,
            source_author_id: None,
            orcid: None,
            scopus_id: None,
            display_name: None,
            aliases: Vec::new(),
            affiliation: None,
            current_position: None,
            affiliation_history: Vec::new(),
            h_index: None,
            i10_index: None,
            paper_count: None,
            total_citations: None,
            research_interests: Vec::new(),
            research_concepts: Vec::new(),
            homepage: None,
            profile_url: None,
            raw: Value::Null,
        }
    }
}

/// One entry of an author's work list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorWork {
    pub source_paper_id: String,
    pub title: String,
    pub year: Option<i32>,
    pub venue: Option<String>,
    pub citation_count: u32,
    pub doi: Option<String>,
}

/// Lookup by OpenAlex author search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorQuery {
    pub name: String,
    pub affiliation: Option<String>,
}

// ─── JSON helpers shared by the adapters ─────────────────────────────────────

pub(crate) fn str_field(v: &Value, key: &str) -> Option<String> {
    v.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
}

pub(crate) fn u32_field(v: &Value, key: &str) -> Option<u32> {
    v.get(key)
        .and_then(Value::as_u64)
        .and_then(|n| u32::try_from(n).ok())
}

pub(crate) fn i32_field(v: &Value, key: &str) -> Option<i32> {
    v.get(key)
        .and_then(Value::as_i64)
        .and_then(|n| i32::try_from(n).ok())
}

pub(crate) fn str_list(v: &Value, key: &str) -> Vec<String> {
    v.get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToOwned::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

/// Parses `YYYY-MM-DD`, falling back to January 1st of `year`.
pub(crate) fn date_or_year(date: Option<&str>, year: Option<i32>) -> Option<NaiveDate> {
    date.and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        .or_else(|| year.and_then(|y| NaiveDate::from_ymd_opt(y, 1, 1)))
}
