use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use scholarhub_core::{AffiliationRecord, DataSource};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::config::ScienceConfig;
use crate::error::Result;
use crate::http::{RateLimitedClient, build_url, user_agent};
use crate::identifiers::Orcid;
use crate::sources::AuthorProfileSource;
use crate::types::{AuthorProfile, str_field};

const SEARCH_ROWS: u32 = 5;
const PROFILE_BASE: &str = "https://orcid.org/";

/// One hit from the ORCID registry search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrcidSearchHit {
    pub orcid: String,
    pub uri: Option<String>,
}

/// ORCID public API (v3.0).
pub struct OrcidSource {
    client: RateLimitedClient,
    base_url: String,
}

impl OrcidSource {
    /// Four requests per second.
    pub fn new(config: &ScienceConfig) -> Result<Self> {
        let client = RateLimitedClient::new(
            "orcid",
            Duration::from_millis(250),
            config.max_retries,
            config.timeout,
            &user_agent(config.polite_pool_email.as_deref()),
        )?;
        Ok(Self::with_client(client, config.orcid_url.clone()))
    }

    pub fn with_client(client: RateLimitedClient, base_url: String) -> Self {
        Self { client, base_url }
    }

    fn headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers
    }

    /// Full record for an ORCID iD.
    pub async fn fetch_record(&self, orcid: &str) -> Result<Option<AuthorProfile>> {
        let Some(orcid) = Orcid::normalize(orcid) else {
            return Ok(None);
        };
        let url = build_url(&self.base_url, &[&orcid])?;
        let body = self.client.get_json_optional(url.as_str(), Self::headers()).await?;
        Ok(body.map(|record| profile_from_record(&orcid, &record)))
    }

    /// Registry search on family name, given name and optional affiliation.
    pub async fn search_by_name(
        &self,
        name: &str,
        affiliation: Option<&str>,
    ) -> Result<Vec<OrcidSearchHit>> {
        let Some(query) = search_query(name, affiliation) else {
            return Ok(Vec::new());
        };
        info!(query = %query, "searching ORCID registry");
        let mut url = build_url(&self.base_url, &["search", ""])?;
        url.query_pairs_mut()
            .append_pair("q", &query)
            .append_pair("rows", &SEARCH_ROWS.to_string());
        let body = self.client.get_json_optional(url.as_str(), Self::headers()).await?;
        Ok(body
            .as_ref()
            .and_then(|b| b.get("result"))
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| {
                        let ident = item.get("orcid-identifier")?;
                        Some(OrcidSearchHit {
                            orcid: str_field(ident, "path")?,
                            uri: str_field(ident, "uri"),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl AuthorProfileSource for OrcidSource {
    fn name(&self) -> DataSource {
        DataSource::Orcid
    }

    async fn fetch_author_profile(&self, author_id: &str) -> Result<Option<AuthorProfile>> {
        self.fetch_record(author_id).await
    }

    async fn fetch_author_by_orcid(&self, orcid: &str) -> Result<Option<AuthorProfile>> {
        self.fetch_record(orcid).await
    }
}

// ─── Record parsing ───────────────────────────────────────────────────────────

fn search_query(name: &str, affiliation: Option<&str>) -> Option<String> {
    let parts: Vec<&str> = name.split_whitespace().collect();
    let family = parts.last()?;
    let mut clauses = vec![format!("family-name:{family}")];
    if parts.len() > 1 {
        clauses.push(format!("given-names:{}", parts[0]));
    }
    if let Some(aff) = affiliation.map(str::trim).filter(|a| !a.is_empty()) {
        clauses.push(format!("affiliation-org-name:{aff}"));
    }
    Some(clauses.join(" AND "))
}

/// Reads `{"value": ...}` wrappers used throughout ORCID records.
fn value_of(v: Option<&Value>) -> Option<String> {
    v.and_then(|inner| str_field(inner, "value"))
}

fn contents(v: Option<&Value>, list_key: &str) -> Vec<String> {
    v.and_then(|inner| inner.get(list_key))
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(|i| str_field(i, "content")).collect())
        .unwrap_or_default()
}

fn year_of(date: Option<&Value>) -> Option<i32> {
    value_of(date?.get("year"))?.parse().ok()
}

fn employment_history(record: &Value) -> Vec<AffiliationRecord> {
    let groups = record
        .get("activities-summary")
        .and_then(|a| a.get("employments"))
        .and_then(|e| e.get("affiliation-group"))
        .and_then(Value::as_array);
    let Some(groups) = groups else {
        return Vec::new();
    };

    groups
        .iter()
        .filter_map(|g| g.get("summaries").and_then(Value::as_array))
        .flatten()
        .filter_map(|s| s.get("employment-summary"))
        .filter_map(|emp| {
            let org = emp.get("organization")?;
            let mut record = AffiliationRecord::new(str_field(org, "name")?, DataSource::Orcid);
            record.department = str_field(emp, "department-name");
            record.role = str_field(emp, "role-title");
            record.start_year = year_of(emp.get("start-date"));
            record.end_year = year_of(emp.get("end-date"));
            record.external_org_id = org
                .get("disambiguated-organization")
                .filter(|d| str_field(d, "disambiguation-source").as_deref() == Some("ROR"))
                .and_then(|d| str_field(d, "disambiguated-organization-identifier"));
            Some(record)
        })
        .collect()
}

/// A job without an end year, otherwise the one that ended last.
fn current_job(history: &[AffiliationRecord]) -> Option<&AffiliationRecord> {
    if let Some(open) = history.iter().find(|h| h.end_year.is_none()) {
        return Some(open);
    }
    history.iter().fold(None, |best: Option<&AffiliationRecord>, h| match best {
        Some(b) if b.end_year >= h.end_year => Some(b),
        _ => Some(h),
    })
}

pub fn profile_from_record(orcid: &str, record: &Value) -> AuthorProfile {
    let person = record.get("person");
    let name = person.and_then(|p| p.get("name"));
    let given = value_of(name.and_then(|n| n.get("given-names"))).unwrap_or_default();
    let family = value_of(name.and_then(|n| n.get("family-name"))).unwrap_or_default();
    let full_name = format!("{given} {family}").trim().to_string();

    let mut profile = AuthorProfile::empty(DataSource::Orcid);
    profile.source_author_id = Some(orcid.to_string());
    profile.orcid = Some(orcid.to_string());
    profile.display_name = (!full_name.is_empty()).then_some(full_name);
    profile.aliases = contents(person.and_then(|p| p.get("other-names")), "other-name");
    profile.research_interests = contents(person.and_then(|p| p.get("keywords")), "keyword");
    profile.affiliation_history = employment_history(record);
    if let Some(job) = current_job(&profile.affiliation_history) {
        profile.affiliation = Some(job.institution.clone());
        profile.current_position = job.role.clone();
    }
    profile.paper_count = record
        .get("activities-summary")
        .and_then(|a| a.get("works"))
        .and_then(|w| w.get("group"))
        .and_then(Value::as_array)
        .and_then(|groups| u32::try_from(groups.len()).ok());
    profile.profile_url = Some(format!("{PROFILE_BASE}{orcid}"));
    profile.raw = record.clone();
    profile
}
