use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use scholarhub_core::DataSource;
use serde_json::Value;
use tracing::debug;

use crate::config::ScienceConfig;
use crate::error::{Result, ScienceError};
use crate::http::{RateLimitedClient, build_url, user_agent};
use crate::identifiers::{Doi, Orcid};
use crate::sources::{AuthorProfileSource, AuthorWorksSource, PaperSource};
use crate::types::{
    AuthorProfile, AuthorWork, NormalizedAuthor, NormalizedPaper, date_or_year, i32_field,
    str_field, str_list, u32_field,
};

const PAPER_FIELDS: &str = "title,abstract,year,authors,citationCount,venue,publicationDate,externalIds,url,s2FieldsOfStudy,paperId";
const AUTHOR_FIELDS: &str =
    "name,aliases,affiliations,homepage,paperCount,citationCount,hIndex,authorId,externalIds";
const WORK_FIELDS: &str = "paperId,title,year,venue,citationCount,externalIds";
const TITLE_SEARCH_LIMIT: u32 = 3;
const API_KEY_HEADER: HeaderName = HeaderName::from_static("x-api-key");
const PROFILE_BASE: &str = "https://www.semanticscholar.org/author/";

/// Semantic Scholar Graph API.
pub struct SemanticScholarSource {
    client: RateLimitedClient,
    base_url: String,
    api_key: Option<String>,
}

impl SemanticScholarSource {
    /// One request per second without a key, ten with one.
    pub fn new(config: &ScienceConfig) -> Result<Self> {
        let min_interval = if config.has_semantic_scholar_key() {
            Duration::from_millis(100)
        } else {
            Duration::from_secs(1)
        };
        let client = RateLimitedClient::new(
            "semantic_scholar",
            min_interval,
            config.max_retries,
            config.timeout,
            &user_agent(config.polite_pool_email.as_deref()),
        )?;
        Ok(Self::with_client(
            client,
            config.semantic_scholar_url.clone(),
            config.semantic_scholar_api_key.clone(),
        ))
    }

    pub fn with_client(client: RateLimitedClient, base_url: String, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url,
            api_key,
        }
    }

    fn auth_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(key) = self
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            let value =
                HeaderValue::from_str(key).map_err(|e| ScienceError::Parse(e.to_string()))?;
            headers.insert(API_KEY_HEADER, value);
        }
        Ok(headers)
    }

    async fn get(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<Option<Value>> {
        let mut url = build_url(&self.base_url, segments)?;
        url.query_pairs_mut().extend_pairs(query);
        self.client
            .get_json_optional(url.as_str(), self.auth_headers()?)
            .await
    }

    /// Paper by Semantic Scholar id or a prefixed id such as `DOI:10.x/y`.
    pub async fn fetch_paper(&self, id: &str) -> Result<Option<NormalizedPaper>> {
        let body = self.get(&["paper", id], &[("fields", PAPER_FIELDS)]).await?;
        Ok(body.as_ref().and_then(paper_from_json))
    }

    pub async fn search_papers(&self, query: &str, limit: u32) -> Result<Vec<NormalizedPaper>> {
        let limit = limit.to_string();
        let body = self
            .get(
                &["paper", "search"],
                &[("query", query), ("limit", &limit), ("fields", PAPER_FIELDS)],
            )
            .await?;
        Ok(body
            .as_ref()
            .and_then(|b| b.get("data"))
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(paper_from_json).collect())
            .unwrap_or_default())
    }

    pub async fn fetch_author(&self, author_id: &str) -> Result<Option<AuthorProfile>> {
        let body = self
            .get(&["author", author_id], &[("fields", AUTHOR_FIELDS)])
            .await?;
        Ok(body.as_ref().map(author_from_json))
    }

    pub async fn fetch_author_papers(&self, author_id: &str, limit: u32) -> Result<Vec<AuthorWork>> {
        let limit = limit.to_string();
        let body = self
            .get(
                &["author", author_id, "papers"],
                &[("fields", WORK_FIELDS), ("limit", &limit)],
            )
            .await?;
        let works: Vec<AuthorWork> = body
            .as_ref()
            .and_then(|b| b.get("data"))
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(work_from_json).collect())
            .unwrap_or_default();
        debug!(author_id, count = works.len(), "fetched author papers");
        Ok(works)
    }
}

#[async_trait]
impl PaperSource for SemanticScholarSource {
    fn name(&self) -> DataSource {
        DataSource::SemanticScholar
    }

    async fn lookup_by_external_id(&self, id: &str) -> Result<Option<NormalizedPaper>> {
        self.fetch_paper(id).await
    }

    async fn lookup_by_doi(&self, doi: &str) -> Result<Option<NormalizedPaper>> {
        self.fetch_paper(&format!("DOI:{doi}")).await
    }

    async fn search_by_title(&self, title: &str) -> Result<Option<NormalizedPaper>> {
        Ok(self
            .search_papers(title, TITLE_SEARCH_LIMIT)
            .await?
            .into_iter()
            .next())
    }
}

#[async_trait]
impl AuthorProfileSource for SemanticScholarSource {
    fn name(&self) -> DataSource {
        DataSource::SemanticScholar
    }

    async fn fetch_author_profile(&self, author_id: &str) -> Result<Option<AuthorProfile>> {
        self.fetch_author(author_id).await
    }
}

#[async_trait]
impl AuthorWorksSource for SemanticScholarSource {
    async fn fetch_author_works(&self, author_id: &str, limit: u32) -> Result<Vec<AuthorWork>> {
        self.fetch_author_papers(author_id, limit).await
    }
}

// ─── Payload parsing ──────────────────────────────────────────────────────────

fn external_doi(v: &Value) -> Option<String> {
    v.get("externalIds")
        .and_then(|ids| ids.get("DOI"))
        .and_then(Value::as_str)
        .and_then(Doi::normalize)
}

/// `None` when the payload carries no title.
pub fn paper_from_json(v: &Value) -> Option<NormalizedPaper> {
    let title = str_field(v, "title")?;
    let mut paper = NormalizedPaper::new(DataSource::SemanticScholar, title);

    paper.source_id = str_field(v, "paperId");
    paper.doi = external_doi(v);
    paper.abstract_text = str_field(v, "abstract");
    paper.publication_date = date_or_year(
        v.get("publicationDate").and_then(Value::as_str),
        i32_field(v, "year"),
    );
    paper.venue = str_field(v, "venue");
    paper.citation_count = u32_field(v, "citationCount");
    paper.url = str_field(v, "url");
    paper.keywords = v
        .get("s2FieldsOfStudy")
        .and_then(Value::as_array)
        .map(|fields| {
            let mut out: Vec<String> = Vec::new();
            for category in fields.iter().filter_map(|f| str_field(f, "category")) {
                if !out.contains(&category) {
                    out.push(category);
                }
            }
            out
        })
        .unwrap_or_default();
    paper.authors = v
        .get("authors")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .enumerate()
                .map(|(position, a)| {
                    let mut author =
                        NormalizedAuthor::new(str_field(a, "name").unwrap_or_default(), position);
                    author.source_author_id = str_field(a, "authorId");
                    author
                })
                .collect()
        })
        .unwrap_or_default();
    paper.raw = v.clone();
    Some(paper)
}

pub fn author_from_json(v: &Value) -> AuthorProfile {
    let mut profile = AuthorProfile::empty(DataSource::SemanticScholar);
    profile.source_author_id = str_field(v, "authorId");
    profile.display_name = str_field(v, "name");
    profile.aliases = str_list(v, "aliases");
    profile.affiliation = str_list(v, "affiliations").into_iter().next();
    profile.homepage = str_field(v, "homepage");
    profile.paper_count = u32_field(v, "paperCount");
    profile.total_citations = u32_field(v, "citationCount");
    profile.h_index = u32_field(v, "hIndex");
    profile.orcid = v
        .get("externalIds")
        .and_then(|ids| ids.get("ORCID"))
        .and_then(Value::as_str)
        .and_then(Orcid::normalize);
    profile.profile_url = profile
        .source_author_id
        .as_ref()
        .map(|id| format!("{PROFILE_BASE}{id}"));
    profile.raw = v.clone();
    profile
}

fn work_from_json(v: &Value) -> Option<AuthorWork> {
    Some(AuthorWork {
        source_paper_id: str_field(v, "paperId")?,
        title: str_field(v, "title")?,
        year: i32_field(v, "year"),
        venue: str_field(v, "venue"),
        citation_count: u32_field(v, "citationCount").unwrap_or(0),
        doi: external_doi(v),
    })
}
