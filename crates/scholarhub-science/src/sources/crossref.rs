use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::HeaderMap;
use scholarhub_core::DataSource;
use serde_json::Value;
use tracing::debug;

use crate::config::ScienceConfig;
use crate::error::Result;
use crate::http::{RateLimitedClient, build_url, user_agent};
use crate::identifiers::{Doi, Orcid};
use crate::sources::PaperSource;
use crate::title::title_similarity;
use crate::types::{NormalizedAuthor, NormalizedPaper, str_field, str_list, u32_field};

const SEARCH_ROWS: u32 = 5;
const DATE_FIELDS: &[&str] = &["published", "published-print", "published-online", "issued"];

static JATS_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Crossref works API. Records are identified by DOI.
pub struct CrossrefSource {
    client: RateLimitedClient,
    base_url: String,
    similarity_threshold: f64,
}

impl CrossrefSource {
    pub fn new(config: &ScienceConfig) -> Result<Self> {
        let client = RateLimitedClient::new(
            "crossref",
            Duration::from_millis(100),
            config.max_retries,
            config.timeout,
            &user_agent(config.polite_pool_email.as_deref()),
        )?;
        Ok(Self::with_params(
            client,
            config.crossref_url.clone(),
            config.crossref_similarity_threshold,
        ))
    }

    pub fn with_params(client: RateLimitedClient, base_url: String, similarity_threshold: f64) -> Self {
        Self {
            client,
            base_url,
            similarity_threshold,
        }
    }

    pub async fn fetch_by_doi(&self, doi: &str) -> Result<Option<NormalizedPaper>> {
        let url = build_url(&self.base_url, &["works", doi])?;
        let body = self
            .client
            .get_json_optional(url.as_str(), HeaderMap::new())
            .await?;
        Ok(body
            .as_ref()
            .and_then(|b| b.get("message"))
            .and_then(work_from_json))
    }

    pub async fn search_titles(&self, title: &str, rows: u32) -> Result<Vec<NormalizedPaper>> {
        let mut url = build_url(&self.base_url, &["works"])?;
        url.query_pairs_mut()
            .append_pair("query.title", title)
            .append_pair("rows", &rows.to_string());
        let body = self
            .client
            .get_json_optional(url.as_str(), HeaderMap::new())
            .await?;
        Ok(body
            .as_ref()
            .and_then(|b| b.get("message"))
            .and_then(|m| m.get("items"))
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(work_from_json).collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl PaperSource for CrossrefSource {
    fn name(&self) -> DataSource {
        DataSource::Crossref
    }

    async fn lookup_by_external_id(&self, id: &str) -> Result<Option<NormalizedPaper>> {
        self.fetch_by_doi(id).await
    }

    async fn lookup_by_doi(&self, doi: &str) -> Result<Option<NormalizedPaper>> {
        self.fetch_by_doi(doi).await
    }

    /// First of the top hits whose title is close enough to the query.
    async fn search_by_title(&self, title: &str) -> Result<Option<NormalizedPaper>> {
        let hits = self.search_titles(title, SEARCH_ROWS).await?;
        let found = hits.into_iter().find(|hit| {
            let similarity = title_similarity(title, &hit.title);
            debug!(candidate = %hit.title, similarity, "crossref title candidate");
            similarity >= self.similarity_threshold
        });
        Ok(found)
    }

    fn validates_title_internally(&self) -> bool {
        true
    }
}

// ─── Payload parsing ──────────────────────────────────────────────────────────

/// Removes JATS markup such as `<jats:p>` from an abstract.
pub fn strip_jats(text: &str) -> String {
    let stripped = JATS_TAG_RE.replace_all(text, " ");
    WHITESPACE_RE.replace_all(stripped.trim(), " ").into_owned()
}

/// First `date-parts` triple among the known date fields; month and day default to 1.
fn publication_date(v: &Value) -> Option<NaiveDate> {
    DATE_FIELDS.iter().find_map(|field| {
        let parts = v
            .get(*field)?
            .get("date-parts")?
            .as_array()?
            .first()?
            .as_array()?;
        let part = |i: usize| parts.get(i).and_then(Value::as_i64);
        let year = i32::try_from(part(0)?).ok()?;
        let month = part(1).and_then(|m| u32::try_from(m).ok()).unwrap_or(1);
        let day = part(2).and_then(|d| u32::try_from(d).ok()).unwrap_or(1);
        NaiveDate::from_ymd_opt(year, month, day)
    })
}

fn authors(v: &Value) -> Vec<NormalizedAuthor> {
    let Some(items) = v.get("author").and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|a| {
            let given = str_field(a, "given").unwrap_or_default();
            let family = str_field(a, "family").unwrap_or_default();
            let name = format!("{given} {family}").trim().to_string();
            (!name.is_empty()).then_some((name, a))
        })
        .enumerate()
        .map(|(position, (name, a))| {
            let mut author = NormalizedAuthor::new(name, position);
            author.orcid = str_field(a, "ORCID").and_then(|o| Orcid::normalize(&o));
            author.affiliation = a
                .get("affiliation")
                .and_then(Value::as_array)
                .and_then(|affs| affs.first())
                .and_then(|aff| str_field(aff, "name"));
            author
        })
        .collect()
}

pub fn work_from_json(v: &Value) -> Option<NormalizedPaper> {
    let title = str_list(v, "title").into_iter().next()?;
    let mut paper = NormalizedPaper::new(DataSource::Crossref, title);

    paper.doi = str_field(v, "DOI").and_then(|d| Doi::normalize(&d));
    paper.source_id = paper.doi.clone();
    paper.abstract_text = str_field(v, "abstract")
        .map(|a| strip_jats(&a))
        .filter(|a| !a.is_empty());
    paper.publication_date = publication_date(v);
    paper.venue = str_list(v, "container-title").into_iter().next();
    paper.citation_count = u32_field(v, "is-referenced-by-count");
    paper.keywords = str_list(v, "subject");
    paper.url = str_field(v, "URL");
    paper.authors = authors(v);
    paper.raw = v.clone();
    Some(paper)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn source(server: &Server) -> CrossrefSource {
        let client = RateLimitedClient::new(
            "crossref",
            Duration::from_millis(1),
            0,
            Duration::from_secs(5),
            "scholarhub-test",
        )
        .unwrap();
        CrossrefSource::with_params(client, server.url(), 0.5)
    }

    fn item(doi: &str, title: &str) -> Value {
        json!({
            "DOI": doi,
            "title": [title],
            "author": [
                {"given": "Volodymyr", "family": "Mnih",
                 "ORCID": "http://orcid.org/0000-0002-1825-0097",
                 "affiliation": [{"name": "DeepMind"}]},
                {"name": "Consortium"},
                {"given": "Koray", "family": "Kavukcuoglu"}
            ],
            "published-online": {"date-parts": [[2015, 2]]},
            "issued": {"date-parts": [[2014]]},
            "container-title": ["Nature"],
            "is-referenced-by-count": 25000,
            "abstract": "<jats:p>An artificial agent\n <jats:italic>learns</jats:italic>.</jats:p>",
            "URL": "https://doi.org/10.1038/nature14236"
        })
    }

    #[test]
    fn parses_work_payload() {
        let work = work_from_json(&item("10.1038/NATURE14236", "Human-level control")).unwrap();
        assert_eq!(work.doi.as_deref(), Some("10.1038/nature14236"));
        assert_eq!(work.source_id, work.doi);
        assert_eq!(work.publication_date, NaiveDate::from_ymd_opt(2015, 2, 1));
        assert_eq!(work.abstract_text.as_deref(), Some("An artificial agent learns ."));
        assert_eq!(work.authors.len(), 2);
        assert_eq!(work.authors[1].name, "Koray Kavukcuoglu");
        assert_eq!(work.authors[1].position, 1);
        assert_eq!(work.authors[0].orcid.as_deref(), Some("0000-0002-1825-0097"));
        assert_eq!(work.authors[0].affiliation.as_deref(), Some("DeepMind"));
        assert_eq!(work.citation_count, Some(25000));
    }

    #[test]
    fn date_prefers_published_and_defaults_parts() {
        let v = json!({"published": {"date-parts": [[2020]]}, "issued": {"date-parts": [[2019, 5, 6]]}});
        assert_eq!(publication_date(&v), NaiveDate::from_ymd_opt(2020, 1, 1));
        assert_eq!(publication_date(&json!({})), None);
    }

    #[tokio::test]
    async fn doi_lookup_reads_message() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/works/10.1038/nature14236")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({"status": "ok", "message": item("10.1038/nature14236", "Human-level control")})
                    .to_string(),
            )
            .create_async()
            .await;

        let work = source(&server).lookup_by_doi("10.1038/nature14236").await.unwrap().unwrap();
        assert_eq!(work.venue.as_deref(), Some("Nature"));
    }

    #[tokio::test]
    async fn title_search_skips_dissimilar_hits() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/works")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded(
                    "query.title".to_string(),
                    "Algorithmic Management and Worker Autonomy".to_string(),
                ),
                Matcher::UrlEncoded("rows".to_string(), "5".to_string()),
            ]))
            .with_status(200)
            .with_body(
                json!({"message": {"items": [
                    item("10.1/unrelated", "Protein folding at scale"),
                    item("10.1/match", "Algorithmic management and worker autonomy in platforms")
                ]}})
                .to_string(),
            )
            .create_async()
            .await;

        let crossref = source(&server);
        assert!(crossref.validates_title_internally());
        let hit = crossref
            .search_by_title("Algorithmic Management and Worker Autonomy")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.doi.as_deref(), Some("10.1/match"));
    }

    #[tokio::test]
    async fn title_search_without_match_is_none() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/works")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(json!({"message": {"items": [item("10.1/x", "Unrelated")]}}).to_string())
            .create_async()
            .await;

        let out = source(&server).search_by_title("Graph neural networks").await.unwrap();
        assert!(out.is_none());
    }
}
