use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::HeaderMap;
use scholarhub_core::{AffiliationRecord, DataSource, ResearchConcept};
use serde_json::Value;
use tracing::debug;

use crate::config::ScienceConfig;
use crate::error::Result;
use crate::http::{RateLimitedClient, build_url, user_agent};
use crate::identifiers::{Doi, Orcid};
use crate::sources::{AuthorProfileSource, PaperSource};
use crate::types::{
    AuthorProfile, AuthorQuery, NormalizedAuthor, NormalizedPaper, date_or_year, i32_field,
    str_field, str_list, u32_field,
};

const ID_PREFIX: &str = "https://openalex.org/";
const TITLE_SEARCH_LIMIT: u32 = 5;
const AUTHOR_SEARCH_LIMIT: u32 = 5;
const MAX_CONCEPTS: usize = 10;
const AFFILIATION_MATCH_THRESHOLD: f64 = 0.6;

static SCOPUS_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"authorID=(\d+)").expect("valid regex"));

/// OpenAlex works and authors.
pub struct OpenAlexSource {
    client: RateLimitedClient,
    base_url: String,
    mailto: Option<String>,
}

impl OpenAlexSource {
    pub fn new(config: &ScienceConfig) -> Result<Self> {
        let client = RateLimitedClient::new(
            "openalex",
            Duration::from_millis(100),
            config.max_retries,
            config.timeout,
            &user_agent(config.polite_pool_email.as_deref()),
        )?;
        Ok(Self::with_client(
            client,
            config.openalex_url.clone(),
            config.polite_pool_email.clone(),
        ))
    }

    pub fn with_client(client: RateLimitedClient, base_url: String, mailto: Option<String>) -> Self {
        Self {
            client,
            base_url,
            mailto,
        }
    }

    async fn get(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<Option<Value>> {
        let mut url = build_url(&self.base_url, segments)?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.extend_pairs(query);
            if let Some(email) = self.mailto.as_deref().filter(|e| !e.trim().is_empty()) {
                pairs.append_pair("mailto", email);
            }
        }
        self.client
            .get_json_optional(url.as_str(), HeaderMap::new())
            .await
    }

    fn results(body: Option<Value>) -> Vec<Value> {
        body.and_then(|b| b.get("results").and_then(Value::as_array).cloned())
            .unwrap_or_default()
    }

    pub async fn fetch_work(&self, id: &str) -> Result<Option<NormalizedPaper>> {
        let id = short_id(id);
        Ok(self.get(&["works", id], &[]).await?.as_ref().and_then(work_from_json))
    }

    pub async fn fetch_work_by_doi(&self, doi: &str) -> Result<Option<NormalizedPaper>> {
        let key = format!("doi:{doi}");
        Ok(self.get(&["works", &key], &[]).await?.as_ref().and_then(work_from_json))
    }

    pub async fn search_works(&self, query: &str, limit: u32) -> Result<Vec<NormalizedPaper>> {
        let per_page = limit.to_string();
        let body = self
            .get(&["works"], &[("search", query), ("per-page", &per_page)])
            .await?;
        Ok(Self::results(body)
            .iter()
            .filter_map(work_from_json)
            .collect())
    }

    pub async fn fetch_author(&self, id: &str) -> Result<Option<AuthorProfile>> {
        let id = short_id(id);
        Ok(self.get(&["authors", id], &[]).await?.as_ref().map(author_from_json))
    }

    pub async fn fetch_author_by_orcid_id(&self, orcid: &str) -> Result<Option<AuthorProfile>> {
        let key = format!("orcid:{orcid}");
        Ok(self.get(&["authors", &key], &[]).await?.as_ref().map(author_from_json))
    }

    /// Author candidates for a name, best affiliation match first.
    pub async fn search_authors(&self, query: &AuthorQuery) -> Result<Vec<AuthorProfile>> {
        let per_page = AUTHOR_SEARCH_LIMIT.to_string();
        let body = self
            .get(
                &["authors"],
                &[("search", query.name.as_str()), ("per-page", &per_page)],
            )
            .await?;
        let mut candidates: Vec<AuthorProfile> =
            Self::results(body).iter().map(author_from_json).collect();
        if let Some(affiliation) = query.affiliation.as_deref() {
            prefer_affiliation(&mut candidates, affiliation);
        }
        Ok(candidates)
    }
}

/// Moves the candidate whose institutions best match `affiliation` to the front.
fn prefer_affiliation(candidates: &mut [AuthorProfile], affiliation: &str) {
    let wanted = affiliation.trim().to_lowercase();
    if wanted.is_empty() {
        return;
    }
    let score = |p: &AuthorProfile| {
        p.affiliation
            .iter()
            .chain(p.affiliation_history.iter().map(|h| &h.institution))
            .map(|inst| strsim::normalized_levenshtein(&wanted, &inst.to_lowercase()))
            .fold(0.0_f64, f64::max)
    };
    let best = candidates
        .iter()
        .enumerate()
        .map(|(i, p)| (i, score(p)))
        .filter(|(_, s)| *s >= AFFILIATION_MATCH_THRESHOLD)
        .fold(None::<(usize, f64)>, |acc, (i, s)| match acc {
            Some((_, best)) if best >= s => acc,
            _ => Some((i, s)),
        });
    if let Some((index, _)) = best {
        candidates[..=index].rotate_right(1);
    }
}

#[async_trait]
impl PaperSource for OpenAlexSource {
    fn name(&self) -> DataSource {
        DataSource::OpenAlex
    }

    async fn lookup_by_external_id(&self, id: &str) -> Result<Option<NormalizedPaper>> {
        self.fetch_work(id).await
    }

    async fn lookup_by_doi(&self, doi: &str) -> Result<Option<NormalizedPaper>> {
        self.fetch_work_by_doi(doi).await
    }

    async fn search_by_title(&self, title: &str) -> Result<Option<NormalizedPaper>> {
        Ok(self
            .search_works(title, TITLE_SEARCH_LIMIT)
            .await?
            .into_iter()
            .next())
    }
}

#[async_trait]
impl AuthorProfileSource for OpenAlexSource {
    fn name(&self) -> DataSource {
        DataSource::OpenAlex
    }

    async fn fetch_author_profile(&self, author_id: &str) -> Result<Option<AuthorProfile>> {
        self.fetch_author(author_id).await
    }

    async fn fetch_author_by_orcid(&self, orcid: &str) -> Result<Option<AuthorProfile>> {
        self.fetch_author_by_orcid_id(orcid).await
    }

    /// Top search hit, re-fetched by id for the full record.
    async fn search_author(&self, query: &AuthorQuery) -> Result<Option<AuthorProfile>> {
        let Some(top) = self.search_authors(query).await?.into_iter().next() else {
            return Ok(None);
        };
        debug!(name = %query.name, candidate = ?top.source_author_id, "openalex author search hit");
        match top.source_author_id.clone() {
            Some(id) => Ok(self.fetch_author(&id).await?.or(Some(top))),
            None => Ok(Some(top)),
        }
    }
}

// ─── Payload parsing ──────────────────────────────────────────────────────────

/// `https://openalex.org/W123` → `W123`.
pub fn short_id(id: &str) -> &str {
    id.trim().strip_prefix(ID_PREFIX).unwrap_or(id.trim())
}

/// Rebuilds an abstract from OpenAlex's `{word: [positions]}` index.
pub fn reconstruct_abstract(index: &serde_json::Map<String, Value>) -> String {
    let mut placed: Vec<(u64, &str)> = index
        .iter()
        .flat_map(|(word, positions)| {
            positions
                .as_array()
                .into_iter()
                .flatten()
                .filter_map(Value::as_u64)
                .map(move |pos| (pos, word.as_str()))
        })
        .collect();
    placed.sort_by_key(|(pos, _)| *pos);
    placed.dedup_by_key(|(pos, _)| *pos);
    placed
        .into_iter()
        .map(|(_, word)| word)
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn work_from_json(v: &Value) -> Option<NormalizedPaper> {
    let title = str_field(v, "title").or_else(|| str_field(v, "display_name"))?;
    let mut paper = NormalizedPaper::new(DataSource::OpenAlex, title);

    paper.source_id = str_field(v, "id").map(|id| short_id(&id).to_string());
    paper.doi = str_field(v, "doi").and_then(|d| Doi::normalize(&d));
    paper.abstract_text = v
        .get("abstract_inverted_index")
        .and_then(Value::as_object)
        .map(reconstruct_abstract)
        .filter(|a| !a.is_empty());
    paper.publication_date = date_or_year(
        v.get("publication_date").and_then(Value::as_str),
        i32_field(v, "publication_year"),
    );
    paper.venue = v
        .get("primary_location")
        .and_then(|l| l.get("source"))
        .and_then(|s| str_field(s, "display_name"))
        .or_else(|| v.get("host_venue").and_then(|h| str_field(h, "display_name")));
    paper.citation_count = u32_field(v, "cited_by_count");
    paper.keywords = display_names(v.get("keywords"));
    if paper.keywords.is_empty() {
        paper.keywords = display_names(v.get("concepts")).into_iter().take(5).collect();
    }
    paper.url = v
        .get("primary_location")
        .and_then(|l| str_field(l, "landing_page_url"))
        .or_else(|| paper.doi.as_ref().map(|d| format!("https://doi.org/{d}")));
    paper.authors = v
        .get("authorships")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .enumerate()
                .map(|(position, a)| {
                    let author = a.get("author");
                    let field = |key: &str| author.and_then(|au| str_field(au, key));
                    let mut out =
                        NormalizedAuthor::new(field("display_name").unwrap_or_default(), position);
                    out.source_author_id = field("id").map(|id| short_id(&id).to_string());
                    out.orcid = field("orcid").and_then(|o| Orcid::normalize(&o));
                    out.affiliation = a
                        .get("institutions")
                        .and_then(Value::as_array)
                        .and_then(|insts| insts.iter().find_map(|i| str_field(i, "display_name")));
                    out
                })
                .collect()
        })
        .unwrap_or_default();
    paper.raw = v.clone();
    Some(paper)
}

fn display_names(v: Option<&Value>) -> Vec<String> {
    v.and_then(Value::as_array)
        .map(|items| items.iter().filter_map(|i| str_field(i, "display_name")).collect())
        .unwrap_or_default()
}

fn last_known_institution(v: &Value) -> Option<String> {
    v.get("last_known_institutions")
        .and_then(Value::as_array)
        .and_then(|insts| insts.iter().find_map(|i| str_field(i, "display_name")))
        .or_else(|| {
            v.get("last_known_institution")
                .and_then(|i| str_field(i, "display_name"))
        })
}

fn affiliation_history(v: &Value) -> Vec<AffiliationRecord> {
    let Some(items) = v.get("affiliations").and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|entry| {
            let institution = entry.get("institution")?;
            let mut record =
                AffiliationRecord::new(str_field(institution, "display_name")?, DataSource::OpenAlex);
            let years: Vec<i32> = entry
                .get("years")
                .and_then(Value::as_array)
                .map(|ys| {
                    ys.iter()
                        .filter_map(Value::as_i64)
                        .filter_map(|y| i32::try_from(y).ok())
                        .collect()
                })
                .unwrap_or_default();
            record.start_year = years.iter().min().copied();
            record.end_year = years.iter().max().copied();
            record.external_org_id = str_field(institution, "ror")
                .or_else(|| str_field(institution, "id").map(|id| short_id(&id).to_string()));
            Some(record)
        })
        .collect()
}

fn research_concepts(v: &Value) -> Vec<ResearchConcept> {
    let mut concepts: Vec<ResearchConcept> = v
        .get("x_concepts")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|c| {
                    let raw = c.get("score").and_then(Value::as_f64).unwrap_or(0.0);
                    Some(ResearchConcept {
                        concept: str_field(c, "display_name")?,
                        score: if raw > 1.0 { raw / 100.0 } else { raw },
                        level: c
                            .get("level")
                            .and_then(Value::as_u64)
                            .and_then(|l| u32::try_from(l).ok()),
                    })
                })
                .collect()
        })
        .unwrap_or_default();
    concepts.sort_by(|a, b| b.score.total_cmp(&a.score));
    concepts.truncate(MAX_CONCEPTS);
    concepts
}

fn scopus_id(v: &Value) -> Option<String> {
    let raw = v.get("ids").and_then(|ids| str_field(ids, "scopus"))?;
    if raw.chars().all(|c| c.is_ascii_digit()) {
        return Some(raw);
    }
    SCOPUS_ID_RE
        .captures(&raw)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

pub fn author_from_json(v: &Value) -> AuthorProfile {
    let mut profile = AuthorProfile::empty(DataSource::OpenAlex);
    profile.source_author_id = str_field(v, "id").map(|id| short_id(&id).to_string());
    profile.orcid = str_field(v, "orcid").and_then(|o| Orcid::normalize(&o));
    profile.scopus_id = scopus_id(v);
    profile.display_name = str_field(v, "display_name");
    profile.aliases = str_list(v, "display_name_alternatives");
    profile.affiliation = last_known_institution(v);
    profile.affiliation_history = affiliation_history(v);
    let stats = v.get("summary_stats");
    profile.h_index = stats.and_then(|s| u32_field(s, "h_index"));
    profile.i10_index = stats.and_then(|s| u32_field(s, "i10_index"));
    profile.paper_count = u32_field(v, "works_count");
    profile.total_citations = u32_field(v, "cited_by_count");
    profile.research_concepts = research_concepts(v);
    profile.profile_url = profile
        .source_author_id
        .as_ref()
        .map(|id| format!("{ID_PREFIX}{id}"));
    profile.raw = v.clone();
    profile
}
