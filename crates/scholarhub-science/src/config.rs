use std::time::Duration;

use scholarhub_core::AppConfig;
use serde::{Deserialize, Serialize};

/// Runtime settings for the source adapters and the enrichment pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScienceConfig {
    pub polite_pool_email: Option<String>,
    pub semantic_scholar_api_key: Option<String>,
    pub semantic_scholar_url: String,
    pub openalex_url: String,
    pub crossref_url: String,
    pub orcid_url: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub title_similarity_threshold: f64,
    pub crossref_similarity_threshold: f64,
    pub researcher_freshness_days: i64,
    pub publication_cache_days: i64,
    pub publication_fetch_limit: u32,
    pub auto_enrich_papers: bool,
    pub auto_enrich_researchers: bool,
}

impl Default for ScienceConfig {
    fn default() -> Self {
        Self::from_app_config(&AppConfig::default())
    }
}

impl ScienceConfig {
    pub fn from_app_config(app: &AppConfig) -> Self {
        let sources = &app.sources;
        let enrichment = &app.enrichment;
        Self {
            polite_pool_email: sources.polite_email.clone(),
            semantic_scholar_api_key: sources.semantic_scholar_api_key.clone(),
            semantic_scholar_url: sources.semantic_scholar_url.clone(),
            openalex_url: sources.openalex_url.clone(),
            crossref_url: sources.crossref_url.clone(),
            orcid_url: sources.orcid_url.clone(),
            timeout: Duration::from_secs(sources.timeout_secs),
            max_retries: sources.max_retries,
            title_similarity_threshold: enrichment.title_similarity_threshold,
            crossref_similarity_threshold: enrichment.crossref_similarity_threshold,
            researcher_freshness_days: enrichment.researcher_freshness_days,
            publication_cache_days: enrichment.publication_cache_days,
            publication_fetch_limit: enrichment.publication_fetch_limit,
            auto_enrich_papers: enrichment.auto_enrich_papers,
            auto_enrich_researchers: enrichment.auto_enrich_researchers,
        }
    }

    /// Builds from the file config, then applies environment overrides.
    pub fn from_env_and(app: &AppConfig) -> Self {
        let mut cfg = Self::from_app_config(app);
        cfg.apply_env(|key| std::env::var(key).ok());
        cfg
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty("SEMANTIC_SCHOLAR_API_KEY") {
            self.semantic_scholar_api_key = Some(key);
        }
        if let Some(email) = non_empty("POLITE_POOL_EMAIL") {
            self.polite_pool_email = Some(email);
        }
        if let Some(secs) = non_empty("SCHOLARHUB_HTTP_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.timeout = Duration::from_secs(secs);
        }
        if let Some(threshold) =
            non_empty("SCHOLARHUB_TITLE_SIMILARITY").and_then(|v| v.parse::<f64>().ok())
        {
            self.title_similarity_threshold = threshold.clamp(0.0, 1.0);
        }
        if let Some(flag) = non_empty("SCHOLARHUB_AUTO_ENRICH").and_then(|v| parse_flag(&v)) {
            self.auto_enrich_papers = flag;
            self.auto_enrich_researchers = flag;
        }
    }

    pub fn has_semantic_scholar_key(&self) -> bool {
        self.semantic_scholar_api_key
            .as_deref()
            .is_some_and(|k| !k.trim().is_empty())
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
