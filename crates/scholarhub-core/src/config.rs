use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Root application configuration, loaded from `~/.config/scholarhub/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub core: CoreConfig,
    pub sources: SourcesConfig,
    pub enrichment: EnrichmentConfig,
    pub ai: AiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub data_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<String>,
}

/// Connection settings shared by every external bibliographic source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// Sent as `mailto` to OpenAlex and Crossref to join their polite pools.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polite_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_scholar_api_key: Option<String>,
    pub semantic_scholar_url: String,
    pub openalex_url: String,
    pub crossref_url: String,
    pub orcid_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    /// Minimum Jaccard similarity for a title-searched candidate.
    pub title_similarity_threshold: f64,
    /// Threshold used by Crossref when it validates its own search hits.
    pub crossref_similarity_threshold: f64,
    /// Researchers enriched more recently than this are skipped unless forced.
    pub researcher_freshness_days: i64,
    pub publication_cache_days: i64,
    pub publication_fetch_limit: u32,
    pub auto_enrich_papers: bool,
    pub auto_enrich_researchers: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// `"openai"`, `"openrouter"`, `"anthropic"`, `"custom"` or `"none"`.
    pub provider: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    pub api_key_env: String,
    pub max_tokens: u32,
    pub temperature: f64,
}

// ─── Defaults ──────────────────────────────────────────────

impl Default for CoreConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("scholarhub");

        Self {
            data_path: data_dir.to_string_lossy().to_string(),
            database_path: None,
        }
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            polite_email: None,
            semantic_scholar_api_key: None,
            semantic_scholar_url: "https://api.semanticscholar.org/graph/v1".to_string(),
            openalex_url: "https://api.openalex.org".to_string(),
            crossref_url: "https://api.crossref.org".to_string(),
            orcid_url: "https://pub.orcid.org/v3.0".to_string(),
            timeout_secs: 30,
            max_retries: 3,
        }
    }
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            title_similarity_threshold: 0.4,
            crossref_similarity_threshold: 0.5,
            researcher_freshness_days: 30,
            publication_cache_days: 7,
            publication_fetch_limit: 100,
            auto_enrich_papers: true,
            auto_enrich_researchers: true,
        }
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            endpoint: None,
            api_key_env: "OPENAI_API_KEY".to_string(),
            max_tokens: 200,
            temperature: 0.7,
        }
    }
}

// ─── Load / Save ───────────────────────────────────────────

impl AppConfig {
    /// Standard config file path: `~/.config/scholarhub/config.toml`
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("SCHOLARHUB_CONFIG") {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("scholarhub")
            .join("config.toml")
    }

    /// Load config from disk, falling back to defaults if file doesn't exist.
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path();
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let toml_str = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_str)?;
        Ok(())
    }

    /// Path to the SQLite database file.
    pub fn database_path(&self) -> PathBuf {
        match &self.core.database_path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(&self.core.data_path).join("scholarhub.db"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.enrichment.title_similarity_threshold, 0.4);
        assert_eq!(cfg.enrichment.crossref_similarity_threshold, 0.5);
        assert_eq!(cfg.enrichment.publication_cache_days, 7);
        assert!(!cfg.core.data_path.is_empty());
    }

    #[test]
    fn test_config_toml_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let mut cfg = AppConfig::default();
        cfg.sources.polite_email = Some("lab@example.org".to_string());
        cfg.enrichment.researcher_freshness_days = 14;
        cfg.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.sources.polite_email.as_deref(), Some("lab@example.org"));
        assert_eq!(loaded.enrichment.researcher_freshness_days, 14);
        assert_eq!(loaded.ai.provider, cfg.ai.provider);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[enrichment]\ntitle_similarity_threshold = 0.6\n").unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.enrichment.title_similarity_threshold, 0.6);
        assert_eq!(loaded.enrichment.publication_fetch_limit, 100);
        assert_eq!(loaded.sources.max_retries, 3);
    }

    #[test]
    fn test_load_nonexistent_returns_default() {
        let cfg =
            AppConfig::load_from(Path::new("/tmp/nonexistent_scholarhub_config.toml")).unwrap();
        assert_eq!(cfg.sources.openalex_url, "https://api.openalex.org");
    }

    #[test]
    fn test_database_path_override() {
        let mut cfg = AppConfig::default();
        assert!(cfg.database_path().ends_with("scholarhub.db"));
        cfg.core.database_path = Some("/data/hub.sqlite".to_string());
        assert_eq!(cfg.database_path(), PathBuf::from("/data/hub.sqlite"));
    }
}
