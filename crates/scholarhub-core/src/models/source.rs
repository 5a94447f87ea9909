use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::HubError;

/// External bibliographic services the pipeline pulls data from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    SemanticScholar,
    #[serde(rename = "openalex")]
    OpenAlex,
    Crossref,
    Orcid,
}

impl DataSource {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SemanticScholar => "semantic_scholar",
            Self::OpenAlex => "openalex",
            Self::Crossref => "crossref",
            Self::Orcid => "orcid",
        }
    }

    /// Human-readable label used in failure reasons and CLI output.
    pub const fn label(self) -> &'static str {
        match self {
            Self::SemanticScholar => "Semantic Scholar",
            Self::OpenAlex => "OpenAlex",
            Self::Crossref => "Crossref",
            Self::Orcid => "ORCID",
        }
    }
}

impl std::fmt::Display for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataSource {
    type Err = HubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "semantic_scholar" | "semanticscholar" | "s2" => Ok(Self::SemanticScholar),
            "openalex" => Ok(Self::OpenAlex),
            "crossref" => Ok(Self::Crossref),
            "orcid" => Ok(Self::Orcid),
            other => Err(HubError::ValidationError(format!("unknown data source: {other}"))),
        }
    }
}
