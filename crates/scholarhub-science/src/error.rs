use scholarhub_core::HubError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScienceError {
    #[error("invalid DOI: {0}")]
    InvalidDoi(String),

    #[error("invalid ORCID: {0}")]
    InvalidOrcid(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error from {0}: {1}")]
    ApiError(String, String),

    #[error("rate limit from {0}, retry after {1}s")]
    RateLimit(String, u64),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("{source_name} does not support {operation}")]
    Unsupported {
        source_name: &'static str,
        operation: &'static str,
    },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("profile text generation failed: {0}")]
    ProfileText(String),

    #[error("store error: {0}")]
    Store(#[from] HubError),
}

impl ScienceError {
    /// Transport-level failures the pipeline treats as "try the next source".
    pub fn is_source_unavailable(&self) -> bool {
        matches!(
            self,
            Self::Http(_)
                | Self::ApiError(..)
                | Self::RateLimit(..)
                | Self::Parse(_)
                | Self::SourceUnavailable(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ScienceError>;
