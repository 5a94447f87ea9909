use scholarhub_science::ScienceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("unknown AI provider: {0}")]
    UnknownProvider(String),

    #[error("provider {0} needs an endpoint")]
    MissingEndpoint(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{provider} returned {status}: {body}")]
    Api {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("unexpected response from {0}")]
    EmptyResponse(String),
}

impl From<AiError> for ScienceError {
    fn from(e: AiError) -> Self {
        ScienceError::ProfileText(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AiError>;
