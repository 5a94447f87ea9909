use thiserror::Error;

/// All errors that can occur in scholarhub-core.
#[derive(Debug, Error)]
pub enum HubError {
    #[error("Paper not found: {0}")]
    PaperNotFound(String),

    #[error("Researcher not found: {0}")]
    ResearcherNotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Unique constraint conflict on {field}: {value}")]
    UniqueConflict { field: String, value: String },

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Migration error at version {version}: {message}")]
    Migration { version: u32, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(rusqlite::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl From<rusqlite::Error> for HubError {
    fn from(e: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(code, Some(message)) = &e
            && code.code == rusqlite::ErrorCode::ConstraintViolation
            && message.starts_with("UNIQUE")
        {
            let field = message
                .split_once(':')
                .map(|(_, cols)| cols.trim().to_string())
                .unwrap_or_default();
            return HubError::UniqueConflict {
                field,
                value: message.clone(),
            };
        }
        HubError::Database(e)
    }
}

/// Exit codes used by the CLI.
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    NotFound = 2,
    InvalidArgs = 3,
    NetworkError = 6,
    Conflict = 7,
}

pub type Result<T> = std::result::Result<T, HubError>;
