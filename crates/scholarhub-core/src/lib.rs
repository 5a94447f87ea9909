//! Core library for ScholarHub: paper and researcher models, configuration
//! and the SQLite store the enrichment pipeline writes into.

pub mod config;
pub mod error;
pub mod models;
pub mod storage;

pub use config::{AiConfig, AppConfig, CoreConfig, EnrichmentConfig, SourcesConfig};
pub use error::{ExitCode, HubError, Result};
pub use models::*;

pub use storage::database::{ConnectionPool, Database, open_database, open_in_memory};
pub use storage::repositories::{
    PaperFilter, Repository, SqliteAuthorshipRepository, SqlitePaperRepository,
    SqlitePublicationRepository, SqliteResearcherRepository,
};
pub use storage::store::{EnrichmentStore, PaperEnrichmentUnit};
