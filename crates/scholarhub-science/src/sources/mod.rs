//! Adapters for the external bibliographic services.
//!
//! Ordinary absence is `Ok(None)`; transport failures surface as
//! `Err(ScienceError)` and callers treat them as "source unavailable".

use async_trait::async_trait;
use scholarhub_core::DataSource;

use crate::error::{Result, ScienceError};
use crate::types::{AuthorProfile, AuthorQuery, AuthorWork, NormalizedPaper};

pub mod crossref;
pub mod openalex;
pub mod orcid;
pub mod semantic_scholar;

pub use crossref::CrossrefSource;
pub use openalex::OpenAlexSource;
pub use orcid::OrcidSource;
pub use semantic_scholar::SemanticScholarSource;

/// A source the paper cascade can query.
#[async_trait]
pub trait PaperSource: Send + Sync {
    fn name(&self) -> DataSource;

    async fn lookup_by_external_id(&self, id: &str) -> Result<Option<NormalizedPaper>>;

    async fn lookup_by_doi(&self, _doi: &str) -> Result<Option<NormalizedPaper>> {
        Err(ScienceError::Unsupported {
            source_name: self.name().label(),
            operation: "lookup by DOI",
        })
    }

    async fn search_by_title(&self, title: &str) -> Result<Option<NormalizedPaper>>;

    /// True when `search_by_title` already checks title similarity itself.
    fn validates_title_internally(&self) -> bool {
        false
    }
}

/// A source of researcher profiles.
#[async_trait]
pub trait AuthorProfileSource: Send + Sync {
    fn name(&self) -> DataSource;

    /// Profile by the source's own author id.
    async fn fetch_author_profile(&self, author_id: &str) -> Result<Option<AuthorProfile>>;

    async fn fetch_author_by_orcid(&self, _orcid: &str) -> Result<Option<AuthorProfile>> {
        Ok(None)
    }

    async fn search_author(&self, _query: &AuthorQuery) -> Result<Option<AuthorProfile>> {
        Ok(None)
    }
}

/// A source that lists an author's works.
#[async_trait]
pub trait AuthorWorksSource: Send + Sync {
    async fn fetch_author_works(&self, author_id: &str, limit: u32) -> Result<Vec<AuthorWork>>;
}
