//! ScholarHub Science: bibliographic source adapters (Semantic Scholar,
//! OpenAlex, Crossref, ORCID) and the paper/researcher enrichment pipeline.

pub mod config;
pub mod enrichment;
pub mod error;
pub mod hooks;
pub mod http;
pub mod identifiers;
pub mod sources;
pub mod title;
pub mod types;

#[cfg(test)]
mod test_support;

pub use config::ScienceConfig;
pub use enrichment::{
    BatchStats, ExternalPaperImporter, PaperResolution, PaperResolver, ProfileFacts,
    ProfileTextGenerator, PublicationCache, ResearcherEnricher, ResearcherEnrichment,
};
pub use error::{Result, ScienceError};
pub use hooks::EnrichmentHooks;
pub use types::{AuthorProfile, AuthorQuery, AuthorWork, NormalizedAuthor, NormalizedPaper};
