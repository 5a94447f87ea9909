use std::collections::HashSet;

use uuid::Uuid;

use crate::error::Result;
use crate::models::{Authorship, DataSource, ExternalPublication, PaperEntity, ResearcherEntity};
use crate::storage::repositories::PaperFilter;

/// Everything one paper enrichment writes, committed as a single unit.
#[derive(Debug, Clone)]
pub struct PaperEnrichmentUnit {
    pub paper: PaperEntity,
    /// Researchers created or backfilled while processing the author list.
    pub researchers: Vec<ResearcherEntity>,
    pub authorships: Vec<Authorship>,
}

/// How the enrichment pipeline reads and writes persisted entities.
pub trait EnrichmentStore: Send + Sync {
    // ─── Papers ────────────────────────────────────────────

    fn find_paper(&self, id: &Uuid) -> Result<Option<PaperEntity>>;

    fn find_paper_by_doi(&self, doi: &str) -> Result<Option<PaperEntity>>;

    fn find_paper_by_external_id(&self, source: DataSource, id: &str) -> Result<Option<PaperEntity>>;

    /// True when a paper other than `except` already holds `id` for `source`.
    fn paper_external_id_claimed(&self, source: DataSource, id: &str, except: &Uuid) -> Result<bool>;

    /// Every stored paper id for `source`.
    fn paper_external_ids(&self, source: DataSource) -> Result<HashSet<String>>;

    fn list_papers(&self, filter: &PaperFilter) -> Result<Vec<PaperEntity>>;

    fn save_paper(&self, paper: &PaperEntity) -> Result<()>;

    // ─── Researchers ───────────────────────────────────────

    fn find_researcher(&self, id: &Uuid) -> Result<Option<ResearcherEntity>>;

    fn find_researcher_by_external_id(
        &self,
        source: DataSource,
        id: &str,
    ) -> Result<Option<ResearcherEntity>>;

    fn find_researcher_by_scopus_id(&self, scopus_id: &str) -> Result<Option<ResearcherEntity>>;

    fn find_researcher_by_name(&self, name: &str) -> Result<Option<ResearcherEntity>>;

    fn list_researchers(&self, limit: Option<usize>) -> Result<Vec<ResearcherEntity>>;

    fn save_researcher(&self, researcher: &ResearcherEntity) -> Result<()>;

    // ─── Authorships ───────────────────────────────────────

    fn authorship_exists(&self, paper_id: &Uuid, researcher_id: &Uuid) -> Result<bool>;

    fn authorships_for_paper(&self, paper_id: &Uuid) -> Result<Vec<Authorship>>;

    fn papers_for_researcher(&self, researcher_id: &Uuid) -> Result<Vec<PaperEntity>>;

    // ─── Publication cache ─────────────────────────────────

    fn external_publications(&self, researcher_id: &Uuid) -> Result<Vec<ExternalPublication>>;

    /// Atomically replaces the researcher's non-imported cache rows.
    fn replace_external_publications(
        &self,
        researcher_id: &Uuid,
        entries: &[ExternalPublication],
    ) -> Result<()>;

    fn mark_external_publication_imported(
        &self,
        researcher_id: &Uuid,
        source_paper_id: &str,
    ) -> Result<bool>;

    // ─── Atomic commits ────────────────────────────────────

    /// Persists the paper, its researchers and authorships in one transaction.
    /// Returns the number of authorships actually created.
    fn commit_paper_enrichment(&self, unit: &PaperEnrichmentUnit) -> Result<usize>;

    fn commit_researcher_enrichment(&self, researcher: &ResearcherEntity) -> Result<()>;
}
