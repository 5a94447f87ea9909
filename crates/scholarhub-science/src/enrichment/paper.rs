//! Paper resolution: the fallback cascade over the configured sources.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use scholarhub_core::{
    DataSource, EnrichmentStore, ImportStatus, PaperEnrichmentUnit, PaperEntity, PaperFilter,
};
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::authors::AuthorResolver;
use super::batch::BatchStats;
use super::guard::{GuardDecision, apply_author_guard};
use super::locks::EntityLocks;
use super::merge::merge_into_paper;
use super::push_unique;
use crate::config::ScienceConfig;
use crate::error::{Result, ScienceError};
use crate::sources::{CrossrefSource, OpenAlexSource, PaperSource, SemanticScholarSource};
use crate::title::{clean_title, title_similarity};
use crate::types::NormalizedPaper;

const REASON_TITLE_CHARS: usize = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupStrategy {
    Doi,
    Title,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectKind {
    NotFound,
    TooManyAuthors { count: usize },
    TitleMismatch { similarity: f64 },
    Unavailable { message: String },
}

/// Why one source did not produce the match.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectReason {
    pub source: DataSource,
    pub strategy: LookupStrategy,
    #[serde(flatten)]
    pub kind: RejectKind,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let strategy = match self.strategy {
            LookupStrategy::Doi => "DOI",
            LookupStrategy::Title => "title",
        };
        write!(f, "{} ({strategy}): ", self.source.label())?;
        match &self.kind {
            RejectKind::NotFound => write!(f, "not found"),
            RejectKind::TooManyAuthors { count } => write!(f, "{count} authors"),
            RejectKind::TitleMismatch { similarity } => {
                write!(f, "title similarity {similarity:.2}")
            }
            RejectKind::Unavailable { message } => write!(f, "unavailable: {message}"),
        }
    }
}

/// Outcome of resolving one paper.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PaperResolution {
    pub paper_id: Uuid,
    pub matched: bool,
    /// Already resolved and not forced.
    pub skipped: bool,
    pub source: Option<DataSource>,
    pub fields_updated: Vec<String>,
    pub researchers_created: usize,
    pub researchers_updated: usize,
    pub authorships_created: usize,
    pub failure_reason: Option<String>,
    pub rejections: Vec<RejectReason>,
    pub errors: Vec<String>,
}

impl PaperResolution {
    fn new(paper_id: Uuid) -> Self {
        Self {
            paper_id,
            ..Default::default()
        }
    }

    fn reject(&mut self, source: DataSource, strategy: LookupStrategy, kind: RejectKind) {
        let reason = RejectReason {
            source,
            strategy,
            kind,
        };
        info!(reason = %reason, "source rejected");
        self.rejections.push(reason);
    }
}

/// Builds the failure message naming every source and the strategies it
/// actually ran.
pub fn failure_reason(sources: &[DataSource], rejections: &[RejectReason], cleaned_title: &str) -> String {
    let tried: Vec<String> = sources
        .iter()
        .map(|source| {
            let mut strategies: Vec<&str> = Vec::new();
            for r in rejections.iter().filter(|r| r.source == *source) {
                let label = match r.strategy {
                    LookupStrategy::Doi => "DOI",
                    LookupStrategy::Title => "title",
                };
                if !strategies.contains(&label) {
                    strategies.push(label);
                }
            }
            if strategies.is_empty() {
                source.label().to_string()
            } else {
                format!("{} ({})", source.label(), strategies.join(" + "))
            }
        })
        .collect();
    let title: String = cleaned_title.chars().take(REASON_TITLE_CHARS).collect();
    format!(
        "All services failed. Tried: {}. Cleaned title: '{title}'",
        tried.join(", ")
    )
}

/// Runs the source cascade for stored papers and commits the result.
pub struct PaperResolver {
    store: Arc<dyn EnrichmentStore>,
    sources: Vec<Arc<dyn PaperSource>>,
    title_threshold: f64,
    locks: EntityLocks,
}

impl PaperResolver {
    pub fn new(
        store: Arc<dyn EnrichmentStore>,
        sources: Vec<Arc<dyn PaperSource>>,
        title_threshold: f64,
    ) -> Self {
        Self {
            store,
            sources,
            title_threshold,
            locks: EntityLocks::new(),
        }
    }

    /// Semantic Scholar, then OpenAlex, then Crossref.
    pub fn from_config(store: Arc<dyn EnrichmentStore>, config: &ScienceConfig) -> Result<Self> {
        let sources: Vec<Arc<dyn PaperSource>> = vec![
            Arc::new(SemanticScholarSource::new(config)?),
            Arc::new(OpenAlexSource::new(config)?),
            Arc::new(CrossrefSource::new(config)?),
        ];
        Ok(Self::new(store, sources, config.title_similarity_threshold))
    }

    pub fn store(&self) -> &Arc<dyn EnrichmentStore> {
        &self.store
    }

    /// Never fails: every problem lands in the returned resolution.
    pub async fn resolve(&self, paper_id: &Uuid, force: bool) -> PaperResolution {
        let _guard = self.locks.lock(*paper_id).await;
        let mut resolution = PaperResolution::new(*paper_id);
        if let Err(e) = self.resolve_locked(paper_id, force, &mut resolution).await {
            error!(paper = %paper_id, error = %e, "paper resolution failed");
            resolution.matched = false;
            resolution.errors.push(e.to_string());
        }
        resolution
    }

    pub async fn resolve_batch(&self, filter: &PaperFilter, force: bool) -> BatchStats {
        let mut stats = BatchStats::default();
        let papers = match self.store.list_papers(filter) {
            Ok(papers) => papers,
            Err(e) => {
                error!(error = %e, "listing papers failed");
                stats.failures.push(e.to_string());
                return stats;
            }
        };
        info!(count = papers.len(), force, "resolving papers");
        for paper in &papers {
            let resolution = self.resolve(&paper.id, force).await;
            stats.record_paper(&resolution);
        }
        info!(
            total = stats.total,
            succeeded = stats.succeeded,
            failed = stats.failed,
            skipped = stats.skipped,
            "paper batch finished"
        );
        stats
    }

    async fn resolve_locked(
        &self,
        paper_id: &Uuid,
        force: bool,
        resolution: &mut PaperResolution,
    ) -> Result<()> {
        let mut paper = self
            .store
            .find_paper(paper_id)?
            .ok_or_else(|| ScienceError::NotFound(format!("paper {paper_id}")))?;

        if !force && paper.import_status == ImportStatus::Success {
            info!(paper = %paper.id, "already resolved, skipping");
            resolution.skipped = true;
            resolution.matched = true;
            resolution.source = paper.data_source;
            return Ok(());
        }

        paper.last_import_attempt = Some(Utc::now());
        let cleaned = clean_title(&paper.title);

        for source in &self.sources {
            if let Some(candidate) = self.candidate(source.as_ref(), &paper, &cleaned, resolution).await {
                return self.accept(paper, candidate, resolution);
            }
        }

        let names: Vec<DataSource> = self.sources.iter().map(|s| s.name()).collect();
        let reason = failure_reason(&names, &resolution.rejections, &cleaned);
        error!(paper = %paper.id, title = %paper.title, "no source matched");
        paper.import_status = ImportStatus::Failed;
        paper.import_failure_reason = Some(reason.clone());
        paper.updated_at = Utc::now();
        self.store.save_paper(&paper)?;
        resolution.failure_reason = Some(reason);
        Ok(())
    }

    /// The accepted candidate from one source, or `None` after recording why not.
    async fn candidate(
        &self,
        source: &dyn PaperSource,
        paper: &PaperEntity,
        cleaned: &str,
        resolution: &mut PaperResolution,
    ) -> Option<NormalizedPaper> {
        let name = source.name();
        let mut found = None;

        if let Some(doi) = paper.doi.as_deref() {
            match source.lookup_by_doi(doi).await {
                Ok(Some(hit)) => found = Some((hit, LookupStrategy::Doi)),
                Ok(None) => resolution.reject(name, LookupStrategy::Doi, RejectKind::NotFound),
                Err(ScienceError::Unsupported { .. }) => {}
                Err(e) => {
                    warn!(source = %name, error = %e, "DOI lookup failed");
                    resolution.reject(
                        name,
                        LookupStrategy::Doi,
                        RejectKind::Unavailable {
                            message: e.to_string(),
                        },
                    );
                    return None;
                }
            }
        }

        if found.is_none() {
            match source.search_by_title(cleaned).await {
                Ok(Some(hit)) => found = Some((hit, LookupStrategy::Title)),
                Ok(None) => {
                    resolution.reject(name, LookupStrategy::Title, RejectKind::NotFound);
                    return None;
                }
                Err(e) => {
                    warn!(source = %name, error = %e, "title search failed");
                    resolution.reject(
                        name,
                        LookupStrategy::Title,
                        RejectKind::Unavailable {
                            message: e.to_string(),
                        },
                    );
                    return None;
                }
            }
        }

        let (mut hit, strategy) = found?;
        if let GuardDecision::Reject { count } = apply_author_guard(&mut hit) {
            resolution.reject(name, strategy, RejectKind::TooManyAuthors { count });
            return None;
        }

        if strategy == LookupStrategy::Title && !source.validates_title_internally() {
            let similarity = title_similarity(&paper.title, &hit.title);
            if similarity < self.title_threshold {
                resolution.reject(name, strategy, RejectKind::TitleMismatch { similarity });
                return None;
            }
        }

        info!(source = %name, ?strategy, title = %hit.title, "candidate accepted");
        Some(hit)
    }

    fn accept(
        &self,
        mut paper: PaperEntity,
        candidate: NormalizedPaper,
        resolution: &mut PaperResolution,
    ) -> Result<()> {
        let store = self.store.as_ref();
        let fields = merge_into_paper(store, &mut paper, &candidate)?;
        for field in fields {
            push_unique(&mut resolution.fields_updated, field);
        }

        let mut authors = AuthorResolver::new(store, candidate.source);
        authors.process(&paper, &candidate.authors)?;
        let outcome = authors.finish();

        paper.import_status = ImportStatus::Success;
        paper.data_source = Some(candidate.source);
        paper.import_failure_reason = None;
        paper.updated_at = Utc::now();

        let unit = PaperEnrichmentUnit {
            paper,
            researchers: outcome.researchers,
            authorships: outcome.authorships,
        };
        let created = self.store.commit_paper_enrichment(&unit)?;

        resolution.matched = true;
        resolution.source = Some(candidate.source);
        resolution.researchers_created = outcome.created;
        resolution.researchers_updated = outcome.updated;
        resolution.authorships_created = created;
        info!(
            paper = %unit.paper.id,
            source = %candidate.source,
            authorships = created,
            "paper resolved"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakePaperSource, candidate};
    use scholarhub_core::Database;

    const TITLE: &str = "Algorithmic Management and Worker Autonomy";

    fn abstract_80() -> String {
        "Platform work is coordinated by software that allocates, rates and disciplines us.".to_string()
    }

    fn resolver(
        db: &Arc<Database>,
        sources: Vec<Arc<FakePaperSource>>,
    ) -> PaperResolver {
        let sources = sources
            .into_iter()
            .map(|s| s as Arc<dyn PaperSource>)
            .collect();
        PaperResolver::new(db.clone(), sources, 0.4)
    }

    fn stored(db: &Database, paper: PaperEntity) -> Uuid {
        db.save_paper(&paper).unwrap();
        paper.id
    }

    #[tokio::test]
    async fn title_search_scenario() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let mut hit = candidate(
            DataSource::SemanticScholar,
            "Algorithmic management and worker autonomy",
            &["Alex Wood", "Mark Graham", "Vili Lehdonvirta"],
        );
        hit.abstract_text = Some(abstract_80());
        hit.source_id = Some("s2-am".to_string());
        let s2 = Arc::new(FakePaperSource::new(DataSource::SemanticScholar).with_title_hit(hit));
        let openalex = Arc::new(FakePaperSource::new(DataSource::OpenAlex));
        let resolver = resolver(&db, vec![s2, openalex.clone()]);
        let id = stored(&db, PaperEntity::new(TITLE));

        let r = resolver.resolve(&id, false).await;
        assert!(r.matched, "{r:?}");
        assert_eq!(r.source, Some(DataSource::SemanticScholar));
        assert_eq!(r.authorships_created, 3);
        assert_eq!(r.researchers_created, 3);
        assert_eq!(openalex.calls(), 0);

        let paper = db.find_paper(&id).unwrap().unwrap();
        assert_eq!(paper.import_status, ImportStatus::Success);
        assert_eq!(paper.abstract_text.as_deref(), Some(abstract_80().as_str()));
        assert_eq!(paper.external_ids.semantic_scholar.as_deref(), Some("s2-am"));
        assert!(paper.last_import_attempt.is_some());
        assert_eq!(db.authorships_for_paper(&id).unwrap().len(), 3);
    }

    #[tokio::test]
    async fn oversized_author_list_falls_through() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let names: Vec<String> = (0..75).map(|i| format!("Member {i}")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let huge = candidate(DataSource::SemanticScholar, TITLE, &refs);
        let s2 = Arc::new(FakePaperSource::new(DataSource::SemanticScholar).with_title_hit(huge));
        let openalex = Arc::new(
            FakePaperSource::new(DataSource::OpenAlex)
                .with_title_hit(candidate(DataSource::OpenAlex, TITLE, &["Alex Wood"])),
        );
        let resolver = resolver(&db, vec![s2, openalex.clone()]);
        let id = stored(&db, PaperEntity::new(TITLE));

        let r = resolver.resolve(&id, false).await;
        assert_eq!(r.source, Some(DataSource::OpenAlex));
        assert_eq!(openalex.calls(), 1);
        assert_eq!(
            r.rejections[0].kind,
            RejectKind::TooManyAuthors { count: 75 }
        );
        assert_eq!(db.list_researchers(None).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn mid_sized_list_keeps_first_author_only() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let names: Vec<String> = (0..20).map(|i| format!("Member {i}")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let s2 = Arc::new(
            FakePaperSource::new(DataSource::SemanticScholar)
                .with_title_hit(candidate(DataSource::SemanticScholar, TITLE, &refs)),
        );
        let resolver = resolver(&db, vec![s2]);
        let id = stored(&db, PaperEntity::new(TITLE));

        let r = resolver.resolve(&id, false).await;
        assert!(r.matched);
        assert_eq!(r.authorships_created, 1);
    }

    #[tokio::test]
    async fn dissimilar_title_rejected_unless_source_validates() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let wrong = candidate(DataSource::SemanticScholar, "Protein folding with transformers", &["X"]);
        let s2 = Arc::new(FakePaperSource::new(DataSource::SemanticScholar).with_title_hit(wrong));
        let crossref = Arc::new(
            FakePaperSource::new(DataSource::Crossref)
                .validating_titles()
                .with_title_hit(candidate(DataSource::Crossref, "Worker autonomy, revisited", &["Y"])),
        );
        let resolver = resolver(&db, vec![s2, crossref]);
        let id = stored(&db, PaperEntity::new(TITLE));

        let r = resolver.resolve(&id, false).await;
        assert_eq!(r.source, Some(DataSource::Crossref));
        assert!(matches!(r.rejections[0].kind, RejectKind::TitleMismatch { .. }));
    }

    #[tokio::test]
    async fn doi_match_skips_title_check() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let mut hit = candidate(DataSource::OpenAlex, "A completely different registry title", &["Z"]);
        hit.doi = Some("10.1/am".to_string());
        let s2 = Arc::new(FakePaperSource::new(DataSource::SemanticScholar).failing());
        let openalex = Arc::new(FakePaperSource::new(DataSource::OpenAlex).with_doi("10.1/am", hit));
        let resolver = resolver(&db, vec![s2.clone(), openalex]);
        let id = stored(&db, PaperEntity::new(TITLE).with_doi("10.1/am"));

        let r = resolver.resolve(&id, false).await;
        assert_eq!(r.source, Some(DataSource::OpenAlex));
        assert_eq!(s2.calls(), 1);
        assert!(matches!(r.rejections[0].kind, RejectKind::Unavailable { .. }));
    }

    #[tokio::test]
    async fn unsupported_doi_lookup_falls_back_to_title() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let crossref = Arc::new(
            FakePaperSource::new(DataSource::Crossref)
                .without_doi_lookup()
                .with_title_hit(candidate(DataSource::Crossref, TITLE, &["A"])),
        );
        let resolver = resolver(&db, vec![crossref]);
        let id = stored(&db, PaperEntity::new(TITLE).with_doi("10.1/zz"));

        let r = resolver.resolve(&id, false).await;
        assert!(r.matched);
        assert!(r.rejections.is_empty());
    }

    #[tokio::test]
    async fn exhausted_cascade_records_reason() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let sources = vec![
            Arc::new(FakePaperSource::new(DataSource::SemanticScholar)),
            Arc::new(FakePaperSource::new(DataSource::OpenAlex).failing()),
            Arc::new(FakePaperSource::new(DataSource::Crossref)),
        ];
        let resolver = resolver(&db, sources);
        let id = stored(&db, PaperEntity::new("Lost paper..."));

        let r = resolver.resolve(&id, false).await;
        assert!(!r.matched);
        let expected = "All services failed. Tried: Semantic Scholar (title), OpenAlex (title), \
                        Crossref (title). Cleaned title: 'Lost paper'";
        assert_eq!(r.failure_reason.as_deref(), Some(expected));

        let paper = db.find_paper(&id).unwrap().unwrap();
        assert_eq!(paper.import_status, ImportStatus::Failed);
        assert_eq!(paper.import_failure_reason.as_deref(), Some(expected));
        assert!(paper.last_import_attempt.is_some());
    }

    #[tokio::test]
    async fn failure_reason_lists_only_strategies_that_ran() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let sources = vec![
            Arc::new(FakePaperSource::new(DataSource::SemanticScholar).failing()),
            Arc::new(FakePaperSource::new(DataSource::OpenAlex)),
        ];
        let resolver = resolver(&db, sources);
        let id = stored(&db, PaperEntity::new("Lost paper").with_doi("10.1/lost"));

        let r = resolver.resolve(&id, false).await;
        assert!(!r.matched);
        let expected = "All services failed. Tried: Semantic Scholar (DOI), OpenAlex (DOI + title). \
                        Cleaned title: 'Lost paper'";
        assert_eq!(r.failure_reason.as_deref(), Some(expected));
    }

    #[tokio::test]
    async fn rerun_is_idempotent_and_skips_when_not_forced() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let mut hit = candidate(DataSource::SemanticScholar, TITLE, &["Alex Wood", "Mark Graham"]);
        hit.source_id = Some("s2-am".to_string());
        let s2 = Arc::new(FakePaperSource::new(DataSource::SemanticScholar).with_title_hit(hit));
        let resolver = resolver(&db, vec![s2.clone()]);
        let id = stored(&db, PaperEntity::new(TITLE));

        resolver.resolve(&id, false).await;
        let skipped = resolver.resolve(&id, false).await;
        assert!(skipped.skipped);
        assert_eq!(s2.calls(), 1);

        let forced = resolver.resolve(&id, true).await;
        assert!(forced.matched);
        assert_eq!(forced.authorships_created, 0);
        assert_eq!(forced.researchers_created, 0);
        assert_eq!(db.authorships_for_paper(&id).unwrap().len(), 2);
        assert_eq!(db.list_researchers(None).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn missing_paper_reported_not_raised() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let resolver = resolver(&db, Vec::new());
        let r = resolver.resolve(&Uuid::now_v7(), true).await;
        assert!(!r.matched);
        assert_eq!(r.errors.len(), 1);
    }

    #[tokio::test]
    async fn batch_counts_outcomes() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let s2 = Arc::new(
            FakePaperSource::new(DataSource::SemanticScholar)
                .with_title_hit(candidate(DataSource::SemanticScholar, TITLE, &["A"])),
        );
        let resolver = resolver(&db, vec![s2]);
        stored(&db, PaperEntity::new(TITLE));
        stored(&db, PaperEntity::new("Unrelated zoology survey"));

        let stats = resolver.resolve_batch(&PaperFilter::default(), false).await;
        assert_eq!(stats.total, 2);
        assert_eq!(stats.succeeded, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.by_source.get("semantic_scholar"), Some(&1));
    }
}
