use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use scholarhub_core::{DataSource, EnrichmentStore, ExternalPublication, PaperEntity, ResearcherEntity};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Result, ScienceError};
use crate::sources::AuthorWorksSource;

/// A researcher's papers in the store plus cached works not yet imported.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResearcherPublications {
    pub papers: Vec<PaperEntity>,
    pub external: Vec<ExternalPublication>,
}

/// Keeps a per-researcher cache of Semantic Scholar works.
pub struct PublicationCache {
    store: Arc<dyn EnrichmentStore>,
    works: Arc<dyn AuthorWorksSource>,
    max_age_days: i64,
    fetch_limit: u32,
}

impl PublicationCache {
    pub fn new(
        store: Arc<dyn EnrichmentStore>,
        works: Arc<dyn AuthorWorksSource>,
        max_age_days: i64,
        fetch_limit: u32,
    ) -> Self {
        Self {
            store,
            works,
            max_age_days,
            fetch_limit,
        }
    }

    /// Stored papers and external works, refreshing the cache when stale or forced.
    ///
    /// A failed refresh falls back to whatever rows exist, stale or not.
    pub async fn get_publications(
        &self,
        researcher: &ResearcherEntity,
        force_refresh: bool,
    ) -> Result<ResearcherPublications> {
        let papers = self.store.papers_for_researcher(&researcher.id)?;
        let cached: Vec<ExternalPublication> = self
            .store
            .external_publications(&researcher.id)?
            .into_iter()
            .filter(|p| !p.is_imported)
            .collect();

        let now = Utc::now();
        let fresh = !cached.is_empty() && cached.iter().all(|p| p.is_fresh(now, self.max_age_days));
        if fresh && !force_refresh {
            debug!(researcher = %researcher.id, count = cached.len(), "publication cache fresh");
            return Ok(ResearcherPublications {
                papers,
                external: cached,
            });
        }

        let external = match self.refresh(researcher).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(researcher = %researcher.id, error = %e, "publication refresh failed, serving cache");
                cached
            }
        };
        Ok(ResearcherPublications { papers, external })
    }

    /// Refetches the work list and atomically replaces the non-imported rows.
    pub async fn refresh(&self, researcher: &ResearcherEntity) -> Result<Vec<ExternalPublication>> {
        let Some(author_id) = researcher.external_ids.semantic_scholar.as_deref() else {
            return Err(ScienceError::NotFound(format!(
                "no Semantic Scholar id for researcher {}",
                researcher.id
            )));
        };

        let works = self.works.fetch_author_works(author_id, self.fetch_limit).await?;
        let stored = self.store.paper_external_ids(DataSource::SemanticScholar)?;
        let now = Utc::now();
        let mut seen = HashSet::new();
        let entries: Vec<ExternalPublication> = works
            .into_iter()
            .filter(|w| !stored.contains(&w.source_paper_id))
            .filter(|w| seen.insert(w.source_paper_id.clone()))
            .map(|w| ExternalPublication {
                researcher_id: researcher.id,
                source_paper_id: w.source_paper_id,
                title: w.title,
                year: w.year,
                venue: w.venue,
                citation_count: w.citation_count,
                doi: w.doi,
                is_imported: false,
                last_fetched: now,
            })
            .collect();

        self.store.replace_external_publications(&researcher.id, &entries)?;
        info!(researcher = %researcher.id, count = entries.len(), "publication cache refreshed");
        Ok(entries)
    }
}
