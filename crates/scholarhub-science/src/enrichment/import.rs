use std::sync::Arc;

use scholarhub_core::{
    Authorship, DataSource, EnrichmentStore, PaperEnrichmentUnit, PaperEntity, ResearcherEntity,
};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use super::merge::merge_into_paper;
use super::paper::{PaperResolution, PaperResolver};
use crate::error::{Result, ScienceError};
use crate::sources::PaperSource;
use crate::types::NormalizedPaper;

/// Position index that yields a co-author link.
const CO_AUTHOR_INDEX: usize = 1;

/// The researcher's place in the fetched author list, matched by Semantic
/// Scholar id, then ORCID, then name. Unmatched researchers are co-authors.
fn author_index(fetched: &NormalizedPaper, researcher: &ResearcherEntity) -> usize {
    let ids = &researcher.external_ids;
    let by_s2 = ids.semantic_scholar.as_deref().and_then(|id| {
        fetched
            .authors
            .iter()
            .find(|a| a.source_author_id.as_deref() == Some(id))
    });
    let by_orcid = || {
        ids.orcid.as_deref().and_then(|orcid| {
            fetched
                .authors
                .iter()
                .find(|a| a.orcid.as_deref().is_some_and(|o| o.eq_ignore_ascii_case(orcid)))
        })
    };
    let by_name = || {
        fetched
            .authors
            .iter()
            .find(|a| a.name.trim().eq_ignore_ascii_case(researcher.name.trim()))
    };
    by_s2
        .or_else(by_orcid)
        .or_else(by_name)
        .map_or(CO_AUTHOR_INDEX, |a| a.position)
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportOutcome {
    pub paper_id: Uuid,
    /// False when the paper was already stored.
    pub created: bool,
    pub resolution: Option<PaperResolution>,
}

/// Turns an entry of a researcher's external work list into a stored paper.
pub struct ExternalPaperImporter {
    store: Arc<dyn EnrichmentStore>,
    semantic_scholar: Arc<dyn PaperSource>,
    resolver: Arc<PaperResolver>,
}

impl ExternalPaperImporter {
    pub fn new(
        store: Arc<dyn EnrichmentStore>,
        semantic_scholar: Arc<dyn PaperSource>,
        resolver: Arc<PaperResolver>,
    ) -> Self {
        Self {
            store,
            semantic_scholar,
            resolver,
        }
    }

    fn link(&self, paper: PaperEntity, researcher: &ResearcherEntity, index: usize) -> Result<usize> {
        let mut authorships = Vec::new();
        if !self.store.authorship_exists(&paper.id, &researcher.id)? {
            authorships.push(Authorship::for_position(paper.id, researcher.id, index, &paper.title));
        }
        let unit = PaperEnrichmentUnit {
            paper,
            researchers: Vec::new(),
            authorships,
        };
        Ok(self.store.commit_paper_enrichment(&unit)?)
    }

    pub async fn import_external_paper(
        &self,
        researcher_id: &Uuid,
        source_paper_id: &str,
    ) -> Result<ImportOutcome> {
        let researcher = self
            .store
            .find_researcher(researcher_id)?
            .ok_or_else(|| ScienceError::NotFound(format!("researcher {researcher_id}")))?;

        if let Some(existing) = self
            .store
            .find_paper_by_external_id(DataSource::SemanticScholar, source_paper_id)?
        {
            let paper_id = existing.id;
            self.link(existing, &researcher, CO_AUTHOR_INDEX)?;
            self.store
                .mark_external_publication_imported(&researcher.id, source_paper_id)?;
            info!(paper = %paper_id, researcher = %researcher.id, "external paper already stored");
            return Ok(ImportOutcome {
                paper_id,
                created: false,
                resolution: None,
            });
        }

        let fetched = self
            .semantic_scholar
            .lookup_by_external_id(source_paper_id)
            .await?
            .ok_or_else(|| ScienceError::NotFound(format!("Semantic Scholar paper {source_paper_id}")))?;

        let stored_by_doi = match fetched.doi.as_deref() {
            Some(doi) => self.store.find_paper_by_doi(doi)?,
            None => None,
        };
        let created = stored_by_doi.is_none();
        let mut paper = stored_by_doi.unwrap_or_else(|| PaperEntity::new(fetched.title.clone()));
        merge_into_paper(self.store.as_ref(), &mut paper, &fetched)?;
        let paper_id = paper.id;
        let index = author_index(&fetched, &researcher);
        self.link(paper, &researcher, index)?;

        let resolution = self.resolver.resolve(&paper_id, true).await;
        self.store
            .mark_external_publication_imported(&researcher.id, source_paper_id)?;
        info!(
            paper = %paper_id,
            researcher = %researcher.id,
            matched = resolution.matched,
            "external paper imported"
        );
        Ok(ImportOutcome {
            paper_id,
            created,
            resolution: Some(resolution),
        })
    }
}
