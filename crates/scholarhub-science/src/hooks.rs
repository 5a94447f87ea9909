//! Auto-enrichment triggers fired after entities are created.
//!
//! Both hooks log and swallow every failure; creation never fails because
//! enrichment did.

use std::sync::Arc;

use scholarhub_core::{PaperEntity, ResearcherEntity};
use tracing::{debug, info, warn};

use crate::config::ScienceConfig;
use crate::enrichment::{PaperResolution, PaperResolver, ResearcherEnricher, ResearcherEnrichment};

pub struct EnrichmentHooks {
    resolver: Arc<PaperResolver>,
    enricher: Arc<ResearcherEnricher>,
    auto_papers: bool,
    auto_researchers: bool,
}

impl EnrichmentHooks {
    pub fn new(
        resolver: Arc<PaperResolver>,
        enricher: Arc<ResearcherEnricher>,
        config: &ScienceConfig,
    ) -> Self {
        Self {
            resolver,
            enricher,
            auto_papers: config.auto_enrich_papers,
            auto_researchers: config.auto_enrich_researchers,
        }
    }

    /// Runs the cascade for a new paper unless disabled or already identified.
    pub async fn on_paper_created(&self, paper: &PaperEntity) -> Option<PaperResolution> {
        if !self.auto_papers {
            debug!(paper = %paper.id, "paper auto-enrichment disabled");
            return None;
        }
        if paper.external_ids.semantic_scholar.is_some() {
            debug!(paper = %paper.id, "paper already identified, not enriching");
            return None;
        }
        let resolution = self.resolver.resolve(&paper.id, false).await;
        if resolution.matched {
            info!(paper = %paper.id, source = ?resolution.source, "auto-enriched paper");
        } else {
            warn!(
                paper = %paper.id,
                reason = resolution.failure_reason.as_deref().unwrap_or_default(),
                errors = ?resolution.errors,
                "auto-enrichment found no match"
            );
        }
        Some(resolution)
    }

    /// Forced enrichment for a researcher with an external id and a thin profile.
    pub async fn on_researcher_created(
        &self,
        researcher: &ResearcherEntity,
    ) -> Option<ResearcherEnrichment> {
        if !self.auto_researchers {
            debug!(researcher = %researcher.id, "researcher auto-enrichment disabled");
            return None;
        }
        let thin = researcher.summary.as_deref().is_none_or(|s| s.trim().is_empty())
            || researcher.research_interests.is_empty();
        if !researcher.has_external_id() || !thin {
            debug!(researcher = %researcher.id, "researcher not eligible for auto-enrichment");
            return None;
        }
        let result = self.enricher.enrich(&researcher.id, true).await;
        if !result.success {
            warn!(researcher = %researcher.id, errors = ?result.errors, "auto-enrichment failed");
        }
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrichment::{ProfileSources, PublicationCache};
    use crate::sources::PaperSource;
    use crate::test_support::{FakePaperSource, FakeProfileSource, FakeWorks, candidate};
    use crate::types::AuthorProfile;
    use scholarhub_core::{DataSource, Database, EnrichmentStore};

    struct Setup {
        db: Arc<Database>,
        s2_papers: Arc<FakePaperSource>,
        openalex: Arc<FakeProfileSource>,
        hooks: EnrichmentHooks,
    }

    fn setup(auto: bool) -> Setup {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let s2_papers = Arc::new(
            FakePaperSource::new(DataSource::SemanticScholar)
                .with_title_hit(candidate(DataSource::SemanticScholar, "Hooked", &["A"])),
        );
        let resolver = Arc::new(PaperResolver::new(
            db.clone(),
            vec![s2_papers.clone() as Arc<dyn PaperSource>],
            0.4,
        ));
        let mut hit = AuthorProfile::empty(DataSource::OpenAlex);
        hit.h_index = Some(1);
        let openalex = Arc::new(FakeProfileSource::new(DataSource::OpenAlex).with_search_hit(hit));
        let sources = ProfileSources {
            semantic_scholar: Arc::new(FakeProfileSource::new(DataSource::SemanticScholar)),
            orcid: Arc::new(FakeProfileSource::new(DataSource::Orcid)),
            openalex: openalex.clone(),
        };
        let cache = PublicationCache::new(db.clone(), Arc::new(FakeWorks::new(Vec::new())), 7, 100);
        let enricher = Arc::new(ResearcherEnricher::new(db.clone(), sources, cache, 30));

        let mut config = ScienceConfig::default();
        config.auto_enrich_papers = auto;
        config.auto_enrich_researchers = auto;
        Setup {
            db,
            s2_papers,
            openalex,
            hooks: EnrichmentHooks::new(resolver, enricher, &config),
        }
    }

    #[tokio::test]
    async fn new_paper_is_resolved() {
        let s = setup(true);
        let paper = PaperEntity::new("Hooked");
        s.db.save_paper(&paper).unwrap();
        let out = s.hooks.on_paper_created(&paper).await.unwrap();
        assert!(out.matched);
    }

    #[tokio::test]
    async fn identified_paper_and_disabled_hooks_do_nothing() {
        let s = setup(true);
        let mut paper = PaperEntity::new("Hooked");
        paper.external_ids.semantic_scholar = Some("known".to_string());
        assert!(s.hooks.on_paper_created(&paper).await.is_none());

        let off = setup(false);
        assert!(off.hooks.on_paper_created(&PaperEntity::new("Hooked")).await.is_none());
        assert_eq!(s.s2_papers.calls() + off.s2_papers.calls(), 0);
    }

    #[tokio::test]
    async fn researcher_needs_an_external_id() {
        let s = setup(true);
        let bare = ResearcherEntity::new("No Ids");
        s.db.save_researcher(&bare).unwrap();
        assert!(s.hooks.on_researcher_created(&bare).await.is_none());

        let mut with_id = ResearcherEntity::new("Has Id");
        with_id.external_ids.openalex = Some("A1".to_string());
        s.db.save_researcher(&with_id).unwrap();
        let out = s.hooks.on_researcher_created(&with_id).await.unwrap();
        assert!(out.success);
        assert!(s.openalex.calls() > 0);
    }

    #[tokio::test]
    async fn complete_researcher_not_enriched() {
        let s = setup(true);
        let mut r = ResearcherEntity::new("Complete");
        r.external_ids.orcid = Some("0000-0002-1825-0097".to_string());
        r.summary = Some("Complete is a researcher.".to_string());
        r.research_interests = vec!["Logic".to_string()];
        assert!(s.hooks.on_researcher_created(&r).await.is_none());
    }

    #[tokio::test]
    async fn missing_paper_is_swallowed() {
        let s = setup(true);
        let out = s.hooks.on_paper_created(&PaperEntity::new("Never saved")).await.unwrap();
        assert!(!out.matched);
        assert!(!out.errors.is_empty());
    }
}
