//! Researcher enrichment: fetch every profile source, merge by field
//! priority, write profile text and score, then commit.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use futures::StreamExt;
use futures::stream;
use scholarhub_core::{
    AffiliationRecord, DataSource, EnrichmentStore, ResearchConcept, ResearcherEntity,
    placeholder_avatar_url,
};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::batch::BatchStats;
use super::locks::EntityLocks;
use super::profile::{ProfileFacts, ProfileTextGenerator, template_profile_text};
use super::publications::PublicationCache;
use super::push_unique;
use super::quality::quality_score;
use crate::config::ScienceConfig;
use crate::error::{Result, ScienceError};
use crate::sources::{AuthorProfileSource, OpenAlexSource, OrcidSource, SemanticScholarSource};
use crate::types::{AuthorProfile, AuthorQuery};

const MAX_INTERESTS: usize = 15;
const INTERESTS_PER_SOURCE: usize = 10;
const MAX_CONCEPTS: usize = 10;
const PROFILE_INTERESTS: usize = 5;
const BATCH_CONCURRENCY: usize = 4;
const NOT_FOUND_ANYWHERE: &str = "Not found in any data source";

/// What each source returned for one researcher.
#[derive(Debug, Clone, Default)]
pub struct SourceProfiles {
    pub semantic_scholar: Option<AuthorProfile>,
    pub orcid: Option<AuthorProfile>,
    pub openalex: Option<AuthorProfile>,
}

impl SourceProfiles {
    pub fn is_empty(&self) -> bool {
        self.semantic_scholar.is_none() && self.orcid.is_none() && self.openalex.is_none()
    }

    /// Sources that returned data, in fetch order.
    pub fn sources_used(&self) -> Vec<DataSource> {
        self.iter().map(|p| p.source).collect()
    }

    fn iter(&self) -> impl Iterator<Item = &AuthorProfile> {
        [&self.semantic_scholar, &self.orcid, &self.openalex]
            .into_iter()
            .flatten()
    }
}

/// Field deltas produced by [`merge_profiles`]. `None` leaves a field alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResearcherPatch {
    pub orcid: Option<String>,
    pub semantic_scholar_id: Option<String>,
    pub openalex_id: Option<String>,
    pub scopus_id: Option<String>,
    pub aliases: Option<BTreeSet<String>>,
    pub affiliation: Option<String>,
    pub current_position: Option<String>,
    pub affiliation_history: Option<Vec<AffiliationRecord>>,
    pub h_index: Option<u32>,
    pub i10_index: Option<u32>,
    pub paper_count: Option<u32>,
    pub total_citations: Option<u32>,
    pub research_interests: Option<Vec<String>>,
    pub research_concepts: Option<Vec<ResearchConcept>>,
    pub primary_research_area: Option<String>,
    pub url: Option<String>,
    pub raw_data: Map<String, Value>,
}

fn set_if<T: PartialEq>(field: &mut T, value: Option<T>, name: &str, updated: &mut Vec<String>) {
    if let Some(value) = value {
        if *field != value {
            *field = value;
            updated.push(name.to_string());
        }
    }
}

fn set_opt<T: PartialEq>(
    field: &mut Option<T>,
    value: Option<T>,
    name: &str,
    updated: &mut Vec<String>,
) {
    if let Some(value) = value {
        if field.as_ref() != Some(&value) {
            *field = Some(value);
            updated.push(name.to_string());
        }
    }
}

impl ResearcherPatch {
    /// Applies the patch, returning the names of the fields that changed.
    pub fn apply(self, r: &mut ResearcherEntity) -> Vec<String> {
        let mut updated = Vec::new();
        let ids = &mut r.external_ids;
        set_opt(&mut ids.orcid, self.orcid, "orcid", &mut updated);
        set_opt(&mut ids.semantic_scholar, self.semantic_scholar_id, "semantic_scholar_id", &mut updated);
        set_opt(&mut ids.openalex, self.openalex_id, "openalex_id", &mut updated);
        set_opt(&mut ids.scopus, self.scopus_id, "scopus_id", &mut updated);
        set_if(&mut r.aliases, self.aliases, "aliases", &mut updated);
        set_opt(&mut r.affiliation, self.affiliation, "affiliation", &mut updated);
        set_opt(&mut r.current_position, self.current_position, "current_position", &mut updated);
        set_if(&mut r.affiliation_history, self.affiliation_history, "affiliation_history", &mut updated);
        set_if(&mut r.metrics.h_index, self.h_index, "h_index", &mut updated);
        set_if(&mut r.metrics.i10_index, self.i10_index, "i10_index", &mut updated);
        set_if(&mut r.metrics.paper_count, self.paper_count, "paper_count", &mut updated);
        set_if(&mut r.metrics.total_citations, self.total_citations, "total_citations", &mut updated);
        set_if(&mut r.research_interests, self.research_interests, "research_interests", &mut updated);
        set_if(&mut r.research_concepts, self.research_concepts, "research_concepts", &mut updated);
        set_opt(&mut r.primary_research_area, self.primary_research_area, "primary_research_area", &mut updated);
        set_opt(&mut r.url, self.url, "url", &mut updated);
        if !self.raw_data.is_empty() {
            r.raw_data.extend(self.raw_data);
        }
        updated
    }
}

/// ORCID keywords, then OpenAlex concept names; case-insensitive dedup, capped.
pub fn extract_interests(orcid: Option<&AuthorProfile>, openalex: Option<&AuthorProfile>) -> Vec<String> {
    let from_orcid = orcid
        .into_iter()
        .flat_map(|p| p.research_interests.iter().take(INTERESTS_PER_SOURCE).cloned());
    let from_openalex = openalex.into_iter().flat_map(|p| {
        p.research_concepts
            .iter()
            .take(INTERESTS_PER_SOURCE)
            .map(|c| c.concept.clone())
    });

    let mut seen = BTreeSet::new();
    from_orcid
        .chain(from_openalex)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty() && seen.insert(s.to_lowercase()))
        .take(MAX_INTERESTS)
        .collect()
}

fn only_if_unset(current: Option<&str>, value: Option<String>) -> Option<String> {
    match current {
        Some(_) => None,
        None => value,
    }
}

fn max_reported(values: impl Iterator<Item = Option<u32>>) -> Option<u32> {
    values.flatten().max()
}

/// Pure merge of the fetched profiles into a patch for `r`.
pub fn merge_profiles(r: &ResearcherEntity, profiles: &SourceProfiles) -> ResearcherPatch {
    let s2 = profiles.semantic_scholar.as_ref();
    let orcid = profiles.orcid.as_ref();
    let oa = profiles.openalex.as_ref();
    let ids = &r.external_ids;
    let mut patch = ResearcherPatch::default();

    patch.orcid = only_if_unset(
        ids.orcid.as_deref(),
        orcid
            .and_then(|p| p.orcid.clone())
            .or_else(|| oa.and_then(|p| p.orcid.clone()))
            .or_else(|| s2.and_then(|p| p.orcid.clone())),
    );
    patch.semantic_scholar_id = only_if_unset(
        ids.semantic_scholar.as_deref(),
        s2.and_then(|p| p.source_author_id.clone()),
    );
    patch.openalex_id = only_if_unset(ids.openalex.as_deref(), oa.and_then(|p| p.source_author_id.clone()));
    patch.scopus_id = only_if_unset(ids.scopus.as_deref(), oa.and_then(|p| p.scopus_id.clone()));

    let mut aliases = r.aliases.clone();
    for profile in profiles.iter() {
        aliases.extend(
            profile
                .aliases
                .iter()
                .map(|a| a.trim())
                .filter(|a| !a.is_empty())
                .map(str::to_string),
        );
    }
    if let Some(name) = oa.and_then(|p| p.display_name.as_deref()) {
        if name != r.name {
            aliases.insert(name.to_string());
        }
    }
    if aliases != r.aliases {
        patch.aliases = Some(aliases);
    }

    patch.affiliation = only_if_unset(
        r.affiliation.as_deref(),
        [orcid, oa, s2]
            .into_iter()
            .flatten()
            .find_map(|p| p.affiliation.clone()),
    );
    patch.current_position = only_if_unset(
        r.current_position.as_deref(),
        orcid.and_then(|p| p.current_position.clone()),
    );

    let history: Vec<AffiliationRecord> = [orcid, oa]
        .into_iter()
        .flatten()
        .flat_map(|p| p.affiliation_history.iter().cloned())
        .collect();
    if !history.is_empty() {
        patch.affiliation_history = Some(history);
    }

    patch.h_index = oa.and_then(|p| p.h_index).or_else(|| s2.and_then(|p| p.h_index));
    patch.i10_index = oa.and_then(|p| p.i10_index);
    patch.paper_count = max_reported(profiles.iter().map(|p| p.paper_count));
    patch.total_citations = max_reported(profiles.iter().map(|p| p.total_citations));

    let interests = extract_interests(orcid, oa);
    if !interests.is_empty() {
        patch.research_interests = Some(interests);
    }

    let concepts: Vec<ResearchConcept> = oa
        .map(|p| p.research_concepts.iter().take(MAX_CONCEPTS).cloned().collect())
        .unwrap_or_default();
    if let Some(top) = concepts.first() {
        patch.primary_research_area =
            only_if_unset(r.primary_research_area.as_deref(), Some(top.concept.clone()));
    }
    if !concepts.is_empty() {
        patch.research_concepts = Some(concepts);
    }

    patch.url = only_if_unset(
        r.url.as_deref(),
        s2.and_then(|p| p.homepage.clone().or_else(|| p.profile_url.clone())),
    );

    for profile in profiles.iter() {
        if !profile.raw.is_null() {
            patch
                .raw_data
                .insert(profile.source.as_str().to_string(), profile.raw.clone());
        }
    }
    patch
}

/// Outcome of enriching one researcher.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResearcherEnrichment {
    pub researcher_id: Uuid,
    pub success: bool,
    /// False when skipped as recently enriched.
    pub enriched: bool,
    pub sources_used: Vec<DataSource>,
    pub fields_updated: Vec<String>,
    pub data_quality_score: u8,
    pub publications_stored: usize,
    pub errors: Vec<String>,
}

/// The three profile sources the enricher queries.
#[derive(Clone)]
pub struct ProfileSources {
    pub semantic_scholar: Arc<dyn AuthorProfileSource>,
    pub orcid: Arc<dyn AuthorProfileSource>,
    pub openalex: Arc<dyn AuthorProfileSource>,
}

pub struct ResearcherEnricher {
    store: Arc<dyn EnrichmentStore>,
    sources: ProfileSources,
    publications: PublicationCache,
    profile_text: Option<Arc<dyn ProfileTextGenerator>>,
    freshness_days: i64,
    locks: EntityLocks,
}

impl ResearcherEnricher {
    pub fn new(
        store: Arc<dyn EnrichmentStore>,
        sources: ProfileSources,
        publications: PublicationCache,
        freshness_days: i64,
    ) -> Self {
        Self {
            store,
            sources,
            publications,
            profile_text: None,
            freshness_days,
            locks: EntityLocks::new(),
        }
    }

    pub fn from_config(store: Arc<dyn EnrichmentStore>, config: &ScienceConfig) -> Result<Self> {
        let s2 = Arc::new(SemanticScholarSource::new(config)?);
        let sources = ProfileSources {
            semantic_scholar: s2.clone(),
            orcid: Arc::new(OrcidSource::new(config)?),
            openalex: Arc::new(OpenAlexSource::new(config)?),
        };
        let publications = PublicationCache::new(
            store.clone(),
            s2,
            config.publication_cache_days,
            config.publication_fetch_limit,
        );
        Ok(Self::new(store, sources, publications, config.researcher_freshness_days))
    }

    pub fn with_profile_text(mut self, generator: Arc<dyn ProfileTextGenerator>) -> Self {
        self.profile_text = Some(generator);
        self
    }

    pub fn publications(&self) -> &PublicationCache {
        &self.publications
    }

    /// Never fails: errors are reported in the result and nothing is persisted.
    pub async fn enrich(&self, researcher_id: &Uuid, force: bool) -> ResearcherEnrichment {
        let _guard = self.locks.lock(*researcher_id).await;
        let mut result = ResearcherEnrichment {
            researcher_id: *researcher_id,
            ..Default::default()
        };
        if let Err(e) = self.enrich_locked(researcher_id, force, &mut result).await {
            warn!(researcher = %researcher_id, error = %e, "researcher enrichment failed");
            result.success = false;
            result.enriched = false;
            result.errors.push(e.to_string());
        }
        result
    }

    pub async fn enrich_batch(&self, limit: Option<usize>, force: bool) -> BatchStats {
        let mut stats = BatchStats::default();
        let researchers = match self.store.list_researchers(limit) {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "listing researchers failed");
                stats.failures.push(e.to_string());
                return stats;
            }
        };
        info!(count = researchers.len(), force, "enriching researchers");
        let results: Vec<ResearcherEnrichment> = stream::iter(researchers.iter())
            .map(|r| self.enrich(&r.id, force))
            .buffer_unordered(BATCH_CONCURRENCY)
            .collect()
            .await;
        for result in &results {
            stats.record_researcher(result);
        }
        info!(
            total = stats.total,
            enriched = stats.enriched,
            skipped = stats.skipped,
            failed = stats.failed,
            "researcher batch finished"
        );
        stats
    }

    fn is_fresh(&self, r: &ResearcherEntity) -> bool {
        r.last_enriched
            .is_some_and(|at| Utc::now().signed_duration_since(at) < chrono::Duration::days(self.freshness_days))
    }

    async fn fetch_profiles(&self, r: &ResearcherEntity, errors: &mut Vec<String>) -> SourceProfiles {
        let ids = &r.external_ids;

        let s2_fetch = async {
            match ids.semantic_scholar.as_deref() {
                Some(id) => self.sources.semantic_scholar.fetch_author_profile(id).await,
                None => Ok(None),
            }
        };
        let orcid_then_openalex = async {
            let orcid = match ids.orcid.as_deref() {
                Some(id) => self.sources.orcid.fetch_author_by_orcid(id).await,
                None => Ok(None),
            };
            let fallback_affiliation = orcid
                .as_ref()
                .ok()
                .and_then(|p| p.as_ref())
                .and_then(|p| p.affiliation.clone());
            let openalex = self.fetch_openalex(r, fallback_affiliation).await;
            (orcid, openalex)
        };
        let (s2, (orcid, openalex)) = tokio::join!(s2_fetch, orcid_then_openalex);

        let mut keep = |source: DataSource, fetched: Result<Option<AuthorProfile>>| match fetched {
            Ok(profile) => profile,
            Err(e) => {
                warn!(researcher = %r.id, %source, error = %e, "profile fetch failed");
                errors.push(format!("{}: {e}", source.label()));
                None
            }
        };
        SourceProfiles {
            semantic_scholar: keep(DataSource::SemanticScholar, s2),
            orcid: keep(DataSource::Orcid, orcid),
            openalex: keep(DataSource::OpenAlex, openalex),
        }
    }

    /// By ORCID, then stored id, then a name and affiliation search.
    async fn fetch_openalex(
        &self,
        r: &ResearcherEntity,
        fallback_affiliation: Option<String>,
    ) -> Result<Option<AuthorProfile>> {
        let openalex = &self.sources.openalex;
        if let Some(orcid) = r.external_ids.orcid.as_deref() {
            if let Some(profile) = openalex.fetch_author_by_orcid(orcid).await? {
                return Ok(Some(profile));
            }
        }
        if let Some(id) = r.external_ids.openalex.as_deref() {
            if let Some(profile) = openalex.fetch_author_profile(id).await? {
                return Ok(Some(profile));
            }
        }
        let query = AuthorQuery {
            name: r.name.clone(),
            affiliation: r.affiliation.clone().or(fallback_affiliation),
        };
        openalex.search_author(&query).await
    }

    /// Drops merged ids that another researcher already holds.
    fn drop_claimed_ids(&self, r: &ResearcherEntity, patch: &mut ResearcherPatch) -> Result<()> {
        let slots = [
            (DataSource::Orcid, &mut patch.orcid),
            (DataSource::SemanticScholar, &mut patch.semantic_scholar_id),
            (DataSource::OpenAlex, &mut patch.openalex_id),
        ];
        for (source, slot) in slots {
            let Some(id) = slot.as_deref() else { continue };
            if let Some(other) = self.store.find_researcher_by_external_id(source, id)? {
                if other.id != r.id {
                    warn!(researcher = %r.id, other = %other.id, %source, id, "external id held by another researcher");
                    *slot = None;
                }
            }
        }
        if let Some(id) = patch.scopus_id.as_deref() {
            if let Some(other) = self.store.find_researcher_by_scopus_id(id)? {
                if other.id != r.id {
                    warn!(researcher = %r.id, other = %other.id, id, "Scopus id held by another researcher");
                    patch.scopus_id = None;
                }
            }
        }
        Ok(())
    }

    async fn profile_text(&self, r: &ResearcherEntity) -> String {
        let facts = ProfileFacts {
            name: r.name.clone(),
            affiliation: r.affiliation.clone(),
            h_index: r.metrics.h_index,
            paper_count: r.metrics.paper_count,
            interests: r.research_interests.iter().take(PROFILE_INTERESTS).cloned().collect(),
        };
        if let Some(generator) = &self.profile_text {
            match generator.generate(&facts).await {
                Ok(Some(text)) if !text.trim().is_empty() => return text.trim().to_string(),
                Ok(_) => debug!(researcher = %r.id, "profile generator declined"),
                Err(e) => warn!(researcher = %r.id, error = %e, "profile generator failed"),
            }
        }
        template_profile_text(&facts)
    }

    async fn enrich_locked(
        &self,
        researcher_id: &Uuid,
        force: bool,
        result: &mut ResearcherEnrichment,
    ) -> Result<()> {
        let mut r = self
            .store
            .find_researcher(researcher_id)?
            .ok_or_else(|| ScienceError::NotFound(format!("researcher {researcher_id}")))?;

        if !force && self.is_fresh(&r) {
            info!(researcher = %r.id, "recently enriched, skipping");
            result.success = true;
            result.data_quality_score = r.data_quality_score;
            return Ok(());
        }

        let profiles = self.fetch_profiles(&r, &mut result.errors).await;
        if profiles.is_empty() {
            result.errors.push(NOT_FOUND_ANYWHERE.to_string());
            return Ok(());
        }
        result.sources_used = profiles.sources_used();

        let mut patch = merge_profiles(&r, &profiles);
        self.drop_claimed_ids(&r, &mut patch)?;
        for field in patch.apply(&mut r) {
            push_unique(&mut result.fields_updated, field);
        }

        let summary = self.profile_text(&r).await;
        if r.summary.as_deref() != Some(summary.as_str()) {
            r.summary = Some(summary);
            push_unique(&mut result.fields_updated, "summary".to_string());
        }
        if r.needs_avatar() {
            let avatar = placeholder_avatar_url(&r.name);
            if r.avatar_url.as_deref() != Some(avatar.as_str()) {
                r.avatar_url = Some(avatar);
                push_unique(&mut result.fields_updated, "avatar_url".to_string());
            }
        }

        r.data_quality_score = quality_score(&r);
        let now = Utc::now();
        r.last_enriched = Some(now);
        r.updated_at = now;
        r.data_sources = result.sources_used.clone();
        self.store.commit_researcher_enrichment(&r)?;

        result.success = true;
        result.enriched = true;
        result.data_quality_score = r.data_quality_score;
        info!(
            researcher = %r.id,
            sources = ?result.sources_used,
            score = r.data_quality_score,
            "researcher enriched"
        );

        if r.external_ids.semantic_scholar.is_some() {
            match self.publications.refresh(&r).await {
                Ok(entries) => result.publications_stored = entries.len(),
                Err(e) => {
                    warn!(researcher = %r.id, error = %e, "publication sync failed");
                    result.errors.push(format!("publication sync: {e}"));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeProfileSource, FakeWorks, FixedProfileText};
    use crate::types::AuthorWork;
    use scholarhub_core::Database;
    use serde_json::json;

    const ORCID: &str = "0000-0002-1825-0097";

    fn profile(source: DataSource) -> AuthorProfile {
        let mut p = AuthorProfile::empty(source);
        p.raw = json!({"from": source.as_str()});
        p
    }

    fn concept(name: &str, score: f64) -> ResearchConcept {
        ResearchConcept {
            concept: name.to_string(),
            score,
            level: Some(1),
        }
    }

    struct Fixture {
        db: Arc<Database>,
        s2: Arc<FakeProfileSource>,
        orcid: Arc<FakeProfileSource>,
        openalex: Arc<FakeProfileSource>,
        works: Arc<FakeWorks>,
    }

    impl Fixture {
        fn new(s2: FakeProfileSource, orcid: FakeProfileSource, openalex: FakeProfileSource) -> Self {
            Self {
                db: Arc::new(Database::open_in_memory().unwrap()),
                s2: Arc::new(s2),
                orcid: Arc::new(orcid),
                openalex: Arc::new(openalex),
                works: Arc::new(FakeWorks::new(Vec::new())),
            }
        }

        fn with_works(mut self, works: FakeWorks) -> Self {
            self.works = Arc::new(works);
            self
        }

        fn enricher(&self) -> ResearcherEnricher {
            let sources = ProfileSources {
                semantic_scholar: self.s2.clone(),
                orcid: self.orcid.clone(),
                openalex: self.openalex.clone(),
            };
            let cache = PublicationCache::new(self.db.clone(), self.works.clone(), 7, 100);
            ResearcherEnricher::new(self.db.clone(), sources, cache, 30)
        }

        fn total_calls(&self) -> usize {
            self.s2.calls() + self.orcid.calls() + self.openalex.calls()
        }
    }

    #[test]
    fn orcid_null_affiliation_falls_to_openalex() {
        let mut r = ResearcherEntity::new("Ada Lovelace");
        r.external_ids.orcid = Some(ORCID.to_string());
        let mut oa = profile(DataSource::OpenAlex);
        oa.affiliation = Some("MIT".to_string());
        let profiles = SourceProfiles {
            orcid: Some(profile(DataSource::Orcid)),
            openalex: Some(oa),
            ..Default::default()
        };
        let patch = merge_profiles(&r, &profiles);
        assert_eq!(patch.affiliation.as_deref(), Some("MIT"));
        assert!(patch.orcid.is_none());
    }

    #[test]
    fn merge_priorities() {
        let mut r = ResearcherEntity::new("Alex Wood");
        r.url = Some("https://keep.example.org".to_string());
        r.aliases.insert("A. Wood".to_string());

        let mut s2 = profile(DataSource::SemanticScholar);
        s2.source_author_id = Some("111".to_string());
        s2.h_index = Some(9);
        s2.paper_count = Some(80);
        s2.total_citations = Some(500);
        s2.affiliation = Some("Oxford".to_string());
        s2.aliases = vec!["Alexander Wood".to_string()];

        let mut orcid = profile(DataSource::Orcid);
        orcid.orcid = Some(ORCID.to_string());
        orcid.current_position = Some("Lecturer".to_string());
        orcid.research_interests = vec!["Gig economy".to_string(), "Sociology".to_string()];
        orcid.affiliation_history = vec![AffiliationRecord::new("Cambridge", DataSource::Orcid)];
        orcid.paper_count = Some(30);

        let mut oa = profile(DataSource::OpenAlex);
        oa.source_author_id = Some("A5".to_string());
        oa.scopus_id = Some("5719".to_string());
        oa.display_name = Some("Alex J. Wood".to_string());
        oa.h_index = Some(12);
        oa.i10_index = Some(14);
        oa.paper_count = Some(64);
        oa.total_citations = Some(900);
        oa.affiliation = Some("University of Cambridge".to_string());
        oa.affiliation_history = vec![AffiliationRecord::new("University of Oxford", DataSource::OpenAlex)];
        oa.research_concepts = vec![concept("sociology", 0.8), concept("Economics", 0.5)];

        let profiles = SourceProfiles {
            semantic_scholar: Some(s2),
            orcid: Some(orcid),
            openalex: Some(oa),
        };
        let patch = merge_profiles(&r, &profiles);

        assert_eq!(patch.orcid.as_deref(), Some(ORCID));
        assert_eq!(patch.semantic_scholar_id.as_deref(), Some("111"));
        assert_eq!(patch.scopus_id.as_deref(), Some("5719"));
        assert_eq!(patch.affiliation.as_deref(), Some("University of Cambridge"));
        assert_eq!(patch.current_position.as_deref(), Some("Lecturer"));
        assert_eq!(patch.h_index, Some(12));
        assert_eq!(patch.i10_index, Some(14));
        assert_eq!(patch.paper_count, Some(80));
        assert_eq!(patch.total_citations, Some(900));
        assert_eq!(patch.primary_research_area.as_deref(), Some("sociology"));
        assert!(patch.url.is_none());
        assert_eq!(
            patch.research_interests,
            Some(vec!["Gig economy".to_string(), "Sociology".to_string(), "Economics".to_string()])
        );
        let history = patch.affiliation_history.as_ref().unwrap();
        assert_eq!(history[0].institution, "Cambridge");
        assert_eq!(history[1].institution, "University of Oxford");
        let aliases = patch.aliases.as_ref().unwrap();
        assert!(aliases.contains("A. Wood"));
        assert!(aliases.contains("Alexander Wood"));
        assert!(aliases.contains("Alex J. Wood"));
        assert_eq!(patch.raw_data.len(), 3);
    }

    #[test]
    fn h_index_falls_back_to_s2_and_url_to_profile() {
        let r = ResearcherEntity::new("Solo");
        let mut s2 = profile(DataSource::SemanticScholar);
        s2.h_index = Some(4);
        s2.profile_url = Some("https://www.semanticscholar.org/author/9".to_string());
        let profiles = SourceProfiles {
            semantic_scholar: Some(s2),
            ..Default::default()
        };
        let patch = merge_profiles(&r, &profiles);
        assert_eq!(patch.h_index, Some(4));
        assert!(patch.i10_index.is_none());
        assert_eq!(patch.url.as_deref(), Some("https://www.semanticscholar.org/author/9"));
    }

    #[test]
    fn interests_dedup_and_cap() {
        let mut orcid = profile(DataSource::Orcid);
        orcid.research_interests = (0..12).map(|i| format!("Topic {i}")).collect();
        let mut oa = profile(DataSource::OpenAlex);
        oa.research_concepts = (0..10).map(|i| concept(&format!("topic {i}"), 0.5)).collect();
        oa.research_concepts.push(concept("Extra", 0.1));

        let interests = extract_interests(Some(&orcid), Some(&oa));
        assert_eq!(interests.len(), 10);
        assert_eq!(interests[0], "Topic 0");

        oa.research_concepts = (0..10).map(|i| concept(&format!("Field {i}"), 0.5)).collect();
        let interests = extract_interests(Some(&orcid), Some(&oa));
        assert_eq!(interests.len(), MAX_INTERESTS);
        assert_eq!(interests[10], "Field 0");
    }

    #[tokio::test]
    async fn recently_enriched_is_skipped() {
        let fx = Fixture::new(
            FakeProfileSource::new(DataSource::SemanticScholar),
            FakeProfileSource::new(DataSource::Orcid),
            FakeProfileSource::new(DataSource::OpenAlex),
        );
        let mut r = ResearcherEntity::new("Recent");
        r.external_ids.semantic_scholar = Some("1".to_string());
        r.last_enriched = Some(Utc::now() - chrono::Duration::days(10));
        fx.db.save_researcher(&r).unwrap();

        let out = fx.enricher().enrich(&r.id, false).await;
        assert!(out.success);
        assert!(!out.enriched);
        assert!(out.fields_updated.is_empty());
        assert_eq!(fx.total_calls(), 0);
        assert_eq!(fx.db.find_researcher(&r.id).unwrap().unwrap(), r);
    }

    #[tokio::test]
    async fn nothing_found_anywhere() {
        let fx = Fixture::new(
            FakeProfileSource::new(DataSource::SemanticScholar),
            FakeProfileSource::new(DataSource::Orcid),
            FakeProfileSource::new(DataSource::OpenAlex),
        );
        let r = ResearcherEntity::new("Ghost");
        fx.db.save_researcher(&r).unwrap();

        let out = fx.enricher().enrich(&r.id, true).await;
        assert!(!out.success);
        assert_eq!(out.errors, vec![NOT_FOUND_ANYWHERE.to_string()]);
        assert_eq!(fx.db.find_researcher(&r.id).unwrap().unwrap(), r);
    }

    #[tokio::test]
    async fn full_enrichment_persists_and_syncs_publications() {
        let mut s2 = profile(DataSource::SemanticScholar);
        s2.source_author_id = Some("111".to_string());
        s2.paper_count = Some(12);
        s2.h_index = Some(5);
        let mut orcid = profile(DataSource::Orcid);
        orcid.orcid = Some(ORCID.to_string());
        let mut oa = profile(DataSource::OpenAlex);
        oa.source_author_id = Some("A9".to_string());
        oa.affiliation = Some("MIT".to_string());
        oa.research_concepts = vec![concept("Computer science", 0.9)];

        let fx = Fixture::new(
            FakeProfileSource::new(DataSource::SemanticScholar).with_id("111", s2),
            FakeProfileSource::new(DataSource::Orcid).with_orcid(ORCID, orcid),
            FakeProfileSource::new(DataSource::OpenAlex).with_orcid(ORCID, oa),
        )
        .with_works(FakeWorks::new(vec![AuthorWork {
            source_paper_id: "p1".to_string(),
            title: "A work".to_string(),
            year: Some(2020),
            venue: None,
            citation_count: 0,
            doi: None,
        }]));

        let mut r = ResearcherEntity::new("Ada Lovelace");
        r.external_ids.semantic_scholar = Some("111".to_string());
        r.external_ids.orcid = Some(ORCID.to_string());
        r.avatar_url = Some(placeholder_avatar_url("Ada Lovelace"));
        fx.db.save_researcher(&r).unwrap();

        let out = fx.enricher().enrich(&r.id, false).await;
        assert!(out.success, "{out:?}");
        assert!(out.enriched);
        assert_eq!(
            out.sources_used,
            vec![DataSource::SemanticScholar, DataSource::Orcid, DataSource::OpenAlex]
        );
        assert_eq!(out.publications_stored, 1);

        let stored = fx.db.find_researcher(&r.id).unwrap().unwrap();
        assert_eq!(stored.affiliation.as_deref(), Some("MIT"));
        assert_eq!(stored.external_ids.openalex.as_deref(), Some("A9"));
        assert_eq!(stored.primary_research_area.as_deref(), Some("Computer science"));
        assert_eq!(
            stored.summary.as_deref(),
            Some(
                "Ada Lovelace is a researcher at MIT specializing in Computer science. \
                 They have published 12 papers with an h-index of 5."
            )
        );
        assert!(stored.last_enriched.is_some());
        assert_eq!(stored.data_quality_score, quality_score(&stored));
        assert_eq!(stored.data_sources.len(), 3);
        assert!(stored.raw_data.contains_key("openalex"));
        assert_eq!(fx.openalex.calls(), 1);
    }

    #[tokio::test]
    async fn colliding_scopus_id_is_dropped_and_rest_kept() {
        let fx = Fixture::new(
            FakeProfileSource::new(DataSource::SemanticScholar),
            FakeProfileSource::new(DataSource::Orcid),
            FakeProfileSource::new(DataSource::OpenAlex).with_search_hit({
                let mut oa = profile(DataSource::OpenAlex);
                oa.source_author_id = Some("A2".to_string());
                oa.scopus_id = Some("5719".to_string());
                oa.h_index = Some(7);
                oa
            }),
        );
        let mut holder = ResearcherEntity::new("First Holder");
        holder.external_ids.scopus = Some("5719".to_string());
        fx.db.save_researcher(&holder).unwrap();
        let r = ResearcherEntity::new("Second Person");
        fx.db.save_researcher(&r).unwrap();

        let out = fx.enricher().enrich(&r.id, true).await;
        assert!(out.success, "{out:?}");

        let stored = fx.db.find_researcher(&r.id).unwrap().unwrap();
        assert_eq!(stored.metrics.h_index, 7);
        assert_eq!(stored.external_ids.openalex.as_deref(), Some("A2"));
        assert!(stored.external_ids.scopus.is_none());
        let holder = fx.db.find_researcher(&holder.id).unwrap().unwrap();
        assert_eq!(holder.external_ids.scopus.as_deref(), Some("5719"));
    }

    #[tokio::test]
    async fn openalex_search_uses_orcid_affiliation() {
        let mut orcid = profile(DataSource::Orcid);
        orcid.affiliation = Some("Brown University".to_string());
        let mut oa = profile(DataSource::OpenAlex);
        oa.source_author_id = Some("A1".to_string());
        let fx = Fixture::new(
            FakeProfileSource::new(DataSource::SemanticScholar),
            FakeProfileSource::new(DataSource::Orcid).with_orcid(ORCID, orcid),
            FakeProfileSource::new(DataSource::OpenAlex).with_search_hit(oa),
        );
        let mut r = ResearcherEntity::new("Josiah Carberry");
        r.external_ids.orcid = Some(ORCID.to_string());
        fx.db.save_researcher(&r).unwrap();

        let out = fx.enricher().enrich(&r.id, true).await;
        assert!(out.success);
        let searches = fx.openalex.searches();
        assert_eq!(searches.len(), 1);
        assert_eq!(searches[0].affiliation.as_deref(), Some("Brown University"));
    }

    #[tokio::test]
    async fn failing_source_is_isolated() {
        let mut oa = profile(DataSource::OpenAlex);
        oa.h_index = Some(3);
        let fx = Fixture::new(
            FakeProfileSource::new(DataSource::SemanticScholar).failing(),
            FakeProfileSource::new(DataSource::Orcid),
            FakeProfileSource::new(DataSource::OpenAlex).with_search_hit(oa),
        );
        let mut r = ResearcherEntity::new("Partial");
        r.external_ids.semantic_scholar = Some("404".to_string());
        fx.db.save_researcher(&r).unwrap();

        let out = fx.enricher().enrich(&r.id, true).await;
        assert!(out.success);
        assert_eq!(out.sources_used, vec![DataSource::OpenAlex]);
        assert!(out.errors.iter().any(|e| e.starts_with("Semantic Scholar")));
        assert_eq!(fx.db.find_researcher(&r.id).unwrap().unwrap().metrics.h_index, 3);
    }

    #[tokio::test]
    async fn generator_text_used_and_failure_falls_back() {
        let mut oa = profile(DataSource::OpenAlex);
        oa.h_index = Some(1);
        let fx = Fixture::new(
            FakeProfileSource::new(DataSource::SemanticScholar),
            FakeProfileSource::new(DataSource::Orcid),
            FakeProfileSource::new(DataSource::OpenAlex).with_search_hit(oa),
        );
        let r = ResearcherEntity::new("Grace Hopper");
        fx.db.save_researcher(&r).unwrap();

        let enricher = fx
            .enricher()
            .with_profile_text(Arc::new(FixedProfileText::new("Grace Hopper builds compilers.")));
        enricher.enrich(&r.id, true).await;
        let stored = fx.db.find_researcher(&r.id).unwrap().unwrap();
        assert_eq!(stored.summary.as_deref(), Some("Grace Hopper builds compilers."));

        let enricher = fx.enricher().with_profile_text(Arc::new(FixedProfileText::failing()));
        enricher.enrich(&r.id, true).await;
        let stored = fx.db.find_researcher(&r.id).unwrap().unwrap();
        assert_eq!(stored.summary.as_deref(), Some("Grace Hopper is a researcher."));
    }

    #[tokio::test]
    async fn publication_failure_does_not_fail_enrichment() {
        let mut s2 = profile(DataSource::SemanticScholar);
        s2.source_author_id = Some("7".to_string());
        let fx = Fixture::new(
            FakeProfileSource::new(DataSource::SemanticScholar).with_id("7", s2),
            FakeProfileSource::new(DataSource::Orcid),
            FakeProfileSource::new(DataSource::OpenAlex),
        )
        .with_works(FakeWorks::failing());
        let mut r = ResearcherEntity::new("Seven");
        r.external_ids.semantic_scholar = Some("7".to_string());
        fx.db.save_researcher(&r).unwrap();

        let out = fx.enricher().enrich(&r.id, true).await;
        assert!(out.success);
        assert!(out.errors.iter().any(|e| e.starts_with("publication sync")));
    }

    #[tokio::test]
    async fn batch_reports_enriched_and_skipped() {
        let mut oa = profile(DataSource::OpenAlex);
        oa.h_index = Some(2);
        let fx = Fixture::new(
            FakeProfileSource::new(DataSource::SemanticScholar),
            FakeProfileSource::new(DataSource::Orcid),
            FakeProfileSource::new(DataSource::OpenAlex).with_search_hit(oa),
        );
        let fresh = {
            let mut r = ResearcherEntity::new("Fresh");
            r.last_enriched = Some(Utc::now());
            r
        };
        fx.db.save_researcher(&fresh).unwrap();
        fx.db.save_researcher(&ResearcherEntity::new("Stale")).unwrap();

        let stats = fx.enricher().enrich_batch(None, false).await;
        assert_eq!(stats.total, 2);
        assert_eq!(stats.enriched, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.by_source.get("openalex"), Some(&1));
    }
}
