use chrono::Utc;
use scholarhub_core::{
    Authorship, DataSource, EnrichmentStore, PaperEntity, ResearcherEntity, placeholder_avatar_url,
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::Result;
use crate::types::NormalizedAuthor;

const S2_AUTHOR_URL: &str = "https://www.semanticscholar.org/author/";

/// What processing one author list produced, ready for a single commit.
#[derive(Debug, Default)]
pub struct AuthorOutcome {
    pub researchers: Vec<ResearcherEntity>,
    pub authorships: Vec<Authorship>,
    pub created: usize,
    pub updated: usize,
}

/// Resolves a candidate's authors to researchers.
///
/// Lookups see both the store and researchers staged earlier in the same
/// run, so an author listed twice maps to one researcher.
pub struct AuthorResolver<'a> {
    store: &'a dyn EnrichmentStore,
    source: DataSource,
    staged: Vec<ResearcherEntity>,
    new_ids: Vec<Uuid>,
    authorships: Vec<Authorship>,
    updated: usize,
}

impl<'a> AuthorResolver<'a> {
    pub fn new(store: &'a dyn EnrichmentStore, source: DataSource) -> Self {
        Self {
            store,
            source,
            staged: Vec::new(),
            new_ids: Vec::new(),
            authorships: Vec::new(),
            updated: 0,
        }
    }

    pub fn process(&mut self, paper: &PaperEntity, authors: &[NormalizedAuthor]) -> Result<()> {
        for (index, author) in authors.iter().enumerate() {
            let name = author.name.trim();
            if name.is_empty() {
                continue;
            }
            let researcher_id = self.resolve(name, author)?;
            self.link(paper, researcher_id, index)?;
        }
        Ok(())
    }

    pub fn finish(self) -> AuthorOutcome {
        AuthorOutcome {
            created: self.new_ids.len(),
            updated: self.updated,
            researchers: self.staged,
            authorships: self.authorships,
        }
    }

    fn source_id<'n>(&self, author: &'n NormalizedAuthor) -> Option<&'n str> {
        match self.source {
            DataSource::SemanticScholar | DataSource::OpenAlex => author.source_author_id.as_deref(),
            DataSource::Crossref | DataSource::Orcid => None,
        }
    }

    fn staged_position(&self, pred: impl Fn(&ResearcherEntity) -> bool) -> Option<usize> {
        self.staged.iter().position(pred)
    }

    /// Index into `staged` for an existing match, loading it from the store if needed.
    fn find_existing(&mut self, name: &str, author: &NormalizedAuthor) -> Result<Option<usize>> {
        let source = self.source;
        if let Some(id) = self.source_id(author) {
            if let Some(i) = self.staged_position(|r| r.external_ids.get(source) == Some(id)) {
                return Ok(Some(i));
            }
            if let Some(found) = self.store.find_researcher_by_external_id(source, id)? {
                return Ok(Some(self.stage(found)));
            }
        }
        if let Some(orcid) = author.orcid.as_deref() {
            if let Some(i) = self.staged_position(|r| r.external_ids.orcid.as_deref() == Some(orcid)) {
                return Ok(Some(i));
            }
            if let Some(found) = self.store.find_researcher_by_external_id(DataSource::Orcid, orcid)? {
                return Ok(Some(self.stage(found)));
            }
        }
        if let Some(i) = self.staged_position(|r| r.name.eq_ignore_ascii_case(name)) {
            return Ok(Some(i));
        }
        if let Some(found) = self.store.find_researcher_by_name(name)? {
            return Ok(Some(self.stage(found)));
        }
        Ok(None)
    }

    fn stage(&mut self, researcher: ResearcherEntity) -> usize {
        if let Some(i) = self.staged_position(|r| r.id == researcher.id) {
            return i;
        }
        self.staged.push(researcher);
        self.staged.len() - 1
    }

    fn resolve(&mut self, name: &str, author: &NormalizedAuthor) -> Result<Uuid> {
        if let Some(i) = self.find_existing(name, author)? {
            let id = self.staged[i].id;
            if self.backfill(i, author)? && !self.new_ids.contains(&id) {
                self.updated += 1;
            }
            return Ok(id);
        }

        let mut researcher = ResearcherEntity::new(name);
        researcher.avatar_url = Some(placeholder_avatar_url(name));
        researcher.summary = Some(format!("{name} is a researcher."));
        researcher.affiliation = author.affiliation.clone();
        if let Some(id) = self.source_id(author) {
            if let Some(slot) = researcher.external_ids.slot_mut(self.source) {
                *slot = Some(id.to_string());
            }
            if self.source == DataSource::SemanticScholar {
                researcher.url = Some(format!("{S2_AUTHOR_URL}{id}"));
            }
        }
        if let Some(orcid) = author.orcid.as_deref() {
            if self.id_free(DataSource::Orcid, orcid, &researcher.id)? {
                researcher.external_ids.orcid = Some(orcid.to_string());
            }
        }
        info!(name, source = %self.source, "creating researcher");
        let id = researcher.id;
        self.new_ids.push(id);
        self.staged.push(researcher);
        Ok(id)
    }

    /// True when no other researcher, stored or staged, holds `id` for `source`.
    fn id_free(&self, source: DataSource, id: &str, except: &Uuid) -> Result<bool> {
        if self
            .staged
            .iter()
            .any(|r| &r.id != except && r.external_ids.get(source) == Some(id))
        {
            return Ok(false);
        }
        Ok(self
            .store
            .find_researcher_by_external_id(source, id)?
            .is_none_or(|r| &r.id == except))
    }

    /// Fills identifiers the stored researcher is missing. Never overwrites.
    fn backfill(&mut self, index: usize, author: &NormalizedAuthor) -> Result<bool> {
        let mut wanted = Vec::new();
        if let Some(id) = self.source_id(author) {
            wanted.push((self.source, id.to_string()));
        }
        if let Some(orcid) = &author.orcid {
            wanted.push((DataSource::Orcid, orcid.clone()));
        }

        let researcher_id = self.staged[index].id;
        let mut changed = false;
        for (source, id) in wanted {
            if self.staged[index].external_ids.get(source).is_some() {
                continue;
            }
            if !self.id_free(source, &id, &researcher_id)? {
                continue;
            }
            if let Some(slot) = self.staged[index].external_ids.slot_mut(source) {
                debug!(researcher = %researcher_id, %source, id, "backfilling external id");
                *slot = Some(id);
                changed = true;
            }
        }
        if changed {
            self.staged[index].updated_at = Utc::now();
        }
        Ok(changed)
    }

    fn link(&mut self, paper: &PaperEntity, researcher_id: Uuid, index: usize) -> Result<()> {
        let staged = self
            .authorships
            .iter()
            .any(|a| a.researcher_id == researcher_id);
        if staged || self.store.authorship_exists(&paper.id, &researcher_id)? {
            return Ok(());
        }
        self.authorships
            .push(Authorship::for_position(paper.id, researcher_id, index, &paper.title));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scholarhub_core::{CO_AUTHOR, Database, FIRST_AUTHOR, PaperEnrichmentUnit};

    fn author(name: &str, position: usize, s2: Option<&str>) -> NormalizedAuthor {
        let mut a = NormalizedAuthor::new(name, position);
        a.source_author_id = s2.map(str::to_string);
        a
    }

    #[test]
    fn creates_researchers_with_defaults() {
        let db = Database::open_in_memory().unwrap();
        let paper = PaperEntity::new("Worker Autonomy");
        let mut resolver = AuthorResolver::new(&db, DataSource::SemanticScholar);
        resolver
            .process(&paper, &[author("Alex Wood", 0, Some("111")), author("  ", 1, None), author("Mark Graham", 2, None)])
            .unwrap();
        let out = resolver.finish();

        assert_eq!(out.created, 2);
        assert_eq!(out.authorships.len(), 2);
        assert_eq!(out.authorships[0].author_position, FIRST_AUTHOR);
        assert_eq!(out.authorships[1].author_position, CO_AUTHOR);
        let wood = &out.researchers[0];
        assert_eq!(wood.summary.as_deref(), Some("Alex Wood is a researcher."));
        assert_eq!(wood.url.as_deref(), Some("https://www.semanticscholar.org/author/111"));
        assert!(wood.avatar_url.as_deref().unwrap().contains("name=Alex+Wood"));
        assert!(out.researchers[1].url.is_none());
    }

    #[test]
    fn duplicate_author_in_one_list_maps_to_one_researcher() {
        let db = Database::open_in_memory().unwrap();
        let paper = PaperEntity::new("Twice");
        let mut resolver = AuthorResolver::new(&db, DataSource::Crossref);
        resolver
            .process(&paper, &[author("Ada Lovelace", 0, None), author("ada lovelace", 1, None)])
            .unwrap();
        let out = resolver.finish();
        assert_eq!(out.created, 1);
        assert_eq!(out.authorships.len(), 1);
    }

    #[test]
    fn backfills_existing_researcher_found_by_name() {
        let db = Database::open_in_memory().unwrap();
        let existing = ResearcherEntity::new("Alex Wood");
        db.save_researcher(&existing).unwrap();

        let paper = PaperEntity::new("Worker Autonomy");
        let mut resolver = AuthorResolver::new(&db, DataSource::OpenAlex);
        let mut a = author("ALEX WOOD", 0, Some("A123"));
        a.orcid = Some("0000-0002-1825-0097".to_string());
        resolver.process(&paper, &[a]).unwrap();
        let out = resolver.finish();

        assert_eq!(out.created, 0);
        assert_eq!(out.updated, 1);
        let r = &out.researchers[0];
        assert_eq!(r.id, existing.id);
        assert_eq!(r.external_ids.openalex.as_deref(), Some("A123"));
        assert_eq!(r.external_ids.orcid.as_deref(), Some("0000-0002-1825-0097"));
    }

    #[test]
    fn existing_authorship_not_duplicated() {
        let db = Database::open_in_memory().unwrap();
        let paper = PaperEntity::new("Again");
        let mut resolver = AuthorResolver::new(&db, DataSource::SemanticScholar);
        resolver.process(&paper, &[author("Alex Wood", 0, Some("111"))]).unwrap();
        let out = resolver.finish();
        let unit = PaperEnrichmentUnit {
            paper: paper.clone(),
            researchers: out.researchers,
            authorships: out.authorships,
        };
        assert_eq!(db.commit_paper_enrichment(&unit).unwrap(), 1);

        let mut again = AuthorResolver::new(&db, DataSource::SemanticScholar);
        again.process(&paper, &[author("Alex Wood", 0, Some("111"))]).unwrap();
        let out = again.finish();
        assert_eq!(out.created, 0);
        assert_eq!(out.updated, 0);
        assert!(out.authorships.is_empty());
    }
}
