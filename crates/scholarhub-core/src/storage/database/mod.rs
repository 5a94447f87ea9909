mod connection;
mod migrations;
mod schema;

pub use connection::ConnectionPool;
pub use migrations::{Migration, get_applied_versions, run_migrations};
pub use schema::SCHEMA_VERSION;

use std::collections::HashSet;
use std::path::Path;

use tracing::debug;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Authorship, DataSource, ExternalPublication, PaperEntity, ResearcherEntity};

use super::repositories::{
    PaperFilter, Repository, SqliteAuthorshipRepository, SqlitePaperRepository,
    SqlitePublicationRepository, SqliteResearcherRepository,
};
use super::store::{EnrichmentStore, PaperEnrichmentUnit};

pub fn open_database(path: &Path) -> Result<ConnectionPool> {
    let pool = ConnectionPool::open(path)?;
    {
        let conn = pool.get_connection();
        migrations::run_migrations(&conn)?;
    }
    Ok(pool)
}

pub fn open_in_memory() -> Result<ConnectionPool> {
    let pool = ConnectionPool::open_in_memory()?;
    {
        let conn = pool.get_connection();
        migrations::run_migrations(&conn)?;
    }
    Ok(pool)
}

/// SQLite-backed store.
pub struct Database {
    pool: ConnectionPool,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let pool = open_database(path)?;
        debug!(path = %path.display(), "database opened");
        Ok(Self { pool })
    }

    pub fn open_in_memory() -> Result<Self> {
        let pool = open_in_memory()?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    pub fn schema_versions(&self) -> Result<Vec<u32>> {
        let conn = self.pool.get_connection();
        get_applied_versions(&conn)
    }
}

impl EnrichmentStore for Database {
    fn find_paper(&self, id: &Uuid) -> Result<Option<PaperEntity>> {
        let conn = self.pool.get_connection();
        SqlitePaperRepository::new(&conn).find_by_id(id)
    }

    fn find_paper_by_doi(&self, doi: &str) -> Result<Option<PaperEntity>> {
        let conn = self.pool.get_connection();
        SqlitePaperRepository::new(&conn).find_by_doi(doi)
    }

    fn find_paper_by_external_id(&self, source: DataSource, id: &str) -> Result<Option<PaperEntity>> {
        let conn = self.pool.get_connection();
        SqlitePaperRepository::new(&conn).find_by_external_id(source, id)
    }

    fn paper_external_id_claimed(&self, source: DataSource, id: &str, except: &Uuid) -> Result<bool> {
        let conn = self.pool.get_connection();
        SqlitePaperRepository::new(&conn).external_id_claimed(source, id, except)
    }

    fn paper_external_ids(&self, source: DataSource) -> Result<HashSet<String>> {
        let conn = self.pool.get_connection();
        SqlitePaperRepository::new(&conn).external_ids(source)
    }

    fn list_papers(&self, filter: &PaperFilter) -> Result<Vec<PaperEntity>> {
        let conn = self.pool.get_connection();
        SqlitePaperRepository::new(&conn).list(filter)
    }

    fn save_paper(&self, paper: &PaperEntity) -> Result<()> {
        let conn = self.pool.get_connection();
        SqlitePaperRepository::new(&conn).save(paper)
    }

    fn find_researcher(&self, id: &Uuid) -> Result<Option<ResearcherEntity>> {
        let conn = self.pool.get_connection();
        SqliteResearcherRepository::new(&conn).find_by_id(id)
    }

    fn find_researcher_by_external_id(
        &self,
        source: DataSource,
        id: &str,
    ) -> Result<Option<ResearcherEntity>> {
        let conn = self.pool.get_connection();
        SqliteResearcherRepository::new(&conn).find_by_external_id(source, id)
    }

    fn find_researcher_by_scopus_id(&self, scopus_id: &str) -> Result<Option<ResearcherEntity>> {
        let conn = self.pool.get_connection();
        SqliteResearcherRepository::new(&conn).find_by_scopus_id(scopus_id)
    }

    fn find_researcher_by_name(&self, name: &str) -> Result<Option<ResearcherEntity>> {
        let conn = self.pool.get_connection();
        SqliteResearcherRepository::new(&conn).find_by_name(name)
    }

    fn list_researchers(&self, limit: Option<usize>) -> Result<Vec<ResearcherEntity>> {
        let conn = self.pool.get_connection();
        SqliteResearcherRepository::new(&conn).list(limit)
    }

    fn save_researcher(&self, researcher: &ResearcherEntity) -> Result<()> {
        let conn = self.pool.get_connection();
        SqliteResearcherRepository::new(&conn).save(researcher)
    }

    fn authorship_exists(&self, paper_id: &Uuid, researcher_id: &Uuid) -> Result<bool> {
        let conn = self.pool.get_connection();
        SqliteAuthorshipRepository::new(&conn).exists(paper_id, researcher_id)
    }

    fn authorships_for_paper(&self, paper_id: &Uuid) -> Result<Vec<Authorship>> {
        let conn = self.pool.get_connection();
        SqliteAuthorshipRepository::new(&conn).for_paper(paper_id)
    }

    fn papers_for_researcher(&self, researcher_id: &Uuid) -> Result<Vec<PaperEntity>> {
        let conn = self.pool.get_connection();
        SqlitePaperRepository::new(&conn).for_researcher(researcher_id)
    }

    fn external_publications(&self, researcher_id: &Uuid) -> Result<Vec<ExternalPublication>> {
        let conn = self.pool.get_connection();
        SqlitePublicationRepository::new(&conn).for_researcher(researcher_id)
    }

    fn replace_external_publications(
        &self,
        researcher_id: &Uuid,
        entries: &[ExternalPublication],
    ) -> Result<()> {
        let mut conn = self.pool.get_connection();
        let tx = conn.transaction()?;
        let inserted = SqlitePublicationRepository::new(&tx).replace_non_imported(researcher_id, entries)?;
        tx.commit()?;
        debug!(researcher = %researcher_id, inserted, "external publications replaced");
        Ok(())
    }

    fn mark_external_publication_imported(
        &self,
        researcher_id: &Uuid,
        source_paper_id: &str,
    ) -> Result<bool> {
        let conn = self.pool.get_connection();
        SqlitePublicationRepository::new(&conn).mark_imported(researcher_id, source_paper_id)
    }

    fn commit_paper_enrichment(&self, unit: &PaperEnrichmentUnit) -> Result<usize> {
        let mut conn = self.pool.get_connection();
        let tx = conn.transaction()?;

        let created = {
            let papers = SqlitePaperRepository::new(&tx);
            let researchers = SqliteResearcherRepository::new(&tx);
            let authorships = SqliteAuthorshipRepository::new(&tx);

            papers.save(&unit.paper)?;
            for researcher in &unit.researchers {
                researchers.save(researcher)?;
            }
            let mut created = 0;
            for authorship in &unit.authorships {
                if authorships.insert_if_absent(authorship)? {
                    created += 1;
                }
            }
            created
        };

        tx.commit()?;
        Ok(created)
    }

    fn commit_researcher_enrichment(&self, researcher: &ResearcherEntity) -> Result<()> {
        let mut conn = self.pool.get_connection();
        let tx = conn.transaction()?;
        SqliteResearcherRepository::new(&tx).save(researcher)?;
        tx.commit()?;
        Ok(())
    }
}
