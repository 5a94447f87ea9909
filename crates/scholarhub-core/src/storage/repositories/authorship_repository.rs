use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use super::Repository;
use super::columns::{timestamp_at, uuid_at};
use crate::error::Result;
use crate::models::Authorship;

const AUTHORSHIP_COLUMNS: &str =
    "id, paper_id, researcher_id, author_position, contribution_role, summary, created_at";

pub struct SqliteAuthorshipRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteAuthorshipRepository<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn row_to_authorship(row: &rusqlite::Row) -> rusqlite::Result<Authorship> {
        Ok(Authorship {
            id: uuid_at(row, 0)?,
            paper_id: uuid_at(row, 1)?,
            researcher_id: uuid_at(row, 2)?,
            author_position: row.get(3)?,
            contribution_role: row.get(4)?,
            summary: row.get(5)?,
            created_at: timestamp_at(row, 6)?,
        })
    }

    pub fn exists(&self, paper_id: &Uuid, researcher_id: &Uuid) -> Result<bool> {
        let found = self
            .conn
            .prepare("SELECT 1 FROM authorships WHERE paper_id = ?1 AND researcher_id = ?2")?
            .exists(params![paper_id.to_string(), researcher_id.to_string()])?;
        Ok(found)
    }

    /// Inserts unless the (paper, researcher) pair already exists. Returns whether a row was added.
    pub fn insert_if_absent(&self, authorship: &Authorship) -> Result<bool> {
        let changed = self.conn.execute(
            "INSERT INTO authorships
                (id, paper_id, researcher_id, author_position, contribution_role, summary, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(paper_id, researcher_id) DO NOTHING",
            params![
                authorship.id.to_string(),
                authorship.paper_id.to_string(),
                authorship.researcher_id.to_string(),
                authorship.author_position,
                authorship.contribution_role,
                authorship.summary,
                authorship.created_at.to_rfc3339(),
            ],
        )?;
        Ok(changed > 0)
    }

    pub fn for_paper(&self, paper_id: &Uuid) -> Result<Vec<Authorship>> {
        let sql = format!(
            "SELECT {AUTHORSHIP_COLUMNS} FROM authorships WHERE paper_id = ?1 ORDER BY created_at"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![paper_id.to_string()], Self::row_to_authorship)?;
        let mut authorships = Vec::new();
        for row in rows {
            authorships.push(row?);
        }
        Ok(authorships)
    }
}

impl Repository for SqliteAuthorshipRepository<'_> {
    type Entity = Authorship;
    type Id = Uuid;

    fn find_by_id(&self, id: &Self::Id) -> Result<Option<Self::Entity>> {
        let sql = format!("SELECT {AUTHORSHIP_COLUMNS} FROM authorships WHERE id = ?1");
        let authorship = self
            .conn
            .query_row(&sql, params![id.to_string()], Self::row_to_authorship)
            .optional()?;
        Ok(authorship)
    }

    fn save(&self, authorship: &Self::Entity) -> Result<()> {
        self.insert_if_absent(authorship).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PaperEntity, ResearcherEntity};
    use crate::storage::database::open_in_memory;
    use crate::storage::repositories::{SqlitePaperRepository, SqliteResearcherRepository};

    #[test]
    fn test_pair_is_never_duplicated() {
        let pool = open_in_memory().unwrap();
        let conn = pool.get_connection();
        let paper = PaperEntity::new("Graph Attention Networks");
        let researcher = ResearcherEntity::new("Petar Velickovic");
        SqlitePaperRepository::new(&conn).save(&paper).unwrap();
        SqliteResearcherRepository::new(&conn).save(&researcher).unwrap();

        let repo = SqliteAuthorshipRepository::new(&conn);
        let first = Authorship::for_position(paper.id, researcher.id, 0, &paper.title);
        let again = Authorship::for_position(paper.id, researcher.id, 1, &paper.title);

        assert!(repo.insert_if_absent(&first).unwrap());
        assert!(!repo.insert_if_absent(&again).unwrap());
        assert!(repo.exists(&paper.id, &researcher.id).unwrap());

        let stored = repo.for_paper(&paper.id).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].author_position, "First Author");
        assert_eq!(repo.find_by_id(&first.id).unwrap().unwrap(), first);
    }
}
