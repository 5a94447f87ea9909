use rusqlite::{Connection, params};
use uuid::Uuid;

use super::columns::{timestamp_at, uuid_at};
use crate::error::Result;
use crate::models::ExternalPublication;

pub struct SqlitePublicationRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqlitePublicationRepository<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn row_to_publication(row: &rusqlite::Row) -> rusqlite::Result<ExternalPublication> {
        Ok(ExternalPublication {
            researcher_id: uuid_at(row, 0)?,
            source_paper_id: row.get(1)?,
            title: row.get(2)?,
            year: row.get(3)?,
            venue: row.get(4)?,
            citation_count: row.get(5)?,
            doi: row.get(6)?,
            is_imported: row.get(7)?,
            last_fetched: timestamp_at(row, 8)?,
        })
    }

    pub fn for_researcher(&self, researcher_id: &Uuid) -> Result<Vec<ExternalPublication>> {
        let mut stmt = self.conn.prepare(
            "SELECT researcher_id, source_paper_id, title, year, venue, citation_count, doi,
                    is_imported, last_fetched
             FROM external_publications
             WHERE researcher_id = ?1
             ORDER BY year DESC, citation_count DESC",
        )?;
        let rows = stmt.query_map(params![researcher_id.to_string()], Self::row_to_publication)?;
        let mut publications = Vec::new();
        for row in rows {
            publications.push(row?);
        }
        Ok(publications)
    }

    /// Deletes every non-imported row for the researcher and inserts `entries`.
    /// Entries whose id is already imported for this researcher are skipped.
    /// Callers wrap this in a transaction.
    pub fn replace_non_imported(
        &self,
        researcher_id: &Uuid,
        entries: &[ExternalPublication],
    ) -> Result<usize> {
        self.conn.execute(
            "DELETE FROM external_publications WHERE researcher_id = ?1 AND is_imported = 0",
            params![researcher_id.to_string()],
        )?;

        let mut stmt = self.conn.prepare(
            "INSERT INTO external_publications
                (researcher_id, source_paper_id, title, year, venue, citation_count, doi,
                 is_imported, last_fetched)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(researcher_id, source_paper_id) DO NOTHING",
        )?;
        let mut inserted = 0;
        for entry in entries {
            inserted += stmt.execute(params![
                researcher_id.to_string(),
                entry.source_paper_id,
                entry.title,
                entry.year,
                entry.venue,
                entry.citation_count,
                entry.doi,
                entry.is_imported,
                entry.last_fetched.to_rfc3339(),
            ])?;
        }
        Ok(inserted)
    }

    pub fn mark_imported(&self, researcher_id: &Uuid, source_paper_id: &str) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE external_publications SET is_imported = 1
             WHERE researcher_id = ?1 AND source_paper_id = ?2",
            params![researcher_id.to_string(), source_paper_id],
        )?;
        Ok(changed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ResearcherEntity;
    use crate::storage::database::open_in_memory;
    use crate::storage::repositories::{Repository, SqliteResearcherRepository};
    use chrono::Utc;

    fn entry(researcher_id: Uuid, id: &str) -> ExternalPublication {
        ExternalPublication {
            researcher_id,
            source_paper_id: id.to_string(),
            title: format!("Work {id}"),
            year: Some(2021),
            venue: Some("NeurIPS".to_string()),
            citation_count: 10,
            doi: None,
            is_imported: false,
            last_fetched: Utc::now(),
        }
    }

    #[test]
    fn test_replace_keeps_imported_rows() {
        let pool = open_in_memory().unwrap();
        let conn = pool.get_connection();
        let researcher = ResearcherEntity::new("Demis Hassabis");
        SqliteResearcherRepository::new(&conn).save(&researcher).unwrap();

        let repo = SqlitePublicationRepository::new(&conn);
        repo.replace_non_imported(
            &researcher.id,
            &[entry(researcher.id, "p1"), entry(researcher.id, "p2")],
        )
        .unwrap();
        assert!(repo.mark_imported(&researcher.id, "p1").unwrap());

        let inserted = repo
            .replace_non_imported(
                &researcher.id,
                &[entry(researcher.id, "p1"), entry(researcher.id, "p3")],
            )
            .unwrap();
        assert_eq!(inserted, 1);

        let rows = repo.for_researcher(&researcher.id).unwrap();
        let mut ids: Vec<_> = rows.iter().map(|r| r.source_paper_id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, vec!["p1", "p3"]);
        assert!(rows.iter().any(|r| r.source_paper_id == "p1" && r.is_imported));
    }
}
