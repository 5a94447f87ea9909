use std::collections::HashSet;

use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use super::Repository;
use super::columns::{json_at, opt_date_at, opt_timestamp_at, parsed_at, timestamp_at, uuid_at};
use crate::error::Result;
use crate::models::{DataSource, ImportStatus, PaperEntity, PaperExternalIds};

const PAPER_COLUMNS: &str = "id, title, doi, abstract, publication_date, venue, citation_count,
     keywords, url, semantic_scholar_id, openalex_id, import_status, import_failure_reason,
     data_source, last_import_attempt, raw_data, created_at, updated_at";

/// Selection for bulk enrichment runs.
#[derive(Debug, Clone, Default)]
pub struct PaperFilter {
    pub statuses: Vec<ImportStatus>,
    pub limit: Option<usize>,
}

pub struct SqlitePaperRepository<'a> {
    conn: &'a Connection,
}

fn id_column(source: DataSource) -> Option<&'static str> {
    match source {
        DataSource::SemanticScholar => Some("semantic_scholar_id"),
        DataSource::OpenAlex => Some("openalex_id"),
        DataSource::Crossref | DataSource::Orcid => None,
    }
}

impl<'a> SqlitePaperRepository<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn row_to_paper(row: &rusqlite::Row) -> rusqlite::Result<PaperEntity> {
        Ok(PaperEntity {
            id: uuid_at(row, 0)?,
            title: row.get(1)?,
            doi: row.get(2)?,
            abstract_text: row.get(3)?,
            publication_date: opt_date_at(row, 4)?,
            venue: row.get(5)?,
            citation_count: row.get(6)?,
            keywords: json_at(row, 7)?,
            url: row.get(8)?,
            external_ids: PaperExternalIds {
                semantic_scholar: row.get(9)?,
                openalex: row.get(10)?,
            },
            import_status: parsed_at(row, 11)?.unwrap_or_default(),
            import_failure_reason: row.get(12)?,
            data_source: parsed_at(row, 13)?,
            last_import_attempt: opt_timestamp_at(row, 14)?,
            raw_data: json_at(row, 15)?,
            created_at: timestamp_at(row, 16)?,
            updated_at: timestamp_at(row, 17)?,
        })
    }

    fn find_where(&self, clause: &str, value: &str) -> Result<Option<PaperEntity>> {
        let sql = format!("SELECT {PAPER_COLUMNS} FROM papers WHERE {clause} LIMIT 1");
        let paper = self
            .conn
            .query_row(&sql, params![value], Self::row_to_paper)
            .optional()?;
        Ok(paper)
    }

    pub fn find_by_doi(&self, doi: &str) -> Result<Option<PaperEntity>> {
        self.find_where("lower(doi) = lower(?1)", doi)
    }

    pub fn find_by_external_id(&self, source: DataSource, id: &str) -> Result<Option<PaperEntity>> {
        match id_column(source) {
            Some(column) => self.find_where(&format!("{column} = ?1"), id),
            None if source == DataSource::Crossref => self.find_by_doi(id),
            None => Ok(None),
        }
    }

    /// True when some paper other than `except` already holds `id` for `source`.
    pub fn external_id_claimed(&self, source: DataSource, id: &str, except: &Uuid) -> Result<bool> {
        let Some(column) = id_column(source) else {
            return Ok(false);
        };
        let sql = format!("SELECT 1 FROM papers WHERE {column} = ?1 AND id != ?2");
        let claimed = self
            .conn
            .prepare(&sql)?
            .exists(params![id, except.to_string()])?;
        Ok(claimed)
    }

    pub fn external_ids(&self, source: DataSource) -> Result<HashSet<String>> {
        let Some(column) = id_column(source) else {
            return Ok(HashSet::new());
        };
        let sql = format!("SELECT {column} FROM papers WHERE {column} IS NOT NULL");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut ids = HashSet::new();
        for row in rows {
            ids.insert(row?);
        }
        Ok(ids)
    }

    pub fn list(&self, filter: &PaperFilter) -> Result<Vec<PaperEntity>> {
        let mut sql = format!("SELECT {PAPER_COLUMNS} FROM papers");
        if !filter.statuses.is_empty() {
            let quoted: Vec<String> = filter
                .statuses
                .iter()
                .map(|s| format!("'{s}'"))
                .collect();
            sql.push_str(&format!(" WHERE import_status IN ({})", quoted.join(", ")));
        }
        sql.push_str(" ORDER BY created_at");
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], Self::row_to_paper)?;
        let mut papers = Vec::new();
        for row in rows {
            papers.push(row?);
        }
        Ok(papers)
    }

    pub fn for_researcher(&self, researcher_id: &Uuid) -> Result<Vec<PaperEntity>> {
        let columns = PAPER_COLUMNS
            .split(',')
            .map(|c| format!("p.{}", c.trim()))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT {columns} FROM papers p
             JOIN authorships a ON a.paper_id = p.id
             WHERE a.researcher_id = ?1
             ORDER BY p.publication_date DESC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![researcher_id.to_string()], Self::row_to_paper)?;
        let mut papers = Vec::new();
        for row in rows {
            papers.push(row?);
        }
        Ok(papers)
    }
}

impl Repository for SqlitePaperRepository<'_> {
    type Entity = PaperEntity;
    type Id = Uuid;

    fn find_by_id(&self, id: &Self::Id) -> Result<Option<Self::Entity>> {
        self.find_where("id = ?1", &id.to_string())
    }

    fn save(&self, paper: &Self::Entity) -> Result<()> {
        let keywords_json = serde_json::to_string(&paper.keywords)?;
        let raw_json = serde_json::to_string(&paper.raw_data)?;

        self.conn.execute(
            "INSERT INTO papers
                (id, title, doi, abstract, publication_date, venue, citation_count,
                 keywords, url, semantic_scholar_id, openalex_id, import_status,
                 import_failure_reason, data_source, last_import_attempt, raw_data,
                 created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
             ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                doi = excluded.doi,
                abstract = excluded.abstract,
                publication_date = excluded.publication_date,
                venue = excluded.venue,
                citation_count = excluded.citation_count,
                keywords = excluded.keywords,
                url = excluded.url,
                semantic_scholar_id = excluded.semantic_scholar_id,
                openalex_id = excluded.openalex_id,
                import_status = excluded.import_status,
                import_failure_reason = excluded.import_failure_reason,
                data_source = excluded.data_source,
                last_import_attempt = excluded.last_import_attempt,
                raw_data = excluded.raw_data,
                updated_at = excluded.updated_at",
            params![
                paper.id.to_string(),
                paper.title,
                paper.doi,
                paper.abstract_text,
                paper.publication_date.map(|d| d.format("%Y-%m-%d").to_string()),
                paper.venue,
                paper.citation_count,
                keywords_json,
                paper.url,
                paper.external_ids.semantic_scholar,
                paper.external_ids.openalex,
                paper.import_status.to_string(),
                paper.import_failure_reason,
                paper.data_source.map(|s| s.as_str()),
                paper.last_import_attempt.map(|t| t.to_rfc3339()),
                raw_json,
                paper.created_at.to_rfc3339(),
                paper.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}
