use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use super::Repository;
use super::columns::{json_at, opt_timestamp_at, timestamp_at, uuid_at};
use crate::error::Result;
use crate::models::{DataSource, ResearcherEntity, ResearcherExternalIds, ResearcherMetrics};

const RESEARCHER_COLUMNS: &str = "id, name, email, affiliation, current_position,
     affiliation_history, aliases, orcid, semantic_scholar_id, openalex_id, scopus_id,
     h_index, i10_index, paper_count, total_citations, research_interests,
     research_concepts, primary_research_area, url, avatar_url, summary,
     data_quality_score, last_enriched, data_sources, raw_data, created_at, updated_at";

pub struct SqliteResearcherRepository<'a> {
    conn: &'a Connection,
}

fn id_column(source: DataSource) -> Option<&'static str> {
    match source {
        DataSource::Orcid => Some("orcid"),
        DataSource::SemanticScholar => Some("semantic_scholar_id"),
        DataSource::OpenAlex => Some("openalex_id"),
        DataSource::Crossref => None,
    }
}

impl<'a> SqliteResearcherRepository<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn row_to_researcher(row: &rusqlite::Row) -> rusqlite::Result<ResearcherEntity> {
        Ok(ResearcherEntity {
            id: uuid_at(row, 0)?,
            name: row.get(1)?,
            email: row.get(2)?,
            affiliation: row.get(3)?,
            current_position: row.get(4)?,
            affiliation_history: json_at(row, 5)?,
            aliases: json_at(row, 6)?,
            external_ids: ResearcherExternalIds {
                orcid: row.get(7)?,
                semantic_scholar: row.get(8)?,
                openalex: row.get(9)?,
                scopus: row.get(10)?,
            },
            metrics: ResearcherMetrics {
                h_index: row.get(11)?,
                i10_index: row.get(12)?,
                paper_count: row.get(13)?,
                total_citations: row.get(14)?,
            },
            research_interests: json_at(row, 15)?,
            research_concepts: json_at(row, 16)?,
            primary_research_area: row.get(17)?,
            url: row.get(18)?,
            avatar_url: row.get(19)?,
            summary: row.get(20)?,
            data_quality_score: row.get(21)?,
            last_enriched: opt_timestamp_at(row, 22)?,
            data_sources: json_at(row, 23)?,
            raw_data: json_at(row, 24)?,
            created_at: timestamp_at(row, 25)?,
            updated_at: timestamp_at(row, 26)?,
        })
    }

    fn find_where(&self, clause: &str, value: &str) -> Result<Option<ResearcherEntity>> {
        let sql = format!("SELECT {RESEARCHER_COLUMNS} FROM researchers WHERE {clause} LIMIT 1");
        let researcher = self
            .conn
            .query_row(&sql, params![value], Self::row_to_researcher)
            .optional()?;
        Ok(researcher)
    }

    pub fn find_by_external_id(
        &self,
        source: DataSource,
        id: &str,
    ) -> Result<Option<ResearcherEntity>> {
        match id_column(source) {
            Some(column) => self.find_where(&format!("{column} = ?1"), id),
            None => Ok(None),
        }
    }

    /// Scopus author ids are not a `DataSource`, so they get their own lookup.
    pub fn find_by_scopus_id(&self, scopus_id: &str) -> Result<Option<ResearcherEntity>> {
        self.find_where("scopus_id = ?1", scopus_id)
    }

    /// Case-insensitive exact match on the display name.
    pub fn find_by_name(&self, name: &str) -> Result<Option<ResearcherEntity>> {
        self.find_where("name = ?1 COLLATE NOCASE ORDER BY created_at", name.trim())
    }

    pub fn list(&self, limit: Option<usize>) -> Result<Vec<ResearcherEntity>> {
        let mut sql = format!("SELECT {RESEARCHER_COLUMNS} FROM researchers ORDER BY created_at");
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], Self::row_to_researcher)?;
        let mut researchers = Vec::new();
        for row in rows {
            researchers.push(row?);
        }
        Ok(researchers)
    }
}

impl Repository for SqliteResearcherRepository<'_> {
    type Entity = ResearcherEntity;
    type Id = Uuid;

    fn find_by_id(&self, id: &Self::Id) -> Result<Option<Self::Entity>> {
        self.find_where("id = ?1", &id.to_string())
    }

    fn save(&self, r: &Self::Entity) -> Result<()> {
        let history_json = serde_json::to_string(&r.affiliation_history)?;
        let aliases_json = serde_json::to_string(&r.aliases)?;
        let interests_json = serde_json::to_string(&r.research_interests)?;
        let concepts_json = serde_json::to_string(&r.research_concepts)?;
        let sources_json = serde_json::to_string(&r.data_sources)?;
        let raw_json = serde_json::to_string(&r.raw_data)?;

        self.conn.execute(
            "INSERT INTO researchers
                (id, name, email, affiliation, current_position, affiliation_history, aliases,
                 orcid, semantic_scholar_id, openalex_id, scopus_id, h_index, i10_index,
                 paper_count, total_citations, research_interests, research_concepts,
                 primary_research_area, url, avatar_url, summary, data_quality_score,
                 last_enriched, data_sources, raw_data, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                     ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                email = excluded.email,
                affiliation = excluded.affiliation,
                current_position = excluded.current_position,
                affiliation_history = excluded.affiliation_history,
                aliases = excluded.aliases,
                orcid = excluded.orcid,
                semantic_scholar_id = excluded.semantic_scholar_id,
                openalex_id = excluded.openalex_id,
                scopus_id = excluded.scopus_id,
                h_index = excluded.h_index,
                i10_index = excluded.i10_index,
                paper_count = excluded.paper_count,
                total_citations = excluded.total_citations,
                research_interests = excluded.research_interests,
                research_concepts = excluded.research_concepts,
                primary_research_area = excluded.primary_research_area,
                url = excluded.url,
                avatar_url = excluded.avatar_url,
                summary = excluded.summary,
                data_quality_score = excluded.data_quality_score,
                last_enriched = excluded.last_enriched,
                data_sources = excluded.data_sources,
                raw_data = excluded.raw_data,
                updated_at = excluded.updated_at",
            params![
                r.id.to_string(),
                r.name,
                r.email,
                r.affiliation,
                r.current_position,
                history_json,
                aliases_json,
                r.external_ids.orcid,
                r.external_ids.semantic_scholar,
                r.external_ids.openalex,
                r.external_ids.scopus,
                r.metrics.h_index,
                r.metrics.i10_index,
                r.metrics.paper_count,
                r.metrics.total_citations,
                interests_json,
                concepts_json,
                r.primary_research_area,
                r.url,
                r.avatar_url,
                r.summary,
                r.data_quality_score,
                r.last_enriched.map(|t| t.to_rfc3339()),
                sources_json,
                raw_json,
                r.created_at.to_rfc3339(),
                r.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}
