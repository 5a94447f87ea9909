use rusqlite::Connection;

use crate::error::Result;

pub const SCHEMA_VERSION: u32 = 2;

pub fn apply_pragmas(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        ",
    )?;
    Ok(())
}

pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version    INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS papers (
            id                    TEXT PRIMARY KEY,
            title                 TEXT NOT NULL,
            doi                   TEXT,
            abstract              TEXT,
            publication_date      TEXT,
            venue                 TEXT,
            citation_count        INTEGER NOT NULL DEFAULT 0,
            keywords              TEXT NOT NULL DEFAULT '[]',
            url                   TEXT,
            semantic_scholar_id   TEXT,
            openalex_id           TEXT,
            import_status         TEXT NOT NULL DEFAULT 'unattempted'
                                  CHECK(import_status IN ('unattempted', 'success', 'failed')),
            import_failure_reason TEXT,
            data_source           TEXT,
            last_import_attempt   TEXT,
            raw_data              TEXT NOT NULL DEFAULT '{}',
            created_at            TEXT NOT NULL,
            updated_at            TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS researchers (
            id                    TEXT PRIMARY KEY,
            name                  TEXT NOT NULL,
            email                 TEXT,
            affiliation           TEXT,
            current_position      TEXT,
            affiliation_history   TEXT NOT NULL DEFAULT '[]',
            aliases               TEXT NOT NULL DEFAULT '[]',
            orcid                 TEXT,
            semantic_scholar_id   TEXT,
            openalex_id           TEXT,
            scopus_id             TEXT,
            h_index               INTEGER NOT NULL DEFAULT 0,
            i10_index             INTEGER NOT NULL DEFAULT 0,
            paper_count           INTEGER NOT NULL DEFAULT 0,
            total_citations       INTEGER NOT NULL DEFAULT 0,
            research_interests    TEXT NOT NULL DEFAULT '[]',
            research_concepts     TEXT NOT NULL DEFAULT '[]',
            primary_research_area TEXT,
            url                   TEXT,
            avatar_url            TEXT,
            summary               TEXT,
            data_quality_score    INTEGER NOT NULL DEFAULT 0
                                  CHECK(data_quality_score BETWEEN 0 AND 100),
            last_enriched         TEXT,
            data_sources          TEXT NOT NULL DEFAULT '[]',
            raw_data              TEXT NOT NULL DEFAULT '{}',
            created_at            TEXT NOT NULL,
            updated_at            TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS authorships (
            id                TEXT PRIMARY KEY,
            paper_id          TEXT NOT NULL REFERENCES papers(id) ON DELETE CASCADE,
            researcher_id     TEXT NOT NULL REFERENCES researchers(id) ON DELETE CASCADE,
            author_position   TEXT NOT NULL,
            contribution_role TEXT NOT NULL,
            summary           TEXT,
            created_at        TEXT NOT NULL,
            UNIQUE(paper_id, researcher_id)
        );

        CREATE TABLE IF NOT EXISTS external_publications (
            id              INTEGER PRIMARY KEY,
            researcher_id   TEXT NOT NULL REFERENCES researchers(id) ON DELETE CASCADE,
            source_paper_id TEXT NOT NULL,
            title           TEXT NOT NULL,
            year            INTEGER,
            venue           TEXT,
            citation_count  INTEGER NOT NULL DEFAULT 0,
            doi             TEXT,
            is_imported     INTEGER NOT NULL DEFAULT 0,
            last_fetched    TEXT NOT NULL,
            UNIQUE(researcher_id, source_paper_id)
        );

        CREATE INDEX IF NOT EXISTS idx_papers_import_status ON papers(import_status);
        CREATE INDEX IF NOT EXISTS idx_authorships_researcher ON authorships(researcher_id);
        ",
    )?;
    Ok(())
}

/// Optional identifiers are unique only when present.
pub fn create_identity_indexes(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE UNIQUE INDEX IF NOT EXISTS uq_papers_doi
            ON papers(doi) WHERE doi IS NOT NULL;
        CREATE UNIQUE INDEX IF NOT EXISTS uq_papers_semantic_scholar
            ON papers(semantic_scholar_id) WHERE semantic_scholar_id IS NOT NULL;
        CREATE UNIQUE INDEX IF NOT EXISTS uq_papers_openalex
            ON papers(openalex_id) WHERE openalex_id IS NOT NULL;

        CREATE UNIQUE INDEX IF NOT EXISTS uq_researchers_orcid
            ON researchers(orcid) WHERE orcid IS NOT NULL;
        CREATE UNIQUE INDEX IF NOT EXISTS uq_researchers_semantic_scholar
            ON researchers(semantic_scholar_id) WHERE semantic_scholar_id IS NOT NULL;
        CREATE UNIQUE INDEX IF NOT EXISTS uq_researchers_openalex
            ON researchers(openalex_id) WHERE openalex_id IS NOT NULL;
        CREATE UNIQUE INDEX IF NOT EXISTS uq_researchers_scopus
            ON researchers(scopus_id) WHERE scopus_id IS NOT NULL;

        CREATE INDEX IF NOT EXISTS idx_researchers_name_nocase
            ON researchers(name COLLATE NOCASE);
        ",
    )?;
    Ok(())
}
