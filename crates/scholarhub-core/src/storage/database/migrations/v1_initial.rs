use rusqlite::Connection;

use super::Migration;
use crate::error::Result;
use crate::storage::database::schema::create_tables;

pub struct V1Initial;

impl Migration for V1Initial {
    fn version(&self) -> u32 {
        1
    }

    fn description(&self) -> &'static str {
        "Create papers, researchers, authorships and external_publications"
    }

    fn up(&self, conn: &Connection) -> Result<()> {
        create_tables(conn)
    }
}
