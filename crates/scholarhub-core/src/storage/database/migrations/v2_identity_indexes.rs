use rusqlite::Connection;

use super::Migration;
use crate::error::Result;
use crate::storage::database::schema::create_identity_indexes;

pub struct V2IdentityIndexes;

impl Migration for V2IdentityIndexes {
    fn version(&self) -> u32 {
        2
    }

    fn description(&self) -> &'static str {
        "Partial unique indexes on external identifiers"
    }

    fn up(&self, conn: &Connection) -> Result<()> {
        create_identity_indexes(conn)
    }
}
