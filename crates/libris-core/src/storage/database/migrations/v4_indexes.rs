use rusqlite::Connection;

use super::Migration;
use crate::error::Result;
use crate::storage::database::schema;

pub struct V4Indexes;

impl Migration for V4Indexes {
    fn version(&self) -> u32 {
        4
    }

    fn description(&self) -> &'static str {
        "Index books by author and by title/author"
    }

    fn up(&self, conn: &Connection) -> Result<()> {
        schema::create_indexes(conn)
    }
}
