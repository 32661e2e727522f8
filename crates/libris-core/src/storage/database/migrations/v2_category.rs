use rusqlite::Connection;

use super::Migration;
use crate::error::Result;
use crate::storage::database::schema::has_column;

pub struct V2Category;

impl Migration for V2Category {
    fn version(&self) -> u32 {
        2
    }

    fn description(&self) -> &'static str {
        "Add category column to books table"
    }

    fn up(&self, conn: &Connection) -> Result<()> {
        if !has_column(conn, "books", "category")? {
            conn.execute_batch(
                "ALTER TABLE books ADD COLUMN category TEXT NOT NULL DEFAULT 'Other';",
            )?;
        }
        Ok(())
    }
}
