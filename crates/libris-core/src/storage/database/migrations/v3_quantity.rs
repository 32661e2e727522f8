use rusqlite::Connection;

use super::Migration;
use crate::error::Result;
use crate::storage::database::schema::has_column;

pub struct V3Quantity;

impl Migration for V3Quantity {
    fn version(&self) -> u32 {
        3
    }

    fn description(&self) -> &'static str {
        "Add quantity column to books table"
    }

    fn up(&self, conn: &Connection) -> Result<()> {
        if !has_column(conn, "books", "quantity")? {
            conn.execute_batch(
                "ALTER TABLE books ADD COLUMN quantity INTEGER NOT NULL DEFAULT 0;",
            )?;
        }
        Ok(())
    }
}
