use rusqlite::Connection;

use crate::error::Result;

pub const SCHEMA_VERSION: u32 = 4;

pub fn apply_pragmas(conn: &Connection) -> Result<()> {
    // journal_mode reports the resulting mode as a row
    let _mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
    Ok(())
}

pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version    INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS books (
            id        INTEGER PRIMARY KEY AUTOINCREMENT,
            title     TEXT NOT NULL,
            author    TEXT NOT NULL,
            publisher TEXT NOT NULL,
            year      TEXT NOT NULL
        );
        ",
    )?;
    Ok(())
}

pub fn has_column(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let exists = conn
        .prepare("SELECT 1 FROM pragma_table_info(?1) WHERE name = ?2")?
        .exists(rusqlite::params![table, column])?;
    Ok(exists)
}

pub fn create_indexes(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE INDEX IF NOT EXISTS idx_books_author       ON books(author);
        CREATE INDEX IF NOT EXISTS idx_books_title_author ON books(title, author);
        ",
    )?;
    Ok(())
}
