mod v1_initial;
mod v2_category;
mod v3_quantity;
mod v4_indexes;

use chrono::Utc;
use rusqlite::{Connection, TransactionBehavior};
use tracing::info;

use crate::error::{LibrisError, Result};

pub trait Migration {
    fn version(&self) -> u32;
    fn description(&self) -> &'static str;
    fn up(&self, conn: &Connection) -> Result<()>;
}

fn all_migrations() -> Vec<Box<dyn Migration>> {
    vec![
        Box::new(v1_initial::V1Initial),
        Box::new(v2_category::V2Category),
        Box::new(v3_quantity::V3Quantity),
        Box::new(v4_indexes::V4Indexes),
    ]
}

fn record_migration(conn: &Connection, version: u32) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO schema_migrations(version, applied_at) VALUES (?1, ?2)",
        rusqlite::params![version, Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

fn has_migrations_table(conn: &Connection) -> Result<bool> {
    let exists = conn
        .prepare("SELECT name FROM sqlite_master WHERE type='table' AND name='schema_migrations'")?
        .exists([])?;
    Ok(exists)
}

fn is_migration_applied(conn: &Connection, version: u32) -> Result<bool> {
    if !has_migrations_table(conn)? {
        return Ok(false);
    }

    let applied: bool = conn
        .prepare("SELECT 1 FROM schema_migrations WHERE version = ?1")?
        .exists(rusqlite::params![version])?;
    Ok(applied)
}

/// Bring the schema up to date. Either every pending migration is applied
/// or none is.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let tx = rusqlite::Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;

    for migration in all_migrations() {
        if is_migration_applied(&tx, migration.version())? {
            continue;
        }
        migration
            .up(&tx)
            .map_err(|e| LibrisError::Migration {
                version: migration.version(),
                message: e.to_string(),
            })?;
        record_migration(&tx, migration.version())?;
        info!(
            version = migration.version(),
            description = migration.description(),
            "applied migration"
        );
    }

    tx.commit()?;
    Ok(())
}

pub fn get_applied_versions(conn: &Connection) -> Result<Vec<u32>> {
    if !has_migrations_table(conn)? {
        return Ok(Vec::new());
    }

    let mut stmt = conn.prepare("SELECT version FROM schema_migrations ORDER BY version")?;
    let rows = stmt.query_map([], |row| row.get(0))?;
    let mut versions = Vec::new();
    for row in rows {
        versions.push(row?);
    }
    Ok(versions)
}
