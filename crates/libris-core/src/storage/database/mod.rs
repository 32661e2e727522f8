mod connection;
mod migrations;
mod schema;

pub use connection::ConnectionPool;
pub use migrations::{get_applied_versions, run_migrations, Migration};
pub use schema::SCHEMA_VERSION;

use std::path::Path;

use crate::error::{LibrisError, Result};
use crate::models::{Record, RecordFields, RecordId};

use super::repositories::{RecordRepository, Repository, SqliteRecordRepository};

pub fn open_database(path: &Path) -> Result<ConnectionPool> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let pool = ConnectionPool::open(path)?;
    {
        let conn = pool.get_connection();
        migrations::run_migrations(&conn)?;
    }
    Ok(pool)
}

pub fn open_in_memory() -> Result<ConnectionPool> {
    let pool = ConnectionPool::open_in_memory()?;
    {
        let conn = pool.get_connection();
        migrations::run_migrations(&conn)?;
    }
    Ok(pool)
}

/// The record store: durable, keyed storage for catalog records.
///
/// Each method takes the connection lock for its whole duration. Callers
/// that need several steps to be atomic (check, then write) hold a
/// [`SqliteRecordRepository`] from [`Database::records`] instead.
pub struct Database {
    pool: ConnectionPool,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let pool = open_database(path)?;
        Ok(Self { pool })
    }

    pub fn open_in_memory() -> Result<Self> {
        let pool = open_in_memory()?;
        Ok(Self { pool })
    }

    pub fn close(self) -> Result<()> {
        self.pool.close()
    }

    pub fn path(&self) -> Option<&Path> {
        self.pool.path()
    }

    /// Exclusive access to the records table until the repository is dropped.
    pub fn records(&self) -> SqliteRecordRepository<'_> {
        SqliteRecordRepository::new(self.pool.get_connection())
    }

    pub fn exact_duplicate_exists(&self, title: &str, author: &str) -> Result<bool> {
        self.records().exact_duplicate_exists(title, author)
    }

    pub fn titles_by_author(&self, author: &str) -> Result<Vec<String>> {
        self.records().titles_by_author(author)
    }

    pub fn insert(&self, fields: &RecordFields) -> Result<RecordId> {
        self.records().insert(fields)
    }

    pub fn update(&self, id: RecordId, fields: &RecordFields) -> Result<()> {
        self.records().update(id, fields)
    }

    /// Deleting an id that does not exist is reported as `NotFound`.
    pub fn delete(&self, id: RecordId) -> Result<()> {
        if !self.records().delete(&id)? {
            return Err(LibrisError::NotFound(id));
        }
        Ok(())
    }

    pub fn get(&self, id: RecordId) -> Result<Record> {
        self.records()
            .find_by_id(&id)?
            .ok_or(LibrisError::NotFound(id))
    }

    pub fn search(&self, query: &str) -> Result<Vec<Record>> {
        self.records().search(query)
    }

    /// Every record in creation order.
    pub fn all(&self) -> Result<Vec<Record>> {
        self.records().list_all()
    }

    pub fn count(&self) -> Result<usize> {
        self.records().count()
    }

    pub fn applied_migrations(&self) -> Result<Vec<u32>> {
        let conn = self.pool.get_connection();
        get_applied_versions(&conn)
    }
}
