use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::sync::MutexGuard;
use tracing::{info, warn};

use crate::error::{LibrisError, Result};
use crate::models::{Category, Record, RecordFields, RecordId};

use super::Repository;

pub trait RecordRepository: Repository<Entity = Record, Id = RecordId> {
    fn exact_duplicate_exists(&self, title: &str, author: &str) -> Result<bool>;
    fn exact_duplicate_exists_excluding(&self, title: &str, author: &str, id: RecordId) -> Result<bool>;
    fn titles_by_author(&self, author: &str) -> Result<Vec<String>>;
    fn titles_by_author_excluding(&self, author: &str, id: RecordId) -> Result<Vec<String>>;
    fn insert(&self, fields: &RecordFields) -> Result<RecordId>;
    fn update(&self, id: RecordId, fields: &RecordFields) -> Result<()>;
    fn list_all(&self) -> Result<Vec<Record>>;
    fn search(&self, query: &str) -> Result<Vec<Record>>;
    fn count(&self) -> Result<usize>;
}

/// Record access through a held connection guard. Everything done through
/// one repository value is serialized against every other catalog user.
pub struct SqliteRecordRepository<'a> {
    conn: MutexGuard<'a, Connection>,
}

const RECORD_COLUMNS: &str = "id, title, author, publisher, year, category, quantity";

impl<'a> SqliteRecordRepository<'a> {
    pub fn new(conn: MutexGuard<'a, Connection>) -> Self {
        Self { conn }
    }

    /// Run `body` inside an IMMEDIATE transaction, committing only if it
    /// returns `Ok`. The database write lock is taken up front, so no other
    /// connection can write between the reads and writes `body` performs.
    /// Nested calls join the transaction already open.
    pub fn write_transaction<T>(&self, body: impl FnOnce() -> Result<T>) -> Result<T> {
        if !self.conn.is_autocommit() {
            return body();
        }
        let tx = rusqlite::Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
        let value = body()?;
        tx.commit()?;
        Ok(value)
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<Record> {
        let id: RecordId = row.get(0)?;
        let category_str: String = row.get(5)?;
        let category = category_str.parse::<Category>().unwrap_or_else(|_| {
            warn!(id, category = %category_str, "unknown category in storage, reading as Other");
            Category::Other
        });

        Ok(Record {
            id,
            title: row.get(1)?,
            author: row.get(2)?,
            publisher: row.get(3)?,
            year: row.get(4)?,
            category,
            quantity: row.get(6)?,
        })
    }

    fn duplicate_exists_excluding(
        conn: &Connection,
        title: &str,
        author: &str,
        id: Option<RecordId>,
    ) -> Result<bool> {
        let exists = conn
            .prepare(
                "SELECT 1 FROM books
                 WHERE title = ?1 AND author = ?2 AND (?3 IS NULL OR id != ?3)",
            )?
            .exists(params![title, author, id])?;
        Ok(exists)
    }
}

impl<'a> Repository for SqliteRecordRepository<'a> {
    type Entity = Record;
    type Id = RecordId;

    fn find_by_id(&self, id: &Self::Id) -> Result<Option<Self::Entity>> {
        let record = self
            .conn
            .query_row(
                &format!("SELECT {RECORD_COLUMNS} FROM books WHERE id = ?1"),
                params![id],
                Self::row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    fn delete(&self, id: &Self::Id) -> Result<bool> {
        let deleted = self.conn.execute("DELETE FROM books WHERE id = ?1", params![id])?;
        if deleted > 0 {
            info!(id, "deleted record");
        }
        Ok(deleted > 0)
    }
}

impl<'a> RecordRepository for SqliteRecordRepository<'a> {
    fn exact_duplicate_exists(&self, title: &str, author: &str) -> Result<bool> {
        Self::duplicate_exists_excluding(&self.conn, title, author, None)
    }

    fn exact_duplicate_exists_excluding(&self, title: &str, author: &str, id: RecordId) -> Result<bool> {
        Self::duplicate_exists_excluding(&self.conn, title, author, Some(id))
    }

    fn titles_by_author(&self, author: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT title FROM books WHERE author = ?1 ORDER BY id")?;
        let titles = stmt
            .query_map(params![author], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(titles)
    }

    fn titles_by_author_excluding(&self, author: &str, id: RecordId) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT title FROM books WHERE author = ?1 AND id != ?2 ORDER BY id")?;
        let titles = stmt
            .query_map(params![author, id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(titles)
    }

    fn insert(&self, fields: &RecordFields) -> Result<RecordId> {
        fields.check_required()?;

        let id = self.write_transaction(|| {
            if Self::duplicate_exists_excluding(&self.conn, &fields.title, &fields.author, None)? {
                return Err(LibrisError::duplicate(&fields.title, &fields.author));
            }
            self.conn.execute(
                "INSERT INTO books (title, author, publisher, year, category, quantity)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    fields.title,
                    fields.author,
                    fields.publisher,
                    fields.year,
                    fields.category.as_str(),
                    fields.quantity,
                ],
            )?;
            Ok(self.conn.last_insert_rowid())
        })?;

        info!(id, title = %fields.title, author = %fields.author, "inserted record");
        Ok(id)
    }

    fn update(&self, id: RecordId, fields: &RecordFields) -> Result<()> {
        fields.check_required()?;

        self.write_transaction(|| {
            let present = self
                .conn
                .prepare("SELECT 1 FROM books WHERE id = ?1")?
                .exists(params![id])?;
            if !present {
                return Err(LibrisError::NotFound(id));
            }
            if Self::duplicate_exists_excluding(&self.conn, &fields.title, &fields.author, Some(id))? {
                return Err(LibrisError::duplicate(&fields.title, &fields.author));
            }
            self.conn.execute(
                "UPDATE books
                 SET title = ?1, author = ?2, publisher = ?3, year = ?4, category = ?5, quantity = ?6
                 WHERE id = ?7",
                params![
                    fields.title,
                    fields.author,
                    fields.publisher,
                    fields.year,
                    fields.category.as_str(),
                    fields.quantity,
                    id,
                ],
            )?;
            Ok(())
        })?;

        info!(id, title = %fields.title, author = %fields.author, "updated record");
        Ok(())
    }

    fn list_all(&self) -> Result<Vec<Record>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {RECORD_COLUMNS} FROM books ORDER BY id"))?;
        let records = stmt
            .query_map([], Self::row_to_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Case-insensitive substring search over title, author and category.
    /// Folding happens here rather than in SQL: SQLite's LIKE folds ASCII only.
    fn search(&self, query: &str) -> Result<Vec<Record>> {
        let needle = query.to_lowercase();
        let records = self
            .list_all()?
            .into_iter()
            .filter(|r| {
                r.title.to_lowercase().contains(&needle)
                    || r.author.to_lowercase().contains(&needle)
                    || r.category.as_str().to_lowercase().contains(&needle)
            })
            .collect();
        Ok(records)
    }

    fn count(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row("SELECT COUNT(*) FROM books", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
