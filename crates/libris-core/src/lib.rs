pub mod catalog;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod models;
pub mod storage;

pub use catalog::{Catalog, Confirmation, Outcome};
pub use config::{AppConfig, CoreConfig, LoggingConfig};
pub use duplicates::{DuplicatePolicy, DuplicateResolver, SimilarityMatch, Verdict};
pub use error::{ExitCode, LibrisError, Result};
pub use models::*;

pub use storage::database::{ConnectionPool, Database, open_database, open_in_memory};
pub use storage::repositories::{RecordRepository, Repository, SqliteRecordRepository};
