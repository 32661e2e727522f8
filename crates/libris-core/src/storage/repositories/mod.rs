mod record_repository;

pub use record_repository::{RecordRepository, SqliteRecordRepository};

use crate::error::Result;

pub trait Repository {
    type Entity;
    type Id;

    fn find_by_id(&self, id: &Self::Id) -> Result<Option<Self::Entity>>;
    fn delete(&self, id: &Self::Id) -> Result<bool>;
}
