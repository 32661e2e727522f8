//! The catalog: validation, the record store and the duplicate guard wired
//! together in the order every write must follow.

use serde::Serialize;
use tracing::info;

use crate::config::AppConfig;
use crate::duplicates::{DuplicateResolver, SimilarityMatch, Verdict};
use crate::error::{LibrisError, Result};
use crate::models::{Record, RecordDraft, RecordFields, RecordId};
use crate::storage::database::Database;
use crate::storage::repositories::{RecordRepository, Repository, SqliteRecordRepository};

/// Whether a person has already approved writing a near-duplicate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Confirmation {
    #[default]
    Pending,
    Confirmed,
}

/// Result of a guarded write.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Committed { id: RecordId },
    /// Nothing was written. Retry with [`Confirmation::Confirmed`] to proceed.
    NeedsConfirmation { matches: Vec<SimilarityMatch> },
    /// Nothing was written, and confirmation does not change that.
    Blocked { matches: Vec<SimilarityMatch> },
}

pub struct Catalog {
    store: Database,
    resolver: DuplicateResolver,
}

impl Catalog {
    pub fn new(store: Database, resolver: DuplicateResolver) -> Self {
        Self { store, resolver }
    }

    /// Open the configured database with the configured duplicate policy.
    pub fn open(config: &AppConfig) -> Result<Self> {
        config.validate()?;
        let store = Database::open(&config.database_path())?;
        Ok(Self::new(store, DuplicateResolver::new(config.duplicates)))
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::new(Database::open_in_memory()?, DuplicateResolver::default()))
    }

    pub fn close(self) -> Result<()> {
        self.store.close()
    }

    pub fn store(&self) -> &Database {
        &self.store
    }

    pub fn resolver(&self) -> &DuplicateResolver {
        &self.resolver
    }

    /// Verdict for adding `draft`, without writing anything.
    pub fn check_insert(&self, draft: &RecordDraft) -> Result<Verdict> {
        let fields = draft.validate()?;
        let repo = self.store.records();
        self.insert_verdict(&repo, &fields)
    }

    /// Verdict for replacing record `id` with `draft`, without writing anything.
    pub fn check_update(&self, id: RecordId, draft: &RecordDraft) -> Result<Verdict> {
        let fields = draft.validate()?;
        let repo = self.store.records();
        self.update_verdict(&repo, id, &fields)
    }

    /// Verdict for a bare title/author pair. With `updating`, the title is
    /// treated as the new title of that record.
    pub fn check_title(&self, title: &str, author: &str, updating: Option<RecordId>) -> Result<Verdict> {
        let repo = self.store.records();
        if let Some(id) = updating
            && repo.find_by_id(&id)?.is_none()
        {
            return Err(LibrisError::NotFound(id));
        }
        self.title_verdict(&repo, title, author, updating)
    }

    pub fn add(&self, draft: &RecordDraft, confirmation: Confirmation) -> Result<Outcome> {
        let fields = draft.validate()?;
        let repo = self.store.records();
        repo.write_transaction(|| {
            let verdict = self.insert_verdict(&repo, &fields)?;
            match gate(verdict, confirmation) {
                Some(outcome) => Ok(outcome),
                None => {
                    let id = repo.insert(&fields)?;
                    Ok(Outcome::Committed { id })
                }
            }
        })
    }

    pub fn update(
        &self,
        id: RecordId,
        draft: &RecordDraft,
        confirmation: Confirmation,
    ) -> Result<Outcome> {
        let fields = draft.validate()?;
        let repo = self.store.records();
        repo.write_transaction(|| {
            let verdict = self.update_verdict(&repo, id, &fields)?;
            match gate(verdict, confirmation) {
                Some(outcome) => Ok(outcome),
                None => {
                    repo.update(id, &fields)?;
                    Ok(Outcome::Committed { id })
                }
            }
        })
    }

    pub fn remove(&self, id: RecordId) -> Result<()> {
        self.store.delete(id)
    }

    pub fn get(&self, id: RecordId) -> Result<Record> {
        self.store.get(id)
    }

    pub fn list(&self) -> Result<Vec<Record>> {
        self.store.all()
    }

    pub fn search(&self, query: &str) -> Result<Vec<Record>> {
        self.store.search(query)
    }

    fn insert_verdict(&self, repo: &SqliteRecordRepository<'_>, fields: &RecordFields) -> Result<Verdict> {
        if repo.exact_duplicate_exists(&fields.title, &fields.author)? {
            return Err(LibrisError::duplicate(&fields.title, &fields.author));
        }
        self.title_verdict(repo, &fields.title, &fields.author, None)
    }

    fn update_verdict(
        &self,
        repo: &SqliteRecordRepository<'_>,
        id: RecordId,
        fields: &RecordFields,
    ) -> Result<Verdict> {
        if repo.find_by_id(&id)?.is_none() {
            return Err(LibrisError::NotFound(id));
        }
        if repo.exact_duplicate_exists_excluding(&fields.title, &fields.author, id)? {
            return Err(LibrisError::duplicate(&fields.title, &fields.author));
        }
        self.title_verdict(repo, &fields.title, &fields.author, Some(id))
    }

    /// The record's own row never takes part, so renaming a record to
    /// something close to its previous title is not flagged.
    fn title_verdict(
        &self,
        repo: &SqliteRecordRepository<'_>,
        title: &str,
        author: &str,
        updating: Option<RecordId>,
    ) -> Result<Verdict> {
        let verdict = match updating {
            None => {
                let titles = repo.titles_by_author(author)?;
                self.resolver.resolve_insert(title, author, &titles)
            }
            Some(id) => {
                let titles = repo.titles_by_author_excluding(author, id)?;
                self.resolver.resolve_update(title, author, &titles)
            }
        };
        Ok(verdict)
    }
}

/// `None` means the write may go ahead.
fn gate(verdict: Verdict, confirmation: Confirmation) -> Option<Outcome> {
    match (verdict, confirmation) {
        (Verdict::Allow, _) | (Verdict::Warn(_), Confirmation::Confirmed) => None,
        (Verdict::Warn(matches), Confirmation::Pending) => {
            info!(similar = matches.len(), "write held for confirmation");
            Some(Outcome::NeedsConfirmation { matches })
        }
        (Verdict::Blocked(matches), _) => {
            info!(top = ?matches.first().map(|m| &m.existing_title), "write blocked as duplicate");
            Some(Outcome::Blocked { matches })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Barrier};
    use std::thread;

    use tempfile::TempDir;

    use super::*;

    fn draft(title: &str, author: &str) -> RecordDraft {
        RecordDraft {
            title: title.to_string(),
            author: author.to_string(),
            publisher: "Ace".to_string(),
            year: "1965".to_string(),
            category: Some("Fiction".to_string()),
            quantity: "1".to_string(),
        }
    }

    fn committed(outcome: Outcome) -> RecordId {
        match outcome {
            Outcome::Committed { id } => id,
            other => panic!("expected commit, got {other:?}"),
        }
    }

    fn catalog_with_dune() -> (Catalog, RecordId) {
        let catalog = Catalog::open_in_memory().unwrap();
        let id = committed(
            catalog
                .add(&draft("Dune", "Frank Herbert"), Confirmation::Pending)
                .unwrap(),
        );
        (catalog, id)
    }

    #[test]
    fn test_add_distinct_title_commits() {
        let (catalog, _) = catalog_with_dune();
        let outcome = catalog
            .add(&draft("Foundation", "Frank Herbert"), Confirmation::Pending)
            .unwrap();
        committed(outcome);
        assert_eq!(catalog.list().unwrap().len(), 2);
    }

    #[test]
    fn test_add_exact_duplicate_is_error() {
        let (catalog, _) = catalog_with_dune();
        let err = catalog
            .add(&draft("Dune", "Frank Herbert"), Confirmation::Confirmed)
            .unwrap_err();
        assert!(matches!(err, LibrisError::Duplicate { .. }));
    }

    #[test]
    fn test_add_typo_is_blocked_even_when_confirmed() {
        let (catalog, _) = catalog_with_dune();
        // normalized identical
        let outcome = catalog
            .add(&draft("DUNE", "Frank Herbert"), Confirmation::Confirmed)
            .unwrap();
        assert!(matches!(outcome, Outcome::Blocked { ref matches } if matches[0].score == 1.0));
        assert_eq!(catalog.list().unwrap().len(), 1);
    }

    #[test]
    fn test_add_series_title_needs_confirmation() {
        let (catalog, _) = catalog_with_dune();
        let pending = catalog
            .add(&draft("Dune Messiah", "Frank Herbert"), Confirmation::Pending)
            .unwrap();
        match pending {
            Outcome::NeedsConfirmation { matches } => {
                assert_eq!(matches[0].existing_title, "Dune");
                assert_eq!(matches[0].score, 0.85);
            }
            other => panic!("expected confirmation request, got {other:?}"),
        }
        assert_eq!(catalog.list().unwrap().len(), 1);

        let confirmed = catalog
            .add(&draft("Dune Messiah", "Frank Herbert"), Confirmation::Confirmed)
            .unwrap();
        committed(confirmed);
        assert_eq!(catalog.list().unwrap().len(), 2);
    }

    #[test]
    fn test_other_author_not_compared() {
        let (catalog, _) = catalog_with_dune();
        let outcome = catalog
            .add(&draft("Dune", "Someone Else"), Confirmation::Pending)
            .unwrap();
        committed(outcome);
    }

    #[test]
    fn test_add_validation_error() {
        let catalog = Catalog::open_in_memory().unwrap();
        let mut d = draft("Dune", "Frank Herbert");
        d.quantity = "three".to_string();
        assert!(matches!(
            catalog.add(&d, Confirmation::Pending),
            Err(LibrisError::Validation(_))
        ));
    }

    #[test]
    fn test_update_unchanged_title_is_not_blocked() {
        let (catalog, id) = catalog_with_dune();
        let mut d = draft("Dune", "Frank Herbert");
        d.quantity = "5".to_string();

        assert_eq!(catalog.check_update(id, &d).unwrap(), Verdict::Allow);
        committed(catalog.update(id, &d, Confirmation::Pending).unwrap());
        assert_eq!(catalog.get(id).unwrap().quantity, 5);
    }

    #[test]
    fn test_update_near_own_title_is_ignored() {
        let (catalog, id) = catalog_with_dune();
        let outcome = catalog
            .update(id, &draft("Dune!", "Frank Herbert"), Confirmation::Pending)
            .unwrap();
        committed(outcome);
        assert_eq!(catalog.get(id).unwrap().title, "Dune!");
    }

    #[test]
    fn test_update_towards_other_record_is_blocked() {
        let (catalog, _) = catalog_with_dune();
        let id = committed(
            catalog
                .add(&draft("Emma", "Frank Herbert"), Confirmation::Pending)
                .unwrap(),
        );
        let outcome = catalog
            .update(id, &draft("dune", "Frank Herbert"), Confirmation::Confirmed)
            .unwrap();
        assert!(matches!(outcome, Outcome::Blocked { .. }));
        assert_eq!(catalog.get(id).unwrap().title, "Emma");
    }

    #[test]
    fn test_update_exact_duplicate_of_other_is_error() {
        let (catalog, _) = catalog_with_dune();
        let id = committed(
            catalog
                .add(&draft("Emma", "Frank Herbert"), Confirmation::Pending)
                .unwrap(),
        );
        let err = catalog
            .update(id, &draft("Dune", "Frank Herbert"), Confirmation::Confirmed)
            .unwrap_err();
        assert!(matches!(err, LibrisError::Duplicate { .. }));
    }

    #[test]
    fn test_update_missing_record() {
        let catalog = Catalog::open_in_memory().unwrap();
        let err = catalog
            .update(9, &draft("Dune", "Frank Herbert"), Confirmation::Pending)
            .unwrap_err();
        assert!(matches!(err, LibrisError::NotFound(9)));
    }

    #[test]
    fn test_check_insert_does_not_write() {
        let (catalog, _) = catalog_with_dune();
        let verdict = catalog.check_insert(&draft("Dune Messiah", "Frank Herbert")).unwrap();
        assert!(matches!(verdict, Verdict::Warn(_)));
        assert_eq!(catalog.list().unwrap().len(), 1);
    }

    #[test]
    fn test_check_title() {
        let (catalog, id) = catalog_with_dune();
        assert!(catalog.check_title("Dune", "Frank Herbert", None).unwrap().is_blocked());
        assert!(catalog.check_title("Dune", "Frank Herbert", Some(id)).unwrap().is_allowed());
        assert!(matches!(
            catalog.check_title("Dune", "Frank Herbert", Some(id + 100)),
            Err(LibrisError::NotFound(_))
        ));
    }

    #[test]
    fn test_remove_and_search() {
        let (catalog, id) = catalog_with_dune();
        assert_eq!(catalog.search("herbert").unwrap().len(), 1);
        catalog.remove(id).unwrap();
        assert!(catalog.search("herbert").unwrap().is_empty());
        assert!(matches!(catalog.remove(id), Err(LibrisError::NotFound(_))));
    }

    #[test]
    fn test_outcome_json_shape() {
        let json = serde_json::to_value(Outcome::Committed { id: 3 }).unwrap();
        assert_eq!(json["outcome"], "committed");
        assert_eq!(json["id"], 3);
    }

    #[test]
    fn test_concurrent_adds_commit_once() {
        let catalog = Arc::new(Catalog::open_in_memory().unwrap());
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let catalog = Arc::clone(&catalog);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    catalog.add(&draft("Dune", "Frank Herbert"), Confirmation::Confirmed)
                })
            })
            .collect();

        let mut commits = 0;
        for handle in handles {
            match handle.join().unwrap() {
                Ok(Outcome::Committed { .. }) => commits += 1,
                Ok(Outcome::Blocked { .. }) | Err(LibrisError::Duplicate { .. }) => {}
                other => panic!("unexpected result: {other:?}"),
            }
        }
        assert_eq!(commits, 1);
        assert_eq!(catalog.list().unwrap().len(), 1);
    }

    #[test]
    fn test_similarity_gate_holds_across_connections() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("library.db");
        let first = Catalog::new(Database::open(&path).unwrap(), DuplicateResolver::default());
        let second = Catalog::new(Database::open(&path).unwrap(), DuplicateResolver::default());
        let barrier = Barrier::new(2);

        let (a, b) = thread::scope(|s| {
            let a = s.spawn(|| {
                barrier.wait();
                first.add(&draft("Dune", "Frank Herbert"), Confirmation::Pending)
            });
            let b = s.spawn(|| {
                barrier.wait();
                second.add(&draft("Dune!", "Frank Herbert"), Confirmation::Pending)
            });
            (a.join().unwrap().unwrap(), b.join().unwrap().unwrap())
        });

        // whichever ran second saw the first title and was held back
        let commits = [&a, &b]
            .iter()
            .filter(|o| matches!(o, Outcome::Committed { .. }))
            .count();
        assert_eq!(commits, 1, "{a:?} / {b:?}");
        assert!(
            [&a, &b]
                .iter()
                .any(|o| matches!(o, Outcome::NeedsConfirmation { .. }))
        );
        assert_eq!(first.list().unwrap().len(), 1);

        first.close().unwrap();
        second.close().unwrap();
    }

    #[test]
    fn test_held_back_write_leaves_store_writable() {
        let (catalog, _) = catalog_with_dune();
        let outcome = catalog
            .add(&draft("Dune Messiah", "Frank Herbert"), Confirmation::Pending)
            .unwrap();
        assert!(matches!(outcome, Outcome::NeedsConfirmation { .. }));
        assert!(catalog.add(&draft("Dune", "Frank Herbert"), Confirmation::Pending).is_err());

        // neither the held-back nor the failed write left a transaction open
        committed(
            catalog
                .add(&draft("Children of Dune", "Frank Herbert"), Confirmation::Confirmed)
                .unwrap(),
        );
        assert_eq!(catalog.list().unwrap().len(), 2);
    }
}
