//! Similarity-aware duplicate guard for same-author titles.

mod policy;
mod resolver;
pub mod sequence;
mod verdict;

pub use policy::DuplicatePolicy;
pub use resolver::{normalize_title, DuplicateResolver, SimilarityMatch};
pub use sequence::SequenceMatcher;
pub use verdict::Verdict;
