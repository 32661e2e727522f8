use serde::Serialize;

use super::SimilarityMatch;

/// Outcome of the duplicate guard for one candidate record.
///
/// The core never asks for confirmation itself: `Warn` is handed to the
/// presentation layer, which decides whether to retry the write.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "verdict", content = "matches", rename_all = "lowercase")]
pub enum Verdict {
    Allow,
    Warn(Vec<SimilarityMatch>),
    Blocked(Vec<SimilarityMatch>),
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked(_))
    }

    /// Matches behind the verdict, best first. Empty for `Allow`.
    pub fn matches(&self) -> &[SimilarityMatch] {
        match self {
            Self::Allow => &[],
            Self::Warn(m) | Self::Blocked(m) => m,
        }
    }

    pub fn top(&self) -> Option<&SimilarityMatch> {
        self.matches().first()
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Allow => write!(f, "allow"),
            Self::Warn(_) => write!(f, "warn"),
            Self::Blocked(_) => write!(f, "blocked"),
        }
    }
}
