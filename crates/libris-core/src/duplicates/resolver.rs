use serde::{Deserialize, Serialize};
use tracing::debug;

use super::sequence;
use super::{DuplicatePolicy, Verdict};

/// One existing title that resembles the candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityMatch {
    /// The stored title with its original casing and spacing.
    pub existing_title: String,
    pub score: f64,
}

/// Comparison form of a title: lowercased, outer whitespace removed.
/// The ASCII separators U+001C..U+001F count as whitespace here.
pub fn normalize_title(title: &str) -> String {
    title.trim_matches(is_title_padding).to_lowercase()
}

fn is_title_padding(c: char) -> bool {
    c.is_whitespace() || ('\u{1c}'..='\u{1f}').contains(&c)
}

/// Pure scoring and classification of a candidate title against the titles
/// already catalogued for the same author. Performs no I/O.
#[derive(Debug, Clone, Default)]
pub struct DuplicateResolver {
    policy: DuplicatePolicy,
}

impl DuplicateResolver {
    pub fn new(policy: DuplicatePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &DuplicatePolicy {
        &self.policy
    }

    /// Score every existing title and keep those above the warn threshold,
    /// best first. Equal scores keep their input order.
    pub fn find_similar<S: AsRef<str>>(
        &self,
        candidate_title: &str,
        candidate_author: &str,
        existing_titles: &[S],
    ) -> Vec<SimilarityMatch> {
        let candidate = normalize_title(candidate_title);

        let mut matches: Vec<SimilarityMatch> = existing_titles
            .iter()
            .filter_map(|existing| {
                let existing: &str = existing.as_ref();
                let score = self.score(&candidate, &normalize_title(existing));
                (score > self.policy.warn_threshold).then(|| SimilarityMatch {
                    existing_title: existing.to_string(),
                    score,
                })
            })
            .collect();

        // stable: ties keep discovery order
        matches.sort_by(|a, b| b.score.total_cmp(&a.score));

        debug!(
            title = candidate_title,
            author = candidate_author,
            compared = existing_titles.len(),
            matched = matches.len(),
            top = matches.first().map(|m| m.score),
            "scored candidate title"
        );
        matches
    }

    /// Both arguments must already be normalized.
    fn score(&self, candidate: &str, existing: &str) -> f64 {
        if candidate == existing {
            return 1.0;
        }
        let ratio = sequence::ratio(candidate, existing);
        if candidate.contains(existing) || existing.contains(candidate) {
            ratio.max(self.policy.substring_floor)
        } else {
            ratio
        }
    }

    /// Turn a ranked match list into a verdict based on its top score.
    pub fn classify(&self, matches: Vec<SimilarityMatch>) -> Verdict {
        let Some(top) = matches.first().map(|m| m.score) else {
            return Verdict::Allow;
        };
        if top >= self.policy.block_threshold {
            Verdict::Blocked(matches)
        } else if top >= self.policy.warn_threshold {
            Verdict::Warn(matches)
        } else {
            Verdict::Allow
        }
    }

    pub fn resolve_insert<S: AsRef<str>>(
        &self,
        candidate_title: &str,
        candidate_author: &str,
        existing_titles: &[S],
    ) -> Verdict {
        self.classify(self.find_similar(candidate_title, candidate_author, existing_titles))
    }

    /// Like `resolve_insert`, but an exact hit on the candidate's own title
    /// does not count against it.
    pub fn resolve_update<S: AsRef<str>>(
        &self,
        candidate_title: &str,
        candidate_author: &str,
        existing_titles: &[S],
    ) -> Verdict {
        let matches = self.find_similar(candidate_title, candidate_author, existing_titles);
        self.classify(without_self_match(matches, candidate_title))
    }
}

/// Drop entries that are exactly the candidate's own title.
pub(crate) fn without_self_match(
    matches: Vec<SimilarityMatch>,
    candidate_title: &str,
) -> Vec<SimilarityMatch> {
    matches
        .into_iter()
        .filter(|m| !(m.score == 1.0 && m.existing_title == candidate_title))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const HERBERT: &str = "Frank Herbert";

    fn resolver() -> DuplicateResolver {
        DuplicateResolver::default()
    }

    #[test]
    fn test_exact_match_scores_one() {
        let matches = resolver().find_similar("Dune", HERBERT, &["Dune"]);
        assert_eq!(
            matches,
            vec![SimilarityMatch {
                existing_title: "Dune".to_string(),
                score: 1.0
            }]
        );
    }

    #[test]
    fn test_case_and_whitespace_ignored() {
        let matches = resolver().find_similar(" dune ", HERBERT, &["Dune"]);
        assert_eq!(matches[0].score, 1.0);
        assert_eq!(matches[0].existing_title, "Dune");
    }

    #[test]
    fn test_separator_controls_trimmed() {
        assert_eq!(normalize_title("\u{1c}Dune\u{1f} "), "dune");
        assert_eq!(normalize_title("\u{85}Dune\u{3000}"), "dune");
        assert_eq!(normalize_title("Du\u{1d}ne"), "du\u{1d}ne");

        let matches = resolver().find_similar("\u{1e}Dune\u{1e}", HERBERT, &["Dune"]);
        assert_eq!(matches[0].score, 1.0);
    }

    #[test]
    fn test_substring_bonus() {
        let matches = resolver().find_similar("Dune", HERBERT, &["Dune Messiah"]);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].score, 0.85);
    }

    #[test]
    fn test_substring_bonus_never_lowers() {
        // "children of dune!" contains the candidate and already scores higher
        let matches = resolver().find_similar("Children of Dune", HERBERT, &["Children of Dune!"]);
        assert!(matches[0].score > 0.96);
    }

    #[test]
    fn test_below_threshold_excluded() {
        let titles = ["Foundation", "Children of Dune", "God Emperor of Dune"];
        assert!(resolver().find_similar("Dune Messiah", HERBERT, &titles).is_empty());
    }

    #[test]
    fn test_threshold_is_strict() {
        // ratio("the hobbit", "the rabbit") is exactly 0.8
        let strict = DuplicateResolver::new(DuplicatePolicy {
            warn_threshold: 0.8,
            ..Default::default()
        });
        assert!(strict.find_similar("The Hobbit", "Tolkien", &["The Rabbit"]).is_empty());
        assert_eq!(resolver().find_similar("The Hobbit", "Tolkien", &["The Rabbit"]).len(), 1);
    }

    #[test]
    fn test_sorted_descending() {
        let titles = ["Dune Messiah", "Dunes", "DUNE", "Heretics of Dune"];
        let matches = resolver().find_similar("Dune", HERBERT, &titles);
        let titles: Vec<_> = matches.iter().map(|m| m.existing_title.as_str()).collect();
        assert_eq!(titles, vec!["DUNE", "Dunes", "Dune Messiah", "Heretics of Dune"]);
        assert!(matches.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_ties_keep_input_order() {
        let titles = ["Dune Messiah", "Dune: Part Two"];
        let matches = resolver().find_similar("dune", HERBERT, &titles);
        assert_eq!(matches[0].existing_title, "Dune Messiah");
        assert_eq!(matches[1].existing_title, "Dune: Part Two");
    }

    #[test]
    fn test_idempotent() {
        let titles = vec!["Dune".to_string(), "Dune Messiah".to_string()];
        let r = resolver();
        assert_eq!(
            r.find_similar("dune", HERBERT, &titles),
            r.find_similar("dune", HERBERT, &titles)
        );
    }

    #[test]
    fn test_empty_inputs() {
        let none: [&str; 0] = [];
        assert!(resolver().find_similar("Dune", HERBERT, &none).is_empty());
        assert_eq!(resolver().resolve_insert("Dune", HERBERT, &none), Verdict::Allow);
    }

    #[test]
    fn test_non_ascii_titles() {
        let matches = resolver().find_similar("Ça va", "Anon", &["ca va", "Ça va"]);
        assert_eq!(matches[0].existing_title, "Ça va");
        assert_eq!(matches[0].score, 1.0);
        assert!((matches[1].score - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_classify_blocked() {
        let verdict = resolver().resolve_insert("The Hobit", "Tolkien", &["The Hobbit"]);
        assert!(verdict.is_blocked());
        assert_eq!(verdict.top().unwrap().existing_title, "The Hobbit");
    }

    #[test]
    fn test_classify_warn() {
        let verdict = resolver().resolve_insert("Dune", HERBERT, &["Dune Messiah", "Foundation"]);
        match verdict {
            Verdict::Warn(matches) => {
                assert_eq!(matches.len(), 1);
                assert_eq!(matches[0].existing_title, "Dune Messiah");
            }
            other => panic!("expected warn, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_allow() {
        let verdict = resolver().resolve_insert("Foundation", "Isaac Asimov", &["I, Robot"]);
        assert_eq!(verdict, Verdict::Allow);
    }

    #[test]
    fn test_update_ignores_own_title() {
        let titles = ["Dune", "Dune Messiah"];
        let verdict = resolver().resolve_update("Dune", HERBERT, &titles);
        assert!(!verdict.is_blocked());
        assert_eq!(verdict.matches().len(), 1);
        assert_eq!(verdict.top().unwrap().existing_title, "Dune Messiah");

        assert!(resolver().resolve_insert("Dune", HERBERT, &titles).is_blocked());
    }

    #[test]
    fn test_self_match_filter_is_case_sensitive() {
        // normalized equal but not the same raw title: still another record
        let verdict = resolver().resolve_update("dune", HERBERT, &["Dune"]);
        assert!(verdict.is_blocked());
    }
}
