//! Ratcliff/Obershelp sequence similarity over Unicode scalar values.
//!
//! The matcher finds the longest common contiguous block, then recurses on
//! the unmatched text to its left and right. `ratio` is `2 * M / T` where
//! `M` is the total size of all matching blocks and `T` the combined length.
//! Scores are bit-for-bit compatible with the classic `SequenceMatcher`
//! (no junk predicate, auto-junk enabled).

use std::collections::{HashMap, HashSet};

/// Sequences at least this long get their "popular" elements dropped from
/// the index.
const AUTOJUNK_MIN_LEN: usize = 200;

/// A contiguous run where `a[a_start..a_start + size] == b[b_start..b_start + size]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MatchingBlock {
    pub a_start: usize,
    pub b_start: usize,
    pub size: usize,
}

pub struct SequenceMatcher {
    a: Vec<char>,
    b: Vec<char>,
    /// Positions of each element of `b`, ascending, minus popular elements.
    b2j: HashMap<char, Vec<usize>>,
}

impl SequenceMatcher {
    pub fn new(a: &str, b: &str) -> Self {
        let a: Vec<char> = a.chars().collect();
        let b: Vec<char> = b.chars().collect();
        let b2j = index_positions(&b);
        Self { a, b, b2j }
    }

    /// Similarity in `[0, 1]`. Two empty strings are identical.
    pub fn ratio(&self) -> f64 {
        let total = self.a.len() + self.b.len();
        if total == 0 {
            return 1.0;
        }
        let matches: usize = self.matching_blocks().iter().map(|m| m.size).sum();
        2.0 * matches as f64 / total as f64
    }

    /// All matching blocks, ordered by position. Zero-sized blocks are omitted.
    pub fn matching_blocks(&self) -> Vec<MatchingBlock> {
        let mut queue = vec![(0, self.a.len(), 0, self.b.len())];
        let mut blocks = Vec::new();

        while let Some((alo, ahi, blo, bhi)) = queue.pop() {
            let m = self.find_longest_match(alo, ahi, blo, bhi);
            if m.size == 0 {
                continue;
            }
            blocks.push(m);
            if alo < m.a_start && blo < m.b_start {
                queue.push((alo, m.a_start, blo, m.b_start));
            }
            if m.a_start + m.size < ahi && m.b_start + m.size < bhi {
                queue.push((m.a_start + m.size, ahi, m.b_start + m.size, bhi));
            }
        }

        blocks.sort();
        blocks
    }

    /// Longest block in `a[alo..ahi]` / `b[blo..bhi]`. Ties go to the block
    /// starting earliest in `a`, then earliest in `b`.
    fn find_longest_match(&self, alo: usize, ahi: usize, blo: usize, bhi: usize) -> MatchingBlock {
        let (a, b) = (&self.a, &self.b);
        let mut best = MatchingBlock {
            a_start: alo,
            b_start: blo,
            size: 0,
        };

        // j2len[j] = length of the longest match ending at a[i - 1], b[j]
        let mut j2len: HashMap<usize, usize> = HashMap::new();
        for (i, elt) in a.iter().enumerate().take(ahi).skip(alo) {
            let mut next: HashMap<usize, usize> = HashMap::new();
            if let Some(positions) = self.b2j.get(elt) {
                for &j in positions {
                    if j < blo {
                        continue;
                    }
                    if j >= bhi {
                        break;
                    }
                    let k = j
                        .checked_sub(1)
                        .and_then(|prev| j2len.get(&prev))
                        .copied()
                        .unwrap_or(0)
                        + 1;
                    next.insert(j, k);
                    if k > best.size {
                        best = MatchingBlock {
                            a_start: i + 1 - k,
                            b_start: j + 1 - k,
                            size: k,
                        };
                    }
                }
            }
            j2len = next;
        }

        // Popular elements are absent from the index but still count as
        // matches when they border a block.
        while best.a_start > alo && best.b_start > blo && a[best.a_start - 1] == b[best.b_start - 1] {
            best.a_start -= 1;
            best.b_start -= 1;
            best.size += 1;
        }
        while best.a_start + best.size < ahi
            && best.b_start + best.size < bhi
            && a[best.a_start + best.size] == b[best.b_start + best.size]
        {
            best.size += 1;
        }

        best
    }
}

fn index_positions(b: &[char]) -> HashMap<char, Vec<usize>> {
    let mut b2j: HashMap<char, Vec<usize>> = HashMap::new();
    for (j, &elt) in b.iter().enumerate() {
        b2j.entry(elt).or_default().push(j);
    }

    if b.len() >= AUTOJUNK_MIN_LEN {
        let limit = b.len() / 100 + 1;
        let popular: HashSet<char> = b2j
            .iter()
            .filter(|(_, positions)| positions.len() > limit)
            .map(|(&elt, _)| elt)
            .collect();
        for elt in popular {
            b2j.remove(&elt);
        }
    }

    b2j
}

/// Shorthand for `SequenceMatcher::new(a, b).ratio()`.
pub fn ratio(a: &str, b: &str) -> f64 {
    SequenceMatcher::new(a, b).ratio()
}
