use serde::{Deserialize, Serialize};

use crate::error::{LibrisError, Result};

/// Score thresholds driving the duplicate guard.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DuplicatePolicy {
    /// Top score at or above which a write is refused outright.
    pub block_threshold: f64,
    /// Matches must score strictly above this to be reported at all;
    /// anything reported below `block_threshold` is a warning.
    pub warn_threshold: f64,
    /// Minimum score granted when one normalized title contains the other.
    pub substring_floor: f64,
}

impl Default for DuplicatePolicy {
    fn default() -> Self {
        Self {
            block_threshold: 0.9,
            warn_threshold: 0.7,
            substring_floor: 0.85,
        }
    }
}

impl DuplicatePolicy {
    pub fn validate(&self) -> Result<()> {
        let thresholds = [
            ("block_threshold", self.block_threshold),
            ("warn_threshold", self.warn_threshold),
            ("substring_floor", self.substring_floor),
        ];
        for (name, value) in thresholds {
            if !(0.0..=1.0).contains(&value) {
                return Err(LibrisError::Config(format!(
                    "duplicates.{name} must be within [0, 1], got {value}"
                )));
            }
        }
        if self.warn_threshold > self.block_threshold {
            return Err(LibrisError::Config(format!(
                "duplicates.warn_threshold ({}) exceeds block_threshold ({})",
                self.warn_threshold, self.block_threshold
            )));
        }
        Ok(())
    }
}
