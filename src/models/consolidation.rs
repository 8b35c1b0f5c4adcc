//! Memory consolidation types.

use super::{ConsolidationStatus, MemoryId};
use serde::{Deserialize, Serialize};

/// A higher-level record built from episodes.
///
/// Only the episode references matter for pruning; the abstraction itself is
/// usually persisted separately as a semantic memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Abstraction {
    /// Abstraction id.
    pub id: MemoryId,
    /// Episodes folded into the abstraction.
    pub source_episodes: Vec<MemoryId>,
}

impl Abstraction {
    /// Creates an abstraction over `source_episodes`.
    #[must_use]
    pub fn new(
        id: impl Into<MemoryId>,
        source_episodes: impl IntoIterator<Item = impl Into<MemoryId>>,
    ) -> Self {
        Self {
            id: id.into(),
            source_episodes: source_episodes.into_iter().map(Into::into).collect(),
        }
    }
}

/// Selection criteria for the replay phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayOptions {
    /// Minimum age in days (exclusive).
    pub min_age_days: f64,
    /// Only replay episodes in this status, if set.
    pub status: Option<ConsolidationStatus>,
    /// Maximum episodes returned.
    pub limit: usize,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self {
            min_age_days: 7.0,
            status: Some(ConsolidationStatus::Pending),
            limit: 100,
        }
    }
}

/// Outcome of the pruning phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PruneResult {
    /// Episodes newly marked pruned.
    pub pruned: Vec<MemoryId>,
    /// Estimated tokens no longer served (full-compression estimate).
    pub tokens_freed: usize,
}

impl PruneResult {
    /// Number of pruned episodes.
    #[must_use]
    pub fn count(&self) -> usize {
        self.pruned.len()
    }
}

/// Summary of a consolidation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsolidationStats {
    /// Episodes selected by replay.
    pub replayed: usize,
    /// Episodes marked pruned.
    pub pruned: usize,
    /// Records whose confidence was boosted.
    pub strengthened: usize,
    /// Idle records whose confidence decayed.
    #[serde(default)]
    pub decayed: usize,
    /// Records skipped because of per-record failures.
    pub skipped: usize,
    /// Estimated tokens freed by pruning.
    pub tokens_freed: usize,
}

impl ConsolidationStats {
    /// Returns true if the run changed nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.pruned == 0 && self.strengthened == 0 && self.decayed == 0
    }
}
