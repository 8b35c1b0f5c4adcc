//! Prediction types. Predictions are ephemeral and never persisted.

use super::MemoryId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which predictor produced a prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionStrategy {
    /// Behavioral signals (frequency, task, queries, intents, patterns).
    Behavioral,
    /// File-context signals (active file, patterns, recent files, directory).
    FileBased,
}

impl PredictionStrategy {
    /// Returns the strategy as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Behavioral => "behavioral",
            Self::FileBased => "file_based",
        }
    }
}

impl fmt::Display for PredictionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a prediction's confidence was assembled.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ConfidenceBreakdown {
    /// Base confidence of the contributing signal.
    pub base: f64,
    /// Boost for recently updated memories.
    pub recency_boost: f64,
    /// Boost for confident or heavily used memories.
    pub usage_boost: f64,
}

impl ConfidenceBreakdown {
    /// Returns `base + boosts`, capped at 1.0.
    #[must_use]
    pub fn total(&self) -> f64 {
        (self.base + self.recency_boost + self.usage_boost).min(1.0)
    }
}

/// Provenance of a prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionSource {
    /// Predictor that produced it.
    pub strategy: PredictionStrategy,
    /// Human-readable reason.
    pub reason: String,
    /// Signals that contributed, strongest first.
    pub contributing_signals: Vec<String>,
    /// Confidence components.
    pub confidence_breakdown: ConfidenceBreakdown,
}

/// A record predicted to be needed next.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictedMemory {
    /// Predicted memory.
    pub memory_id: MemoryId,
    /// Final, boosted confidence in `[0, 1]`.
    pub confidence: f64,
    /// Why it was predicted.
    pub source: PredictionSource,
}

/// Behavioral signals supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BehavioralSignals {
    /// Memories the user touches most, most frequent first.
    pub frequent_memories: Vec<MemoryId>,
    /// Free-text description of the current task.
    pub current_task: Option<String>,
    /// Recent queries, newest first.
    pub recent_queries: Vec<String>,
    /// Recent intents, newest first.
    pub recent_intents: Vec<super::Intent>,
    /// Learned user patterns (tags or topics the user gravitates to).
    pub user_patterns: Vec<String>,
}

/// File-context signals supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSignals {
    /// File currently open.
    pub active_file: Option<String>,
    /// Pattern ids detected in the active file.
    pub file_patterns: Vec<String>,
    /// Recently opened files, newest first.
    pub recent_files: Vec<String>,
    /// Directory of the active file.
    pub directory: Option<String>,
}

/// Signals for one prediction request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionSignals {
    /// Behavioral signals.
    pub behavioral: BehavioralSignals,
    /// File-context signals.
    pub file: FileSignals,
}

impl PredictionSignals {
    /// Returns true if no signal is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}
