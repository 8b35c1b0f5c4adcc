//! Prediction of memories the caller will need next.
//!
//! Two predictors produce [`PredictedMemory`] values from caller signals:
//! [`BehavioralPredictor`] and [`FileBasedPredictor`]. Each assigns a base
//! confidence per signal source, adds recency and usage boosts, drops ids a
//! higher-priority source already produced, then sorts and truncates.
//! [`PredictionService`] runs both and merges by memory id.

mod behavioral;
mod file_based;

pub use behavioral::{
    BehavioralPredictor, FREQUENT_BASE, INTENT_BASE, PATTERN_BASE, QUERY_BASE, TASK_BASE,
};
pub use file_based::{
    ACTIVE_FILE_BASE, DIRECTORY_BASE, FILE_PATTERN_BASE, FileBasedPredictor, HEAVY_USE_BOOST,
    HEAVY_USE_THRESHOLD, RECENT_FILE_BASE,
};

use crate::Result;
use crate::cancellation::Cancellation;
use crate::config::PredictionConfig;
use crate::models::{
    ConfidenceBreakdown, Memory, MemoryId, PredictedMemory, PredictionSignals, PredictionSource,
    PredictionStrategy,
};
use crate::observability::metrics::PREDICTIONS_TOTAL;
use crate::storage::MemoryStore;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::instrument;

/// Recent signals of one kind considered per request.
pub const MAX_RECENT_SIGNALS: usize = 5;

/// Boost for records updated recently.
#[must_use]
pub fn recency_boost(days_since_update: f64) -> f64 {
    if days_since_update < 1.0 {
        0.1
    } else if days_since_update < 7.0 {
        0.05
    } else if days_since_update < 30.0 {
        0.02
    } else {
        0.0
    }
}

/// Boost for records the store is confident in.
#[must_use]
pub fn usage_boost(confidence: f64) -> f64 {
    if confidence >= 0.9 {
        0.05
    } else if confidence >= 0.7 {
        0.02
    } else {
        0.0
    }
}

/// Orders predictions by confidence, highest first, then by id.
fn by_confidence(a: &PredictedMemory, b: &PredictedMemory) -> Ordering {
    b.confidence
        .total_cmp(&a.confidence)
        .then_with(|| a.memory_id.cmp(&b.memory_id))
}

/// Accumulates one predictor's output in signal-priority order.
///
/// The first signal to offer a record wins; later offers of the same id are
/// ignored. Superseded records are never predicted.
pub(crate) struct Collector {
    strategy: PredictionStrategy,
    now: DateTime<Utc>,
    seen: HashSet<MemoryId>,
    out: Vec<PredictedMemory>,
}

impl Collector {
    pub(crate) fn new(strategy: PredictionStrategy, now: DateTime<Utc>) -> Self {
        Self {
            strategy,
            now,
            seen: HashSet::new(),
            out: Vec::new(),
        }
    }

    /// Offers `memory` under `signal`. Returns true if it was accepted.
    pub(crate) fn offer(
        &mut self,
        memory: &Memory,
        base: f64,
        extra_usage: f64,
        signal: String,
        reason: &str,
    ) -> bool {
        if !memory.is_live() || !self.seen.insert(memory.id.clone()) {
            return false;
        }
        let breakdown = ConfidenceBreakdown {
            base,
            recency_boost: recency_boost(memory.days_since_update(self.now)),
            usage_boost: usage_boost(memory.confidence.value()) + extra_usage,
        };
        self.out.push(PredictedMemory {
            memory_id: memory.id.clone(),
            confidence: breakdown.total(),
            source: PredictionSource {
                strategy: self.strategy,
                reason: reason.to_string(),
                contributing_signals: vec![signal],
                confidence_breakdown: breakdown,
            },
        });
        true
    }

    pub(crate) fn finish(mut self, max: usize) -> Vec<PredictedMemory> {
        self.out.sort_by(by_confidence);
        self.out.truncate(max);
        self.out
    }
}

/// Merges predictor outputs by memory id.
///
/// The highest confidence (and its source) wins; contributing signals are
/// unioned in order of first appearance. The result is sorted and truncated
/// to `max`.
#[must_use]
pub fn merge(
    outputs: impl IntoIterator<Item = Vec<PredictedMemory>>,
    max: usize,
) -> Vec<PredictedMemory> {
    let mut merged: BTreeMap<MemoryId, PredictedMemory> = BTreeMap::new();
    for prediction in outputs.into_iter().flatten() {
        match merged.get_mut(&prediction.memory_id) {
            None => {
                merged.insert(prediction.memory_id.clone(), prediction);
            },
            Some(existing) => {
                let mut signals = std::mem::take(&mut existing.source.contributing_signals);
                for s in &prediction.source.contributing_signals {
                    if !signals.contains(s) {
                        signals.push(s.clone());
                    }
                }
                if prediction.confidence > existing.confidence {
                    existing.confidence = prediction.confidence;
                    existing.source = prediction.source;
                }
                existing.source.contributing_signals = signals;
            },
        }
    }

    let mut out: Vec<PredictedMemory> = merged.into_values().collect();
    out.sort_by(by_confidence);
    out.truncate(max);
    out
}

/// Runs both predictors against a store and merges their output.
pub struct PredictionService {
    store: Arc<dyn MemoryStore>,
    config: PredictionConfig,
    behavioral: BehavioralPredictor,
    file_based: FileBasedPredictor,
}

impl std::fmt::Debug for PredictionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredictionService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl PredictionService {
    /// Creates a prediction service.
    #[must_use]
    pub fn new(store: Arc<dyn MemoryStore>, config: PredictionConfig) -> Self {
        Self {
            store,
            behavioral: BehavioralPredictor::new(config),
            file_based: FileBasedPredictor::new(config),
            config,
        }
    }

    /// Predicts the memories the caller will need next.
    ///
    /// Empty signals yield an empty list without touching the store.
    ///
    /// # Errors
    ///
    /// Returns the store's error or [`crate::Error::Cancelled`].
    #[instrument(skip_all, fields(operation = "predict", predicted = tracing::field::Empty))]
    pub fn predict(
        &self,
        signals: &PredictionSignals,
        cancel: &Cancellation,
    ) -> Result<Vec<PredictedMemory>> {
        if signals.is_empty() {
            return Ok(Vec::new());
        }
        let now = Utc::now();
        let behavioral =
            self.behavioral
                .predict(&signals.behavioral, self.store.as_ref(), cancel, now)?;
        let file_based = self
            .file_based
            .predict(&signals.file, self.store.as_ref(), cancel, now)?;

        let predictions = merge([behavioral, file_based], self.config.max_predictions);
        for p in &predictions {
            metrics::counter!(PREDICTIONS_TOTAL, "strategy" => p.source.strategy.as_str())
                .increment(1);
        }
        tracing::Span::current().record("predicted", predictions.len());
        Ok(predictions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BehavioralSignals, FileSignals, MemoryContent, TribalPayload};
    use crate::storage::InMemoryMemoryStore;
    use test_case::test_case;

    fn prediction(id: &str, confidence: f64, signal: &str) -> PredictedMemory {
        PredictedMemory {
            memory_id: MemoryId::new(id),
            confidence,
            source: PredictionSource {
                strategy: PredictionStrategy::Behavioral,
                reason: String::new(),
                contributing_signals: vec![signal.to_string()],
                confidence_breakdown: ConfidenceBreakdown::default(),
            },
        }
    }

    #[test_case(0.5, 0.1)]
    #[test_case(3.0, 0.05)]
    #[test_case(10.0, 0.02)]
    #[test_case(45.0, 0.0)]
    fn test_recency_boost(days: f64, expected: f64) {
        assert!((recency_boost(days) - expected).abs() < f64::EPSILON);
    }

    #[test_case(0.95, 0.05)]
    #[test_case(0.7, 0.02)]
    #[test_case(0.5, 0.0)]
    fn test_usage_boost(confidence: f64, expected: f64) {
        assert!((usage_boost(confidence) - expected).abs() < f64::EPSILON);
    }

    #[test]
    fn test_merge_keeps_max_and_unions_signals() {
        let merged = merge(
            [
                vec![prediction("mem-a", 0.7, "query:auth"), prediction("mem-b", 0.6, "task")],
                vec![prediction("mem-a", 0.9, "file:src/auth.rs")],
            ],
            10,
        );
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].memory_id.as_str(), "mem-a");
        assert!((merged[0].confidence - 0.9).abs() < f64::EPSILON);
        assert_eq!(
            merged[0].source.contributing_signals,
            ["query:auth", "file:src/auth.rs"]
        );
    }

    #[test]
    fn test_merge_truncates() {
        let merged = merge(
            [vec![
                prediction("mem-a", 0.5, "x"),
                prediction("mem-b", 0.9, "x"),
                prediction("mem-c", 0.7, "x"),
            ]],
            2,
        );
        let ids: Vec<&str> = merged.iter().map(|p| p.memory_id.as_str()).collect();
        assert_eq!(ids, ["mem-b", "mem-c"]);
    }

    #[test]
    fn test_service_runs_both_predictors() {
        let store = Arc::new(InMemoryMemoryStore::with_memories([
            Memory::new("mem-auth", "token rotation", MemoryContent::Tribal(TribalPayload::default()))
                .with_file("src/auth.rs"),
            Memory::new("mem-db", "pool sizing", MemoryContent::Tribal(TribalPayload::default())),
        ]));
        let service = PredictionService::new(store, PredictionConfig::default());
        let signals = PredictionSignals {
            behavioral: BehavioralSignals {
                frequent_memories: vec![MemoryId::new("mem-db")],
                ..BehavioralSignals::default()
            },
            file: FileSignals {
                active_file: Some("src/auth.rs".to_string()),
                ..FileSignals::default()
            },
        };

        let predicted = service.predict(&signals, &Cancellation::none()).unwrap();
        let ids: Vec<&str> = predicted.iter().map(|p| p.memory_id.as_str()).collect();
        assert_eq!(ids, ["mem-auth", "mem-db"]);
        assert_eq!(predicted[0].source.strategy, PredictionStrategy::FileBased);
        assert!(predicted.iter().all(|p| p.confidence <= 1.0));
    }

    #[test]
    fn test_empty_signals_skip_store() {
        let store = Arc::new(InMemoryMemoryStore::new());
        store.set_available(false);
        let service = PredictionService::new(store, PredictionConfig::default());
        assert!(
            service
                .predict(&PredictionSignals::default(), &Cancellation::none())
                .unwrap()
                .is_empty()
        );
    }
}
