//! File-context predictor.

use super::{Collector, MAX_RECENT_SIGNALS};
use crate::Result;
use crate::cancellation::Cancellation;
use crate::config::PredictionConfig;
use crate::models::{FileSignals, Memory, PredictedMemory, PredictionStrategy};
use crate::storage::{MemoryQuery, MemoryStore};
use chrono::{DateTime, Utc};

/// Base confidence for records linked to the active file.
pub const ACTIVE_FILE_BASE: f64 = 0.9;
/// Base confidence for records linked to a pattern found in the active file.
pub const FILE_PATTERN_BASE: f64 = 0.7;
/// Base confidence for records linked to a recently opened file.
pub const RECENT_FILE_BASE: f64 = 0.5;
/// Base confidence for records linked to a file in the same directory.
pub const DIRECTORY_BASE: f64 = 0.4;
/// Extra usage boost for heavily read records.
pub const HEAVY_USE_BOOST: f64 = 0.03;
/// Access count at which [`HEAVY_USE_BOOST`] applies.
pub const HEAVY_USE_THRESHOLD: u64 = 10;

/// Predicts from the files the user is working in.
#[derive(Debug, Clone, Copy)]
pub struct FileBasedPredictor {
    config: PredictionConfig,
}

impl FileBasedPredictor {
    /// Creates a file-based predictor.
    #[must_use]
    pub const fn new(config: PredictionConfig) -> Self {
        Self { config }
    }

    /// Predicts from `signals`, reading candidates from `store`.
    ///
    /// # Errors
    ///
    /// Returns the store's error or [`crate::Error::Cancelled`].
    pub fn predict(
        &self,
        signals: &FileSignals,
        store: &dyn MemoryStore,
        cancel: &Cancellation,
        now: DateTime<Utc>,
    ) -> Result<Vec<PredictedMemory>> {
        let mut collector = Collector::new(PredictionStrategy::FileBased, now);
        let active = signals.active_file.as_deref().filter(|f| !f.is_empty());

        if let Some(file) = active {
            cancel.check("predict.active_file")?;
            for memory in sorted(store.find_by_file(file)?) {
                offer(
                    &mut collector,
                    &memory,
                    ACTIVE_FILE_BASE,
                    format!("file:{file}"),
                    "linked to active file",
                );
            }
        }

        let directory = signals
            .directory
            .as_deref()
            .map(|d| d.trim_end_matches('/'))
            .filter(|d| !d.is_empty());
        let pool = if signals.file_patterns.is_empty() && directory.is_none() {
            Vec::new()
        } else {
            cancel.check("predict.file_pool")?;
            sorted(store.search_all(
                &MemoryQuery::new().live_only(),
                self.config.candidate_limit,
                cancel,
            )?)
        };

        for pattern in &signals.file_patterns {
            for memory in pool.iter().filter(|m| m.links.patterns.contains(pattern)) {
                offer(
                    &mut collector,
                    memory,
                    FILE_PATTERN_BASE,
                    format!("pattern:{pattern}"),
                    "uses pattern in active file",
                );
            }
        }

        for file in signals
            .recent_files
            .iter()
            .filter(|f| Some(f.as_str()) != active)
            .take(MAX_RECENT_SIGNALS)
        {
            cancel.check("predict.recent_file")?;
            for memory in sorted(store.find_by_file(file)?) {
                offer(
                    &mut collector,
                    &memory,
                    RECENT_FILE_BASE,
                    format!("recent:{file}"),
                    "linked to recent file",
                );
            }
        }

        if let Some(dir) = directory {
            let prefix = format!("{dir}/");
            for memory in pool
                .iter()
                .filter(|m| m.links.files.iter().any(|f| f.starts_with(&prefix)))
            {
                offer(
                    &mut collector,
                    memory,
                    DIRECTORY_BASE,
                    format!("directory:{dir}"),
                    "linked to same directory",
                );
            }
        }

        Ok(collector.finish(self.config.max_predictions))
    }
}

fn offer(collector: &mut Collector, memory: &Memory, base: f64, signal: String, reason: &str) {
    let extra = if memory.access_count >= HEAVY_USE_THRESHOLD {
        HEAVY_USE_BOOST
    } else {
        0.0
    };
    collector.offer(memory, base, extra, signal, reason);
}

/// Store order is unspecified; sort by id so offers are deterministic.
fn sorted(mut memories: Vec<Memory>) -> Vec<Memory> {
    memories.sort_by(|a, b| a.id.cmp(&b.id));
    memories
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConsolidationStatus, EpisodicPayload, MemoryContent, TribalPayload};
    use crate::storage::InMemoryMemoryStore;
    use chrono::Duration;

    fn note(id: &str) -> Memory {
        Memory::new(id, "note", MemoryContent::Tribal(TribalPayload::default()))
            .with_confidence(0.5)
            .with_created_at(Utc::now() - Duration::days(60))
    }

    fn store() -> InMemoryMemoryStore {
        InMemoryMemoryStore::with_memories([
            note("mem-active").with_file("src/auth/token.rs"),
            note("mem-pattern").with_pattern("retry-backoff"),
            note("mem-recent").with_file("src/db/pool.rs").with_access_count(12),
            note("mem-sibling").with_file("src/auth/session.rs"),
            note("mem-other").with_file("docs/readme.md"),
        ])
    }

    fn signals() -> FileSignals {
        FileSignals {
            active_file: Some("src/auth/token.rs".to_string()),
            file_patterns: vec!["retry-backoff".to_string()],
            recent_files: vec!["src/auth/token.rs".to_string(), "src/db/pool.rs".to_string()],
            directory: Some("src/auth/".to_string()),
        }
    }

    #[test]
    fn test_signal_bases() {
        let predicted = FileBasedPredictor::new(PredictionConfig::default())
            .predict(&signals(), &store(), &Cancellation::none(), Utc::now())
            .unwrap();
        let found: Vec<(&str, f64)> = predicted
            .iter()
            .map(|p| (p.memory_id.as_str(), p.confidence))
            .collect();

        assert_eq!(found.len(), 4);
        assert_eq!(found[0].0, "mem-active");
        assert!((found[0].1 - 0.9).abs() < 1e-9);
        assert_eq!(found[1].0, "mem-pattern");
        assert!((found[1].1 - 0.7).abs() < 1e-9);
        assert_eq!(found[2].0, "mem-recent");
        assert!((found[2].1 - 0.53).abs() < 1e-9);
        assert_eq!(found[3].0, "mem-sibling");
        assert!((found[3].1 - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_truncates_to_max() {
        let config = PredictionConfig {
            max_predictions: 2,
            ..PredictionConfig::default()
        };
        let predicted = FileBasedPredictor::new(config)
            .predict(&signals(), &store(), &Cancellation::none(), Utc::now())
            .unwrap();
        assert_eq!(predicted.len(), 2);
    }

    #[test]
    fn test_pruned_episode_linked_to_active_file_skipped() {
        let pruned = Memory::new(
            "mem-ep",
            "edited token.rs",
            MemoryContent::Episodic(EpisodicPayload {
                consolidation_status: ConsolidationStatus::Pruned,
                ..EpisodicPayload::default()
            }),
        )
        .with_file("src/auth/token.rs");
        let store = InMemoryMemoryStore::with_memories([
            pruned,
            note("mem-active").with_file("src/auth/token.rs"),
        ]);

        let predicted = FileBasedPredictor::new(PredictionConfig::default())
            .predict(&signals(), &store, &Cancellation::none(), Utc::now())
            .unwrap();
        let ids: Vec<&str> = predicted.iter().map(|p| p.memory_id.as_str()).collect();
        assert_eq!(ids, ["mem-active"]);
    }

    #[test]
    fn test_no_signals_no_storage() {
        let store = store();
        store.set_available(false);
        let predicted = FileBasedPredictor::new(PredictionConfig::default())
            .predict(&FileSignals::default(), &store, &Cancellation::none(), Utc::now())
            .unwrap();
        assert!(predicted.is_empty());
    }
}
