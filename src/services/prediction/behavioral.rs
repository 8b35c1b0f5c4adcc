//! Behavioral predictor.
//!
//! | Signal | Base confidence |
//! |--------|-----------------|
//! | frequently used memories | 0.80 |
//! | current task | 0.75 |
//! | recent queries | 0.70 |
//! | recent intents | 0.65 |
//! | user patterns | 0.60 |

use super::{Collector, MAX_RECENT_SIGNALS};
use crate::Result;
use crate::cancellation::Cancellation;
use crate::config::PredictionConfig;
use crate::models::{BehavioralSignals, Memory, PredictedMemory, PredictionStrategy};
use crate::services::retrieval::{focus_match, intent_weight};
use crate::storage::{MemoryQuery, MemoryStore};
use chrono::{DateTime, Utc};

/// Base confidence for frequently used memories.
pub const FREQUENT_BASE: f64 = 0.8;
/// Base confidence for matches on the current task.
pub const TASK_BASE: f64 = 0.75;
/// Base confidence for matches on a recent query.
pub const QUERY_BASE: f64 = 0.7;
/// Base confidence for types favored by a recent intent.
pub const INTENT_BASE: f64 = 0.65;
/// Base confidence for matches on a learned user pattern.
pub const PATTERN_BASE: f64 = 0.6;

/// Predicts from what the user has been doing.
#[derive(Debug, Clone, Copy)]
pub struct BehavioralPredictor {
    config: PredictionConfig,
}

impl BehavioralPredictor {
    /// Creates a behavioral predictor.
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
        signals: &BehavioralSignals,
        store: &dyn MemoryStore,
        cancel: &Cancellation,
        now: DateTime<Utc>,
    ) -> Result<Vec<PredictedMemory>> {
        let mut collector = Collector::new(PredictionStrategy::Behavioral, now);

        if !signals.frequent_memories.is_empty() {
            cancel.check("predict.frequent")?;
            let query = MemoryQuery::new().with_ids(signals.frequent_memories.iter().cloned());
            let found = store.search(&query)?;
            for id in &signals.frequent_memories {
                if let Some(memory) = found.iter().find(|m| &m.id == id) {
                    collector.offer(
                        memory,
                        FREQUENT_BASE,
                        0.0,
                        format!("frequent:{id}"),
                        "frequently used",
                    );
                }
            }
        }

        let task = signals.current_task.as_deref().filter(|t| !t.trim().is_empty());
        let needs_pool = task.is_some()
            || !signals.recent_queries.is_empty()
            || !signals.recent_intents.is_empty()
            || !signals.user_patterns.is_empty();
        if !needs_pool {
            return Ok(collector.finish(self.config.max_predictions));
        }

        cancel.check("predict.behavioral")?;
        let pool = store.search_all(
            &MemoryQuery::new().live_only(),
            self.config.candidate_limit,
            cancel,
        )?;

        if let Some(task) = task {
            for memory in best_matches(&pool, task) {
                collector.offer(
                    memory,
                    TASK_BASE,
                    0.0,
                    format!("task:{task}"),
                    "matches current task",
                );
            }
        }

        for query in signals.recent_queries.iter().take(MAX_RECENT_SIGNALS) {
            for memory in best_matches(&pool, query) {
                collector.offer(
                    memory,
                    QUERY_BASE,
                    0.0,
                    format!("query:{query}"),
                    "matches recent query",
                );
            }
        }

        for &intent in signals.recent_intents.iter().take(MAX_RECENT_SIGNALS) {
            for memory in pool
                .iter()
                .filter(|m| intent_weight(intent, m.memory_type()) > 1.0)
            {
                collector.offer(
                    memory,
                    INTENT_BASE,
                    0.0,
                    format!("intent:{intent}"),
                    "favored by recent intent",
                );
            }
        }

        for pattern in &signals.user_patterns {
            let needle = pattern.to_lowercase();
            for memory in pool.iter().filter(|m| {
                m.tags.iter().any(|t| t.to_lowercase() == needle)
                    || m.links.patterns.iter().any(|p| p.to_lowercase() == needle)
            }) {
                collector.offer(
                    memory,
                    PATTERN_BASE,
                    0.0,
                    format!("pattern:{pattern}"),
                    "matches user pattern",
                );
            }
        }

        Ok(collector.finish(self.config.max_predictions))
    }
}

/// Records with any word overlap with `text`, best match first.
fn best_matches<'a>(pool: &'a [Memory], text: &str) -> Vec<&'a Memory> {
    let mut scored: Vec<(f64, &Memory)> = pool
        .iter()
        .map(|m| (focus_match(m, text), m))
        .filter(|(s, _)| *s > 0.0)
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.id.cmp(&b.1.id)));
    scored.into_iter().map(|(_, m)| m).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        CodeSmellPayload, ConsolidationStatus, EpisodicPayload, Intent, MemoryContent, MemoryId,
        TribalPayload,
    };
    use crate::storage::InMemoryMemoryStore;
    use chrono::Duration;

    fn store() -> InMemoryMemoryStore {
        InMemoryMemoryStore::with_memories([
            Memory::new(
                "mem-auth",
                "token refresh race",
                MemoryContent::Tribal(TribalPayload {
                    topic: "auth".to_string(),
                    ..TribalPayload::default()
                }),
            ),
            Memory::new(
                "mem-smell",
                "god object",
                MemoryContent::CodeSmell(CodeSmellPayload::default()),
            )
            .with_tags(["legacy"]),
            Memory::new("mem-old", "stale note", MemoryContent::Tribal(TribalPayload::default()))
                .with_confidence(0.5)
                .with_created_at(Utc::now() - Duration::days(90)),
        ])
    }

    fn predict(signals: &BehavioralSignals) -> Vec<PredictedMemory> {
        BehavioralPredictor::new(PredictionConfig::default())
            .predict(signals, &store(), &Cancellation::none(), Utc::now())
            .unwrap()
    }

    #[test]
    fn test_frequent_has_top_base() {
        let predicted = predict(&BehavioralSignals {
            frequent_memories: vec![MemoryId::new("mem-old"), MemoryId::new("mem-missing")],
            ..BehavioralSignals::default()
        });
        assert_eq!(predicted.len(), 1);
        let b = predicted[0].source.confidence_breakdown;
        assert!((b.base - FREQUENT_BASE).abs() < f64::EPSILON);
        assert!(b.recency_boost.abs() < f64::EPSILON);
        assert!(b.usage_boost.abs() < f64::EPSILON);
        assert!((predicted[0].confidence - 0.8).abs() < f64::EPSILON);
    }

    #[test]
    fn test_higher_priority_signal_wins() {
        let predicted = predict(&BehavioralSignals {
            current_task: Some("fix token refresh".to_string()),
            recent_queries: vec!["token".to_string()],
            ..BehavioralSignals::default()
        });
        let auth = predicted
            .iter()
            .find(|p| p.memory_id.as_str() == "mem-auth")
            .unwrap();
        assert!((auth.source.confidence_breakdown.base - TASK_BASE).abs() < f64::EPSILON);
        assert_eq!(auth.source.contributing_signals, ["task:fix token refresh"]);
        assert_eq!(predicted.len(), 1);
    }

    #[test]
    fn test_intent_and_pattern_signals() {
        let predicted = predict(&BehavioralSignals {
            recent_intents: vec![Intent::Refactor],
            user_patterns: vec!["Legacy".to_string()],
            ..BehavioralSignals::default()
        });
        // Refactor favors code smells; the tag match is a duplicate.
        assert_eq!(predicted.len(), 1);
        assert_eq!(predicted[0].memory_id.as_str(), "mem-smell");
        assert!((predicted[0].source.confidence_breakdown.base - INTENT_BASE).abs() < f64::EPSILON);
    }

    #[test]
    fn test_pruned_episode_never_predicted() {
        let store = InMemoryMemoryStore::with_memories([Memory::new(
            "mem-ep",
            "token refresh question",
            MemoryContent::Episodic(EpisodicPayload {
                consolidation_status: ConsolidationStatus::Pruned,
                ..EpisodicPayload::default()
            }),
        )
        .with_tags(["auth"])]);
        let signals = BehavioralSignals {
            frequent_memories: vec![MemoryId::new("mem-ep")],
            recent_queries: vec!["token refresh".to_string()],
            user_patterns: vec!["auth".to_string()],
            ..BehavioralSignals::default()
        };

        let predicted = BehavioralPredictor::new(PredictionConfig::default())
            .predict(&signals, &store, &Cancellation::none(), Utc::now())
            .unwrap();
        assert!(predicted.is_empty());
    }

    #[test]
    fn test_pool_covers_whole_store() {
        let mut memories: Vec<Memory> = (0..12)
            .map(|i| {
                Memory::new(
                    format!("mem-a{i:03}"),
                    "css layout",
                    MemoryContent::Tribal(TribalPayload::default()),
                )
            })
            .collect();
        memories.push(Memory::new(
            "mem-zzz",
            "token refresh race",
            MemoryContent::Tribal(TribalPayload::default()),
        ));
        let store = InMemoryMemoryStore::with_memories(memories);
        let config = PredictionConfig {
            candidate_limit: 4,
            ..PredictionConfig::default()
        };

        let predicted = BehavioralPredictor::new(config)
            .predict(
                &BehavioralSignals {
                    recent_queries: vec!["token refresh".to_string()],
                    ..BehavioralSignals::default()
                },
                &store,
                &Cancellation::none(),
                Utc::now(),
            )
            .unwrap();
        assert_eq!(predicted.len(), 1);
        assert_eq!(predicted[0].memory_id.as_str(), "mem-zzz");
    }

    #[test]
    fn test_confidence_capped() {
        let predicted = predict(&BehavioralSignals {
            frequent_memories: vec![MemoryId::new("mem-auth")],
            ..BehavioralSignals::default()
        });
        // 0.8 + 0.1 + 0.05
        assert!((predicted[0].confidence - 0.95).abs() < 1e-9);
        assert!(predicted.iter().all(|p| p.confidence <= 1.0));
    }
}
