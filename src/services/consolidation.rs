//! Memory consolidation service.
//!
//! A run has four phases:
//!
//! 1. **Replay** selects pending episodes older than `min_age_days`, oldest first.
//! 2. **Prune** marks every replayed episode referenced by an abstraction as pruned.
//! 3. **Strengthen** boosts the confidence of records read more than
//!    `access_threshold` times, capped at 1.0.
//! 4. **Decay** lowers the confidence of idle live records.
//!
//! # Decay
//!
//! ```text
//! half_life = type_half_life * importance_factor * usage_factor
//! decayed   = confidence * 0.5 ^ (idle_days / half_life)
//! ```
//!
//! `idle_days` counts from the later of the last read and the last write, so
//! each written decay restarts the clock and consecutive runs compose. Core
//! records never decay. The result is clamped to `[0, confidence]`.
//!
//! Writes go through the store handed to the service. When that store is a
//! [`crate::storage::CachedMemoryStore`] each write also drops the cached copy.
//! A failed write skips the record and the batch continues.

use crate::Result;
use crate::cancellation::Cancellation;
use crate::config::ConsolidationConfig;
use crate::models::{
    Abstraction, CompressionLevel, ConsolidationStats, ConsolidationStatus, Importance, Memory,
    MemoryId, MemoryType, PruneResult, ReplayOptions,
};
use crate::observability::metrics::{CONSOLIDATION_DURATION_MS, CONSOLIDATION_RECORDS};
use crate::services::retrieval::tokens_at;
use crate::storage::{MemoryQuery, MemoryStore, MemoryUpdate};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info_span, instrument};

/// Maximum confidence strengthening can reach.
pub const MAX_CONFIDENCE: f64 = 1.0;
/// Largest half-life stretch from heavy use.
pub const MAX_USAGE_FACTOR: f64 = 1.5;
/// Access count at which the usage stretch saturates.
pub const USAGE_SATURATION: f64 = 1000.0;

// ============================================================================
// Phases
// ============================================================================

/// Selects episodes for replay.
///
/// Keeps episodic records strictly older than `options.min_age_days` whose
/// status matches `options.status` (any status if `None`), ordered oldest
/// first with ties broken by id, capped at `options.limit`.
#[must_use]
pub fn replay(memories: Vec<Memory>, options: &ReplayOptions, now: DateTime<Utc>) -> Vec<Memory> {
    let mut selected: Vec<Memory> = memories
        .into_iter()
        .filter(|m| {
            m.consolidation_status()
                .is_some_and(|s| options.status.is_none_or(|want| want == s))
        })
        .filter(|m| m.age_days(now) > options.min_age_days)
        .collect();
    selected.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
    selected.truncate(options.limit);
    selected
}

/// Marks every episode referenced by an abstraction as pruned.
///
/// Only episodes whose status may move to pruned are touched; tokens freed
/// are the full-compression estimate of each record before the change.
pub fn prune(episodes: &mut [Memory], abstractions: &[Abstraction]) -> PruneResult {
    let referenced: HashSet<&MemoryId> = abstractions
        .iter()
        .flat_map(|a| a.source_episodes.iter())
        .collect();

    let mut result = PruneResult::default();
    for episode in episodes.iter_mut() {
        if !referenced.contains(&episode.id) || !can_prune(episode) {
            continue;
        }
        let tokens = tokens_at(episode, CompressionLevel::Full);
        if MemoryUpdate::new()
            .with_consolidation_status(ConsolidationStatus::Pruned)
            .apply(episode)
            .is_ok()
        {
            result.tokens_freed += tokens;
            result.pruned.push(episode.id.clone());
        }
    }
    result
}

/// Boosts the confidence of records read more than `threshold` times.
///
/// Returns the ids whose confidence actually rose. Records already at the
/// cap are left alone.
pub fn strengthen(memories: &mut [Memory], threshold: u64, boost: f64) -> Vec<MemoryId> {
    let mut touched = Vec::new();
    for memory in memories.iter_mut().filter(|m| m.access_count > threshold) {
        let next = memory.confidence.boosted(boost, MAX_CONFIDENCE);
        if next.value() > memory.confidence.value() {
            memory.confidence = next;
            touched.push(memory.id.clone());
        }
    }
    touched
}

/// Half-life stretch for important records.
#[must_use]
pub const fn importance_factor(importance: Importance) -> f64 {
    match importance {
        Importance::Low => 0.8,
        Importance::Normal => 1.0,
        Importance::High => 1.5,
        Importance::Critical => 2.0,
    }
}

/// Half-life stretch for frequently read records, in `[1, MAX_USAGE_FACTOR]`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn usage_factor(access_count: u64) -> f64 {
    let saturation = ((access_count as f64).ln_1p() / USAGE_SATURATION.ln_1p()).min(1.0);
    1.0 + (MAX_USAGE_FACTOR - 1.0) * saturation
}

/// Effective half-life in days, or `None` if the record never decays.
#[must_use]
pub fn half_life_days(memory: &Memory) -> Option<f64> {
    memory.memory_type().half_life_days().map(|days| {
        days * importance_factor(memory.importance) * usage_factor(memory.access_count)
    })
}

/// Confidence `memory` decays to by `now`. Never above the current value.
#[must_use]
pub fn decayed_confidence(memory: &Memory, now: DateTime<Utc>) -> f64 {
    let current = memory.confidence.value();
    let Some(half_life) = half_life_days(memory) else {
        return current;
    };
    let factor = 0.5_f64.powf(memory.days_since_last_use(now) / half_life);
    (current * factor).clamp(0.0, current)
}

/// Decays idle live records whose confidence would drop by at least `min_delta`.
///
/// Returns the ids that changed.
pub fn decay(memories: &mut [Memory], now: DateTime<Utc>, min_delta: f64) -> Vec<MemoryId> {
    let mut decayed = Vec::new();
    for memory in memories.iter_mut().filter(|m| m.is_live()) {
        let next = decayed_confidence(memory, now);
        if memory.confidence.value() - next >= min_delta && next < memory.confidence.value() {
            memory.confidence = next.into();
            decayed.push(memory.id.clone());
        }
    }
    decayed
}

const fn can_prune(episode: &Memory) -> bool {
    matches!(episode.consolidation_status(), Some(ConsolidationStatus::Pending))
}

// ============================================================================
// Service
// ============================================================================

/// Runs consolidation against a record store.
pub struct ConsolidationService {
    store: Arc<dyn MemoryStore>,
    config: ConsolidationConfig,
}

impl std::fmt::Debug for ConsolidationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsolidationService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ConsolidationService {
    /// Creates a consolidation service.
    #[must_use]
    pub fn new(store: Arc<dyn MemoryStore>, config: ConsolidationConfig) -> Self {
        Self { store, config }
    }

    /// Returns the replay options derived from the configuration.
    #[must_use]
    pub const fn replay_options(&self) -> ReplayOptions {
        ReplayOptions {
            min_age_days: self.config.min_age_days,
            status: Some(ConsolidationStatus::Pending),
            limit: self.config.replay_limit,
        }
    }

    /// Runs replay, prune, strengthen and decay.
    ///
    /// # Errors
    ///
    /// Returns an error if the candidate searches fail or `cancel` fires.
    /// Failures writing an individual record are counted in `skipped`.
    #[instrument(
        name = "mnemo.consolidate",
        skip_all,
        fields(operation = "consolidate", abstractions = abstractions.len())
    )]
    pub fn run(&self, abstractions: &[Abstraction], cancel: &Cancellation) -> Result<ConsolidationStats> {
        let start = Instant::now();
        let result = (|| {
            let mut stats = ConsolidationStats::default();
            let now = Utc::now();

            let mut episodes = {
                let _span = info_span!("mnemo.consolidate.replay").entered();
                cancel.check("consolidate.replay")?;
                let all = self
                    .store
                    .search(&MemoryQuery::new().with_types([MemoryType::Episodic]))?;
                replay(all, &self.replay_options(), now)
            };
            stats.replayed = episodes.len();

            {
                let _span = info_span!("mnemo.consolidate.prune").entered();
                let before: HashMap<MemoryId, usize> = episodes
                    .iter()
                    .map(|e| (e.id.clone(), tokens_at(e, CompressionLevel::Full)))
                    .collect();
                let planned = prune(&mut episodes, abstractions);
                let update = MemoryUpdate::new().with_consolidation_status(ConsolidationStatus::Pruned);
                for id in &planned.pruned {
                    cancel.check("consolidate.prune")?;
                    if self.write(id, &update, "prune") {
                        stats.pruned += 1;
                        stats.tokens_freed += before.get(id).copied().unwrap_or_default();
                    } else {
                        stats.skipped += 1;
                    }
                }
            }

            let (mut all, touched) = {
                let _span = info_span!("mnemo.consolidate.strengthen").entered();
                cancel.check("consolidate.strengthen")?;
                let mut all = self.store.search(&MemoryQuery::new())?;
                let touched: HashSet<MemoryId> =
                    strengthen(&mut all, self.config.access_threshold, self.config.boost)
                        .into_iter()
                        .collect();
                for memory in all.iter().filter(|m| touched.contains(&m.id)) {
                    cancel.check("consolidate.strengthen")?;
                    let update = MemoryUpdate::new().with_confidence(memory.confidence.value());
                    if !self.write(&memory.id, &update, "strengthen") {
                        stats.skipped += 1;
                        continue;
                    }
                    stats.strengthened += 1;
                }
                (all, touched)
            };

            {
                let _span = info_span!("mnemo.consolidate.decay").entered();
                all.retain(|m| !touched.contains(&m.id));
                let decayed: HashSet<MemoryId> =
                    decay(&mut all, now, self.config.decay_min_delta).into_iter().collect();
                for memory in all.iter().filter(|m| decayed.contains(&m.id)) {
                    cancel.check("consolidate.decay")?;
                    let update = MemoryUpdate::new().with_confidence(memory.confidence.value());
                    if self.write(&memory.id, &update, "decay") {
                        stats.decayed += 1;
                    } else {
                        stats.skipped += 1;
                    }
                }
            }

            tracing::info!(
                replayed = stats.replayed,
                pruned = stats.pruned,
                strengthened = stats.strengthened,
                decayed = stats.decayed,
                skipped = stats.skipped,
                tokens_freed = stats.tokens_freed,
                "consolidation complete"
            );
            Ok(stats)
        })();

        let status = if result.is_ok() { "success" } else { "error" };
        if let Ok(stats) = &result {
            for (phase, count) in [
                ("replay", stats.replayed),
                ("prune", stats.pruned),
                ("strengthen", stats.strengthened),
                ("decay", stats.decayed),
                ("skip", stats.skipped),
            ] {
                metrics::counter!(CONSOLIDATION_RECORDS, "phase" => phase)
                    .increment(u64::try_from(count).unwrap_or(u64::MAX));
            }
        }
        metrics::histogram!(CONSOLIDATION_DURATION_MS, "status" => status)
            .record(start.elapsed().as_secs_f64() * 1000.0);

        result
    }

    /// Applies one update, logging and swallowing per-record failures.
    fn write(&self, id: &MemoryId, update: &MemoryUpdate, phase: &'static str) -> bool {
        match self.store.update(id, update) {
            Ok(Some(_)) => true,
            Ok(None) => {
                tracing::debug!(memory_id = %id, phase, "record vanished during consolidation");
                false
            },
            Err(e) => {
                tracing::warn!(memory_id = %id, phase, error = %e, "skipping record");
                false
            },
        }
    }
}
