//! Retrieval pipeline: score, weight by intent, rank, pack, compress.
//!
//! Only candidate loading touches storage. It pages through every live
//! record, `candidate_limit` per page. Everything after it is a pure
//! function of the loaded snapshot ([`retrieve_from`]), so a record whose
//! consolidation status changes mid-request is simply seen in whichever
//! state the snapshot captured.

mod budget;
mod compression;
mod ranking;
mod scoring;
mod weights;

pub use budget::{MAX_UPGRADES, Packing, UPGRADE_THRESHOLD, pack};
pub use compression::{DETAIL_LINE_MAX_CHARS, compress, tokens_at};
pub use ranking::{DIVERSITY_DECAY, rank};
pub use scoring::{ScoreBreakdown, focus_match, score};
pub use weights::{MAX_WEIGHT, MIN_WEIGHT, apply_intent, intent_weight};

use crate::cancellation::Cancellation;
use crate::config::RetrievalConfig;
use crate::models::{Memory, RetrievalContext, RetrievalResult, RetrievedMemory, ScoredMemory};
use crate::observability::metrics::{RETRIEVAL_DURATION_MS, RETRIEVAL_PACKED, RETRIEVAL_TOTAL};
use crate::storage::{MemoryQuery, MemoryStore};
use crate::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// Loads candidates from the store and runs the pipeline over them.
pub struct RetrievalService {
    store: Arc<dyn MemoryStore>,
    config: RetrievalConfig,
}

impl std::fmt::Debug for RetrievalService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RetrievalService {
    /// Creates a retrieval service over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn MemoryStore>, config: RetrievalConfig) -> Self {
        Self { store, config }
    }

    /// Retrieves ranked, budget-packed memories for `context`.
    ///
    /// Running out of budget is not an error: the result is marked
    /// `truncated` and holds what fit.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Cancelled`] if `cancel` fired before or between
    /// candidate pages, or the store's error if loading failed.
    #[instrument(
        skip_all,
        fields(
            operation = "retrieve",
            intent = %context.intent,
            max_tokens = context.max_tokens,
            packed = tracing::field::Empty
        )
    )]
    pub fn retrieve(&self, context: &RetrievalContext, cancel: &Cancellation) -> Result<RetrievalResult> {
        let start = Instant::now();
        let result = (|| {
            cancel.check("retrieve")?;
            let candidates = self.store.search_all(
                &MemoryQuery::new().live_only(),
                self.config.candidate_limit,
                cancel,
            )?;
            Ok(retrieve_from(candidates, context, Utc::now()))
        })();

        let status = if result.is_ok() { "success" } else { "error" };
        metrics::counter!(RETRIEVAL_TOTAL, "intent" => context.intent.as_str(), "status" => status)
            .increment(1);
        metrics::histogram!(RETRIEVAL_DURATION_MS, "intent" => context.intent.as_str())
            .record(start.elapsed().as_secs_f64() * 1000.0);
        if let Ok(r) = &result {
            #[allow(clippy::cast_precision_loss)]
            metrics::histogram!(RETRIEVAL_PACKED).record(r.memories.len() as f64);
            tracing::Span::current().record("packed", r.memories.len());
        }

        result
    }
}

/// Runs the pipeline over an already loaded candidate set.
///
/// Superseded records and pruned episodes are excluded before scoring.
#[must_use]
pub fn retrieve_from(
    candidates: Vec<Memory>,
    context: &RetrievalContext,
    now: DateTime<Utc>,
) -> RetrievalResult {
    let mut scored: Vec<ScoredMemory> = candidates
        .into_iter()
        .filter(Memory::is_live)
        .map(|m| score(m, &context.focus, now))
        .collect();
    let considered = scored.len();

    apply_intent(&mut scored, context.intent);
    let packing = pack(rank(scored), context.max_tokens);
    tracing::debug!(
        considered,
        packed = packing.items.len(),
        tokens_used = packing.tokens_used,
        truncated = packing.truncated,
        "retrieval packed"
    );

    RetrievalResult {
        memories: packing
            .items
            .into_iter()
            .map(|(scored, compressed)| RetrievedMemory {
                memory_id: scored.memory.id,
                memory_type: compressed.memory_type,
                relevance: scored.score,
                reason: scored.reason,
                compressed,
            })
            .collect(),
        tokens_used: packing.tokens_used,
        token_budget: context.max_tokens,
        candidates_considered: considered,
        truncated: packing.truncated,
    }
}
