//! Causal graph services: edge inference and traversal.
//!
//! Inference strategies are pure functions of a record and a candidate set.
//! [`CausalInferenceService`] runs them, merges their proposals and optionally
//! persists the result. [`CausalTraversal`] answers path, subgraph and
//! explanation queries against [`CausalStorage`](crate::storage::CausalStorage).

mod explicit;
mod inference;
mod semantic;
mod traversal;

pub use explicit::{
    ExplicitStrategy, ID_REFERENCE_CONFIDENCE, SUPERSEDES_CONFIDENCE, TERM_REFERENCE_CAP,
    term_confidence,
};
pub use inference::CausalInferenceService;
pub use semantic::{DEFAULT_MIN_SIMILARITY, SemanticStrategy, Similarity, topic_similarity};
pub use traversal::{CausalTraversal, Direction, Expansion, PathOptions, SubgraphOptions};

use crate::models::{CausalEdge, Memory};

/// A strategy that proposes causal edges for a record.
///
/// Implementations must not touch storage; the caller supplies candidates.
pub trait InferenceStrategy: Send + Sync {
    /// Short name used in logs and metric labels.
    fn name(&self) -> &'static str;

    /// Proposes edges between `memory` and members of `candidates`.
    fn infer(&self, memory: &Memory, candidates: &[Memory]) -> Vec<CausalEdge>;
}
