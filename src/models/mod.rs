//! Data models for mnemo.
//!
//! Plain data only: records, causal graph snapshots, retrieval and prediction
//! results. Behavior lives in [`crate::services`].

mod causal;
mod consolidation;
mod memory;
mod payload;
mod prediction;
mod retrieval;
pub mod temporal;

pub use causal::{
    CausalChain, CausalEdge, CausalNode, CausalPath, CausalRelation, Evidence, EvidenceKind,
    NodeSeed,
};
pub(crate) use causal::clamp_unit;
pub use consolidation::{Abstraction, ConsolidationStats, PruneResult, ReplayOptions};
pub use memory::{Confidence, Importance, Memory, MemoryContent, MemoryId, MemoryLinks, MemoryType};
pub use payload::{
    CodeSmellPayload, CodeSmellSeverity, ConsolidationStatus, ConstraintOverridePayload,
    CorePayload, DecisionContextPayload, DecisionPayload, EpisodeContext, EpisodicPayload,
    Interaction, PatternRationalePayload, ProceduralPayload, SemanticPayload, TribalPayload,
    TribalSeverity,
};
pub use prediction::{
    BehavioralSignals, ConfidenceBreakdown, FileSignals, PredictedMemory, PredictionSignals,
    PredictionSource, PredictionStrategy,
};
pub use retrieval::{
    CompressedMemory, CompressionLevel, Intent, RetrievalContext, RetrievalResult,
    RetrievedMemory, ScoredMemory,
};
