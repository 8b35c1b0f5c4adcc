//! Business logic services.
//!
//! Services orchestrate storage backends and provide high-level operations.
//! Scoring, ranking, packing and graph search are synchronous; only calls
//! into a store are cancellation points.

pub mod causal;
mod consolidation;
mod engine;
pub mod prediction;
pub mod retrieval;
pub mod text;

pub use causal::{CausalInferenceService, CausalTraversal, InferenceStrategy};
pub use consolidation::{
    ConsolidationService, MAX_CONFIDENCE, MAX_USAGE_FACTOR, decay, decayed_confidence,
    half_life_days, importance_factor, prune, replay, strengthen, usage_factor,
};
pub use engine::MemoryEngine;
pub use prediction::{BehavioralPredictor, FileBasedPredictor, PredictionService};
pub use retrieval::{RetrievalService, retrieve_from};
