//! # Mnemo
//!
//! Persistent memory engine for AI coding assistants.
//!
//! Mnemo stores typed knowledge records (facts, warnings, rationales,
//! anti-patterns, episodic interactions), links them by causal relation,
//! ranks and compresses them to fit a token budget on retrieval, and
//! periodically consolidates old records while predicting which records
//! will be needed next.
//!
//! ## Layers
//!
//! - **Record store**: durable storage behind the [`MemoryStore`] trait
//! - **L1 cache**: fixed-capacity LRU overlay ([`storage::L1Cache`])
//! - **Causal graph**: inference strategies and traversal ([`services::causal`])
//! - **Retrieval**: scoring, intent weighting, diversity ranking, budget packing
//! - **Consolidation**: replay, pruning, strengthening, confidence decay
//! - **Prediction**: behavioral and file-based predictors
//!
//! ## Example
//!
//! ```rust,ignore
//! use mnemo::{MemoryEngine, MnemoConfig, RetrievalContext, Intent};
//! use mnemo::storage::{InMemoryCausalStorage, InMemoryMemoryStore};
//! use std::sync::Arc;
//!
//! let engine = MemoryEngine::new(
//!     Arc::new(InMemoryMemoryStore::new()),
//!     Arc::new(InMemoryCausalStorage::new()),
//!     MnemoConfig::default(),
//! )?;
//! let result = engine.retrieve(&RetrievalContext::new(Intent::FixBug, "token refresh", 2000))?;
//! for item in result.memories {
//!     println!("{} {:.2} {}", item.memory_id, item.relevance, item.reason);
//! }
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

pub mod cancellation;
pub mod config;
pub mod models;
pub mod observability;
pub mod services;
pub mod storage;

pub use cancellation::Cancellation;
pub use config::MnemoConfig;
pub use models::{
    Abstraction, CausalChain, CausalEdge, CausalRelation, ConsolidationStats, Importance, Intent,
    Memory, MemoryContent, MemoryId, MemoryType, PredictedMemory, PredictionSignals,
    RetrievalContext, RetrievalResult,
};
pub use services::{
    CausalInferenceService, CausalTraversal, ConsolidationService, MemoryEngine,
    PredictionService, RetrievalService,
};
pub use storage::{CausalStorage, L1Cache, MemoryStore};

/// Error type for mnemo operations.
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Bad configuration values, zero cache capacity, empty ids |
/// | `OperationFailed` | Serialization or initialization failures |
/// | `StorageUnavailable` | A record store or causal storage backend failed |
/// | `Cancelled` | A deadline or cancellation token tripped between storage calls |
///
/// A missing record is never an error: lookups return `Ok(None)`.
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An operation failed for a reason other than storage availability.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// The underlying store or graph backend could not serve the request.
    ///
    /// Surfaced to the caller as-is; retry policy belongs to the store.
    #[error("storage unavailable during '{operation}': {cause}")]
    StorageUnavailable {
        /// The storage operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// The caller's deadline passed or its cancellation token fired.
    #[error("operation '{operation}' cancelled")]
    Cancelled {
        /// The operation that was interrupted.
        operation: String,
    },
}

impl Error {
    /// Builds a [`Error::StorageUnavailable`] for the given operation.
    pub fn storage(operation: impl Into<String>, cause: impl Into<String>) -> Self {
        Self::StorageUnavailable {
            operation: operation.into(),
            cause: cause.into(),
        }
    }

    /// Returns true for storage-unavailable errors.
    #[must_use]
    pub const fn is_storage_unavailable(&self) -> bool {
        matches!(self, Self::StorageUnavailable { .. })
    }
}

/// Result type alias for mnemo operations.
pub type Result<T> = std::result::Result<T, Error>;
