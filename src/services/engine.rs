//! Memory engine facade.
//!
//! Wires a record store, an L1 cache in front of it, causal storage and the
//! services into one handle. Every operation has a plain form and a `_with`
//! form taking a [`Cancellation`].

use crate::cancellation::Cancellation;
use crate::config::MnemoConfig;
use crate::models::{
    Abstraction, CausalChain, CausalEdge, ConsolidationStats, Intent, Memory, MemoryId,
    PredictedMemory, PredictionSignals, RetrievalContext, RetrievalResult,
};
use crate::services::causal::{CausalInferenceService, CausalTraversal};
use crate::services::consolidation::ConsolidationService;
use crate::services::prediction::PredictionService;
use crate::services::retrieval::RetrievalService;
use crate::storage::{
    CacheStats, CachedMemoryStore, CausalStorage, InMemoryCausalStorage, InMemoryMemoryStore,
    MemoryQuery, MemoryStore, MemoryUpdate,
};
use crate::{Error, Result};
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::instrument;

type SharedStore = CachedMemoryStore<Arc<dyn MemoryStore>>;

/// The memory engine.
///
/// All services share one cached view of the record store, so a write made
/// by consolidation drops the cached copy that retrieval or `get` would
/// otherwise serve.
pub struct MemoryEngine {
    store: Arc<SharedStore>,
    causal: Arc<dyn CausalStorage>,
    config: MnemoConfig,
    retrieval: RetrievalService,
    prediction: PredictionService,
    consolidation: ConsolidationService,
    inference: CausalInferenceService,
    traversal: CausalTraversal,
}

impl std::fmt::Debug for MemoryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryEngine")
            .field("config", &self.config)
            .field("cache", &self.store.stats())
            .finish_non_exhaustive()
    }
}

impl MemoryEngine {
    /// Creates an engine over the given backends.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the configuration is invalid.
    pub fn new(
        store: Arc<dyn MemoryStore>,
        causal: Arc<dyn CausalStorage>,
        config: MnemoConfig,
    ) -> Result<Self> {
        config.validate()?;
        let capacity = NonZeroUsize::new(config.cache.capacity)
            .ok_or_else(|| Error::InvalidInput("cache capacity must be positive".to_string()))?;

        let store = Arc::new(CachedMemoryStore::new(store, capacity));
        let shared: Arc<dyn MemoryStore> = store.clone();

        tracing::info!(
            cache_capacity = capacity.get(),
            max_depth = config.traversal.max_depth,
            "memory engine ready"
        );
        Ok(Self {
            retrieval: RetrievalService::new(Arc::clone(&shared), config.retrieval),
            prediction: PredictionService::new(Arc::clone(&shared), config.prediction),
            consolidation: ConsolidationService::new(Arc::clone(&shared), config.consolidation),
            inference: CausalInferenceService::new(&config.inference),
            traversal: CausalTraversal::new(Arc::clone(&causal), shared, config.traversal),
            store,
            causal,
            config,
        })
    }

    /// Creates an engine over fresh in-memory backends.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the configuration is invalid.
    pub fn in_memory(config: MnemoConfig) -> Result<Self> {
        Self::new(
            Arc::new(InMemoryMemoryStore::new()),
            Arc::new(InMemoryCausalStorage::new()),
            config,
        )
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &MnemoConfig {
        &self.config
    }

    /// Returns the cached record store.
    #[must_use]
    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Returns the causal storage backend.
    #[must_use]
    pub fn causal_storage(&self) -> &dyn CausalStorage {
        self.causal.as_ref()
    }

    /// Returns the traversal service for path and subgraph queries.
    #[must_use]
    pub const fn traversal(&self) -> &CausalTraversal {
        &self.traversal
    }

    /// Returns L1 cache statistics.
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.store.stats()
    }

    /// Builds a retrieval context using the configured default budget.
    #[must_use]
    pub fn context(&self, intent: Intent, focus: impl Into<String>) -> RetrievalContext {
        RetrievalContext::new(intent, focus, self.config.retrieval.max_tokens)
    }

    // ========================================================================
    // Records
    // ========================================================================

    /// Stores a new record.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is taken or the store fails.
    pub fn create(&self, memory: Memory) -> Result<MemoryId> {
        self.store.create(memory)
    }

    /// Reads a record through the cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails on a cache miss.
    pub fn get(&self, id: &MemoryId) -> Result<Option<Memory>> {
        self.store.read(id)
    }

    /// Applies a partial update.
    ///
    /// # Errors
    ///
    /// Returns an error if the update is illegal or the store fails.
    pub fn update(&self, id: &MemoryId, update: &MemoryUpdate) -> Result<Option<Memory>> {
        self.store.update(id, update)
    }

    /// Deletes a record.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn delete(&self, id: &MemoryId) -> Result<bool> {
        self.store.delete(id)
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Retrieves ranked, budget-packed memories.
    ///
    /// # Errors
    ///
    /// Returns an error if candidate loading fails.
    pub fn retrieve(&self, context: &RetrievalContext) -> Result<RetrievalResult> {
        self.retrieve_with(context, &Cancellation::none())
    }

    /// Retrieves with cancellation.
    ///
    /// # Errors
    ///
    /// Returns an error if candidate loading fails or `cancel` fires.
    pub fn retrieve_with(
        &self,
        context: &RetrievalContext,
        cancel: &Cancellation,
    ) -> Result<RetrievalResult> {
        self.retrieval.retrieve(context, cancel)
    }

    /// Predicts the memories needed next.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn predict(&self, signals: &PredictionSignals) -> Result<Vec<PredictedMemory>> {
        self.predict_with(signals, &Cancellation::none())
    }

    /// Predicts with cancellation.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or `cancel` fires.
    pub fn predict_with(
        &self,
        signals: &PredictionSignals,
        cancel: &Cancellation,
    ) -> Result<Vec<PredictedMemory>> {
        self.prediction.predict(signals, cancel)
    }

    /// Runs a consolidation pass.
    ///
    /// # Errors
    ///
    /// Returns an error if candidate searches fail.
    pub fn consolidate(&self, abstractions: &[Abstraction]) -> Result<ConsolidationStats> {
        self.consolidate_with(abstractions, &Cancellation::none())
    }

    /// Runs a consolidation pass with cancellation.
    ///
    /// # Errors
    ///
    /// Returns an error if candidate searches fail or `cancel` fires.
    pub fn consolidate_with(
        &self,
        abstractions: &[Abstraction],
        cancel: &Cancellation,
    ) -> Result<ConsolidationStats> {
        self.consolidation.run(abstractions, cancel)
    }

    /// Explains a record: its causes and effects as one chain.
    ///
    /// Returns `None` if the record does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if a storage call fails.
    pub fn explain(&self, id: &MemoryId) -> Result<Option<CausalChain>> {
        self.explain_with(id, &Cancellation::none())
    }

    /// Explains with cancellation.
    ///
    /// # Errors
    ///
    /// Returns an error if a storage call fails or `cancel` fires.
    pub fn explain_with(&self, id: &MemoryId, cancel: &Cancellation) -> Result<Option<CausalChain>> {
        self.traversal.explain(id, cancel)
    }

    /// Infers causal links from a stored record to other records and stores them.
    ///
    /// Returns the stored edges; an unknown id yields none.
    ///
    /// # Errors
    ///
    /// Returns an error if a storage call fails.
    pub fn infer_links(&self, id: &MemoryId) -> Result<Vec<CausalEdge>> {
        self.infer_links_with(id, &Cancellation::none())
    }

    /// Infers and stores links with cancellation.
    ///
    /// # Errors
    ///
    /// Returns an error if a storage call fails or `cancel` fires.
    #[instrument(skip_all, fields(operation = "infer_links", memory_id = %id))]
    pub fn infer_links_with(&self, id: &MemoryId, cancel: &Cancellation) -> Result<Vec<CausalEdge>> {
        cancel.check("infer_links")?;
        let Some(memory) = self
            .store
            .search(&MemoryQuery::new().with_ids([id.clone()]))?
            .into_iter()
            .next()
        else {
            tracing::debug!("no such record, nothing to infer");
            return Ok(Vec::new());
        };

        cancel.check("infer_links")?;
        // Superseded records stay in: a supersession edge may point at one.
        let candidates: Vec<Memory> = self
            .store
            .search_all(&MemoryQuery::new(), self.config.retrieval.candidate_limit, cancel)?
            .into_iter()
            .filter(|m| m.id != memory.id)
            .collect();

        self.inference
            .infer_and_store(&memory, &candidates, self.causal.as_ref(), cancel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CausalRelation, MemoryContent, TribalPayload};

    fn tribal(id: &str, summary: &str) -> Memory {
        Memory::new(id, summary, MemoryContent::Tribal(TribalPayload::default()))
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let err = MemoryEngine::in_memory(MnemoConfig::default().with_cache_capacity(0)).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_get_is_cached() {
        let engine = MemoryEngine::in_memory(MnemoConfig::default()).unwrap();
        let id = engine.create(tribal("mem-1", "x")).unwrap();
        engine.get(&id).unwrap();
        engine.get(&id).unwrap();
        let stats = engine.cache_stats();
        assert_eq!((stats.hits, stats.misses), (1, 1));
    }

    #[test]
    fn test_retrieval_reads_through_cache() {
        let engine = MemoryEngine::in_memory(MnemoConfig::default()).unwrap();
        engine.create(tribal("mem-1", "token refresh")).unwrap();
        engine.create(tribal("mem-2", "pool sizing")).unwrap();
        engine.get(&MemoryId::new("mem-1")).unwrap();

        let context = engine.context(Intent::FixBug, "token refresh");
        assert_eq!(engine.retrieve(&context).unwrap().memories.len(), 2);
        let stats = engine.cache_stats();
        assert_eq!((stats.hits, stats.misses), (1, 2));
        assert!(engine.store().cache().contains(&MemoryId::new("mem-2")));

        engine.retrieve(&context).unwrap();
        assert_eq!(engine.cache_stats().hits, 3);
    }

    #[test]
    fn test_infer_links_then_explain() {
        let engine = MemoryEngine::in_memory(MnemoConfig::default()).unwrap();
        engine.create(tribal("mem-a", "old rule")).unwrap();
        engine
            .create(tribal("mem-b", "new rule").with_supersedes("mem-a"))
            .unwrap();

        let edges = engine.infer_links(&MemoryId::new("mem-b")).unwrap();
        assert!(edges.iter().any(|e| {
            e.source_id.as_str() == "mem-a"
                && e.target_id.as_str() == "mem-b"
                && e.relation == CausalRelation::Supersedes
        }));

        let chain = engine.explain(&MemoryId::new("mem-b")).unwrap().unwrap();
        assert!(chain.contains(&MemoryId::new("mem-a")));
        assert!(engine.explain(&MemoryId::new("mem-404")).unwrap().is_none());
        assert!(engine.infer_links(&MemoryId::new("mem-404")).unwrap().is_empty());
    }
}
