//! Inference orchestration: run strategies, merge, persist.

use super::{ExplicitStrategy, InferenceStrategy, SemanticStrategy};
use crate::cancellation::Cancellation;
use crate::config::InferenceConfig;
use crate::models::{CausalEdge, CausalRelation, Memory, MemoryId};
use crate::observability::metrics::INFERRED_EDGES;
use crate::storage::CausalStorage;
use crate::Result;
use std::collections::{BTreeMap, HashSet};
use tracing::instrument;

/// Runs the configured inference strategies and merges their proposals.
pub struct CausalInferenceService {
    strategies: Vec<Box<dyn InferenceStrategy>>,
}

impl std::fmt::Debug for CausalInferenceService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CausalInferenceService")
            .field(
                "strategies",
                &self.strategies.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Default for CausalInferenceService {
    fn default() -> Self {
        Self::new(&InferenceConfig::default())
    }
}

impl CausalInferenceService {
    /// Builds the service with the strategies enabled in `config`.
    #[must_use]
    pub fn new(config: &InferenceConfig) -> Self {
        let mut strategies: Vec<Box<dyn InferenceStrategy>> = Vec::new();
        if config.explicit {
            strategies.push(Box::new(ExplicitStrategy::new()));
        }
        if config.semantic {
            strategies.push(Box::new(SemanticStrategy::new(config.min_similarity)));
        }
        Self { strategies }
    }

    /// Builds the service from explicit strategies.
    #[must_use]
    pub fn with_strategies(strategies: Vec<Box<dyn InferenceStrategy>>) -> Self {
        Self { strategies }
    }

    /// Returns the names of the active strategies, in run order.
    #[must_use]
    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Proposes edges for `memory` against `candidates`.
    ///
    /// Every returned edge is marked inferred. Self-loops and edges naming an
    /// endpoint outside `{memory} ∪ candidates` are dropped. Proposals with
    /// the same `(source, target, relation)` collapse into one edge carrying
    /// the highest strength and the union of evidence. Output is sorted by
    /// that key.
    #[must_use]
    #[instrument(skip(self, memory, candidates), fields(operation = "infer", memory_id = %memory.id, candidates = candidates.len()))]
    pub fn infer(&self, memory: &Memory, candidates: &[Memory]) -> Vec<CausalEdge> {
        let known: HashSet<&MemoryId> = candidates
            .iter()
            .map(|c| &c.id)
            .chain(std::iter::once(&memory.id))
            .collect();

        let mut merged: BTreeMap<(MemoryId, MemoryId, CausalRelation), CausalEdge> = BTreeMap::new();
        for strategy in &self.strategies {
            let proposed = strategy.infer(memory, candidates);
            tracing::debug!(strategy = strategy.name(), proposed = proposed.len(), "strategy finished");

            for edge in proposed {
                if edge.source_id == edge.target_id {
                    tracing::debug!(memory_id = %edge.source_id, "dropping self-loop");
                    continue;
                }
                if !known.contains(&edge.source_id) || !known.contains(&edge.target_id) {
                    tracing::warn!(
                        source = %edge.source_id,
                        target = %edge.target_id,
                        strategy = strategy.name(),
                        "dropping edge with unknown endpoint"
                    );
                    continue;
                }
                metrics::counter!(INFERRED_EDGES, "strategy" => strategy.name()).increment(1);
                match merged.entry(edge.key()) {
                    std::collections::btree_map::Entry::Vacant(slot) => {
                        slot.insert(edge.inferred());
                    },
                    std::collections::btree_map::Entry::Occupied(mut slot) => {
                        merge_into(slot.get_mut(), edge);
                    },
                }
            }
        }
        merged.into_values().collect()
    }

    /// Infers edges and writes each one to `storage`.
    ///
    /// Returns the stored edges.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Cancelled`] if `cancel` fires before a write,
    /// or the storage error of the first failing write. Edges written before
    /// the failure stay written.
    #[instrument(skip_all, fields(operation = "infer_and_store", memory_id = %memory.id))]
    pub fn infer_and_store(
        &self,
        memory: &Memory,
        candidates: &[Memory],
        storage: &dyn CausalStorage,
        cancel: &Cancellation,
    ) -> Result<Vec<CausalEdge>> {
        let edges = self.infer(memory, candidates);
        for edge in &edges {
            cancel.check("infer_and_store")?;
            storage.add_edge(edge.clone())?;
        }
        tracing::debug!(stored = edges.len(), "inferred edges stored");
        Ok(edges)
    }
}

fn merge_into(existing: &mut CausalEdge, incoming: CausalEdge) {
    if incoming.strength > existing.strength {
        existing.strength = incoming.strength;
    }
    for evidence in incoming.evidence {
        let duplicate = existing
            .evidence
            .iter()
            .any(|e| e.kind == evidence.kind && e.description == evidence.description);
        if !duplicate {
            existing.evidence.push(evidence);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EvidenceKind, MemoryContent, TribalPayload};
    use crate::storage::{EdgeQuery, InMemoryCausalStorage};

    fn tribal(id: &str, topic: &str) -> Memory {
        Memory::new(
            id,
            format!("note {id}"),
            MemoryContent::Tribal(TribalPayload {
                topic: topic.to_string(),
                ..TribalPayload::default()
            }),
        )
    }

    struct Rogue;

    impl InferenceStrategy for Rogue {
        fn name(&self) -> &'static str {
            "rogue"
        }

        fn infer(&self, memory: &Memory, _candidates: &[Memory]) -> Vec<CausalEdge> {
            vec![
                CausalEdge::new(memory.id.clone(), memory.id.clone(), CausalRelation::Caused, 0.9),
                CausalEdge::new("ghost", memory.id.clone(), CausalRelation::Caused, 0.9),
            ]
        }
    }

    #[test]
    fn test_drops_self_loops_and_unknown_endpoints() {
        let service = CausalInferenceService::with_strategies(vec![Box::new(Rogue)]);
        let record = tribal("mem-r", "auth");
        assert!(service.infer(&record, &[]).is_empty());
    }

    #[test]
    fn test_merges_duplicate_proposals() {
        let service = CausalInferenceService::default();
        assert_eq!(service.strategy_names(), vec!["explicit", "semantic"]);

        // Both strategies propose old -> new `supports` for the shared topic.
        let old = tribal("mem-old", "token rotation");
        let record = tribal("mem-new", "token rotation").with_supersedes("mem-old");
        let edges = service.infer(&record, &[old]);

        assert!(edges.iter().all(|e| e.inferred));
        let supersedes = edges
            .iter()
            .find(|e| e.relation == CausalRelation::Supersedes)
            .unwrap();
        assert_eq!(supersedes.source_id.as_str(), "mem-old");
        let supports = edges
            .iter()
            .find(|e| e.relation == CausalRelation::Supports)
            .unwrap();
        assert!((supports.strength - 0.6).abs() < 1e-9);
        assert_eq!(supports.evidence.len(), 2);

        let mut keys: Vec<_> = edges.iter().map(CausalEdge::key).collect();
        let before = keys.len();
        keys.dedup();
        assert_eq!(keys.len(), before);
    }

    #[test]
    fn test_merge_keeps_max_strength_and_evidence_union() {
        let mut base = CausalEdge::new("a", "b", CausalRelation::Supports, 0.4).with_evidence(
            crate::models::Evidence::new(EvidenceKind::Explicit, "term", 0.4),
        );
        let other = CausalEdge::new("a", "b", CausalRelation::Supports, 0.7).with_evidence(
            crate::models::Evidence::new(EvidenceKind::Semantic, "similar", 0.7),
        );
        merge_into(&mut base, other);
        assert!((base.strength - 0.7).abs() < f64::EPSILON);
        assert_eq!(base.evidence.len(), 2);
    }

    #[test]
    fn test_infer_and_store_persists() {
        let storage = InMemoryCausalStorage::new();
        let service = CausalInferenceService::default();
        let old = tribal("mem-old", "");
        let record = tribal("mem-new", "").with_supersedes("mem-old");

        let stored = service
            .infer_and_store(&record, &[old], &storage, &Cancellation::none())
            .unwrap();
        assert_eq!(stored.len(), 1);
        let from_old = storage
            .get_edges_from(&MemoryId::new("mem-old"), &EdgeQuery::new())
            .unwrap();
        assert_eq!(from_old.len(), 1);
        assert!(from_old[0].inferred);
    }

    #[test]
    fn test_infer_and_store_surfaces_outage() {
        let storage = InMemoryCausalStorage::new();
        storage.set_available(false);
        let service = CausalInferenceService::default();
        let old = tribal("mem-old", "");
        let record = tribal("mem-new", "").with_supersedes("mem-old");

        let err = service
            .infer_and_store(&record, &[old], &storage, &Cancellation::none())
            .unwrap_err();
        assert!(err.is_storage_unavailable());
    }
}
