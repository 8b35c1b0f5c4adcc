//! In-memory causal storage.

use crate::models::{CausalEdge, CausalRelation, MemoryId};
use crate::storage::traits::{CausalStorage, EdgeQuery};
use crate::{Error, Result};
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

/// In-memory causal edge storage.
///
/// Edges keep insertion order; re-adding an edge with the same identity
/// replaces it in place. Like [`super::InMemoryMemoryStore`] it can simulate
/// an outage with [`set_available`](Self::set_available).
#[derive(Debug)]
pub struct InMemoryCausalStorage {
    edges: RwLock<Vec<CausalEdge>>,
    available: AtomicBool,
}

impl Default for InMemoryCausalStorage {
    fn default() -> Self {
        Self {
            edges: RwLock::new(Vec::new()),
            available: AtomicBool::new(true),
        }
    }
}

impl InMemoryCausalStorage {
    /// Creates an empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a storage holding `edges`.
    #[must_use]
    pub fn with_edges(edges: impl IntoIterator<Item = CausalEdge>) -> Self {
        let storage = Self::new();
        if let Ok(mut stored) = storage.edges.write() {
            for edge in edges {
                upsert(&mut stored, edge);
            }
        }
        storage
    }

    /// Switches simulated availability.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn ensure_available(&self, operation: &str) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::storage(operation, "causal storage is unavailable"))
        }
    }

    fn select(
        &self,
        operation: &str,
        query: &EdgeQuery,
        pick: impl Fn(&CausalEdge) -> bool,
    ) -> Result<Vec<CausalEdge>> {
        self.ensure_available(operation)?;
        let edges = self
            .edges
            .read()
            .map_err(|e| Error::storage(operation, e.to_string()))?;
        Ok(edges
            .iter()
            .filter(|e| pick(e) && query.matches(e))
            .cloned()
            .collect())
    }
}

fn upsert(edges: &mut Vec<CausalEdge>, edge: CausalEdge) {
    let key = edge.key();
    if let Some(existing) = edges.iter_mut().find(|e| e.key() == key) {
        *existing = edge;
    } else {
        edges.push(edge);
    }
}

impl CausalStorage for InMemoryCausalStorage {
    fn add_edge(&self, edge: CausalEdge) -> Result<()> {
        self.ensure_available("add_edge")?;
        let mut edges = self
            .edges
            .write()
            .map_err(|e| Error::storage("add_edge", e.to_string()))?;
        upsert(&mut edges, edge);
        Ok(())
    }

    fn remove_edge(
        &self,
        source: &MemoryId,
        target: &MemoryId,
        relation: CausalRelation,
    ) -> Result<bool> {
        self.ensure_available("remove_edge")?;
        let mut edges = self
            .edges
            .write()
            .map_err(|e| Error::storage("remove_edge", e.to_string()))?;
        let before = edges.len();
        edges.retain(|e| !(e.source_id == *source && e.target_id == *target && e.relation == relation));
        Ok(edges.len() < before)
    }

    fn get_edges_from(&self, id: &MemoryId, query: &EdgeQuery) -> Result<Vec<CausalEdge>> {
        self.select("get_edges_from", query, |e| e.source_id == *id)
    }

    fn get_edges_to(&self, id: &MemoryId, query: &EdgeQuery) -> Result<Vec<CausalEdge>> {
        self.select("get_edges_to", query, |e| e.target_id == *id)
    }

    fn edge_count(&self) -> Result<usize> {
        self.ensure_available("edge_count")?;
        self.edges
            .read()
            .map(|e| e.len())
            .map_err(|e| Error::storage("edge_count", e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_replaces_same_identity() {
        let storage = InMemoryCausalStorage::new();
        storage
            .add_edge(CausalEdge::new("a", "b", CausalRelation::Supports, 0.3))
            .unwrap();
        storage
            .add_edge(CausalEdge::new("a", "b", CausalRelation::Supports, 0.7))
            .unwrap();
        storage
            .add_edge(CausalEdge::new("a", "b", CausalRelation::Caused, 0.7))
            .unwrap();

        assert_eq!(storage.edge_count().unwrap(), 2);
        let from = storage
            .get_edges_from(&MemoryId::new("a"), &EdgeQuery::new().with_relations([CausalRelation::Supports]))
            .unwrap();
        assert_eq!(from.len(), 1);
        assert!((from[0].strength - 0.7).abs() < f64::EPSILON);
    }

    #[test]
    fn test_directional_queries() {
        let storage = InMemoryCausalStorage::with_edges([
            CausalEdge::new("a", "b", CausalRelation::Caused, 0.9),
            CausalEdge::new("c", "a", CausalRelation::Enabled, 0.2),
            CausalEdge::new("a", "a", CausalRelation::Supports, 0.5),
        ]);
        let a = MemoryId::new("a");

        assert_eq!(storage.get_edges_from(&a, &EdgeQuery::new()).unwrap().len(), 2);
        assert_eq!(storage.get_edges_to(&a, &EdgeQuery::new()).unwrap().len(), 2);
        assert_eq!(storage.get_edges_for(&a, &EdgeQuery::new()).unwrap().len(), 3);
        assert_eq!(
            storage
                .get_edges_for(&a, &EdgeQuery::new().with_min_strength(0.4))
                .unwrap()
                .len(),
            2
        );
    }

    #[test]
    fn test_remove_edge() {
        let storage = InMemoryCausalStorage::with_edges([CausalEdge::new(
            "a",
            "b",
            CausalRelation::Caused,
            0.9,
        )]);
        let (a, b) = (MemoryId::new("a"), MemoryId::new("b"));
        assert!(storage.remove_edge(&a, &b, CausalRelation::Caused).unwrap());
        assert!(!storage.remove_edge(&a, &b, CausalRelation::Caused).unwrap());
    }

    #[test]
    fn test_unavailable_storage_fails() {
        let storage = InMemoryCausalStorage::new();
        storage.set_available(false);
        assert!(
            storage
                .get_edges_from(&MemoryId::new("a"), &EdgeQuery::new())
                .unwrap_err()
                .is_storage_unavailable()
        );
    }
}
