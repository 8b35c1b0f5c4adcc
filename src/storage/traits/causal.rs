//! Causal storage trait.
//!
//! Causal storage holds the directed, weighted edges between memory ids.
//! Cycles are allowed; callers bound traversal with depth and node limits.

use crate::Result;
use crate::models::{CausalEdge, CausalRelation, MemoryId};

/// Trait for causal edge storage backends.
///
/// Every call is a storage boundary: traversal checks cancellation before
/// each one.
pub trait CausalStorage: Send + Sync {
    /// Inserts an edge, replacing any edge with the same `(source, target, relation)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn add_edge(&self, edge: CausalEdge) -> Result<()>;

    /// Removes the edge with the given identity. Returns `true` if it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn remove_edge(
        &self,
        source: &MemoryId,
        target: &MemoryId,
        relation: CausalRelation,
    ) -> Result<bool>;

    /// Returns edges leaving `id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn get_edges_from(&self, id: &MemoryId, query: &EdgeQuery) -> Result<Vec<CausalEdge>>;

    /// Returns edges pointing at `id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn get_edges_to(&self, id: &MemoryId, query: &EdgeQuery) -> Result<Vec<CausalEdge>>;

    /// Returns edges in both directions. A self-loop is returned once.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn get_edges_for(&self, id: &MemoryId, query: &EdgeQuery) -> Result<Vec<CausalEdge>> {
        let mut edges = self.get_edges_from(id, query)?;
        edges.extend(
            self.get_edges_to(id, query)?
                .into_iter()
                .filter(|e| e.source_id != e.target_id),
        );
        Ok(edges)
    }

    /// Returns the number of stored edges.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn edge_count(&self) -> Result<usize>;
}

/// Edge filter for causal storage queries.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeQuery {
    /// Minimum edge strength (inclusive).
    pub min_strength: Option<f64>,
    /// Allowed relations; `None` allows all.
    pub relation_types: Option<Vec<CausalRelation>>,
    /// Whether inferred edges are returned.
    pub include_inferred: bool,
}

impl Default for EdgeQuery {
    fn default() -> Self {
        Self {
            min_strength: None,
            relation_types: None,
            include_inferred: true,
        }
    }
}

impl EdgeQuery {
    /// Creates a query that matches every edge.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the minimum strength.
    #[must_use]
    pub const fn with_min_strength(mut self, min_strength: f64) -> Self {
        self.min_strength = Some(min_strength);
        self
    }

    /// Restricts to the given relations.
    #[must_use]
    pub fn with_relations(mut self, relations: impl IntoIterator<Item = CausalRelation>) -> Self {
        self.relation_types = Some(relations.into_iter().collect());
        self
    }

    /// Excludes inferred edges.
    #[must_use]
    pub const fn asserted_only(mut self) -> Self {
        self.include_inferred = false;
        self
    }

    /// Returns true if `edge` passes every filter.
    #[must_use]
    pub fn matches(&self, edge: &CausalEdge) -> bool {
        if self.min_strength.is_some_and(|min| edge.strength < min) {
            return false;
        }
        if let Some(relations) = &self.relation_types
            && !relations.contains(&edge.relation)
        {
            return false;
        }
        self.include_inferred || !edge.inferred
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_query_filters() {
        let edge = CausalEdge::new("a", "b", CausalRelation::Supports, 0.5).inferred();

        assert!(EdgeQuery::new().matches(&edge));
        assert!(EdgeQuery::new().with_min_strength(0.5).matches(&edge));
        assert!(!EdgeQuery::new().with_min_strength(0.6).matches(&edge));
        assert!(!EdgeQuery::new().asserted_only().matches(&edge));
        assert!(
            EdgeQuery::new()
                .with_relations([CausalRelation::Supports])
                .matches(&edge)
        );
        assert!(
            !EdgeQuery::new()
                .with_relations([CausalRelation::Caused])
                .matches(&edge)
        );
    }
}
