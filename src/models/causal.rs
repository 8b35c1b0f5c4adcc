//! Causal graph types: relations, edges, evidence, paths and chains.
//!
//! Edges are directed and weighted. Nothing forbids cycles; mutual support
//! between two records is a legitimate feedback loop.
//!
//! # Relations
//!
//! | Relation | Meaning (source → target) |
//! |----------|---------------------------|
//! | `caused` | source brought target about |
//! | `enabled` | source made target possible |
//! | `prevented` | source stopped target |
//! | `contradicts` | source disagrees with target |
//! | `supersedes` | target replaces source |
//! | `supports` | source backs up target |
//! | `derived_from` | target was derived from source |
//! | `triggered_by` | target was triggered by source |

use super::{MemoryId, MemoryType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Type of causal relation between two memories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CausalRelation {
    /// Source caused target.
    Caused,
    /// Source enabled target.
    Enabled,
    /// Source prevented target.
    Prevented,
    /// Source contradicts target.
    Contradicts,
    /// Target supersedes source.
    Supersedes,
    /// Source supports target.
    Supports,
    /// Target derived from source.
    DerivedFrom,
    /// Target triggered by source.
    TriggeredBy,
}

impl CausalRelation {
    /// Returns all relation variants.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Caused,
            Self::Enabled,
            Self::Prevented,
            Self::Contradicts,
            Self::Supersedes,
            Self::Supports,
            Self::DerivedFrom,
            Self::TriggeredBy,
        ]
    }

    /// Returns the relation as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Caused => "caused",
            Self::Enabled => "enabled",
            Self::Prevented => "prevented",
            Self::Contradicts => "contradicts",
            Self::Supersedes => "supersedes",
            Self::Supports => "supports",
            Self::DerivedFrom => "derived_from",
            Self::TriggeredBy => "triggered_by",
        }
    }

    /// Parses a relation from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "caused" | "causes" => Some(Self::Caused),
            "enabled" | "enables" => Some(Self::Enabled),
            "prevented" | "prevents" => Some(Self::Prevented),
            "contradicts" | "conflicts_with" => Some(Self::Contradicts),
            "supersedes" | "replaces" => Some(Self::Supersedes),
            "supports" | "supported_by" => Some(Self::Supports),
            "derived_from" => Some(Self::DerivedFrom),
            "triggered_by" => Some(Self::TriggeredBy),
            _ => None,
        }
    }
}

impl fmt::Display for CausalRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a piece of evidence was gathered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvidenceKind {
    /// Declared by the record itself (ids, supersession, named terms).
    Explicit,
    /// Inferred from similarity.
    Semantic,
}

/// Evidence backing a causal edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    /// How the evidence was gathered.
    #[serde(rename = "type")]
    pub kind: EvidenceKind,
    /// Human-readable description.
    pub description: String,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// When the evidence was gathered.
    pub gathered_at: DateTime<Utc>,
    /// Optional pointer (text excerpt, field name, id).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

impl Evidence {
    /// Creates evidence gathered now.
    #[must_use]
    pub fn new(kind: EvidenceKind, description: impl Into<String>, confidence: f64) -> Self {
        Self {
            kind,
            description: description.into(),
            confidence: clamp_unit(confidence),
            gathered_at: Utc::now(),
            reference: None,
        }
    }

    /// Attaches a reference.
    #[must_use]
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }
}

/// A directed, typed, weighted edge between two memories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CausalEdge {
    /// Source memory.
    pub source_id: MemoryId,
    /// Target memory.
    pub target_id: MemoryId,
    /// Relation type.
    pub relation: CausalRelation,
    /// Strength in `[0, 1]`. For inferred edges this is the inference confidence.
    pub strength: f64,
    /// Supporting evidence (at least one entry for inferred edges).
    #[serde(default)]
    pub evidence: Vec<Evidence>,
    /// True if proposed by an inference strategy rather than asserted.
    #[serde(default)]
    pub inferred: bool,
    /// When the edge was created.
    pub created_at: DateTime<Utc>,
}

impl CausalEdge {
    /// Creates an asserted edge. Strength is clamped to `[0, 1]`.
    #[must_use]
    pub fn new(
        source_id: impl Into<MemoryId>,
        target_id: impl Into<MemoryId>,
        relation: CausalRelation,
        strength: f64,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
            relation,
            strength: clamp_unit(strength),
            evidence: Vec::new(),
            inferred: false,
            created_at: Utc::now(),
        }
    }

    /// Adds a piece of evidence.
    #[must_use]
    pub fn with_evidence(mut self, evidence: Evidence) -> Self {
        self.evidence.push(evidence);
        self
    }

    /// Marks the edge as inferred.
    #[must_use]
    pub const fn inferred(mut self) -> Self {
        self.inferred = true;
        self
    }

    /// Returns the edge's identity key: `(source, target, relation)`.
    #[must_use]
    pub fn key(&self) -> (MemoryId, MemoryId, CausalRelation) {
        (self.source_id.clone(), self.target_id.clone(), self.relation)
    }

    /// Returns true if `id` is either endpoint.
    #[must_use]
    pub fn touches(&self, id: &MemoryId) -> bool {
        self.source_id == *id || self.target_id == *id
    }

    /// Returns the endpoint opposite `id`, if `id` is an endpoint.
    #[must_use]
    pub fn other_end(&self, id: &MemoryId) -> Option<&MemoryId> {
        if self.source_id == *id {
            Some(&self.target_id)
        } else if self.target_id == *id {
            Some(&self.source_id)
        } else {
            None
        }
    }
}

/// A path through the causal graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CausalPath {
    /// Visited memories, source first.
    pub nodes: Vec<MemoryId>,
    /// Traversed edges, in order.
    pub edges: Vec<CausalEdge>,
    /// Product of traversed edge strengths.
    pub strength: f64,
}

impl CausalPath {
    /// Creates a zero-length path rooted at `start`.
    #[must_use]
    pub fn start(start: MemoryId) -> Self {
        Self {
            nodes: vec![start],
            edges: Vec::new(),
            strength: 1.0,
        }
    }

    /// Returns the number of edges.
    #[must_use]
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// Returns true for a zero-length path.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Returns the last node on the path.
    #[must_use]
    pub fn end(&self) -> Option<&MemoryId> {
        self.nodes.last()
    }

    /// Returns a new path extended by `edge` to `next`.
    #[must_use]
    pub fn extended(&self, edge: CausalEdge, next: MemoryId) -> Self {
        let mut path = self.clone();
        path.strength *= edge.strength;
        path.edges.push(edge);
        path.nodes.push(next);
        path
    }
}

/// A materialized memory in a causal chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CausalNode {
    /// Memory id.
    pub memory_id: MemoryId,
    /// Resolved memory type.
    pub memory_type: MemoryType,
    /// Resolved summary.
    pub summary: String,
    /// Hop distance from the query root(s).
    pub depth: usize,
    /// Edges pointing at this node within the chain.
    pub incoming: Vec<CausalEdge>,
    /// Edges leaving this node within the chain.
    pub outgoing: Vec<CausalEdge>,
}

/// Input for building a [`CausalNode`]: the node without its edge lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSeed {
    /// Memory id.
    pub memory_id: MemoryId,
    /// Resolved memory type.
    pub memory_type: MemoryType,
    /// Resolved summary.
    pub summary: String,
    /// Hop distance from the query root(s).
    pub depth: usize,
}

/// Immutable snapshot of a node and edge set produced by one traversal call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CausalChain {
    root: Option<MemoryId>,
    nodes: Vec<CausalNode>,
    edges: Vec<CausalEdge>,
    chain_confidence: f64,
    max_depth: usize,
    created_at: DateTime<Utc>,
}

impl CausalChain {
    /// Builds a chain from node seeds and the final edge set.
    ///
    /// Edges whose endpoints are not both among the nodes are dropped.
    /// Incoming and outgoing lists are recomputed from the surviving edges,
    /// and the chain confidence is the mean edge strength (1.0 with no edges).
    #[must_use]
    pub fn build(root: Option<MemoryId>, seeds: Vec<NodeSeed>, edges: Vec<CausalEdge>) -> Self {
        let index: HashMap<MemoryId, usize> = seeds
            .iter()
            .enumerate()
            .map(|(i, s)| (s.memory_id.clone(), i))
            .collect();

        let edges: Vec<CausalEdge> = edges
            .into_iter()
            .filter(|e| index.contains_key(&e.source_id) && index.contains_key(&e.target_id))
            .collect();

        let mut nodes: Vec<CausalNode> = seeds
            .into_iter()
            .map(|s| CausalNode {
                memory_id: s.memory_id,
                memory_type: s.memory_type,
                summary: s.summary,
                depth: s.depth,
                incoming: Vec::new(),
                outgoing: Vec::new(),
            })
            .collect();

        for edge in &edges {
            if let Some(&i) = index.get(&edge.source_id) {
                nodes[i].outgoing.push(edge.clone());
            }
            if let Some(&i) = index.get(&edge.target_id) {
                nodes[i].incoming.push(edge.clone());
            }
        }

        let chain_confidence = mean_strength(&edges);
        let max_depth = nodes.iter().map(|n| n.depth).max().unwrap_or(0);

        Self {
            root,
            nodes,
            edges,
            chain_confidence,
            max_depth,
            created_at: Utc::now(),
        }
    }

    /// Returns the root memory, if the chain was built from a single root.
    #[must_use]
    pub const fn root(&self) -> Option<&MemoryId> {
        self.root.as_ref()
    }

    /// Returns the nodes.
    #[must_use]
    pub fn nodes(&self) -> &[CausalNode] {
        &self.nodes
    }

    /// Returns the edges.
    #[must_use]
    pub fn edges(&self) -> &[CausalEdge] {
        &self.edges
    }

    /// Returns the mean edge strength.
    #[must_use]
    pub const fn chain_confidence(&self) -> f64 {
        self.chain_confidence
    }

    /// Returns the deepest node depth.
    #[must_use]
    pub const fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Returns the snapshot time.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Looks up a node by memory id.
    #[must_use]
    pub fn node(&self, id: &MemoryId) -> Option<&CausalNode> {
        self.nodes.iter().find(|n| n.memory_id == *id)
    }

    /// Returns true if the chain contains `id`.
    #[must_use]
    pub fn contains(&self, id: &MemoryId) -> bool {
        self.node(id).is_some()
    }

    /// Returns true if the chain has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Mean strength of `edges`, 1.0 when empty.
#[allow(clippy::cast_precision_loss)]
fn mean_strength(edges: &[CausalEdge]) -> f64 {
    if edges.is_empty() {
        return 1.0;
    }
    edges.iter().map(|e| e.strength).sum::<f64>() / edges.len() as f64
}

/// Clamps to `[0, 1]`, mapping NaN to 0.
pub(crate) fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}
