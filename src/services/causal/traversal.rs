//! Causal graph traversal.
//!
//! Every traversal interleaves causal storage lookups with in-memory search
//! state. Cancellation is checked before each storage call and never inside
//! the pure bookkeeping between calls.
//!
//! | Query | Algorithm | Bound |
//! |-------|-----------|-------|
//! | [`CausalTraversal::shortest_path`] | BFS, global visited set | `max_length` |
//! | [`CausalTraversal::all_paths`] | DFS, per-branch visited set | `max_length`, `max_paths` |
//! | [`CausalTraversal::subgraph`] | induced / BFS expansion | `max_nodes` |
//! | [`CausalTraversal::trace`] | BFS by hops | `max_depth`, `max_nodes` |
//! | [`CausalTraversal::find_cycles`] | DFS with an on-path set | `max_nodes` |

use crate::cancellation::Cancellation;
use crate::config::TraversalConfig;
use crate::models::{CausalChain, CausalEdge, CausalPath, CausalRelation, Memory, MemoryId, NodeSeed};
use crate::observability::metrics::TRAVERSAL_STORAGE_CALLS;
use crate::storage::{CausalStorage, EdgeQuery, MemoryQuery, MemoryStore};
use crate::Result;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tracing::instrument;

/// Paths whose strengths differ by less than this are ordered by length.
const STRENGTH_TIE_EPSILON: f64 = 0.01;

/// Which edges a trace follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Incoming edges: what led to the root.
    Origins,
    /// Outgoing edges: what the root led to.
    Effects,
    /// Both directions.
    Both,
}

impl Direction {
    const fn operation(self) -> &'static str {
        match self {
            Self::Origins => "trace_origins",
            Self::Effects => "trace_effects",
            Self::Both => "explain",
        }
    }
}

/// Options for path queries.
#[derive(Debug, Clone, PartialEq)]
pub struct PathOptions {
    /// Maximum edges in a path.
    pub max_length: usize,
    /// Edges weaker than this are not followed.
    pub min_strength: f64,
    /// Allowed relations; `None` follows all.
    pub relation_types: Option<Vec<CausalRelation>>,
    /// Maximum completed paths (all-paths search only).
    pub max_paths: usize,
}

impl Default for PathOptions {
    fn default() -> Self {
        Self::from_config(&TraversalConfig::default())
    }
}

impl PathOptions {
    /// Options taken from the traversal configuration.
    #[must_use]
    pub fn from_config(config: &TraversalConfig) -> Self {
        Self {
            max_length: config.max_path_length,
            min_strength: config.min_strength,
            relation_types: None,
            max_paths: config.max_paths,
        }
    }

    /// Sets the maximum path length.
    #[must_use]
    pub const fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    /// Sets the minimum edge strength.
    #[must_use]
    pub const fn with_min_strength(mut self, min_strength: f64) -> Self {
        self.min_strength = min_strength;
        self
    }

    /// Restricts the relations followed.
    #[must_use]
    pub fn with_relations(mut self, relations: impl IntoIterator<Item = CausalRelation>) -> Self {
        self.relation_types = Some(relations.into_iter().collect());
        self
    }

    /// Sets the maximum number of paths.
    #[must_use]
    pub const fn with_max_paths(mut self, max_paths: usize) -> Self {
        self.max_paths = max_paths;
        self
    }

    fn edge_query(&self) -> EdgeQuery {
        EdgeQuery {
            min_strength: Some(self.min_strength),
            relation_types: self.relation_types.clone(),
            include_inferred: true,
        }
    }
}

/// How far a subgraph grows beyond its seeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expansion {
    /// Only edges with both endpoints among the seeds.
    Induced,
    /// Seeds plus neighbours up to this many hops away.
    Neighbors(usize),
    /// The whole connected component of the seeds.
    Component,
}

/// Options for subgraph extraction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubgraphOptions {
    /// Expansion mode.
    pub expansion: Expansion,
    /// Maximum nodes in the result.
    pub max_nodes: usize,
    /// Edges weaker than this are ignored.
    pub min_strength: f64,
}

impl Default for SubgraphOptions {
    fn default() -> Self {
        let config = TraversalConfig::default();
        Self {
            expansion: Expansion::Induced,
            max_nodes: config.max_nodes,
            min_strength: config.min_strength,
        }
    }
}

impl SubgraphOptions {
    /// Sets the expansion mode.
    #[must_use]
    pub const fn with_expansion(mut self, expansion: Expansion) -> Self {
        self.expansion = expansion;
        self
    }

    /// Sets the node cap.
    #[must_use]
    pub const fn with_max_nodes(mut self, max_nodes: usize) -> Self {
        self.max_nodes = max_nodes;
        self
    }
}

/// Traversal over causal storage, resolving nodes from the record store.
pub struct CausalTraversal {
    causal: Arc<dyn CausalStorage>,
    store: Arc<dyn MemoryStore>,
    config: TraversalConfig,
}

impl std::fmt::Debug for CausalTraversal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CausalTraversal")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl CausalTraversal {
    /// Creates a traversal over `causal`, resolving nodes from `store`.
    #[must_use]
    pub fn new(
        causal: Arc<dyn CausalStorage>,
        store: Arc<dyn MemoryStore>,
        config: TraversalConfig,
    ) -> Self {
        Self {
            causal,
            store,
            config,
        }
    }

    /// Returns the traversal configuration.
    #[must_use]
    pub const fn config(&self) -> &TraversalConfig {
        &self.config
    }

    // ========================================================================
    // Paths
    // ========================================================================

    /// Finds the path with the fewest edges from `source` to `target`.
    ///
    /// Path strength is the product of traversed edge strengths. BFS stops at
    /// the first discovery of `target`, so the result minimises edge count,
    /// not maximises strength. A path from a node to itself is the empty path.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Cancelled`] or the causal storage error.
    #[instrument(skip_all, fields(operation = "shortest_path", source = %source, target = %target))]
    pub fn shortest_path(
        &self,
        source: &MemoryId,
        target: &MemoryId,
        options: &PathOptions,
        cancel: &Cancellation,
    ) -> Result<Option<CausalPath>> {
        if source == target {
            return Ok(Some(CausalPath::start(source.clone())));
        }
        let query = options.edge_query();
        let mut visited: HashSet<MemoryId> = HashSet::from([source.clone()]);
        let mut frontier = VecDeque::from([CausalPath::start(source.clone())]);

        while let Some(path) = frontier.pop_front() {
            if path.len() >= options.max_length {
                continue;
            }
            let Some(end) = path.end() else {
                continue;
            };
            for edge in self.edges(end, Direction::Effects, &query, cancel, "shortest_path")? {
                let next = edge.target_id.clone();
                if !visited.insert(next.clone()) {
                    continue;
                }
                let extended = path.extended(edge, next.clone());
                if next == *target {
                    return Ok(Some(extended));
                }
                frontier.push_back(extended);
            }
        }
        Ok(None)
    }

    /// Enumerates up to `max_paths` simple paths from `source` to `target`.
    ///
    /// A node may appear on different branches but never twice on one path.
    /// Results are sorted by strength descending; strengths within 0.01 of
    /// each other are ordered by length ascending.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Cancelled`] or the causal storage error.
    #[instrument(skip_all, fields(operation = "all_paths", source = %source, target = %target))]
    pub fn all_paths(
        &self,
        source: &MemoryId,
        target: &MemoryId,
        options: &PathOptions,
        cancel: &Cancellation,
    ) -> Result<Vec<CausalPath>> {
        if options.max_paths == 0 {
            return Ok(Vec::new());
        }
        if source == target {
            return Ok(vec![CausalPath::start(source.clone())]);
        }
        let mut search = PathSearch {
            target,
            options,
            query: options.edge_query(),
            cancel,
            on_path: HashSet::from([source.clone()]),
            found: Vec::new(),
        };
        self.dfs(&CausalPath::start(source.clone()), &mut search)?;

        let mut paths = search.found;
        sort_paths(&mut paths);
        Ok(paths)
    }

    fn dfs(&self, path: &CausalPath, search: &mut PathSearch<'_>) -> Result<()> {
        if path.len() >= search.options.max_length {
            return Ok(());
        }
        let Some(end) = path.end() else {
            return Ok(());
        };
        let edges = self.edges(end, Direction::Effects, &search.query, search.cancel, "all_paths")?;
        for edge in edges {
            if search.found.len() >= search.options.max_paths {
                break;
            }
            let next = edge.target_id.clone();
            if search.on_path.contains(&next) {
                continue;
            }
            let extended = path.extended(edge, next.clone());
            if next == *search.target {
                search.found.push(extended);
                continue;
            }
            search.on_path.insert(next.clone());
            self.dfs(&extended, search)?;
            search.on_path.remove(&next);
        }
        Ok(())
    }

    // ========================================================================
    // Subgraphs and traces
    // ========================================================================

    /// Extracts the subgraph around `seeds`.
    ///
    /// Seeds are deduplicated and capped at `max_nodes`. Seeds or neighbours
    /// missing from the record store are dropped together with their edges.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Cancelled`] or a storage error.
    #[instrument(skip(self, seeds, options, cancel), fields(operation = "subgraph", seeds = seeds.len()))]
    pub fn subgraph(
        &self,
        seeds: &[MemoryId],
        options: &SubgraphOptions,
        cancel: &Cancellation,
    ) -> Result<CausalChain> {
        let mut unique = Vec::new();
        let mut seen = HashSet::new();
        for id in seeds {
            if unique.len() >= options.max_nodes {
                break;
            }
            if seen.insert(id.clone()) {
                unique.push(id.clone());
            }
        }
        let root = (unique.len() == 1).then(|| unique[0].clone());
        let query = EdgeQuery::new().with_min_strength(options.min_strength);

        let walk = match options.expansion {
            Expansion::Induced => {
                let mut edges = Vec::new();
                for id in &unique {
                    edges.extend(
                        self.edges(id, Direction::Effects, &query, cancel, "subgraph")?
                            .into_iter()
                            .filter(|e| seen.contains(&e.target_id)),
                    );
                }
                Walk {
                    nodes: unique.into_iter().map(|id| (id, 0)).collect(),
                    edges,
                }
            },
            Expansion::Neighbors(depth) => self.expand(
                unique,
                Direction::Both,
                &query,
                Some(depth),
                options.max_nodes,
                cancel,
            )?,
            Expansion::Component => {
                self.expand(unique, Direction::Both, &query, None, options.max_nodes, cancel)?
            },
        };

        let seeds = self.resolve(&walk.nodes, cancel, "subgraph")?;
        Ok(CausalChain::build(root, seeds, walk.edges))
    }

    /// Walks from `root` in `direction` up to the configured depth and node cap.
    ///
    /// Returns `None` if `root` is not in the record store.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Cancelled`] or a storage error.
    #[instrument(skip_all, fields(operation = direction.operation(), root = %root))]
    pub fn trace(
        &self,
        root: &MemoryId,
        direction: Direction,
        cancel: &Cancellation,
    ) -> Result<Option<CausalChain>> {
        let query = EdgeQuery::new().with_min_strength(self.config.min_strength);
        let walk = self.expand(
            vec![root.clone()],
            direction,
            &query,
            Some(self.config.max_depth),
            self.config.max_nodes,
            cancel,
        )?;
        let seeds = self.resolve(&walk.nodes, cancel, direction.operation())?;
        if !seeds.iter().any(|s| s.memory_id == *root) {
            return Ok(None);
        }
        Ok(Some(CausalChain::build(Some(root.clone()), seeds, walk.edges)))
    }

    /// Traces what led to `root`.
    ///
    /// # Errors
    ///
    /// See [`Self::trace`].
    pub fn trace_origins(&self, root: &MemoryId, cancel: &Cancellation) -> Result<Option<CausalChain>> {
        self.trace(root, Direction::Origins, cancel)
    }

    /// Traces what `root` led to.
    ///
    /// # Errors
    ///
    /// See [`Self::trace`].
    pub fn trace_effects(&self, root: &MemoryId, cancel: &Cancellation) -> Result<Option<CausalChain>> {
        self.trace(root, Direction::Effects, cancel)
    }

    /// Traces both directions around `root`.
    ///
    /// # Errors
    ///
    /// See [`Self::trace`].
    pub fn explain(&self, root: &MemoryId, cancel: &Cancellation) -> Result<Option<CausalChain>> {
        self.trace(root, Direction::Both, cancel)
    }

    /// Finds directed cycles of `relation` edges reachable from `seeds`.
    ///
    /// Cycles are reported once each, rotated to start at their smallest id.
    /// Exploration stops after `max_nodes` nodes have been fully explored.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Cancelled`] or the causal storage error.
    #[instrument(skip(self, seeds, cancel), fields(operation = "find_cycles", seeds = seeds.len()))]
    pub fn find_cycles(
        &self,
        seeds: &[MemoryId],
        relation: CausalRelation,
        cancel: &Cancellation,
    ) -> Result<Vec<Vec<MemoryId>>> {
        let mut search = CycleSearch {
            query: EdgeQuery::new().with_relations([relation]),
            cancel,
            stack: Vec::new(),
            on_stack: HashSet::new(),
            done: HashSet::new(),
            cycles: BTreeSet::new(),
        };
        for seed in seeds {
            if !search.done.contains(seed) {
                self.cycle_dfs(seed, &mut search)?;
            }
        }
        if !search.cycles.is_empty() {
            tracing::warn!(
                relation = relation.as_str(),
                cycles = search.cycles.len(),
                "cyclic causal chain detected"
            );
        }
        Ok(search.cycles.into_iter().collect())
    }

    fn cycle_dfs(&self, id: &MemoryId, search: &mut CycleSearch<'_>) -> Result<()> {
        if search.done.len() >= self.config.max_nodes {
            return Ok(());
        }
        search.stack.push(id.clone());
        search.on_stack.insert(id.clone());

        let edges = self.edges(id, Direction::Effects, &search.query, search.cancel, "find_cycles")?;
        for edge in edges {
            let next = edge.target_id;
            if search.on_stack.contains(&next) {
                if let Some(pos) = search.stack.iter().position(|n| *n == next) {
                    search.cycles.insert(canonical_cycle(search.stack[pos..].to_vec()));
                }
            } else if !search.done.contains(&next) {
                self.cycle_dfs(&next, search)?;
            }
        }

        search.stack.pop();
        search.on_stack.remove(id);
        search.done.insert(id.clone());
        Ok(())
    }

    // ========================================================================
    // Storage boundaries
    // ========================================================================

    /// BFS from `start`, recording hop depth and every followed edge.
    fn expand(
        &self,
        start: Vec<MemoryId>,
        direction: Direction,
        query: &EdgeQuery,
        max_depth: Option<usize>,
        max_nodes: usize,
        cancel: &Cancellation,
    ) -> Result<Walk> {
        let operation = direction.operation();
        let mut depth_of: HashMap<MemoryId, usize> = HashMap::new();
        let mut nodes = Vec::new();
        let mut frontier = VecDeque::new();
        for id in start.into_iter().take(max_nodes) {
            if depth_of.insert(id.clone(), 0).is_none() {
                nodes.push((id.clone(), 0));
                frontier.push_back((id, 0));
            }
        }

        let mut edges: BTreeMap<(MemoryId, MemoryId, CausalRelation), CausalEdge> = BTreeMap::new();
        while let Some((id, depth)) = frontier.pop_front() {
            if max_depth.is_some_and(|max| depth >= max) {
                continue;
            }
            for edge in self.edges(&id, direction, query, cancel, operation)? {
                let Some(next) = edge.other_end(&id).cloned() else {
                    continue;
                };
                if !depth_of.contains_key(&next) {
                    if nodes.len() >= max_nodes {
                        continue;
                    }
                    depth_of.insert(next.clone(), depth + 1);
                    nodes.push((next.clone(), depth + 1));
                    frontier.push_back((next, depth + 1));
                }
                edges.entry(edge.key()).or_insert(edge);
            }
        }

        Ok(Walk {
            nodes,
            edges: edges.into_values().collect(),
        })
    }

    fn edges(
        &self,
        id: &MemoryId,
        direction: Direction,
        query: &EdgeQuery,
        cancel: &Cancellation,
        operation: &'static str,
    ) -> Result<Vec<CausalEdge>> {
        cancel.check(operation)?;
        metrics::counter!(TRAVERSAL_STORAGE_CALLS, "operation" => operation).increment(1);
        match direction {
            Direction::Effects => self.causal.get_edges_from(id, query),
            Direction::Origins => self.causal.get_edges_to(id, query),
            Direction::Both => self.causal.get_edges_for(id, query),
        }
    }

    /// Looks up node records in one search, without counting them as reads.
    fn resolve(
        &self,
        nodes: &[(MemoryId, usize)],
        cancel: &Cancellation,
        operation: &'static str,
    ) -> Result<Vec<NodeSeed>> {
        if nodes.is_empty() {
            return Ok(Vec::new());
        }
        cancel.check(operation)?;
        let records = self
            .store
            .search(&MemoryQuery::new().with_ids(nodes.iter().map(|(id, _)| id.clone())))?;
        let by_id: HashMap<&MemoryId, &Memory> = records.iter().map(|m| (&m.id, m)).collect();

        Ok(nodes
            .iter()
            .filter_map(|(id, depth)| {
                let Some(memory) = by_id.get(id) else {
                    tracing::debug!(memory_id = %id, "dropping node with no record");
                    return None;
                };
                Some(NodeSeed {
                    memory_id: id.clone(),
                    memory_type: memory.memory_type(),
                    summary: memory.summary.clone(),
                    depth: *depth,
                })
            })
            .collect())
    }
}

struct PathSearch<'a> {
    target: &'a MemoryId,
    options: &'a PathOptions,
    query: EdgeQuery,
    cancel: &'a Cancellation,
    on_path: HashSet<MemoryId>,
    found: Vec<CausalPath>,
}

struct CycleSearch<'a> {
    query: EdgeQuery,
    cancel: &'a Cancellation,
    stack: Vec<MemoryId>,
    on_stack: HashSet<MemoryId>,
    done: HashSet<MemoryId>,
    cycles: BTreeSet<Vec<MemoryId>>,
}

struct Walk {
    nodes: Vec<(MemoryId, usize)>,
    edges: Vec<CausalEdge>,
}

/// Sorts by strength descending, then groups runs within
/// [`STRENGTH_TIE_EPSILON`] of the run's strongest path and orders each run
/// by length ascending.
fn sort_paths(paths: &mut [CausalPath]) {
    paths.sort_by(|a, b| b.strength.total_cmp(&a.strength));
    let mut start = 0;
    while start < paths.len() {
        let leader = paths[start].strength;
        let mut end = start + 1;
        while end < paths.len() && leader - paths[end].strength < STRENGTH_TIE_EPSILON {
            end += 1;
        }
        paths[start..end].sort_by_key(CausalPath::len);
        start = end;
    }
}

fn canonical_cycle(mut cycle: Vec<MemoryId>) -> Vec<MemoryId> {
    let min = cycle
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.cmp(b.1))
        .map_or(0, |(i, _)| i);
    cycle.rotate_left(min);
    cycle
}
