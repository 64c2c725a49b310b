//! Random connected graph construction.
//!
//! A graph starts as `n` isolated nodes. [`connect`] then draws ordered node
//! pairs `(x, y)`, `x != y`, uniformly without replacement from the full pool
//! of `n * (n - 1)` candidates and adds the undirected edge for each draw,
//! stopping as soon as the graph is connected. Both orderings of a pair are
//! separate candidates, so an edge may be drawn twice; the second draw is a
//! structural no-op but still consumes its candidate.

use std::collections::VecDeque;

use log::debug;

use crate::gd_interface::{DiffusionError, NodeId, RandomSource};

/// Smallest graph with a meaningful connectivity goal
pub const MIN_GRAPH_NODES: usize = 2;

// ============================================================================
// Graph
// ============================================================================

/// Undirected simple graph over nodes `0..n`.
///
/// Neighbor lists keep the order edges were added; the broadcast simulator
/// relies on that order being stable when it picks the first `fanout`
/// neighbors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Graph {
    adjacency: Vec<Vec<NodeId>>,
    edge_count: usize,
}

impl Graph {
    /// Graph with `n` nodes and no edges
    pub fn with_nodes(n: usize) -> Self {
        Self {
            adjacency: vec![Vec::new(); n],
            edge_count: 0,
        }
    }

    /// Build a graph from an explicit edge list, in order.
    ///
    /// Rejects endpoints outside `0..n` and self-loops. Repeated edges are
    /// ignored, matching [`Graph::add_edge`].
    pub fn from_edges(n: usize, edges: &[(NodeId, NodeId)]) -> Result<Self, DiffusionError> {
        let mut graph = Self::with_nodes(n);
        for &(x, y) in edges {
            if x >= n || y >= n {
                return Err(DiffusionError::invalid(
                    "edges",
                    format!("edge ({}, {}) references a node outside 0..{}", x, y, n),
                ));
            }
            if x == y {
                return Err(DiffusionError::invalid(
                    "edges",
                    format!("self-loop on node {}", x),
                ));
            }
            graph.add_edge(x, y);
        }
        Ok(graph)
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    pub fn is_empty(&self) -> bool {
        self.adjacency.is_empty()
    }

    /// Neighbors of `node` in insertion order
    ///
    /// # Panics
    /// If `node` is not in `0..node_count()`.
    pub fn neighbors(&self, node: NodeId) -> &[NodeId] {
        &self.adjacency[node]
    }

    /// # Panics
    /// If `node` is not in `0..node_count()`.
    pub fn degree(&self, node: NodeId) -> usize {
        self.adjacency[node].len()
    }

    /// # Panics
    /// If either endpoint is not in `0..node_count()`.
    pub fn has_edge(&self, x: NodeId, y: NodeId) -> bool {
        // scan the shorter list
        let (a, b) = if self.degree(x) <= self.degree(y) {
            (x, y)
        } else {
            (y, x)
        };
        self.adjacency[a].contains(&b)
    }

    /// Add the undirected edge `x - y`.
    ///
    /// Returns `false` (and changes nothing) for a self-loop or an edge that
    /// already exists. Use [`Graph::from_edges`] for unchecked input.
    ///
    /// # Panics
    /// If either endpoint is not in `0..node_count()`.
    pub fn add_edge(&mut self, x: NodeId, y: NodeId) -> bool {
        if x == y || self.has_edge(x, y) {
            return false;
        }
        self.adjacency[x].push(y);
        self.adjacency[y].push(x);
        self.edge_count += 1;
        true
    }

    /// All edges as `(low, high)` pairs, each listed once
    pub fn edges(&self) -> Vec<(NodeId, NodeId)> {
        let mut edges = Vec::with_capacity(self.edge_count);
        for (x, neighbors) in self.adjacency.iter().enumerate() {
            for &y in neighbors {
                if x < y {
                    edges.push((x, y));
                }
            }
        }
        edges
    }

    /// BFS hop distance from `source` to every node; `None` if unreachable
    pub fn distances_from(&self, source: NodeId) -> Vec<Option<usize>> {
        let mut distance = vec![None; self.node_count()];
        let mut queue = VecDeque::new();
        distance[source] = Some(0);
        queue.push_back(source);

        while let Some(x) = queue.pop_front() {
            let next = distance[x].map(|d| d + 1);
            for &y in &self.adjacency[x] {
                if distance[y].is_none() {
                    distance[y] = next;
                    queue.push_back(y);
                }
            }
        }
        distance
    }

    /// Every node reachable from every other. An empty graph is not connected.
    pub fn is_connected(&self) -> bool {
        if self.is_empty() {
            return false;
        }
        self.distances_from(0).iter().all(Option::is_some)
    }

    /// Greatest BFS depth from `source`, or `None` if some node is unreachable
    pub fn eccentricity(&self, source: NodeId) -> Option<usize> {
        self.distances_from(source)
            .into_iter()
            .try_fold(0, |max, d| d.map(|d| max.max(d)))
    }
}

// ============================================================================
// Generation
// ============================================================================

/// Create `n` isolated nodes.
///
/// # Errors
/// * `InvalidArgument` - `n < 2`; no connectivity goal exists for 0 or 1 nodes
pub fn generate(n: usize) -> Result<Graph, DiffusionError> {
    if n < MIN_GRAPH_NODES {
        return Err(DiffusionError::invalid(
            "n",
            format!(
                "graph needs at least {} nodes, got {}",
                MIN_GRAPH_NODES, n
            ),
        ));
    }
    Ok(Graph::with_nodes(n))
}

/// Add random edges to `graph` until it is connected.
///
/// Returns the number of candidates drawn, including draws that hit an edge
/// already present.
///
/// # Errors
/// * `InvalidArgument` - graph has fewer than 2 nodes
/// * `InternalInvariantViolation` - candidate pool exhausted while still
///   disconnected (cannot happen for a complete candidate pool)
pub fn connect<R: RandomSource + ?Sized>(
    graph: &mut Graph,
    rng: &mut R,
) -> Result<usize, DiffusionError> {
    let n = graph.node_count();
    if n < MIN_GRAPH_NODES {
        return Err(DiffusionError::invalid(
            "graph",
            format!(
                "graph needs at least {} nodes, got {}",
                MIN_GRAPH_NODES, n
            ),
        ));
    }

    let mut components = Components::new(n);
    for (x, y) in graph.edges() {
        components.union(x, y);
    }

    let mut candidates = CandidatePool::ordered_pairs(n);
    let mut draws = 0;

    while components.count() > 1 {
        let (x, y) = candidates.draw(rng).ok_or_else(|| {
            DiffusionError::invariant(format!(
                "candidate pool exhausted with {} components left",
                components.count()
            ))
        })?;
        draws += 1;

        if graph.add_edge(x, y) {
            components.union(x, y);
        }
    }

    debug!(
        "connected {} nodes with {} edges after {} draws",
        n,
        graph.edge_count(),
        draws
    );
    Ok(draws)
}

/// [`generate`] followed by [`connect`]
pub fn generate_connected<R: RandomSource + ?Sized>(
    n: usize,
    rng: &mut R,
) -> Result<Graph, DiffusionError> {
    let mut graph = generate(n)?;
    connect(&mut graph, rng)?;
    Ok(graph)
}

/// Shrinking pool of ordered node pairs with O(1) removal
struct CandidatePool {
    pairs: Vec<(NodeId, NodeId)>,
}

impl CandidatePool {
    fn ordered_pairs(n: usize) -> Self {
        let mut pairs = Vec::with_capacity(n * (n - 1));
        for x in 0..n {
            for y in 0..n {
                if x != y {
                    pairs.push((x, y));
                }
            }
        }
        Self { pairs }
    }

    /// Remove and return a uniformly chosen pair
    fn draw<R: RandomSource + ?Sized>(&mut self, rng: &mut R) -> Option<(NodeId, NodeId)> {
        if self.pairs.is_empty() {
            return None;
        }
        let index = rng.pick_index(self.pairs.len());
        Some(self.pairs.swap_remove(index))
    }
}

/// Union-find over node ids, tracking the number of components
struct Components {
    parent: Vec<NodeId>,
    size: Vec<usize>,
    count: usize,
}

impl Components {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            size: vec![1; n],
            count: n,
        }
    }

    fn count(&self) -> usize {
        self.count
    }

    fn find(&mut self, mut x: NodeId) -> NodeId {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, x: NodeId, y: NodeId) {
        let (mut a, mut b) = (self.find(x), self.find(y));
        if a == b {
            return;
        }
        if self.size[a] < self.size[b] {
            std::mem::swap(&mut a, &mut b);
        }
        self.parent[b] = a;
        self.size[a] += self.size[b];
        self.count -= 1;
    }
}
