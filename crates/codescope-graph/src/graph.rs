use codescope_core::{Dependency, Result, Store};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

/// Traversal direction over the dependency edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Reverse,
}

/// In-memory directed graph over entity IDs.
///
/// Entities live in a dense arena addressed by index; string IDs are kept in
/// a secondary map. Neighbor lists preserve insertion order, which makes
/// every traversal and therefore every downstream answer deterministic for
/// identical store inputs.
///
/// Built once per query session from a snapshot of code-type dependencies;
/// stale once the store revision moves.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    ids: Vec<String>,
    index: FxHashMap<String, usize>,
    forward: Vec<Vec<usize>>,
    reverse: Vec<Vec<usize>>,
    edges: FxHashSet<(usize, usize)>,
    revision: Option<String>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from an explicit dependency list. Non-code kinds and self-loops
    /// are dropped; duplicate (from, to) pairs collapse to one edge.
    pub fn from_dependencies(dependencies: &[Dependency]) -> Self {
        let mut graph = Self::new();
        for dep in dependencies {
            if !dep.kind.is_code() {
                continue;
            }
            graph.add_edge(&dep.from_id, &dep.to_id);
        }
        graph
    }

    /// Snapshot the store's dependency set into a session graph, capturing
    /// the revision for staleness checks.
    pub async fn from_store(store: &dyn Store) -> Result<Self> {
        let dependencies = store.all_dependencies().await?;
        let mut graph = Self::from_dependencies(&dependencies);
        graph.revision = Some(store.revision().await?);
        debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "built session graph"
        );
        Ok(graph)
    }

    pub fn revision(&self) -> Option<&str> {
        self.revision.as_deref()
    }

    fn ensure_node(&mut self, id: &str) -> usize {
        if let Some(&idx) = self.index.get(id) {
            return idx;
        }
        let idx = self.ids.len();
        self.ids.push(id.to_string());
        self.index.insert(id.to_string(), idx);
        self.forward.push(Vec::new());
        self.reverse.push(Vec::new());
        idx
    }

    pub fn add_node(&mut self, id: &str) -> usize {
        self.ensure_node(id)
    }

    /// Insert a directed edge. Self-loops never participate in analytics and
    /// are dropped here.
    pub fn add_edge(&mut self, from: &str, to: &str) {
        if from == to {
            return;
        }
        let from_idx = self.ensure_node(from);
        let to_idx = self.ensure_node(to);
        if !self.edges.insert((from_idx, to_idx)) {
            return;
        }
        self.forward[from_idx].push(to_idx);
        self.reverse[to_idx].push(from_idx);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn node_count(&self) -> usize {
        self.ids.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Node IDs in insertion order.
    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(|s| s.as_str())
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn id_of(&self, idx: usize) -> &str {
        &self.ids[idx]
    }

    pub(crate) fn neighbors_idx(&self, idx: usize, direction: Direction) -> &[usize] {
        match direction {
            Direction::Forward => &self.forward[idx],
            Direction::Reverse => &self.reverse[idx],
        }
    }

    /// Neighbor IDs in insertion order; empty for unknown nodes.
    pub fn neighbors(&self, id: &str, direction: Direction) -> Vec<&str> {
        match self.index_of(id) {
            Some(idx) => self
                .neighbors_idx(idx, direction)
                .iter()
                .map(|&n| self.id_of(n))
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn out_degree(&self, id: &str) -> usize {
        self.index_of(id)
            .map(|idx| self.forward[idx].len())
            .unwrap_or(0)
    }

    pub fn in_degree(&self, id: &str) -> usize {
        self.index_of(id)
            .map(|idx| self.reverse[idx].len())
            .unwrap_or(0)
    }
}
