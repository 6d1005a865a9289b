use crate::{DependencyGraph, Direction};
use rustc_hash::FxHashSet;
use std::collections::VecDeque;

impl DependencyGraph {
    /// Nodes in breadth-first discovery order from `start`. Each node appears
    /// at most once; a start missing from the node set yields an empty list.
    pub fn bfs(&self, start: &str, direction: Direction) -> Vec<String> {
        let Some(start_idx) = self.index_of(start) else {
            return Vec::new();
        };

        let mut order = Vec::new();
        let mut visited = FxHashSet::default();
        let mut queue = VecDeque::new();
        visited.insert(start_idx);
        queue.push_back(start_idx);

        while let Some(current) = queue.pop_front() {
            order.push(self.id_of(current).to_string());
            for &next in self.neighbors_idx(current, direction) {
                if visited.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        order
    }

    /// Breadth-first discovery bounded by hop depth; returns (id, depth)
    /// pairs with the start at depth 0.
    pub fn bfs_depth_limited(
        &self,
        start: &str,
        direction: Direction,
        max_depth: usize,
    ) -> Vec<(String, usize)> {
        let Some(start_idx) = self.index_of(start) else {
            return Vec::new();
        };

        let mut order = Vec::new();
        let mut visited = FxHashSet::default();
        let mut queue = VecDeque::new();
        visited.insert(start_idx);
        queue.push_back((start_idx, 0usize));

        while let Some((current, depth)) = queue.pop_front() {
            order.push((self.id_of(current).to_string(), depth));
            if depth == max_depth {
                continue;
            }
            for &next in self.neighbors_idx(current, direction) {
                if visited.insert(next) {
                    queue.push_back((next, depth + 1));
                }
            }
        }
        order
    }

    /// Nodes in depth-first discovery order from `start`; same visitation
    /// guarantees as `bfs`.
    pub fn dfs(&self, start: &str, direction: Direction) -> Vec<String> {
        let Some(start_idx) = self.index_of(start) else {
            return Vec::new();
        };

        let mut order = Vec::new();
        let mut visited = FxHashSet::default();
        let mut stack = vec![start_idx];

        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            order.push(self.id_of(current).to_string());
            // Reverse push so the first-inserted neighbor is explored first.
            for &next in self.neighbors_idx(current, direction).iter().rev() {
                if !visited.contains(&next) {
                    stack.push(next);
                }
            }
        }
        order
    }

    /// Everything reachable from `start` along forward edges, excluding the
    /// start itself.
    pub fn transitive_closure(&self, start: &str) -> Vec<String> {
        let mut nodes = self.bfs(start, Direction::Forward);
        if !nodes.is_empty() {
            nodes.remove(0);
        }
        nodes
    }

    /// Everything that can reach `start`, excluding the start itself.
    pub fn reverse_transitive_closure(&self, start: &str) -> Vec<String> {
        let mut nodes = self.bfs(start, Direction::Reverse);
        if !nodes.is_empty() {
            nodes.remove(0);
        }
        nodes
    }

    /// Unweighted shortest path including both endpoints; empty when
    /// unreachable or when either endpoint is unknown.
    pub fn shortest_path(&self, start: &str, end: &str, direction: Direction) -> Vec<String> {
        let (Some(start_idx), Some(end_idx)) = (self.index_of(start), self.index_of(end)) else {
            return Vec::new();
        };
        if start_idx == end_idx {
            return vec![start.to_string()];
        }

        let mut parent: Vec<Option<usize>> = vec![None; self.node_count()];
        let mut visited = FxHashSet::default();
        let mut queue = VecDeque::new();
        visited.insert(start_idx);
        queue.push_back(start_idx);

        while let Some(current) = queue.pop_front() {
            for &next in self.neighbors_idx(current, direction) {
                if !visited.insert(next) {
                    continue;
                }
                parent[next] = Some(current);
                if next == end_idx {
                    let mut path = vec![end_idx];
                    let mut cursor = end_idx;
                    while let Some(prev) = parent[cursor] {
                        path.push(prev);
                        cursor = prev;
                    }
                    path.reverse();
                    return path.into_iter().map(|i| self.id_of(i).to_string()).collect();
                }
                queue.push_back(next);
            }
        }
        Vec::new()
    }
}
