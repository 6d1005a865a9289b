use crate::{DependencyGraph, Direction};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Outcome of cycle detection: a presence flag plus one representative
/// simple cycle (no repeated nodes).
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub has_cycle: bool,
    pub cycle: Vec<String>,
}

impl DependencyGraph {
    /// Tri-color DFS over forward edges. On the first back edge the cycle is
    /// reconstructed by walking parent pointers from the back-edge source up
    /// to the gray target, which yields a simple cycle by construction.
    pub fn find_cycles(&self) -> CycleReport {
        let n = self.node_count();
        let mut colors = vec![Color::White; n];
        let mut parent: Vec<Option<usize>> = vec![None; n];

        for root in 0..n {
            if colors[root] != Color::White {
                continue;
            }
            // Iterative DFS; each frame tracks how many neighbors it consumed.
            let mut stack: Vec<(usize, usize)> = vec![(root, 0)];
            colors[root] = Color::Gray;

            while let Some(frame) = stack.last_mut() {
                let node = frame.0;
                let neighbors = self.neighbors_idx(node, Direction::Forward);
                if frame.1 >= neighbors.len() {
                    colors[node] = Color::Black;
                    stack.pop();
                    continue;
                }
                let next = neighbors[frame.1];
                frame.1 += 1;

                match colors[next] {
                    Color::White => {
                        colors[next] = Color::Gray;
                        parent[next] = Some(node);
                        stack.push((next, 0));
                    }
                    Color::Gray => {
                        // Back edge node -> next closes a cycle along the
                        // gray parent chain.
                        let mut cycle = vec![node];
                        let mut cursor = node;
                        while cursor != next {
                            cursor = parent[cursor].expect("gray chain reaches back edge target");
                            cycle.push(cursor);
                        }
                        cycle.reverse();
                        return CycleReport {
                            has_cycle: true,
                            cycle: cycle
                                .into_iter()
                                .map(|i| self.id_of(i).to_string())
                                .collect(),
                        };
                    }
                    Color::Black => {}
                }
            }
        }

        CycleReport::default()
    }

    /// Kahn's algorithm. Returns the order, or an empty list when a cycle
    /// leaves nodes with nonzero in-degree.
    pub fn topological_sort(&self) -> Vec<String> {
        let n = self.node_count();
        let mut in_degrees: Vec<usize> = (0..n)
            .map(|idx| self.neighbors_idx(idx, Direction::Reverse).len())
            .collect();

        let mut queue: VecDeque<usize> = (0..n).filter(|&idx| in_degrees[idx] == 0).collect();
        let mut order = Vec::with_capacity(n);

        while let Some(node) = queue.pop_front() {
            order.push(node);
            for &next in self.neighbors_idx(node, Direction::Forward) {
                in_degrees[next] -= 1;
                if in_degrees[next] == 0 {
                    queue.push_back(next);
                }
            }
        }

        if order.len() < n {
            return Vec::new();
        }
        order.into_iter().map(|i| self.id_of(i).to_string()).collect()
    }
}
