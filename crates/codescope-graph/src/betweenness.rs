use crate::{DependencyGraph, Direction};
use std::collections::{HashMap, VecDeque};

/// Brandes' betweenness centrality over the directed graph.
///
/// Scores are normalized by 1/((N-1)(N-2)) so they land in [0, 1]; graphs
/// with fewer than three nodes have no interior vertices and score zero
/// everywhere.
pub fn betweenness_centrality(graph: &DependencyGraph) -> HashMap<String, f64> {
    let n = graph.node_count();
    let mut centrality = vec![0.0f64; n];

    if n > 2 {
        let mut sigma = vec![0.0f64; n];
        let mut distance = vec![-1i64; n];
        let mut delta = vec![0.0f64; n];
        let mut predecessors: Vec<Vec<usize>> = vec![Vec::new(); n];

        for source in 0..n {
            // Forward BFS counting shortest paths.
            for idx in 0..n {
                sigma[idx] = 0.0;
                distance[idx] = -1;
                delta[idx] = 0.0;
                predecessors[idx].clear();
            }
            sigma[source] = 1.0;
            distance[source] = 0;

            let mut order = Vec::with_capacity(n);
            let mut queue = VecDeque::new();
            queue.push_back(source);

            while let Some(current) = queue.pop_front() {
                order.push(current);
                for &next in graph.neighbors_idx(current, Direction::Forward) {
                    if distance[next] < 0 {
                        distance[next] = distance[current] + 1;
                        queue.push_back(next);
                    }
                    if distance[next] == distance[current] + 1 {
                        sigma[next] += sigma[current];
                        predecessors[next].push(current);
                    }
                }
            }

            // Dependency accumulation in reverse discovery order.
            for &node in order.iter().rev() {
                for &pred in &predecessors[node] {
                    delta[pred] += sigma[pred] / sigma[node] * (1.0 + delta[node]);
                }
                if node != source {
                    centrality[node] += delta[node];
                }
            }
        }

        let scale = 1.0 / ((n - 1) as f64 * (n - 2) as f64);
        for value in centrality.iter_mut() {
            *value *= scale;
        }
    }

    graph
        .node_ids()
        .enumerate()
        .map(|(idx, id)| (id.to_string(), centrality[idx]))
        .collect()
}
