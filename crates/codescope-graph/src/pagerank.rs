use crate::{DependencyGraph, Direction};
use codescope_core::MetricsConfig;
use std::collections::HashMap;
use tracing::debug;

/// PageRank iteration parameters.
#[derive(Debug, Clone)]
pub struct PageRankConfig {
    pub damping: f64,
    pub max_iterations: usize,
    pub tolerance: f64,
}

impl Default for PageRankConfig {
    fn default() -> Self {
        Self {
            damping: 0.85,
            max_iterations: 100,
            tolerance: 1e-4,
        }
    }
}

impl From<&MetricsConfig> for PageRankConfig {
    fn from(config: &MetricsConfig) -> Self {
        Self {
            damping: config.damping,
            max_iterations: config.max_iterations,
            tolerance: config.tolerance,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PageRankResult {
    pub scores: HashMap<String, f64>,
    pub iterations: usize,
    pub converged: bool,
    pub delta: f64,
}

/// Power-iteration PageRank with dangling-node mass redistribution.
///
/// Every node appearing as an edge target is part of the graph arena, so
/// sink nodes receive scores like any other node. An empty graph converges
/// immediately with no scores.
pub fn pagerank(graph: &DependencyGraph, config: &PageRankConfig) -> PageRankResult {
    let n = graph.node_count();
    if n == 0 {
        return PageRankResult {
            scores: HashMap::new(),
            iterations: 0,
            converged: true,
            delta: 0.0,
        };
    }

    let n_f = n as f64;
    let damping = config.damping;
    let mut ranks = vec![1.0 / n_f; n];
    let mut next = vec![0.0; n];
    let mut iterations = 0;
    let mut converged = false;
    let mut delta = 0.0;

    let out_degrees: Vec<usize> = (0..n)
        .map(|idx| graph.neighbors_idx(idx, Direction::Forward).len())
        .collect();

    for iteration in 0..config.max_iterations {
        let dangling_mass: f64 = (0..n)
            .filter(|&idx| out_degrees[idx] == 0)
            .map(|idx| ranks[idx])
            .sum();
        let base = (1.0 - damping) / n_f + damping * dangling_mass / n_f;

        for idx in 0..n {
            let incoming: f64 = graph
                .neighbors_idx(idx, Direction::Reverse)
                .iter()
                .map(|&src| ranks[src] / out_degrees[src] as f64)
                .sum();
            next[idx] = base + damping * incoming;
        }

        delta = ranks
            .iter()
            .zip(next.iter())
            .map(|(old, new)| (old - new).abs())
            .fold(0.0, f64::max);
        std::mem::swap(&mut ranks, &mut next);
        iterations = iteration + 1;

        if delta < config.tolerance {
            converged = true;
            break;
        }
    }

    debug!(iterations, converged, delta, "pagerank finished");

    let scores = graph
        .node_ids()
        .enumerate()
        .map(|(idx, id)| (id.to_string(), ranks[idx]))
        .collect();

    PageRankResult {
        scores,
        iterations,
        converged,
        delta,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn empty_graph_converges_immediately() {
        let graph = DependencyGraph::new();
        let result = pagerank(&graph, &PageRankConfig::default());
        assert!(result.scores.is_empty());
        assert!(result.converged);
        assert_eq!(result.iterations, 0);
    }

    #[test]
    fn single_isolated_node_scores_one() {
        let mut graph = DependencyGraph::new();
        graph.add_node("only");
        let result = pagerank(&graph, &PageRankConfig::default());
        assert!(result.converged);
        assert_abs_diff_eq!(result.scores["only"], 1.0, epsilon = 1e-9);
    }

    #[test]
    fn star_graph_concentrates_rank_on_the_hub() {
        // A -> D, B -> D, C -> D.
        let mut graph = DependencyGraph::new();
        graph.add_edge("A", "D");
        graph.add_edge("B", "D");
        graph.add_edge("C", "D");

        let result = pagerank(&graph, &PageRankConfig::default());
        assert!(result.converged);
        let d = result.scores["D"];
        for leaf in ["A", "B", "C"] {
            assert!(d > result.scores[leaf]);
        }
        assert_abs_diff_eq!(result.scores["A"], result.scores["B"], epsilon = 1e-3);
        assert_abs_diff_eq!(result.scores["B"], result.scores["C"], epsilon = 1e-3);
    }

    #[test]
    fn converged_scores_sum_to_one() {
        let mut graph = DependencyGraph::new();
        graph.add_edge("a", "b");
        graph.add_edge("b", "c");
        graph.add_edge("c", "a");
        graph.add_edge("c", "d");
        graph.add_edge("d", "a");

        let config = PageRankConfig::default();
        let result = pagerank(&graph, &config);
        assert!(result.converged);

        // Dangling redistribution keeps total mass at 1.
        let sum: f64 = result.scores.values().sum();
        let bound = 10.0 * config.tolerance * graph.node_count() as f64;
        assert!((sum - 1.0).abs() < bound, "sum {} off by more than {}", sum, bound);
    }

    #[test]
    fn dangling_sink_does_not_leak_mass() {
        let mut graph = DependencyGraph::new();
        graph.add_edge("a", "sink");
        let result = pagerank(&graph, &PageRankConfig::default());
        let sum: f64 = result.scores.values().sum();
        assert_abs_diff_eq!(sum, 1.0, epsilon = 1e-2);
        assert!(result.scores["sink"] > result.scores["a"]);
    }

    #[test]
    fn iteration_cap_is_honored() {
        let mut graph = DependencyGraph::new();
        graph.add_edge("a", "b");
        graph.add_edge("b", "a");
        let config = PageRankConfig {
            max_iterations: 1,
            tolerance: 0.0,
            ..Default::default()
        };
        let result = pagerank(&graph, &config);
        assert_eq!(result.iterations, 1);
        assert!(!result.converged);
    }
}
