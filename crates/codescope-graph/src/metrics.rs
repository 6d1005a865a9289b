use crate::{betweenness_centrality, pagerank, DependencyGraph, PageRankConfig};
use chrono::Utc;
use codescope_core::{EntityMetrics, MetricsConfig};
use tracing::info;

/// Full metrics recompute over a session graph.
///
/// Produces one row per node, ready for `Store::put_metrics_bulk`. Runs
/// after every scan; the store keeps these as a regeneratable cache.
pub fn compute_metrics(graph: &DependencyGraph, config: &MetricsConfig) -> Vec<EntityMetrics> {
    let rank = pagerank(graph, &PageRankConfig::from(config));
    let betweenness = betweenness_centrality(graph);
    let computed_at = Utc::now();

    let rows: Vec<EntityMetrics> = graph
        .node_ids()
        .map(|id| EntityMetrics {
            entity_id: id.to_string(),
            pagerank: rank.scores.get(id).copied().unwrap_or(0.0),
            in_degree: graph.in_degree(id),
            out_degree: graph.out_degree(id),
            betweenness: betweenness.get(id).copied().unwrap_or(0.0),
            computed_at,
        })
        .collect();

    info!(
        entities = rows.len(),
        iterations = rank.iterations,
        converged = rank.converged,
        "metrics recomputed"
    );
    rows
}
