use codescope_core::{CodescopeError, Entity, EntityMetrics, Result};
use codescope_graph::{DependencyGraph, Direction};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Field-inclusion level for structured output. `Smart` resolves per entity
/// from its in-degree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Density {
    Sparse,
    Medium,
    Dense,
    Smart,
}

impl Default for Density {
    fn default() -> Self {
        Density::Medium
    }
}

impl FromStr for Density {
    type Err = CodescopeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "sparse" => Ok(Density::Sparse),
            "medium" => Ok(Density::Medium),
            "dense" => Ok(Density::Dense),
            "smart" => Ok(Density::Smart),
            other => Err(CodescopeError::Invalid(format!(
                "unknown density: {}",
                other
            ))),
        }
    }
}

impl Density {
    /// Per-entity pick for `Smart`: heavily used entities deserve detail.
    pub fn resolve(self, in_degree: usize) -> Density {
        match self {
            Density::Smart => {
                if in_degree >= 10 {
                    Density::Dense
                } else if in_degree >= 3 {
                    Density::Medium
                } else {
                    Density::Sparse
                }
            }
            other => other,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsOutput {
    pub pagerank: f64,
    pub in_degree: usize,
    pub out_degree: usize,
    pub betweenness: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashesOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimestampsOutput {
    pub created_at: String,
    pub updated_at: String,
}

/// Single-entity envelope. Field presence tracks the resolved density.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityOutput {
    #[serde(rename = "type")]
    pub kind: String,
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiver: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependents: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<MetricsOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hashes: Option<HashesOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamps: Option<TimestampsOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coverage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub why: Option<String>,
}

/// Shape an entity at the requested density. `Smart` resolves against the
/// in-degree carried by the metrics row (0 when absent).
pub fn render_entity(
    entity: &Entity,
    metrics: Option<&EntityMetrics>,
    density: Density,
) -> EntityOutput {
    let in_degree = metrics.map(|m| m.in_degree).unwrap_or(0);
    let resolved = density.resolve(in_degree);

    let mut out = EntityOutput {
        kind: entity.kind.to_string(),
        location: entity.location(),
        signature: None,
        receiver: None,
        visibility: None,
        dependencies: None,
        dependents: None,
        metrics: None,
        hashes: None,
        timestamps: None,
        coverage: None,
        tags: None,
        why: None,
    };

    if matches!(resolved, Density::Medium | Density::Dense) {
        out.signature = entity.signature.clone();
        out.receiver = entity.receiver.clone();
        out.visibility = entity.visibility.map(|v| format!("{:?}", v).to_lowercase());
    }

    if resolved == Density::Dense {
        out.metrics = metrics.map(|m| MetricsOutput {
            pagerank: m.pagerank,
            in_degree: m.in_degree,
            out_degree: m.out_degree,
            betweenness: m.betweenness,
        });
        out.hashes = Some(HashesOutput {
            body: entity.body_hash.clone(),
            signature: entity.signature_hash.clone(),
        });
        out.timestamps = Some(TimestampsOutput {
            created_at: entity.created_at.to_rfc3339(),
            updated_at: entity.updated_at.to_rfc3339(),
        });
    }

    out
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListOutput {
    pub results: BTreeMap<String, EntityOutput>,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphMeta {
    pub root: String,
    pub direction: String,
    pub depth: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    pub location: String,
    pub depth: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeOutput {
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Neighborhood envelope around a root entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphOutput {
    pub graph: GraphMeta,
    pub nodes: BTreeMap<String, GraphNode>,
    pub edges: Vec<EdgeOutput>,
}

/// Render the bounded neighborhood of `root` by hop depth. Edges between
/// included nodes come from the session graph's forward adjacency.
pub fn render_graph(
    graph: &DependencyGraph,
    root: &str,
    direction: Direction,
    depth: usize,
    locate: impl Fn(&str) -> Option<String>,
) -> GraphOutput {
    let reached = graph.bfs_depth_limited(root, direction, depth);
    let mut nodes = BTreeMap::new();
    for (id, hop) in &reached {
        nodes.insert(
            id.clone(),
            GraphNode {
                location: locate(id).unwrap_or_default(),
                depth: *hop,
            },
        );
    }

    let mut edges = Vec::new();
    for (id, _) in &reached {
        for successor in graph.neighbors(id, Direction::Forward) {
            if nodes.contains_key(successor) {
                edges.push(EdgeOutput {
                    from: id.clone(),
                    to: successor.to_string(),
                    kind: "calls".to_string(),
                });
            }
        }
    }

    GraphOutput {
        graph: GraphMeta {
            root: root.to_string(),
            direction: match direction {
                Direction::Forward => "forward".to_string(),
                Direction::Reverse => "reverse".to_string(),
            },
            depth,
        },
        nodes,
        edges,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use codescope_core::EntityKind;

    fn entity() -> Entity {
        Entity::new("e1", "LoginHandler", EntityKind::Function, "auth/login.go", 10)
            .with_line_end(42)
            .with_signature("func LoginHandler(w http.ResponseWriter)")
    }

    fn metrics(in_degree: usize) -> EntityMetrics {
        EntityMetrics {
            entity_id: "e1".into(),
            pagerank: 0.4,
            in_degree,
            out_degree: 2,
            betweenness: 0.1,
            computed_at: Utc::now(),
        }
    }

    #[test]
    fn sparse_carries_only_type_and_location() {
        let out = render_entity(&entity(), Some(&metrics(1)), Density::Sparse);
        assert_eq!(out.kind, "function");
        assert_eq!(out.location, "auth/login.go:10-42");
        assert!(out.signature.is_none());
        assert!(out.metrics.is_none());

        let json = serde_json::to_value(&out).unwrap();
        assert!(json.get("signature").is_none());
        assert!(json.get("metrics").is_none());
    }

    #[test]
    fn medium_adds_signature_but_not_metrics() {
        let out = render_entity(&entity(), Some(&metrics(1)), Density::Medium);
        assert!(out.signature.is_some());
        assert!(out.metrics.is_none());
        assert!(out.timestamps.is_none());
    }

    #[test]
    fn dense_adds_metrics_hashes_and_timestamps() {
        let out = render_entity(&entity(), Some(&metrics(1)), Density::Dense);
        assert!(out.signature.is_some());
        assert_eq!(out.metrics.as_ref().unwrap().pagerank, 0.4);
        assert!(out.hashes.is_some());
        assert!(out.timestamps.is_some());
    }

    #[test]
    fn smart_density_tracks_in_degree() {
        let dense = render_entity(&entity(), Some(&metrics(12)), Density::Smart);
        assert!(dense.metrics.is_some());

        let medium = render_entity(&entity(), Some(&metrics(3)), Density::Smart);
        assert!(medium.signature.is_some());
        assert!(medium.metrics.is_none());

        let sparse = render_entity(&entity(), Some(&metrics(2)), Density::Smart);
        assert!(sparse.signature.is_none());

        let no_metrics = render_entity(&entity(), None, Density::Smart);
        assert!(no_metrics.signature.is_none());
    }

    #[test]
    fn density_parses_from_tool_arguments() {
        assert_eq!("dense".parse::<Density>().unwrap(), Density::Dense);
        assert_eq!("SMART".parse::<Density>().unwrap(), Density::Smart);
        assert!("verbose".parse::<Density>().is_err());
    }

    #[test]
    fn graph_render_bounds_nodes_and_edges() {
        let mut graph = DependencyGraph::new();
        graph.add_edge("a", "b");
        graph.add_edge("b", "c");
        graph.add_edge("c", "d");

        let out = render_graph(&graph, "a", Direction::Forward, 2, |_| {
            Some("x.go:1".to_string())
        });
        assert_eq!(out.graph.root, "a");
        assert_eq!(out.nodes.len(), 3);
        assert!(!out.nodes.contains_key("d"));
        // Only edges between included nodes survive.
        assert_eq!(out.edges.len(), 2);
    }
}
