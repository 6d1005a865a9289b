use codescope_core::{
    cancellable, looks_like_file_path, CodescopeError, Entity, EntityFilter, Result, Store,
};
use codescope_graph::{DependencyGraph, Direction};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Fixed keystone bar used by quick mode; full mode derives a dynamic one
/// from the affected set instead.
const QUICK_KEYSTONE_PAGERANK: f64 = 0.30;

#[derive(Debug, Clone, Copy)]
pub struct ImpactOptions {
    pub depth: usize,
    pub quick: bool,
}

impl Default for ImpactOptions {
    fn default() -> Self {
        Self {
            depth: 3,
            quick: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AffectedEntity {
    pub entity: Entity,
    /// Shortest observed predecessor distance from the direct set.
    pub depth: usize,
    pub pagerank: f64,
    pub is_keystone: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactReport {
    pub target: String,
    pub depth: usize,
    pub direct: Vec<Entity>,
    pub affected: Vec<AffectedEntity>,
    pub files_affected: usize,
    pub keystone_count: usize,
    pub keystone_threshold: f64,
    /// Keystones without known coverage; coverage data is unpopulated, so
    /// every keystone counts as a gap.
    pub gaps: usize,
    pub risk: RiskLevel,
    pub recommendations: Vec<String>,
}

/// Risk ladder over the blast radius.
pub fn classify_risk(affected: usize, keystones: usize, gaps: usize) -> RiskLevel {
    if gaps >= 3 {
        RiskLevel::Critical
    } else if gaps >= 1 {
        RiskLevel::High
    } else if keystones >= 3 || affected >= 20 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

/// Literal recommendation strings; tests and downstream tooling match on
/// them verbatim.
pub fn recommendations_for(risk: RiskLevel, keystones: usize, gaps: usize) -> Vec<String> {
    let mut out = Vec::new();
    match risk {
        RiskLevel::Critical => {
            out.push("STOP: Address safety issues before proceeding".to_string());
            if gaps > 0 {
                out.push(
                    "Add tests for undertested keystones before making changes".to_string(),
                );
            }
            out.push("Consider breaking this change into smaller, safer increments".to_string());
        }
        RiskLevel::High => {
            out.push("Proceed with caution".to_string());
            if gaps > 0 {
                out.push(
                    "Add tests for affected keystones before or alongside changes".to_string(),
                );
            }
            out.push("Request thorough code review for this change".to_string());
        }
        RiskLevel::Medium => {
            out.push("Proceed with standard review process".to_string());
            if keystones > 0 {
                out.push("Pay attention to keystone entities in review".to_string());
            }
            out.push("Run tests after making changes".to_string());
        }
        RiskLevel::Low => {
            out.push("Safe to proceed".to_string());
            out.push("Run relevant tests after making changes".to_string());
        }
    }
    out
}

/// Pagerank value at position max(10, N/20) - 1 of the descending positive
/// ranks. Everything at or above it counts as a keystone for this blast
/// radius. Fewer than ten positive ranks means all of them qualify.
pub fn dynamic_keystone_threshold(pageranks: &[f64]) -> Option<f64> {
    let mut positive: Vec<f64> = pageranks.iter().copied().filter(|p| *p > 0.0).collect();
    if positive.is_empty() {
        return None;
    }
    positive.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
    let index = std::cmp::max(10, positive.len() / 20) - 1;
    let index = index.min(positive.len() - 1);
    Some(positive[index])
}

/// Blast-radius analysis for a file or entity target.
pub async fn analyze_impact(
    store: &dyn Store,
    graph: &DependencyGraph,
    target: &str,
    options: ImpactOptions,
    cancel: &CancellationToken,
) -> Result<ImpactReport> {
    let direct = resolve_direct(store, target, cancel).await?;
    if direct.is_empty() {
        return Err(CodescopeError::NotFound(format!(
            "no entities found matching: {}",
            target
        )));
    }

    // Multi-source predecessor BFS; first visit is the shortest depth.
    let mut depths: FxHashMap<String, usize> = FxHashMap::default();
    let mut order: Vec<String> = Vec::new();
    let mut queue: VecDeque<(String, usize)> = VecDeque::new();
    for entity in &direct {
        if !depths.contains_key(&entity.id) {
            depths.insert(entity.id.clone(), 0);
            order.push(entity.id.clone());
            queue.push_back((entity.id.clone(), 0));
        }
    }
    while let Some((id, depth)) = queue.pop_front() {
        if depth == options.depth {
            continue;
        }
        for predecessor in graph.neighbors(&id, Direction::Reverse) {
            if depths.contains_key(predecessor) {
                continue;
            }
            depths.insert(predecessor.to_string(), depth + 1);
            order.push(predecessor.to_string());
            queue.push_back((predecessor.to_string(), depth + 1));
        }
    }

    let mut affected: Vec<AffectedEntity> = Vec::new();
    for id in &order {
        let entity = match cancellable(cancel, store.get_entity(id)).await {
            Ok(Some(entity)) => entity,
            Ok(None) => continue,
            Err(e) if e.is_degradable() => {
                warn!(id = %id, error = %e, "affected entity fetch failed, skipping");
                continue;
            }
            Err(e) => return Err(e),
        };
        let pagerank = match cancellable(cancel, store.get_metrics(id)).await {
            Ok(Some(metrics)) => metrics.pagerank,
            Ok(None) => 0.0,
            Err(e) if e.is_degradable() => 0.0,
            Err(e) => return Err(e),
        };
        affected.push(AffectedEntity {
            entity,
            depth: depths[id],
            pagerank,
            is_keystone: false,
        });
    }

    let files_affected = {
        let mut files: Vec<&str> = affected.iter().map(|a| a.entity.file_path.as_str()).collect();
        files.sort_unstable();
        files.dedup();
        files.len()
    };

    let keystone_threshold = if options.quick {
        QUICK_KEYSTONE_PAGERANK
    } else {
        let ranks: Vec<f64> = affected.iter().map(|a| a.pagerank).collect();
        dynamic_keystone_threshold(&ranks).unwrap_or(QUICK_KEYSTONE_PAGERANK)
    };
    for entry in affected.iter_mut() {
        entry.is_keystone = entry.pagerank > 0.0 && entry.pagerank >= keystone_threshold;
    }
    let keystone_count = affected.iter().filter(|a| a.is_keystone).count();

    // Coverage data is unpopulated: in full mode every keystone is a gap.
    let gaps = if options.quick { 0 } else { keystone_count };
    let risk = classify_risk(affected.len(), keystone_count, gaps);
    let recommendations = if options.quick {
        Vec::new()
    } else {
        recommendations_for(risk, keystone_count, gaps)
    };

    debug!(
        target,
        affected = affected.len(),
        keystones = keystone_count,
        %risk,
        "impact analyzed"
    );

    Ok(ImpactReport {
        target: target.to_string(),
        depth: options.depth,
        direct,
        affected,
        files_affected,
        keystone_count,
        keystone_threshold,
        gaps,
        risk,
        recommendations,
    })
}

/// File targets query by path with a suffix fallback; anything else tries an
/// ID lookup, then a name search.
async fn resolve_direct(
    store: &dyn Store,
    target: &str,
    cancel: &CancellationToken,
) -> Result<Vec<Entity>> {
    if looks_like_file_path(target) {
        let exact = EntityFilter {
            file_path: Some(target.to_string()),
            ..Default::default()
        };
        let entities = cancellable(cancel, store.query_entities(&exact)).await?;
        if !entities.is_empty() {
            return Ok(entities);
        }
        let suffix = EntityFilter {
            file_path_suffix: Some(target.to_string()),
            ..Default::default()
        };
        return cancellable(cancel, store.query_entities(&suffix)).await;
    }

    if let Some(entity) = cancellable(cancel, store.get_entity(target)).await? {
        return Ok(vec![entity]);
    }
    let hits = cancellable(cancel, store.search_entities(target, 10)).await?;
    Ok(hits.into_iter().map(|h| h.entity).collect())
}
