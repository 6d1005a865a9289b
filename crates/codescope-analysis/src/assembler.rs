use codescope_core::{
    cancellable, highest_boost, AssemblerConfig, Entity, EntryPoint, ExcludedEntity, Intent,
    RelevantEntity, Result, Store,
};
use codescope_graph::{DependencyGraph, Direction};
use rustc_hash::FxHashSet;
use std::collections::VecDeque;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Assembler-side keystone heuristic: important enough to deserve the token
/// surcharge and the relevance boost, without requiring the strict metrics
/// definition.
const ASSEMBLY_KEYSTONE_PAGERANK: f64 = 0.15;
const ASSEMBLY_KEYSTONE_IN_DEGREE: usize = 10;

const OVER_BUDGET: &str = "Over budget";

/// Assembled context for one task: entities admitted under the token budget
/// plus everything excluded along the way.
#[derive(Debug, Clone, Default)]
pub struct AssembledContext {
    pub relevant: Vec<RelevantEntity>,
    pub excluded: Vec<ExcludedEntity>,
    pub tokens_used: usize,
    pub token_budget: usize,
    pub warnings: Vec<String>,
}

/// Deterministic token estimate. The constants are part of the contract:
/// budgets must behave identically across implementations.
pub fn estimate_tokens(entity: &Entity, is_keystone: bool) -> usize {
    let words = |s: &str| s.split_whitespace().count();
    let base = 50 + words(&entity.name) + 2 + words(entity.signature.as_deref().unwrap_or("")) + 30;
    if is_keystone {
        base + 70
    } else {
        base
    }
}

/// Test scaffolding and generated doubles never belong in task context.
pub fn exclusion_reason(entity: &Entity) -> Option<String> {
    let path = entity.file_path.to_lowercase();
    let name = entity.name.to_lowercase();

    let file_name = path.rsplit('/').next().unwrap_or(&path);
    let stem = match file_name.rfind('.') {
        Some(dot) => &file_name[..dot],
        None => file_name,
    };

    let test_path = stem.ends_with("_test")
        || path.contains("/test/")
        || path.contains("/tests/")
        || path.contains("/testing/")
        || path.contains("/vendor/");
    let test_name = name.contains("mock") || name.starts_with("test") || name.ends_with("test");

    if test_path || test_name {
        Some("Test/mock entity excluded".to_string())
    } else {
        None
    }
}

/// Budget-bounded breadth-first expansion from the entry points.
pub struct ContextAssembler<'a> {
    store: &'a dyn Store,
    graph: &'a DependencyGraph,
    config: AssemblerConfig,
}

struct QueueItem {
    entity_id: String,
    hop: usize,
    origin_id: String,
}

impl<'a> ContextAssembler<'a> {
    pub fn new(store: &'a dyn Store, graph: &'a DependencyGraph, config: AssemblerConfig) -> Self {
        Self {
            store,
            graph,
            config,
        }
    }

    pub async fn assemble(
        &self,
        intent: &Intent,
        entry_points: &[EntryPoint],
        cancel: &CancellationToken,
    ) -> Result<AssembledContext> {
        let budget = self.config.token_budget;
        let mut context = AssembledContext {
            token_budget: budget,
            ..Default::default()
        };
        if entry_points.is_empty() {
            context
                .warnings
                .push("No entry points found for task; context is empty".to_string());
            return Ok(context);
        }

        let mut admitted: FxHashSet<String> = FxHashSet::default();
        let mut recorded_exclusions: FxHashSet<String> = FxHashSet::default();
        let mut queue: VecDeque<QueueItem> = VecDeque::new();

        // Entry points seed the admitted set at hop zero and charge their
        // token cost immediately.
        for entry in entry_points {
            let cost = estimate_tokens(&entry.entity, entry.is_keystone);
            if context.tokens_used + cost > budget {
                context.excluded.push(ExcludedEntity {
                    id: entry.entity.id.clone(),
                    name: entry.entity.name.clone(),
                    reason: OVER_BUDGET.to_string(),
                });
                continue;
            }
            context.tokens_used += cost;
            admitted.insert(entry.entity.id.clone());
            context.relevant.push(RelevantEntity {
                entity: entry.entity.clone(),
                relevance: entry.relevance,
                hop: 0,
                is_keystone: entry.is_keystone,
                estimated_tokens: cost,
                reason: entry.reason.clone(),
            });

            // Both directions matter at the first hop: callers and callees
            // of an entry point are equally likely context.
            for successor in self.graph.neighbors(&entry.entity.id, Direction::Forward) {
                queue.push_back(QueueItem {
                    entity_id: successor.to_string(),
                    hop: 1,
                    origin_id: entry.entity.id.clone(),
                });
            }
            for predecessor in self.graph.neighbors(&entry.entity.id, Direction::Reverse) {
                queue.push_back(QueueItem {
                    entity_id: predecessor.to_string(),
                    hop: 1,
                    origin_id: entry.entity.id.clone(),
                });
            }
        }

        while context.tokens_used < budget {
            let Some(item) = queue.pop_front() else {
                break;
            };
            if admitted.contains(&item.entity_id) || item.hop > self.config.max_hop_depth {
                continue;
            }

            let entity = match cancellable(cancel, self.store.get_entity(&item.entity_id)).await {
                Ok(Some(entity)) => entity,
                Ok(None) => continue,
                Err(e) if e.is_degradable() => {
                    warn!(id = %item.entity_id, error = %e, "entity fetch failed, skipping");
                    continue;
                }
                Err(e) => return Err(e),
            };

            if let Some(reason) = exclusion_reason(&entity) {
                if recorded_exclusions.insert(entity.id.clone()) {
                    context.excluded.push(ExcludedEntity {
                        id: entity.id,
                        name: entity.name,
                        reason,
                    });
                }
                continue;
            }

            let metrics = match cancellable(cancel, self.store.get_metrics(&entity.id)).await {
                Ok(metrics) => metrics,
                Err(e) if e.is_degradable() => None,
                Err(e) => return Err(e),
            };
            let (pagerank, in_degree) = metrics
                .map(|m| (m.pagerank, m.in_degree))
                .unwrap_or((0.0, 0));
            let is_keystone = pagerank >= ASSEMBLY_KEYSTONE_PAGERANK
                || in_degree >= ASSEMBLY_KEYSTONE_IN_DEGREE;

            let cost = estimate_tokens(&entity, is_keystone);
            if context.tokens_used + cost > budget {
                if recorded_exclusions.insert(entity.id.clone()) {
                    context.excluded.push(ExcludedEntity {
                        id: entity.id,
                        name: entity.name,
                        reason: OVER_BUDGET.to_string(),
                    });
                }
                continue;
            }

            let relevance = self
                .score_relevance(&entity, item.hop, is_keystone, intent, cancel)
                .await?;
            let reason = self.admission_reason(&item, entry_points);

            context.tokens_used += cost;
            admitted.insert(entity.id.clone());
            if item.hop < self.config.max_hop_depth {
                for successor in self.graph.neighbors(&entity.id, Direction::Forward) {
                    queue.push_back(QueueItem {
                        entity_id: successor.to_string(),
                        hop: item.hop + 1,
                        origin_id: item.origin_id.clone(),
                    });
                }
            }
            context.relevant.push(RelevantEntity {
                entity,
                relevance,
                hop: item.hop,
                is_keystone,
                estimated_tokens: cost,
                reason,
            });
        }

        // Hop first, keystones ahead within a hop, relevance breaks the rest.
        context.relevant.sort_by(|a, b| {
            a.hop
                .cmp(&b.hop)
                .then_with(|| b.is_keystone.cmp(&a.is_keystone))
                .then_with(|| {
                    b.relevance
                        .partial_cmp(&a.relevance)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
        });

        debug!(
            admitted = context.relevant.len(),
            excluded = context.excluded.len(),
            tokens = context.tokens_used,
            "context assembled"
        );
        Ok(context)
    }

    async fn score_relevance(
        &self,
        entity: &Entity,
        hop: usize,
        is_keystone: bool,
        intent: &Intent,
        cancel: &CancellationToken,
    ) -> Result<f64> {
        let mut relevance = 1.0 / (hop as f64 + 1.0);
        if is_keystone {
            relevance *= self.config.keystone_boost;
        }

        let tags = match cancellable(cancel, self.store.tags_for(&entity.id)).await {
            Ok(tags) => tags,
            Err(e) if e.is_degradable() => Vec::new(),
            Err(e) => return Err(e),
        };
        if let Some(boost) = highest_boost(&tags) {
            relevance *= boost as f64;
        }

        let name_lower = entity.name.to_lowercase();
        for keyword in &intent.identifier_keywords {
            if name_lower == *keyword {
                relevance *= 2.5;
                break;
            }
            if name_lower.contains(keyword.as_str()) {
                relevance *= 1.8;
                break;
            }
        }
        if intent
            .keywords
            .iter()
            .any(|keyword| name_lower.contains(keyword.as_str()))
        {
            relevance *= 1.2;
        }
        Ok(relevance)
    }

    fn admission_reason(&self, item: &QueueItem, entry_points: &[EntryPoint]) -> String {
        if item.hop == 1 {
            let successors = self.graph.neighbors(&item.origin_id, Direction::Forward);
            if successors.contains(&item.entity_id.as_str()) {
                return "Called by entry point".to_string();
            }
            return "Calls entry point".to_string();
        }
        let origin_name = entry_points
            .iter()
            .find(|e| e.entity.id == item.origin_id)
            .map(|e| e.entity.name.as_str())
            .unwrap_or(item.origin_id.as_str());
        format!("Flow trace from {}", origin_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codescope_core::{Dependency, DependencyKind, EntityKind, EntityMetrics, EntryPointSource};
    use codescope_store::MemoryStore;

    fn entity(id: &str, name: &str, path: &str) -> Entity {
        Entity::new(id, name, EntityKind::Function, path, 1)
    }

    fn entry_point(entity: Entity, relevance: f64, is_keystone: bool) -> EntryPoint {
        EntryPoint {
            entity,
            relevance,
            source: EntryPointSource::KeywordMatch,
            keyword_score: relevance,
            semantic_score: 0.0,
            pagerank: 0.0,
            is_keystone,
            reason: "Keyword match: test".to_string(),
        }
    }

    fn metrics(id: &str, pagerank: f64, in_degree: usize) -> EntityMetrics {
        EntityMetrics {
            entity_id: id.into(),
            pagerank,
            in_degree,
            out_degree: 0,
            betweenness: 0.0,
            computed_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn token_estimate_uses_the_contract_constants() {
        let plain = entity("e", "Handler", "a.go").with_signature("func Handler(w, r)");
        // 50 + 1 + 2 + 3 + 30
        assert_eq!(estimate_tokens(&plain, false), 86);
        assert_eq!(estimate_tokens(&plain, true), 156);

        let bare = entity("e", "X", "a.go");
        assert_eq!(estimate_tokens(&bare, false), 83);
    }

    #[test]
    fn mocks_and_test_paths_are_excluded() {
        let mock = entity("m", "MockAuthService", "internal/auth/login.go");
        assert!(exclusion_reason(&mock).unwrap().contains("Test/mock"));

        let real = entity("r", "LoginHandler", "internal/auth/login.go");
        assert_eq!(exclusion_reason(&real), None);

        let test_file = entity("t", "Helper", "internal/auth/login_test.go");
        assert!(exclusion_reason(&test_file).is_some());

        let vendored = entity("v", "Client", "vendor/lib/client.go");
        assert!(exclusion_reason(&vendored).is_some());

        let tests_dir = entity("d", "Fixture", "pkg/tests/fixture.go");
        assert!(exclusion_reason(&tests_dir).is_some());

        let named = entity("n", "testSetup", "pkg/setup.go");
        assert!(exclusion_reason(&named).is_some());
    }

    async fn seeded(store: &MemoryStore) -> DependencyGraph {
        store
            .insert_entities(vec![
                entity("ep1", "AuthService", "auth/service.go"),
                entity("ep2", "SessionStore", "auth/session.go"),
                entity("callee", "HashPassword", "auth/hash.go"),
                entity("caller", "LoginRoute", "http/routes.go"),
                entity("deep", "Argon2", "crypto/argon.go"),
            ])
            .await
            .unwrap();
        let deps = vec![
            Dependency::new("ep1", "callee", DependencyKind::Calls),
            Dependency::new("caller", "ep1", DependencyKind::Calls),
            Dependency::new("callee", "deep", DependencyKind::Calls),
        ];
        store.insert_dependencies(deps.clone()).await.unwrap();
        DependencyGraph::from_dependencies(&deps)
    }

    #[tokio::test]
    async fn hop_zero_keystone_ordering_wins_ties() {
        // The keystone entry point sorts ahead of the higher-relevance one at hop 0.
        let store = MemoryStore::new();
        let graph = seeded(&store).await;
        let ep1 = entry_point(entity("ep1", "AuthService", "auth/service.go"), 0.8, true);
        let ep2 = entry_point(entity("ep2", "SessionStore", "auth/session.go"), 0.9, false);

        let assembler = ContextAssembler::new(&store, &graph, AssemblerConfig::default());
        let context = assembler
            .assemble(&Intent::default(), &[ep1, ep2], &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(context.relevant[0].entity.id, "ep1");
        assert_eq!(context.relevant[1].entity.id, "ep2");
        assert!(context.relevant.iter().all(|r| r.hop <= 2));
    }

    #[tokio::test]
    async fn callers_and_callees_get_direction_reasons() {
        let store = MemoryStore::new();
        let graph = seeded(&store).await;
        let ep1 = entry_point(entity("ep1", "AuthService", "auth/service.go"), 0.8, false);

        let assembler = ContextAssembler::new(&store, &graph, AssemblerConfig::default());
        let context = assembler
            .assemble(&Intent::default(), &[ep1], &CancellationToken::new())
            .await
            .unwrap();

        let callee = context
            .relevant
            .iter()
            .find(|r| r.entity.id == "callee")
            .unwrap();
        assert_eq!(callee.reason, "Called by entry point");
        assert_eq!(callee.hop, 1);

        let caller = context
            .relevant
            .iter()
            .find(|r| r.entity.id == "caller")
            .unwrap();
        assert_eq!(caller.reason, "Calls entry point");

        let deep = context
            .relevant
            .iter()
            .find(|r| r.entity.id == "deep")
            .unwrap();
        assert_eq!(deep.hop, 2);
        assert_eq!(deep.reason, "Flow trace from AuthService");
    }

    #[tokio::test]
    async fn budget_is_never_exceeded() {
        // A tight budget admits the seed and stops.
        let store = MemoryStore::new();
        let graph = seeded(&store).await;
        let ep1 = entry_point(entity("ep1", "AuthService", "auth/service.go"), 0.8, false);

        let config = AssemblerConfig {
            token_budget: 180,
            ..Default::default()
        };
        let assembler = ContextAssembler::new(&store, &graph, config);
        let context = assembler
            .assemble(&Intent::default(), &[ep1], &CancellationToken::new())
            .await
            .unwrap();

        assert!(context.tokens_used <= 180);
        assert!(context
            .excluded
            .iter()
            .any(|e| e.reason == "Over budget"));
        let spent: usize = context.relevant.iter().map(|r| r.estimated_tokens).sum();
        assert_eq!(spent, context.tokens_used);
    }

    #[tokio::test]
    async fn hop_depth_is_bounded() {
        // With max_hop_depth 1 the two-hop node never appears.
        let store = MemoryStore::new();
        let graph = seeded(&store).await;
        let ep1 = entry_point(entity("ep1", "AuthService", "auth/service.go"), 0.8, false);

        let config = AssemblerConfig {
            max_hop_depth: 1,
            ..Default::default()
        };
        let assembler = ContextAssembler::new(&store, &graph, config);
        let context = assembler
            .assemble(&Intent::default(), &[ep1], &CancellationToken::new())
            .await
            .unwrap();

        assert!(context.relevant.iter().all(|r| r.hop <= 1));
        assert!(!context.relevant.iter().any(|r| r.entity.id == "deep"));
    }

    #[tokio::test]
    async fn keyword_matches_boost_relevance() {
        let store = MemoryStore::new();
        let graph = seeded(&store).await;
        store
            .put_metrics_bulk(vec![metrics("callee", 0.2, 2)])
            .await
            .unwrap();
        store.put_tags("caller", &["api"]);

        let ep1 = entry_point(entity("ep1", "AuthService", "auth/service.go"), 0.8, false);
        let intent = Intent {
            identifier_keywords: vec!["hashpassword".to_string()],
            keywords: vec!["login".to_string()],
            ..Default::default()
        };

        let assembler = ContextAssembler::new(&store, &graph, AssemblerConfig::default());
        let context = assembler
            .assemble(&intent, &[ep1], &CancellationToken::new())
            .await
            .unwrap();

        let callee = context
            .relevant
            .iter()
            .find(|r| r.entity.id == "callee")
            .unwrap();
        // 0.5 base, keystone 2.0 (pagerank 0.2), exact identifier match 2.5.
        assert!((callee.relevance - 2.5).abs() < 1e-9);
        assert!(callee.is_keystone);

        let caller = context
            .relevant
            .iter()
            .find(|r| r.entity.id == "caller")
            .unwrap();
        // 0.5 base, api tag 1.3, generic "login" containment 1.2.
        assert!((caller.relevance - 0.5 * 1.3 * 1.2).abs() < 1e-9);
    }

    #[tokio::test]
    async fn no_entry_points_yields_warning_only() {
        let store = MemoryStore::new();
        let graph = DependencyGraph::new();
        let assembler = ContextAssembler::new(&store, &graph, AssemblerConfig::default());
        let context = assembler
            .assemble(&Intent::default(), &[], &CancellationToken::new())
            .await
            .unwrap();
        assert!(context.relevant.is_empty());
        assert_eq!(context.warnings.len(), 1);
    }
}
