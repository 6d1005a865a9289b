// ABOUTME: Tool executor for the query dispatch surface
// ABOUTME: Validates and coerces arguments, runs tools with caching and timeouts, shapes results

use crate::{render_entity, CodescopeToolSchemas, Density, EntityOutput, ListOutput};
use codescope_analysis::{
    analyze_impact, extract_intent, ContextAssembler, EntryPointFinder, ImpactOptions,
    ImpactReport,
};
use codescope_core::{
    cancellable, AssemblerConfig, CodescopeConfig, CodescopeError, Embedder, EntityFilter,
    EntityKind, Language, Result, Store,
};
use codescope_graph::DependencyGraph;
use lru::LruCache;
use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Tool result cache counters.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub current_size: usize,
    pub max_size: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

/// Registry and dispatch for the eight query tools.
///
/// Each call owns its session state (graph snapshot, intent, entry points);
/// the dispatcher itself only shares the store handle, the result cache and
/// the activity clock, so requests can run in parallel.
pub struct ToolDispatcher {
    store: Arc<dyn Store>,
    embedder: Option<Arc<dyn Embedder>>,
    config: CodescopeConfig,
    enabled: FxHashSet<String>,
    graph_cache: tokio::sync::Mutex<Option<(String, Arc<DependencyGraph>)>>,
    cache: Mutex<LruCache<String, JsonValue>>,
    cache_stats: Mutex<CacheStats>,
    last_activity: Mutex<Instant>,
}

impl ToolDispatcher {
    pub fn new(
        store: Arc<dyn Store>,
        embedder: Option<Arc<dyn Embedder>>,
        config: CodescopeConfig,
    ) -> Self {
        let capacity = NonZeroUsize::new(config.dispatcher.cache_size)
            .unwrap_or(NonZeroUsize::new(100).unwrap());
        let cache_stats = CacheStats {
            max_size: capacity.get(),
            ..Default::default()
        };
        Self {
            store,
            embedder,
            config,
            enabled: CodescopeToolSchemas::tool_names().into_iter().collect(),
            graph_cache: tokio::sync::Mutex::new(None),
            cache: Mutex::new(LruCache::new(capacity)),
            cache_stats: Mutex::new(cache_stats),
            last_activity: Mutex::new(Instant::now()),
        }
    }

    pub fn enabled_tools(&self) -> Vec<String> {
        CodescopeToolSchemas::tool_names()
            .into_iter()
            .filter(|name| self.enabled.contains(name))
            .collect()
    }

    /// Restrict the registry to a subset of the known tools.
    pub fn with_enabled_tools<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enabled = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache_stats.lock().clone()
    }

    pub fn idle_for(&self) -> Duration {
        self.last_activity.lock().elapsed()
    }

    /// Dispatch one tool call. Arguments arrive as a JSON object; numeric
    /// arguments are coerced from floats because callers routinely send
    /// them that way.
    pub async fn dispatch(
        &self,
        name: &str,
        args: JsonValue,
        cancel: &CancellationToken,
    ) -> Result<JsonValue> {
        *self.last_activity.lock() = Instant::now();

        if !self.enabled.contains(name) {
            return Err(CodescopeError::Invalid(format!(
                "unknown tool: {} (call 'tools' to list available tools)",
                name
            )));
        }

        let revision = cancellable(cancel, self.store.revision()).await?;
        let cache_key = format!("{}::{}::{}", revision, name, args);
        if self.config.dispatcher.cache_enabled {
            if let Some(cached) = self.cache.lock().get(&cache_key).cloned() {
                let mut stats = self.cache_stats.lock();
                stats.hits += 1;
                debug!(tool = name, "cache hit");
                return Ok(cached);
            }
            self.cache_stats.lock().misses += 1;
        }

        let child = cancel.child_token();
        let timeout = Duration::from_secs(self.config.dispatcher.request_timeout_secs);
        let result = tokio::select! {
            _ = tokio::time::sleep(timeout) => {
                child.cancel();
                Err(CodescopeError::Backend(format!(
                    "tool '{}' timed out after {}s",
                    name, self.config.dispatcher.request_timeout_secs
                )))
            }
            result = self.execute(name, &args, &child) => result,
        };

        let value = self.truncate_if_oversized(name, result?);
        if self.config.dispatcher.cache_enabled {
            let mut cache = self.cache.lock();
            let at_capacity = cache.len() == cache.cap().get();
            let replaced = cache.put(cache_key, value.clone());
            let mut stats = self.cache_stats.lock();
            if at_capacity && replaced.is_none() {
                stats.evictions += 1;
            }
            stats.current_size = cache.len();
        }
        Ok(value)
    }

    async fn execute(
        &self,
        name: &str,
        args: &JsonValue,
        cancel: &CancellationToken,
    ) -> Result<JsonValue> {
        match name {
            "find" => self.tool_find(args, cancel).await,
            "show" => self.tool_show(args, cancel).await,
            "map" => self.tool_map(args, cancel).await,
            "impact" => self.tool_impact(args, cancel).await,
            "safe" => self.tool_safe(args, cancel).await,
            "context" => self.tool_context(args, cancel).await,
            "gaps" => self.tool_gaps(args, cancel).await,
            "diff" => self.tool_diff(args, cancel).await,
            other => Err(CodescopeError::Invalid(format!(
                "unknown tool: {} (call 'tools' to list available tools)",
                other
            ))),
        }
    }

    /// Session graph keyed by store revision; rebuilt only when the store
    /// moves.
    async fn session_graph(&self, cancel: &CancellationToken) -> Result<Arc<DependencyGraph>> {
        let revision = cancellable(cancel, self.store.revision()).await?;
        let mut guard = self.graph_cache.lock().await;
        if let Some((cached_revision, graph)) = guard.as_ref() {
            if *cached_revision == revision {
                return Ok(graph.clone());
            }
        }
        let graph = Arc::new(cancellable(cancel, DependencyGraph::from_store(&*self.store)).await?);
        *guard = Some((revision, graph.clone()));
        Ok(graph)
    }

    // ------------------------------------------------------------------
    // Argument helpers
    // ------------------------------------------------------------------

    fn require_str(args: &JsonValue, key: &str) -> Result<String> {
        match args.get(key) {
            Some(JsonValue::String(s)) if !s.trim().is_empty() => Ok(s.clone()),
            Some(JsonValue::String(_)) => Err(CodescopeError::Invalid(format!(
                "argument '{}' must not be empty",
                key
            ))),
            Some(_) => Err(CodescopeError::Invalid(format!(
                "argument '{}' must be a string",
                key
            ))),
            None => Err(CodescopeError::Invalid(format!(
                "missing required argument: {}",
                key
            ))),
        }
    }

    fn optional_str(args: &JsonValue, key: &str) -> Option<String> {
        args.get(key)
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.to_string())
    }

    fn usize_or(args: &JsonValue, key: &str, default: usize) -> Result<usize> {
        match args.get(key) {
            None | Some(JsonValue::Null) => Ok(default),
            Some(value) => {
                if let Some(n) = value.as_u64() {
                    return Ok(n as usize);
                }
                if let Some(f) = value.as_f64() {
                    if f.is_finite() && f >= 0.0 {
                        return Ok(f.round() as usize);
                    }
                }
                Err(CodescopeError::Invalid(format!(
                    "argument '{}' must be a non-negative number",
                    key
                )))
            }
        }
    }

    fn f64_or(args: &JsonValue, key: &str, default: f64) -> Result<f64> {
        match args.get(key) {
            None | Some(JsonValue::Null) => Ok(default),
            Some(value) => value.as_f64().filter(|f| f.is_finite()).ok_or_else(|| {
                CodescopeError::Invalid(format!("argument '{}' must be a number", key))
            }),
        }
    }

    fn bool_or(args: &JsonValue, key: &str, default: bool) -> Result<bool> {
        match args.get(key) {
            None | Some(JsonValue::Null) => Ok(default),
            Some(JsonValue::Bool(b)) => Ok(*b),
            Some(_) => Err(CodescopeError::Invalid(format!(
                "argument '{}' must be a boolean",
                key
            ))),
        }
    }

    fn kind_code(args: &JsonValue, key: &str) -> Result<Option<EntityKind>> {
        match Self::optional_str(args, key) {
            None => Ok(None),
            Some(code) => EntityKind::from_code(&code).map(Some).ok_or_else(|| {
                CodescopeError::Invalid(format!("unknown entity type code: {}", code))
            }),
        }
    }

    // ------------------------------------------------------------------
    // Tool handlers
    // ------------------------------------------------------------------

    async fn tool_find(&self, args: &JsonValue, cancel: &CancellationToken) -> Result<JsonValue> {
        let pattern = Self::require_str(args, "pattern")?;
        let kind = Self::kind_code(args, "type")?;
        let limit = Self::usize_or(args, "limit", 20)?;

        let hits = cancellable(cancel, self.store.search_entities(&pattern, limit)).await?;
        let mut results: BTreeMap<String, EntityOutput> = BTreeMap::new();
        for hit in hits {
            if let Some(kind) = &kind {
                if hit.entity.kind != *kind {
                    continue;
                }
            }
            results.insert(
                hit.entity.name.clone(),
                render_entity(&hit.entity, None, Density::Medium),
            );
        }
        let count = results.len();
        Ok(serde_json::to_value(ListOutput { results, count })?)
    }

    async fn tool_show(&self, args: &JsonValue, cancel: &CancellationToken) -> Result<JsonValue> {
        let name = Self::require_str(args, "name")?;
        let density = match Self::optional_str(args, "density") {
            None => Density::Medium,
            Some(raw) => match raw.parse::<Density>()? {
                Density::Smart => {
                    return Err(CodescopeError::Invalid(
                        "density for show must be sparse, medium or dense".to_string(),
                    ))
                }
                density => density,
            },
        };
        let with_coverage = Self::bool_or(args, "coverage", false)?;

        let entity = match cancellable(cancel, self.store.get_entity(&name)).await? {
            Some(entity) => entity,
            None => {
                let hits = cancellable(cancel, self.store.search_entities(&name, 10)).await?;
                hits.into_iter().map(|h| h.entity).next().ok_or_else(|| {
                    CodescopeError::NotFound(format!("no entities found matching: {}", name))
                })?
            }
        };

        let metrics = match cancellable(cancel, self.store.get_metrics(&entity.id)).await {
            Ok(metrics) => metrics,
            Err(e) if e.is_degradable() => None,
            Err(e) => return Err(e),
        };
        let mut out = render_entity(&entity, metrics.as_ref(), density);

        if matches!(density, Density::Medium | Density::Dense) {
            let outgoing = cancellable(cancel, self.store.dependencies_from(&entity.id)).await?;
            out.dependencies = Some(
                outgoing
                    .iter()
                    .filter(|d| d.kind.is_code())
                    .map(|d| d.to_id.clone())
                    .collect(),
            );
            let incoming = cancellable(cancel, self.store.dependencies_to(&entity.id)).await?;
            out.dependents = Some(
                incoming
                    .iter()
                    .filter(|d| d.kind.is_code())
                    .map(|d| d.from_id.clone())
                    .collect(),
            );
        }
        if density == Density::Dense {
            let tags = cancellable(cancel, self.store.tags_for(&entity.id)).await?;
            if !tags.is_empty() {
                out.tags = Some(tags.into_iter().map(|t| t.name).collect());
            }
        }
        if with_coverage {
            out.coverage = Some("unknown".to_string());
        }

        let mut value = serde_json::to_value(out)?;
        if let Some(object) = value.as_object_mut() {
            object.insert("name".to_string(), json!(entity.name));
        }
        Ok(value)
    }

    async fn tool_map(&self, args: &JsonValue, cancel: &CancellationToken) -> Result<JsonValue> {
        let path = Self::optional_str(args, "path");
        let kind = Self::kind_code(args, "filter")?;
        let language = Self::optional_str(args, "lang").map(|code| Language::from_code(&code));

        let filter = EntityFilter {
            kind,
            language,
            file_path_prefix: path.clone(),
            ..Default::default()
        };
        let entities = cancellable(cancel, self.store.query_entities(&filter)).await?;

        let mut files: BTreeMap<String, Vec<EntityOutput>> = BTreeMap::new();
        let count = entities.len();
        for entity in &entities {
            files
                .entry(entity.file_path.clone())
                .or_default()
                .push(render_entity(entity, None, Density::Sparse));
        }

        Ok(json!({
            "files": files,
            "count": count,
            "path": path.unwrap_or_else(|| "/".to_string()),
        }))
    }

    async fn tool_impact(&self, args: &JsonValue, cancel: &CancellationToken) -> Result<JsonValue> {
        let target = Self::require_str(args, "target")?;
        let depth = Self::usize_or(args, "depth", 3)?;
        let threshold = Self::f64_or(args, "threshold", 0.0)?;

        let graph = self.session_graph(cancel).await?;
        let report = analyze_impact(
            &*self.store,
            &graph,
            &target,
            ImpactOptions {
                depth,
                quick: false,
            },
            cancel,
        )
        .await?;
        Ok(render_impact(&report, threshold))
    }

    async fn tool_safe(&self, args: &JsonValue, cancel: &CancellationToken) -> Result<JsonValue> {
        let target = Self::require_str(args, "target")?;
        let quick = Self::bool_or(args, "quick", false)?;
        let depth = Self::usize_or(args, "depth", 3)?;

        let graph = self.session_graph(cancel).await?;
        let report = analyze_impact(
            &*self.store,
            &graph,
            &target,
            ImpactOptions { depth, quick },
            cancel,
        )
        .await?;
        Ok(json!({ "safety_assessment": render_impact(&report, 0.0) }))
    }

    async fn tool_context(&self, args: &JsonValue, cancel: &CancellationToken) -> Result<JsonValue> {
        let description = Self::optional_str(args, "smart")
            .or_else(|| Self::optional_str(args, "target"))
            .ok_or_else(|| {
                CodescopeError::Invalid(
                    "context requires either 'smart' or 'target'".to_string(),
                )
            })?;
        let budget = Self::usize_or(args, "budget", self.config.assembler.token_budget)?;
        let depth = Self::usize_or(args, "depth", self.config.assembler.max_hop_depth)?;

        let intent = extract_intent(&description);
        let graph = self.session_graph(cancel).await?;

        let finder = EntryPointFinder::new(
            &*self.store,
            self.embedder.as_deref(),
            self.config.hybrid.clone(),
        );
        let entry_points = finder.find(&description, &intent, cancel).await?;

        let assembler_config = AssemblerConfig {
            token_budget: budget,
            max_hop_depth: depth,
            ..self.config.assembler.clone()
        };
        let assembler = ContextAssembler::new(&*self.store, &graph, assembler_config);
        let context = assembler.assemble(&intent, &entry_points, cancel).await?;

        let entry_points_out: Vec<JsonValue> = entry_points
            .iter()
            .map(|e| {
                json!({
                    "name": e.entity.name,
                    "location": e.entity.location(),
                    "relevance": e.relevance,
                    "source": e.source.to_string(),
                    "keystone": e.is_keystone,
                    "reason": e.reason,
                })
            })
            .collect();
        let relevant: Vec<JsonValue> = context
            .relevant
            .iter()
            .map(|r| {
                json!({
                    "name": r.entity.name,
                    "location": r.entity.location(),
                    "hop": r.hop,
                    "relevance": r.relevance,
                    "keystone": r.is_keystone,
                    "tokens": r.estimated_tokens,
                    "reason": r.reason,
                })
            })
            .collect();
        let excluded: Vec<JsonValue> = context
            .excluded
            .iter()
            .map(|e| json!({ "name": e.name, "reason": e.reason }))
            .collect();

        let mut value = json!({
            "context": {
                "target": description,
                "budget": budget,
                "tokens_used": context.tokens_used,
            },
            "entry_points": entry_points_out,
            "relevant": relevant,
        });
        if let Some(object) = value.as_object_mut() {
            if !excluded.is_empty() {
                object.insert("excluded".to_string(), json!(excluded));
            }
            if !context.warnings.is_empty() {
                object.insert("warnings".to_string(), json!(context.warnings));
            }
        }
        Ok(value)
    }

    async fn tool_gaps(&self, args: &JsonValue, cancel: &CancellationToken) -> Result<JsonValue> {
        let keystones_only = Self::bool_or(args, "keystones_only", false)?;
        let threshold = Self::usize_or(args, "threshold", 50)?;

        let rows = if keystones_only {
            cancellable(
                cancel,
                self.store.keystones(
                    self.config.metrics.keystone_pagerank,
                    self.config.metrics.keystone_in_degree,
                ),
            )
            .await?
        } else {
            cancellable(cancel, self.store.top_by_pagerank(20)).await?
        };

        let mut gaps = Vec::new();
        for row in &rows {
            let entity = match cancellable(cancel, self.store.get_entity(&row.entity_id)).await {
                Ok(Some(entity)) => entity,
                Ok(None) => continue,
                Err(e) if e.is_degradable() => {
                    warn!(id = %row.entity_id, error = %e, "gap entity fetch failed");
                    continue;
                }
                Err(e) => return Err(e),
            };
            gaps.push(json!({
                "name": entity.name,
                "location": entity.location(),
                "pagerank": row.pagerank,
                "coverage": "unknown",
            }));
        }

        Ok(json!({
            "threshold": threshold,
            "gaps": gaps,
            "count": gaps.len(),
            "note": "coverage data is not populated; important entities are listed with coverage unknown",
        }))
    }

    async fn tool_diff(&self, args: &JsonValue, cancel: &CancellationToken) -> Result<JsonValue> {
        let file = Self::optional_str(args, "file");
        let detailed = Self::bool_or(args, "detailed", false)?;

        let mut files = cancellable(cancel, self.store.list_files()).await?;
        if let Some(filter) = &file {
            files.retain(|f| f.path == *filter || f.path.ends_with(filter.as_str()));
        }

        let mut value = json!({
            "summary": format!("{} files indexed", files.len()),
            "status": "clean",
        });
        if let Some(object) = value.as_object_mut() {
            if let Some(filter) = file {
                object.insert("filter".to_string(), json!(filter));
            }
            if detailed {
                let detail: Vec<JsonValue> = files
                    .iter()
                    .map(|f| {
                        json!({
                            "path": f.path,
                            "content_hash": f.content_hash,
                            "scanned_at": f.scanned_at.to_rfc3339(),
                        })
                    })
                    .collect();
                object.insert("files".to_string(), json!(detail));
            }
        }
        Ok(value)
    }

    /// Oversized results are trimmed array-wise so they never blow a caller's
    /// context window; the envelope records what was dropped.
    fn truncate_if_oversized(&self, tool: &str, result: JsonValue) -> JsonValue {
        let max_bytes = self.config.dispatcher.max_result_bytes;
        let serialized_len = result.to_string().len();
        if serialized_len <= max_bytes {
            return result;
        }

        let Some(object) = result.as_object() else {
            return result;
        };
        // Trim the largest top-level array proportionally.
        let Some((field, array)) = object
            .iter()
            .filter_map(|(k, v)| v.as_array().map(|a| (k.clone(), a)))
            .max_by_key(|(_, a)| a.len())
        else {
            return result;
        };
        if array.is_empty() {
            return result;
        }

        let bytes_per_item = serialized_len / array.len();
        let keep = (max_bytes / bytes_per_item.max(1)).clamp(1, array.len());
        let dropped = array.len() - keep;
        warn!(
            tool,
            bytes = serialized_len,
            max_bytes,
            dropped,
            "tool result oversized, truncating"
        );

        let truncated: Vec<JsonValue> = array.iter().take(keep).cloned().collect();
        let mut out = result.clone();
        if let Some(object) = out.as_object_mut() {
            object.insert(field, JsonValue::Array(truncated));
            object.insert(
                "_truncated".to_string(),
                json!({
                    "dropped_items": dropped,
                    "reason": "result exceeded the configured size limit",
                    "max_bytes": max_bytes,
                }),
            );
        }
        out
    }

    /// Idle watcher: polls the activity clock and fires `shutdown` once the
    /// configured timeout elapses with no tool calls. The tick never drops
    /// below 30 seconds.
    pub async fn watch_idle(&self, shutdown: CancellationToken) {
        let Some(timeout_secs) = self.config.dispatcher.idle_timeout_secs else {
            return;
        };
        let tick = Duration::from_secs(self.config.dispatcher.poll_tick_secs());
        let timeout = Duration::from_secs(timeout_secs);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = tokio::time::sleep(tick) => {}
            }
            let idle = self.idle_for();
            if idle > timeout {
                info!(idle_secs = idle.as_secs(), "idle timeout reached, shutting down");
                shutdown.cancel();
                return;
            }
        }
    }
}

fn render_impact(report: &ImpactReport, threshold: f64) -> JsonValue {
    let mut affected = BTreeMap::new();
    for entry in &report.affected {
        if threshold > 0.0 && entry.pagerank < threshold {
            continue;
        }
        affected.insert(
            entry.entity.name.clone(),
            json!({
                "location": entry.entity.location(),
                "depth": entry.depth,
                "pagerank": entry.pagerank,
                "keystone": entry.is_keystone,
            }),
        );
    }

    let mut value = json!({
        "impact": {
            "target": report.target,
            "depth": report.depth,
        },
        "summary": {
            "files_affected": report.files_affected,
            "entities_affected": report.affected.len(),
            "keystones": report.keystone_count,
            "gaps": report.gaps,
            "risk_level": report.risk.to_string(),
        },
        "affected": affected,
    });
    if let Some(object) = value.as_object_mut() {
        if !report.recommendations.is_empty() {
            object.insert(
                "recommendations".to_string(),
                json!(report.recommendations),
            );
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use codescope_core::{Dependency, DependencyKind, DispatcherConfig, Entity, EntityKind};
    use codescope_store::MemoryStore;

    fn entity(id: &str, name: &str, path: &str) -> Entity {
        Entity::new(id, name, EntityKind::Function, path, 1)
    }

    async fn seeded_dispatcher() -> ToolDispatcher {
        let store = MemoryStore::new();
        store
            .insert_entities(vec![
                entity("svc", "AuthService", "auth/service.go"),
                entity("route", "LoginRoute", "http/routes.go"),
                entity("hash", "HashPassword", "auth/hash.go"),
            ])
            .await
            .unwrap();
        store
            .insert_dependencies(vec![
                Dependency::new("route", "svc", DependencyKind::Calls),
                Dependency::new("svc", "hash", DependencyKind::Calls),
            ])
            .await
            .unwrap();
        ToolDispatcher::new(Arc::new(store), None, CodescopeConfig::default())
    }

    #[tokio::test]
    async fn unknown_tools_point_at_discovery() {
        let dispatcher = seeded_dispatcher().await;
        let err = dispatcher
            .dispatch("frobnicate", json!({}), &CancellationToken::new())
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("unknown tool: frobnicate"));
        assert!(message.contains("list available tools"));
    }

    #[tokio::test]
    async fn find_returns_a_list_envelope() {
        let dispatcher = seeded_dispatcher().await;
        let value = dispatcher
            .dispatch(
                "find",
                json!({"pattern": "auth"}),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(value["count"].as_u64().unwrap() >= 1);
        assert!(value["results"]["AuthService"]["location"]
            .as_str()
            .unwrap()
            .contains("auth/service.go"));
    }

    #[tokio::test]
    async fn numeric_arguments_coerce_from_floats() {
        let dispatcher = seeded_dispatcher().await;
        let value = dispatcher
            .dispatch(
                "find",
                json!({"pattern": "auth", "limit": 5.0}),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(value["count"].as_u64().is_some());

        let err = dispatcher
            .dispatch(
                "find",
                json!({"pattern": "auth", "limit": -2.0}),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CodescopeError::Invalid(_)));
    }

    #[tokio::test]
    async fn missing_required_arguments_are_invalid() {
        let dispatcher = seeded_dispatcher().await;
        let err = dispatcher
            .dispatch("find", json!({}), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid: missing required argument: pattern"
        );
    }

    #[tokio::test]
    async fn show_falls_back_to_name_search() {
        let dispatcher = seeded_dispatcher().await;
        let value = dispatcher
            .dispatch(
                "show",
                json!({"name": "AuthService", "coverage": true}),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(value["name"], "AuthService");
        assert_eq!(value["coverage"], "unknown");
        assert_eq!(value["dependencies"][0], "hash");
        assert_eq!(value["dependents"][0], "route");

        let err = dispatcher
            .dispatch(
                "show",
                json!({"name": "Nothing"}),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "not found: no entities found matching: Nothing"
        );
    }

    #[tokio::test]
    async fn map_groups_entities_by_file() {
        let dispatcher = seeded_dispatcher().await;
        let value = dispatcher
            .dispatch(
                "map",
                json!({"path": "auth/"}),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(value["count"], 2);
        assert!(value["files"]["auth/service.go"].is_array());
        assert!(value["files"].get("http/routes.go").is_none());
        assert_eq!(value["path"], "auth/");
    }

    #[tokio::test]
    async fn safe_wraps_impact_with_recommendations() {
        let dispatcher = seeded_dispatcher().await;
        let value = dispatcher
            .dispatch(
                "safe",
                json!({"target": "HashPassword"}),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        let assessment = &value["safety_assessment"];
        assert_eq!(assessment["impact"]["target"], "HashPassword");
        assert_eq!(assessment["summary"]["risk_level"], "low");
        assert_eq!(
            assessment["recommendations"][0],
            "Safe to proceed"
        );
    }

    #[tokio::test]
    async fn context_assembles_under_budget() {
        let dispatcher = seeded_dispatcher().await;
        let value = dispatcher
            .dispatch(
                "context",
                json!({"smart": "fix AuthService login flow", "budget": 4000.0}),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(value["context"]["budget"], 4000);
        let used = value["context"]["tokens_used"].as_u64().unwrap();
        assert!(used > 0 && used <= 4000);
        assert!(!value["relevant"].as_array().unwrap().is_empty());

        let err = dispatcher
            .dispatch("context", json!({}), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CodescopeError::Invalid(_)));
    }

    #[tokio::test]
    async fn gaps_reports_coverage_unknown() {
        let dispatcher = seeded_dispatcher().await;
        let value = dispatcher
            .dispatch("gaps", json!({}), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(value["threshold"], 50);
        assert!(value["note"].as_str().unwrap().contains("not populated"));
    }

    #[tokio::test]
    async fn diff_summarizes_the_file_index() {
        let dispatcher = seeded_dispatcher().await;
        let value = dispatcher
            .dispatch(
                "diff",
                json!({"detailed": true}),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(value["status"], "clean");
        assert!(value["summary"].as_str().unwrap().contains("files indexed"));
        assert!(value["files"].is_array());
    }

    #[tokio::test]
    async fn repeated_calls_hit_the_cache() {
        let dispatcher = seeded_dispatcher().await;
        let args = json!({"pattern": "auth"});
        dispatcher
            .dispatch("find", args.clone(), &CancellationToken::new())
            .await
            .unwrap();
        dispatcher
            .dispatch("find", args, &CancellationToken::new())
            .await
            .unwrap();
        let stats = dispatcher.cache_stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!(stats.hit_rate() > 49.0);
    }

    #[tokio::test]
    async fn cancellation_propagates_through_dispatch() {
        let dispatcher = seeded_dispatcher().await;
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = dispatcher
            .dispatch("find", json!({"pattern": "auth"}), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, CodescopeError::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn idle_watcher_fires_after_timeout() {
        let store = MemoryStore::new();
        let config = CodescopeConfig {
            dispatcher: DispatcherConfig {
                idle_timeout_secs: Some(60),
                ..Default::default()
            },
            ..Default::default()
        };
        let dispatcher = Arc::new(ToolDispatcher::new(Arc::new(store), None, config));
        let shutdown = CancellationToken::new();

        let watcher = {
            let dispatcher = dispatcher.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move { dispatcher.watch_idle(shutdown).await })
        };
        tokio::time::advance(Duration::from_secs(121)).await;
        watcher.await.unwrap();
        assert!(shutdown.is_cancelled());
    }

    #[tokio::test]
    async fn oversized_results_are_truncated_with_metadata() {
        let store = MemoryStore::new();
        let mut batch = Vec::new();
        for i in 0..50 {
            batch.push(
                entity(
                    &format!("e{:02}", i),
                    &format!("Handler{:02}", i),
                    &format!("pkg/handler{:02}.go", i),
                )
                .with_signature("func Handler(ctx context.Context, request *Request) error"),
            );
        }
        store.insert_entities(batch).await.unwrap();

        let config = CodescopeConfig {
            dispatcher: DispatcherConfig {
                max_result_bytes: 600,
                ..Default::default()
            },
            ..Default::default()
        };
        let dispatcher = ToolDispatcher::new(Arc::new(store), None, config);
        let value = dispatcher
            .dispatch(
                "context",
                json!({"smart": "refactor handler registration"}),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(value.get("_truncated").is_some());
        assert!(value["_truncated"]["dropped_items"].as_u64().unwrap() > 0);
    }
}
