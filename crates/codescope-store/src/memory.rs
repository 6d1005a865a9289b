use async_trait::async_trait;
use codescope_core::{
    validate_ref, CodescopeError, Dependency, DependencyKind, EmbeddingRecord, Entity,
    EntityFilter, EntityMetrics, FileRecord, Link, Result, SearchHit, SimilarHit, Store, Tag,
};
use codescope_vector::cosine_similarity;
use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

/// Revision id used before any scan has stamped the store.
const INITIAL_REVISION: &str = "0000000000000000000000000000000000000000";

#[derive(Default)]
struct Inner {
    entities: Vec<Entity>,
    entity_index: FxHashMap<String, usize>,
    dependencies: Vec<Dependency>,
    dependency_keys: FxHashSet<(String, String, DependencyKind)>,
    links: Vec<Link>,
    metrics: FxHashMap<String, EntityMetrics>,
    embeddings: Vec<EmbeddingRecord>,
    tags: FxHashMap<String, Vec<Tag>>,
    files: Vec<FileRecord>,
    /// Revision ids oldest to newest; the last entry is current.
    history: Vec<String>,
    /// Entity snapshots for non-current revisions.
    snapshots: FxHashMap<String, Vec<Entity>>,
}

impl Inner {
    fn current_revision(&self) -> &str {
        self.history.last().map(|s| s.as_str()).unwrap_or(INITIAL_REVISION)
    }
}

/// In-memory `Store` implementation.
///
/// Holds everything behind a single `RwLock`; callers treat it as a shared
/// read-mostly resource. Exists to wire up sessions and to stand in for the
/// durable backend in tests, which is why seeding helpers live alongside the
/// trait surface.
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let mut inner = Inner::default();
        inner.history.push(INITIAL_REVISION.to_string());
        Self {
            inner: RwLock::new(inner),
        }
    }

    /// Stamp a new current revision, keeping the previous one addressable.
    pub fn push_revision<R: Into<String>>(&self, revision: R) {
        let mut inner = self.inner.write();
        let snapshot = inner.entities.clone();
        let previous = inner.current_revision().to_string();
        inner.snapshots.insert(previous, snapshot);
        inner.history.push(revision.into());
    }

    pub fn put_embedding(&self, record: EmbeddingRecord) {
        let mut inner = self.inner.write();
        if let Some(existing) = inner
            .embeddings
            .iter_mut()
            .find(|e| e.entity_id == record.entity_id)
        {
            *existing = record;
        } else {
            inner.embeddings.push(record);
        }
    }

    /// Replace the tag list for an entity, assigning positions in order.
    pub fn put_tags<T: AsRef<str>>(&self, entity_id: &str, names: &[T]) {
        let tags = names
            .iter()
            .enumerate()
            .map(|(position, name)| Tag {
                entity_id: entity_id.to_string(),
                name: name.as_ref().to_string(),
                position,
            })
            .collect();
        self.inner.write().tags.insert(entity_id.to_string(), tags);
    }

    pub fn put_file(&self, record: FileRecord) {
        let mut inner = self.inner.write();
        if let Some(existing) = inner.files.iter_mut().find(|f| f.path == record.path) {
            *existing = record;
        } else {
            inner.files.push(record);
        }
    }

    fn resolve_ref_inner(inner: &Inner, reference: &str) -> Result<String> {
        if reference == "HEAD" {
            return Ok(inner.current_revision().to_string());
        }
        if let Some(raw) = reference.strip_prefix("HEAD~") {
            let back: usize = raw
                .parse()
                .map_err(|_| CodescopeError::Invalid(format!("malformed ref: {}", reference)))?;
            let len = inner.history.len();
            if back >= len {
                return Err(CodescopeError::NotFound(format!("unknown ref: {}", reference)));
            }
            return Ok(inner.history[len - 1 - back].clone());
        }
        if inner.history.iter().any(|r| r == reference) {
            return Ok(reference.to_string());
        }
        if codescope_core::is_short_hash(reference) {
            let matches: Vec<&String> = inner
                .history
                .iter()
                .filter(|r| r.starts_with(reference))
                .collect();
            return match matches.len() {
                0 => Err(CodescopeError::NotFound(format!("unknown ref: {}", reference))),
                1 => Ok(matches[0].clone()),
                _ => Err(CodescopeError::Invalid(format!("ambiguous ref: {}", reference))),
            };
        }
        Err(CodescopeError::NotFound(format!("unknown ref: {}", reference)))
    }

    fn apply_filter(entities: &[Entity], filter: &EntityFilter) -> Vec<Entity> {
        let offset = filter.offset.unwrap_or(0);
        let limit = filter.limit.unwrap_or(usize::MAX);
        entities
            .iter()
            .filter(|e| filter.matches(e))
            .skip(offset)
            .take(limit)
            .cloned()
            .collect()
    }

    fn top_by<F>(&self, n: usize, key: F) -> Vec<EntityMetrics>
    where
        F: Fn(&EntityMetrics) -> f64,
    {
        let inner = self.inner.read();
        let mut rows: Vec<EntityMetrics> = inner.metrics.values().cloned().collect();
        rows.sort_by(|a, b| {
            key(b)
                .partial_cmp(&key(a))
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.entity_id.cmp(&b.entity_id))
        });
        rows.truncate(n);
        rows
    }
}

/// Blend of name match, signature match and pagerank. The result is opaque
/// to callers; only its ordering matters. Terms are AND-combined, so a
/// multi-word query only hits entities mentioning every term.
fn lexical_score(query: &str, entity: &Entity, pagerank: f64) -> Option<f64> {
    let query_lower = query.trim().to_lowercase();
    if query_lower.is_empty() {
        return None;
    }
    let terms: Vec<&str> = query_lower.split_whitespace().collect();

    let name_lower = entity.name.to_lowercase();
    let signature_lower = entity
        .signature
        .as_deref()
        .unwrap_or("")
        .to_lowercase();
    let haystack = format!("{} {}", name_lower, signature_lower);
    if !terms.iter().all(|t| haystack.contains(t)) {
        return None;
    }

    let name_score = if name_lower == query_lower {
        1.0
    } else if name_lower.starts_with(&query_lower) {
        0.85
    } else if name_lower.contains(&query_lower) {
        0.7
    } else {
        let hits = terms.iter().filter(|t| name_lower.contains(*t)).count();
        0.5 * hits as f64 / terms.len() as f64
    };

    let signature_score = if signature_lower.is_empty() {
        0.0
    } else if signature_lower.contains(&query_lower) {
        1.0
    } else {
        let hits = terms.iter().filter(|t| signature_lower.contains(*t)).count();
        hits as f64 / terms.len() as f64
    };

    let combined = 0.6 * name_score + 0.2 * signature_score + 0.2 * pagerank.clamp(0.0, 1.0);
    Some(combined.clamp(0.0, 1.0))
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_entity(&self, entity: Entity) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.entity_index.contains_key(&entity.id) {
            return Err(CodescopeError::Invalid(format!(
                "duplicate entity id: {}",
                entity.id
            )));
        }
        let next_index = inner.entities.len();
        inner.entity_index.insert(entity.id.clone(), next_index);
        inner.entities.push(entity);
        Ok(())
    }

    async fn insert_entities(&self, entities: Vec<Entity>) -> Result<()> {
        for entity in entities {
            self.insert_entity(entity).await?;
        }
        Ok(())
    }

    async fn get_entity(&self, id: &str) -> Result<Option<Entity>> {
        let inner = self.inner.read();
        Ok(inner.entity_index.get(id).map(|&idx| inner.entities[idx].clone()))
    }

    async fn update_entity(&self, entity: Entity) -> Result<()> {
        let mut inner = self.inner.write();
        match inner.entity_index.get(&entity.id).copied() {
            Some(idx) => {
                inner.entities[idx] = entity;
                Ok(())
            }
            None => Err(CodescopeError::NotFound(format!(
                "no entity with id: {}",
                entity.id
            ))),
        }
    }

    async fn archive_entity(&self, id: &str) -> Result<()> {
        let mut inner = self.inner.write();
        match inner.entity_index.get(id).copied() {
            Some(idx) => {
                inner.entities[idx].status = codescope_core::EntityStatus::Archived;
                Ok(())
            }
            None => Err(CodescopeError::NotFound(format!("no entity with id: {}", id))),
        }
    }

    async fn query_entities(&self, filter: &EntityFilter) -> Result<Vec<Entity>> {
        let inner = self.inner.read();
        Ok(Self::apply_filter(&inner.entities, filter))
    }

    async fn count_entities(&self) -> Result<usize> {
        Ok(self.inner.read().entities.len())
    }

    async fn insert_dependency(&self, dependency: Dependency) -> Result<()> {
        let mut inner = self.inner.write();
        let key = (
            dependency.from_id.clone(),
            dependency.to_id.clone(),
            dependency.kind,
        );
        if inner.dependency_keys.insert(key) {
            inner.dependencies.push(dependency);
        }
        Ok(())
    }

    async fn insert_dependencies(&self, dependencies: Vec<Dependency>) -> Result<()> {
        for dependency in dependencies {
            self.insert_dependency(dependency).await?;
        }
        Ok(())
    }

    async fn delete_dependency(&self, dependency: &Dependency) -> Result<bool> {
        let mut inner = self.inner.write();
        let key = (
            dependency.from_id.clone(),
            dependency.to_id.clone(),
            dependency.kind,
        );
        if !inner.dependency_keys.remove(&key) {
            return Ok(false);
        }
        inner.dependencies.retain(|d| d != dependency);
        Ok(true)
    }

    async fn dependencies_from(&self, id: &str) -> Result<Vec<Dependency>> {
        let inner = self.inner.read();
        Ok(inner
            .dependencies
            .iter()
            .filter(|d| d.from_id == id)
            .cloned()
            .collect())
    }

    async fn dependencies_to(&self, id: &str) -> Result<Vec<Dependency>> {
        let inner = self.inner.read();
        Ok(inner
            .dependencies
            .iter()
            .filter(|d| d.to_id == id)
            .cloned()
            .collect())
    }

    async fn all_dependencies(&self) -> Result<Vec<Dependency>> {
        Ok(self.inner.read().dependencies.clone())
    }

    async fn delete_dependencies_for_file(&self, path: &str) -> Result<usize> {
        let mut inner = self.inner.write();
        let in_file: FxHashSet<&str> = inner
            .entities
            .iter()
            .filter(|e| e.file_path == path)
            .map(|e| e.id.as_str())
            .collect();
        let doomed: Vec<Dependency> = inner
            .dependencies
            .iter()
            .filter(|d| in_file.contains(d.from_id.as_str()))
            .cloned()
            .collect();
        for dependency in &doomed {
            let key = (
                dependency.from_id.clone(),
                dependency.to_id.clone(),
                dependency.kind,
            );
            inner.dependency_keys.remove(&key);
        }
        inner.dependencies.retain(|d| !doomed.contains(d));
        debug!(path, removed = doomed.len(), "dependencies dropped for file");
        Ok(doomed.len())
    }

    async fn insert_link(&self, link: Link) -> Result<()> {
        let mut inner = self.inner.write();
        if !inner.links.contains(&link) {
            inner.links.push(link);
        }
        Ok(())
    }

    async fn links_for(&self, entity_id: &str) -> Result<Vec<Link>> {
        let inner = self.inner.read();
        Ok(inner
            .links
            .iter()
            .filter(|l| l.entity_id == entity_id)
            .cloned()
            .collect())
    }

    async fn delete_link(&self, link: &Link) -> Result<bool> {
        let mut inner = self.inner.write();
        let before = inner.links.len();
        inner.links.retain(|l| l != link);
        Ok(inner.links.len() < before)
    }

    async fn search_entities(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let inner = self.inner.read();
        let mut hits: Vec<SearchHit> = inner
            .entities
            .iter()
            .filter_map(|entity| {
                let pagerank = inner
                    .metrics
                    .get(&entity.id)
                    .map(|m| m.pagerank)
                    .unwrap_or(0.0);
                lexical_score(query, entity, pagerank).map(|combined_score| SearchHit {
                    entity: entity.clone(),
                    combined_score,
                    pagerank,
                })
            })
            .collect();
        hits.sort_by(|a, b| {
            b.combined_score
                .partial_cmp(&a.combined_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.entity.id.cmp(&b.entity.id))
        });
        hits.truncate(limit);
        Ok(hits)
    }

    async fn find_similar(&self, query: &[f32], limit: usize) -> Result<Vec<SimilarHit>> {
        let inner = self.inner.read();
        let mut hits: Vec<SimilarHit> = inner
            .embeddings
            .iter()
            .map(|record| SimilarHit {
                entity_id: record.entity_id.clone(),
                similarity: cosine_similarity(query, &record.vector),
            })
            .collect();
        hits.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.entity_id.cmp(&b.entity_id))
        });
        hits.truncate(limit);
        Ok(hits)
    }

    async fn get_metrics(&self, entity_id: &str) -> Result<Option<EntityMetrics>> {
        Ok(self.inner.read().metrics.get(entity_id).cloned())
    }

    async fn put_metrics_bulk(&self, metrics: Vec<EntityMetrics>) -> Result<()> {
        let mut inner = self.inner.write();
        for row in metrics {
            inner.metrics.insert(row.entity_id.clone(), row);
        }
        Ok(())
    }

    async fn top_by_pagerank(&self, n: usize) -> Result<Vec<EntityMetrics>> {
        Ok(self.top_by(n, |m| m.pagerank))
    }

    async fn top_by_betweenness(&self, n: usize) -> Result<Vec<EntityMetrics>> {
        Ok(self.top_by(n, |m| m.betweenness))
    }

    async fn top_by_in_degree(&self, n: usize) -> Result<Vec<EntityMetrics>> {
        Ok(self.top_by(n, |m| m.in_degree as f64))
    }

    async fn top_by_out_degree(&self, n: usize) -> Result<Vec<EntityMetrics>> {
        Ok(self.top_by(n, |m| m.out_degree as f64))
    }

    async fn keystones(
        &self,
        pagerank_min: f64,
        in_degree_min: usize,
    ) -> Result<Vec<EntityMetrics>> {
        let mut rows = self.top_by(usize::MAX, |m| m.pagerank);
        rows.retain(|m| m.pagerank >= pagerank_min && m.in_degree >= in_degree_min);
        Ok(rows)
    }

    async fn bottlenecks(&self, betweenness_min: f64) -> Result<Vec<EntityMetrics>> {
        let mut rows = self.top_by(usize::MAX, |m| m.betweenness);
        rows.retain(|m| m.betweenness >= betweenness_min);
        Ok(rows)
    }

    async fn tags_for(&self, entity_id: &str) -> Result<Vec<Tag>> {
        let inner = self.inner.read();
        let mut tags = inner.tags.get(entity_id).cloned().unwrap_or_default();
        tags.sort_by_key(|t| t.position);
        Ok(tags)
    }

    async fn embedding_count(&self) -> Result<usize> {
        Ok(self.inner.read().embeddings.len())
    }

    async fn list_files(&self) -> Result<Vec<FileRecord>> {
        Ok(self.inner.read().files.clone())
    }

    async fn file_record(&self, path: &str) -> Result<Option<FileRecord>> {
        let inner = self.inner.read();
        Ok(inner.files.iter().find(|f| f.path == path).cloned())
    }

    async fn revision(&self) -> Result<String> {
        Ok(self.inner.read().current_revision().to_string())
    }

    async fn resolve_ref(&self, reference: &str) -> Result<String> {
        validate_ref(reference)?;
        let inner = self.inner.read();
        Self::resolve_ref_inner(&inner, reference)
    }

    async fn query_entities_at(
        &self,
        filter: &EntityFilter,
        reference: &str,
    ) -> Result<Vec<Entity>> {
        validate_ref(reference)?;
        let inner = self.inner.read();
        let resolved = Self::resolve_ref_inner(&inner, reference)?;
        if resolved == inner.current_revision() {
            return Ok(Self::apply_filter(&inner.entities, filter));
        }
        match inner.snapshots.get(&resolved) {
            Some(snapshot) => Ok(Self::apply_filter(snapshot, filter)),
            None => Err(CodescopeError::NotFound(format!(
                "no snapshot for ref: {}",
                reference
            ))),
        }
    }
}
