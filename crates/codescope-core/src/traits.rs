use crate::{
    Dependency, Entity, EntityFilter, EntityMetrics, FileRecord, Link, Result, SearchHit,
    SimilarHit, Tag,
};
use async_trait::async_trait;

/// Durable entity/dependency store consumed by the analytics and assembly
/// layers. A process typically holds exactly one implementation; the trait
/// exists so tests can substitute an in-memory stub.
#[async_trait]
pub trait Store: Send + Sync {
    // Entities
    async fn insert_entity(&self, entity: Entity) -> Result<()>;
    async fn insert_entities(&self, entities: Vec<Entity>) -> Result<()>;
    async fn get_entity(&self, id: &str) -> Result<Option<Entity>>;
    async fn update_entity(&self, entity: Entity) -> Result<()>;
    async fn archive_entity(&self, id: &str) -> Result<()>;
    async fn query_entities(&self, filter: &EntityFilter) -> Result<Vec<Entity>>;
    async fn count_entities(&self) -> Result<usize>;

    // Dependencies
    async fn insert_dependency(&self, dependency: Dependency) -> Result<()>;
    async fn insert_dependencies(&self, dependencies: Vec<Dependency>) -> Result<()>;
    async fn delete_dependency(&self, dependency: &Dependency) -> Result<bool>;
    async fn dependencies_from(&self, id: &str) -> Result<Vec<Dependency>>;
    async fn dependencies_to(&self, id: &str) -> Result<Vec<Dependency>>;
    async fn all_dependencies(&self) -> Result<Vec<Dependency>>;
    async fn delete_dependencies_for_file(&self, path: &str) -> Result<usize>;

    // External links
    async fn insert_link(&self, link: Link) -> Result<()>;
    async fn links_for(&self, entity_id: &str) -> Result<Vec<Link>>;
    async fn delete_link(&self, link: &Link) -> Result<bool>;

    // Search
    /// Lexical search blending name match, signature match and pagerank into
    /// an opaque combined score in [0, 1].
    async fn search_entities(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>>;
    /// Cosine similarity scan over stored embeddings.
    async fn find_similar(&self, query: &[f32], limit: usize) -> Result<Vec<SimilarHit>>;

    // Metrics
    async fn get_metrics(&self, entity_id: &str) -> Result<Option<EntityMetrics>>;
    async fn put_metrics_bulk(&self, metrics: Vec<EntityMetrics>) -> Result<()>;
    async fn top_by_pagerank(&self, n: usize) -> Result<Vec<EntityMetrics>>;
    async fn top_by_betweenness(&self, n: usize) -> Result<Vec<EntityMetrics>>;
    async fn top_by_in_degree(&self, n: usize) -> Result<Vec<EntityMetrics>>;
    async fn top_by_out_degree(&self, n: usize) -> Result<Vec<EntityMetrics>>;
    async fn keystones(&self, pagerank_min: f64, in_degree_min: usize)
        -> Result<Vec<EntityMetrics>>;
    async fn bottlenecks(&self, betweenness_min: f64) -> Result<Vec<EntityMetrics>>;

    // Tags
    /// Tags for an entity in stored order.
    async fn tags_for(&self, entity_id: &str) -> Result<Vec<Tag>>;

    // Embeddings
    async fn embedding_count(&self) -> Result<usize>;

    // File index
    async fn list_files(&self) -> Result<Vec<FileRecord>>;
    async fn file_record(&self, path: &str) -> Result<Option<FileRecord>>;

    // Revisions
    /// Opaque identifier of the store's current revision. Sessions use this
    /// to detect graph staleness.
    async fn revision(&self) -> Result<String>;
    /// Resolve a validated ref (commit hash, branch, tag, HEAD[~N]) to a
    /// canonical revision string. Short hashes resolve to long hashes.
    async fn resolve_ref(&self, reference: &str) -> Result<String>;
    /// AS-OF entity query against a historical revision. Implementations must
    /// reject malformed refs with `Invalid` before touching storage.
    async fn query_entities_at(&self, filter: &EntityFilter, reference: &str)
        -> Result<Vec<Entity>>;
}

/// Text embedding capability. The only contract is a stable model version and
/// a fixed output dimension.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
    /// Batch embedding. Implementations cap inner calls at 32 texts and
    /// serialize access to a single-threaded inference path.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
    fn dimension(&self) -> usize;
    fn model_version(&self) -> &str;
}
