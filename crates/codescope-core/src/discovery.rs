use crate::{Entity, EntityKind, EntityStatus, EntryPointSource, Language, TaskPattern};
use serde::{Deserialize, Serialize};

/// Classified shape of a free-text task description. Ephemeral: owned by the
/// assembler session, never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    /// Action word that matched the verb table, empty when none did.
    pub action_verb: String,
    pub pattern: TaskPattern,
    /// Generic vocabulary words, lowercased, deduplicated.
    pub keywords: Vec<String>,
    /// Words that look like identifiers (mixed case or underscores in the
    /// original text), lowercased, deduplicated.
    pub identifier_keywords: Vec<String>,
    /// Identifier-shaped mentions extracted from the case-preserving text.
    pub entity_mentions: Vec<String>,
}

/// Candidate starting entity discovered from a task description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryPoint {
    pub entity: Entity,
    pub relevance: f64,
    pub source: EntryPointSource,
    pub keyword_score: f64,
    pub semantic_score: f64,
    pub pagerank: f64,
    pub is_keystone: bool,
    pub reason: String,
}

/// Entry point promoted into the assembled result set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelevantEntity {
    pub entity: Entity,
    pub relevance: f64,
    /// Hop distance from the originating entry point.
    pub hop: usize,
    pub is_keystone: bool,
    pub estimated_tokens: usize,
    /// Why this entity was selected, captured at admission time.
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExcludedEntity {
    pub id: String,
    pub name: String,
    pub reason: String,
}

/// Lexical search hit. `combined_score` is opaque to callers: the store
/// blends name match, signature match and pagerank internally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub entity: Entity,
    pub combined_score: f64,
    pub pagerank: f64,
}

/// Vector similarity hit; cosine similarity in [-1, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarHit {
    pub entity_id: String,
    pub similarity: f32,
}

/// Filter for entity queries. All present fields must match.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityFilter {
    pub kind: Option<EntityKind>,
    pub status: Option<EntityStatus>,
    pub file_path: Option<String>,
    pub file_path_prefix: Option<String>,
    pub file_path_suffix: Option<String>,
    pub name_contains: Option<String>,
    pub language: Option<Language>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl EntityFilter {
    pub fn matches(&self, entity: &Entity) -> bool {
        if let Some(kind) = &self.kind {
            if entity.kind != *kind {
                return false;
            }
        }
        if let Some(status) = &self.status {
            if entity.status != *status {
                return false;
            }
        }
        if let Some(path) = &self.file_path {
            if entity.file_path != *path {
                return false;
            }
        }
        if let Some(prefix) = &self.file_path_prefix {
            if !entity.file_path.starts_with(prefix.as_str()) {
                return false;
            }
        }
        if let Some(suffix) = &self.file_path_suffix {
            if !entity.file_path.ends_with(suffix.as_str()) {
                return false;
            }
        }
        if let Some(needle) = &self.name_contains {
            if !entity
                .name
                .to_lowercase()
                .contains(&needle.to_lowercase())
            {
                return false;
            }
        }
        if let Some(language) = &self.language {
            match &entity.language {
                Some(l) if l == language => {}
                _ => return false,
            }
        }
        true
    }
}
