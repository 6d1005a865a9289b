use crate::{DependencyKind, EntityKind, EntityStatus, Language, Visibility};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A code unit tracked by the system.
///
/// IDs are assigned by the store and are unique within a revision. The
/// `(file_path, line_start, name)` triple may collide across languages, so
/// nothing here derives identity from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub name: String,
    pub kind: EntityKind,
    pub language: Option<Language>,
    pub file_path: String,
    pub line_start: u32,
    pub line_end: Option<u32>,
    pub signature: Option<String>,
    pub doc: Option<String>,
    pub receiver: Option<String>,
    pub visibility: Option<Visibility>,
    pub skeleton: Option<String>,
    pub status: EntityStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub body_hash: Option<String>,
    pub signature_hash: Option<String>,
}

impl Entity {
    pub fn new<I, N, P>(id: I, name: N, kind: EntityKind, file_path: P, line_start: u32) -> Self
    where
        I: Into<String>,
        N: Into<String>,
        P: Into<String>,
    {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            language: None,
            file_path: file_path.into(),
            line_start,
            line_end: None,
            signature: None,
            doc: None,
            receiver: None,
            visibility: None,
            skeleton: None,
            status: EntityStatus::Active,
            created_at: now,
            updated_at: now,
            body_hash: None,
            signature_hash: None,
        }
    }

    pub fn with_language(mut self, language: Language) -> Self {
        self.language = Some(language);
        self
    }

    pub fn with_signature<T: Into<String>>(mut self, signature: T) -> Self {
        self.signature = Some(signature.into());
        self
    }

    pub fn with_doc<T: Into<String>>(mut self, doc: T) -> Self {
        self.doc = Some(doc.into());
        self
    }

    pub fn with_line_end(mut self, line_end: u32) -> Self {
        self.line_end = Some(line_end);
        self
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = Some(visibility);
        self
    }

    pub fn with_body_hash<T: Into<String>>(mut self, hash: T) -> Self {
        self.body_hash = Some(hash.into());
        self
    }

    /// Stamp the body hash from the body itself.
    pub fn with_body(mut self, body: &str) -> Self {
        self.body_hash = Some(crate::content_hash(body));
        self
    }

    /// `path:start` when the span is a single line, `path:start-end` otherwise.
    pub fn location(&self) -> String {
        match self.line_end {
            Some(end) if end != self.line_start => {
                format!("{}:{}-{}", self.file_path, self.line_start, end)
            }
            _ => format!("{}:{}", self.file_path, self.line_start),
        }
    }
}

/// A directed, typed edge between two entities.
///
/// `(from, to, kind)` is unique. Dangling `to` references are permitted and
/// behave as sink nodes in analytics.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dependency {
    pub from_id: String,
    pub to_id: String,
    pub kind: DependencyKind,
}

impl Dependency {
    pub fn new<F: Into<String>, T: Into<String>>(from: F, to: T, kind: DependencyKind) -> Self {
        Self {
            from_id: from.into(),
            to_id: to.into(),
            kind,
        }
    }
}

/// Derived per-entity importance scores. Recomputed after each scan and
/// stored separately from the entity row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityMetrics {
    pub entity_id: String,
    pub pagerank: f64,
    pub in_degree: usize,
    pub out_degree: usize,
    pub betweenness: f64,
    pub computed_at: DateTime<Utc>,
}

impl EntityMetrics {
    pub fn zero<T: Into<String>>(entity_id: T) -> Self {
        Self {
            entity_id: entity_id.into(),
            pagerank: 0.0,
            in_degree: 0,
            out_degree: 0,
            betweenness: 0.0,
            computed_at: Utc::now(),
        }
    }
}

/// Per-entity embedding vector tagged with the producing model version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub entity_id: String,
    pub vector: Vec<f32>,
    pub model_version: String,
    /// Body hash of the entity at embedding time.
    pub body_hash: Option<String>,
}

impl EmbeddingRecord {
    /// An embedding is invalid once the entity content or the model changed.
    pub fn is_stale(&self, entity: &Entity, current_model_version: &str) -> bool {
        if self.model_version != current_model_version {
            return true;
        }
        self.body_hash != entity.body_hash
    }
}

/// Ordered tag on an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub entity_id: String,
    pub name: String,
    pub position: usize,
}

/// Relevance multipliers carried by the fixed boost-tag set. Tags outside
/// this table contribute nothing to assembler scoring.
pub const BOOST_TAGS: &[(&str, f32)] = &[
    ("keystone", 2.0),
    ("critical", 2.0),
    ("entry-point", 1.8),
    ("important", 1.5),
    ("core", 1.5),
    ("api", 1.3),
    ("public", 1.2),
];

/// Multiplier for a single tag name, if it is a boost tag.
pub fn boost_tag_multiplier(name: &str) -> Option<f32> {
    BOOST_TAGS
        .iter()
        .find(|(tag, _)| *tag == name)
        .map(|(_, m)| *m)
}

/// Highest-priority boost among a set of tags. Priority follows the
/// multiplier: only one boost ever applies.
pub fn highest_boost<'a, I: IntoIterator<Item = &'a Tag>>(tags: I) -> Option<f32> {
    tags.into_iter()
        .filter_map(|t| boost_tag_multiplier(&t.name))
        .max_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
}

/// File index row used for change detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: String,
    pub content_hash: String,
    pub scanned_at: DateTime<Utc>,
}

impl FileRecord {
    /// Index row for a scanned file. The hash is what the next scan compares
    /// against to decide whether the file changed.
    pub fn new<P: Into<String>>(path: P, content: &str) -> Self {
        Self {
            path: path.into(),
            content_hash: crate::content_hash(content),
            scanned_at: Utc::now(),
        }
    }

    pub fn matches(&self, content: &str) -> bool {
        self.content_hash == crate::content_hash(content)
    }
}

/// Reference to an external system (tracker issue, document, dashboard).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub entity_id: String,
    pub system: String,
    pub reference: String,
}
