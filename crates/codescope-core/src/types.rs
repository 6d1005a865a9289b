use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type EntityId = String;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Function,
    Method,
    Type,
    Struct,
    Interface,
    Constant,
    Variable,
    Enum,
    Module,
    Package,
    Other(String),
}

impl EntityKind {
    /// Single-letter codes accepted by the `find` and `map` tools.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "F" => Some(EntityKind::Function),
            "M" => Some(EntityKind::Method),
            "T" => Some(EntityKind::Type),
            "C" => Some(EntityKind::Constant),
            "V" => Some(EntityKind::Variable),
            _ => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntityKind::Function => "function",
            EntityKind::Method => "method",
            EntityKind::Type => "type",
            EntityKind::Struct => "struct",
            EntityKind::Interface => "interface",
            EntityKind::Constant => "constant",
            EntityKind::Variable => "variable",
            EntityKind::Enum => "enum",
            EntityKind::Module => "module",
            EntityKind::Package => "package",
            EntityKind::Other(s) => s.as_str(),
        };
        write!(f, "{}", s)
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "function" => Ok(EntityKind::Function),
            "method" => Ok(EntityKind::Method),
            "type" => Ok(EntityKind::Type),
            "struct" => Ok(EntityKind::Struct),
            "interface" => Ok(EntityKind::Interface),
            "constant" => Ok(EntityKind::Constant),
            "variable" => Ok(EntityKind::Variable),
            "enum" => Ok(EntityKind::Enum),
            "module" => Ok(EntityKind::Module),
            "package" => Ok(EntityKind::Package),
            other => Ok(EntityKind::Other(other.to_string())),
        }
    }
}

/// Directed relationship kinds. Code kinds participate in graph analytics,
/// the rest are workflow links carried by the store but never traversed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    Calls,
    UsesType,
    Imports,
    Extends,
    Implements,
    References,
    Blocks,
    BlockedBy,
    Related,
    Parent,
    Child,
}

impl DependencyKind {
    pub fn is_code(&self) -> bool {
        matches!(
            self,
            DependencyKind::Calls
                | DependencyKind::UsesType
                | DependencyKind::Imports
                | DependencyKind::Extends
                | DependencyKind::Implements
                | DependencyKind::References
        )
    }
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DependencyKind::Calls => "calls",
            DependencyKind::UsesType => "uses_type",
            DependencyKind::Imports => "imports",
            DependencyKind::Extends => "extends",
            DependencyKind::Implements => "implements",
            DependencyKind::References => "references",
            DependencyKind::Blocks => "blocks",
            DependencyKind::BlockedBy => "blocked_by",
            DependencyKind::Related => "related",
            DependencyKind::Parent => "parent",
            DependencyKind::Child => "child",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for DependencyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "calls" => Ok(DependencyKind::Calls),
            "uses_type" => Ok(DependencyKind::UsesType),
            "imports" => Ok(DependencyKind::Imports),
            "extends" => Ok(DependencyKind::Extends),
            "implements" => Ok(DependencyKind::Implements),
            "references" => Ok(DependencyKind::References),
            "blocks" => Ok(DependencyKind::Blocks),
            "blocked_by" => Ok(DependencyKind::BlockedBy),
            "related" => Ok(DependencyKind::Related),
            "parent" => Ok(DependencyKind::Parent),
            "child" => Ok(DependencyKind::Child),
            other => Err(format!("unknown dependency kind: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    Go,
    TypeScript,
    JavaScript,
    Python,
    Rust,
    Java,
    Kotlin,
    Cpp,
    C,
    CSharp,
    Ruby,
    Php,
    Other(String),
}

impl Language {
    /// Normalize an input language code to its canonical family.
    /// Unknown codes are preserved verbatim under `Other`.
    pub fn from_code(code: &str) -> Self {
        match code.to_lowercase().as_str() {
            "go" => Language::Go,
            "typescript" | "ts" => Language::TypeScript,
            "javascript" | "js" => Language::JavaScript,
            "python" | "py" => Language::Python,
            "rust" | "rs" => Language::Rust,
            "java" => Language::Java,
            "kotlin" => Language::Kotlin,
            "cpp" => Language::Cpp,
            "c" => Language::C,
            "csharp" => Language::CSharp,
            "ruby" => Language::Ruby,
            "php" => Language::Php,
            other => Language::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Language::Go => "go",
            Language::TypeScript => "typescript",
            Language::JavaScript => "javascript",
            Language::Python => "python",
            Language::Rust => "rust",
            Language::Java => "java",
            Language::Kotlin => "kotlin",
            Language::Cpp => "cpp",
            Language::C => "c",
            Language::CSharp => "csharp",
            Language::Ruby => "ruby",
            Language::Php => "php",
            Language::Other(s) => s.as_str(),
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Private,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityStatus {
    Active,
    Archived,
}

/// Closed set of task shapes an agent request can be classified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPattern {
    AddFeature,
    FixBug,
    Modify,
    Refactor,
    Optimize,
    Remove,
    Test,
    Document,
}

impl Default for TaskPattern {
    fn default() -> Self {
        TaskPattern::Modify
    }
}

impl fmt::Display for TaskPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskPattern::AddFeature => "add_feature",
            TaskPattern::FixBug => "fix_bug",
            TaskPattern::Modify => "modify",
            TaskPattern::Refactor => "refactor",
            TaskPattern::Optimize => "optimize",
            TaskPattern::Remove => "remove",
            TaskPattern::Test => "test",
            TaskPattern::Document => "document",
        };
        write!(f, "{}", s)
    }
}

/// How an entry-point candidate was discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryPointSource {
    ExplicitMention,
    KeywordMatch,
    SemanticMatch,
    HybridMatch,
}

impl fmt::Display for EntryPointSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntryPointSource::ExplicitMention => "explicit_mention",
            EntryPointSource::KeywordMatch => "keyword_match",
            EntryPointSource::SemanticMatch => "semantic_match",
            EntryPointSource::HybridMatch => "hybrid_match",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dependency_kinds_partition_into_code_and_workflow() {
        assert!(DependencyKind::Calls.is_code());
        assert!(DependencyKind::UsesType.is_code());
        assert!(DependencyKind::References.is_code());
        assert!(!DependencyKind::Blocks.is_code());
        assert!(!DependencyKind::Parent.is_code());
        assert!(!DependencyKind::Related.is_code());
    }

    #[test]
    fn language_codes_normalize_to_canonical_families() {
        assert_eq!(Language::from_code("ts"), Language::TypeScript);
        assert_eq!(Language::from_code("TS"), Language::TypeScript);
        assert_eq!(Language::from_code("py"), Language::Python);
        assert_eq!(Language::from_code("rs"), Language::Rust);
        assert_eq!(Language::from_code("go"), Language::Go);
        assert_eq!(
            Language::from_code("zig"),
            Language::Other("zig".to_string())
        );
        assert_eq!(Language::TypeScript.to_string(), "typescript");
    }

    #[test]
    fn entity_kind_codes_match_tool_surface() {
        assert_eq!(EntityKind::from_code("F"), Some(EntityKind::Function));
        assert_eq!(EntityKind::from_code("M"), Some(EntityKind::Method));
        assert_eq!(EntityKind::from_code("T"), Some(EntityKind::Type));
        assert_eq!(EntityKind::from_code("C"), Some(EntityKind::Constant));
        assert_eq!(EntityKind::from_code("V"), Some(EntityKind::Variable));
        assert_eq!(EntityKind::from_code("X"), None);
    }

    #[test]
    fn dependency_kind_round_trips_through_strings() {
        for kind in [
            DependencyKind::Calls,
            DependencyKind::UsesType,
            DependencyKind::BlockedBy,
        ] {
            let parsed: DependencyKind = kind.to_string().parse().unwrap();
            assert_eq!(parsed, kind);
        }
        assert!("owns".parse::<DependencyKind>().is_err());
    }

    #[test]
    fn task_pattern_defaults_to_modify() {
        assert_eq!(TaskPattern::default(), TaskPattern::Modify);
        assert_eq!(TaskPattern::AddFeature.to_string(), "add_feature");
    }
}
