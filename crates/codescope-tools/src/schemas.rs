// ABOUTME: Tool schemas for the query dispatch surface
// ABOUTME: JSON schemas for agentic tool calling - parameters and descriptions for LLM consumption

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

/// Tool schema for agentic function calling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: JsonValue,
}

/// Schemas for the eight dispatch tools.
pub struct CodescopeToolSchemas;

impl CodescopeToolSchemas {
    pub fn all() -> Vec<ToolSchema> {
        vec![
            Self::find(),
            Self::show(),
            Self::map(),
            Self::impact(),
            Self::safe(),
            Self::context(),
            Self::gaps(),
            Self::diff(),
        ]
    }

    pub fn find() -> ToolSchema {
        ToolSchema {
            name: "find".to_string(),
            description: "Find entities by name pattern. Lexical search blending name match, \
                signature match and importance; optionally restricted to one entity kind."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "pattern": {
                        "type": "string",
                        "description": "Name or phrase to search for"
                    },
                    "type": {
                        "type": "string",
                        "description": "Entity kind restriction",
                        "enum": ["F", "T", "M", "C", "V"]
                    },
                    "limit": {
                        "type": "integer",
                        "description": "Maximum number of results (defaults to 20)",
                        "minimum": 1,
                        "default": 20
                    }
                },
                "required": ["pattern"]
            }),
        }
    }

    pub fn show() -> ToolSchema {
        ToolSchema {
            name: "show".to_string(),
            description: "Show one entity: kind, location, signature, relationships, and at \
                dense density its metrics, hashes and timestamps."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "name": {
                        "type": "string",
                        "description": "Entity ID or name"
                    },
                    "density": {
                        "type": "string",
                        "description": "Field inclusion level (defaults to medium)",
                        "enum": ["sparse", "medium", "dense"],
                        "default": "medium"
                    },
                    "coverage": {
                        "type": "boolean",
                        "description": "Include coverage status (reported as unknown)",
                        "default": false
                    }
                },
                "required": ["name"]
            }),
        }
    }

    pub fn map() -> ToolSchema {
        ToolSchema {
            name: "map".to_string(),
            description: "Map entities grouped by file, optionally under a path prefix, \
                restricted to one entity kind or language."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "Path prefix to map (defaults to the whole repository)"
                    },
                    "filter": {
                        "type": "string",
                        "description": "Entity kind restriction",
                        "enum": ["F", "T", "M", "C"]
                    },
                    "lang": {
                        "type": "string",
                        "description": "Language code (go, ts, py, rs, ...)"
                    }
                },
                "required": []
            }),
        }
    }

    pub fn impact() -> ToolSchema {
        ToolSchema {
            name: "impact".to_string(),
            description: "Blast-radius analysis: everything that transitively depends on the \
                target, with risk classification. Target is a file path or entity name."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "target": {
                        "type": "string",
                        "description": "File path or entity name to analyze"
                    },
                    "depth": {
                        "type": "integer",
                        "description": "Maximum predecessor depth (defaults to 3)",
                        "minimum": 1,
                        "maximum": 10,
                        "default": 3
                    },
                    "threshold": {
                        "type": "number",
                        "description": "Minimum pagerank for reported affected entities",
                        "minimum": 0.0,
                        "default": 0.0
                    }
                },
                "required": ["target"]
            }),
        }
    }

    pub fn safe() -> ToolSchema {
        ToolSchema {
            name: "safe".to_string(),
            description: "Safety assessment for changing a target: blast radius, keystone \
                gaps, risk level and concrete recommendations."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "target": {
                        "type": "string",
                        "description": "File path or entity name to assess"
                    },
                    "quick": {
                        "type": "boolean",
                        "description": "Skip gap analysis and recommendations",
                        "default": false
                    },
                    "depth": {
                        "type": "integer",
                        "description": "Maximum predecessor depth (defaults to 3)",
                        "minimum": 1,
                        "maximum": 10,
                        "default": 3
                    }
                },
                "required": ["target"]
            }),
        }
    }

    pub fn context() -> ToolSchema {
        ToolSchema {
            name: "context".to_string(),
            description: "Assemble focused context for a task under a token budget: intent \
                extraction, hybrid entry-point discovery, and bounded graph expansion."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "smart": {
                        "type": "string",
                        "description": "Free-text task description to assemble context for"
                    },
                    "target": {
                        "type": "string",
                        "description": "Entity name to assemble context around"
                    },
                    "budget": {
                        "type": "integer",
                        "description": "Token budget (defaults to 4000)",
                        "minimum": 100,
                        "default": 4000
                    },
                    "depth": {
                        "type": "integer",
                        "description": "Maximum hop depth (defaults to 2)",
                        "minimum": 1,
                        "maximum": 5,
                        "default": 2
                    }
                },
                "required": []
            }),
        }
    }

    pub fn gaps() -> ToolSchema {
        ToolSchema {
            name: "gaps".to_string(),
            description: "Report potential coverage gaps. Coverage data is not populated, so \
                important entities are reported with coverage unknown."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "keystones_only": {
                        "type": "boolean",
                        "description": "Restrict to keystone entities",
                        "default": false
                    },
                    "threshold": {
                        "type": "integer",
                        "description": "Coverage percentage threshold (defaults to 50)",
                        "minimum": 0,
                        "maximum": 100,
                        "default": 50
                    }
                },
                "required": []
            }),
        }
    }

    pub fn diff() -> ToolSchema {
        ToolSchema {
            name: "diff".to_string(),
            description: "Report the file index status: scanned files with content hashes, \
                optionally restricted to one file."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "file": {
                        "type": "string",
                        "description": "Restrict the report to one file path"
                    },
                    "detailed": {
                        "type": "boolean",
                        "description": "Include per-file hashes and scan times",
                        "default": false
                    }
                },
                "required": []
            }),
        }
    }

    pub fn get_by_name(name: &str) -> Option<ToolSchema> {
        Self::all().into_iter().find(|s| s.name == name)
    }

    pub fn tool_names() -> Vec<String> {
        Self::all().into_iter().map(|s| s.name).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_eight_tools_have_valid_schemas() {
        let schemas = CodescopeToolSchemas::all();
        assert_eq!(schemas.len(), 8);
        for schema in schemas {
            assert!(!schema.name.is_empty());
            assert!(!schema.description.is_empty());
            assert!(schema.parameters.is_object());
            assert!(schema.parameters.get("required").is_some());
        }
    }

    #[test]
    fn names_match_the_dispatch_surface() {
        let names = CodescopeToolSchemas::tool_names();
        assert_eq!(
            names,
            vec!["find", "show", "map", "impact", "safe", "context", "gaps", "diff"]
        );
    }

    #[test]
    fn lookup_by_name_round_trips() {
        assert!(CodescopeToolSchemas::get_by_name("impact").is_some());
        assert!(CodescopeToolSchemas::get_by_name("nonexistent").is_none());
    }
}
