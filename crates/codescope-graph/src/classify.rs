use codescope_core::MetricsConfig;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportanceLevel {
    Critical,
    High,
    Medium,
    Low,
}

impl fmt::Display for ImportanceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ImportanceLevel::Critical => "critical",
            ImportanceLevel::High => "high",
            ImportanceLevel::Medium => "medium",
            ImportanceLevel::Low => "low",
        };
        write!(f, "{}", s)
    }
}

/// Bucket a pagerank score against the configured thresholds.
pub fn classify_importance(pagerank: f64, config: &MetricsConfig) -> ImportanceLevel {
    if pagerank >= config.critical_threshold {
        ImportanceLevel::Critical
    } else if pagerank >= config.high_threshold {
        ImportanceLevel::High
    } else if pagerank >= config.medium_threshold {
        ImportanceLevel::Medium
    } else {
        ImportanceLevel::Low
    }
}

/// Authoritative keystone definition: high rank AND heavily depended upon.
pub fn is_keystone(pagerank: f64, in_degree: usize, config: &MetricsConfig) -> bool {
    pagerank >= config.keystone_pagerank && in_degree >= config.keystone_in_degree
}

pub fn is_bottleneck(betweenness: f64, config: &MetricsConfig) -> bool {
    betweenness >= config.bottleneck_betweenness
}
