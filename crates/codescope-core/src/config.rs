use crate::{CodescopeError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Parameters for the metrics engine. Thresholds are tunable; the defaults
/// are the ones every downstream classification is calibrated against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "MetricsConfig::default_damping")]
    pub damping: f64,
    #[serde(default = "MetricsConfig::default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default = "MetricsConfig::default_tolerance")]
    pub tolerance: f64,
    #[serde(default = "MetricsConfig::default_critical_threshold")]
    pub critical_threshold: f64,
    #[serde(default = "MetricsConfig::default_high_threshold")]
    pub high_threshold: f64,
    #[serde(default = "MetricsConfig::default_medium_threshold")]
    pub medium_threshold: f64,
    #[serde(default = "MetricsConfig::default_keystone_pagerank")]
    pub keystone_pagerank: f64,
    #[serde(default = "MetricsConfig::default_keystone_in_degree")]
    pub keystone_in_degree: usize,
    #[serde(default = "MetricsConfig::default_bottleneck_betweenness")]
    pub bottleneck_betweenness: f64,
}

impl MetricsConfig {
    fn default_damping() -> f64 {
        0.85
    }
    fn default_max_iterations() -> usize {
        100
    }
    fn default_tolerance() -> f64 {
        1e-4
    }
    fn default_critical_threshold() -> f64 {
        0.50
    }
    fn default_high_threshold() -> f64 {
        0.30
    }
    fn default_medium_threshold() -> f64 {
        0.10
    }
    fn default_keystone_pagerank() -> f64 {
        0.30
    }
    fn default_keystone_in_degree() -> usize {
        5
    }
    fn default_bottleneck_betweenness() -> f64 {
        0.20
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            damping: Self::default_damping(),
            max_iterations: Self::default_max_iterations(),
            tolerance: Self::default_tolerance(),
            critical_threshold: Self::default_critical_threshold(),
            high_threshold: Self::default_high_threshold(),
            medium_threshold: Self::default_medium_threshold(),
            keystone_pagerank: Self::default_keystone_pagerank(),
            keystone_in_degree: Self::default_keystone_in_degree(),
            bottleneck_betweenness: Self::default_bottleneck_betweenness(),
        }
    }
}

/// Weights for merging lexical and semantic entry-point candidates.
/// Must sum to 1.0; the semantic weight carries the most influence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HybridConfig {
    #[serde(default = "HybridConfig::default_semantic_weight")]
    pub semantic_weight: f64,
    #[serde(default = "HybridConfig::default_keyword_weight")]
    pub keyword_weight: f64,
    #[serde(default = "HybridConfig::default_pagerank_weight")]
    pub pagerank_weight: f64,
    #[serde(default = "HybridConfig::default_search_limit")]
    pub search_limit: usize,
    #[serde(default)]
    pub disable_semantic: bool,
}

impl HybridConfig {
    fn default_semantic_weight() -> f64 {
        0.5
    }
    fn default_keyword_weight() -> f64 {
        0.3
    }
    fn default_pagerank_weight() -> f64 {
        0.2
    }
    fn default_search_limit() -> usize {
        20
    }

    pub fn validate(&self) -> Result<()> {
        let sum = self.semantic_weight + self.keyword_weight + self.pagerank_weight;
        if !(0.99..=1.01).contains(&sum) {
            return Err(CodescopeError::Invalid(format!(
                "hybrid weights must sum to 1.0, got {:.3}",
                sum
            )));
        }
        Ok(())
    }
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            semantic_weight: Self::default_semantic_weight(),
            keyword_weight: Self::default_keyword_weight(),
            pagerank_weight: Self::default_pagerank_weight(),
            search_limit: Self::default_search_limit(),
            disable_semantic: false,
        }
    }
}

/// Budget and boost knobs for the context assembler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblerConfig {
    #[serde(default = "AssemblerConfig::default_token_budget")]
    pub token_budget: usize,
    #[serde(default = "AssemblerConfig::default_max_hop_depth")]
    pub max_hop_depth: usize,
    #[serde(default = "AssemblerConfig::default_keystone_boost")]
    pub keystone_boost: f64,
    #[serde(default = "AssemblerConfig::default_tag_boost")]
    pub tag_boost: f64,
}

impl AssemblerConfig {
    fn default_token_budget() -> usize {
        4000
    }
    fn default_max_hop_depth() -> usize {
        2
    }
    fn default_keystone_boost() -> f64 {
        2.0
    }
    fn default_tag_boost() -> f64 {
        1.5
    }
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            token_budget: Self::default_token_budget(),
            max_hop_depth: Self::default_max_hop_depth(),
            keystone_boost: Self::default_keystone_boost(),
            tag_boost: Self::default_tag_boost(),
        }
    }
}

/// Dispatcher limits. The poll tick is clamped to 30 s so the idle watcher
/// never busy-loops.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Shut down after this many seconds without a tool call. `None` disables
    /// the idle watcher.
    #[serde(default)]
    pub idle_timeout_secs: Option<u64>,
    #[serde(default = "DispatcherConfig::default_poll_tick_secs")]
    pub poll_tick_secs: u64,
    #[serde(default = "DispatcherConfig::default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "DispatcherConfig::default_cache_enabled")]
    pub cache_enabled: bool,
    #[serde(default = "DispatcherConfig::default_cache_size")]
    pub cache_size: usize,
    #[serde(default = "DispatcherConfig::default_max_result_bytes")]
    pub max_result_bytes: usize,
}

impl DispatcherConfig {
    fn default_poll_tick_secs() -> u64 {
        30
    }
    fn default_request_timeout_secs() -> u64 {
        60
    }
    fn default_cache_enabled() -> bool {
        true
    }
    fn default_cache_size() -> usize {
        100
    }
    fn default_max_result_bytes() -> usize {
        200_000
    }

    pub fn poll_tick_secs(&self) -> u64 {
        self.poll_tick_secs.max(30)
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: None,
            poll_tick_secs: Self::default_poll_tick_secs(),
            request_timeout_secs: Self::default_request_timeout_secs(),
            cache_enabled: Self::default_cache_enabled(),
            cache_size: Self::default_cache_size(),
            max_result_bytes: Self::default_max_result_bytes(),
        }
    }
}

/// Connection settings for the Ollama embedding sidecar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    #[serde(default = "OllamaConfig::default_model")]
    pub model: String,
    #[serde(default = "OllamaConfig::default_base_url")]
    pub base_url: String,
    #[serde(default = "OllamaConfig::default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "OllamaConfig::default_batch_size")]
    pub batch_size: usize,
}

impl OllamaConfig {
    fn default_model() -> String {
        std::env::var("CODESCOPE_EMBEDDING_MODEL")
            .unwrap_or_else(|_| "nomic-embed-text".to_string())
    }
    fn default_base_url() -> String {
        std::env::var("CODESCOPE_OLLAMA_URL")
            .unwrap_or_else(|_| "http://localhost:11434".to_string())
    }
    fn default_timeout_secs() -> u64 {
        60
    }
    fn default_batch_size() -> usize {
        32
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            model: Self::default_model(),
            base_url: Self::default_base_url(),
            timeout_secs: Self::default_timeout_secs(),
            batch_size: Self::default_batch_size(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CodescopeConfig {
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub hybrid: HybridConfig,
    #[serde(default)]
    pub assembler: AssemblerConfig,
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
    #[serde(default)]
    pub ollama: OllamaConfig,
}

impl CodescopeConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: CodescopeConfig = toml::from_str(&raw)
            .map_err(|e| CodescopeError::Invalid(format!("malformed config: {}", e)))?;
        config.hybrid.validate()?;
        Ok(config)
    }
}
