use async_trait::async_trait;
use codescope_core::{CodescopeError, Embedder, OllamaConfig, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info};

/// Hard cap on texts per inner batch call, independent of configuration.
const MAX_BATCH: usize = 32;

#[derive(Debug, Serialize)]
struct OllamaEmbeddingRequest {
    model: String,
    prompt: String,
}

#[derive(Debug, Deserialize)]
struct OllamaEmbeddingResponse {
    embedding: Vec<f32>,
}

/// Embedding provider backed by a local Ollama instance.
///
/// The inference path is single-threaded on the Ollama side; the internal
/// mutex serializes concurrent requests so callers can share one embedder
/// across request handlers.
pub struct OllamaEmbedder {
    client: Client,
    config: OllamaConfig,
    dimension: usize,
    inference: tokio::sync::Mutex<()>,
}

impl OllamaEmbedder {
    pub fn new(config: OllamaConfig) -> Self {
        Self::with_dimension(config, 768)
    }

    pub fn with_dimension(config: OllamaConfig, dimension: usize) -> Self {
        Self {
            client: Client::new(),
            config,
            dimension,
            inference: tokio::sync::Mutex::new(()),
        }
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs)
    }

    /// Texts per inner call, clamped to the protocol maximum.
    pub fn effective_batch_size(&self) -> usize {
        self.config.batch_size.clamp(1, MAX_BATCH)
    }

    /// Whether the configured model is loaded in the Ollama instance.
    pub async fn check_availability(&self) -> Result<bool> {
        let url = format!("{}/api/tags", self.config.base_url);
        debug!(%url, "checking ollama availability");

        let response = timeout(Duration::from_secs(5), self.client.get(&url).send())
            .await
            .map_err(|_| CodescopeError::Backend("ollama availability check timed out".into()))?
            .map_err(|e| CodescopeError::Backend(format!("ollama unreachable: {}", e)))?;

        if !response.status().is_success() {
            return Ok(false);
        }

        let models: serde_json::Value = response
            .json()
            .await
            .map_err(|e| CodescopeError::Backend(format!("failed to parse ollama tags: {}", e)))?;

        let available = models["models"]
            .as_array()
            .map(|models| {
                models.iter().any(|model| {
                    model["name"]
                        .as_str()
                        .map(|name| name.contains(&self.config.model))
                        .unwrap_or(false)
                })
            })
            .unwrap_or(false);

        info!(model = %self.config.model, available, "ollama model availability");
        Ok(available)
    }

    async fn request_embedding(&self, text: &str) -> Result<Vec<f32>> {
        let request = OllamaEmbeddingRequest {
            model: self.config.model.clone(),
            prompt: text.to_string(),
        };
        let url = format!("{}/api/embeddings", self.config.base_url);

        let response = timeout(
            self.request_timeout(),
            self.client.post(&url).json(&request).send(),
        )
        .await
        .map_err(|_| {
            CodescopeError::Backend(format!(
                "ollama embedding timed out after {}s",
                self.config.timeout_secs
            ))
        })?
        .map_err(|e| CodescopeError::Backend(format!("ollama request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(CodescopeError::Backend(format!(
                "ollama returned status {}",
                response.status().as_u16()
            )));
        }

        let body: OllamaEmbeddingResponse = response.json().await.map_err(|e| {
            CodescopeError::Backend(format!("failed to parse ollama embedding response: {}", e))
        })?;

        debug!(dimension = body.embedding.len(), "embedding generated");
        Ok(body.embedding)
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let _guard = self.inference.lock().await;
        self.request_embedding(text).await
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.effective_batch_size()) {
            let _guard = self.inference.lock().await;
            for text in batch {
                embeddings.push(self.request_embedding(text).await?);
            }
        }
        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_version(&self) -> &str {
        &self.config.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> OllamaConfig {
        OllamaConfig {
            model: "nomic-embed-text".into(),
            base_url: "http://localhost:11434".into(),
            timeout_secs: 60,
            batch_size: 32,
        }
    }

    #[test]
    fn model_name_doubles_as_version_tag() {
        let embedder = OllamaEmbedder::new(config());
        assert_eq!(embedder.model_version(), "nomic-embed-text");
        assert_eq!(embedder.dimension(), 768);
    }

    #[test]
    fn batch_size_is_capped_at_protocol_limit() {
        let mut oversized = config();
        oversized.batch_size = 500;
        assert_eq!(OllamaEmbedder::new(oversized).effective_batch_size(), 32);

        let mut zero = config();
        zero.batch_size = 0;
        assert_eq!(OllamaEmbedder::new(zero).effective_batch_size(), 1);
    }

    #[tokio::test]
    async fn empty_batch_short_circuits_without_io() {
        let embedder = OllamaEmbedder::new(config());
        let result = embedder.embed_batch(&[]).await.unwrap();
        assert!(result.is_empty());
    }
}
