use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{instrument, warn};

use super::Embedder;
use crate::config::EmbeddingConfig;

/// 基于Ollama `/api/embeddings` 的向量化客户端
pub struct OllamaEmbedder {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    embedding: Vec<f32>,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }

    async fn request_embedding(&self, text: &str) -> Result<Vec<f32>> {
        let response = self
            .client
            .post(format!("{}/api/embeddings", self.base_url))
            .json(&serde_json::json!({
                "model": self.model,
                "prompt": text,
            }))
            .send()
            .await
            .context("Embedding request failed")?
            .error_for_status()
            .context("Embedding service returned an error status")?;

        let body: EmbeddingResponse = response
            .json()
            .await
            .context("Failed to parse embedding response")?;
        Ok(body.embedding)
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    #[instrument(name = "generate_embedding", skip_all, fields(embedding.model = %self.model))]
    async fn embed(&self, text: &str) -> Vec<f32> {
        match self.request_embedding(text).await {
            Ok(vector) => vector,
            Err(e) => {
                warn!(error = ?e, "embedding unavailable");
                Vec::new()
            }
        }
    }
}
