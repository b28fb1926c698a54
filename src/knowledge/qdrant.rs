use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{KnowledgePoint, KnowledgeStore};
use crate::config::KnowledgeConfig;

/// 基于Qdrant REST接口的知识库
pub struct QdrantStore {
    client: reqwest::Client,
    base_url: String,
    collection: String,
    vector_size: usize,
}

impl QdrantStore {
    pub fn new(config: &KnowledgeConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: config.qdrant_url.trim_end_matches('/').to_string(),
            collection: config.collection.clone(),
            vector_size: config.vector_size,
        })
    }

    /// 创建客户端并确保集合存在；检查失败只记录告警，服务稍后可用时仍可写入
    pub async fn connect(config: &KnowledgeConfig) -> Result<Self> {
        let store = Self::new(config)?;
        if let Err(e) = store.ensure_collection().await {
            warn!(error = ?e, collection = %store.collection, "qdrant setup check failed");
        }
        Ok(store)
    }

    fn collection_url(&self) -> String {
        format!("{}/collections/{}", self.base_url, self.collection)
    }

    /// 集合不存在时按配置的维度与余弦距离创建
    pub async fn ensure_collection(&self) -> Result<()> {
        let response = self
            .client
            .get(self.collection_url())
            .send()
            .await
            .context("Failed to reach qdrant")?;

        match response.status() {
            status if status.is_success() => {
                debug!(collection = %self.collection, "qdrant collection exists");
                Ok(())
            }
            StatusCode::NOT_FOUND => {
                self.client
                    .put(self.collection_url())
                    .json(&serde_json::json!({
                        "vectors": {
                            "size": self.vector_size,
                            "distance": "Cosine",
                        }
                    }))
                    .send()
                    .await
                    .context("Failed to create qdrant collection")?
                    .error_for_status()
                    .context("Qdrant rejected collection creation")?;
                info!(collection = %self.collection, size = self.vector_size, "qdrant collection created");
                Ok(())
            }
            status => Err(anyhow!("Unexpected qdrant status {}", status)),
        }
    }
}

#[async_trait]
impl KnowledgeStore for QdrantStore {
    async fn upsert(&self, point: KnowledgePoint) -> Result<()> {
        self.client
            .put(format!("{}/points", self.collection_url()))
            .query(&[("wait", "true")])
            .json(&serde_json::json!({ "points": [point] }))
            .send()
            .await
            .context("Qdrant upsert request failed")?
            .error_for_status()
            .context("Qdrant rejected upsert")?;
        Ok(())
    }
}
