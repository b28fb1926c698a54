use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use super::{Embedder, KnowledgePoint, KnowledgeStore, point_id};
use crate::utils::text::truncate_chars;

/// 交给持久化任务的正文上限（字符）
pub const STORE_CONTENT_LIMIT: usize = 5000;

/// 送去向量化的文本上限（字符）
pub const EMBED_INPUT_LIMIT: usize = 2000;

/// 一次入库的结果，仅用于日志与测试
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreStatus {
    Success,
    FailedNoVector,
    Error,
}

impl StoreStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreStatus::Success => "success",
            StoreStatus::FailedNoVector => "failed_no_vector",
            StoreStatus::Error => "error",
        }
    }
}

/// 持久化出口：向量化后写入知识库，任何失败都只记录日志
#[derive(Clone)]
pub struct PersistenceSink {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn KnowledgeStore>,
}

impl PersistenceSink {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn KnowledgeStore>) -> Self {
        Self { embedder, store }
    }

    #[instrument(
        name = "store_knowledge",
        skip_all,
        fields(storage.content_length = content.len(), storage.status = tracing::field::Empty)
    )]
    pub async fn store(&self, content: &str, metadata: BTreeMap<String, String>) -> StoreStatus {
        let status = self.store_inner(content, metadata).await;
        tracing::Span::current().record("storage.status", status.as_str());
        status
    }

    async fn store_inner(&self, content: &str, metadata: BTreeMap<String, String>) -> StoreStatus {
        let id = point_id(content);
        let vector = self
            .embedder
            .embed(truncate_chars(content, EMBED_INPUT_LIMIT))
            .await;
        if vector.is_empty() {
            debug!(id = %id, "no embedding vector, skipping store");
            return StoreStatus::FailedNoVector;
        }

        let mut payload = Map::new();
        payload.insert("content".to_string(), Value::String(content.to_string()));
        for (key, value) in metadata {
            payload.insert(key, Value::String(value));
        }
        payload.insert(
            "ingested_at".to_string(),
            Value::String(chrono::Utc::now().to_rfc3339()),
        );

        match self
            .store
            .upsert(KnowledgePoint {
                id: id.clone(),
                vector,
                payload,
            })
            .await
        {
            Ok(()) => {
                debug!(id = %id, "knowledge stored");
                StoreStatus::Success
            }
            Err(e) => {
                warn!(id = %id, error = ?e, "storage failed");
                StoreStatus::Error
            }
        }
    }
}
