//! 知识库 - 向量化与持久化协作方
//!
//! 调研流程只通过这里的两个窄接口访问外部服务：
//! [`Embedder`] 负责文本向量化，[`KnowledgeStore`] 负责按ID写入。

use anyhow::Result;
use async_trait::async_trait;
use md5::{Digest, Md5};
use serde::Serialize;
use serde_json::{Map, Value};

pub mod fallback;
pub mod ollama;
pub mod qdrant;
pub mod sink;

pub use fallback::{FallbackStore, LocalJsonStore};
pub use ollama::OllamaEmbedder;
pub use qdrant::QdrantStore;
pub use sink::{PersistenceSink, StoreStatus};

/// 文本向量化
#[async_trait]
pub trait Embedder: Send + Sync {
    /// 服务不可用或出错时返回空向量，不返回错误
    async fn embed(&self, text: &str) -> Vec<f32>;
}

/// 知识库写入
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    async fn upsert(&self, point: KnowledgePoint) -> Result<()>;
}

/// 一条待写入的知识
#[derive(Debug, Clone, Serialize)]
pub struct KnowledgePoint {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: Map<String, Value>,
}

/// 由内容MD5派生的稳定ID（UUID格式），相同内容重复写入时覆盖而不是新增
pub fn point_id(content: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(content.as_bytes());
    let digest = hasher.finalize();

    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest);
    uuid::Uuid::from_bytes(bytes).to_string()
}
