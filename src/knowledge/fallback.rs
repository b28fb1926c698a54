use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{KnowledgePoint, KnowledgeStore};

/// 本地兜底文件保留的最大条目数
pub const LOCAL_FALLBACK_CAPACITY: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalEntry {
    pub content: String,
    pub metadata: Map<String, Value>,
}

/// 本地JSON兜底存储，只保留最近的若干条
pub struct LocalJsonStore {
    path: PathBuf,
    capacity: usize,
    write_lock: Mutex<()>,
}

impl LocalJsonStore {
    pub fn new(path: PathBuf) -> Self {
        Self::with_capacity(path, LOCAL_FALLBACK_CAPACITY)
    }

    pub fn with_capacity(path: PathBuf, capacity: usize) -> Self {
        Self {
            path,
            capacity,
            write_lock: Mutex::new(()),
        }
    }

    /// 读取现有条目；文件不存在或损坏时视为空
    pub async fn entries(&self) -> Vec<LocalEntry> {
        match fs::read_to_string(&self.path).await {
            Ok(content) => serde_json::from_str(&content).unwrap_or_default(),
            Err(_) => Vec::new(),
        }
    }

    pub async fn append(&self, point: &KnowledgePoint) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut metadata = point.payload.clone();
        let content = match metadata.remove("content") {
            Some(Value::String(content)) => content,
            _ => String::new(),
        };

        let mut entries = self.entries().await;
        entries.push(LocalEntry { content, metadata });
        if entries.len() > self.capacity {
            let overflow = entries.len() - self.capacity;
            entries.drain(..overflow);
        }

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await?;
        }
        let serialized = serde_json::to_string(&entries)?;
        fs::write(&self.path, serialized)
            .await
            .context(format!("Failed to write fallback file: {:?}", self.path))?;
        debug!(path = ?self.path, entries = entries.len(), "stored to local fallback");
        Ok(())
    }
}

/// 主存储写入失败时转存到本地文件
pub struct FallbackStore {
    primary: Arc<dyn KnowledgeStore>,
    local: LocalJsonStore,
}

impl FallbackStore {
    pub fn new(primary: Arc<dyn KnowledgeStore>, local: LocalJsonStore) -> Self {
        Self { primary, local }
    }
}

#[async_trait]
impl KnowledgeStore for FallbackStore {
    async fn upsert(&self, point: KnowledgePoint) -> Result<()> {
        match self.primary.upsert(point.clone()).await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(error = ?e, "primary knowledge store failed, using local fallback");
                self.local.append(&point).await
            }
        }
    }
}
