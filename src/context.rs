use std::sync::Arc;

use tracing::info;

use crate::config::{Config, KnowledgeConfig};
use crate::error::{ResearchError, ResearchResult};
use crate::knowledge::{
    FallbackStore, KnowledgeStore, LocalJsonStore, OllamaEmbedder, PersistenceSink, QdrantStore,
};
use crate::llm::LLMClient;
use crate::research::ResearchOrchestrator;
use crate::search::SearchAdapter;

/// 运行期上下文：按配置装配好的编排器与配置本身
#[derive(Clone)]
pub struct ResearchContext {
    /// 调研编排器，可在多次调研之间复用
    pub orchestrator: ResearchOrchestrator,
    /// 配置
    pub config: Config,
}

impl ResearchContext {
    /// 根据配置创建各协作方客户端
    pub async fn from_config(config: Config) -> ResearchResult<Self> {
        let llm_client = LLMClient::new(config.llm.clone())
            .map_err(|e| ResearchError::Config(format!("llm client: {:#}", e)))?;
        let search = SearchAdapter::from_config(&config.search)
            .map_err(|e| ResearchError::Config(format!("search backends: {:#}", e)))?;

        let sink = if config.knowledge.enabled {
            Some(build_sink(&config).await?)
        } else {
            info!("knowledge persistence disabled");
            None
        };

        let orchestrator = ResearchOrchestrator::new(Arc::new(llm_client), search, sink);
        Ok(Self {
            orchestrator,
            config,
        })
    }
}

async fn build_sink(config: &Config) -> ResearchResult<PersistenceSink> {
    let embedder = OllamaEmbedder::new(&config.embedding)
        .map_err(|e| ResearchError::Config(format!("embedding client: {:#}", e)))?;
    let store = build_store(&config.knowledge).await?;
    Ok(PersistenceSink::new(Arc::new(embedder), store))
}

async fn build_store(config: &KnowledgeConfig) -> ResearchResult<Arc<dyn KnowledgeStore>> {
    let qdrant: Arc<dyn KnowledgeStore> = Arc::new(
        QdrantStore::connect(config)
            .await
            .map_err(|e| ResearchError::Config(format!("knowledge store: {:#}", e)))?,
    );

    Ok(match &config.fallback_file {
        Some(path) => Arc::new(FallbackStore::new(qdrant, LocalJsonStore::new(path.clone()))),
        None => qdrant,
    })
}
