use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;

use crate::search::{SearchDepth, SearchProvider};

/// LLM Provider类型
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub enum LLMProvider {
    #[serde(rename = "openai")]
    #[default]
    OpenAI,
    #[serde(rename = "deepseek")]
    DeepSeek,
    #[serde(rename = "openrouter")]
    OpenRouter,
    #[serde(rename = "anthropic")]
    Anthropic,
    #[serde(rename = "ollama")]
    Ollama,
}

impl std::fmt::Display for LLMProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LLMProvider::OpenAI => write!(f, "openai"),
            LLMProvider::DeepSeek => write!(f, "deepseek"),
            LLMProvider::OpenRouter => write!(f, "openrouter"),
            LLMProvider::Anthropic => write!(f, "anthropic"),
            LLMProvider::Ollama => write!(f, "ollama"),
        }
    }
}

impl std::str::FromStr for LLMProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(LLMProvider::OpenAI),
            "deepseek" => Ok(LLMProvider::DeepSeek),
            "openrouter" => Ok(LLMProvider::OpenRouter),
            "anthropic" => Ok(LLMProvider::Anthropic),
            "ollama" => Ok(LLMProvider::Ollama),
            _ => Err(format!("Unknown provider: {}", s)),
        }
    }
}

/// 应用程序配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct Config {
    /// LLM模型配置
    pub llm: LLMConfig,

    /// 网络搜索配置
    pub search: SearchConfig,

    /// 向量化配置
    pub embedding: EmbeddingConfig,

    /// 知识库配置
    pub knowledge: KnowledgeConfig,

    /// 默认调研参数
    pub research: ResearchDefaults,

    /// 退出前等待后台入库任务的最长时间（秒）
    pub drain_timeout_seconds: u64,

    /// 是否启用详细日志
    pub verbose: bool,
}

/// LLM模型配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct LLMConfig {
    /// LLM Provider类型
    pub provider: LLMProvider,

    /// LLM API KEY
    pub api_key: String,

    /// LLM API基地址
    pub api_base_url: String,

    /// 规划、相关性判断与合成共用的模型
    pub model: String,

    /// 最大tokens
    pub max_tokens: u32,

    /// 重试次数
    pub retry_attempts: u32,

    /// 重试间隔（毫秒）
    pub retry_delay_ms: u64,

    /// 单次请求超时时间（秒）
    pub timeout_seconds: u64,
}

/// 网络搜索配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct SearchConfig {
    /// Tavily API KEY
    pub tavily_api_key: String,

    pub tavily_base_url: String,

    pub duckduckgo_base_url: String,

    /// 单个子查询的超时时间（秒）
    pub timeout_seconds: u64,
}

/// 向量化（Ollama）配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub base_url: String,

    pub model: String,

    pub timeout_seconds: u64,
}

/// 知识库（Qdrant）配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct KnowledgeConfig {
    /// 是否把搜索到的来源写入知识库
    pub enabled: bool,

    pub qdrant_url: String,

    pub collection: String,

    /// 向量维度，需要与向量化模型一致
    pub vector_size: usize,

    pub timeout_seconds: u64,

    /// Qdrant不可用时的本地兜底文件
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_file: Option<PathBuf>,
}

/// 默认调研参数
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ResearchDefaults {
    pub max_iterations: u32,

    pub provider: SearchProvider,

    pub search_depth: SearchDepth,

    pub include_domains: Vec<String>,
}

impl Config {
    /// 从文件加载配置
    pub fn from_file(path: &PathBuf) -> Result<Self> {
        let mut file =
            File::open(path).context(format!("Failed to open config file: {:?}", path))?;
        let mut content = String::new();
        file.read_to_string(&mut content)
            .context("Failed to read config file")?;

        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm: LLMConfig::default(),
            search: SearchConfig::default(),
            embedding: EmbeddingConfig::default(),
            knowledge: KnowledgeConfig::default(),
            research: ResearchDefaults::default(),
            drain_timeout_seconds: 30,
            verbose: false,
        }
    }
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            provider: LLMProvider::default(),
            api_key: std::env::var("RESEARCH_LLM_API_KEY").unwrap_or_else(|_| "lm-studio".into()),
            api_base_url: std::env::var("LM_STUDIO_URL")
                .unwrap_or_else(|_| String::from("http://localhost:1234/v1")),
            model: std::env::var("MODEL_NAME")
                .unwrap_or_else(|_| String::from("qwen3-30b-a3b-thinking-2507-mlx")),
            max_tokens: 8192,
            retry_attempts: 3,
            retry_delay_ms: 2000,
            timeout_seconds: 300,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            tavily_api_key: std::env::var("TAVILY_API_KEY").unwrap_or_default(),
            tavily_base_url: String::from("https://api.tavily.com"),
            duckduckgo_base_url: String::from("https://api.duckduckgo.com"),
            timeout_seconds: 30,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: std::env::var("OLLAMA_URL")
                .unwrap_or_else(|_| String::from("http://localhost:11434")),
            model: std::env::var("EMBEDDING_MODEL")
                .unwrap_or_else(|_| String::from("nomic-embed-text:latest")),
            timeout_seconds: 30,
        }
    }
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            qdrant_url: std::env::var("QDRANT_URL")
                .unwrap_or_else(|_| String::from("http://localhost:6333")),
            collection: String::from("research_knowledge_v2"),
            vector_size: 768,
            timeout_seconds: 5,
            fallback_file: None,
        }
    }
}

impl Default for ResearchDefaults {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            provider: SearchProvider::default(),
            search_depth: SearchDepth::default(),
            include_domains: vec![],
        }
    }
}
