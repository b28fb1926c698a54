use crate::config::{Config, LLMProvider};
use crate::research::ResearchOptions;
use crate::search::{SearchDepth, SearchProvider};
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

/// 默认配置文件名，位于当前工作目录
pub const DEFAULT_CONFIG_FILE: &str = "research.toml";

/// Deep Research - 自动拆解问题、并发搜索并综合出带引用的回答
#[derive(Parser, Debug)]
#[command(name = "deep-research")]
#[command(
    about = "Autonomous research pipeline: decomposes a question into sub-queries, searches the web concurrently, refines until the evidence is sufficient and synthesizes a cited answer."
)]
#[command(version)]
pub struct Args {
    /// 需要调研的问题
    pub query: String,

    /// 配置文件路径
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 搜索后端 (tavily, duckduckgo)
    #[arg(short, long)]
    pub provider: Option<String>,

    /// 搜索深度 (basic, advanced)
    #[arg(short, long)]
    pub depth: Option<String>,

    /// 最大搜索轮数
    #[arg(short = 'm', long)]
    pub max_iterations: Option<u32>,

    /// 限定域名，可重复；HIGH_AUTHORITY 表示使用内置权威站点列表
    #[arg(short = 'i', long = "include-domain")]
    pub include_domains: Vec<String>,

    /// 以JSON输出回答与来源
    #[arg(long)]
    pub json: bool,

    /// 是否启用详细日志
    #[arg(short, long)]
    pub verbose: bool,

    /// 不把来源写入知识库
    #[arg(long)]
    pub no_knowledge: bool,

    /// LLM Provider (openai, deepseek, openrouter, anthropic, ollama)
    #[arg(long)]
    pub llm_provider: Option<String>,

    /// 模型名称
    #[arg(long)]
    pub model: Option<String>,

    /// LLM API基地址
    #[arg(long)]
    pub llm_api_base_url: Option<String>,

    /// LLM API KEY
    #[arg(long)]
    pub llm_api_key: Option<String>,

    /// 最大tokens数
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Tavily API KEY
    #[arg(long)]
    pub tavily_api_key: Option<String>,

    /// 退出前等待后台入库任务的最长时间（秒）
    #[arg(long)]
    pub drain_timeout: Option<u64>,
}

impl Args {
    /// 将CLI参数转换为配置
    pub fn into_config(self) -> Result<Config> {
        let mut config = match &self.config {
            // 显式指定的配置文件必须可读
            Some(config_path) => Config::from_file(config_path)
                .context(format!("无法读取配置文件 {:?}", config_path))?,
            None => {
                let default_config_path = std::env::current_dir()
                    .unwrap_or_else(|_| PathBuf::from("."))
                    .join(DEFAULT_CONFIG_FILE);

                if default_config_path.exists() {
                    Config::from_file(&default_config_path).context(format!(
                        "无法读取默认配置文件 {:?}",
                        default_config_path
                    ))?
                } else {
                    Config::default()
                }
            }
        };

        // 覆盖LLM配置
        if let Some(provider_str) = self.llm_provider {
            match provider_str.parse::<LLMProvider>() {
                Ok(provider) => config.llm.provider = provider,
                Err(_) => eprintln!(
                    "⚠️ 警告: 未知的provider: {}，使用配置中的provider",
                    provider_str
                ),
            }
        }
        if let Some(model) = self.model {
            config.llm.model = model;
        }
        if let Some(llm_api_base_url) = self.llm_api_base_url {
            config.llm.api_base_url = llm_api_base_url;
        }
        if let Some(llm_api_key) = self.llm_api_key {
            config.llm.api_key = llm_api_key;
        }
        if let Some(max_tokens) = self.max_tokens {
            config.llm.max_tokens = max_tokens;
        }

        // 搜索配置
        if let Some(tavily_api_key) = self.tavily_api_key {
            config.search.tavily_api_key = tavily_api_key;
        }
        if let Some(provider_str) = self.provider {
            match provider_str.parse::<SearchProvider>() {
                Ok(provider) => config.research.provider = provider,
                Err(_) => eprintln!(
                    "⚠️ 警告: 未知的搜索后端: {}，使用配置中的搜索后端",
                    provider_str
                ),
            }
        }
        if let Some(depth_str) = self.depth {
            match depth_str.parse::<SearchDepth>() {
                Ok(depth) => config.research.search_depth = depth,
                Err(_) => eprintln!(
                    "⚠️ 警告: 未知的搜索深度: {}，使用配置中的搜索深度",
                    depth_str
                ),
            }
        }
        if let Some(max_iterations) = self.max_iterations {
            config.research.max_iterations = max_iterations;
        }
        if !self.include_domains.is_empty() {
            config.research.include_domains = self.include_domains;
        }

        // 其他配置
        if self.no_knowledge {
            config.knowledge.enabled = false;
        }
        if let Some(drain_timeout) = self.drain_timeout {
            config.drain_timeout_seconds = drain_timeout;
        }
        config.verbose = config.verbose || self.verbose;

        Ok(config)
    }
}

/// 由配置得到本次调研参数
pub fn research_options(config: &Config) -> ResearchOptions {
    ResearchOptions::from(&config.research)
}
