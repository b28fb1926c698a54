//! 调研编排
//!
//! 一次调研：规划子查询 → 并发搜索 → 相关性判断与细化 → 去重综合。
//! 新发现的来源同时交给后台任务写入知识库，主流程从不等待这些任务。

use serde::{Deserialize, Serialize};

use crate::config::ResearchDefaults;
use crate::error::{ResearchError, ResearchResult};
use crate::search::{SearchDepth, SearchProvider, SearchResult};

pub mod agents;
pub mod orchestrator;
pub mod run;
pub mod tasks;

pub use orchestrator::ResearchOrchestrator;
pub use run::{ResearchRun, RunState};
pub use tasks::BackgroundTasks;

/// 进入相关性判断所需的最少来源数
pub const RELEVANCE_THRESHOLD: usize = 5;

/// 送去相关性判断的标题数
pub const RELEVANCE_SAMPLE_SIZE: usize = 5;

/// 最终回答使用的来源上限
pub const MAX_FINAL_SOURCES: usize = 8;

/// 每个子查询取回的结果数
pub const RESULTS_PER_QUERY: usize = 3;

/// 一个来源都没有时的固定回答
pub const NO_SOURCES_ANSWER: &str = "Unable to find any sources for this query.";

/// 单次调研参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchOptions {
    /// 最大轮次，至少为1
    pub max_iterations: u32,
    pub provider: SearchProvider,
    pub search_depth: SearchDepth,
    /// 限定域名；包含`HIGH_AUTHORITY`时使用内置的权威站点列表
    pub include_domains: Vec<String>,
}

impl Default for ResearchOptions {
    fn default() -> Self {
        Self::from(&ResearchDefaults::default())
    }
}

impl From<&ResearchDefaults> for ResearchOptions {
    fn from(defaults: &ResearchDefaults) -> Self {
        Self {
            max_iterations: defaults.max_iterations,
            provider: defaults.provider,
            search_depth: defaults.search_depth,
            include_domains: defaults.include_domains.clone(),
        }
    }
}

impl ResearchOptions {
    pub fn validate(&self) -> ResearchResult<()> {
        if self.max_iterations < 1 {
            return Err(ResearchError::InvalidOptions(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// 调研结果：回答正文与实际使用的来源
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<SearchResult>,
}

impl Answer {
    pub fn no_sources() -> Self {
        Self {
            text: NO_SOURCES_ANSWER.to_string(),
            sources: Vec::new(),
        }
    }
}

/// 一次调研的完整产出
pub struct ResearchOutcome {
    pub answer: Answer,
    /// 按发出顺序记录的子查询
    pub issued_queries: Vec<String>,
    /// 实际执行的搜索轮数
    pub iterations: u32,
    /// 仍可能在运行的后台入库任务
    pub background: BackgroundTasks,
}
