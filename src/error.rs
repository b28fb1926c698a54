//! 研究流程的错误类型

use thiserror::Error;

/// 调研运行级别的错误
///
/// 只有规划与合成阶段的失败会终止一次调研，其余步骤都有降级默认值。
#[derive(Debug, Error)]
pub enum ResearchError {
    #[error("invalid research options: {0}")]
    InvalidOptions(String),

    #[error("query planning failed: {0:#}")]
    Planning(#[source] anyhow::Error),

    #[error("answer synthesis failed: {0:#}")]
    Synthesis(#[source] anyhow::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type ResearchResult<T> = std::result::Result<T, ResearchError>;
