//! 文本生成协作方
//!
//! 调研流程中的规划、相关性判断与综合回答都只依赖 [`TextGenerator`]，
//! 生产环境由 [`LLMClient`] 基于rig实现，测试中可替换为脚本化实现。

use anyhow::Result;
use async_trait::async_trait;

pub mod client;

pub use client::LLMClient;
pub use client::types::{ChatMessage, Role};

/// 文本生成接口：给定消息与温度，返回模型文本（已去除推理标签）
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage], temperature: f64) -> Result<String>;
}
