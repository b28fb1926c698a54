//! LLM客户端 - 提供统一的LLM服务接口

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::config::LLMConfig;
use crate::llm::TextGenerator;
use crate::utils::llm_json::strip_reasoning;

mod providers;
pub mod types;

use providers::ProviderClient;
use types::{ChatMessage, split_messages};

/// LLM客户端 - 提供统一的LLM服务接口
#[derive(Clone)]
pub struct LLMClient {
    config: LLMConfig,
    client: ProviderClient,
}

impl LLMClient {
    /// 创建新的LLM客户端
    pub fn new(config: LLMConfig) -> Result<Self> {
        let client = ProviderClient::new(&config)?;
        Ok(Self { client, config })
    }

    /// 通用重试逻辑，用于处理异步操作的重试机制
    async fn retry_with_backoff<T, F, Fut>(&self, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, anyhow::Error>>,
    {
        let max_retries = self.config.retry_attempts.max(1);
        let retry_delay_ms = self.config.retry_delay_ms;
        let mut retries = 0;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(err) => {
                    retries += 1;
                    warn!(
                        attempt = retries,
                        max_attempts = max_retries,
                        error = ?err,
                        "llm call failed"
                    );
                    if retries >= max_retries {
                        return Err(err);
                    }
                    tokio::time::sleep(Duration::from_millis(retry_delay_ms)).await;
                }
            }
        }
    }

    /// 单次调用，超时视为失败交给重试逻辑处理
    async fn prompt_once(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        temperature: f64,
    ) -> Result<String> {
        let agent = self
            .client
            .create_agent(system_prompt, &self.config, temperature);
        let timeout = Duration::from_secs(self.config.timeout_seconds);

        match tokio::time::timeout(timeout, agent.prompt(user_prompt)).await {
            Ok(result) => result,
            Err(_) => Err(anyhow!(
                "llm call timed out after {}s",
                self.config.timeout_seconds
            )),
        }
    }
}

#[async_trait]
impl TextGenerator for LLMClient {
    #[instrument(
        name = "llm_complete",
        skip_all,
        fields(llm.model = %self.config.model, llm.temperature = temperature)
    )]
    async fn complete(&self, messages: &[ChatMessage], temperature: f64) -> Result<String> {
        let (system_prompt, user_prompt) = split_messages(messages);

        let raw = self
            .retry_with_backoff(|| self.prompt_once(&system_prompt, &user_prompt, temperature))
            .await?;

        debug!(response_length = raw.len(), "llm response received");
        Ok(strip_reasoning(&raw))
    }
}
