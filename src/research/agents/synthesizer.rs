use anyhow::Result;
use std::sync::Arc;
use tracing::instrument;

use super::PromptTemplate;
use crate::llm::TextGenerator;
use crate::search::SearchResult;
use crate::utils::text::truncate_chars;

/// 综合回答使用的温度
pub const SYNTHESIS_TEMPERATURE: f64 = 0.4;

/// 每个来源送入提示词的正文上限（字符）
pub const SOURCE_CONTENT_LIMIT: usize = 2500;

/// 答案综合 - 基于去重后的来源生成带引用的回答
#[derive(Clone)]
pub struct Synthesizer {
    generator: Arc<dyn TextGenerator>,
}

impl Synthesizer {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    fn prompt_template(&self) -> PromptTemplate {
        PromptTemplate {
            system_prompt: "You are a helpful research assistant. Always provide substantive, informative answers based on available sources. Never refuse to answer - find the most relevant information possible."
                .to_string(),
            opening_instruction: r#"You are a research assistant synthesizing information from multiple sources.

IMPORTANT: You MUST provide a substantive answer based on the sources. If the sources don't directly answer the query, use related information to provide the best possible answer and note what aspects couldn't be fully addressed."#
                .to_string(),
            closing_instruction: r#"Instructions:
- Synthesize a comprehensive answer from the sources
- Cite source numbers when using specific information
- If the exact topic isn't covered, provide relevant related information
- Be helpful - find the most relevant angles from what's available

ANSWER:"#
                .to_string(),
        }
    }

    #[instrument(
        name = "llm_synthesize",
        skip(self, sources),
        fields(
            llm.num_sources = sources.len(),
            llm.answer_length = tracing::field::Empty
        )
    )]
    pub async fn synthesize(&self, query: &str, sources: &[SearchResult]) -> Result<String> {
        let body = format!("QUERY: {}\n\nSOURCES:\n{}", query, render_sources(sources));
        let messages = self.prompt_template().render(&body);

        let answer = self
            .generator
            .complete(&messages, SYNTHESIS_TEMPERATURE)
            .await?;
        tracing::Span::current().record("llm.answer_length", answer.len());
        Ok(answer)
    }
}

/// 按 `[SOURCE i] (url)` 格式渲染来源，编号从1开始
pub fn render_sources(sources: &[SearchResult]) -> String {
    sources
        .iter()
        .enumerate()
        .map(|(i, source)| {
            let query = if source.query.is_empty() {
                "N/A"
            } else {
                source.query.as_str()
            };
            format!(
                "[SOURCE {}] ({})\nSearch query: {}\n{}\n",
                i + 1,
                source.url,
                query,
                truncate_chars(&source.content, SOURCE_CONTENT_LIMIT)
            )
        })
        .collect::<Vec<_>>()
        .join("\n---\n")
}
