use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use super::PromptTemplate;
use crate::llm::TextGenerator;
use crate::utils::llm_json::parse_llm_json;

/// 相关性判断使用的温度
pub const RELEVANCE_TEMPERATURE: f64 = 0.2;

/// 每个标题送入提示词的字符上限
pub const TITLE_PREVIEW_CHARS: usize = 50;

/// 相关性判断结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assessment {
    pub sufficient: bool,
    pub suggestions: Vec<String>,
}

impl Assessment {
    /// 无法判断时的默认结论：证据充分，不再细化
    pub fn sufficient() -> Self {
        Self {
            sufficient: true,
            suggestions: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RelevanceReply {
    #[serde(default = "default_relevant")]
    relevant: bool,
    #[serde(default)]
    suggestions: Vec<String>,
}

fn default_relevant() -> bool {
    true
}

/// 相关性判断 - 根据已找到来源的标题决定继续搜索还是进入综合
#[derive(Clone)]
pub struct RelevanceJudge {
    generator: Arc<dyn TextGenerator>,
}

impl RelevanceJudge {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    fn prompt_template(&self) -> PromptTemplate {
        PromptTemplate {
            system_prompt: String::new(),
            opening_instruction: "You are evaluating search results for relevance.".to_string(),
            closing_instruction: r#"Questions:
1. Do these sources likely contain information to answer the query? (yes/no)
2. If no, suggest 2-3 alternative search queries that might find more relevant information.

Output JSON: {"relevant": true/false, "suggestions": ["query1", "query2"]}"#
                .to_string(),
        }
    }

    /// 任何失败（生成服务出错或输出不可解析）都按“充分”处理
    #[instrument(
        name = "check_relevance",
        skip(self, sample_titles),
        fields(
            relevance.sample_size = sample_titles.len(),
            relevance.is_relevant = tracing::field::Empty
        )
    )]
    pub async fn assess(&self, query: &str, sample_titles: &[String]) -> Assessment {
        let body = format!(
            "ORIGINAL QUERY: {}\nFOUND SOURCES (titles): {}",
            query,
            sample_titles.join(" | ")
        );
        let messages = self.prompt_template().render(&body);

        let assessment = match self
            .generator
            .complete(&messages, RELEVANCE_TEMPERATURE)
            .await
        {
            Ok(raw) => parse_assessment(&raw),
            Err(e) => {
                warn!(error = ?e, "relevance check failed, treating evidence as sufficient");
                Assessment::sufficient()
            }
        };

        tracing::Span::current().record("relevance.is_relevant", assessment.sufficient);
        assessment
    }
}

pub fn parse_assessment(raw: &str) -> Assessment {
    match parse_llm_json::<RelevanceReply>(raw) {
        Ok(reply) => Assessment {
            sufficient: reply.relevant,
            suggestions: reply
                .suggestions
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        },
        Err(e) => {
            debug!(error = %e, "relevance output not parseable");
            Assessment::sufficient()
        }
    }
}
