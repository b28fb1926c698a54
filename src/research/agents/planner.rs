use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, instrument};

use super::PromptTemplate;
use crate::llm::TextGenerator;
use crate::utils::llm_json::parse_llm_json;

/// 规划请求使用的温度
pub const PLANNER_TEMPERATURE: f64 = 0.3;

/// 子查询数量上限
pub const MAX_SUB_QUERIES: usize = 5;

/// 查询规划器 - 把一个用户问题拆成若干搜索子查询
#[derive(Clone)]
pub struct QueryPlanner {
    generator: Arc<dyn TextGenerator>,
}

impl QueryPlanner {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    fn prompt_template(&self) -> PromptTemplate {
        PromptTemplate {
            system_prompt: String::new(),
            opening_instruction: r#"You are a research query planner. Given a user query, generate 3-5 focused search queries that will help gather comprehensive information to answer the question.

Consider:
- Breaking down the query into component parts
- Including alternative phrasings or related terms
- If the query mentions a specific person/thing that might be obscure, also search for the general topic
- Generate queries in the same language as the original query"#
                .to_string(),
            closing_instruction: r#"Output ONLY a JSON array of search query strings, nothing else. Example: ["query 1", "query 2", "query 3"]"#
                .to_string(),
        }
    }

    /// 拆解查询；生成服务出错时向上返回，输出无法解析时使用确定的兜底列表
    #[instrument(
        name = "decompose_query",
        skip(self),
        fields(query.decomposed_count = tracing::field::Empty)
    )]
    pub async fn decompose(&self, query: &str) -> Result<Vec<String>> {
        let messages = self
            .prompt_template()
            .render(&format!("USER QUERY: {}", query));
        let raw = self
            .generator
            .complete(&messages, PLANNER_TEMPERATURE)
            .await?;

        let queries = parse_sub_queries(query, &raw);
        tracing::Span::current().record("query.decomposed_count", queries.len());
        Ok(queries)
    }
}

/// 解析规划输出：去除空白项并截断到上限，解析失败或结果为空时退回兜底列表
pub fn parse_sub_queries(query: &str, raw: &str) -> Vec<String> {
    match parse_llm_json::<Vec<String>>(raw) {
        Ok(list) => {
            let queries: Vec<String> = list
                .into_iter()
                .map(|q| q.trim().to_string())
                .filter(|q| !q.is_empty())
                .take(MAX_SUB_QUERIES)
                .collect();
            if !queries.is_empty() {
                return queries;
            }
            debug!("planner returned an empty list, using fallback");
        }
        Err(e) => debug!(error = %e, "planner output not parseable, using fallback"),
    }
    fallback_queries(query)
}

/// 兜底：原始查询 + 第一个`?`之前的部分（没有`?`时即原文）
pub fn fallback_queries(query: &str) -> Vec<String> {
    let head = query.split('?').next().unwrap_or(query);
    vec![query.to_string(), head.to_string()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_queries() {
        assert_eq!(fallback_queries("X?"), vec!["X?", "X"]);
        assert_eq!(
            fallback_queries("what is rust? and why"),
            vec!["what is rust? and why", "what is rust"]
        );
        assert_eq!(fallback_queries("no question"), vec!["no question", "no question"]);
    }

    #[test]
    fn test_parse_fenced_list() {
        let raw = "```json\n[\"a\", \"b\", \"c\"]\n```";
        assert_eq!(parse_sub_queries("q", raw), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_parse_caps_at_five() {
        let raw = r#"["1","2","3","4","5","6","7"]"#;
        assert_eq!(parse_sub_queries("q", raw).len(), MAX_SUB_QUERIES);
    }

    #[test]
    fn test_parse_drops_blank_entries() {
        let raw = r#"["  alpha ", "", "   "]"#;
        assert_eq!(parse_sub_queries("q", raw), vec!["alpha"]);
    }

    #[test]
    fn test_wrong_shape_falls_back() {
        assert_eq!(parse_sub_queries("X?", r#"{"queries": ["a"]}"#), vec!["X?", "X"]);
        assert_eq!(parse_sub_queries("X?", "[]"), vec!["X?", "X"]);
        assert_eq!(parse_sub_queries("X?", "sure, here you go"), vec!["X?", "X"]);
    }
}
