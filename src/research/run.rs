use std::collections::HashSet;

use super::tasks::BackgroundTasks;
use super::{Answer, MAX_FINAL_SOURCES, RELEVANCE_SAMPLE_SIZE};
use crate::research::agents::relevance::TITLE_PREVIEW_CHARS;
use crate::search::SearchResult;
use crate::utils::text::truncate_chars;

/// 调研状态机的状态
#[derive(Debug, Clone, PartialEq)]
pub enum RunState {
    Planning,
    /// 携带本轮待执行的查询
    Searching(Vec<String>),
    RelevanceCheck,
    Synthesizing,
    /// 终态，携带最终回答
    Done(Answer),
}

impl RunState {
    pub fn name(&self) -> &'static str {
        match self {
            RunState::Planning => "planning",
            RunState::Searching(_) => "searching",
            RunState::RelevanceCheck => "relevance_check",
            RunState::Synthesizing => "synthesizing",
            RunState::Done(_) => "done",
        }
    }
}

/// 单次调研的全部可变状态，只属于发起调研的那个任务
#[derive(Default)]
pub struct ResearchRun {
    /// 累积的来源，按发现顺序，只增不减
    pub sources: Vec<SearchResult>,
    /// 已发出的查询（只增不减）
    seen: HashSet<String>,
    /// 已发出查询的顺序日志
    issued: Vec<String>,
    /// 当前轮次，从0开始
    pub iteration: u32,
    pub tasks: BackgroundTasks,
}

impl ResearchRun {
    pub fn new() -> Self {
        Self::default()
    }

    /// 过滤掉已发出的查询，并把剩余查询登记为已发出
    pub fn claim_queries(&mut self, work: Vec<String>) -> Vec<String> {
        let mut claimed = Vec::with_capacity(work.len());
        for query in work {
            if self.seen.insert(query.clone()) {
                self.issued.push(query.clone());
                claimed.push(query);
            }
        }
        claimed
    }

    /// 建议查询中尚未发出过的部分
    pub fn novel_queries(&self, suggestions: Vec<String>) -> Vec<String> {
        suggestions
            .into_iter()
            .filter(|q| !self.seen.contains(q))
            .collect()
    }

    pub fn issued_queries(&self) -> &[String] {
        &self.issued
    }

    /// 送给相关性判断的标题样本
    pub fn sample_titles(&self) -> Vec<String> {
        self.sources
            .iter()
            .take(RELEVANCE_SAMPLE_SIZE)
            .map(|s| truncate_chars(&s.title, TITLE_PREVIEW_CHARS).to_string())
            .collect()
    }

    /// 按url精确去重（先出现者保留）后截断到上限
    pub fn final_sources(&self) -> Vec<SearchResult> {
        let mut urls = HashSet::new();
        self.sources
            .iter()
            .filter(|s| urls.insert(s.url.as_str()))
            .take(MAX_FINAL_SOURCES)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(url: &str, title: &str) -> SearchResult {
        SearchResult {
            url: url.to_string(),
            title: title.to_string(),
            content: "c".to_string(),
            query: "q".to_string(),
        }
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_claim_queries_never_reissues() {
        let mut run = ResearchRun::new();

        assert_eq!(run.claim_queries(strings(&["a", "b", "a"])), strings(&["a", "b"]));
        assert_eq!(run.claim_queries(strings(&["b", "c"])), strings(&["c"]));
        assert_eq!(run.issued_queries(), strings(&["a", "b", "c"]).as_slice());
    }

    #[test]
    fn test_novel_queries_filters_seen() {
        let mut run = ResearchRun::new();
        run.claim_queries(strings(&["a"]));

        assert_eq!(run.novel_queries(strings(&["a", "b"])), strings(&["b"]));
        assert!(run.novel_queries(strings(&["a"])).is_empty());
    }

    #[test]
    fn test_final_sources_dedups_in_discovery_order() {
        let mut run = ResearchRun::new();
        run.sources = vec![
            result("https://a.com", "first a"),
            result("https://b.com", "b"),
            result("https://a.com", "second a"),
            result("https://a.com/", "slash a"),
        ];

        let urls: Vec<(String, String)> = run
            .final_sources()
            .into_iter()
            .map(|s| (s.url, s.title))
            .collect();
        assert_eq!(
            urls,
            vec![
                ("https://a.com".to_string(), "first a".to_string()),
                ("https://b.com".to_string(), "b".to_string()),
                ("https://a.com/".to_string(), "slash a".to_string()),
            ]
        );
    }

    #[test]
    fn test_final_sources_capped() {
        let mut run = ResearchRun::new();
        run.sources = (0..20)
            .map(|i| result(&format!("https://{}.com", i), "t"))
            .collect();

        assert_eq!(run.final_sources().len(), MAX_FINAL_SOURCES);
        // 累积序列本身不被修改
        assert_eq!(run.sources.len(), 20);
    }

    #[test]
    fn test_sample_titles_truncated() {
        let mut run = ResearchRun::new();
        run.sources = (0..7).map(|_| result("u", &"t".repeat(80))).collect();

        let titles = run.sample_titles();
        assert_eq!(titles.len(), RELEVANCE_SAMPLE_SIZE);
        assert!(titles.iter().all(|t| t.chars().count() == TITLE_PREVIEW_CHARS));
    }
}
