//! 网络搜索适配层 - 把不同的搜索后端统一成同一种结果形态

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{Instrument, debug, info_span, warn};

use crate::config::SearchConfig;

pub mod duckduckgo;
pub mod tavily;

pub use duckduckgo::DuckDuckGoBackend;
pub use tavily::TavilyBackend;

/// `include_domains` 中的保留值，表示使用内置的高权威域名白名单
pub const HIGH_AUTHORITY: &str = "HIGH_AUTHORITY";

/// 高权威域名白名单
pub const HIGH_AUTHORITY_DOMAINS: [&str; 14] = [
    "wikipedia.org",
    "bbc.com",
    "cnn.com",
    "reuters.com",
    "nytimes.com",
    "washingtonpost.com",
    "theguardian.com",
    "npr.org",
    "bloomberg.com",
    "forbes.com",
    "wsj.com",
    "cnbc.com",
    "gov",
    "edu",
];

/// 搜索后端
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchProvider {
    /// 需要API KEY的商业搜索服务
    #[default]
    Tavily,
    /// 无需KEY的兜底搜索
    DuckDuckGo,
}

impl std::fmt::Display for SearchProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchProvider::Tavily => write!(f, "tavily"),
            SearchProvider::DuckDuckGo => write!(f, "duckduckgo"),
        }
    }
}

impl std::str::FromStr for SearchProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "tavily" | "primary" => Ok(SearchProvider::Tavily),
            "duckduckgo" | "ddg" | "secondary" => Ok(SearchProvider::DuckDuckGo),
            _ => Err(format!("Unknown search provider: {}", s)),
        }
    }
}

/// 搜索深度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchDepth {
    #[default]
    Basic,
    Advanced,
}

impl SearchDepth {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchDepth::Basic => "basic",
            SearchDepth::Advanced => "advanced",
        }
    }
}

impl std::fmt::Display for SearchDepth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SearchDepth {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "basic" => Ok(SearchDepth::Basic),
            "advanced" => Ok(SearchDepth::Advanced),
            _ => Err(format!("Unknown search depth: {}", s)),
        }
    }
}

/// 一条搜索结果，`query` 记录产生它的子查询
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub url: String,
    pub title: String,
    pub content: String,
    pub query: String,
}

/// 搜索后端返回的原始条目，缺失字段一律为空串
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub content: String,
}

/// 单次后端请求
#[derive(Debug, Clone)]
pub struct SearchRequest<'a> {
    pub query: &'a str,
    pub max_results: usize,
    pub depth: SearchDepth,
    pub include_domains: &'a [String],
}

/// 可互换的网络搜索后端
#[async_trait]
pub trait SearchBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// 后端是否能在请求中原生按域名过滤
    fn filters_domains_natively(&self) -> bool;

    async fn search(&self, request: &SearchRequest<'_>) -> Result<Vec<SearchHit>>;
}

/// 解析 `include_domains`：出现保留值时整体替换为高权威白名单，否则去重保序
pub fn resolve_domains(include_domains: &[String]) -> Vec<String> {
    if include_domains.iter().any(|d| d == HIGH_AUTHORITY) {
        return HIGH_AUTHORITY_DOMAINS.iter().map(|d| d.to_string()).collect();
    }

    let mut resolved: Vec<String> = Vec::with_capacity(include_domains.len());
    for domain in include_domains {
        let domain = domain.trim();
        if !domain.is_empty() && !resolved.iter().any(|d| d == domain) {
            resolved.push(domain.to_string());
        }
    }
    resolved
}

/// 按子串匹配URL与域名列表；列表为空时全部放行
pub fn matches_domains(url: &str, domains: &[String]) -> bool {
    domains.is_empty() || domains.iter().any(|d| url.contains(d.as_str()))
}

/// 搜索适配器，按运行参数路由到对应后端
#[derive(Clone)]
pub struct SearchAdapter {
    tavily: Arc<dyn SearchBackend>,
    duckduckgo: Arc<dyn SearchBackend>,
    timeout: Duration,
}

impl SearchAdapter {
    pub fn new(
        tavily: Arc<dyn SearchBackend>,
        duckduckgo: Arc<dyn SearchBackend>,
        timeout: Duration,
    ) -> Self {
        Self {
            tavily,
            duckduckgo,
            timeout,
        }
    }

    /// 根据配置创建两个内置后端
    pub fn from_config(config: &SearchConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_seconds);
        let tavily = TavilyBackend::new(&config.tavily_api_key, &config.tavily_base_url, timeout)?;
        let duckduckgo = DuckDuckGoBackend::new(&config.duckduckgo_base_url, timeout)?;
        Ok(Self::new(Arc::new(tavily), Arc::new(duckduckgo), timeout))
    }

    fn backend(&self, provider: SearchProvider) -> &Arc<dyn SearchBackend> {
        match provider {
            SearchProvider::Tavily => &self.tavily,
            SearchProvider::DuckDuckGo => &self.duckduckgo,
        }
    }

    /// 执行一次子查询
    ///
    /// 后端出错或超时只影响当前子查询：记录日志并返回空结果。
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
        provider: SearchProvider,
        depth: SearchDepth,
        include_domains: &[String],
    ) -> Vec<SearchResult> {
        let span = info_span!(
            "search_web",
            search.query = query,
            search.provider = %provider,
            search.depth = %depth,
            search.num_results = tracing::field::Empty,
        );

        async {
            let backend = self.backend(provider);
            // 后端原生过滤能力弱时多取一倍，留给本地过滤
            let max_results = if backend.filters_domains_natively() {
                limit
            } else {
                limit * 2
            };
            let request = SearchRequest {
                query,
                max_results,
                depth,
                include_domains,
            };

            let hits = match tokio::time::timeout(self.timeout, backend.search(&request)).await {
                Ok(Ok(hits)) => hits,
                Ok(Err(e)) => {
                    warn!(provider = %provider, error = ?e, "search error");
                    return Vec::new();
                }
                Err(_) => {
                    warn!(provider = %provider, timeout = ?self.timeout, "search timed out");
                    return Vec::new();
                }
            };

            let results: Vec<SearchResult> = hits
                .into_iter()
                .filter(|hit| matches_domains(&hit.url, include_domains))
                .take(limit)
                .map(|hit| SearchResult {
                    url: hit.url,
                    title: hit.title,
                    content: hit.content,
                    query: query.to_string(),
                })
                .collect();

            tracing::Span::current().record("search.num_results", results.len());
            debug!(backend = backend.name(), count = results.len(), "search finished");
            results
        }
        .instrument(span)
        .await
    }
}
