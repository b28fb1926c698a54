//! Tavily 搜索后端

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use super::{SearchBackend, SearchHit, SearchRequest};

pub struct TavilyBackend {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct TavilyResponse {
    #[serde(default)]
    pub results: Vec<TavilyItem>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TavilyItem {
    pub title: Option<String>,
    pub url: Option<String>,
    pub content: Option<String>,
    pub raw_content: Option<String>,
}

impl TavilyBackend {
    pub fn new(api_key: &str, base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

/// 把Tavily响应转换为统一条目，正文优先使用 `raw_content`
pub fn hits_from_response(response: TavilyResponse) -> Vec<SearchHit> {
    response
        .results
        .into_iter()
        .map(|item| {
            let content = item
                .raw_content
                .filter(|raw| !raw.is_empty())
                .or(item.content)
                .unwrap_or_default();
            SearchHit {
                title: item.title.unwrap_or_default(),
                url: item.url.unwrap_or_default(),
                content,
            }
        })
        .collect()
}

#[async_trait]
impl SearchBackend for TavilyBackend {
    fn name(&self) -> &'static str {
        "tavily"
    }

    fn filters_domains_natively(&self) -> bool {
        true
    }

    async fn search(&self, request: &SearchRequest<'_>) -> Result<Vec<SearchHit>> {
        if self.api_key.is_empty() {
            return Err(anyhow!("TAVILY_API_KEY is not configured"));
        }

        let mut body = serde_json::json!({
            "query": request.query,
            "max_results": request.max_results,
            "include_raw_content": true,
            "search_depth": request.depth.as_str(),
        });
        if !request.include_domains.is_empty() {
            body["include_domains"] = serde_json::json!(request.include_domains);
        }

        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("Tavily request failed")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("Tavily returned status {}: {}", status, text));
        }

        let payload: TavilyResponse = response
            .json()
            .await
            .context("Failed to parse Tavily response")?;

        Ok(hits_from_response(payload))
    }
}

#[cfg(test)]
mod tests {
    use super::{TavilyResponse, hits_from_response};

    #[test]
    fn test_hits_prefer_raw_content() {
        let response: TavilyResponse = serde_json::from_str(
            r#"{"results": [
                {"title": "Rust", "url": "https://rust-lang.org", "content": "short", "raw_content": "long body"},
                {"title": "Tokio", "url": "https://tokio.rs", "content": "snippet", "raw_content": null},
                {"title": "Empty raw", "url": "https://e.com", "content": "kept", "raw_content": ""}
            ]}"#,
        )
        .unwrap();

        let hits = hits_from_response(response);
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].content, "long body");
        assert_eq!(hits[1].content, "snippet");
        assert_eq!(hits[2].content, "kept");
    }

    #[test]
    fn test_missing_fields_default_to_empty() {
        let response: TavilyResponse =
            serde_json::from_str(r#"{"results": [{"content": "orphan"}]}"#).unwrap();

        let hits = hits_from_response(response);
        assert_eq!(hits[0].title, "");
        assert_eq!(hits[0].url, "");
        assert_eq!(hits[0].content, "orphan");
    }

    #[test]
    fn test_missing_results_array() {
        let response: TavilyResponse = serde_json::from_str(r#"{"answer": null}"#).unwrap();
        assert!(hits_from_response(response).is_empty());
    }
}
