//! DuckDuckGo 搜索后端（Instant Answer API，无需KEY）

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use super::{SearchBackend, SearchHit, SearchRequest};

pub struct DuckDuckGoBackend {
    client: reqwest::Client,
    base_url: String,
}

impl DuckDuckGoBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("deep-research-rs/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

fn str_field<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(|v| v.as_str()).unwrap_or("")
}

/// `Text` 一般是 "标题 - 摘要" 的形式，取前半段作为标题
fn title_from_text(text: &str) -> String {
    text.split(" - ").next().unwrap_or(text).trim().to_string()
}

fn push_topic(topic: &Value, hits: &mut Vec<SearchHit>) {
    // 分组条目：{"Name": "...", "Topics": [...]}
    if let Some(children) = topic.get("Topics").and_then(|v| v.as_array()) {
        for child in children {
            push_topic(child, hits);
        }
        return;
    }

    let text = str_field(topic, "Text");
    let url = str_field(topic, "FirstURL");
    if text.is_empty() && url.is_empty() {
        return;
    }
    hits.push(SearchHit {
        title: title_from_text(text),
        url: url.to_string(),
        content: text.to_string(),
    });
}

/// 把Instant Answer响应展开为条目：摘要 → Results → RelatedTopics
pub fn hits_from_instant_answer(body: &Value, max_results: usize) -> Vec<SearchHit> {
    let mut hits = Vec::new();

    let abstract_text = str_field(body, "AbstractText");
    let abstract_url = str_field(body, "AbstractURL");
    if !abstract_text.is_empty() && !abstract_url.is_empty() {
        let heading = str_field(body, "Heading");
        hits.push(SearchHit {
            title: if heading.is_empty() {
                str_field(body, "AbstractSource").to_string()
            } else {
                heading.to_string()
            },
            url: abstract_url.to_string(),
            content: abstract_text.to_string(),
        });
    }

    for key in ["Results", "RelatedTopics"] {
        if let Some(items) = body.get(key).and_then(|v| v.as_array()) {
            for item in items {
                push_topic(item, &mut hits);
            }
        }
    }

    hits.truncate(max_results);
    hits
}

#[async_trait]
impl SearchBackend for DuckDuckGoBackend {
    fn name(&self) -> &'static str {
        "duckduckgo"
    }

    fn filters_domains_natively(&self) -> bool {
        false
    }

    async fn search(&self, request: &SearchRequest<'_>) -> Result<Vec<SearchHit>> {
        let response = self
            .client
            .get(format!("{}/", self.base_url))
            .query(&[
                ("q", request.query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .send()
            .await
            .context("DuckDuckGo request failed")?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("DuckDuckGo returned status {}", status));
        }

        let body: Value = response
            .json()
            .await
            .context("Failed to parse DuckDuckGo response")?;

        Ok(hits_from_instant_answer(&body, request.max_results))
    }
}
