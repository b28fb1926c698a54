//! 模型输出的结构化解析
//!
//! 先严格解码；失败后做一次规范化（去掉推理块与代码围栏）再重试一次，
//! 仍失败则交由调用方使用各自的默认值。

use regex::Regex;
use serde::de::DeserializeOwned;
use std::sync::LazyLock;

static REASONING_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(think|thought)>.*?</(think|thought)>").expect("reasoning block regex")
});

static LEADING_REASONING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)\A.*?</(think|thought)>").expect("leading reasoning regex")
});

static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)(```|$)").expect("code fence regex")
});

/// 移除模型输出中的推理块（`<think>`/`<thought>`）
///
/// 聊天模板注入开始标签时，输出只带结束标签，此时结束标签之前的内容都是推理。
pub fn strip_reasoning(raw: &str) -> String {
    let balanced = REASONING_BLOCK.replace_all(raw, "");
    LEADING_REASONING.replace(&balanced, "").trim().to_string()
}

/// 规范化：去掉推理块，并在存在代码围栏时只保留第一个围栏内的内容
pub fn strip_wrappers(raw: &str) -> String {
    let without_reasoning = strip_reasoning(raw);
    match CODE_FENCE.captures(&without_reasoning) {
        Some(caps) => caps
            .get(1)
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default(),
        None => without_reasoning,
    }
}

/// 解析模型返回的JSON，最多尝试两次
pub fn parse_llm_json<T>(raw: &str) -> Result<T, serde_json::Error>
where
    T: DeserializeOwned,
{
    match serde_json::from_str::<T>(raw.trim()) {
        Ok(value) => Ok(value),
        Err(_) => serde_json::from_str::<T>(&strip_wrappers(raw)),
    }
}

#[cfg(test)]
mod tests;
