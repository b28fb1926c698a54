use super::{parse_llm_json, strip_reasoning, strip_wrappers};
use serde::Deserialize;

#[derive(Debug, Deserialize, PartialEq)]
struct Verdict {
    relevant: bool,
    #[serde(default)]
    suggestions: Vec<String>,
}

#[test]
fn test_parse_plain_json_array() {
    let parsed: Vec<String> = parse_llm_json(r#"["a", "b"]"#).unwrap();
    assert_eq!(parsed, vec!["a", "b"]);
}

#[test]
fn test_parse_fenced_json_with_language_tag() {
    let raw = "Here you go:\n```json\n[\"rust async\", \"tokio runtime\"]\n```\nHope it helps";
    let parsed: Vec<String> = parse_llm_json(raw).unwrap();
    assert_eq!(parsed, vec!["rust async", "tokio runtime"]);
}

#[test]
fn test_parse_fenced_without_closing_fence() {
    let raw = "```\n{\"relevant\": false, \"suggestions\": [\"x\"]}";
    let parsed: Verdict = parse_llm_json(raw).unwrap();
    assert_eq!(
        parsed,
        Verdict {
            relevant: false,
            suggestions: vec!["x".to_string()]
        }
    );
}

#[test]
fn test_parse_keeps_word_json_inside_strings() {
    let raw = "```json\n[\"json schema validation\"]\n```";
    let parsed: Vec<String> = parse_llm_json(raw).unwrap();
    assert_eq!(parsed, vec!["json schema validation"]);
}

#[test]
fn test_parse_after_reasoning_block() {
    let raw = "<think>the user wants queries</think>\n[\"q1\"]";
    let parsed: Vec<String> = parse_llm_json(raw).unwrap();
    assert_eq!(parsed, vec!["q1"]);
}

#[test]
fn test_parse_rejects_wrong_shape() {
    assert!(parse_llm_json::<Vec<String>>("not json at all").is_err());
    assert!(parse_llm_json::<Vec<String>>(r#"[1, 2]"#).is_err());
    assert!(parse_llm_json::<Verdict>(r#"{"relevant": "maybe"}"#).is_err());
}

#[test]
fn test_strip_reasoning_multiline_and_case() {
    let raw = "<Thought>\nline one\nline two\n</Thought>Answer text";
    assert_eq!(strip_reasoning(raw), "Answer text");
}

#[test]
fn test_strip_reasoning_with_only_closing_tag() {
    let raw = "The user asks about omelets.\nLet me plan.\n</think>\n\nFinal answer";
    assert_eq!(strip_reasoning(raw), "Final answer");
}

#[test]
fn test_parse_after_unopened_reasoning() {
    let raw = "I should output three queries [like this].\n</think>\n[\"q1\", \"q2\"]";
    let parsed: Vec<String> = parse_llm_json(raw).unwrap();
    assert_eq!(parsed, vec!["q1", "q2"]);
}

#[test]
fn test_strip_wrappers_without_fence_returns_trimmed_text() {
    assert_eq!(strip_wrappers("  [\"a\"]  "), "[\"a\"]");
}
