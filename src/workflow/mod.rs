use crate::cli::research_options;
use crate::config::Config;
use crate::context::ResearchContext;
use crate::research::{Answer, ResearchOutcome};
use crate::utils::text::truncate_chars;

use anyhow::Result;
use serde::Serialize;
use std::io::{self, Write};
use std::time::{Duration, Instant};

/// JSON输出中每个来源正文的预览长度（字符）
pub const SOURCE_PREVIEW_CHARS: usize = 500;

/// 回答的输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Serialize)]
pub struct SourceView<'a> {
    pub id: usize,
    pub url: &'a str,
    pub title: &'a str,
    pub content: &'a str,
    pub query: &'a str,
}

#[derive(Debug, Serialize)]
pub struct AnswerView<'a> {
    pub answer: &'a str,
    pub sources: Vec<SourceView<'a>>,
}

impl<'a> From<&'a Answer> for AnswerView<'a> {
    fn from(answer: &'a Answer) -> Self {
        Self {
            answer: &answer.text,
            sources: answer
                .sources
                .iter()
                .enumerate()
                .map(|(i, s)| SourceView {
                    id: i + 1,
                    url: &s.url,
                    title: if s.title.is_empty() { "Unknown" } else { s.title.as_str() },
                    content: truncate_chars(&s.content, SOURCE_PREVIEW_CHARS),
                    query: &s.query,
                })
                .collect(),
        }
    }
}

/// 渲染为终端文本：回答正文 + 编号来源列表
pub fn render_text(answer: &Answer) -> String {
    let mut output = String::new();
    output.push_str(answer.text.trim());
    output.push('\n');

    if !answer.sources.is_empty() {
        output.push_str("\n📚 Sources:\n");
        for source in AnswerView::from(answer).sources {
            output.push_str(&format!(
                "[{}] {}\n    {}\n    query: {}\n",
                source.id, source.title, source.url, source.query
            ));
        }
    }
    output
}

pub fn render_json(answer: &Answer) -> Result<String> {
    Ok(serde_json::to_string_pretty(&AnswerView::from(answer))?)
}

/// 进度信息的输出目标：JSON模式下写入stderr，stdout只保留JSON
fn status_stream(format: OutputFormat) -> Box<dyn Write + Send> {
    match format {
        OutputFormat::Text => Box::new(io::stdout()),
        OutputFormat::Json => Box::new(io::stderr()),
    }
}

/// 输出调研结果：完成摘要写入 `status`，回答写入 `out`
pub fn write_report<O: Write, S: Write>(
    out: &mut O,
    status: &mut S,
    outcome: &ResearchOutcome,
    elapsed: Duration,
    verbose: bool,
    format: OutputFormat,
) -> Result<()> {
    writeln!(
        status,
        "✅ 调研完成，用时 {:.2}秒，共 {} 轮、{} 个子查询",
        elapsed.as_secs_f64(),
        outcome.iterations,
        outcome.issued_queries.len()
    )?;
    if verbose {
        for (i, sub_query) in outcome.issued_queries.iter().enumerate() {
            writeln!(status, "   {}. {}", i + 1, sub_query)?;
        }
    }

    match format {
        OutputFormat::Text => writeln!(out, "\n{}", render_text(&outcome.answer))?,
        OutputFormat::Json => writeln!(out, "{}", render_json(&outcome.answer)?)?,
    }
    out.flush()?;
    Ok(())
}

/// 启动一次调研：装配上下文、执行、输出回答，最后在限定时间内等待后台入库
pub async fn launch(config: &Config, query: &str, format: OutputFormat) -> Result<()> {
    let context = ResearchContext::from_config(config.clone()).await?;
    let options = research_options(config);
    let mut status = status_stream(format);

    writeln!(status, "🔎 开始调研: {}", query)?;
    let started = Instant::now();
    let outcome = context.orchestrator.research_run(query, &options).await?;

    write_report(
        &mut io::stdout(),
        &mut status,
        &outcome,
        started.elapsed(),
        config.verbose,
        format,
    )?;

    if !outcome.background.is_empty() {
        writeln!(
            status,
            "⏳ 等待 {} 个后台入库任务完成...",
            outcome.background.len()
        )?;
    }
    let drained = outcome
        .background
        .drain(Duration::from_secs(config.drain_timeout_seconds))
        .await;
    if !drained {
        eprintln!("⚠️ 警告: 部分后台入库任务未在限定时间内完成");
    }

    Ok(())
}
