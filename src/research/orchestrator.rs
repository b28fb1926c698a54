use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{Instrument, debug, info, instrument};

use super::agents::{QueryPlanner, RelevanceJudge, Synthesizer};
use super::run::{ResearchRun, RunState};
use super::tasks::BackgroundTasks;
use super::{
    Answer, RELEVANCE_THRESHOLD, RESULTS_PER_QUERY, ResearchOptions, ResearchOutcome,
};
use crate::error::{ResearchError, ResearchResult};
use crate::knowledge::PersistenceSink;
use crate::knowledge::sink::STORE_CONTENT_LIMIT;
use crate::llm::TextGenerator;
use crate::search::{SearchAdapter, SearchResult, resolve_domains};
use crate::utils::text::truncate_chars;

/// 调研编排器
///
/// 只持有各协作方的客户端句柄，可在多个并发调研之间共享；
/// 每次调研的状态都放在独立的 [`ResearchRun`] 中。
#[derive(Clone)]
pub struct ResearchOrchestrator {
    planner: QueryPlanner,
    relevance: RelevanceJudge,
    synthesizer: Synthesizer,
    search: Arc<SearchAdapter>,
    sink: Option<PersistenceSink>,
}

impl ResearchOrchestrator {
    /// `sink`为`None`时不写入知识库
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        search: SearchAdapter,
        sink: Option<PersistenceSink>,
    ) -> Self {
        Self {
            planner: QueryPlanner::new(generator.clone()),
            relevance: RelevanceJudge::new(generator.clone()),
            synthesizer: Synthesizer::new(generator),
            search: Arc::new(search),
            sink,
        }
    }

    /// 执行一次调研，只返回回答
    pub async fn research(&self, query: &str, options: &ResearchOptions) -> ResearchResult<Answer> {
        Ok(self.research_run(query, options).await?.answer)
    }

    /// 执行一次调研，同时返回查询日志、轮数与后台任务组
    #[instrument(
        name = "deep_research",
        skip(self, options),
        fields(
            research.max_iterations = options.max_iterations,
            research.provider = %options.provider,
            research.depth = %options.search_depth
        )
    )]
    pub async fn research_run(
        &self,
        query: &str,
        options: &ResearchOptions,
    ) -> ResearchResult<ResearchOutcome> {
        options.validate()?;
        let domains = resolve_domains(&options.include_domains);
        let mut run = ResearchRun::new();
        let mut state = RunState::Planning;

        let answer = loop {
            debug!(state = state.name(), iteration = run.iteration, "research state");
            state = match state {
                RunState::Planning => {
                    let planned = self
                        .planner
                        .decompose(query)
                        .await
                        .map_err(ResearchError::Planning)?;
                    RunState::Searching(planned)
                }
                RunState::Searching(work) => {
                    self.search_step(query, options, &domains, &mut run, work)
                        .await;
                    if run.sources.len() >= RELEVANCE_THRESHOLD {
                        RunState::RelevanceCheck
                    } else {
                        // 规划的查询已用完，不再重新规划
                        RunState::Synthesizing
                    }
                }
                RunState::RelevanceCheck => {
                    let assessment = self.relevance.assess(query, &run.sample_titles()).await;
                    if assessment.sufficient || run.iteration + 1 >= options.max_iterations {
                        RunState::Synthesizing
                    } else {
                        let next = run.novel_queries(assessment.suggestions);
                        if next.is_empty() {
                            debug!("no novel suggestions, stopping refinement");
                            RunState::Synthesizing
                        } else {
                            run.iteration += 1;
                            RunState::Searching(next)
                        }
                    }
                }
                RunState::Synthesizing => RunState::Done(self.synthesize(query, &run).await?),
                RunState::Done(answer) => break answer,
            };
        };

        info!(
            research.total_sources = run.sources.len(),
            research.final_sources = answer.sources.len(),
            research.issued_queries = run.issued_queries().len(),
            research.iterations = run.iteration + 1,
            research.pending_tasks = run.tasks.len(),
            "research finished"
        );

        Ok(ResearchOutcome {
            issued_queries: run.issued_queries().to_vec(),
            iterations: run.iteration + 1,
            background: run.tasks,
            answer,
        })
    }

    /// 并发执行本轮查询，按查询顺序（而不是完成顺序）追加结果
    #[instrument(
        name = "search_iteration",
        skip_all,
        fields(
            iteration = run.iteration,
            search.queries = tracing::field::Empty,
            search.new_results = tracing::field::Empty
        )
    )]
    async fn search_step(
        &self,
        original_query: &str,
        options: &ResearchOptions,
        domains: &[String],
        run: &mut ResearchRun,
        work: Vec<String>,
    ) {
        let queries = run.claim_queries(work);
        let searches = queries.iter().map(|q| {
            self.search.search(
                q,
                RESULTS_PER_QUERY,
                options.provider,
                options.search_depth,
                domains,
            )
        });
        let batches = join_all(searches).await;

        let mut new_results = 0;
        for (sub_query, results) in queries.iter().zip(batches) {
            for mut result in results {
                result.query = sub_query.clone();
                if !result.content.is_empty() {
                    self.persist(original_query, &result, &run.tasks);
                }
                run.sources.push(result);
                new_results += 1;
            }
        }

        let span = tracing::Span::current();
        span.record("search.queries", queries.len());
        span.record("search.new_results", new_results);
    }

    /// 派发后台入库任务，不等待
    fn persist(&self, original_query: &str, result: &SearchResult, tasks: &BackgroundTasks) {
        let Some(sink) = &self.sink else {
            debug!(url = %result.url, storage.status = "skipped_no_client", "knowledge store disabled");
            return;
        };

        let sink = sink.clone();
        let content = truncate_chars(&result.content, STORE_CONTENT_LIMIT).to_string();
        let metadata = BTreeMap::from([
            ("url".to_string(), result.url.clone()),
            ("query".to_string(), original_query.to_string()),
        ]);
        tasks.spawn(
            async move {
                sink.store(&content, metadata).await;
            }
            .in_current_span(),
        );
    }

    async fn synthesize(&self, query: &str, run: &ResearchRun) -> ResearchResult<Answer> {
        let sources = run.final_sources();
        if sources.is_empty() {
            info!("no sources found, skipping synthesis");
            return Ok(Answer::no_sources());
        }

        let text = self
            .synthesizer
            .synthesize(query, &sources)
            .await
            .map_err(ResearchError::Synthesis)?;
        Ok(Answer { text, sources })
    }
}
