use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use deep_research::error::ResearchError;
use deep_research::knowledge::{Embedder, KnowledgePoint, KnowledgeStore, PersistenceSink};
use deep_research::llm::{ChatMessage, Role, TextGenerator};
use deep_research::research::agents::QueryPlanner;
use deep_research::research::agents::planner::PLANNER_TEMPERATURE;
use deep_research::research::agents::relevance::RELEVANCE_TEMPERATURE;
use deep_research::research::agents::synthesizer::SYNTHESIS_TEMPERATURE;
use deep_research::research::{
    MAX_FINAL_SOURCES, NO_SOURCES_ANSWER, ResearchOptions, ResearchOrchestrator,
};
use deep_research::search::{
    SearchAdapter, SearchBackend, SearchHit, SearchProvider, SearchRequest,
};

type RelevanceScript = Box<dyn Fn(usize) -> String + Send + Sync>;
type HitScript = Box<dyn Fn(&str) -> Result<Vec<SearchHit>> + Send + Sync>;
type LatencyScript = Box<dyn Fn(&str) -> Duration + Send + Sync>;

/// 按温度区分规划、相关性判断与综合三类请求的脚本化生成器
struct ScriptedGenerator {
    plan: Result<String, String>,
    relevance: RelevanceScript,
    synthesis: Result<String, String>,
    planner_calls: AtomicUsize,
    relevance_calls: AtomicUsize,
    synthesis_calls: AtomicUsize,
    synthesis_prompt: Mutex<String>,
}

impl ScriptedGenerator {
    fn new(plan: &str) -> Self {
        Self {
            plan: Ok(plan.to_string()),
            relevance: Box::new(|_| r#"{"relevant": true, "suggestions": []}"#.to_string()),
            synthesis: Ok("synthesized answer [1]".to_string()),
            planner_calls: AtomicUsize::new(0),
            relevance_calls: AtomicUsize::new(0),
            synthesis_calls: AtomicUsize::new(0),
            synthesis_prompt: Mutex::new(String::new()),
        }
    }

    fn with_relevance(mut self, script: impl Fn(usize) -> String + Send + Sync + 'static) -> Self {
        self.relevance = Box::new(script);
        self
    }

    fn failing_plan(mut self) -> Self {
        self.plan = Err("planner backend down".to_string());
        self
    }

    fn failing_synthesis(mut self) -> Self {
        self.synthesis = Err("synthesis backend down".to_string());
        self
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn complete(&self, messages: &[ChatMessage], temperature: f64) -> Result<String> {
        if temperature == PLANNER_TEMPERATURE {
            self.planner_calls.fetch_add(1, Ordering::SeqCst);
            self.plan.clone().map_err(|e| anyhow!(e))
        } else if temperature == RELEVANCE_TEMPERATURE {
            let call = self.relevance_calls.fetch_add(1, Ordering::SeqCst);
            Ok((self.relevance)(call))
        } else if temperature == SYNTHESIS_TEMPERATURE {
            self.synthesis_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(user) = messages.iter().find(|m| m.role == Role::User) {
                *self.synthesis_prompt.lock().unwrap() = user.content.clone();
            }
            self.synthesis.clone().map_err(|e| anyhow!(e))
        } else {
            Err(anyhow!("unexpected temperature {}", temperature))
        }
    }
}

/// 记录收到的查询，按脚本返回条目
struct ScriptedBackend {
    native_filtering: bool,
    script: HitScript,
    latency: LatencyScript,
    queries: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    fn new(script: impl Fn(&str) -> Result<Vec<SearchHit>> + Send + Sync + 'static) -> Self {
        Self {
            native_filtering: true,
            script: Box::new(script),
            latency: Box::new(|_| Duration::ZERO),
            queries: Mutex::new(Vec::new()),
        }
    }

    fn with_latency(mut self, latency: impl Fn(&str) -> Duration + Send + Sync + 'static) -> Self {
        self.latency = Box::new(latency);
        self
    }

    fn weak_filtering(mut self) -> Self {
        self.native_filtering = false;
        self
    }

    fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn filters_domains_natively(&self) -> bool {
        self.native_filtering
    }

    async fn search(&self, request: &SearchRequest<'_>) -> Result<Vec<SearchHit>> {
        self.queries.lock().unwrap().push(request.query.to_string());
        tokio::time::sleep((self.latency)(request.query)).await;
        let mut hits = (self.script)(request.query)?;
        hits.truncate(request.max_results);
        Ok(hits)
    }
}

struct UnitEmbedder;

#[async_trait]
impl Embedder for UnitEmbedder {
    async fn embed(&self, _text: &str) -> Vec<f32> {
        vec![1.0, 0.0, 0.0]
    }
}

/// 可设置延迟与失败的知识库
#[derive(Default)]
struct SlowStore {
    delay: Duration,
    fail: bool,
    points: Mutex<Vec<KnowledgePoint>>,
}

#[async_trait]
impl KnowledgeStore for SlowStore {
    async fn upsert(&self, point: KnowledgePoint) -> Result<()> {
        tokio::time::sleep(self.delay).await;
        if self.fail {
            return Err(anyhow!("knowledge store unreachable"));
        }
        self.points.lock().unwrap().push(point);
        Ok(())
    }
}

fn hit(url: &str, title: &str, content: &str) -> SearchHit {
    SearchHit {
        url: url.to_string(),
        title: title.to_string(),
        content: content.to_string(),
    }
}

/// 每个查询返回3条：2条与查询相关的独有地址 + 1条所有查询共享的地址
fn per_query_hits(query: &str) -> Result<Vec<SearchHit>> {
    let slug = query.replace(' ', "-");
    Ok(vec![
        hit(&format!("https://{}.com/1", slug), &format!("{} one", query), "alpha"),
        hit("https://shared.com", "shared", "shared content"),
        hit(&format!("https://{}.com/2", slug), &format!("{} two", query), "beta"),
    ])
}

fn plan(queries: &[&str]) -> String {
    serde_json::to_string(queries).unwrap()
}

fn adapter(backend: Arc<ScriptedBackend>) -> SearchAdapter {
    SearchAdapter::new(backend.clone(), backend, Duration::from_secs(5))
}

fn options(max_iterations: u32) -> ResearchOptions {
    ResearchOptions {
        max_iterations,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_sources_are_unique_and_capped() {
    let generator = Arc::new(ScriptedGenerator::new(&plan(&["a", "b", "c", "d", "e"])));
    let backend = Arc::new(ScriptedBackend::new(per_query_hits));
    let orchestrator = ResearchOrchestrator::new(generator.clone(), adapter(backend), None);

    let answer = orchestrator.research("q", &options(3)).await.unwrap();

    let urls: HashSet<&str> = answer.sources.iter().map(|s| s.url.as_str()).collect();
    assert_eq!(urls.len(), answer.sources.len());
    assert_eq!(answer.sources.len(), MAX_FINAL_SOURCES);
    // 按查询顺序追加，第一条来自第一个子查询
    assert_eq!(answer.sources[0].url, "https://a.com/1");
    assert_eq!(answer.sources[0].query, "a");
    assert_eq!(answer.text, "synthesized answer [1]");
    assert_eq!(generator.synthesis_calls.load(Ordering::SeqCst), 1);

    let prompt = generator.synthesis_prompt.lock().unwrap().clone();
    assert!(prompt.contains("QUERY: q"));
    assert!(prompt.contains("[SOURCE 1] (https://a.com/1)\nSearch query: a\nalpha"));
    assert!(prompt.contains("[SOURCE 8]"));
    assert!(!prompt.contains("[SOURCE 9]"));
}

#[tokio::test]
async fn test_queries_are_never_reissued() {
    // 相关性判断始终不充分，建议中混入已经搜索过的查询
    let generator = Arc::new(
        ScriptedGenerator::new(&plan(&["a", "b", "a"])).with_relevance(|call| {
            format!(
                r#"{{"relevant": false, "suggestions": ["a", "b", "fresh {}", "fresh {}"]}}"#,
                call, call
            )
        }),
    );
    let backend = Arc::new(ScriptedBackend::new(per_query_hits));
    let orchestrator = ResearchOrchestrator::new(generator.clone(), adapter(backend.clone()), None);

    let outcome = orchestrator.research_run("q", &options(4)).await.unwrap();

    let issued: HashSet<&String> = outcome.issued_queries.iter().collect();
    assert_eq!(issued.len(), outcome.issued_queries.len());
    assert_eq!(
        outcome.issued_queries,
        vec!["a", "b", "fresh 0", "fresh 1", "fresh 2"]
    );
    assert_eq!(backend.queries(), outcome.issued_queries);
}

#[tokio::test]
async fn test_no_sources_skips_synthesis() {
    let generator = Arc::new(ScriptedGenerator::new(&plan(&["a", "b"])));
    let backend = Arc::new(ScriptedBackend::new(|_| Ok(vec![])));
    let orchestrator = ResearchOrchestrator::new(generator.clone(), adapter(backend), None);

    let answer = orchestrator.research("q", &options(3)).await.unwrap();

    assert_eq!(answer.text, NO_SOURCES_ANSWER);
    assert!(answer.sources.is_empty());
    assert_eq!(generator.synthesis_calls.load(Ordering::SeqCst), 0);
    assert_eq!(generator.relevance_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_refinement_loop_is_bounded() {
    let generator = Arc::new(
        ScriptedGenerator::new(&plan(&["a", "b"])).with_relevance(|call| {
            format!(
                r#"{{"relevant": false, "suggestions": ["refined {}"]}}"#,
                call
            )
        }),
    );
    let backend = Arc::new(ScriptedBackend::new(per_query_hits));
    let orchestrator = ResearchOrchestrator::new(generator.clone(), adapter(backend), None);

    let outcome = orchestrator.research_run("q", &options(3)).await.unwrap();

    assert_eq!(outcome.iterations, 3);
    assert_eq!(generator.relevance_calls.load(Ordering::SeqCst), 3);
    assert_eq!(generator.synthesis_calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        outcome.issued_queries,
        vec!["a", "b", "refined 0", "refined 1"]
    );
}

#[tokio::test]
async fn test_single_iteration_collapses_duplicate_source() {
    let generator = Arc::new(ScriptedGenerator::new(&plan(&["q1", "q2", "q3", "q4", "q5"])));
    let backend = Arc::new(ScriptedBackend::new(|_| Ok(vec![hit("http://a.com", "A", "x")])));
    let orchestrator = ResearchOrchestrator::new(generator.clone(), adapter(backend), None);

    let outcome = orchestrator.research_run("q", &options(1)).await.unwrap();

    assert_eq!(outcome.answer.sources.len(), 1);
    assert_eq!(outcome.answer.sources[0].url, "http://a.com");
    assert_eq!(outcome.answer.sources[0].title, "A");
    assert_eq!(outcome.iterations, 1);
}

#[tokio::test]
async fn test_fan_in_order_ignores_completion_order() {
    let generator = Arc::new(ScriptedGenerator::new(&plan(&["slow", "mid", "fast"])));
    let backend = Arc::new(ScriptedBackend::new(per_query_hits).with_latency(|query| {
        match query {
            "slow" => Duration::from_millis(400),
            "mid" => Duration::from_millis(200),
            _ => Duration::ZERO,
        }
    }));
    let orchestrator = ResearchOrchestrator::new(generator.clone(), adapter(backend), None);

    let started = Instant::now();
    let answer = orchestrator.research("q", &options(1)).await.unwrap();
    let elapsed = started.elapsed();

    let origins: Vec<&str> = answer.sources.iter().map(|s| s.query.as_str()).collect();
    assert_eq!(origins, vec!["slow", "slow", "slow", "mid", "mid", "fast", "fast"]);
    assert_eq!(answer.sources[0].url, "https://slow.com/1");
    assert_eq!(answer.sources[1].url, "https://shared.com");
    assert_eq!(answer.sources[6].url, "https://fast.com/2");
    // 串行执行至少需要 600ms
    assert!(elapsed < Duration::from_millis(550), "elapsed {:?}", elapsed);
}

#[tokio::test]
async fn test_insufficient_sources_go_straight_to_synthesis() {
    let generator = Arc::new(ScriptedGenerator::new(&plan(&["only"])));
    let backend = Arc::new(ScriptedBackend::new(per_query_hits));
    let orchestrator = ResearchOrchestrator::new(generator.clone(), adapter(backend), None);

    let outcome = orchestrator.research_run("q", &options(3)).await.unwrap();

    assert_eq!(outcome.answer.sources.len(), 3);
    assert_eq!(outcome.iterations, 1);
    assert_eq!(generator.relevance_calls.load(Ordering::SeqCst), 0);
    assert_eq!(generator.planner_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_slow_failing_store_does_not_delay_answer() {
    let generator = Arc::new(ScriptedGenerator::new(&plan(&["a", "b"])));
    let backend = Arc::new(ScriptedBackend::new(per_query_hits));
    let baseline = ResearchOrchestrator::new(generator.clone(), adapter(backend.clone()), None)
        .research("q", &options(1))
        .await
        .unwrap();

    let store = Arc::new(SlowStore {
        delay: Duration::from_secs(5),
        fail: true,
        ..Default::default()
    });
    let sink = PersistenceSink::new(Arc::new(UnitEmbedder), store);
    let orchestrator = ResearchOrchestrator::new(generator, adapter(backend), Some(sink));

    let started = Instant::now();
    let outcome = orchestrator.research_run("q", &options(1)).await.unwrap();
    let elapsed = started.elapsed();

    assert!(elapsed < Duration::from_secs(2), "run took {:?}", elapsed);
    assert_eq!(outcome.answer, baseline);
    // 每个有正文的新结果都派发了后台任务，返回时仍在运行
    assert_eq!(outcome.background.len(), 6);
    assert!(!outcome.background.drain(Duration::from_millis(10)).await);
}

#[tokio::test]
async fn test_background_persistence_payload() {
    let long_content = "z".repeat(6000);
    let generator = Arc::new(ScriptedGenerator::new(&plan(&["eggs"])));
    let backend = Arc::new(ScriptedBackend::new(move |_| {
        Ok(vec![
            hit("https://a.com", "A", &long_content),
            hit("https://empty.com", "E", ""),
        ])
    }));
    let store = Arc::new(SlowStore::default());
    let sink = PersistenceSink::new(Arc::new(UnitEmbedder), store.clone());
    let orchestrator = ResearchOrchestrator::new(generator, adapter(backend), Some(sink));

    let outcome = orchestrator
        .research_run("how to make an omelet", &options(1))
        .await
        .unwrap();
    assert!(outcome.background.drain(Duration::from_secs(5)).await);

    let points = store.points.lock().unwrap();
    // 正文为空的结果不入库
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].payload["url"], "https://a.com");
    assert_eq!(points[0].payload["query"], "how to make an omelet");
    assert_eq!(
        points[0].payload["content"].as_str().unwrap().chars().count(),
        5000
    );
}

#[tokio::test]
async fn test_failing_sub_query_is_isolated() {
    let generator = Arc::new(ScriptedGenerator::new(&plan(&["broken", "fine"])));
    let backend = Arc::new(ScriptedBackend::new(|query| {
        if query == "broken" {
            Err(anyhow!("HTTP 500"))
        } else {
            per_query_hits(query)
        }
    }));
    let orchestrator = ResearchOrchestrator::new(generator, adapter(backend), None);

    let answer = orchestrator.research("q", &options(1)).await.unwrap();

    assert_eq!(answer.sources.len(), 3);
    assert!(answer.sources.iter().all(|s| s.query == "fine"));
}

#[tokio::test]
async fn test_high_authority_filter_on_weak_backend() {
    let generator = Arc::new(ScriptedGenerator::new(&plan(&["news"])));
    let backend = Arc::new(
        ScriptedBackend::new(|_| {
            Ok(vec![
                hit("https://blog.example.com/post", "blog", "c"),
                hit("https://en.wikipedia.org/wiki/Omelette", "wiki", "c"),
                hit("https://spam.example.net", "spam", "c"),
                hit("https://www.reuters.com/a", "reuters", "c"),
                hit("https://random.io", "random", "c"),
                hit("https://www.bbc.com/b", "bbc", "c"),
            ])
        })
        .weak_filtering(),
    );
    let orchestrator = ResearchOrchestrator::new(generator, adapter(backend), None);

    let answer = orchestrator
        .research(
            "q",
            &ResearchOptions {
                max_iterations: 1,
                provider: SearchProvider::DuckDuckGo,
                include_domains: vec!["HIGH_AUTHORITY".to_string()],
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let titles: Vec<&str> = answer.sources.iter().map(|s| s.title.as_str()).collect();
    assert_eq!(titles, vec!["wiki", "reuters", "bbc"]);
}

#[tokio::test]
async fn test_planning_failure_is_fatal() {
    let generator = Arc::new(ScriptedGenerator::new("[]").failing_plan());
    let backend = Arc::new(ScriptedBackend::new(per_query_hits));
    let orchestrator = ResearchOrchestrator::new(generator, adapter(backend.clone()), None);

    let err = orchestrator.research("q", &options(3)).await.unwrap_err();

    assert!(matches!(err, ResearchError::Planning(_)));
    assert!(err.to_string().contains("planner backend down"));
    assert!(backend.queries().is_empty());
}

#[tokio::test]
async fn test_synthesis_failure_is_fatal() {
    let generator = Arc::new(ScriptedGenerator::new(&plan(&["a"])).failing_synthesis());
    let backend = Arc::new(ScriptedBackend::new(per_query_hits));
    let orchestrator = ResearchOrchestrator::new(generator, adapter(backend), None);

    let err = orchestrator.research("q", &options(3)).await.unwrap_err();

    assert!(matches!(err, ResearchError::Synthesis(_)));
}

#[tokio::test]
async fn test_relevance_failure_counts_as_sufficient() {
    let generator = Arc::new(
        ScriptedGenerator::new(&plan(&["a", "b"])).with_relevance(|_| "not json at all".to_string()),
    );
    let backend = Arc::new(ScriptedBackend::new(per_query_hits));
    let orchestrator = ResearchOrchestrator::new(generator.clone(), adapter(backend), None);

    let outcome = orchestrator.research_run("q", &options(5)).await.unwrap();

    assert_eq!(outcome.iterations, 1);
    assert_eq!(generator.relevance_calls.load(Ordering::SeqCst), 1);
    assert_eq!(generator.synthesis_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_invalid_options_rejected_before_planning() {
    let generator = Arc::new(ScriptedGenerator::new(&plan(&["a"])));
    let backend = Arc::new(ScriptedBackend::new(per_query_hits));
    let orchestrator = ResearchOrchestrator::new(generator.clone(), adapter(backend), None);

    let err = orchestrator.research("q", &options(0)).await.unwrap_err();

    assert!(matches!(err, ResearchError::InvalidOptions(_)));
    assert_eq!(generator.planner_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_decompose_falls_back_on_parse_failure() {
    let generator = Arc::new(ScriptedGenerator::new("I cannot produce JSON today"));
    let planner = QueryPlanner::new(generator);

    assert_eq!(planner.decompose("X?").await.unwrap(), vec!["X?", "X"]);
}
