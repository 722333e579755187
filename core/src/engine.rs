use crate::config::EngineConfig;
use crate::error::{OrchestrationError, Result};
use crate::fallback::{DegradationLevel, FallbackChain};
use crate::outcome::{OutcomeStats, RerankStatus, RetrievalOutcome};
use futures::future::join_all;
use ragroute_agent::{
    AgentError, AgentTrace, Budget, ChatModel, CostController, PlanningAgent, RerankTool,
    StopReason, ToolRegistry,
};
use ragroute_async_utils::{Interrupted, OrCancelExt};
use ragroute_providers::{HttpScoreModel, OpenAiChatModel};
use ragroute_retrieval::{
    Bm25Retriever, FileSystemSearch, FilesViaContentRetriever, FilesViaMetadataRetriever,
    FusedResult, GrepRetriever, HybridRetriever, InMemoryIndex, KeywordSearch, LexicalScoreModel,
    Query, RankedList, Reranker, ResultMerger, RetrievalError, Retriever, ScoreModel, StrategyId,
    VectorRetriever, VectorSearch,
};
use ragroute_router::{QueryRouter, RoutingDecision, RoutingMode};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn fatal(message: impl Into<String>) -> OrchestrationError {
    let message = message.into();
    error!("Fatal configuration error: {message}");
    OrchestrationError::Configuration(message)
}

/// Wires backends and models into an [`OrchestrationEngine`].
pub struct EngineBuilder {
    config: EngineConfig,
    vector: Option<Arc<dyn VectorSearch>>,
    keyword: Option<Arc<dyn KeywordSearch>>,
    filesystem: Option<Arc<dyn FileSystemSearch>>,
    chat: Option<Arc<dyn ChatModel>>,
    score_model: Option<Arc<dyn ScoreModel>>,
}

impl EngineBuilder {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            vector: None,
            keyword: None,
            filesystem: None,
            chat: None,
            score_model: None,
        }
    }

    pub fn vector_search(mut self, backend: Arc<dyn VectorSearch>) -> Self {
        self.vector = Some(backend);
        self
    }

    pub fn keyword_search(mut self, backend: Arc<dyn KeywordSearch>) -> Self {
        self.keyword = Some(backend);
        self
    }

    pub fn filesystem_search(mut self, backend: Arc<dyn FileSystemSearch>) -> Self {
        self.filesystem = Some(backend);
        self
    }

    /// Serve all three search contracts from one in-memory corpus.
    pub fn in_memory(self, index: Arc<InMemoryIndex>) -> Self {
        self.vector_search(index.clone())
            .keyword_search(index.clone())
            .filesystem_search(index)
    }

    pub fn chat_model(mut self, chat: Arc<dyn ChatModel>) -> Self {
        self.chat = Some(chat);
        self
    }

    pub fn score_model(mut self, model: Arc<dyn ScoreModel>) -> Self {
        self.score_model = Some(model);
        self
    }

    /// Instantiate the HTTP providers named in `[providers]`. Models set
    /// explicitly on the builder take precedence.
    pub fn with_configured_providers(mut self) -> Result<Self> {
        if self.chat.is_none()
            && let Some(config) = &self.config.providers.chat
        {
            let chat = OpenAiChatModel::new(config.clone()).map_err(|err| fatal(err.to_string()))?;
            self.chat = Some(Arc::new(chat));
        }
        if self.score_model.is_none()
            && let Some(config) = &self.config.providers.rerank
        {
            let model = HttpScoreModel::new(config.clone()).map_err(|err| fatal(err.to_string()))?;
            self.score_model = Some(Arc::new(model));
        }
        Ok(self)
    }

    pub fn build(self) -> Result<OrchestrationEngine> {
        let config = self.config;
        config.validate().map_err(|err| fatal(err.to_string()))?;

        let merger = ResultMerger::from_config(&config.fusion);
        let vector = self
            .vector
            .map(|backend| Arc::new(VectorRetriever::new(backend)) as Arc<dyn Retriever>);
        let bm25 = self
            .keyword
            .map(|backend| Arc::new(Bm25Retriever::new(backend)) as Arc<dyn Retriever>);

        let mut retrievers: BTreeMap<StrategyId, Arc<dyn Retriever>> = BTreeMap::new();
        for strategy in StrategyId::ALL {
            if !config.strategies.is_enabled(strategy) {
                continue;
            }
            let retriever: Option<Arc<dyn Retriever>> = match strategy {
                StrategyId::Vector => vector.clone(),
                StrategyId::Bm25 => bm25.clone(),
                StrategyId::Hybrid => match (&vector, &bm25) {
                    (Some(vector), Some(bm25)) => Some(Arc::new(HybridRetriever::new(
                        vector.clone(),
                        bm25.clone(),
                        merger.clone(),
                        config
                            .fusion
                            .weights_for(&[StrategyId::Vector, StrategyId::Bm25]),
                    )) as Arc<dyn Retriever>),
                    _ => None,
                },
                StrategyId::Grep => self
                    .filesystem
                    .clone()
                    .map(|fs| Arc::new(GrepRetriever::new(fs)) as Arc<dyn Retriever>),
                StrategyId::FilesViaMetadata => self
                    .filesystem
                    .clone()
                    .map(|fs| Arc::new(FilesViaMetadataRetriever::new(fs)) as Arc<dyn Retriever>),
                StrategyId::FilesViaContent => self
                    .filesystem
                    .clone()
                    .map(|fs| Arc::new(FilesViaContentRetriever::new(fs)) as Arc<dyn Retriever>),
            };
            match retriever {
                Some(retriever) => {
                    retrievers.insert(strategy, retriever);
                }
                None => warn!("Strategy {strategy} is enabled but has no backend; skipping it"),
            }
        }
        if retrievers.is_empty() {
            return Err(fatal("no enabled strategy has a backend"));
        }

        let reranker = if config.rerank.enabled {
            let model: Arc<dyn ScoreModel> = self
                .score_model
                .unwrap_or_else(|| Arc::new(LexicalScoreModel) as Arc<dyn ScoreModel>);
            Some(Arc::new(Reranker::from_config(model, &config.rerank)))
        } else {
            None
        };

        let mut registry = ToolRegistry::with_retrievers(retrievers.values().cloned());
        if let Some(reranker) = &reranker {
            registry.register(Arc::new(RerankTool::new(
                Arc::clone(reranker),
                config.rerank.top_n,
            )));
        }
        let tools = Arc::new(registry);

        let agent = match self.chat {
            Some(chat) if config.agent.enabled => Some(
                PlanningAgent::new(chat, Arc::clone(&tools), config.agent.clone())
                    .map_err(|err| fatal(err.to_string()))?,
            ),
            None if config.agent.enabled => {
                info!("No chat model configured; complex queries use the fixed multi-strategy set");
                None
            }
            _ => None,
        };

        let router = QueryRouter::new(
            config.router.clone(),
            &config.fusion,
            retrievers.keys().copied().collect(),
            agent.is_some(),
        )
        .map_err(|err| fatal(err.to_string()))?;

        info!(
            "Orchestration engine ready: strategies {:?}, agent {}, rerank {}",
            retrievers.keys().collect::<Vec<_>>(),
            agent.is_some(),
            reranker.is_some()
        );

        Ok(OrchestrationEngine {
            config,
            retrievers,
            router,
            merger,
            reranker,
            tools,
            agent,
        })
    }
}

/// Mutable state of one query. Lives outside the execution future so that
/// it survives the future being dropped on timeout.
struct QueryRun {
    started: Instant,
    chain: FallbackChain,
    results: Vec<FusedResult>,
    trace: Option<AgentTrace>,
    stats: OutcomeStats,
}

enum Finish {
    Done(Result<()>),
    Cancelled,
    TimedOut,
}

/// Public entry point: routes, retrieves, fuses, reranks and degrades.
///
/// Holds only read-only configuration and shared backends; every query
/// gets its own budget, trace and fallback chain.
pub struct OrchestrationEngine {
    config: EngineConfig,
    retrievers: BTreeMap<StrategyId, Arc<dyn Retriever>>,
    router: QueryRouter,
    merger: ResultMerger,
    reranker: Option<Arc<Reranker>>,
    tools: Arc<ToolRegistry>,
    agent: Option<PlanningAgent>,
}

impl OrchestrationEngine {
    pub fn builder(config: EngineConfig) -> EngineBuilder {
        EngineBuilder::new(config)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Strategies that are enabled and have a backend.
    pub fn strategies(&self) -> Vec<StrategyId> {
        self.retrievers.keys().copied().collect()
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn agent_available(&self) -> bool {
        self.agent.is_some()
    }

    pub fn route(&self, query: &Query) -> RoutingDecision {
        self.router.route(query)
    }

    pub async fn query(&self, text: &str) -> Result<RetrievalOutcome> {
        let query = Query::new(text).with_max_results(self.config.max_results);
        self.query_with(query, CancellationToken::new()).await
    }

    /// Run `query` until it finishes, `cancel` fires, or the overall
    /// timeout elapses. Only cancellation and fatal configuration are errors.
    pub async fn query_with(
        &self,
        query: Query,
        cancel: CancellationToken,
    ) -> Result<RetrievalOutcome> {
        let started = Instant::now();
        let routing = self.router.route(&query);
        let mut run = QueryRun {
            started,
            chain: FallbackChain::new(),
            results: Vec::new(),
            trace: None,
            stats: OutcomeStats::default(),
        };
        run.stats.timings.routing_ms = millis(started.elapsed());
        info!(
            "Routed query to {:?} {:?} by rule {:?}",
            routing.mode, routing.strategies, routing.rule
        );

        let work = cancel.child_token();
        let timeout = self.config.timeout();
        let finish = tokio::select! {
            biased;
            _ = cancel.cancelled() => Finish::Cancelled,
            result = self.execute(&query, &routing, &mut run, &work) => Finish::Done(result),
            _ = tokio::time::sleep(timeout) => Finish::TimedOut,
        };
        work.cancel();

        match finish {
            Finish::Cancelled | Finish::Done(Err(OrchestrationError::Cancelled)) => {
                info!("Query cancelled after {:?}", started.elapsed());
                return Err(OrchestrationError::Cancelled);
            }
            Finish::Done(Err(err)) => return Err(err),
            Finish::TimedOut => {
                run.stats.timed_out = true;
                run.results.clear();
                run.chain.degrade(
                    DegradationLevel::PureGeneration,
                    format!("query timed out after {}ms", millis(timeout)),
                );
            }
            Finish::Done(Ok(())) => {}
        }

        run.stats.timings.total_ms = millis(started.elapsed());
        let (degraded_to, transitions) = run.chain.into_parts();
        info!(
            "Query finished in {}ms with {} results (degradation: {degraded_to})",
            run.stats.timings.total_ms,
            run.results.len()
        );

        Ok(RetrievalOutcome {
            results: run.results,
            trace: run.trace,
            degraded_to,
            routing,
            transitions,
            stats: run.stats,
        })
    }

    async fn execute(
        &self,
        query: &Query,
        routing: &RoutingDecision,
        run: &mut QueryRun,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.primary(query, routing, run, cancel).await?;
        if !run.results.is_empty() {
            return Ok(());
        }
        let mut cause = failure_cause(routing, run);

        let vector_alone =
            routing.mode == RoutingMode::Single && routing.strategies == [StrategyId::Vector];
        if vector_alone {
            debug!("Skipping single-strategy fallback: vector already ran alone");
        } else if self.retrievers.contains_key(&StrategyId::Vector) {
            run.chain.degrade(DegradationLevel::SingleStrategy, cause);

            let started = Instant::now();
            let lists = self
                .fan_out(&[StrategyId::Vector], query, run, cancel)
                .await?;
            run.stats.timings.fallback_ms = millis(started.elapsed());

            if let Some(list) = lists.get(&StrategyId::Vector)
                && !list.is_empty()
            {
                run.stats.candidates += list.len();
                let mut results = FusedResult::from_ranked(list);
                results.truncate(query.max_results());
                run.results = results;
                return Ok(());
            }
            cause = match run.stats.strategy_errors.get(&StrategyId::Vector) {
                Some(error) => format!("vector fallback failed: {error}"),
                None => "vector fallback returned no results".to_string(),
            };
        } else {
            debug!("Skipping single-strategy fallback: vector has no backend");
        }

        run.chain.degrade(DegradationLevel::PureGeneration, cause);
        Ok(())
    }

    /// Level 0: routed or agentic retrieval, fusion and rerank.
    async fn primary(
        &self,
        query: &Query,
        routing: &RoutingDecision,
        run: &mut QueryRun,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let stage = Instant::now();
        let (lists, weights) = match routing.mode {
            RoutingMode::Single | RoutingMode::MultiFixed => {
                let lists = self.fan_out(&routing.strategies, query, run, cancel).await?;
                run.stats.timings.retrieval_ms = millis(stage.elapsed());
                (lists, routing.weights.clone())
            }
            RoutingMode::Agentic => {
                let lists = self.run_agent(query, run, cancel).await?;
                run.stats.timings.agent_ms = millis(stage.elapsed());
                let strategies: Vec<StrategyId> = lists.keys().copied().collect();
                (lists, self.config.fusion.weights_for(&strategies))
            }
        };
        run.stats.candidates += lists.values().map(RankedList::len).sum::<usize>();

        let stage = Instant::now();
        let fused = match (routing.mode, lists.len()) {
            (RoutingMode::Single, 1) => lists
                .values()
                .next()
                .map(FusedResult::from_ranked)
                .unwrap_or_default(),
            _ => self.merger.merge(&lists, &weights),
        };
        run.stats.timings.fusion_ms = millis(stage.elapsed());
        if fused.is_empty() {
            return Ok(());
        }

        let mut results = self.rerank(query, fused, run, cancel).await?;
        results.truncate(query.max_results());
        run.results = results;
        Ok(())
    }

    /// Run `strategies` concurrently, each under its own deadline. Failures
    /// are recorded in the stats and left out of the returned lists.
    async fn fan_out(
        &self,
        strategies: &[StrategyId],
        query: &Query,
        run: &mut QueryRun,
        cancel: &CancellationToken,
    ) -> Result<BTreeMap<StrategyId, RankedList>> {
        let remaining = self.config.timeout().saturating_sub(run.started.elapsed());
        let deadline = self.config.strategy_timeout().min(remaining);
        let top_k = self.config.top_k;

        let calls = strategies
            .iter()
            .filter_map(|strategy| {
                self.retrievers
                    .get(strategy)
                    .map(|retriever| (*strategy, Arc::clone(retriever)))
            })
            .map(|(strategy, retriever)| async move {
                let started = Instant::now();
                let outcome = retriever
                    .retrieve(query, top_k, cancel)
                    .or_deadline(deadline, cancel)
                    .await;
                (strategy, outcome, started.elapsed())
            });
        let finished = join_all(calls).await;
        if cancel.is_cancelled() {
            return Err(OrchestrationError::Cancelled);
        }

        let mut lists = BTreeMap::new();
        for (strategy, outcome, elapsed) in finished {
            run.stats.strategy_ms.insert(strategy, millis(elapsed));
            let error = match outcome {
                Ok(Ok(list)) => {
                    debug!("Strategy {strategy} returned {} nodes in {elapsed:?}", list.len());
                    lists.insert(strategy, list);
                    continue;
                }
                Ok(Err(err)) => err,
                Err(Interrupted::TimedOut(after)) => RetrievalError::TimedOut {
                    strategy,
                    elapsed_ms: millis(after),
                },
                Err(Interrupted::Cancelled) => RetrievalError::Cancelled { strategy },
            };
            warn!("Strategy {strategy} failed: {error}");
            run.stats.strategy_errors.insert(strategy, error.to_string());
        }
        Ok(lists)
    }

    async fn run_agent(
        &self,
        query: &Query,
        run: &mut QueryRun,
        cancel: &CancellationToken,
    ) -> Result<BTreeMap<StrategyId, RankedList>> {
        let Some(agent) = &self.agent else {
            return Err(fatal("agentic route without a planning agent"));
        };

        let cost = CostController::started_at(
            Budget {
                max_llm_calls: self.config.agent.max_llm_calls,
                max_duration: self.config.timeout(),
            },
            run.started,
        );
        let outcome = agent.run(query, self.config.top_k, &cost, cancel).await;
        run.stats.llm_calls = cost.used_llm_calls();
        run.stats.budget = Some(cost.snapshot());

        let agent_run = outcome.map_err(|err| match err {
            AgentError::Cancelled => OrchestrationError::Cancelled,
            AgentError::InvalidConfig(message) => fatal(message),
        })?;
        run.trace = Some(agent_run.trace);
        Ok(agent_run.collected)
    }

    /// Best effort: any failure keeps the fused order.
    async fn rerank(
        &self,
        query: &Query,
        results: Vec<FusedResult>,
        run: &mut QueryRun,
        cancel: &CancellationToken,
    ) -> Result<Vec<FusedResult>> {
        let Some(reranker) = &self.reranker else {
            return Ok(results);
        };

        let started = Instant::now();
        let timeout = Duration::from_millis(self.config.rerank.timeout_ms);
        let outcome = reranker
            .rerank(query, results.clone(), self.config.rerank.top_n)
            .or_deadline(timeout, cancel)
            .await;
        run.stats.timings.rerank_ms = millis(started.elapsed());

        let reason = match outcome {
            Ok(Ok(reranked)) => {
                run.stats.rerank = RerankStatus::Applied;
                return Ok(reranked);
            }
            Ok(Err(err)) => err.to_string(),
            Err(Interrupted::TimedOut(after)) => format!("timed out after {}ms", millis(after)),
            Err(Interrupted::Cancelled) => return Err(OrchestrationError::Cancelled),
        };
        warn!("Rerank skipped, keeping fused order: {reason}");
        run.stats.rerank = RerankStatus::Skipped { reason };
        Ok(results)
    }
}

fn failure_cause(routing: &RoutingDecision, run: &QueryRun) -> String {
    if let Some(trace) = &run.trace {
        return match trace.stop_reason() {
            Some(StopReason::Budget { exceeded }) => {
                format!("agent stopped by budget with no results: {exceeded}")
            }
            Some(StopReason::LlmFailure { message }) => format!("agent LLM call failed: {message}"),
            _ => "agent collected no results".to_string(),
        };
    }

    let failures: Vec<String> = routing
        .strategies
        .iter()
        .filter_map(|strategy| {
            run.stats
                .strategy_errors
                .get(strategy)
                .map(|error| format!("{strategy}: {error}"))
        })
        .collect();
    if failures.is_empty() {
        "routed strategies returned no results".to_string()
    } else {
        format!("routed strategies returned no results ({})", failures.join("; "))
    }
}
