use crate::budget::duration_ms;
use crate::error::ToolError;
use async_trait::async_trait;
use log::{debug, warn};
use ragroute_async_utils::{Interrupted, OrCancelExt};
use ragroute_retrieval::{
    FusedResult, Query, RankedList, Reranker, RetrievalError, Retriever, ScoredNode, StrategyId,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Closed set of tools the agent may call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ToolId {
    Strategy(StrategyId),
    Rerank,
}

impl ToolId {
    pub fn name(self) -> &'static str {
        match self {
            ToolId::Strategy(strategy) => strategy.as_str(),
            ToolId::Rerank => "rerank",
        }
    }
}

impl fmt::Display for ToolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ToolId {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("rerank") {
            return Ok(ToolId::Rerank);
        }
        s.parse::<StrategyId>()
            .map(ToolId::Strategy)
            .map_err(|_| ToolError::UnknownTool {
                name: s.to_string(),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub arg_schema: Value,
}

/// A tool invocation as requested by the model. `tool` is the raw name and
/// may not exist in the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub call: ToolCall,
    pub output: RankedList,
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ToolError>,
}

impl ToolResult {
    pub fn failed(call: ToolCall, error: ToolError, elapsed: Duration) -> Self {
        Self {
            call,
            output: RankedList::new(),
            elapsed_ms: duration_ms(elapsed),
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Per-invocation inputs shared by every tool.
pub struct ToolContext<'a> {
    pub query: &'a Query,
    pub top_k: usize,
    pub timeout: Duration,
    pub cancel: &'a CancellationToken,
    /// Nodes gathered by earlier calls in this run
    pub evidence: &'a [ScoredNode],
}

#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn id(&self) -> ToolId;

    fn descriptor(&self) -> ToolDescriptor;

    async fn handle(
        &self,
        arguments: &Map<String, Value>,
        ctx: &ToolContext<'_>,
    ) -> Result<RankedList, ToolError>;
}

fn parse_args<T: for<'de> Deserialize<'de>>(arguments: &Map<String, Value>) -> Result<T, ToolError> {
    serde_json::from_value(Value::Object(arguments.clone())).map_err(|err| {
        ToolError::InvalidArguments {
            message: err.to_string(),
        }
    })
}

#[derive(Debug, Default, Deserialize)]
struct RetrieveArgs {
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    top_k: Option<usize>,
}

/// Exposes one [`Retriever`] as a tool.
pub struct RetrieverTool {
    retriever: Arc<dyn Retriever>,
}

impl RetrieverTool {
    pub fn new(retriever: Arc<dyn Retriever>) -> Self {
        Self { retriever }
    }
}

#[async_trait]
impl ToolHandler for RetrieverTool {
    fn id(&self) -> ToolId {
        ToolId::Strategy(self.retriever.strategy())
    }

    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.id().name().to_string(),
            description: self.retriever.description().to_string(),
            arg_schema: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Search text; defaults to the user's question"
                    },
                    "top_k": {
                        "type": "integer",
                        "minimum": 1,
                        "description": "Maximum number of results"
                    }
                }
            }),
        }
    }

    async fn handle(
        &self,
        arguments: &Map<String, Value>,
        ctx: &ToolContext<'_>,
    ) -> Result<RankedList, ToolError> {
        let args: RetrieveArgs = parse_args(arguments)?;
        let query = match args.query.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => ctx.query.rewritten(text),
            _ => ctx.query.clone(),
        };
        let top_k = args.top_k.unwrap_or(ctx.top_k).clamp(1, ctx.top_k.max(1));

        self.retriever
            .retrieve(&query, top_k, ctx.cancel)
            .await
            .map_err(|err| match err {
                RetrievalError::Cancelled { .. } => ToolError::Cancelled,
                RetrievalError::InvalidQuery { reason, .. } => {
                    ToolError::InvalidArguments { message: reason }
                }
                other => ToolError::Failed {
                    message: other.to_string(),
                },
            })
    }
}

#[derive(Debug, Default, Deserialize)]
struct RerankArgs {
    #[serde(default)]
    top_n: Option<usize>,
}

/// Reranks the evidence gathered so far. The output is an observation for
/// the model; it does not add new nodes.
pub struct RerankTool {
    reranker: Arc<Reranker>,
    default_top_n: usize,
}

impl RerankTool {
    pub fn new(reranker: Arc<Reranker>, default_top_n: usize) -> Self {
        Self {
            reranker,
            default_top_n: default_top_n.max(1),
        }
    }
}

#[async_trait]
impl ToolHandler for RerankTool {
    fn id(&self) -> ToolId {
        ToolId::Rerank
    }

    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: ToolId::Rerank.name().to_string(),
            description: "Re-score the passages collected so far against the question and \
                          show the best ones"
                .to_string(),
            arg_schema: json!({
                "type": "object",
                "properties": {
                    "top_n": {
                        "type": "integer",
                        "minimum": 1,
                        "description": "Number of passages to keep"
                    }
                }
            }),
        }
    }

    async fn handle(
        &self,
        arguments: &Map<String, Value>,
        ctx: &ToolContext<'_>,
    ) -> Result<RankedList, ToolError> {
        let args: RerankArgs = parse_args(arguments)?;
        if ctx.evidence.is_empty() {
            return Err(ToolError::Failed {
                message: "nothing collected yet; call a retrieval tool first".to_string(),
            });
        }

        let candidates = FusedResult::from_ranked(&RankedList::from_scored(ctx.evidence.to_vec()));
        let top_n = args.top_n.unwrap_or(self.default_top_n).max(1);
        let reranked = self
            .reranker
            .rerank(ctx.query, candidates, top_n)
            .await
            .map_err(|err| ToolError::Failed {
                message: err.to_string(),
            })?;

        Ok(RankedList::from_scored(
            reranked
                .into_iter()
                .map(|result| {
                    let mut node = result.node;
                    node.score = result.rerank_score.unwrap_or(result.fused_score);
                    node
                })
                .collect(),
        ))
    }
}

/// Named tools available to the agent, fixed at construction.
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<ToolId, Arc<dyn ToolHandler>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler`, replacing any tool with the same id.
    pub fn register(&mut self, handler: Arc<dyn ToolHandler>) {
        self.tools.insert(handler.id(), handler);
    }

    pub fn with_retrievers<I>(retrievers: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn Retriever>>,
    {
        let mut registry = Self::new();
        for retriever in retrievers {
            registry.register(Arc::new(RetrieverTool::new(retriever)));
        }
        registry
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn resolve(&self, name: &str) -> Option<ToolId> {
        let id = name.parse::<ToolId>().ok()?;
        self.tools.contains_key(&id).then_some(id)
    }

    /// Catalogue in a stable order.
    pub fn list_tools(&self) -> Vec<ToolDescriptor> {
        self.tools.values().map(|tool| tool.descriptor()).collect()
    }

    /// Run `call`. Failures, timeouts and cancellation are reported in the result.
    pub async fn invoke(&self, call: ToolCall, ctx: &ToolContext<'_>) -> ToolResult {
        let started = Instant::now();
        let Some(handler) = self
            .resolve(&call.tool)
            .and_then(|id| self.tools.get(&id))
        else {
            let name = call.tool.clone();
            return ToolResult::failed(call, ToolError::UnknownTool { name }, started.elapsed());
        };

        let outcome = handler
            .handle(&call.arguments, ctx)
            .or_deadline(ctx.timeout, ctx.cancel)
            .await;
        let elapsed = started.elapsed();

        let error = match outcome {
            Ok(Ok(output)) => {
                debug!("Tool {} returned {} nodes in {elapsed:?}", call.tool, output.len());
                return ToolResult {
                    call,
                    output,
                    elapsed_ms: duration_ms(elapsed),
                    error: None,
                };
            }
            Ok(Err(err)) => err,
            Err(Interrupted::Cancelled) => ToolError::Cancelled,
            Err(Interrupted::TimedOut(after)) => ToolError::TimedOut {
                timeout_ms: duration_ms(after),
            },
        };

        warn!("Tool {} failed: {error}", call.tool);
        ToolResult::failed(call, error, elapsed)
    }
}
