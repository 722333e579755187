use crate::budget::{CostController, duration_ms};
use crate::chat::{ChatModel, Message};
use crate::config::AgentConfig;
use crate::error::{AgentError, ChatError, Result, ToolError};
use crate::tools::{ToolCall, ToolContext, ToolId, ToolRegistry, ToolResult};
use crate::trace::{AgentState, AgentTrace, StopReason, TraceEntry};
use log::{debug, info, warn};
use ragroute_async_utils::{Interrupted, OrCancelExt};
use ragroute_retrieval::{Query, RankedList, ScoredNode, StrategyId};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const PREVIEW_CHARS: usize = 200;

const REPLY_FORMAT: &str = r#"Reply with exactly one JSON object and nothing else:
{"action": "call_tool", "thought": "<why>", "tool": "<tool name>", "arguments": {...}}
or, once the collected passages are enough to answer:
{"action": "final", "thought": "<why>"}"#;

/// What the model asked for in one planning step.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum AgentAction {
    CallTool {
        #[serde(default)]
        thought: String,
        tool: String,
        #[serde(default)]
        arguments: Map<String, Value>,
    },
    Final {
        #[serde(default)]
        thought: String,
    },
}

/// Loop position. Terminal states are reached by breaking out with a [`StopReason`].
enum Step {
    Planning,
    ToolSelection(ToolCall),
    ToolExecution(ToolCall),
    Observation(ToolResult),
}

/// Everything an agent run produced.
#[derive(Debug, Clone)]
pub struct AgentRun {
    /// `Finalize` or `Aborted`
    pub state: AgentState,
    pub trace: AgentTrace,
    /// Nodes returned by successful retrieval tools, per strategy
    pub collected: BTreeMap<StrategyId, RankedList>,
    pub llm_calls: u32,
    pub iterations: usize,
}

impl AgentRun {
    pub fn has_results(&self) -> bool {
        self.collected.values().any(|list| !list.is_empty())
    }
}

/// Bounded think/act/observe loop over a [`ToolRegistry`].
///
/// Given the same model replies and tool outputs the loop takes the same
/// path, so runs can be replayed from a recorded script.
pub struct PlanningAgent {
    chat: Arc<dyn ChatModel>,
    tools: Arc<ToolRegistry>,
    config: AgentConfig,
}

impl PlanningAgent {
    pub fn new(chat: Arc<dyn ChatModel>, tools: Arc<ToolRegistry>, config: AgentConfig) -> Result<Self> {
        config.validate().map_err(AgentError::InvalidConfig)?;
        if tools.is_empty() {
            return Err(AgentError::InvalidConfig("tool registry is empty".to_string()));
        }
        Ok(Self { chat, tools, config })
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Run the loop for `query`. Only cancellation is an error; every other
    /// stop is reported through [`AgentRun::state`] and the trace.
    pub async fn run(
        &self,
        query: &Query,
        top_k: usize,
        cost: &CostController,
        cancel: &CancellationToken,
    ) -> Result<AgentRun> {
        let mut messages = vec![
            Message::system(self.system_prompt()),
            Message::user(query.text()),
        ];
        let mut trace = AgentTrace::new();
        let mut collected: BTreeMap<StrategyId, RankedList> = BTreeMap::new();
        let mut iterations = 0usize;
        let mut llm_calls = 0u32;
        let mut step = Step::Planning;

        let stop = loop {
            if cancel.is_cancelled() {
                return Err(AgentError::Cancelled);
            }

            step = match step {
                Step::Planning => {
                    if iterations >= self.config.max_iterations {
                        break StopReason::IterationLimit {
                            max_iterations: self.config.max_iterations,
                        };
                    }
                    if let Err(exceeded) = cost.try_consume(1) {
                        info!("Agent stopped by budget: {exceeded}");
                        break StopReason::Budget { exceeded };
                    }
                    iterations += 1;
                    llm_calls += 1;

                    let reply = self
                        .chat
                        .chat(&messages)
                        .or_deadline(self.config.llm_timeout(), cancel)
                        .await;
                    let completion = match reply {
                        Ok(Ok(completion)) => completion,
                        Ok(Err(err)) => {
                            warn!("Agent LLM call failed: {err}");
                            break StopReason::LlmFailure {
                                message: err.to_string(),
                            };
                        }
                        Err(Interrupted::Cancelled) => return Err(AgentError::Cancelled),
                        Err(Interrupted::TimedOut(after)) => {
                            let err = ChatError::Timeout(duration_ms(after));
                            warn!("Agent LLM call failed: {err}");
                            break StopReason::LlmFailure {
                                message: err.to_string(),
                            };
                        }
                    };
                    messages.push(Message::assistant(completion.content.clone()));

                    match parse_action(&completion.content) {
                        Ok(AgentAction::Final { thought }) => {
                            trace.record(AgentState::Planning, thought);
                            break StopReason::FinalAnswer;
                        }
                        Ok(AgentAction::CallTool {
                            thought,
                            tool,
                            arguments,
                        }) => {
                            let call = ToolCall { tool, arguments };
                            trace.push(TraceEntry {
                                state: AgentState::Planning,
                                thought,
                                call: Some(call.clone()),
                                result: None,
                            });
                            Step::ToolSelection(call)
                        }
                        Err(message) => {
                            debug!("Unparseable agent reply: {message}");
                            trace.record(
                                AgentState::Planning,
                                format!("unparseable reply: {message}"),
                            );
                            messages.push(Message::user(REPLY_FORMAT));
                            Step::Planning
                        }
                    }
                }

                Step::ToolSelection(call) => {
                    if self.tools.resolve(&call.tool).is_some() {
                        Step::ToolExecution(call)
                    } else {
                        let name = call.tool.clone();
                        let result = ToolResult::failed(
                            call.clone(),
                            ToolError::UnknownTool { name },
                            Duration::ZERO,
                        );
                        trace.push(TraceEntry {
                            state: AgentState::ToolSelection,
                            thought: String::new(),
                            call: Some(call),
                            result: Some(result.clone()),
                        });
                        Step::Observation(result)
                    }
                }

                Step::ToolExecution(call) => {
                    let evidence: Vec<ScoredNode> = collected
                        .values()
                        .flat_map(|list| list.iter().cloned())
                        .collect();
                    let ctx = ToolContext {
                        query,
                        top_k,
                        timeout: self.config.tool_timeout().min(cost.remaining()),
                        cancel,
                        evidence: &evidence,
                    };
                    let result = self.tools.invoke(call.clone(), &ctx).await;
                    if cancel.is_cancelled() {
                        return Err(AgentError::Cancelled);
                    }
                    trace.push(TraceEntry {
                        state: AgentState::ToolExecution,
                        thought: String::new(),
                        call: Some(call),
                        result: Some(result.clone()),
                    });
                    Step::Observation(result)
                }

                Step::Observation(result) => {
                    if result.is_success()
                        && let Ok(ToolId::Strategy(strategy)) = result.call.tool.parse::<ToolId>()
                    {
                        collected
                            .entry(strategy)
                            .or_default()
                            .extend_unique(result.output.clone());
                    }
                    let observation = self.observe(&result);
                    trace.record(AgentState::Observation, observation.clone());
                    messages.push(Message::user(observation));
                    Step::Planning
                }
            };
        };

        let state = if collected.values().any(|list| !list.is_empty()) {
            AgentState::Finalize
        } else {
            AgentState::Aborted
        };
        info!("Agent finished in {state:?} after {iterations} iteration(s): {stop:?}");
        trace.finish(state, stop);

        Ok(AgentRun {
            state,
            trace,
            collected,
            llm_calls,
            iterations,
        })
    }

    fn system_prompt(&self) -> String {
        let mut prompt = String::from(
            "You plan searches over a document index to answer the user's question. \
             Call one tool per step and stop as soon as the passages collected so far \
             are enough.\n\nTools:\n",
        );
        for tool in self.tools.list_tools() {
            let _ = writeln!(
                prompt,
                "- {}: {} Arguments: {}",
                tool.name, tool.description, tool.arg_schema
            );
        }
        prompt.push('\n');
        prompt.push_str(REPLY_FORMAT);
        prompt
    }

    fn observe(&self, result: &ToolResult) -> String {
        let tool = &result.call.tool;
        if let Some(error) = &result.error {
            return format!("Observation from {tool}: error: {error}");
        }

        let mut text = format!(
            "Observation from {tool}: {} result(s)",
            result.output.len()
        );
        for (rank, node) in result
            .output
            .iter()
            .take(self.config.observation_preview)
            .enumerate()
        {
            let id = node.id.as_deref().unwrap_or("-");
            let _ = write!(text, "\n{}. [{id}] {}", rank + 1, preview(&node.text));
        }
        text
    }
}

fn preview(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= PREVIEW_CHARS {
        return flat;
    }
    let mut cut: String = flat.chars().take(PREVIEW_CHARS).collect();
    cut.push('…');
    cut
}

/// Pull the JSON object out of a reply. Plain prose counts as a final answer.
fn parse_action(reply: &str) -> std::result::Result<AgentAction, String> {
    let trimmed = reply.trim();
    let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) else {
        return Ok(AgentAction::Final {
            thought: trimmed.to_string(),
        });
    };
    if end < start {
        return Ok(AgentAction::Final {
            thought: trimmed.to_string(),
        });
    }
    serde_json::from_str(&trimmed[start..=end]).map_err(|err| err.to_string())
}
