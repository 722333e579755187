use crate::budget::BudgetExceeded;
use crate::tools::{ToolCall, ToolResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    Planning,
    ToolSelection,
    ToolExecution,
    Observation,
    Finalize,
    Aborted,
}

impl AgentState {
    pub fn is_terminal(self) -> bool {
        matches!(self, AgentState::Finalize | AgentState::Aborted)
    }
}

/// Why the loop stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum StopReason {
    /// The model signalled it had enough
    FinalAnswer,
    IterationLimit { max_iterations: usize },
    Budget { exceeded: BudgetExceeded },
    LlmFailure { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub state: AgentState,
    pub thought: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call: Option<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ToolResult>,
}

/// Append-only record of an agent run. Frozen once finished.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentTrace {
    entries: Vec<TraceEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    outcome: Option<AgentState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    stop_reason: Option<StopReason>,
}

impl AgentTrace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false once the trace is terminal.
    pub fn push(&mut self, entry: TraceEntry) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.entries.push(entry);
        true
    }

    pub(crate) fn record(&mut self, state: AgentState, thought: impl Into<String>) {
        self.push(TraceEntry {
            state,
            thought: thought.into(),
            call: None,
            result: None,
        });
    }

    pub(crate) fn finish(&mut self, outcome: AgentState, reason: StopReason) {
        if self.is_terminal() {
            return;
        }
        self.entries.push(TraceEntry {
            state: outcome,
            thought: String::new(),
            call: None,
            result: None,
        });
        self.outcome = Some(outcome);
        self.stop_reason = Some(reason);
    }

    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }

    pub fn is_terminal(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn outcome(&self) -> Option<AgentState> {
        self.outcome
    }

    pub fn stop_reason(&self) -> Option<&StopReason> {
        self.stop_reason.as_ref()
    }

    pub fn count(&self, state: AgentState) -> usize {
        self.entries.iter().filter(|e| e.state == state).count()
    }

    /// Distinct node ids returned by successful tool calls, in first-seen order.
    pub fn sources(&self) -> Vec<String> {
        let mut sources: Vec<String> = Vec::new();
        let nodes = self
            .entries
            .iter()
            .filter_map(|entry| entry.result.as_ref())
            .filter(|result| result.is_success())
            .flat_map(|result| result.output.iter());
        for node in nodes {
            let key = node.id.clone().unwrap_or_else(|| node.dedup_key());
            if !sources.contains(&key) {
                sources.push(key);
            }
        }
        sources
    }
}
