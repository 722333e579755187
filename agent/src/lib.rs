//! Planning agent for complex queries.
//!
//! A [`PlanningAgent`] drives a bounded think/act/observe loop: the chat
//! model picks a tool from the [`ToolRegistry`], the tool runs under a
//! per-call deadline, and the observation is fed back. Every step is
//! recorded in an [`AgentTrace`]. LLM calls and wall-clock time are charged
//! to a [`CostController`] before they happen, so a run never overspends.

mod budget;
mod chat;
mod config;
mod error;
mod planner;
mod tools;
mod trace;

pub use budget::{Budget, BudgetExceeded, BudgetSnapshot, CostController};
pub use chat::{ChatModel, Completion, Message, Role, Usage};
pub use config::AgentConfig;
pub use error::{AgentError, ChatError, Result, ToolError};
pub use planner::{AgentRun, PlanningAgent};
pub use tools::{
    RerankTool, RetrieverTool, ToolCall, ToolContext, ToolDescriptor, ToolHandler, ToolId,
    ToolRegistry, ToolResult,
};
pub use trace::{AgentState, AgentTrace, StopReason, TraceEntry};
