//! Root of the `ragroute-core` library.
//!
//! [`OrchestrationEngine`] ties the router, the retrieval strategies, fusion,
//! reranking and the planning agent together and walks the
//! [`FallbackChain`] when a stage comes back empty.

mod config;
mod engine;
mod error;
mod fallback;
mod outcome;

pub use config::{EngineConfig, ProvidersConfig, StrategyToggles};
pub use engine::{EngineBuilder, OrchestrationEngine};
pub use error::{ConfigError, OrchestrationError, Result};
pub use fallback::{DegradationLevel, FallbackChain, LevelTransition};
pub use outcome::{OutcomeStats, RerankStatus, RetrievalOutcome, StageTimings};

pub use ragroute_agent::{AgentState, AgentTrace, ChatModel};
pub use ragroute_retrieval::{FusedResult, Query, StrategyId};
pub use ragroute_router::{RoutingDecision, RoutingMode};
