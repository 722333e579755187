//! Rule-based query routing.
//!
//! [`QueryRouter::route`] inspects a query once and returns an immutable
//! [`RoutingDecision`]: a single strategy, a fixed fused set, or a hand-off
//! to the planning agent. Routing never fails and has no side effects.

mod config;
mod error;
mod router;

pub use config::RouterConfig;
pub use error::{Result, RouterError};
pub use router::{
    QueryRouter, RouteRule, RouteSignals, RoutingDecision, RoutingMode, estimated_complexity,
};
