use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Limits for one query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budget {
    pub max_llm_calls: u32,
    pub max_duration: Duration,
}

/// A controlled stop, not a failure.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BudgetExceeded {
    #[error("LLM call budget exhausted ({used}/{limit})")]
    LlmCalls { used: u32, limit: u32 },

    #[error("time budget exhausted ({elapsed_ms}ms of {limit_ms}ms)")]
    Duration { elapsed_ms: u64, limit_ms: u64 },
}

/// Serializable view of a [`CostController`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetSnapshot {
    pub max_llm_calls: u32,
    pub used_llm_calls: u32,
    pub max_duration_ms: u64,
    pub elapsed_ms: u64,
}

/// Tracks LLM calls and wall-clock time against a [`Budget`].
///
/// Owned by a single query and shared only within it.
#[derive(Debug)]
pub struct CostController {
    budget: Budget,
    started_at: Instant,
    used_llm_calls: Mutex<u32>,
}

impl CostController {
    pub fn new(budget: Budget) -> Self {
        Self::started_at(budget, Instant::now())
    }

    pub fn started_at(budget: Budget, started_at: Instant) -> Self {
        Self {
            budget,
            started_at,
            used_llm_calls: Mutex::new(0),
        }
    }

    pub fn budget(&self) -> Budget {
        self.budget
    }

    /// Reserve `llm_calls` calls. Nothing is consumed on error.
    pub fn try_consume(&self, llm_calls: u32) -> Result<(), BudgetExceeded> {
        let mut used = self
            .used_llm_calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        self.check_duration()?;
        let wanted = used.saturating_add(llm_calls);
        if wanted > self.budget.max_llm_calls {
            return Err(BudgetExceeded::LlmCalls {
                used: *used,
                limit: self.budget.max_llm_calls,
            });
        }
        *used = wanted;
        Ok(())
    }

    /// Current state of the budget without consuming anything.
    pub fn check(&self) -> Result<(), BudgetExceeded> {
        self.check_duration()?;
        let used = self.used_llm_calls();
        if used >= self.budget.max_llm_calls {
            return Err(BudgetExceeded::LlmCalls {
                used,
                limit: self.budget.max_llm_calls,
            });
        }
        Ok(())
    }

    pub fn exceeded(&self) -> bool {
        self.check().is_err()
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn remaining(&self) -> Duration {
        self.budget.max_duration.saturating_sub(self.elapsed())
    }

    pub fn used_llm_calls(&self) -> u32 {
        *self
            .used_llm_calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> BudgetSnapshot {
        BudgetSnapshot {
            max_llm_calls: self.budget.max_llm_calls,
            used_llm_calls: self.used_llm_calls(),
            max_duration_ms: duration_ms(self.budget.max_duration),
            elapsed_ms: duration_ms(self.elapsed()),
        }
    }

    fn check_duration(&self) -> Result<(), BudgetExceeded> {
        let elapsed = self.elapsed();
        if elapsed >= self.budget.max_duration {
            return Err(BudgetExceeded::Duration {
                elapsed_ms: duration_ms(elapsed),
                limit_ms: duration_ms(self.budget.max_duration),
            });
        }
        Ok(())
    }
}

pub(crate) fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn budget(max_llm_calls: u32) -> Budget {
        Budget {
            max_llm_calls,
            max_duration: Duration::from_secs(60),
        }
    }

    #[test]
    fn test_consume_until_exhausted() {
        let cost = CostController::new(budget(2));
        assert!(cost.try_consume(1).is_ok());
        assert!(!cost.exceeded());
        assert!(cost.try_consume(1).is_ok());
        assert!(cost.exceeded());
        assert_eq!(
            cost.try_consume(1),
            Err(BudgetExceeded::LlmCalls { used: 2, limit: 2 })
        );
        assert_eq!(cost.used_llm_calls(), 2);
    }

    #[test]
    fn test_budget_stop_serializes_with_kind_tag() {
        let exceeded = BudgetExceeded::LlmCalls { used: 3, limit: 3 };
        let json = serde_json::to_value(exceeded).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"kind": "llm_calls", "used": 3, "limit": 3})
        );
        let back: BudgetExceeded = serde_json::from_value(json).unwrap();
        assert_eq!(back, exceeded);

        let stop = crate::trace::StopReason::Budget {
            exceeded: BudgetExceeded::Duration {
                elapsed_ms: 12,
                limit_ms: 10,
            },
        };
        let json = serde_json::to_string(&stop).unwrap();
        let back: crate::trace::StopReason = serde_json::from_str(&json).unwrap();
        assert_eq!(back, stop);
    }

    #[test]
    fn test_oversized_request_consumes_nothing() {
        let cost = CostController::new(budget(3));
        assert!(cost.try_consume(5).is_err());
        assert_eq!(cost.used_llm_calls(), 0);
    }

    #[test]
    fn test_duration_limit() {
        let cost = CostController::started_at(
            Budget {
                max_llm_calls: 10,
                max_duration: Duration::from_millis(5),
            },
            Instant::now() - Duration::from_millis(50),
        );
        assert!(matches!(
            cost.try_consume(1),
            Err(BudgetExceeded::Duration { limit_ms: 5, .. })
        ));
        assert_eq!(cost.remaining(), Duration::ZERO);
    }

    #[test]
    fn test_concurrent_consumers_never_overspend() {
        let cost = Arc::new(CostController::new(budget(50)));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cost = Arc::clone(&cost);
                std::thread::spawn(move || (0..20).filter(|_| cost.try_consume(1).is_ok()).count())
            })
            .collect();
        let granted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(granted, 50);
        assert_eq!(cost.used_llm_calls(), 50);
    }

    #[test]
    fn test_snapshot_serializes() {
        let cost = CostController::new(budget(4));
        cost.try_consume(1).unwrap();
        let json = serde_json::to_value(cost.snapshot()).unwrap();
        assert_eq!(json["used_llm_calls"], 1);
        assert_eq!(json["max_llm_calls"], 4);
    }
}
