//! Data models for fan-in runs.
//!
//! This module contains the plan a run is started from, the consumer's
//! state machine and the report produced once a run finishes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors raised while validating a [`FanInPlan`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("at least one producer is required")]
    NoProducers,
    #[error("{producers} producers x {per_producer} contributions overflows the receive count")]
    ReceiveCountOverflow { producers: usize, per_producer: u64 },
    #[error("{receives} receives x contribution {contribution} overflows the aggregate")]
    AggregateOverflow { receives: u64, contribution: u64 },
}

/// Shape of a fan-in run: how many producers, how many contributions
/// each of them sends and the value of a single contribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FanInPlan {
    pub producers: usize,
    pub per_producer: u64,
    pub contribution: u64,
}

impl FanInPlan {
    /// Creates a plan, rejecting shapes whose totals cannot be represented.
    pub fn new(producers: usize, per_producer: u64, contribution: u64) -> Result<Self, PlanError> {
        let plan = Self {
            producers,
            per_producer,
            contribution,
        };
        plan.validate()?;
        Ok(plan)
    }

    /// Checks the plan before any thread is started.
    pub fn validate(&self) -> Result<(), PlanError> {
        if self.producers == 0 {
            return Err(PlanError::NoProducers);
        }
        self.expected_aggregate()?;
        Ok(())
    }

    /// Number of receives the consumer has to perform: `producers x per_producer`.
    pub fn expected_receives(&self) -> Result<u64, PlanError> {
        u64::try_from(self.producers)
            .ok()
            .and_then(|producers| producers.checked_mul(self.per_producer))
            .ok_or(PlanError::ReceiveCountOverflow {
                producers: self.producers,
                per_producer: self.per_producer,
            })
    }

    /// Value the aggregate must reach once every contribution is folded in.
    pub fn expected_aggregate(&self) -> Result<u64, PlanError> {
        let receives = self.expected_receives()?;
        receives
            .checked_mul(self.contribution)
            .ok_or(PlanError::AggregateOverflow {
                receives,
                contribution: self.contribution,
            })
    }
}

impl Default for FanInPlan {
    fn default() -> Self {
        Self {
            producers: 100,
            per_producer: 100,
            contribution: 1,
        }
    }
}

/// Consumer state machine.
///
/// `Waiting { received: k }` moves to `Waiting { received: k + 1 }` on
/// every receive until `k` reaches the expected count, at which point the
/// consumer is `Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    Waiting { received: u64 },
    Done,
}

impl ConsumerState {
    /// Initial state for a consumer expecting `expected` receives.
    pub fn start(expected: u64) -> Self {
        if expected == 0 {
            ConsumerState::Done
        } else {
            ConsumerState::Waiting { received: 0 }
        }
    }

    /// Transition taken after one more value has been received.
    pub fn advance(self, expected: u64) -> Self {
        match self {
            ConsumerState::Waiting { received } if received + 1 >= expected => {
                ConsumerState::Done
            }
            ConsumerState::Waiting { received } => ConsumerState::Waiting {
                received: received + 1,
            },
            ConsumerState::Done => ConsumerState::Done,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, ConsumerState::Done)
    }
}

/// Which command produced a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunKind {
    Count,
    Block,
    Stream,
}

impl fmt::Display for RunKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunKind::Count => write!(f, "count"),
            RunKind::Block => write!(f, "block"),
            RunKind::Stream => write!(f, "stream"),
        }
    }
}

/// Metadata about a finished run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    /// Command that was run.
    pub kind: RunKind,
    /// Date and time the run started.
    pub run_date: DateTime<Utc>,
    /// Number of producer threads.
    pub producers: usize,
    /// Contributions sent by each producer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_producer: Option<u64>,
    /// Value of a single contribution.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contribution: Option<u64>,
    /// Receives the consumer was told to expect.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_receives: Option<u64>,
    /// Wall-clock duration of the run in seconds.
    pub duration_seconds: f64,
}

/// The complete report of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub metadata: RunMetadata,
    /// Number of values the consumer received.
    pub received: u64,
    /// Final aggregate (fan-in runs only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregate: Option<u64>,
    /// Messages received (demo runs only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_plan_matches_count_example() {
        let plan = FanInPlan::default();
        assert_eq!(plan.expected_receives(), Ok(10_000));
        assert_eq!(plan.expected_aggregate(), Ok(10_000));
    }

    #[test]
    fn test_plan_rejects_zero_producers() {
        assert_eq!(FanInPlan::new(0, 10, 1), Err(PlanError::NoProducers));
    }

    #[test]
    fn test_plan_allows_zero_contributions() {
        let plan = FanInPlan::new(1, 0, 1).unwrap();
        assert_eq!(plan.expected_receives(), Ok(0));
        assert_eq!(plan.expected_aggregate(), Ok(0));
    }

    #[test]
    fn test_plan_detects_overflow() {
        assert!(matches!(
            FanInPlan::new(2, u64::MAX, 1),
            Err(PlanError::ReceiveCountOverflow { .. })
        ));
        assert!(matches!(
            FanInPlan::new(2, 2, u64::MAX),
            Err(PlanError::AggregateOverflow { receives: 4, .. })
        ));
    }

    #[test]
    fn test_consumer_state_transitions() {
        assert!(ConsumerState::start(0).is_done());

        let mut state = ConsumerState::start(3);
        assert_eq!(state, ConsumerState::Waiting { received: 0 });

        state = state.advance(3);
        assert_eq!(state, ConsumerState::Waiting { received: 1 });
        state = state.advance(3);
        assert_eq!(state, ConsumerState::Waiting { received: 2 });
        state = state.advance(3);
        assert!(state.is_done());
        assert!(state.advance(3).is_done());
    }

    #[test]
    fn test_report_skips_empty_fields() {
        let report = RunReport {
            metadata: RunMetadata {
                kind: RunKind::Count,
                run_date: Utc::now(),
                producers: 1,
                per_producer: Some(5),
                contribution: Some(1),
                expected_receives: Some(5),
                duration_seconds: 0.1,
            },
            received: 5,
            aggregate: Some(5),
            messages: Vec::new(),
        };

        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"kind\":\"count\""));
        assert!(json.contains("\"aggregate\":5"));
        assert!(!json.contains("messages"));
    }
}
