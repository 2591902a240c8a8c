//! Fan-in consumer.
//!
//! The aggregator performs exactly the number of receives it was built
//! with and folds every value into an accumulator that it alone owns.
//! The fold must be commutative and associative: producers interleave in
//! no particular order.
//!
//! Without a timeout a shortfall blocks the consumer forever. With one,
//! the shortfall is reported as [`AggregateError::TimedOut`].

use crate::channel::{Receiver, RecvTimeoutError};
use crate::models::{ConsumerState, FanInPlan, PlanError};
use indicatif::ProgressBar;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, trace};

/// Errors raised by the consumer loop.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregateError {
    #[error("timed out after receiving {received} of {expected} contributions")]
    TimedOut { received: u64, expected: u64 },

    #[error("channel disconnected after receiving {received} of {expected} contributions")]
    Closed { received: u64, expected: u64 },

    #[error("aggregate overflowed after receiving {received} contributions")]
    Overflow { received: u64 },
}

/// Result of a completed consumer loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Aggregation<A> {
    pub value: A,
    pub received: u64,
}

/// Consumer performing a fixed number of receives.
#[derive(Clone)]
pub struct Aggregator {
    expected: u64,
    timeout: Option<Duration>,
    progress: Option<ProgressBar>,
}

impl Aggregator {
    /// Consumer expecting exactly `expected` receives.
    pub fn new(expected: u64) -> Self {
        Self {
            expected,
            timeout: None,
            progress: None,
        }
    }

    /// Consumer expecting `producers x per_producer` receives.
    pub fn for_plan(plan: &FanInPlan) -> Result<Self, PlanError> {
        plan.validate()?;
        Ok(Self::new(plan.expected_receives()?))
    }

    /// Bound the whole loop by `timeout`. `None`, or a timeout too large
    /// to express as a deadline, waits forever.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Advance `progress` by one on every receive.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn expected(&self) -> u64 {
        self.expected
    }

    /// Sum the received contributions.
    pub fn sum(&self, rx: &Receiver<u64>) -> Result<Aggregation<u64>, AggregateError> {
        self.try_fold(rx, 0u64, |acc, value| acc.checked_add(value))
    }

    /// Receive exactly `expected` values and fold them into `init`.
    ///
    /// `fold` returns `None` when the accumulator cannot absorb a value,
    /// which ends the loop with [`AggregateError::Overflow`].
    pub fn try_fold<T, A, F>(
        &self,
        rx: &Receiver<T>,
        init: A,
        mut fold: F,
    ) -> Result<Aggregation<A>, AggregateError>
    where
        F: FnMut(A, T) -> Option<A>,
    {
        let deadline = self
            .timeout
            .and_then(|timeout| Instant::now().checked_add(timeout));
        let mut state = ConsumerState::start(self.expected);
        let mut acc = init;
        let mut received = 0u64;

        info!("Consumer waiting for {} contributions", self.expected);

        while !state.is_done() {
            let value = match deadline {
                Some(deadline) => rx.recv_deadline(deadline),
                None => rx.recv().map_err(RecvTimeoutError::from),
            };

            let value = value.map_err(|err| match err {
                RecvTimeoutError::Timeout => AggregateError::TimedOut {
                    received,
                    expected: self.expected,
                },
                RecvTimeoutError::Disconnected => AggregateError::Closed {
                    received,
                    expected: self.expected,
                },
            })?;

            acc = fold(acc, value).ok_or(AggregateError::Overflow { received })?;
            received += 1;
            state = state.advance(self.expected);
            trace!(?state, "Consumer received contribution");

            if let Some(ref progress) = self.progress {
                progress.inc(1);
            }
        }

        info!("Consumer done after {} receives", received);

        Ok(Aggregation {
            value: acc,
            received,
        })
    }
}
