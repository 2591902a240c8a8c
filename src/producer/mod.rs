//! Producers feeding contributions into the rendezvous channel.
//!
//! Each producer runs on its own named OS thread, optionally waits out a
//! start delay and then performs a fixed number of blocking sends.
//!
//! The start delay ends early when the producer's cancel channel
//! disconnects, so a consumer that gave up is not kept waiting on a
//! sleeping producer.

use crate::channel::{Receiver, RecvTimeoutError, Sender};
use rand::Rng;
use std::io;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Start delay applied to each producer: a fixed base plus a random
/// jitter drawn uniformly from `0..=jitter`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DelayPolicy {
    pub base: Duration,
    pub jitter: Duration,
}

impl DelayPolicy {
    pub fn new(base: Duration, jitter: Duration) -> Self {
        Self { base, jitter }
    }

    /// Draw the delay for one producer.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        if self.jitter.is_zero() {
            return self.base;
        }
        let jitter_ms = u64::try_from(self.jitter.as_millis()).unwrap_or(u64::MAX);
        self.base
            .saturating_add(Duration::from_millis(rng.gen_range(0..=jitter_ms)))
    }
}

/// What a producer managed to do before it exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProducerOutcome {
    pub id: usize,
    /// Contributions taken by the consumer.
    pub sent: u64,
    /// Whether the producer stopped early because the run was abandoned.
    pub interrupted: bool,
}

/// A producer sending `count` copies of `contribution`.
#[derive(Debug, Clone)]
pub struct Producer {
    id: usize,
    count: u64,
    contribution: u64,
    delay: Duration,
    cancel: Option<Receiver<()>>,
}

impl Producer {
    pub fn new(id: usize, count: u64, contribution: u64) -> Self {
        Self {
            id,
            count,
            contribution,
            delay: Duration::ZERO,
            cancel: None,
        }
    }

    /// Wait `delay` before the first send.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Cut the start delay short once every sender of `cancel` is dropped.
    pub fn with_cancel(mut self, cancel: Receiver<()>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Wait out the start delay. Returns `false` when cancelled.
    fn wait_delay(&self) -> bool {
        if self.delay.is_zero() {
            return true;
        }
        trace!("Producer {} sleeping {:?}", self.id, self.delay);

        match self.cancel {
            Some(ref cancel) => match cancel.recv_timeout(self.delay) {
                Err(RecvTimeoutError::Timeout) => true,
                Ok(()) | Err(RecvTimeoutError::Disconnected) => false,
            },
            None => {
                thread::sleep(self.delay);
                true
            }
        }
    }

    /// Run the producer on the current thread.
    pub fn run(&self, tx: &Sender<u64>) -> ProducerOutcome {
        if !self.wait_delay() {
            debug!("Producer {} cancelled before its first send", self.id);
            return ProducerOutcome {
                id: self.id,
                sent: 0,
                interrupted: true,
            };
        }

        let mut sent = 0;
        while sent < self.count {
            if tx.send(self.contribution).is_err() {
                warn!(
                    "Producer {} stopped after {}/{} sends: receiver gone",
                    self.id, sent, self.count
                );
                return ProducerOutcome {
                    id: self.id,
                    sent,
                    interrupted: true,
                };
            }
            sent += 1;
        }

        debug!("Producer {} finished {} sends", self.id, sent);
        ProducerOutcome {
            id: self.id,
            sent,
            interrupted: false,
        }
    }

    /// Run the producer on a new thread named `producer-<id>`.
    pub fn spawn(self, tx: Sender<u64>) -> io::Result<JoinHandle<ProducerOutcome>> {
        thread::Builder::new()
            .name(format!("producer-{}", self.id))
            .spawn(move || self.run(&tx))
    }
}
