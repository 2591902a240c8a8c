//! Fan-in run orchestration.
//!
//! Wires a plan to a rendezvous channel: spawns one thread per producer,
//! runs the aggregator on the calling thread and joins the producers.
//!
//! The runner holds a sender for the whole run, so a shortfall keeps the
//! consumer waiting. When the consumer gives up, dropping the receiver
//! and the cancel sender releases every producer, whether it is blocked
//! in a send or still waiting out its start delay.

use crate::aggregation::{AggregateError, Aggregator};
use crate::channel::rendezvous;
use crate::models::{FanInPlan, PlanError};
use crate::producer::{DelayPolicy, Producer, ProducerOutcome};
use indicatif::{ProgressBar, ProgressStyle};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that end a fan-in run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("invalid plan: {0}")]
    Plan(#[from] PlanError),

    #[error("failed to spawn producer {id}: {source}")]
    Spawn {
        id: usize,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Aggregate(#[from] AggregateError),

    #[error("producer {0} panicked")]
    ProducerPanicked(usize),
}

/// Options that do not change the expected aggregate.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Bound on the consumer loop. `None` waits forever.
    pub timeout: Option<Duration>,
    /// Start delay for each producer.
    pub delay: DelayPolicy,
    /// Show a progress bar while consuming.
    pub progress: bool,
}

/// Result of a successful fan-in run.
#[derive(Debug, Clone)]
pub struct FanInOutcome {
    pub aggregate: u64,
    pub received: u64,
    pub producers: Vec<ProducerOutcome>,
    pub elapsed: Duration,
}

/// Run `plan` to completion.
pub fn run_fan_in(plan: FanInPlan, options: &RunOptions) -> Result<FanInOutcome, RunError> {
    let start_time = Instant::now();

    let mut aggregator = Aggregator::for_plan(&plan)?.with_timeout(options.timeout);
    let progress = options
        .progress
        .then(|| progress_bar(aggregator.expected()));
    if let Some(ref pb) = progress {
        aggregator = aggregator.with_progress(pb.clone());
    }

    let (tx, rx) = rendezvous();
    let (cancel_tx, cancel_rx) = rendezvous::<()>();
    let mut rng = rand::thread_rng();
    let mut handles: Vec<(usize, JoinHandle<ProducerOutcome>)> =
        Vec::with_capacity(plan.producers);

    info!(
        "Spawning {} producers x {} contributions of {}",
        plan.producers, plan.per_producer, plan.contribution
    );

    for id in 0..plan.producers {
        let producer = Producer::new(id, plan.per_producer, plan.contribution)
            .with_delay(options.delay.sample(&mut rng))
            .with_cancel(cancel_rx.clone());

        match producer.spawn(tx.clone()) {
            Ok(handle) => handles.push((id, handle)),
            Err(source) => {
                // Release the producers already started before bailing out.
                drop(rx);
                drop(cancel_tx);
                join_all(handles)?;
                return Err(RunError::Spawn { id, source });
            }
        }
    }

    let result = aggregator.sum(&rx);
    drop(cancel_tx);

    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    let aggregation = match result {
        Ok(aggregation) => aggregation,
        Err(err) => {
            warn!("Consumer gave up: {}", err);
            drop(rx);
            join_all(handles)?;
            return Err(err.into());
        }
    };

    let producers = join_all(handles)?;
    let elapsed = start_time.elapsed();
    debug!("Fan-in finished in {:?}", elapsed);

    Ok(FanInOutcome {
        aggregate: aggregation.value,
        received: aggregation.received,
        producers,
        elapsed,
    })
}

fn join_all(
    handles: Vec<(usize, JoinHandle<ProducerOutcome>)>,
) -> Result<Vec<ProducerOutcome>, RunError> {
    handles
        .into_iter()
        .map(|(id, handle)| handle.join().map_err(|_| RunError::ProducerPanicked(id)))
        .collect()
}

fn progress_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    let style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
    )
    .map(|style| style.progress_chars("#>-"))
    .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb
}
