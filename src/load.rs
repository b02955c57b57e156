//! # Load Generator
//!
//! Executes a fixed number of identical operations across a bounded pool of
//! concurrently running tasks and reduces their outcomes into a [`Metrics`]
//! record.
//!
//! ## Execution Model
//!
//! Every invocation of the operation is spawned onto the Tokio runtime as its
//! own task, so on the multi-threaded runtime requests really run in parallel
//! across worker threads. The number of tasks in flight at any time is capped
//! at the configured concurrency by draining the spawned handles through
//! `buffer_unordered`: a new request is only spawned when a slot frees up.
//!
//! ## Aggregation
//!
//! Outcomes are folded by the single consumer of the completion stream, so
//! no shared mutable state is touched by the request tasks themselves. Each
//! request is accounted exactly once:
//! - `Ok(latency)` appends a latency sample
//! - `Err(_)` increments the error count
//! - a panicked or aborted task also increments the error count
//!
//! The generator never reports partial results and never retries.

use crate::metrics::Metrics;
use anyhow::Result;
use futures::stream::{self, StreamExt};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Bounded-concurrency executor for a single load run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadGenerator {
    num_requests: usize,
    concurrency: usize,
}

impl LoadGenerator {
    /// Create a generator issuing `num_requests` operations with at most
    /// `concurrency` of them in flight.
    ///
    /// A concurrency of zero is treated as one so the run always progresses.
    pub fn new(num_requests: usize, concurrency: usize) -> Self {
        Self {
            num_requests,
            concurrency: concurrency.max(1),
        }
    }

    pub fn num_requests(&self) -> usize {
        self.num_requests
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Run the operation `num_requests` times and aggregate the outcomes
    ///
    /// The operation yields the latency of one request on success, or an
    /// error for a failed request. Must be called from within a Tokio
    /// runtime; the multi-threaded flavour is required for true parallelism.
    pub async fn run<F, Fut>(&self, operation: F) -> Metrics
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Duration>> + Send + 'static,
    {
        debug!(
            "Starting load run: {} requests at concurrency {}",
            self.num_requests, self.concurrency
        );

        let operation = Arc::new(operation);
        let start_time = Instant::now();

        let mut latencies = Vec::with_capacity(self.num_requests);
        let mut errors = 0usize;

        let mut completions = stream::iter(0..self.num_requests)
            .map(|request_id| {
                let operation = Arc::clone(&operation);
                let handle = tokio::spawn(async move { operation().await });
                async move { (request_id, handle.await) }
            })
            .buffer_unordered(self.concurrency);

        while let Some((request_id, outcome)) = completions.next().await {
            match outcome {
                Ok(Ok(latency)) => latencies.push(latency),
                Ok(Err(e)) => {
                    trace!("Request {} failed: {:#}", request_id, e);
                    errors += 1;
                }
                Err(join_error) => {
                    debug!("Request {} task did not complete: {}", request_id, join_error);
                    errors += 1;
                }
            }
        }

        let elapsed = start_time.elapsed();
        let metrics = Metrics::from_samples(&latencies, errors, elapsed);

        debug!(
            "Load run finished in {:?}: {} successful, {} errors",
            elapsed, metrics.successful, metrics.errors
        );
        metrics
    }
}
