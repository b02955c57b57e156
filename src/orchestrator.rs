//! # Benchmark Orchestration
//!
//! The orchestrator owns the document corpus and the configured backends and
//! drives the three benchmark phases against all of them:
//!
//! 1. **Indexing**: every backend ingests the full corpus and the wall-clock
//!    time is turned into a docs/sec figure.
//! 2. **Single query**: after a refresh pause, every backend runs one load
//!    run with identical `(query, num_requests, concurrency)` parameters.
//! 3. **Sweep**: a fixed, ordered list of queries is run against every
//!    backend and collected into a comparison matrix, the [`BenchmarkRun`].
//!
//! Backends are driven one after another so that load runs never overlap and
//! each backend is measured in isolation.

use crate::backend::SearchBackend;
use crate::metrics::{utils::format_latency, utils::format_rate, MetricKind, Metrics};
use crate::results::ResultsManager;
use crate::{cli::Args, Document};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Load parameters shared by every search phase
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    /// Requests issued per load run
    pub num_requests: usize,
    /// Requests in flight at once
    pub concurrency: usize,
    /// Pause between bulk loading and the single-query phase
    pub refresh_wait: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            num_requests: crate::defaults::NUM_SEARCH,
            concurrency: crate::defaults::CONCURRENCY,
            refresh_wait: crate::defaults::REFRESH_WAIT,
        }
    }
}

impl OrchestratorConfig {
    pub fn from_args(args: &Args) -> Self {
        Self {
            num_requests: args.num_search,
            concurrency: args.concurrency,
            refresh_wait: args.refresh_wait,
        }
    }

    /// Reject configurations the load generator cannot run
    ///
    /// Zero requests is accepted and yields all-zero metrics.
    pub fn validate(&self) -> Result<()> {
        crate::utils::validate_concurrency(self.concurrency)?;
        Ok(())
    }
}

/// Outcome of the indexing phase for one backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexingReport {
    pub backend: String,
    pub documents: usize,
    pub elapsed_secs: f64,
    /// Documents per second, 0 when the elapsed time is 0
    pub throughput: f64,
}

impl IndexingReport {
    pub fn new(backend: &str, documents: usize, elapsed: Duration) -> Self {
        let elapsed_secs = elapsed.as_secs_f64();
        let throughput = if elapsed_secs > 0.0 {
            documents as f64 / elapsed_secs
        } else {
            0.0
        };

        Self {
            backend: backend.to_string(),
            documents,
            elapsed_secs,
            throughput,
        }
    }
}

/// Outcome of one load run for one backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchReport {
    pub backend: String,
    pub query: String,
    pub metrics: Metrics,
}

/// Per-backend, per-metric values, one entry per query in sweep order
pub type ComparisonMatrix = BTreeMap<String, BTreeMap<MetricKind, Vec<f64>>>;

/// Result of a multi-query sweep
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkRun {
    pub queries: Vec<String>,
    pub matrix: ComparisonMatrix,
}

impl BenchmarkRun {
    /// Values of one metric for one backend, in query order
    pub fn series(&self, backend: &str, metric: MetricKind) -> Option<&[f64]> {
        self.matrix
            .get(backend)
            .and_then(|metrics| metrics.get(&metric))
            .map(Vec::as_slice)
    }

    /// Backend names present in the matrix
    pub fn backends(&self) -> impl Iterator<Item = &str> {
        self.matrix.keys().map(String::as_str)
    }

    fn record(&mut self, backend: &str, metrics: &Metrics) {
        let row = self.matrix.entry(backend.to_string()).or_default();
        for kind in MetricKind::ALL {
            row.entry(kind).or_default().push(metrics.value(kind));
        }
    }
}

/// Drives the benchmark phases over a fixed set of backends
pub struct BenchmarkOrchestrator {
    documents: Vec<Document>,
    backends: Vec<Box<dyn SearchBackend>>,
    config: OrchestratorConfig,
}

impl BenchmarkOrchestrator {
    /// Create an orchestrator over `backends`, in the order given
    pub fn new(
        documents: Vec<Document>,
        backends: Vec<Box<dyn SearchBackend>>,
        config: OrchestratorConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            documents,
            backends,
            config,
        })
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn backend_names(&self) -> Vec<&str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    /// Index the full corpus into every backend
    pub async fn run_indexing_tests(&self) -> Vec<IndexingReport> {
        print_banner("INDEXING PERFORMANCE TESTS");

        let mut reports = Vec::with_capacity(self.backends.len());
        for backend in &self.backends {
            info!(
                "Indexing {} documents into {}...",
                self.documents.len(),
                backend.name()
            );
            let elapsed = backend.index_documents(&self.documents).await;
            let report = IndexingReport::new(backend.name(), self.documents.len(), elapsed);
            print_indexing_report(&report);
            reports.push(report);
        }
        reports
    }

    /// Run one load run of `query` against every backend
    pub async fn run_search_tests(&self, query: &str) -> Vec<SearchReport> {
        if !self.config.refresh_wait.is_zero() {
            info!(
                "Waiting {:?} for indexes to refresh...",
                self.config.refresh_wait
            );
            tokio::time::sleep(self.config.refresh_wait).await;
        }

        print_banner("SEARCH PERFORMANCE TESTS");

        let mut reports = Vec::with_capacity(self.backends.len());
        for backend in &self.backends {
            info!(
                "Running {} searches for '{}' on {} (concurrency: {})...",
                self.config.num_requests,
                query,
                backend.name(),
                self.config.concurrency
            );
            let metrics = backend
                .search(query, self.config.num_requests, self.config.concurrency)
                .await;
            let report = SearchReport {
                backend: backend.name().to_string(),
                query: query.to_string(),
                metrics,
            };
            print_search_report(&report);
            reports.push(report);
        }
        reports
    }

    /// Run every query against every backend and collect the comparison
    /// matrix; values line up with `queries` order
    pub async fn run_multiple_search_tests(&self, queries: &[String]) -> BenchmarkRun {
        let mut run = BenchmarkRun {
            queries: queries.to_vec(),
            matrix: ComparisonMatrix::new(),
        };

        for query in queries {
            for backend in &self.backends {
                debug!("Sweep: '{}' on {}", query, backend.name());
                let metrics = backend
                    .search(query, self.config.num_requests, self.config.concurrency)
                    .await;
                run.record(backend.name(), &metrics);
            }
        }

        info!(
            "Sweep complete: {} queries across {} backends",
            queries.len(),
            self.backends.len()
        );
        run
    }

    /// Clean every backend, returning the names of those that failed
    ///
    /// A failing backend never prevents the remaining ones from being cleaned.
    pub async fn cleanup(&self) -> Vec<String> {
        let mut failed = Vec::new();
        for backend in &self.backends {
            match backend.cleanup().await {
                Ok(()) => debug!("{} cleaned up", backend.name()),
                Err(e) => {
                    error!("Cleanup of {} failed: {:#}", backend.name(), e);
                    failed.push(backend.name().to_string());
                }
            }
        }
        failed
    }

    /// Export the collected results, then clean the backends when asked
    ///
    /// Cleanup runs even when the export fails; the export error is returned
    /// once cleanup is done.
    pub async fn finish(&self, results: Option<&ResultsManager>, cleanup: bool) -> Result<()> {
        let export = results.map_or(Ok(()), ResultsManager::finalize);
        if let Err(e) = &export {
            error!("Failed to write results: {:#}", e);
        }

        if cleanup {
            let failed = self.cleanup().await;
            if !failed.is_empty() {
                warn!("Cleanup failed for: {}", failed.join(", "));
            }
        }

        export
    }
}

fn print_banner(title: &str) {
    println!("{}", "=".repeat(50));
    println!("{}", title);
    println!("{}", "=".repeat(50));
}

/// Print the indexing outcome of one backend
pub fn print_indexing_report(report: &IndexingReport) {
    println!("{} Indexing Results:", report.backend);
    println!("  Time Taken        : {:.2} seconds", report.elapsed_secs);
    println!("  Throughput        : {:.2} docs/sec", report.throughput);
    println!("{}", "-".repeat(50));
}

/// Print the load-run outcome of one backend
pub fn print_search_report(report: &SearchReport) {
    let m = &report.metrics;
    println!("{} Search Performance:", report.backend);
    println!("  Total Requests    : {}", m.total_requests);
    println!("  Successful        : {}", m.successful);
    println!("  Errors            : {}", m.errors);
    println!("  Avg Latency       : {}", format_latency(m.avg_latency));
    println!("  Median Latency    : {}", format_latency(m.median_latency));
    println!("  Throughput        : {}", format_rate(m.throughput, "req"));
    println!("{}", "-".repeat(50));
}
