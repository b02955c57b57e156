//! # Results Export
//!
//! Collects the reports of every benchmark phase and writes them as one JSON
//! document. The sweep matrix leaves the core through [`SweepReporter`], so
//! plotting or other renderers plug in without the orchestrator knowing
//! their output format.

use crate::orchestrator::{BenchmarkRun, IndexingReport, OrchestratorConfig, SearchReport};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Consumer of the multi-query comparison matrix
pub trait SweepReporter {
    fn report_sweep(&mut self, run: &BenchmarkRun) -> Result<()>;
}

/// Prints the comparison tables to stdout
#[derive(Debug, Default)]
pub struct ConsoleReporter;

impl SweepReporter for ConsoleReporter {
    fn report_sweep(&mut self, run: &BenchmarkRun) -> Result<()> {
        crate::utils::print_comparison(run);
        Ok(())
    }
}

/// Load parameters recorded alongside the results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestConfiguration {
    pub num_requests: usize,
    pub concurrency: usize,
    pub refresh_wait_secs: f64,
    pub corpus_size: usize,
}

impl TestConfiguration {
    pub fn new(config: &OrchestratorConfig, corpus_size: usize) -> Self {
        Self {
            num_requests: config.num_requests,
            concurrency: config.concurrency,
            refresh_wait_secs: config.refresh_wait.as_secs_f64(),
            corpus_size,
        }
    }
}

/// Benchmark metadata
#[derive(Debug, Serialize, Deserialize)]
pub struct BenchmarkMetadata {
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub configuration: TestConfiguration,
}

/// Final benchmark results structure
#[derive(Debug, Serialize, Deserialize)]
pub struct FinalBenchmarkResults {
    pub metadata: BenchmarkMetadata,
    pub indexing: Vec<IndexingReport>,
    pub search: Vec<SearchReport>,
    pub sweep: Option<BenchmarkRun>,
}

/// Accumulates phase reports and writes them to the output file
pub struct ResultsManager {
    output_file: PathBuf,
    configuration: TestConfiguration,
    indexing: Vec<IndexingReport>,
    search: Vec<SearchReport>,
    sweep: Option<BenchmarkRun>,
}

impl ResultsManager {
    pub fn new(output_file: &Path, configuration: TestConfiguration) -> Self {
        Self {
            output_file: output_file.to_path_buf(),
            configuration,
            indexing: Vec::new(),
            search: Vec::new(),
            sweep: None,
        }
    }

    pub fn add_indexing_reports(&mut self, reports: &[IndexingReport]) {
        debug!("Recording {} indexing reports", reports.len());
        self.indexing.extend_from_slice(reports);
    }

    pub fn add_search_reports(&mut self, reports: &[SearchReport]) {
        debug!("Recording {} search reports", reports.len());
        self.search.extend_from_slice(reports);
    }

    /// Write everything collected so far as pretty-printed JSON
    pub fn finalize(&self) -> Result<()> {
        let results = FinalBenchmarkResults {
            metadata: BenchmarkMetadata {
                version: crate::VERSION.to_string(),
                timestamp: chrono::Utc::now(),
                configuration: self.configuration.clone(),
            },
            indexing: self.indexing.clone(),
            search: self.search.clone(),
            sweep: self.sweep.clone(),
        };

        let json = serde_json::to_string_pretty(&results)?;
        std::fs::write(&self.output_file, json).with_context(|| {
            format!("Failed to write results to {}", self.output_file.display())
        })?;

        info!("Results written to: {:?}", self.output_file);
        Ok(())
    }
}

impl SweepReporter for ResultsManager {
    fn report_sweep(&mut self, run: &BenchmarkRun) -> Result<()> {
        self.sweep = Some(run.clone());
        Ok(())
    }
}
