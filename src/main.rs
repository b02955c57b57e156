//! # Search Benchmark - Main Entry Point
//!
//! Runs the benchmark phases against the selected search backends:
//!
//! 1. **Initialize logging**: colorized console output, optional log file
//! 2. **Load the corpus**: JSON documents from `--dataset-dir`
//! 3. **Indexing phase**: unless `--skip-indexing`
//! 4. **Single-query phase**: `--query` against every backend
//! 5. **Sweep phase**: when `--queries` is given, followed by the comparison
//! 6. **Export and cleanup**: JSON results to `--output-file`, backend data
//!    removed with `--cleanup`
//!
//! ## Error Handling
//!
//! Only setup problems (bad arguments, unreadable dataset, unusable
//! endpoints) abort the run. Failures while talking to a backend show up as
//! degraded metrics instead.

use anyhow::{Context, Result};
use clap::Parser;
use search_benchmark::{
    backend::{BackendFactory, BackendSettings},
    cli::{Args, BackendKind},
    dataset, logging,
    orchestrator::{BenchmarkOrchestrator, OrchestratorConfig},
    results::{ConsoleReporter, ResultsManager, SweepReporter, TestConfiguration},
    utils,
};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Held until exit so buffered file logs are flushed.
    let _log_guard = logging::init(args.verbose, args.quiet, args.log_file.as_deref())?;

    info!("Starting Search Benchmark v{}", search_benchmark::VERSION);

    let config = OrchestratorConfig::from_args(&args);
    config.validate().context("Invalid benchmark configuration")?;
    if !args.queries.is_empty() {
        utils::validate_queries(&args.queries)?;
    }

    let documents = dataset::load_dataset(&args.dataset_dir, args.num_index)?;
    if documents.is_empty() {
        warn!("Dataset is empty; indexing will measure nothing");
    }

    let kinds = BackendKind::expand_all(args.backends.clone());
    let settings = BackendSettings::from_args(&args);
    let backends = BackendFactory::create_all(&kinds, &settings)?;
    info!(
        "Backends under test: {}",
        kinds
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    );

    let mut results = args
        .output_file
        .as_deref()
        .map(|path| ResultsManager::new(path, TestConfiguration::new(&config, documents.len())));

    let orchestrator = BenchmarkOrchestrator::new(documents, backends, config)?;

    if args.skip_indexing {
        info!("Skipping indexing phase");
    } else {
        let reports = orchestrator.run_indexing_tests().await;
        if let Some(results) = results.as_mut() {
            results.add_indexing_reports(&reports);
        }
    }

    let reports = orchestrator.run_search_tests(&args.query).await;
    if let Some(results) = results.as_mut() {
        results.add_search_reports(&reports);
    }

    if !args.queries.is_empty() {
        let run = orchestrator.run_multiple_search_tests(&args.queries).await;
        ConsoleReporter.report_sweep(&run)?;
        if let Some(results) = results.as_mut() {
            results.report_sweep(&run)?;
        }
    }

    orchestrator.finish(results.as_ref(), args.cleanup).await?;
    info!("Search Benchmark completed");
    Ok(())
}
