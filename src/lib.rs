//! # Search Benchmark Library
//!
//! A backend-agnostic harness for measuring indexing and query performance of
//! search engines under controlled concurrent load.
//!
//! ## Supported Backends
//!
//! - **OpenSearch**: index per benchmark, `multi_match` queries
//! - **Meilisearch**: task-based writes, plain `q` queries
//! - **Solr**: explicit schema derived from the corpus, `select` queries
//!
//! ## Architecture Overview
//!
//! - `metrics`: the immutable `Metrics` record produced by every load run
//! - `load`: the bounded-concurrency `LoadGenerator`
//! - `schema`: field inference and declaration for backends needing a schema
//! - `backend`: the `SearchBackend` capability trait and its implementations
//! - `orchestrator`: indexing, single-query and multi-query sweep phases
//! - `results`: JSON export and the hand-off to external reporters
//! - `dataset`: corpus loading from a directory of JSON files
//! - `cli`, `logging`, `utils`: binary plumbing
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use search_benchmark::backend::{OpenSearchBackend, OpenSearchConfig, SearchBackend};
//! use search_benchmark::orchestrator::{BenchmarkOrchestrator, OrchestratorConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let documents = search_benchmark::dataset::load_dataset("./galaxies".as_ref(), 1000)?;
//!     let backends: Vec<Box<dyn SearchBackend>> =
//!         vec![Box::new(OpenSearchBackend::new(OpenSearchConfig::default())?)];
//!
//!     let orchestrator =
//!         BenchmarkOrchestrator::new(documents, backends, OrchestratorConfig::default())?;
//!     orchestrator.run_indexing_tests().await;
//!     let reports = orchestrator.run_search_tests("APT28").await;
//!     println!("{} backends measured", reports.len());
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod cli;
pub mod dataset;
pub mod load;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod results;
pub mod schema;
pub mod utils;

/// A corpus record: an arbitrary JSON object
pub type Document = serde_json::Map<String, serde_json::Value>;

pub use backend::{BackendFactory, SearchBackend};
pub use cli::{Args, BackendKind};
pub use load::LoadGenerator;
pub use metrics::{MetricKind, Metrics};
pub use orchestrator::{BenchmarkOrchestrator, BenchmarkRun, OrchestratorConfig};
pub use results::{ResultsManager, SweepReporter};
pub use schema::{FieldDefinition, FieldType, SchemaInferencer};

/// The current version of the search benchmark
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration values
pub mod defaults {
    use std::time::Duration;

    /// Query of the single-query phase
    pub const QUERY: &str = "APT28";

    /// Corpus size cap
    pub const NUM_INDEX: usize = 50000;

    /// Requests per load run
    pub const NUM_SEARCH: usize = 100;

    /// Requests in flight per load run
    pub const CONCURRENCY: usize = 10;

    /// Pause after bulk loading, since backends refresh asynchronously
    pub const REFRESH_WAIT: Duration = Duration::from_secs(3);

    /// Per-request network timeout
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    /// Index / collection name shared by all backends
    pub const INDEX_NAME: &str = "misp-galaxies";

    /// Upper bound accepted for the concurrency level
    pub const MAX_CONCURRENCY: usize = 1024;
}
