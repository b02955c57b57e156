use clap::{ArgAction, Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Search Benchmark - indexing and query performance across search backends
#[derive(Parser, Debug, Clone, Default)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Directory containing the JSON dataset files
    #[arg(long, help_heading = "Core Options")]
    pub dataset_dir: PathBuf,

    /// Search query for the single-query phase
    #[arg(long, default_value = crate::defaults::QUERY, help_heading = "Core Options")]
    pub query: String,

    /// Queries for the multi-query sweep (space-separated); enables the sweep phase
    #[arg(long, num_args = 1.., help_heading = "Core Options")]
    pub queries: Vec<String>,

    /// Backends to benchmark (space-separated: opensearch, meilisearch, solr, or all)
    #[arg(
        short = 'b',
        long,
        value_enum,
        num_args = 1..,
        default_values_t = vec![BackendKind::OpenSearch, BackendKind::Meilisearch],
        help_heading = "Core Options"
    )]
    pub backends: Vec<BackendKind>,

    /// Max number of documents to index
    #[arg(long, default_value_t = crate::defaults::NUM_INDEX)]
    pub num_index: usize,

    /// Number of search requests per load run
    #[arg(long, default_value_t = crate::defaults::NUM_SEARCH)]
    pub num_search: usize,

    /// Number of search requests in flight at once
    #[arg(short = 'c', long, default_value_t = crate::defaults::CONCURRENCY)]
    pub concurrency: usize,

    /// Pause between indexing and searching (e.g. "3s", "500ms")
    #[arg(long, value_parser = parse_duration, default_value = "3s")]
    pub refresh_wait: Duration,

    /// Per-request network timeout
    #[arg(long, value_parser = parse_duration, default_value = "30s")]
    pub request_timeout: Duration,

    /// Index / collection name used on every backend
    #[arg(long, default_value = crate::defaults::INDEX_NAME)]
    pub index_name: String,

    /// Output file for results (JSON format)
    #[arg(short = 'o', long)]
    pub output_file: Option<PathBuf>,

    /// Skip the indexing phase and search existing data
    #[arg(long, default_value_t = false)]
    pub skip_indexing: bool,

    /// Remove benchmark data from every backend when done
    #[arg(long, default_value_t = false)]
    pub cleanup: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short = 'v', long, action = ArgAction::Count, help_heading = "Logging")]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short = 'q', long, default_value_t = false, help_heading = "Logging")]
    pub quiet: bool,

    /// Also write logs to this file
    #[arg(long, help_heading = "Logging")]
    pub log_file: Option<PathBuf>,

    /// OpenSearch base URL
    #[arg(long, env = "OPENSEARCH_URL", default_value = "https://localhost:9200", help_heading = "OpenSearch")]
    pub opensearch_url: String,

    /// OpenSearch basic-auth user
    #[arg(long, env = "OPENSEARCH_USER", help_heading = "OpenSearch")]
    pub opensearch_user: Option<String>,

    /// OpenSearch basic-auth password
    #[arg(long, env = "OPENSEARCH_PASSWORD", hide_env_values = true, help_heading = "OpenSearch")]
    pub opensearch_password: Option<String>,

    /// PEM root certificate trusted for the OpenSearch endpoint
    #[arg(long, help_heading = "OpenSearch")]
    pub opensearch_ca_cert: Option<PathBuf>,

    /// Skip TLS certificate verification for OpenSearch
    #[arg(long, default_value_t = false, help_heading = "OpenSearch")]
    pub opensearch_insecure: bool,

    /// Number of primary shards of the benchmark index
    #[arg(long, default_value_t = 4, help_heading = "OpenSearch")]
    pub opensearch_shards: u32,

    /// Meilisearch base URL
    #[arg(long, env = "MEILISEARCH_URL", default_value = "http://localhost:7700", help_heading = "Meilisearch")]
    pub meilisearch_url: String,

    /// Meilisearch API key
    #[arg(long, env = "MEILISEARCH_API_KEY", hide_env_values = true, help_heading = "Meilisearch")]
    pub meilisearch_api_key: Option<String>,

    /// Solr base URL (up to and including `/solr`)
    #[arg(long, env = "SOLR_URL", default_value = "http://localhost:8983/solr", help_heading = "Solr")]
    pub solr_url: String,

    /// Solr collection (defaults to the index name)
    #[arg(long, help_heading = "Solr")]
    pub solr_collection: Option<String>,

    /// Documents per Solr update request
    #[arg(long, default_value_t = 500, help_heading = "Solr")]
    pub solr_batch_size: usize,
}

/// Available search backends
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
pub enum BackendKind {
    /// OpenSearch
    #[value(name = "opensearch")]
    OpenSearch,

    /// Meilisearch
    #[value(name = "meilisearch")]
    Meilisearch,

    /// Apache Solr
    #[value(name = "solr")]
    Solr,

    /// All available backends
    #[value(name = "all")]
    All,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::OpenSearch => write!(f, "OpenSearch"),
            BackendKind::Meilisearch => write!(f, "Meilisearch"),
            BackendKind::Solr => write!(f, "Solr"),
            BackendKind::All => write!(f, "All Backends"),
        }
    }
}

impl BackendKind {
    /// Expand the "All" variant to all available backends
    pub fn expand_all(backends: Vec<BackendKind>) -> Vec<BackendKind> {
        if backends.contains(&BackendKind::All) {
            vec![
                BackendKind::OpenSearch,
                BackendKind::Meilisearch,
                BackendKind::Solr,
            ]
        } else {
            let mut unique = Vec::with_capacity(backends.len());
            for backend in backends {
                if !unique.contains(&backend) {
                    unique.push(backend);
                }
            }
            unique
        }
    }
}

/// Parse duration from string (e.g., "10s", "5m", "500ms")
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();

    if s.is_empty() {
        return Err("Duration cannot be empty".to_string());
    }

    let (num_str, unit) = if let Some(stripped) = s.strip_suffix("ms") {
        (stripped, "ms")
    } else if let Some(stripped) = s.strip_suffix('s') {
        (stripped, "s")
    } else if let Some(stripped) = s.strip_suffix('m') {
        (stripped, "m")
    } else if let Some(stripped) = s.strip_suffix('h') {
        (stripped, "h")
    } else {
        (s, "s")
    };

    let num: f64 = num_str
        .parse()
        .map_err(|_| format!("Invalid number in duration: {}", num_str))?;
    if num < 0.0 {
        return Err(format!("Duration cannot be negative: {}", s));
    }

    let secs = match unit {
        "ms" => num / 1000.0,
        "s" => num,
        "m" => num * 60.0,
        "h" => num * 3600.0,
        _ => return Err(format!("Invalid duration unit: {}", unit)),
    };

    Duration::try_from_secs_f64(secs).map_err(|e| format!("Invalid duration {}: {}", s, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("10s").unwrap(), Duration::from_secs(10));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("10").unwrap(), Duration::from_secs(10));
        assert_eq!(parse_duration("0s").unwrap(), Duration::ZERO);

        assert!(parse_duration("").is_err());
        assert!(parse_duration("invalid").is_err());
        assert!(parse_duration("-1s").is_err());
        assert!(parse_duration("inf").is_err());
        assert!(parse_duration("NaN").is_err());
        assert!(parse_duration("1e30h").is_err());
    }

    #[test]
    fn test_backend_kind_display() {
        assert_eq!(BackendKind::OpenSearch.to_string(), "OpenSearch");
        assert_eq!(BackendKind::Meilisearch.to_string(), "Meilisearch");
        assert_eq!(BackendKind::Solr.to_string(), "Solr");
        assert_eq!(BackendKind::All.to_string(), "All Backends");
    }

    #[test]
    fn test_backend_kind_expand_all() {
        let all = vec![
            BackendKind::OpenSearch,
            BackendKind::Meilisearch,
            BackendKind::Solr,
        ];
        assert_eq!(BackendKind::expand_all(vec![BackendKind::All]), all);
        assert_eq!(
            BackendKind::expand_all(vec![BackendKind::Solr, BackendKind::All]),
            all
        );
        assert_eq!(
            BackendKind::expand_all(vec![BackendKind::Solr, BackendKind::Solr]),
            vec![BackendKind::Solr]
        );
    }

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from(["search-benchmark", "--dataset-dir", "/data"]).unwrap();

        assert_eq!(args.query, "APT28");
        assert_eq!(args.num_index, 50000);
        assert_eq!(args.num_search, 100);
        assert_eq!(args.concurrency, 10);
        assert_eq!(args.refresh_wait, Duration::from_secs(3));
        assert_eq!(
            args.backends,
            vec![BackendKind::OpenSearch, BackendKind::Meilisearch]
        );
        assert!(args.queries.is_empty());
    }

    #[test]
    fn test_args_query_list() {
        let args = Args::try_parse_from([
            "search-benchmark",
            "--dataset-dir",
            "/data",
            "--queries",
            "APT28",
            "Lazarus",
            "-b",
            "all",
        ])
        .unwrap();

        assert_eq!(args.queries, vec!["APT28", "Lazarus"]);
        assert_eq!(BackendKind::expand_all(args.backends), vec![
            BackendKind::OpenSearch,
            BackendKind::Meilisearch,
            BackendKind::Solr,
        ]);
    }
}
