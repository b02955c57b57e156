//! Search backends under test.
//!
//! Each engine implements [`SearchBackend`]; the orchestrator only ever sees
//! the trait object, so adding an engine means adding a module here and a
//! variant to [`BackendKind`].

use crate::cli::{Args, BackendKind};
use crate::{metrics::Metrics, Document};
use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

pub mod http;
pub mod meilisearch;
pub mod opensearch;
pub mod solr;

use self::http::HttpOptions;

pub use meilisearch::{MeilisearchBackend, MeilisearchConfig};
pub use opensearch::{OpenSearchBackend, OpenSearchConfig};
pub use solr::{SolrBackend, SolrConfig, SolrSchemaClient};

/// Failure of a single request against a backend
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("{operation} returned HTTP status {status}")]
    UnexpectedStatus { operation: &'static str, status: u16 },

    #[error("{operation} request failed: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid endpoint '{0}'")]
    InvalidEndpoint(String),
}

/// Uniform capability set of a search engine under test
///
/// Indexing and searching never fail at the signature level: per-document
/// indexing errors are swallowed and per-request search errors are counted
/// in the returned [`Metrics`]. Only `cleanup` reports failure.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Display name used in reports and the comparison matrix
    fn name(&self) -> &str;

    /// Index every document that the backend accepts and make it visible to
    /// searches, returning the wall-clock time spent
    async fn index_documents(&self, documents: &[Document]) -> Duration;

    /// Issue `num_requests` identical queries with at most `concurrency` in
    /// flight
    async fn search(&self, query: &str, num_requests: usize, concurrency: usize) -> Metrics;

    /// Remove benchmark-created data. Calling this on a clean backend
    /// succeeds.
    async fn cleanup(&self) -> Result<()>;
}

/// Connection settings for every supported backend
#[derive(Debug, Clone, Default)]
pub struct BackendSettings {
    pub opensearch: OpenSearchConfig,
    pub meilisearch: MeilisearchConfig,
    pub solr: SolrConfig,
}

impl BackendSettings {
    /// Connection settings taken from the command line
    ///
    /// The index name is shared by every backend; the Solr collection falls
    /// back to it when not given explicitly.
    pub fn from_args(args: &Args) -> Self {
        let http = HttpOptions {
            request_timeout: args.request_timeout,
            ..HttpOptions::default()
        };

        Self {
            opensearch: OpenSearchConfig {
                url: args.opensearch_url.clone(),
                username: args.opensearch_user.clone(),
                password: args.opensearch_password.clone(),
                index_name: args.index_name.clone(),
                shards: args.opensearch_shards,
                http: HttpOptions {
                    ca_cert: args.opensearch_ca_cert.clone(),
                    accept_invalid_certs: args.opensearch_insecure,
                    ..http.clone()
                },
            },
            meilisearch: MeilisearchConfig {
                url: args.meilisearch_url.clone(),
                api_key: args.meilisearch_api_key.clone(),
                index_name: args.index_name.clone(),
                http: http.clone(),
                ..MeilisearchConfig::default()
            },
            solr: SolrConfig {
                url: args.solr_url.clone(),
                collection: args
                    .solr_collection
                    .clone()
                    .unwrap_or_else(|| args.index_name.clone()),
                batch_size: args.solr_batch_size,
                http,
                ..SolrConfig::default()
            },
        }
    }
}

/// Factory for creating backend instances
pub struct BackendFactory;

impl BackendFactory {
    /// Create a backend for `kind` from its connection settings
    pub fn create(kind: BackendKind, settings: &BackendSettings) -> Result<Box<dyn SearchBackend>> {
        match kind {
            BackendKind::OpenSearch => Ok(Box::new(OpenSearchBackend::new(
                settings.opensearch.clone(),
            )?)),
            BackendKind::Meilisearch => Ok(Box::new(MeilisearchBackend::new(
                settings.meilisearch.clone(),
            )?)),
            BackendKind::Solr => Ok(Box::new(SolrBackend::new(settings.solr.clone())?)),
            BackendKind::All => Err(anyhow::anyhow!(
                "'All' backend should be expanded before backend creation"
            )),
        }
    }

    /// Create one backend per kind, preserving order
    pub fn create_all(
        kinds: &[BackendKind],
        settings: &BackendSettings,
    ) -> Result<Vec<Box<dyn SearchBackend>>> {
        kinds
            .iter()
            .map(|kind| Self::create(*kind, settings))
            .collect()
    }
}
