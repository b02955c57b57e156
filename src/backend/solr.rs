use super::http::{self, HttpOptions};
use super::{BackendError, SearchBackend};
use crate::schema::{self, FieldDeclaration, SchemaClient, SchemaInferencer, CATCH_ALL_FIELD};
use crate::{load::LoadGenerator, metrics::Metrics, Document};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Connection settings for a Solr collection
#[derive(Debug, Clone)]
pub struct SolrConfig {
    /// Base URL of the Solr web app, e.g. `http://localhost:8983/solr`
    pub url: String,
    pub collection: String,
    /// Documents per update request
    pub batch_size: usize,
    pub catch_all_field: String,
    pub http: HttpOptions,
}

impl Default for SolrConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8983/solr".to_string(),
            collection: crate::defaults::INDEX_NAME.to_string(),
            batch_size: 500,
            catch_all_field: CATCH_ALL_FIELD.to_string(),
            http: HttpOptions::default(),
        }
    }
}

fn collection_url(config: &SolrConfig, segments: &[&str]) -> Result<Url, BackendError> {
    let mut all = vec![config.collection.as_str()];
    all.extend_from_slice(segments);
    http::endpoint(&config.url, &all)
}

/// Schema API client for one collection
///
/// Every call is a single request keyed on its status: 200 is success,
/// anything else is reported as a failure.
pub struct SolrSchemaClient {
    client: Client,
    schema_url: Url,
}

impl SolrSchemaClient {
    pub fn new(client: Client, config: &SolrConfig) -> Result<Self> {
        let schema_url = collection_url(config, &["schema"])?;
        Ok(Self { client, schema_url })
    }

    async fn post_command(&self, command: Value, operation: &'static str) -> Result<()> {
        let response = self
            .client
            .post(self.schema_url.clone())
            .json(&command)
            .send()
            .await
            .map_err(|source| BackendError::Transport { operation, source })?;

        let status = response.status();
        if status == StatusCode::OK {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(BackendError::UnexpectedStatus {
            operation,
            status: status.as_u16(),
        })
        .with_context(|| body.trim().to_string())
    }
}

#[async_trait]
impl SchemaClient for SolrSchemaClient {
    async fn field_exists(&self, name: &str) -> Result<bool> {
        let mut url = self.schema_url.clone();
        url.path_segments_mut()
            .map_err(|_| BackendError::InvalidEndpoint(self.schema_url.to_string()))?
            .extend(["fields", name]);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| BackendError::Transport {
                operation: "field exists",
                source,
            })?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(BackendError::UnexpectedStatus {
                operation: "field exists",
                status: status.as_u16(),
            }
            .into()),
        }
    }

    async fn add_field(&self, field: &FieldDeclaration) -> Result<()> {
        self.post_command(json!({ "add-field": field }), "add field")
            .await
    }

    async fn add_copy_field(&self, source: &str, dest: &str) -> Result<()> {
        self.post_command(
            json!({ "add-copy-field": { "source": source, "dest": dest } }),
            "add copy field",
        )
        .await
    }
}

/// Solr backend: inferred schema, batched JSON updates, `select` queries
pub struct SolrBackend {
    config: SolrConfig,
    client: Client,
    schema_client: SolrSchemaClient,
    inferencer: Mutex<SchemaInferencer>,
    update_url: Url,
    select_url: Url,
}

impl SolrBackend {
    pub fn new(config: SolrConfig) -> Result<Self> {
        let client = http::build_client(&config.http)?;
        let schema_client = SolrSchemaClient::new(client.clone(), &config)?;
        let update_url = collection_url(&config, &["update"])?;
        let select_url = collection_url(&config, &["select"])?;
        let inferencer = Mutex::new(SchemaInferencer::new(&config.catch_all_field));

        Ok(Self {
            config,
            client,
            schema_client,
            inferencer,
            update_url,
            select_url,
        })
    }

    async fn ping(&self) -> Result<()> {
        let url = collection_url(&self.config, &["admin", "ping"])?;
        http::send_checked(self.client.get(url), "ping").await?;
        Ok(())
    }

    async fn post_update(&self, body: &Value, commit: bool) -> Result<(), BackendError> {
        let request = self
            .client
            .post(self.update_url.clone())
            .query(&[("commit", if commit { "true" } else { "false" })])
            .json(body);
        http::send_checked(request, "update").await?;
        Ok(())
    }

    /// Post one batch; when Solr rejects it, retry its documents one by one
    /// so a single bad document only loses itself. Returns the number of
    /// documents rejected.
    async fn add_batch(&self, batch: &[Document]) -> usize {
        let body = Value::Array(batch.iter().cloned().map(Value::Object).collect());
        if self.post_update(&body, false).await.is_ok() {
            return 0;
        }

        let mut rejected = 0;
        for document in batch {
            let single = Value::Array(vec![Value::Object(document.clone())]);
            if let Err(e) = self.post_update(&single, false).await {
                debug!("Skipping document: {}", e);
                rejected += 1;
            }
        }
        rejected
    }
}

/// Query parameters of a `select` request
pub fn search_params(query: &str, default_field: &str) -> Vec<(String, String)> {
    vec![
        ("q".to_string(), query.to_string()),
        ("wt".to_string(), "json".to_string()),
        ("df".to_string(), default_field.to_string()),
    ]
}

#[async_trait]
impl SearchBackend for SolrBackend {
    fn name(&self) -> &str {
        "Solr"
    }

    async fn index_documents(&self, documents: &[Document]) -> Duration {
        if let Err(e) = self.ping().await {
            warn!("Solr collection '{}' did not answer ping: {:#}", self.config.collection, e);
        }

        {
            let mut inferencer = self.inferencer.lock().await;
            inferencer.prepare(documents, &self.schema_client).await;
        }

        let start = Instant::now();
        let flattened: Vec<Document> = documents.iter().map(schema::flatten_document).collect();

        let mut rejected = 0usize;
        for batch in flattened.chunks(self.config.batch_size.max(1)) {
            rejected += self.add_batch(batch).await;
        }

        if let Err(e) = self.post_update(&json!({ "commit": {} }), true).await {
            warn!("Solr commit failed: {}", e);
        }

        let elapsed = start.elapsed();
        info!(
            "Solr indexed {} of {} documents",
            documents.len() - rejected,
            documents.len()
        );
        elapsed
    }

    async fn search(&self, query: &str, num_requests: usize, concurrency: usize) -> Metrics {
        // Queries default to the catch-all field, which a run that skipped
        // indexing has not declared yet.
        {
            let mut inferencer = self.inferencer.lock().await;
            if !inferencer.catch_all_ready() {
                inferencer.ensure_catch_all(&self.schema_client).await;
            }
        }

        let url = self.select_url.clone();
        let client = self.client.clone();
        let params = search_params(query, &self.config.catch_all_field);

        LoadGenerator::new(num_requests, concurrency)
            .run(move || {
                let request = client.get(url.clone()).query(&params);
                async move {
                    Ok::<_, anyhow::Error>(http::timed_request(request, "search", http::is_ok).await?)
                }
            })
            .await
    }

    async fn cleanup(&self) -> Result<()> {
        self.post_update(&json!({ "delete": { "query": "*:*" } }), true)
            .await
            .with_context(|| format!("Failed to clear Solr collection '{}'", self.config.collection))?;
        info!("Cleared Solr collection '{}'", self.config.collection);
        Ok(())
    }
}
