use super::http::{self, HttpOptions};
use super::{BackendError, SearchBackend};
use crate::{load::LoadGenerator, metrics::Metrics, Document};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Connection settings for a Meilisearch instance
#[derive(Debug, Clone)]
pub struct MeilisearchConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub index_name: String,
    pub primary_key: String,
    /// Delay between polls of an enqueued task
    pub task_poll_interval: Duration,
    /// Upper bound on waiting for indexing tasks to settle
    pub task_timeout: Duration,
    pub http: HttpOptions,
}

impl Default for MeilisearchConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:7700".to_string(),
            api_key: None,
            index_name: crate::defaults::INDEX_NAME.to_string(),
            primary_key: "uuid".to_string(),
            task_poll_interval: Duration::from_millis(100),
            task_timeout: Duration::from_secs(300),
            http: HttpOptions::default(),
        }
    }
}

/// Reply to any write request: Meilisearch applies writes asynchronously
/// through tasks.
#[derive(Debug, Deserialize)]
struct EnqueuedTask {
    #[serde(rename = "taskUid")]
    task_uid: u64,
}

#[derive(Debug, Deserialize)]
struct TaskStatus {
    status: String,
    #[serde(default)]
    error: Option<TaskError>,
}

#[derive(Debug, Deserialize)]
struct TaskError {
    code: String,
    #[serde(default)]
    message: String,
}

impl TaskStatus {
    fn is_terminal(&self) -> bool {
        matches!(self.status.as_str(), "succeeded" | "failed" | "canceled")
    }

    fn succeeded(&self) -> bool {
        self.status == "succeeded"
    }

    fn error_code(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.code.as_str())
    }

    /// Human readable outcome for log lines
    fn describe(&self) -> String {
        match &self.error {
            Some(error) => format!("{} ({}: {})", self.status, error.code, error.message),
            None => self.status.clone(),
        }
    }
}

/// Meilisearch backend: task-based writes, `q` queries
pub struct MeilisearchBackend {
    config: MeilisearchConfig,
    client: Client,
    search_url: Url,
}

impl MeilisearchBackend {
    pub fn new(config: MeilisearchConfig) -> Result<Self> {
        let client = http::build_client(&config.http)?;
        let search_url = http::endpoint(
            &config.url,
            &["indexes", config.index_name.as_str(), "search"],
        )?;
        Ok(Self {
            config,
            client,
            search_url,
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url, BackendError> {
        http::endpoint(&self.config.url, segments)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        with_api_key(request, &self.config.api_key)
    }

    async fn enqueue(
        &self,
        request: RequestBuilder,
        operation: &'static str,
    ) -> Result<u64> {
        let response = http::send_checked(self.authorize(request), operation).await?;
        let task: EnqueuedTask = response
            .json()
            .await
            .with_context(|| format!("{} returned an unexpected body", operation))?;
        Ok(task.task_uid)
    }

    async fn create_index(&self) -> Result<u64> {
        let body = json!({
            "uid": self.config.index_name,
            "primaryKey": self.config.primary_key,
        });
        self.enqueue(self.client.post(self.url(&["indexes"])?).json(&body), "create index")
            .await
    }

    async fn add_document(&self, document: &Document) -> Result<u64> {
        let url = self.url(&["indexes", self.config.index_name.as_str(), "documents"])?;
        let body = [document];
        self.enqueue(self.client.put(url).json(&body), "add document")
            .await
    }

    /// Poll a task until it reaches a terminal state or the timeout passes,
    /// returning that final state
    async fn wait_for_task(&self, task_uid: u64) -> Result<TaskStatus> {
        let task_id = task_uid.to_string();
        let url = self.url(&["tasks", task_id.as_str()])?;
        let deadline = Instant::now() + self.config.task_timeout;

        loop {
            let response =
                http::send_checked(self.authorize(self.client.get(url.clone())), "get task")
                    .await?;
            let task: TaskStatus = response
                .json()
                .await
                .context("get task returned an unexpected body")?;

            if task.is_terminal() {
                debug!("Task {} finished: {}", task_uid, task.describe());
                return Ok(task);
            }
            if Instant::now() >= deadline {
                anyhow::bail!(
                    "task {} still '{}' after {:?}",
                    task_uid,
                    task.status,
                    self.config.task_timeout
                );
            }
            sleep(self.config.task_poll_interval).await;
        }
    }
}

fn with_api_key(request: RequestBuilder, api_key: &Option<String>) -> RequestBuilder {
    match api_key {
        Some(key) => request.bearer_auth(key),
        None => request,
    }
}

/// Search body issued for every request of a load run
pub fn search_payload(query: &str) -> Value {
    json!({ "q": query })
}

#[async_trait]
impl SearchBackend for MeilisearchBackend {
    fn name(&self) -> &str {
        "Meilisearch"
    }

    async fn index_documents(&self, documents: &[Document]) -> Duration {
        let start = Instant::now();

        let mut last_task = match self.create_index().await {
            Ok(task_uid) => Some(task_uid),
            Err(e) => {
                warn!("Could not create index '{}': {:#}", self.config.index_name, e);
                None
            }
        };

        let mut failed = 0usize;
        for document in documents {
            match self.add_document(document).await {
                Ok(task_uid) => last_task = Some(task_uid),
                Err(e) => {
                    debug!("Skipping document: {:#}", e);
                    failed += 1;
                }
            }
        }

        // Tasks on one index run in enqueue order, so the last one settling
        // means every document before it has been applied.
        if let Some(task_uid) = last_task {
            match self.wait_for_task(task_uid).await {
                Ok(task) if task.succeeded() => {}
                Ok(task) => warn!("Last indexing task {} ended {}", task_uid, task.describe()),
                Err(e) => warn!("Indexing tasks did not settle: {:#}", e),
            }
        }

        let elapsed = start.elapsed();
        info!(
            "Meilisearch indexed {} of {} documents",
            documents.len() - failed,
            documents.len()
        );
        elapsed
    }

    async fn search(&self, query: &str, num_requests: usize, concurrency: usize) -> Metrics {
        let url = self.search_url.clone();
        let client = self.client.clone();
        let payload = search_payload(query);
        let api_key = self.config.api_key.clone();

        LoadGenerator::new(num_requests, concurrency)
            .run(move || {
                let request = with_api_key(client.post(url.clone()).json(&payload), &api_key);
                async move {
                    Ok::<_, anyhow::Error>(
                        http::timed_request(request, "search", http::is_success).await?,
                    )
                }
            })
            .await
    }

    async fn cleanup(&self) -> Result<()> {
        let url = self.url(&["indexes", self.config.index_name.as_str()])?;
        let request = self.client.delete(url);
        match self.enqueue(request, "delete index").await {
            Ok(task_uid) => {
                let task = self.wait_for_task(task_uid).await?;
                if task.succeeded() {
                    info!("Deleted Meilisearch index '{}'", self.config.index_name);
                    return Ok(());
                }
                if task.error_code() == Some("index_not_found") {
                    debug!("Meilisearch index '{}' already absent", self.config.index_name);
                    return Ok(());
                }
                anyhow::bail!(
                    "deleting index '{}' ended {}",
                    self.config.index_name,
                    task.describe()
                )
            }
            Err(e) => match e.downcast_ref::<BackendError>() {
                Some(BackendError::UnexpectedStatus { status, .. })
                    if *status == StatusCode::NOT_FOUND.as_u16() =>
                {
                    debug!("Meilisearch index '{}' already absent", self.config.index_name);
                    Ok(())
                }
                _ => Err(e),
            },
        }
    }
}
