use super::http::{self, HttpOptions};
use super::{BackendError, SearchBackend};
use crate::{load::LoadGenerator, metrics::Metrics, Document};
use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde_json::{json, Value};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Connection settings for an OpenSearch cluster
#[derive(Debug, Clone)]
pub struct OpenSearchConfig {
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub index_name: String,
    pub shards: u32,
    pub http: HttpOptions,
}

impl Default for OpenSearchConfig {
    fn default() -> Self {
        Self {
            url: "https://localhost:9200".to_string(),
            username: None,
            password: None,
            index_name: crate::defaults::INDEX_NAME.to_string(),
            shards: 4,
            http: HttpOptions::default(),
        }
    }
}

/// OpenSearch backend: one index, one request per document, `multi_match`
/// queries
pub struct OpenSearchBackend {
    config: OpenSearchConfig,
    client: Client,
    search_url: Url,
}

impl OpenSearchBackend {
    pub fn new(config: OpenSearchConfig) -> Result<Self> {
        let client = http::build_client(&config.http)?;
        let search_url = http::endpoint(&config.url, &[config.index_name.as_str(), "_search"])?;
        Ok(Self {
            config,
            client,
            search_url,
        })
    }

    fn index_url(&self, extra: &[&str]) -> Result<Url, BackendError> {
        let mut segments = vec![self.config.index_name.as_str()];
        segments.extend_from_slice(extra);
        http::endpoint(&self.config.url, &segments)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        with_basic_auth(request, &self.config.username, &self.config.password)
    }

    async fn create_index(&self) -> Result<(), BackendError> {
        let body = json!({
            "settings": { "index": { "number_of_shards": self.config.shards } }
        });
        let request = self.authorize(self.client.put(self.index_url(&[])?).json(&body));
        http::send_checked(request, "create index").await?;
        Ok(())
    }

    async fn index_one(&self, document: &Document) -> Result<(), BackendError> {
        let id = document_id(document);
        let url = self.index_url(&["_doc", id.as_str()])?;
        let request = self.authorize(
            self.client
                .put(url)
                .query(&[("refresh", "true")])
                .json(document),
        );
        http::send_checked(request, "index document").await?;
        Ok(())
    }
}

fn with_basic_auth(
    request: RequestBuilder,
    username: &Option<String>,
    password: &Option<String>,
) -> RequestBuilder {
    match username {
        Some(user) => request.basic_auth(user, password.as_ref()),
        None => request,
    }
}

/// Document id: the `id` field when present, otherwise a hash of the
/// serialized document
pub fn document_id(document: &Document) -> String {
    match document.get("id") {
        Some(Value::String(id)) => id.clone(),
        Some(Value::Number(id)) => id.to_string(),
        _ => {
            let mut hasher = DefaultHasher::new();
            Value::Object(document.clone()).to_string().hash(&mut hasher);
            hasher.finish().to_string()
        }
    }
}

/// Search body issued for every request of a load run
pub fn search_payload(query: &str) -> Value {
    json!({ "query": { "multi_match": { "query": query } } })
}

#[async_trait]
impl SearchBackend for OpenSearchBackend {
    fn name(&self) -> &str {
        "OpenSearch"
    }

    async fn index_documents(&self, documents: &[Document]) -> Duration {
        let start = Instant::now();

        if let Err(e) = self.create_index().await {
            warn!("Could not create index '{}': {}", self.config.index_name, e);
        }

        let mut failed = 0usize;
        for document in documents {
            if let Err(e) = self.index_one(document).await {
                debug!("Skipping document: {}", e);
                failed += 1;
            }
        }

        let elapsed = start.elapsed();
        info!(
            "OpenSearch indexed {} of {} documents",
            documents.len() - failed,
            documents.len()
        );
        elapsed
    }

    async fn search(&self, query: &str, num_requests: usize, concurrency: usize) -> Metrics {
        let url = self.search_url.clone();
        let client = self.client.clone();
        let payload = search_payload(query);
        let username = self.config.username.clone();
        let password = self.config.password.clone();

        LoadGenerator::new(num_requests, concurrency)
            .run(move || {
                let request =
                    with_basic_auth(client.post(url.clone()).json(&payload), &username, &password);
                async move {
                    Ok::<_, anyhow::Error>(
                        http::timed_request(request, "search", http::is_success).await?,
                    )
                }
            })
            .await
    }

    async fn cleanup(&self) -> Result<()> {
        let request = self.authorize(self.client.delete(self.index_url(&[])?));
        match http::send_checked(request, "delete index").await {
            Ok(_) => {
                info!("Deleted OpenSearch index '{}'", self.config.index_name);
                Ok(())
            }
            Err(BackendError::UnexpectedStatus { status, .. })
                if status == StatusCode::NOT_FOUND.as_u16() =>
            {
                debug!("OpenSearch index '{}' already absent", self.config.index_name);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("test documents must be objects"),
        }
    }

    #[test]
    fn test_document_id_prefers_id_field() {
        assert_eq!(document_id(&doc(json!({"id": "abc", "value": 1}))), "abc");
        assert_eq!(document_id(&doc(json!({"id": 42}))), "42");
    }

    #[test]
    fn test_document_id_hash_is_stable() {
        let a = doc(json!({"value": "APT28"}));
        let b = doc(json!({"value": "APT29"}));

        assert_eq!(document_id(&a), document_id(&a.clone()));
        assert_ne!(document_id(&a), document_id(&b));
    }

    #[test]
    fn test_search_payload() {
        assert_eq!(
            search_payload("APT28"),
            json!({"query": {"multi_match": {"query": "APT28"}}})
        );
    }

    #[test]
    fn test_default_config() {
        let config = OpenSearchConfig::default();
        assert_eq!(config.shards, 4);
        assert_eq!(config.index_name, "misp-galaxies");
    }
}
