mod common;

use common::MockServer;
use search_benchmark::backend::{
    MeilisearchBackend, MeilisearchConfig, OpenSearchBackend, OpenSearchConfig, SolrBackend,
    SolrConfig,
};
use search_benchmark::{Document, SearchBackend};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn doc(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        _ => panic!("documents must be objects"),
    }
}

fn corpus() -> Vec<Document> {
    vec![
        doc(json!({"id": "a1", "value": "APT28", "meta": {"country": "RU"}})),
        doc(json!({"id": "a2", "value": "poison"})),
        doc(json!({"id": "a3", "value": "Lazarus", "meta": {"refs": ["x", "y"]}})),
    ]
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn solr_declares_schema_and_falls_back_per_document() {
    let server = MockServer::start(|request| {
        let path = request.path();
        match (request.method.as_str(), path) {
            ("GET", "/solr/bench/admin/ping") => (200, r#"{"status":"OK"}"#.to_string()),
            ("GET", p) if p.starts_with("/solr/bench/schema/fields/") => (404, "{}".to_string()),
            ("POST", "/solr/bench/schema") => (200, "{}".to_string()),
            ("POST", "/solr/bench/update") if request.body.contains("poison") => {
                (400, r#"{"error":"bad document"}"#.to_string())
            }
            ("POST", "/solr/bench/update") => (200, "{}".to_string()),
            ("GET", "/solr/bench/select") => (200, r#"{"response":{"numFound":1}}"#.to_string()),
            _ => (500, "{}".to_string()),
        }
    })
    .await;

    let backend = SolrBackend::new(SolrConfig {
        url: format!("{}/solr", server.url),
        collection: "bench".to_string(),
        batch_size: 10,
        ..SolrConfig::default()
    })
    .unwrap();

    backend.index_documents(&corpus()).await;

    let requests = server.requests();
    let added_fields: Vec<String> = requests
        .iter()
        .filter(|r| r.method == "POST" && r.path() == "/solr/bench/schema")
        .map(|r| r.body.clone())
        .collect();
    assert!(added_fields.iter().any(|b| b.contains("\"country\"")));
    assert!(added_fields.iter().any(|b| b.contains("add-copy-field")));

    // One rejected batch, three single-document retries, one commit.
    assert_eq!(server.count("POST", "/solr/bench/update"), 5);
    let flattened = requests
        .iter()
        .find(|r| r.path() == "/solr/bench/update" && r.body.contains("APT28"))
        .unwrap();
    assert!(flattened.body.contains("\"country\":\"RU\""));
    assert!(!flattened.body.contains("\"meta\""));

    let metrics = backend.search("APT28", 10, 2).await;
    assert_eq!(metrics.total_requests, 10);
    assert_eq!(metrics.successful, 10);
    assert_eq!(metrics.errors, 0);

    let select = server
        .requests()
        .into_iter()
        .find(|r| r.path() == "/solr/bench/select")
        .unwrap();
    assert!(select.target.contains("q=APT28"));
    assert!(select.target.contains("df=_text_"));

    backend.cleanup().await.unwrap();
}

#[tokio::test]
async fn solr_search_only_counts_200_as_success() {
    let server = MockServer::start(|_| (201, "{}".to_string())).await;
    let backend = SolrBackend::new(SolrConfig {
        url: format!("{}/solr", server.url),
        collection: "bench".to_string(),
        ..SolrConfig::default()
    })
    .unwrap();

    let metrics = backend.search("APT28", 4, 2).await;
    assert_eq!(metrics.successful, 0);
    assert_eq!(metrics.errors, 4);
}

#[tokio::test]
async fn opensearch_counts_failed_searches_and_tolerates_missing_index() {
    let server = MockServer::start(|request| match (request.method.as_str(), request.path()) {
        ("PUT", "/bench") => (200, r#"{"acknowledged":true}"#.to_string()),
        ("PUT", p) if p.starts_with("/bench/_doc/") => (201, r#"{"result":"created"}"#.to_string()),
        ("POST", "/bench/_search") => (500, r#"{"error":"boom"}"#.to_string()),
        ("DELETE", "/bench") => (404, r#"{"error":"index_not_found"}"#.to_string()),
        _ => (400, "{}".to_string()),
    })
    .await;

    let backend = OpenSearchBackend::new(OpenSearchConfig {
        url: server.url.clone(),
        index_name: "bench".to_string(),
        ..OpenSearchConfig::default()
    })
    .unwrap();

    backend.index_documents(&corpus()).await;
    let requests = server.requests();
    let create = requests.iter().find(|r| r.target == "/bench").unwrap();
    assert!(create.body.contains("\"number_of_shards\":4"));
    assert!(requests
        .iter()
        .any(|r| r.target == "/bench/_doc/a1?refresh=true"));

    let metrics = backend.search("APT28", 6, 3).await;
    assert_eq!(metrics.total_requests, 6);
    assert_eq!(metrics.errors, 6);
    assert_eq!(metrics.avg_latency, 0.0);

    let search = server
        .requests()
        .into_iter()
        .find(|r| r.path() == "/bench/_search")
        .unwrap();
    let body: Value = serde_json::from_str(&search.body).unwrap();
    assert_eq!(body, json!({"query": {"multi_match": {"query": "APT28"}}}));

    assert!(backend.cleanup().await.is_ok());
}

#[tokio::test]
async fn meilisearch_waits_for_the_last_task() {
    let next_task = Arc::new(AtomicU64::new(1));
    let tasks = next_task.clone();
    let server = MockServer::start(move |request| {
        match (request.method.as_str(), request.path()) {
            ("POST", "/indexes") | ("PUT", "/indexes/bench/documents") | ("DELETE", "/indexes/bench") => {
                let uid = tasks.fetch_add(1, Ordering::SeqCst);
                (202, json!({"taskUid": uid, "status": "enqueued"}).to_string())
            }
            ("GET", p) if p.starts_with("/tasks/") => (200, r#"{"status":"succeeded"}"#.to_string()),
            ("POST", "/indexes/bench/search") => (200, r#"{"hits":[]}"#.to_string()),
            _ => (400, "{}".to_string()),
        }
    })
    .await;

    let backend = MeilisearchBackend::new(MeilisearchConfig {
        url: server.url.clone(),
        index_name: "bench".to_string(),
        task_poll_interval: Duration::from_millis(10),
        ..MeilisearchConfig::default()
    })
    .unwrap();

    backend.index_documents(&corpus()).await;

    // Index creation is task 1, the three documents are tasks 2 to 4.
    assert_eq!(server.count("PUT", "/indexes/bench/documents"), 3);
    let polled: Vec<String> = server
        .requests()
        .into_iter()
        .filter(|r| r.method == "GET")
        .map(|r| r.target)
        .collect();
    assert_eq!(polled, vec!["/tasks/4".to_string()]);

    let metrics = backend.search("APT28", 5, 5).await;
    assert_eq!(metrics.successful, 5);

    assert!(backend.cleanup().await.is_ok());
}

#[tokio::test]
async fn unreachable_backend_degrades_to_errors() {
    let backend = OpenSearchBackend::new(OpenSearchConfig {
        url: "http://127.0.0.1:1".to_string(),
        ..OpenSearchConfig::default()
    })
    .unwrap();

    let metrics = backend.search("APT28", 3, 2).await;
    assert_eq!(metrics.total_requests, 3);
    assert_eq!(metrics.errors, 3);
    assert_eq!(metrics.successful, 0);
}

#[tokio::test]
async fn solr_search_declares_the_catch_all_field_first() {
    let server = MockServer::start(|request| match (request.method.as_str(), request.path()) {
        ("GET", p) if p.starts_with("/solr/bench/schema/fields/") => (404, "{}".to_string()),
        ("POST", "/solr/bench/schema") => (200, "{}".to_string()),
        ("GET", "/solr/bench/select") => (200, r#"{"response":{"numFound":0}}"#.to_string()),
        _ => (500, "{}".to_string()),
    })
    .await;

    let backend = SolrBackend::new(SolrConfig {
        url: format!("{}/solr", server.url),
        collection: "bench".to_string(),
        ..SolrConfig::default()
    })
    .unwrap();

    let metrics = backend.search("APT28", 3, 1).await;
    assert_eq!(metrics.successful, 3);

    let requests = server.requests();
    let first_select = requests
        .iter()
        .position(|r| r.path() == "/solr/bench/select")
        .unwrap();
    let schema_writes: Vec<&str> = requests[..first_select]
        .iter()
        .filter(|r| r.method == "POST")
        .map(|r| r.body.as_str())
        .collect();
    assert_eq!(schema_writes.len(), 2);
    assert!(schema_writes[0].contains("\"add-field\"") && schema_writes[0].contains("\"_text_\""));
    assert!(schema_writes[1].contains("add-copy-field"));

    // Later load runs reuse the declaration.
    backend.search("APT28", 2, 1).await;
    assert_eq!(server.count("POST", "/solr/bench/schema"), 2);
    assert_eq!(server.count("GET", "/solr/bench/schema/fields/"), 1);
}

fn meilisearch_deleting(task_reply: &'static str) -> impl Fn(&common::RecordedRequest) -> (u16, String) {
    move |request: &common::RecordedRequest| match (request.method.as_str(), request.path()) {
        ("DELETE", "/indexes/bench") => (202, r#"{"taskUid":9,"status":"enqueued"}"#.to_string()),
        ("GET", "/tasks/9") => (200, task_reply.to_string()),
        _ => (400, "{}".to_string()),
    }
}

#[tokio::test]
async fn meilisearch_cleanup_reports_failed_delete_tasks() {
    let config = |url: &str| MeilisearchConfig {
        url: url.to_string(),
        index_name: "bench".to_string(),
        task_poll_interval: Duration::from_millis(10),
        ..MeilisearchConfig::default()
    };

    let missing = MockServer::start(meilisearch_deleting(
        r#"{"status":"failed","error":{"code":"index_not_found","message":"Index `bench` not found."}}"#,
    ))
    .await;
    let backend = MeilisearchBackend::new(config(&missing.url)).unwrap();
    assert!(backend.cleanup().await.is_ok());

    let broken = MockServer::start(meilisearch_deleting(
        r#"{"status":"failed","error":{"code":"internal","message":"disk full"}}"#,
    ))
    .await;
    let backend = MeilisearchBackend::new(config(&broken.url)).unwrap();
    let err = backend.cleanup().await.unwrap_err();
    assert!(err.to_string().contains("disk full"));
}
