//! Shared HTTP plumbing for the backend clients.

use super::BackendError;
use anyhow::{Context, Result};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::debug;

/// Client-level HTTP options shared by all backends
#[derive(Debug, Clone)]
pub struct HttpOptions {
    pub request_timeout: Duration,
    /// PEM file with an additional trusted root certificate
    pub ca_cert: Option<PathBuf>,
    pub accept_invalid_certs: bool,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            request_timeout: crate::defaults::REQUEST_TIMEOUT,
            ca_cert: None,
            accept_invalid_certs: false,
        }
    }
}

/// Build a pooled client from the given options
pub fn build_client(options: &HttpOptions) -> Result<Client> {
    let mut builder = Client::builder()
        .timeout(options.request_timeout)
        .danger_accept_invalid_certs(options.accept_invalid_certs);

    if let Some(ref path) = options.ca_cert {
        let pem = std::fs::read(path)
            .with_context(|| format!("Failed to read CA certificate {}", path.display()))?;
        let certificate = reqwest::Certificate::from_pem(&pem)
            .with_context(|| format!("Invalid CA certificate {}", path.display()))?;
        builder = builder.add_root_certificate(certificate);
    }

    builder.build().context("Failed to build HTTP client")
}

/// Join path segments onto a base URL, escaping each segment
pub fn endpoint(base: &str, segments: &[&str]) -> Result<Url, BackendError> {
    let mut url = Url::parse(base).map_err(|_| BackendError::InvalidEndpoint(base.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| BackendError::InvalidEndpoint(base.to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Send a request and require a 2xx status
pub async fn send_checked(
    request: RequestBuilder,
    operation: &'static str,
) -> Result<Response, BackendError> {
    let response = request
        .send()
        .await
        .map_err(|source| BackendError::Transport { operation, source })?;

    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        debug!("{} failed with status {}", operation, status);
        Err(BackendError::UnexpectedStatus {
            operation,
            status: status.as_u16(),
        })
    }
}

/// Time one request through to its fully read body
///
/// `accept` decides whether the status counts as a success; a rejected
/// status or a transport error yields an error and no latency.
pub async fn timed_request(
    request: RequestBuilder,
    operation: &'static str,
    accept: fn(StatusCode) -> bool,
) -> Result<Duration, BackendError> {
    let start = Instant::now();
    let response = request
        .send()
        .await
        .map_err(|source| BackendError::Transport { operation, source })?;

    let status = response.status();
    response
        .bytes()
        .await
        .map_err(|source| BackendError::Transport { operation, source })?;
    let latency = start.elapsed();

    if accept(status) {
        Ok(latency)
    } else {
        Err(BackendError::UnexpectedStatus {
            operation,
            status: status.as_u16(),
        })
    }
}

/// Any 2xx status
pub fn is_success(status: StatusCode) -> bool {
    status.is_success()
}

/// Exactly 200 OK
pub fn is_ok(status: StatusCode) -> bool {
    status == StatusCode::OK
}
