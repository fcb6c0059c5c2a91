use std::time::Duration;

use serde_json::json;
use tracing::{debug, warn};

use crate::ingestion::{IngestionEvent, IngestionResponse};
use crate::retry::{RetryConfig, retry_post};

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ApiError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Langfuse responded {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
}

/// HTTP client for the Langfuse public ingestion API.
///
/// Authenticates with HTTP basic auth (public key as user, secret key as
/// password) on every request.
pub struct LangfuseClient {
    client: reqwest::Client,
    host: String,
    public_key: String,
    secret_key: String,
    retry: RetryConfig,
}

impl LangfuseClient {
    /// Create a new client with the given host and timeout.
    pub fn new(
        host: &str,
        public_key: &str,
        secret_key: &str,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, host, public_key, secret_key))
    }

    /// Create from an existing `reqwest::Client` (e.g. shared in tests).
    pub fn with_client(
        client: reqwest::Client,
        host: &str,
        public_key: &str,
        secret_key: &str,
    ) -> Self {
        Self {
            client,
            host: host.trim_end_matches('/').to_string(),
            public_key: public_key.to_string(),
            secret_key: secret_key.to_string(),
            retry: RetryConfig::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/public{}", self.host, path)
    }

    /// Send one ingestion batch.
    ///
    /// Per-event rejections in a 207 response are logged and returned, not
    /// treated as a failure of the whole request.
    pub async fn ingest(&self, batch: &[IngestionEvent]) -> Result<IngestionResponse, ApiError> {
        if batch.is_empty() {
            return Ok(IngestionResponse::default());
        }
        let body = json!({ "batch": batch });
        let resp = retry_post(
            &self.client,
            &self.url("/ingestion"),
            Some((&self.public_key, &self.secret_key)),
            &body,
            &self.retry,
        )
        .await?;

        let response = parse_response(resp).await?;
        for failure in &response.errors {
            warn!(
                "Langfuse rejected event {} (HTTP {}): {}",
                failure.id,
                failure.status,
                failure.message.as_deref().unwrap_or("no message"),
            );
        }
        debug!(
            "Ingested {} events ({} accepted, {} rejected)",
            batch.len(),
            response.successes.len(),
            response.errors.len()
        );
        Ok(response)
    }
}

async fn parse_response(resp: reqwest::Response) -> Result<IngestionResponse, ApiError> {
    let status = resp.status();
    let body = resp.text().await?;
    if !status.is_success() {
        return Err(ApiError::Status {
            status: status.as_u16(),
            body,
        });
    }
    if body.trim().is_empty() {
        return Ok(IngestionResponse::default());
    }
    Ok(serde_json::from_str(&body)?)
}
