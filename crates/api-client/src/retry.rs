use std::time::Duration;

use tracing::warn;

use crate::client::ApiError;

/// Configuration for retry behaviour on ingestion POST requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    pub max_retries: usize,
    /// Backoff in seconds before retry `n`; the last entry repeats.
    pub delays: Vec<u64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delays: vec![1, 2, 4],
        }
    }
}

impl RetryConfig {
    pub fn with_max_retries(max_retries: usize) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// Delay before the retry following failed `attempt` (0-based), if any remain.
    fn delay_after(&self, attempt: usize) -> Option<Duration> {
        if attempt >= self.max_retries {
            return None;
        }
        let secs = self
            .delays
            .get(attempt)
            .or(self.delays.last())
            .copied()
            .unwrap_or(0);
        Some(Duration::from_secs(secs))
    }
}

/// Retry an HTTP POST with exponential backoff.
///
/// Retries on network errors and 5xx responses.
/// Returns immediately on success or 4xx.
pub async fn retry_post(
    client: &reqwest::Client,
    url: &str,
    basic_auth: Option<(&str, &str)>,
    body: &serde_json::Value,
    config: &RetryConfig,
) -> Result<reqwest::Response, ApiError> {
    let max_attempts = config.max_retries + 1;
    let mut attempt = 0;

    loop {
        let mut req = client.post(url).header("Content-Type", "application/json");
        if let Some((user, password)) = basic_auth {
            req = req.basic_auth(user, Some(password));
        }

        match req.json(body).send().await {
            Ok(resp) if resp.status().is_server_error() => match config.delay_after(attempt) {
                Some(delay) => {
                    warn!(
                        "POST attempt {}/{} failed (HTTP {}), retrying in {}s…",
                        attempt + 1,
                        max_attempts,
                        resp.status(),
                        delay.as_secs(),
                    );
                    tokio::time::sleep(delay).await;
                }
                None => return Ok(resp),
            },
            Ok(resp) => return Ok(resp),
            Err(e) => match config.delay_after(attempt) {
                Some(delay) => {
                    warn!(
                        "POST attempt {}/{} failed ({}), retrying in {}s…",
                        attempt + 1,
                        max_attempts,
                        e,
                        delay.as_secs(),
                    );
                    tokio::time::sleep(delay).await;
                }
                None => return Err(ApiError::Http(e)),
            },
        }
        attempt += 1;
    }
}
