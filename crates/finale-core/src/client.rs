//! Shared HTTP plumbing for the three API clients.
//!
//! Provides a rate limiter used to pace metadata lookups, a small set of
//! transport defaults (every outbound call carries an explicit timeout),
//! and the backoff schedule for retrying transient errors.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;

use crate::error::{FinaleError, Result};

/// Default per-request timeout in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retry attempts for transient errors
pub(crate) const MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff (in milliseconds)
const BASE_RETRY_DELAY_MS: u64 = 1000;

/// Rate limiter to control request frequency
///
/// Ensures successive requests are spaced at least `min_interval` apart
/// so a remote service's rate limit is never tripped by a tight loop
/// over the library.
pub struct RateLimiter {
    /// Minimum interval between requests
    min_interval: Duration,
    /// Timestamp of the last request
    last_request: Arc<Mutex<Instant>>,
}

impl RateLimiter {
    /// Create a rate limiter with a fixed pacing delay between requests.
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request: Arc::new(Mutex::new(Instant::now() - min_interval)),
        }
    }

    /// Acquire permission to make a request.
    ///
    /// Waits if necessary so the minimum interval since the previous
    /// request is respected. This is the only intentional suspension
    /// point in a run.
    pub async fn acquire(&self) {
        let mut last = self.last_request.lock().await;
        let elapsed = last.elapsed();

        if elapsed < self.min_interval {
            sleep(self.min_interval - elapsed).await;
        }

        *last = Instant::now();
    }

    /// Get the minimum interval between requests
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }
}

/// Transport configuration shared by all clients
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Request timeout in seconds (default: 30)
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Build a [`reqwest::Client`] with the shared transport defaults.
///
/// # Errors
/// Returns an error if the underlying HTTP client cannot be created.
pub fn build_http_client(config: &HttpConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

/// Calculate the exponential backoff delay for a retry attempt.
///
/// Attempt 0 waits 1s, attempt 1 waits 2s, attempt 2 waits 4s.
pub(crate) fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(BASE_RETRY_DELAY_MS * 2u64.pow(attempt))
}

/// Decode a JSON response body, tagging failures with the service name.
pub(crate) async fn decode_json<T: serde::de::DeserializeOwned>(
    service: &'static str,
    response: reqwest::Response,
) -> Result<T> {
    response
        .json()
        .await
        .map_err(|e| FinaleError::InvalidResponse {
            service,
            detail: e.to_string(),
        })
}
