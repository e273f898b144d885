//! Resilient request dispatcher with per-attempt timeout and linear backoff.
//!
//! One `dispatch` call is one logical request. It makes up to
//! `max_attempts` transport attempts, each bounded by `attempt_timeout`.
//! After failed attempt `n` it waits `base_delay * n` before trying again.
//! Calls are independent: there is no shared retry budget or breaker.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use thiserror::Error;
use tutor_common::config::{BackendConfig, RetryPolicy};
use tutor_common::logging::generate_request_id;
use tutor_common::util::preview;

use crate::transport::{HttpRequest, ReqwestTransport, Transport, TransportError};

/// Configuration for dispatcher retry behavior.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Attempts per dispatch including the first (at least 1).
    pub max_attempts: u32,
    /// Deadline for a single attempt, body read included.
    pub attempt_timeout: Duration,
    /// Backoff unit; the wait after attempt `n` is `n * base_delay`.
    pub base_delay: Duration,
    pub retry_policy: RetryPolicy,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            attempt_timeout: Duration::from_secs(30),
            base_delay: Duration::from_secs(1),
            retry_policy: RetryPolicy::default(),
        }
    }
}

impl From<&BackendConfig> for DispatchConfig {
    fn from(backend: &BackendConfig) -> Self {
        Self {
            max_attempts: backend.max_attempts.max(1),
            attempt_timeout: backend.attempt_timeout(),
            base_delay: backend.base_delay(),
            retry_policy: backend.retry_policy,
        }
    }
}

/// Terminal failure of a dispatch.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The last attempt exceeded its deadline.
    #[error("Request timed out after {timeout:?} (attempt {attempts})")]
    Timeout { attempts: u32, timeout: Duration },

    /// The last attempt never got a response.
    #[error("{source} (attempt {attempts})")]
    Transport {
        attempts: u32,
        #[source]
        source: TransportError,
    },

    /// Non-2xx response that was final or not eligible for retry.
    #[error("HTTP error {status}: {body}")]
    HttpStatus {
        attempts: u32,
        status: u16,
        body: String,
    },
}

impl DispatchError {
    /// Number of attempts made before giving up.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Timeout { attempts, .. }
            | Self::Transport { attempts, .. }
            | Self::HttpStatus { attempts, .. } => *attempts,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Successful (2xx) response of a dispatch.
#[derive(Debug, Clone)]
pub struct DispatchResponse {
    pub status: u16,
    pub body: Vec<u8>,
    /// Attempt that succeeded, 1-based.
    pub attempts: u32,
}

impl DispatchResponse {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Outcome of one dispatch: the success response or the terminal error.
pub type RequestOutcome = Result<DispatchResponse, DispatchError>;

/// Issues requests through a [`Transport`] with bounded retries.
#[derive(Clone)]
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    config: DispatchConfig,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn Transport>, config: DispatchConfig) -> Self {
        Self { transport, config }
    }

    /// Dispatcher over a fresh reqwest client.
    pub fn with_reqwest(config: DispatchConfig) -> Result<Self, TransportError> {
        Ok(Self::new(Arc::new(ReqwestTransport::new()?), config))
    }

    /// Delay before the attempt following failed attempt `attempt` (1-based).
    fn backoff_delay(&self, attempt: u32) -> Duration {
        self.config.base_delay.saturating_mul(attempt)
    }

    /// Dispatch with the configured retry bound.
    pub async fn dispatch(&self, request: &HttpRequest) -> RequestOutcome {
        self.run(request, self.config.max_attempts).await
    }

    /// Dispatch exactly one attempt (still bounded by the attempt timeout).
    ///
    /// Used for requests that must not be replayed, such as imports.
    pub async fn dispatch_once(&self, request: &HttpRequest) -> RequestOutcome {
        self.run(request, 1).await
    }

    async fn run(&self, request: &HttpRequest, max_attempts: u32) -> RequestOutcome {
        let max_attempts = max_attempts.max(1);
        let request_id = generate_request_id();
        let mut attempt = 1;

        loop {
            let result =
                tokio::time::timeout(self.config.attempt_timeout, self.transport.send(request))
                    .await;

            let failure = match result {
                Ok(Ok(response)) if (200..300).contains(&response.status) => {
                    if attempt > 1 {
                        tracing::info!(
                            request_id = %request_id,
                            url = %request.url,
                            attempt,
                            "Request recovered after retries"
                        );
                    }
                    return Ok(DispatchResponse {
                        status: response.status,
                        body: response.body,
                        attempts: attempt,
                    });
                }
                Ok(Ok(response)) => {
                    let status = response.status;
                    let body = String::from_utf8_lossy(&response.body).into_owned();
                    let retryable = self.config.retry_policy.retries_status(status);
                    let error = DispatchError::HttpStatus {
                        attempts: attempt,
                        status,
                        body,
                    };
                    if !retryable {
                        tracing::warn!(
                            request_id = %request_id,
                            url = %request.url,
                            status,
                            attempt,
                            "Request rejected with non-retryable status"
                        );
                        return Err(error);
                    }
                    error
                }
                Ok(Err(source)) => DispatchError::Transport {
                    attempts: attempt,
                    source,
                },
                Err(_elapsed) => DispatchError::Timeout {
                    attempts: attempt,
                    timeout: self.config.attempt_timeout,
                },
            };

            if attempt >= max_attempts {
                tracing::error!(
                    request_id = %request_id,
                    method = %request.method,
                    url = %request.url,
                    attempts = attempt,
                    error = %preview(&failure.to_string(), 200),
                    "Request failed, giving up"
                );
                return Err(failure);
            }

            let delay = self.backoff_delay(attempt);
            tracing::warn!(
                request_id = %request_id,
                method = %request.method,
                url = %request.url,
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                timed_out = failure.is_timeout(),
                error = %preview(&failure.to_string(), 200),
                "Request failed, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
