//! HTTP transport seam used by the dispatcher.
//!
//! The dispatcher only needs "send one request, get status and body back".
//! Keeping that behind a trait lets the retry logic run against scripted
//! transports in tests and against reqwest in production.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// HTTP method used by the backend API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
        }
    }
}

/// A fully-built request. Cloned freely between attempts.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    /// JSON body, sent with `Content-Type: application/json`
    pub body: Option<serde_json::Value>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            body: None,
        }
    }

    pub fn post_json<T: Serialize>(
        url: impl Into<String>,
        body: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            method: Method::Post,
            url: url.into(),
            body: Some(serde_json::to_value(body)?),
        })
    }
}

/// Status and raw body of a completed exchange, whatever the status.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// The request never produced a response (DNS, refused, reset, body read).
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

/// Sends a single request attempt.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &HttpRequest) -> Result<TransportResponse, TransportError>;
}

/// Production transport backed by a shared `reqwest::Client`.
///
/// The client has no timeout of its own; deadlines belong to the dispatcher.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a client; fails only if the TLS backend cannot be initialized.
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("tutor/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                TransportError(format!("Failed to create HTTP client: {}", error_chain(&e)))
            })?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

/// Render an error with its `source()` chain, e.g. `error sending request: connection refused`.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &HttpRequest) -> Result<TransportResponse, TransportError> {
        let builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
        };
        let builder = match &request.body {
            Some(body) => builder.json(body),
            None => builder,
        };

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError(format!("Request failed: {}", error_chain(&e))))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| {
                TransportError(format!("Failed to read response body: {}", error_chain(&e)))
            })?;

        Ok(TransportResponse {
            status,
            body: body.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("error sending request for url (http://localhost:5000/api/chat/math)")]
    struct SendFailure(#[source] ConnectFailure);

    #[derive(Debug, Error)]
    #[error("client error (Connect)")]
    struct ConnectFailure(#[source] std::io::Error);

    #[test]
    fn error_chain_keeps_root_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused");
        let err = SendFailure(ConnectFailure(io));
        assert_eq!(
            error_chain(&err),
            "error sending request for url (http://localhost:5000/api/chat/math): \
             client error (Connect): connection refused"
        );
    }

    #[test]
    fn error_chain_skips_repeated_messages() {
        #[derive(Debug, Error)]
        #[error("read failed: timed out")]
        struct Wrapped(#[source] std::io::Error);

        let err = Wrapped(std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out"));
        assert_eq!(error_chain(&err), "read failed: timed out");
    }

    #[tokio::test]
    async fn refused_connection_reports_cause() {
        let transport = ReqwestTransport::new().unwrap();
        let err = transport
            .send(&HttpRequest::get("http://127.0.0.1:1/api/get_memory/math"))
            .await
            .unwrap_err();
        assert!(err.0.starts_with("Request failed: error sending request"));
        assert!(err.0.matches(": ").count() >= 2, "cause missing: {}", err.0);
    }
}
