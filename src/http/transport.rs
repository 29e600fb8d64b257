//! Network transport
//!
//! The dispatcher talks to the network only through the [`Transport`] trait.
//! [`ReqwestTransport`] is the production implementation.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;

use super::RequestDescriptor;
use crate::config::ClientConfig;

/// Errors that can occur while performing a request
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("Request failed with status {status}: {body}")]
    Status { status: u16, body: String },
}

impl TransportError {
    /// The status code the server answered with, if it answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Http(e) => e.status().map(|s| s.as_u16()),
            TransportError::Status { status, .. } => Some(*status),
        }
    }
}

/// A successful response
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    pub data: Value,
}

/// Performs network calls for the dispatcher
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends the request exactly as described
    ///
    /// Non-success statuses are reported as errors.
    async fn send(&self, request: &RequestDescriptor) -> Result<TransportResponse, TransportError>;
}

/// Transport backed by a `reqwest` client
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    /// HTTP client for making requests
    client: Client,
}

impl ReqwestTransport {
    /// Creates a transport with a default `reqwest` client
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a transport honouring the timeout and user agent in `config`
    pub fn from_config(config: &ClientConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client })
    }

    /// Wraps an already configured client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &RequestDescriptor) -> Result<TransportResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method.clone(), request.resolved_url())
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        Ok(TransportResponse {
            status: status.as_u16(),
            data: decode_body(&text),
        })
    }
}

/// Decodes a response body as JSON
///
/// Empty bodies become `null`; bodies that are not JSON are kept as a string.
fn decode_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_body_json() {
        assert_eq!(decode_body(r#"{"id": 1}"#), json!({"id": 1}));
        assert_eq!(decode_body("[1,2]"), json!([1, 2]));
    }

    #[test]
    fn test_decode_body_empty_is_null() {
        assert_eq!(decode_body(""), Value::Null);
        assert_eq!(decode_body("  \n"), Value::Null);
    }

    #[test]
    fn test_decode_body_plain_text_is_string() {
        assert_eq!(decode_body("OK"), json!("OK"));
    }

    #[test]
    fn test_status_error_reports_status() {
        let err = TransportError::Status {
            status: 404,
            body: "not found".to_string(),
        };
        assert_eq!(err.status(), Some(404));
        assert!(err.to_string().contains("404"));
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_from_config_builds_client() {
        let config = ClientConfig::default();
        assert!(ReqwestTransport::from_config(&config).is_ok());
    }
}
