// HTTP transport used by the booking API client.
// Knows nothing about operations or polling: it moves JSON over authenticated HTTP.

use crate::config::{ClientConfig, ConfigError};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

// Header names are case-insensitive on the wire; `http` requires the lowercase form
pub const API_KEY_HEADER: &str = "api-key";

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timeout after {0}ms")]
    Timeout(u64),

    #[error("API error: {status_code} - {message}")]
    Status { status_code: u16, message: String },

    #[error("Invalid response body: {0}")]
    InvalidBody(String),
}

impl TransportError {
    pub fn status_code(&self) -> Option<u16> {
        match self {
            TransportError::Status { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }
}

// Paths are relative to the configured base URL, e.g. "search/" or "reservations/abc/poll/"
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, path: &str) -> Result<Value, TransportError>;

    async fn post(&self, path: &str, body: &Value) -> Result<Value, TransportError>;

    async fn delete(&self, path: &str) -> Result<Value, TransportError>;
}

/// `reqwest`-backed transport. The API key travels as a default header of the
/// underlying client, so every request is authenticated without per-call setup.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    timeout_ms: u64,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut api_key = HeaderValue::from_str(&config.api_key).map_err(|e| {
            ConfigError::InvalidValue {
                key: crate::config::ENV_API_KEY,
                message: e.to_string(),
            }
        })?;
        api_key.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, api_key);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ConfigError::InitError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.normalized_base_url(),
            timeout_ms: config.timeout_ms,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value, TransportError> {
        let response = request.send().await.map_err(|e| self.map_reqwest_error(e))?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "booking API returned an error status");
            return Err(TransportError::Status {
                status_code: status.as_u16(),
                message,
            });
        }

        let body = response.text().await.map_err(|e| self.map_reqwest_error(e))?;
        parse_body(&body)
    }

    fn map_reqwest_error(&self, error: reqwest::Error) -> TransportError {
        if error.is_timeout() {
            TransportError::Timeout(self.timeout_ms)
        } else {
            TransportError::Network(error.to_string())
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, path: &str) -> Result<Value, TransportError> {
        let url = self.url(path);
        debug!(%url, "GET");
        self.send(self.client.get(url)).await
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value, TransportError> {
        let url = self.url(path);
        debug!(%url, "POST");
        self.send(self.client.post(url).json(body)).await
    }

    async fn delete(&self, path: &str) -> Result<Value, TransportError> {
        let url = self.url(path);
        debug!(%url, "DELETE");
        self.send(self.client.delete(url)).await
    }
}

// Empty bodies (e.g. 204 responses) are reported as JSON null
fn parse_body(body: &str) -> Result<Value, TransportError> {
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(body).map_err(|e| TransportError::InvalidBody(e.to_string()))
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_body_empty_is_null() {
        assert_eq!(parse_body("").unwrap(), Value::Null);
        assert_eq!(parse_body("  \n").unwrap(), Value::Null);
    }

    #[test]
    fn test_parse_body_json() {
        let value = parse_body(r#"{"search_id": "abc"}"#).unwrap();
        assert_eq!(value, json!({"search_id": "abc"}));
    }

    #[test]
    fn test_parse_body_garbage() {
        let result = parse_body("<html>Bad Gateway</html>");
        assert!(matches!(result, Err(TransportError::InvalidBody(_))));
    }

    #[test]
    fn test_url_joining() {
        let config = ClientConfig::new("key").with_base_url("https://api.example.com/v2");
        let transport = HttpTransport::new(&config).unwrap();

        assert_eq!(transport.base_url(), "https://api.example.com/v2/");
        assert_eq!(
            transport.url("search/abc/poll/"),
            "https://api.example.com/v2/search/abc/poll/"
        );
        assert_eq!(
            transport.url("/reservations/"),
            "https://api.example.com/v2/reservations/"
        );
    }

    #[test]
    fn test_rejects_key_that_is_not_a_header_value() {
        let config = ClientConfig::new("bad\nkey");
        assert!(HttpTransport::new(&config).is_err());
    }

    #[test]
    fn test_status_code_accessor() {
        let err = TransportError::Status {
            status_code: 404,
            message: "Not Found".to_string(),
        };
        assert_eq!(err.status_code(), Some(404));
        assert_eq!(TransportError::Timeout(10).status_code(), None);
    }
}
