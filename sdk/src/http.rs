//! HTTP transport over reqwest
//!
//! The default [`Transport`] implementation. Owns URL and header
//! construction and the per-request timeout; the resilience layer only
//! sees the mapped [`SdkError`].

use crate::config::SdkConfig;
use async_trait::async_trait;
use malipo_core::{Endpoint, SdkError, Transport};
use serde_json::Value;

/// Transport that speaks JSON over HTTP to the provider
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpTransport {
    /// Build a transport from configuration
    ///
    /// The configured `request_timeout` applies to every request end to
    /// end, connect time included.
    pub fn new(config: &SdkConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }

    fn request_url(&self, endpoint: &Endpoint) -> String {
        format!("{}{}", self.base_url, endpoint.path())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, endpoint: &Endpoint, body: Value) -> Result<Value, SdkError> {
        let url = self.request_url(endpoint);
        let request = match endpoint.method() {
            "GET" => self.client.get(&url),
            _ => self.client.post(&url).json(&body),
        };

        let response = request
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status();
        let text = response.text().await.map_err(map_send_error)?;

        if !status.is_success() {
            return Err(SdkError::Remote {
                status: status.as_u16(),
                body: text,
            });
        }

        serde_json::from_str(&text)
            .map_err(|err| SdkError::Serialization(format!("invalid response body: {err}")))
    }
}

/// Map a reqwest error onto the SDK taxonomy
///
/// Anything without an HTTP status (connect failures, timeouts, dropped
/// connections) is a transport error and therefore retryable.
fn map_send_error(err: reqwest::Error) -> SdkError {
    match err.status() {
        Some(status) => SdkError::Remote {
            status: status.as_u16(),
            body: err.to_string(),
        },
        None => SdkError::Transport(err.to_string()),
    }
}
