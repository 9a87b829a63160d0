//! SDK configuration
//!
//! Plain value structs consumed by [`ClientBuilder`](crate::ClientBuilder).
//! The SDK does no file or environment loading; the embedding application
//! owns where these values come from.

use crate::resilience::{CircuitBreakerConfig, QueueConfig, RetryPolicy};
use std::time::Duration;

/// Top-level configuration for one SDK client
#[derive(Debug, Clone)]
pub struct SdkConfig {
    /// Provider base URL, without a trailing slash
    pub base_url: String,
    /// API key sent as a bearer token
    pub api_key: String,
    /// Per-request timeout applied by the HTTP transport
    pub request_timeout: Duration,
    /// Retry policy for every dispatch
    pub retry: RetryPolicy,
    /// Circuit breaker configuration
    pub breaker: CircuitBreakerConfig,
    /// Offline queue timing
    pub queue: QueueConfig,
    /// Defer operations to the offline queue while the connectivity probe
    /// reports offline
    pub queue_when_offline: bool,
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.malipo.example".to_string(),
            api_key: String::new(),
            request_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            breaker: CircuitBreakerConfig::default(),
            queue: QueueConfig::default(),
            queue_when_offline: true,
        }
    }
}
