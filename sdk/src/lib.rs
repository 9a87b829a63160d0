//! Malipo SDK - resilient client for a mobile-money payment provider
//!
//! Wraps the provider's three HTTP endpoints (payment initiation, refund,
//! transaction status lookup) with a resilience layer:
//!
//! ```text
//! Client ──► validate ──► queue-or-dispatch ──► breaker(retry(transport))
//!                              │                        │
//!                        OfflineQueue              AnalyticsSink
//! ```
//!
//! Every call either dispatches through the shared circuit breaker and
//! retry executor, or - while offline - is deferred to the in-memory
//! offline queue and surfaced as [`SdkError::Queued`].
//!
//! # Quick start
//!
//! ```ignore
//! use malipo_sdk::{Client, SdkConfig};
//!
//! let client = Client::builder(SdkConfig {
//!     base_url: "https://api.provider.example".into(),
//!     api_key: std::env::var("MALIPO_API_KEY")?,
//!     ..Default::default()
//! })
//! .build();
//!
//! let response = client.initiate_payment(request).await?;
//! ```

#![deny(unsafe_code)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::panic)]

pub mod analytics;
pub mod batch;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod http;
pub mod resilience;

// Re-export the contract types - application collaborators depend on
// malipo-core directly, SDK users get everything from here
pub use malipo_core::{
    AlwaysOnline, AnalyticsEvent, AnalyticsSink, ConnectivityProbe, CorrelationId, Endpoint,
    ManualProbe, NoopAnalytics, OperationKind, PaymentRequest, PaymentResponse, RefundRequest,
    RefundResponse, SdkError, StatusRequest, StatusResponse, TransactionState, Transport,
};

pub use analytics::{InMemoryAnalytics, OperationStats};
pub use batch::{run_batch, BatchResult};
pub use client::{Client, ClientBuilder};
pub use config::SdkConfig;
pub use dispatch::Dispatcher;
pub use http::HttpTransport;
pub use resilience::{
    CircuitBreaker, CircuitBreakerConfig, CircuitState, DrainStats, OfflineQueue, QueueConfig,
    QueueEvent, QueueItem, QueueProcessor, QueuedOperation, RetryExecutor, RetryPolicy,
    MAX_ATTEMPTS,
};
