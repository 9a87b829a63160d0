//! malipo-core - Core types for the Malipo mobile-money SDK
//!
//! This crate provides the foundational types shared between the SDK's
//! resilience layer and application code that supplies its own collaborators:
//!
//! - [`SdkError`] - the error taxonomy every SDK operation speaks
//! - [`Transport`] trait - async interface to the provider's HTTP endpoints
//! - [`ConnectivityProbe`] trait - reports whether the network looks usable
//! - [`AnalyticsSink`] trait - receives one event per completed dispatch
//! - [`model`] - request/response models, endpoints, correlation IDs
//! - [`validate`] - request validation rules
//! - [`redact`] - masking helpers for log-safe output
//!
//! # Why this crate exists
//!
//! Applications embedding the SDK frequently supply their own transport
//! (for testing, or to route through an existing HTTP stack), their own
//! connectivity probe, and their own analytics sink. Those implementations
//! need the contract types without pulling in the resilience machinery, so
//! the contracts live here and `malipo-sdk` depends on them:
//!
//! ```text
//! malipo-core ◄── malipo-sdk
//!     ▲
//!     └────────── application-provided collaborators
//! ```

#![deny(unsafe_code)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::panic)]
#![warn(missing_docs)]

mod analytics;
mod error;
mod transport;

/// Request/response models, endpoints and identifiers
pub mod model;
/// Masking helpers for log-safe rendering of sensitive fields
pub mod redact;
/// Request validation rules
pub mod validate;

pub use analytics::{AnalyticsEvent, AnalyticsSink, NoopAnalytics};
pub use error::SdkError;
pub use model::{
    CorrelationId, Endpoint, OperationKind, PaymentRequest, PaymentResponse, RefundRequest,
    RefundResponse, StatusRequest, StatusResponse, TransactionState,
};
pub use transport::{AlwaysOnline, ConnectivityProbe, ManualProbe, Transport};
