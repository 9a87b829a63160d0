//! Request/response models for the Malipo provider API
//!
//! Amounts are `rust_decimal::Decimal` throughout. The SDK never represents
//! money as a float.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Correlation identifier tying together the logs, analytics events and
/// queue bookkeeping of one logical call
///
/// ULID in binary form: lexicographically sortable by creation time,
/// `Copy`, and cheap to log via `Display`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CorrelationId(ulid::Ulid);

impl CorrelationId {
    /// Generate a new unique ID
    pub fn new() -> Self {
        Self(ulid::Ulid::new())
    }

    /// Get the underlying ULID
    pub fn as_ulid(&self) -> ulid::Ulid {
        self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CorrelationId({})", self.0)
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The logical operation a call performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Payment initiation
    Payment,
    /// Refund of a prior payment
    Refund,
    /// Transaction status lookup
    StatusLookup,
}

impl OperationKind {
    /// Stable short name for logging and analytics keys
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Payment => "payment",
            OperationKind::Refund => "refund",
            OperationKind::StatusLookup => "status_lookup",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A provider endpoint, carrying whatever routing data the path needs
///
/// The resilience layer never builds URLs itself; it hands the endpoint to
/// the [`Transport`](crate::Transport), which owns URL and header
/// construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// `POST /v1/payments`
    InitiatePayment,
    /// `POST /v1/refunds`
    Refund,
    /// `GET /v1/transactions/{transaction_id}`
    TransactionStatus {
        /// Provider-assigned transaction identifier
        transaction_id: String,
    },
}

impl Endpoint {
    /// URL path relative to the provider base URL
    pub fn path(&self) -> String {
        match self {
            Endpoint::InitiatePayment => "/v1/payments".to_string(),
            Endpoint::Refund => "/v1/refunds".to_string(),
            Endpoint::TransactionStatus { transaction_id } => {
                format!("/v1/transactions/{transaction_id}")
            }
        }
    }

    /// HTTP method for this endpoint
    pub fn method(&self) -> &'static str {
        match self {
            Endpoint::InitiatePayment | Endpoint::Refund => "POST",
            Endpoint::TransactionStatus { .. } => "GET",
        }
    }

    /// The operation this endpoint serves
    pub fn kind(&self) -> OperationKind {
        match self {
            Endpoint::InitiatePayment => OperationKind::Payment,
            Endpoint::Refund => OperationKind::Refund,
            Endpoint::TransactionStatus { .. } => OperationKind::StatusLookup,
        }
    }
}

/// Lifecycle state of a transaction as reported by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionState {
    /// Accepted, awaiting settlement
    Pending,
    /// Settled successfully
    Completed,
    /// Terminally failed
    Failed,
    /// Reversed by a refund
    Refunded,
}

/// Payment initiation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequest {
    /// Subscriber number in international format, e.g. `+254712345678`
    pub msisdn: String,
    /// Amount to charge; must be positive
    pub amount: Decimal,
    /// ISO 4217 currency code, e.g. `KES`
    pub currency: String,
    /// Caller-supplied reference, unique per payment
    pub reference: String,
    /// Free-text description shown to the subscriber
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Payment initiation response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentResponse {
    /// Provider-assigned transaction identifier
    pub transaction_id: String,
    /// State the transaction entered
    pub status: TransactionState,
    /// Amount accepted by the provider
    pub amount: Decimal,
    /// Currency echoed back
    pub currency: String,
}

/// Refund request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundRequest {
    /// Transaction to refund
    pub transaction_id: String,
    /// Amount to refund; `None` refunds the full amount
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Decimal>,
    /// Operator-facing reason
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Refund response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundResponse {
    /// Provider-assigned refund identifier
    pub refund_id: String,
    /// The refunded transaction
    pub transaction_id: String,
    /// State the refund entered
    pub status: TransactionState,
}

/// Transaction status lookup request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRequest {
    /// Transaction to look up
    pub transaction_id: String,
}

/// Transaction status lookup response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    /// The transaction looked up
    pub transaction_id: String,
    /// Current state
    pub status: TransactionState,
    /// Amount, when the provider includes it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Decimal>,
    /// Currency, when the provider includes it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}
