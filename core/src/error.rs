//! Error types for Malipo SDK operations

use std::collections::HashSet;
use thiserror::Error;

/// Error type for all SDK operations
///
/// Every failure an SDK call can produce is one of these variants, so
/// callers can branch on kind rather than parsing messages. The resilience
/// layer classifies retryability with [`SdkError::is_retryable`]; only
/// transport failures and remote responses with a configured status code
/// are ever retried.
///
/// # Example
///
/// ```
/// use malipo_core::SdkError;
///
/// fn handle(err: SdkError) -> &'static str {
///     match err {
///         SdkError::Queued { .. } => "accepted, will deliver later",
///         SdkError::BreakerOpen => "provider unhealthy, try later",
///         SdkError::Validation(_) => "fix the request",
///         _ => "delivery failed",
///     }
/// }
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SdkError {
    /// Malformed input
    ///
    /// Returned before any network activity. Never retried, never queued.
    /// Examples: empty MSISDN, non-positive amount, bad currency code.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Transport-level failure
    ///
    /// The request never produced an HTTP response.
    /// Examples: connection refused, DNS lookup failure, request timeout.
    /// Always considered retryable.
    #[error("transport error: {0}")]
    Transport(String),

    /// Non-2xx response from the provider
    ///
    /// Retryable only when the status code is in the retry policy's
    /// configured set (typically 408/429/5xx).
    #[error("remote error (status {status}): {body}")]
    Remote {
        /// HTTP status code returned by the provider
        status: u16,
        /// Response body, verbatim
        body: String,
    },

    /// The circuit breaker rejected the call without attempting it
    ///
    /// Distinguishable from [`SdkError::Remote`] so callers can present
    /// "try again later" instead of "fix your input".
    #[error("circuit breaker open, call rejected")]
    BreakerOpen,

    /// The operation was deferred to the offline queue
    ///
    /// Not a hard failure: the item identified by `id` is owned by the
    /// queue and will be dispatched when processing resumes. Track the
    /// outcome via the queue's event stream.
    #[error("queued for later delivery ({id})")]
    Queued {
        /// Queue item / correlation identifier
        id: String,
    },

    /// A response body could not be decoded into its typed model
    ///
    /// Indicates a contract mismatch with the provider; non-retryable.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl SdkError {
    /// Whether the retry executor may attempt this operation again
    ///
    /// Retryable iff the error is a transport failure, or a remote response
    /// whose status code appears in `retryable_status_codes`.
    pub fn is_retryable(&self, retryable_status_codes: &HashSet<u16>) -> bool {
        match self {
            SdkError::Transport(_) => true,
            SdkError::Remote { status, .. } => retryable_status_codes.contains(status),
            _ => false,
        }
    }

    /// Whether this error means "accepted, pending" rather than failed
    pub fn is_queued(&self) -> bool {
        matches!(self, SdkError::Queued { .. })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn retryable_codes() -> HashSet<u16> {
        [408, 429, 500, 502, 503, 504].into_iter().collect()
    }

    #[test]
    fn transport_errors_are_retryable() {
        let err = SdkError::Transport("connection refused".into());
        assert!(err.is_retryable(&retryable_codes()));
    }

    #[test]
    fn remote_errors_follow_configured_set() {
        let codes = retryable_codes();
        let retryable = SdkError::Remote {
            status: 503,
            body: "unavailable".into(),
        };
        let terminal = SdkError::Remote {
            status: 404,
            body: "not found".into(),
        };
        assert!(retryable.is_retryable(&codes));
        assert!(!terminal.is_retryable(&codes));
    }

    #[test]
    fn validation_breaker_and_queued_never_retry() {
        let codes = retryable_codes();
        assert!(!SdkError::Validation("bad msisdn".into()).is_retryable(&codes));
        assert!(!SdkError::BreakerOpen.is_retryable(&codes));
        assert!(!SdkError::Queued { id: "01H".into() }.is_retryable(&codes));
        assert!(!SdkError::Serialization("eof".into()).is_retryable(&codes));
    }

    #[test]
    fn queued_is_distinguishable() {
        let err = SdkError::Queued { id: "01H".into() };
        assert!(err.is_queued());
        assert!(!SdkError::BreakerOpen.is_queued());
    }

    #[test]
    fn display_formats() {
        assert_eq!(
            SdkError::Validation("amount must be positive".into()).to_string(),
            "validation failed: amount must be positive"
        );
        assert_eq!(
            SdkError::Remote {
                status: 500,
                body: "boom".into()
            }
            .to_string(),
            "remote error (status 500): boom"
        );
        assert_eq!(
            SdkError::BreakerOpen.to_string(),
            "circuit breaker open, call rejected"
        );
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SdkError>();
    }
}
