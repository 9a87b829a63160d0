//! Transport and connectivity contracts
//!
//! The [`Transport`] trait is the seam between the resilience layer and the
//! wire. The SDK ships an HTTP implementation; tests and embedding
//! applications supply their own.

use crate::error::SdkError;
use crate::model::Endpoint;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};

/// Transport trait - delivers one request to a provider endpoint
///
/// Implementations own URL and header construction, authentication and the
/// per-request timeout. The resilience layer only classifies the returned
/// error, so implementations must map failures onto the taxonomy:
///
/// - no HTTP response at all → [`SdkError::Transport`]
/// - non-2xx response → [`SdkError::Remote`] with the status code verbatim
///
/// # Implementation Requirements
///
/// - `Send + Sync`: one transport instance is shared across concurrent calls
/// - `send` must be safe to invoke repeatedly with the same arguments; the
///   retry executor re-invokes it on retryable failures
///
/// # Example
///
/// ```ignore
/// use malipo_core::{Endpoint, SdkError, Transport};
/// use async_trait::async_trait;
/// use serde_json::Value;
///
/// struct RecordingTransport;
///
/// #[async_trait]
/// impl Transport for RecordingTransport {
///     async fn send(&self, endpoint: &Endpoint, body: Value) -> Result<Value, SdkError> {
///         println!("{} {}", endpoint.method(), endpoint.path());
///         Ok(serde_json::json!({ "transaction_id": "TX1", "status": "pending" }))
///     }
/// }
/// ```
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver `body` to `endpoint` and return the parsed response body
    ///
    /// `body` is ignored by implementations for bodiless methods (GET).
    async fn send(&self, endpoint: &Endpoint, body: Value) -> Result<Value, SdkError>;
}

/// Connectivity probe - reports whether the network currently looks usable
///
/// Consulted once per call, before dispatch, to decide immediate delivery
/// versus deferral to the offline queue. Probes should be cheap; they are
/// not a guarantee the call will succeed.
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    /// Whether network access currently appears available
    async fn is_online(&self) -> bool;
}

/// Probe that always reports online
///
/// The default: every call dispatches immediately and the offline queue is
/// only fed by explicit application decisions.
pub struct AlwaysOnline;

#[async_trait]
impl ConnectivityProbe for AlwaysOnline {
    async fn is_online(&self) -> bool {
        true
    }
}

/// Probe backed by an application-controlled flag
///
/// Mobile shells typically learn about connectivity changes from the
/// platform; they flip this flag from their listener.
pub struct ManualProbe {
    online: AtomicBool,
}

impl ManualProbe {
    /// Create a probe with the given initial state
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
        }
    }

    /// Update the reported state
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::Relaxed);
    }
}

#[async_trait]
impl ConnectivityProbe for ManualProbe {
    async fn is_online(&self) -> bool {
        self.online.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::sync::Arc;

    /// Transport that counts calls and returns a canned response
    struct CountingTransport {
        calls: AtomicU32,
    }

    #[async_trait]
    impl Transport for CountingTransport {
        async fn send(&self, _endpoint: &Endpoint, _body: Value) -> Result<Value, SdkError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(serde_json::json!({ "ok": true }))
        }
    }

    #[tokio::test]
    async fn transport_is_object_safe() {
        let transport: Arc<dyn Transport> = Arc::new(CountingTransport {
            calls: AtomicU32::new(0),
        });
        let result = transport
            .send(&Endpoint::InitiatePayment, Value::Null)
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn always_online_reports_online() {
        assert!(AlwaysOnline.is_online().await);
    }

    #[tokio::test]
    async fn manual_probe_toggles() {
        let probe = ManualProbe::new(true);
        assert!(probe.is_online().await);
        probe.set_online(false);
        assert!(!probe.is_online().await);
        probe.set_online(true);
        assert!(probe.is_online().await);
    }
}
