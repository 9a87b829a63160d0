//! Dispatch core
//!
//! One [`Dispatcher`] exists per SDK client, owning the circuit breaker and
//! retry executor so that direct calls, batch items and queued items all
//! share the same breaker state and retry accounting.

use crate::resilience::{
    CircuitBreaker, QueueItem, QueueProcessor, QueuedOperation, RetryExecutor,
};
use async_trait::async_trait;
use malipo_core::{AnalyticsEvent, AnalyticsSink, CorrelationId, Endpoint, SdkError, Transport};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

/// Composes `breaker(retry(transport))` around every outbound request
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    breaker: CircuitBreaker,
    retry: RetryExecutor,
    analytics: Arc<dyn AnalyticsSink>,
}

impl Dispatcher {
    /// Create a dispatcher over the given collaborators
    pub fn new(
        transport: Arc<dyn Transport>,
        breaker: CircuitBreaker,
        retry: RetryExecutor,
        analytics: Arc<dyn AnalyticsSink>,
    ) -> Self {
        Self {
            transport,
            breaker,
            retry,
            analytics,
        }
    }

    /// The breaker guarding this dispatcher (for monitoring and reset)
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// The retry executor used by this dispatcher
    pub fn retry(&self) -> &RetryExecutor {
        &self.retry
    }

    /// Dispatch one request through the resilience composition
    ///
    /// Propagates the most specific error unchanged: `BreakerOpen` from the
    /// breaker, otherwise whatever the transport ultimately produced after
    /// retries. One analytics event is recorded per outcome.
    pub async fn dispatch(
        &self,
        correlation_id: CorrelationId,
        endpoint: &Endpoint,
        body: Value,
    ) -> Result<Value, SdkError> {
        let kind = endpoint.kind();
        let started = Instant::now();

        let result = self
            .breaker
            .execute(|| {
                self.retry
                    .execute(|| self.transport.send(endpoint, body.clone()))
            })
            .await;

        let duration = started.elapsed();
        match &result {
            Ok(value) => {
                tracing::debug!(
                    operation = %kind,
                    correlation = %correlation_id,
                    duration_ms = duration.as_millis() as u64,
                    "dispatch succeeded"
                );
                self.analytics.record(&AnalyticsEvent {
                    operation: kind,
                    correlation_id,
                    success: true,
                    duration,
                    transaction_id: value
                        .get("transaction_id")
                        .and_then(Value::as_str)
                        .map(String::from),
                });
            }
            Err(err) => {
                tracing::warn!(
                    operation = %kind,
                    correlation = %correlation_id,
                    duration_ms = duration.as_millis() as u64,
                    error = %err,
                    "dispatch failed"
                );
                self.analytics.record(&AnalyticsEvent {
                    operation: kind,
                    correlation_id,
                    success: false,
                    duration,
                    transaction_id: None,
                });
            }
        }
        result
    }
}

/// Serialize a queued operation into its endpoint and request body
pub(crate) fn encode_operation(
    operation: &QueuedOperation,
) -> Result<(Endpoint, Value), SdkError> {
    let encoded = match operation {
        QueuedOperation::Payment(req) => (Endpoint::InitiatePayment, serde_json::to_value(req)),
        QueuedOperation::Refund(req) => (Endpoint::Refund, serde_json::to_value(req)),
        QueuedOperation::StatusLookup(req) => (
            Endpoint::TransactionStatus {
                transaction_id: req.transaction_id.clone(),
            },
            Ok(Value::Null),
        ),
    };
    match encoded {
        (endpoint, Ok(body)) => Ok((endpoint, body)),
        (_, Err(err)) => Err(SdkError::Serialization(err.to_string())),
    }
}

#[async_trait]
impl QueueProcessor for Dispatcher {
    async fn process(&self, item: &QueueItem) -> Result<(), SdkError> {
        let (endpoint, body) = encode_operation(&item.operation)?;
        self.dispatch(item.id, &endpoint, body).await.map(|_| ())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::resilience::{CircuitBreakerConfig, RetryPolicy};
    use malipo_core::{NoopAnalytics, PaymentRequest, StatusRequest};
    use rust_decimal::Decimal;
    use std::str::FromStr;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Transport that fails a scripted number of times, then succeeds
    struct FlakyTransport {
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl Transport for FlakyTransport {
        async fn send(&self, _endpoint: &Endpoint, _body: Value) -> Result<Value, SdkError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(SdkError::Transport("flaky".into()))
            } else {
                Ok(serde_json::json!({ "transaction_id": "TX1" }))
            }
        }
    }

    fn dispatcher_with(transport: Arc<dyn Transport>, max_attempts: u32) -> Dispatcher {
        Dispatcher::new(
            transport,
            CircuitBreaker::new(CircuitBreakerConfig::default()),
            RetryExecutor::new(RetryPolicy {
                max_attempts,
                initial_delay: std::time::Duration::from_millis(1),
                ..Default::default()
            }),
            Arc::new(NoopAnalytics),
        )
    }

    #[tokio::test]
    async fn dispatch_retries_through_breaker() {
        let transport = Arc::new(FlakyTransport {
            failures: 2,
            calls: AtomicU32::new(0),
        });
        let dispatcher = dispatcher_with(transport.clone(), 3);

        let result = dispatcher
            .dispatch(
                CorrelationId::new(),
                &Endpoint::InitiatePayment,
                Value::Null,
            )
            .await;

        assert!(result.is_ok());
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn queued_items_dispatch_through_same_composition() {
        let transport = Arc::new(FlakyTransport {
            failures: 0,
            calls: AtomicU32::new(0),
        });
        let dispatcher = dispatcher_with(transport.clone(), 3);

        let item = QueueItem {
            id: CorrelationId::new(),
            operation: QueuedOperation::Payment(PaymentRequest {
                msisdn: "+254712345678".into(),
                amount: Decimal::from_str("10").unwrap(),
                currency: "KES".into(),
                reference: "R1".into(),
                description: None,
            }),
            created_at: tokio::time::Instant::now(),
            attempts: 0,
            next_retry_at: None,
        };

        assert!(dispatcher.process(&item).await.is_ok());
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn encode_status_lookup_builds_path_endpoint() {
        let (endpoint, body) = encode_operation(&QueuedOperation::StatusLookup(StatusRequest {
            transaction_id: "TX9".into(),
        }))
        .unwrap();
        assert_eq!(
            endpoint,
            Endpoint::TransactionStatus {
                transaction_id: "TX9".into()
            }
        );
        assert_eq!(body, Value::Null);
    }

    #[test]
    fn encode_payment_serializes_request() {
        let (endpoint, body) = encode_operation(&QueuedOperation::Payment(PaymentRequest {
            msisdn: "+254712345678".into(),
            amount: Decimal::from_str("10").unwrap(),
            currency: "KES".into(),
            reference: "R1".into(),
            description: None,
        }))
        .unwrap();
        assert_eq!(endpoint, Endpoint::InitiatePayment);
        assert_eq!(body["reference"], "R1");
    }
}
