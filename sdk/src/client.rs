//! Request orchestrator
//!
//! [`Client`] is the SDK entry point: one instance per provider account,
//! holding one dispatcher (circuit breaker + retry executor), one offline
//! queue and one connectivity probe. Methods take `&self` and are safe to
//! call concurrently; concurrent calls intentionally share breaker and
//! queue state so the breaker trips for the instance as a whole.

use crate::batch::{run_batch, BatchResult};
use crate::config::SdkConfig;
use crate::dispatch::Dispatcher;
use crate::http::HttpTransport;
use crate::resilience::{
    CircuitBreaker, CircuitState, DrainStats, OfflineQueue, QueuedOperation, RetryExecutor,
};
use malipo_core::{
    redact, validate, AnalyticsSink, ConnectivityProbe, CorrelationId, Endpoint, NoopAnalytics,
    PaymentRequest, PaymentResponse, RefundRequest, RefundResponse, SdkError, StatusRequest,
    StatusResponse, Transport,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

/// Builder for [`Client`]
///
/// Collaborators not supplied fall back to defaults: the HTTP transport
/// built from the config, an always-online probe, and no-op analytics.
///
/// # Example
///
/// ```ignore
/// let client = Client::builder(SdkConfig {
///     base_url: "https://api.provider.example".into(),
///     api_key: secret,
///     ..Default::default()
/// })
/// .analytics(Arc::new(InMemoryAnalytics::new()))
/// .build();
/// ```
pub struct ClientBuilder {
    config: SdkConfig,
    transport: Option<Arc<dyn Transport>>,
    connectivity: Option<Arc<dyn ConnectivityProbe>>,
    analytics: Option<Arc<dyn AnalyticsSink>>,
}

impl ClientBuilder {
    /// Start a builder from the given configuration
    pub fn new(config: SdkConfig) -> Self {
        Self {
            config,
            transport: None,
            connectivity: None,
            analytics: None,
        }
    }

    /// Override the transport (testing, custom HTTP stacks)
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Override the connectivity probe
    pub fn connectivity(mut self, probe: Arc<dyn ConnectivityProbe>) -> Self {
        self.connectivity = Some(probe);
        self
    }

    /// Override the analytics sink
    pub fn analytics(mut self, sink: Arc<dyn AnalyticsSink>) -> Self {
        self.analytics = Some(sink);
        self
    }

    /// Build the client
    pub fn build(self) -> Client {
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(HttpTransport::new(&self.config)));
        let connectivity = self
            .connectivity
            .unwrap_or_else(|| Arc::new(malipo_core::AlwaysOnline));
        let analytics = self.analytics.unwrap_or_else(|| Arc::new(NoopAnalytics));

        let dispatcher = Arc::new(Dispatcher::new(
            transport,
            CircuitBreaker::new(self.config.breaker.clone()),
            RetryExecutor::new(self.config.retry.clone()),
            analytics,
        ));
        let queue = OfflineQueue::new(self.config.queue.clone(), dispatcher.clone());

        Client {
            dispatcher,
            queue,
            connectivity,
            queue_when_offline: self.config.queue_when_offline,
        }
    }
}

/// Resilient client for the Malipo provider API
pub struct Client {
    dispatcher: Arc<Dispatcher>,
    queue: OfflineQueue,
    connectivity: Arc<dyn ConnectivityProbe>,
    queue_when_offline: bool,
}

impl Client {
    /// Start building a client from configuration
    pub fn builder(config: SdkConfig) -> ClientBuilder {
        ClientBuilder::new(config)
    }

    /// Initiate a payment
    ///
    /// While offline (with offline queueing enabled) the request is
    /// deferred and this returns [`SdkError::Queued`] immediately - track
    /// delivery through [`Client::queue`] events.
    pub async fn initiate_payment(
        &self,
        request: PaymentRequest,
    ) -> Result<PaymentResponse, SdkError> {
        validate::payment_request(&request)?;

        if self.should_defer().await {
            let id = self.queue.enqueue(QueuedOperation::Payment(request));
            tracing::info!(id = %id, operation = "payment", "offline, operation queued");
            return Err(SdkError::Queued { id: id.to_string() });
        }

        let correlation = CorrelationId::new();
        tracing::info!(
            correlation = %correlation,
            msisdn = %redact::msisdn(&request.msisdn),
            amount = %request.amount,
            currency = %request.currency,
            reference = %redact::mask_tail(&request.reference, 4),
            "initiating payment"
        );

        let body = encode_body(&request)?;
        let value = self
            .dispatcher
            .dispatch(correlation, &Endpoint::InitiatePayment, body)
            .await?;
        decode_response(value)
    }

    /// Refund a prior payment, fully or partially
    pub async fn refund(&self, request: RefundRequest) -> Result<RefundResponse, SdkError> {
        validate::refund_request(&request)?;

        if self.should_defer().await {
            let id = self.queue.enqueue(QueuedOperation::Refund(request));
            tracing::info!(id = %id, operation = "refund", "offline, operation queued");
            return Err(SdkError::Queued { id: id.to_string() });
        }

        let correlation = CorrelationId::new();
        tracing::info!(
            correlation = %correlation,
            transaction_id = %request.transaction_id,
            "initiating refund"
        );

        let body = encode_body(&request)?;
        let value = self
            .dispatcher
            .dispatch(correlation, &Endpoint::Refund, body)
            .await?;
        decode_response(value)
    }

    /// Look up the current status of a transaction
    pub async fn transaction_status(
        &self,
        request: StatusRequest,
    ) -> Result<StatusResponse, SdkError> {
        validate::status_request(&request)?;

        if self.should_defer().await {
            let id = self.queue.enqueue(QueuedOperation::StatusLookup(request));
            tracing::info!(id = %id, operation = "status_lookup", "offline, operation queued");
            return Err(SdkError::Queued { id: id.to_string() });
        }

        let correlation = CorrelationId::new();
        tracing::debug!(
            correlation = %correlation,
            transaction_id = %request.transaction_id,
            "looking up transaction status"
        );

        let endpoint = Endpoint::TransactionStatus {
            transaction_id: request.transaction_id,
        };
        let value = self
            .dispatcher
            .dispatch(correlation, &endpoint, Value::Null)
            .await?;
        decode_response(value)
    }

    /// Initiate many payments with bounded concurrency
    ///
    /// Each item dispatches exactly like [`Client::initiate_payment`],
    /// sharing this client's breaker and queue state.
    pub async fn batch_payments(
        &self,
        requests: Vec<PaymentRequest>,
        concurrency: usize,
    ) -> BatchResult<PaymentResponse> {
        run_batch(requests, concurrency, |request| {
            self.initiate_payment(request)
        })
        .await
    }

    /// Refund many transactions with bounded concurrency
    pub async fn batch_refunds(
        &self,
        requests: Vec<RefundRequest>,
        concurrency: usize,
    ) -> BatchResult<RefundResponse> {
        run_batch(requests, concurrency, |request| self.refund(request)).await
    }

    /// Manually drain the offline queue through this client's dispatcher
    pub async fn process_queue(&self) -> DrainStats {
        self.queue.process_queue(self.dispatcher.as_ref()).await
    }

    /// The offline queue, for subscriptions and maintenance
    pub fn queue(&self) -> &OfflineQueue {
        &self.queue
    }

    /// Current circuit breaker state, for monitoring
    pub fn circuit_state(&self) -> CircuitState {
        self.dispatcher.breaker().current_state()
    }

    /// Force the circuit breaker closed (administrative override)
    pub fn reset_circuit(&self) {
        self.dispatcher.breaker().reset();
    }

    /// Stop the queue timer and release queue resources
    ///
    /// In-flight calls complete independently. Idempotent.
    pub fn dispose(&self) {
        self.queue.dispose();
    }

    async fn should_defer(&self) -> bool {
        self.queue_when_offline && !self.connectivity.is_online().await
    }
}

fn encode_body<T: serde::Serialize>(request: &T) -> Result<Value, SdkError> {
    serde_json::to_value(request).map_err(|err| SdkError::Serialization(err.to_string()))
}

fn decode_response<T: DeserializeOwned>(value: Value) -> Result<T, SdkError> {
    serde_json::from_value(value)
        .map_err(|err| SdkError::Serialization(format!("unexpected response shape: {err}")))
}
