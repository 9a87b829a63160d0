//! Resilience layer for outbound requests
//!
//! Composable fault-tolerance around every provider call:
//! - **RetryExecutor**: retry-with-backoff for transient failures
//! - **CircuitBreaker**: fail fast while the provider is unhealthy
//! - **OfflineQueue**: defer operations while connectivity is down
//!
//! The dispatcher composes them as `breaker(retry(transport))`; the queue
//! feeds deferred items back through the same composition.

mod circuit_breaker;
mod queue;
mod retry;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use queue::{
    DrainStats, OfflineQueue, QueueConfig, QueueEvent, QueueItem, QueueProcessor, QueuedOperation,
    MAX_ATTEMPTS,
};
pub use retry::{RetryExecutor, RetryPolicy};
