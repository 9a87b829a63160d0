//! Circuit breaker
//!
//! Fails fast when the provider looks unhealthy instead of piling retries
//! onto a struggling backend.
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive_failures >= failure_threshold
//! Open → Half-Open: after open_duration since the last failure
//! Half-Open → Closed: probe call succeeds
//! Half-Open → Open: probe call fails or times out
//! ```
//!
//! A single probe is allowed in Half-Open; concurrent calls during a probe
//! are rejected like calls against an open circuit.

use malipo_core::SdkError;
use parking_lot::RwLock;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Circuit breaker state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Circuit is closed - calls flow through
    Closed,
    /// Circuit is open - calls fail fast
    Open,
    /// Testing whether the provider recovered - one probe allowed
    HalfOpen,
}

/// Configuration for circuit breaker behavior
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures that opens the circuit
    pub failure_threshold: u32,
    /// Time to wait before transitioning from Open to HalfOpen
    pub open_duration: Duration,
    /// Time budget for the HalfOpen probe call; a timed-out probe counts
    /// as a failure. `None` disables the probe timeout.
    pub probe_timeout: Option<Duration>,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_duration: Duration::from_secs(60),
            probe_timeout: Some(Duration::from_secs(30)),
        }
    }
}

/// Internal state tracking
struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    last_failure_time: Option<Instant>,
    probe_in_flight: bool,
}

impl BreakerState {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            last_failure_time: None,
            probe_in_flight: false,
        }
    }
}

/// How a permitted call entered the breaker
enum CallPermit {
    Normal,
    Probe,
}

/// Circuit breaker guarding one provider
///
/// State is owned exclusively by this instance and mutated only by its own
/// methods; the lock is never held across an await point.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state: RwLock<BreakerState>,
    /// Metrics: times the circuit opened
    open_count: AtomicU64,
    /// Metrics: calls rejected without being attempted
    rejected_count: AtomicU64,
}

impl CircuitBreaker {
    /// Create a breaker with the given configuration
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            state: RwLock::new(BreakerState::new()),
            open_count: AtomicU64::new(0),
            rejected_count: AtomicU64::new(0),
        }
    }

    /// Create a breaker with default configuration
    pub fn with_defaults() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }

    /// Get current circuit state (for monitoring)
    pub fn current_state(&self) -> CircuitState {
        self.state.read().state
    }

    /// Get count of times the circuit has opened
    pub fn open_count(&self) -> u64 {
        self.open_count.load(Ordering::Relaxed)
    }

    /// Get count of rejected calls
    pub fn rejected_count(&self) -> u64 {
        self.rejected_count.load(Ordering::Relaxed)
    }

    /// Force the breaker back to Closed with zero failures
    ///
    /// Administrative override; normal recovery goes through HalfOpen.
    pub fn reset(&self) {
        let mut state = self.state.write();
        *state = BreakerState::new();
        tracing::info!("circuit breaker reset to closed");
    }

    /// Run `op` under the breaker
    ///
    /// Rejected calls fail with [`SdkError::BreakerOpen`] without invoking
    /// `op`; otherwise the operation's own result propagates and updates
    /// the failure accounting.
    pub async fn execute<T, F, Fut>(&self, op: F) -> Result<T, SdkError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, SdkError>>,
    {
        let permit = match self.try_acquire() {
            Some(permit) => permit,
            None => return Err(SdkError::BreakerOpen),
        };

        let result = match (&permit, self.config.probe_timeout) {
            (CallPermit::Probe, Some(limit)) => match tokio::time::timeout(limit, op()).await {
                Ok(result) => result,
                Err(_) => Err(SdkError::Transport(format!(
                    "half-open probe timed out after {}ms",
                    limit.as_millis()
                ))),
            },
            _ => op().await,
        };

        match result {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(err) => {
                self.record_failure();
                Err(err)
            }
        }
    }

    /// Check whether a call may proceed, applying time-based transitions
    fn try_acquire(&self) -> Option<CallPermit> {
        let mut state = self.state.write();

        match state.state {
            CircuitState::Closed => Some(CallPermit::Normal),

            CircuitState::Open => {
                if let Some(last_failure) = state.last_failure_time {
                    if last_failure.elapsed() >= self.config.open_duration {
                        state.state = CircuitState::HalfOpen;
                        state.probe_in_flight = true;
                        tracing::info!("circuit breaker transitioning to half-open");
                        return Some(CallPermit::Probe);
                    }
                }
                self.rejected_count.fetch_add(1, Ordering::Relaxed);
                None
            }

            CircuitState::HalfOpen => {
                if state.probe_in_flight {
                    self.rejected_count.fetch_add(1, Ordering::Relaxed);
                    None
                } else {
                    state.probe_in_flight = true;
                    Some(CallPermit::Probe)
                }
            }
        }
    }

    /// Record a successful call
    fn record_success(&self) {
        let mut state = self.state.write();
        state.consecutive_failures = 0;

        if state.state == CircuitState::HalfOpen {
            state.state = CircuitState::Closed;
            state.probe_in_flight = false;
            tracing::info!("circuit breaker closed - provider recovered");
        }
    }

    /// Record a failed call
    fn record_failure(&self) {
        let mut state = self.state.write();
        state.consecutive_failures += 1;
        state.last_failure_time = Some(Instant::now());

        match state.state {
            CircuitState::Closed => {
                if state.consecutive_failures >= self.config.failure_threshold {
                    state.state = CircuitState::Open;
                    self.open_count.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        failures = state.consecutive_failures,
                        "circuit breaker opened - too many consecutive failures"
                    );
                }
            }
            CircuitState::HalfOpen => {
                // Any probe failure immediately re-opens the circuit
                state.state = CircuitState::Open;
                state.probe_in_flight = false;
                self.open_count.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("circuit breaker re-opened - probe failed");
            }
            CircuitState::Open => {
                // Already open, the failure time was refreshed above
            }
        }
    }
}
