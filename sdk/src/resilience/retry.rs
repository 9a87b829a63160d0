//! Retry executor with exponential backoff
//!
//! Runs an arbitrary async operation, retrying classified-retryable
//! failures according to a [`RetryPolicy`].

use malipo_core::SdkError;
use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Lock-free xorshift64 PRNG for jitter randomness
///
/// Uses atomic compare-exchange for thread-safe operation without locks.
struct Xorshift64 {
    state: AtomicU64,
}

impl Xorshift64 {
    /// Create with seed from system time
    fn new() -> Self {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0x853c49e6748fea9b);
        // Ensure non-zero seed
        let seed = if seed == 0 { 0x853c49e6748fea9b } else { seed };
        Self {
            state: AtomicU64::new(seed),
        }
    }

    /// Generate next random u64 using xorshift64 algorithm
    fn next(&self) -> u64 {
        loop {
            let old = self.state.load(Ordering::Acquire);
            let mut x = old;
            x ^= x << 13;
            x ^= x >> 7;
            x ^= x << 17;
            if self
                .state
                .compare_exchange_weak(old, x, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return x;
            }
        }
    }

    /// Generate random f64 in range [0.0, 1.0)
    fn next_f64(&self) -> f64 {
        (self.next() as f64) / (u64::MAX as f64)
    }
}

static JITTER_RNG: std::sync::LazyLock<Xorshift64> = std::sync::LazyLock::new(Xorshift64::new);

/// Generate random jitter value in range [0.0, 1.0)
fn rand_jitter() -> f64 {
    JITTER_RNG.next_f64()
}

/// Retry policy: attempt budget, backoff shape, and which failures qualify
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total invocation budget; 1 means a single attempt, no retries
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Ceiling on any single delay
    pub max_delay: Duration,
    /// Multiplier applied per retry when `exponential` is set
    pub backoff_multiplier: f64,
    /// Exponential growth when true, constant `initial_delay` otherwise
    pub exponential: bool,
    /// HTTP status codes that qualify a remote error for retry
    pub retryable_status_codes: HashSet<u16>,
    /// Jitter factor (0.0-1.0) - randomizes each delay by +/- this fraction.
    /// Zero keeps the delay sequence exact.
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            exponential: true,
            retryable_status_codes: [408, 429, 500, 502, 503, 504].into_iter().collect(),
            jitter_factor: 0.0,
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the n-th failure (1-indexed)
    ///
    /// Failure 1 waits `initial_delay`; with `exponential` set each
    /// subsequent failure waits `min(previous * multiplier, max_delay)`.
    pub fn delay_for_failure(&self, failure: u32) -> Duration {
        self.delay_for_failure_with_jitter(failure, rand_jitter())
    }

    /// Calculate delay with explicit jitter value (for testing)
    pub fn delay_for_failure_with_jitter(&self, failure: u32, jitter: f64) -> Duration {
        if failure == 0 {
            return Duration::ZERO;
        }

        // Microseconds for precision with small delays
        let base_us = if self.exponential {
            self.initial_delay.as_micros() as f64
                * self.backoff_multiplier.powi((failure - 1) as i32)
        } else {
            self.initial_delay.as_micros() as f64
        };
        let base_us = base_us.min(self.max_delay.as_micros() as f64);

        if self.jitter_factor == 0.0 {
            return Duration::from_micros(base_us as u64);
        }

        // Apply jitter: delay * (1 +/- jitter_factor * random)
        let jitter_range = base_us * self.jitter_factor;
        let jitter_offset = (jitter * 2.0 - 1.0) * jitter_range;
        let final_us = (base_us + jitter_offset).max(1.0);

        Duration::from_micros(final_us as u64)
    }

    /// Whether the policy classifies this error as retryable
    pub fn is_retryable(&self, err: &SdkError) -> bool {
        err.is_retryable(&self.retryable_status_codes)
    }
}

/// Executes operations under a [`RetryPolicy`]
///
/// No side effects beyond invoking the operation and waiting: the executor
/// never logs request payloads and never touches shared state.
pub struct RetryExecutor {
    policy: RetryPolicy,
    /// Metrics: total retry attempts
    retry_count: AtomicU64,
    /// Metrics: operations that recovered after at least one failure
    recovered_count: AtomicU64,
}

impl RetryExecutor {
    /// Create an executor with the given policy
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            retry_count: AtomicU64::new(0),
            recovered_count: AtomicU64::new(0),
        }
    }

    /// The policy this executor runs under
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Get total retry attempts
    pub fn retry_count(&self) -> u64 {
        self.retry_count.load(Ordering::Relaxed)
    }

    /// Get count of operations that recovered after failure
    pub fn recovered_count(&self) -> u64 {
        self.recovered_count.load(Ordering::Relaxed)
    }

    /// Run `op`, retrying retryable failures up to the attempt budget
    ///
    /// Non-retryable failures propagate immediately; when attempts are
    /// exhausted the last failure propagates unchanged.
    pub async fn execute<T, F, Fut>(&self, mut op: F) -> Result<T, SdkError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SdkError>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                let delay = self.policy.delay_for_failure(attempt - 1);
                self.retry_count.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "retrying operation"
                );
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }

            match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        self.recovered_count.fetch_add(1, Ordering::Relaxed);
                        tracing::info!(attempt, "operation recovered after retry");
                    }
                    return Ok(value);
                }
                Err(err) => {
                    if !self.policy.is_retryable(&err) {
                        tracing::debug!(error = %err, "failure is not retryable");
                        return Err(err);
                    }
                    tracing::warn!(
                        attempt,
                        max_attempts,
                        error = %err,
                        "operation attempt failed"
                    );
                    last_error = Some(err);
                }
            }
        }

        // All attempts exhausted
        Err(last_error.unwrap_or_else(|| SdkError::Transport("all retries exhausted".into())))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    fn no_jitter_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 10,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            exponential: true,
            jitter_factor: 0.0,
            ..Default::default()
        }
    }

    fn retryable_error() -> SdkError {
        SdkError::Remote {
            status: 503,
            body: "unavailable".into(),
        }
    }

    #[test]
    fn delay_for_failure_zero_is_zero() {
        assert_eq!(
            no_jitter_policy().delay_for_failure(0),
            Duration::ZERO
        );
    }

    #[test]
    fn delay_grows_exponentially() {
        let policy = no_jitter_policy();
        assert_eq!(policy.delay_for_failure(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for_failure(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for_failure(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for_failure(4), Duration::from_millis(800));
    }

    #[test]
    fn delay_caps_at_max() {
        let policy = RetryPolicy {
            max_delay: Duration::from_millis(500),
            ..no_jitter_policy()
        };
        // failure 4: 100 * 2^3 = 800ms, capped at 500ms
        assert_eq!(policy.delay_for_failure(4), Duration::from_millis(500));
        assert_eq!(policy.delay_for_failure(10), Duration::from_millis(500));
    }

    #[test]
    fn delay_constant_when_not_exponential() {
        let policy = RetryPolicy {
            exponential: false,
            ..no_jitter_policy()
        };
        assert_eq!(policy.delay_for_failure(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for_failure(5), Duration::from_millis(100));
    }

    #[test]
    fn jitter_range() {
        let policy = RetryPolicy {
            jitter_factor: 0.25,
            ..no_jitter_policy()
        };
        // At failure 1, base is 100ms, jitter range is +/- 25ms
        assert_eq!(
            policy.delay_for_failure_with_jitter(1, 0.0),
            Duration::from_millis(75)
        );
        assert_eq!(
            policy.delay_for_failure_with_jitter(1, 1.0),
            Duration::from_millis(125)
        );
    }

    #[tokio::test]
    async fn succeeds_on_first_try() {
        let executor = RetryExecutor::new(no_jitter_policy());
        let calls = AtomicU32::new(0);

        let result = executor
            .execute(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, SdkError>(42) }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(executor.retry_count(), 0);
        assert_eq!(executor.recovered_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_from_transient_failures() {
        let executor = RetryExecutor::new(RetryPolicy {
            max_attempts: 3,
            ..no_jitter_policy()
        });
        let calls = AtomicU32::new(0);

        let result = executor
            .execute(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(retryable_error())
                    } else {
                        Ok("delivered")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "delivered");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(executor.retry_count(), 2);
        assert_eq!(executor.recovered_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_invokes_exactly_max_attempts() {
        let executor = RetryExecutor::new(RetryPolicy {
            max_attempts: 4,
            ..no_jitter_policy()
        });
        let calls = AtomicU32::new(0);

        let result = executor
            .execute(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(retryable_error()) }
            })
            .await;

        assert_eq!(result.unwrap_err(), retryable_error());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(executor.retry_count(), 3);
    }

    #[tokio::test]
    async fn non_retryable_short_circuits() {
        let executor = RetryExecutor::new(RetryPolicy {
            max_attempts: 5,
            ..no_jitter_policy()
        });
        let calls = AtomicU32::new(0);

        let result = executor
            .execute(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(SdkError::Validation("bad msisdn".into())) }
            })
            .await;

        assert!(matches!(result, Err(SdkError::Validation(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn non_retryable_status_short_circuits() {
        let executor = RetryExecutor::new(RetryPolicy {
            max_attempts: 5,
            ..no_jitter_policy()
        });
        let calls = AtomicU32::new(0);

        let result = executor
            .execute(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err::<(), _>(SdkError::Remote {
                        status: 404,
                        body: "not found".into(),
                    })
                }
            })
            .await;

        assert!(matches!(result, Err(SdkError::Remote { status: 404, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn single_attempt_means_no_retries() {
        let executor = RetryExecutor::new(RetryPolicy {
            max_attempts: 1,
            ..no_jitter_policy()
        });
        let calls = AtomicU32::new(0);

        let result = executor
            .execute(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(retryable_error()) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(executor.retry_count(), 0);
    }

    /// 100ms initial, x2 exponential, fail twice then succeed on the 3rd
    /// call: total elapsed is the 100 + 200ms backoff, exactly 3 invocations.
    #[tokio::test(start_paused = true)]
    async fn backoff_sequence_honored_under_paused_time() {
        let executor = RetryExecutor::new(RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            backoff_multiplier: 2.0,
            exponential: true,
            jitter_factor: 0.0,
            ..Default::default()
        });
        let calls = AtomicU32::new(0);
        let started = tokio::time::Instant::now();

        let result = executor
            .execute(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(retryable_error())
                    } else {
                        Ok(())
                    }
                }
            })
            .await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Paused clock advances exactly by the two backoff sleeps: 100 + 200ms
        assert_eq!(started.elapsed(), Duration::from_millis(300));
    }

    #[test]
    fn xorshift_produces_distinct_values() {
        let rng = Xorshift64::new();
        let values: Vec<u64> = (0..100).map(|_| rng.next()).collect();
        let unique = values.iter().collect::<std::collections::HashSet<_>>().len();
        assert!(unique > 90, "expected >90 unique values, got {unique}");
    }

    #[test]
    fn xorshift_f64_in_range() {
        let rng = Xorshift64::new();
        for _ in 0..1000 {
            let v = rng.next_f64();
            assert!((0.0..1.0).contains(&v), "value {v} out of range");
        }
    }
}
