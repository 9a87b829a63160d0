//! In-memory analytics aggregation
//!
//! The default [`AnalyticsSink`] implementations live in `malipo-core`
//! (no-op) and here (in-memory aggregation). Aggregation is per operation
//! kind: counts and cumulative latency, cheap enough to record inline.

use malipo_core::{AnalyticsEvent, AnalyticsSink, OperationKind};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;

/// Aggregated outcomes for one operation kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationStats {
    /// Successful dispatches
    pub successes: u64,
    /// Failed dispatches
    pub failures: u64,
    /// Cumulative wall-clock time across all dispatches
    pub total_duration: Duration,
}

impl OperationStats {
    /// Total dispatches recorded
    pub fn total(&self) -> u64 {
        self.successes + self.failures
    }

    /// Mean dispatch duration, zero when nothing was recorded
    pub fn mean_duration(&self) -> Duration {
        let total = self.total();
        if total == 0 {
            Duration::ZERO
        } else {
            self.total_duration / total as u32
        }
    }
}

/// Sink that aggregates events in memory
///
/// `record` takes a short lock and returns; safe to share across all of a
/// client's concurrent calls.
#[derive(Default)]
pub struct InMemoryAnalytics {
    stats: Mutex<HashMap<OperationKind, OperationStats>>,
}

impl InMemoryAnalytics {
    /// Create an empty aggregator
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current aggregates
    pub fn snapshot(&self) -> HashMap<OperationKind, OperationStats> {
        self.stats.lock().clone()
    }

    /// Aggregates for one operation kind, default-zero when unseen
    pub fn stats_for(&self, kind: OperationKind) -> OperationStats {
        self.stats.lock().get(&kind).cloned().unwrap_or_default()
    }
}

impl AnalyticsSink for InMemoryAnalytics {
    fn record(&self, event: &AnalyticsEvent) {
        let mut stats = self.stats.lock();
        let entry = stats.entry(event.operation).or_default();
        if event.success {
            entry.successes += 1;
        } else {
            entry.failures += 1;
        }
        entry.total_duration += event.duration;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use malipo_core::CorrelationId;

    fn event(kind: OperationKind, success: bool, millis: u64) -> AnalyticsEvent {
        AnalyticsEvent {
            operation: kind,
            correlation_id: CorrelationId::new(),
            success,
            duration: Duration::from_millis(millis),
            transaction_id: None,
        }
    }

    #[test]
    fn aggregates_per_operation_kind() {
        let sink = InMemoryAnalytics::new();
        sink.record(&event(OperationKind::Payment, true, 100));
        sink.record(&event(OperationKind::Payment, false, 50));
        sink.record(&event(OperationKind::Refund, true, 20));

        let payments = sink.stats_for(OperationKind::Payment);
        assert_eq!(payments.successes, 1);
        assert_eq!(payments.failures, 1);
        assert_eq!(payments.total(), 2);
        assert_eq!(payments.total_duration, Duration::from_millis(150));
        assert_eq!(payments.mean_duration(), Duration::from_millis(75));

        let refunds = sink.stats_for(OperationKind::Refund);
        assert_eq!(refunds.total(), 1);

        assert_eq!(sink.stats_for(OperationKind::StatusLookup).total(), 0);
    }

    #[test]
    fn snapshot_is_a_copy() {
        let sink = InMemoryAnalytics::new();
        sink.record(&event(OperationKind::Payment, true, 10));

        let snapshot = sink.snapshot();
        sink.record(&event(OperationKind::Payment, true, 10));

        assert_eq!(snapshot[&OperationKind::Payment].successes, 1);
        assert_eq!(sink.stats_for(OperationKind::Payment).successes, 2);
    }
}
