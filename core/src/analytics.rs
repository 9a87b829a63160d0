//! Analytics contract
//!
//! The SDK hands one [`AnalyticsEvent`] to the sink per successful dispatch.
//! The sink is a fire-and-forget collaborator: it must not block and it
//! cannot fail the caller's result.

use crate::model::{CorrelationId, OperationKind};
use std::time::Duration;

/// One completed dispatch, as seen by analytics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyticsEvent {
    /// Which logical operation ran
    pub operation: OperationKind,
    /// Correlation id shared with the call's log lines
    pub correlation_id: CorrelationId,
    /// Whether the dispatch succeeded
    pub success: bool,
    /// Wall-clock time from first attempt to final outcome
    pub duration: Duration,
    /// Provider transaction id, when the response carried one
    pub transaction_id: Option<String>,
}

/// Analytics sink - receives dispatch events for later aggregation
///
/// # Implementation Requirements
///
/// - `record` must return promptly; do any heavy aggregation or I/O on a
///   separate task
/// - `record` is called from concurrent SDK calls; implementations manage
///   their own synchronization
pub trait AnalyticsSink: Send + Sync {
    /// Record one dispatch outcome
    fn record(&self, event: &AnalyticsEvent);
}

/// Sink that discards every event
///
/// The default when the embedding application does not care about
/// aggregation.
pub struct NoopAnalytics;

impl AnalyticsSink for NoopAnalytics {
    fn record(&self, _event: &AnalyticsEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_sink_accepts_events() {
        let sink = NoopAnalytics;
        sink.record(&AnalyticsEvent {
            operation: OperationKind::Payment,
            correlation_id: CorrelationId::new(),
            success: true,
            duration: Duration::from_millis(12),
            transaction_id: Some("TX1".into()),
        });
    }

    #[test]
    fn sink_is_object_safe() {
        fn assert_send_sync<T: Send + Sync + ?Sized>() {}
        assert_send_sync::<dyn AnalyticsSink>();
    }
}
