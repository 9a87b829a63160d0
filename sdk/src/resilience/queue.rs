//! Offline queue for deferred operations
//!
//! In-memory FIFO of operations that could not be dispatched immediately.
//! Items carry per-attempt retry bookkeeping; failed attempts re-enter at
//! the tail with an exponential `next_retry_at` delay, and items are
//! dropped after [`MAX_ATTEMPTS`] failures. Two processing modes share the
//! same bookkeeping:
//!
//! - **Timer-driven**: a background task started on first enqueue attempts
//!   one due item per tick.
//! - **Manual drain**: [`OfflineQueue::process_queue`] walks the current
//!   queue once, on demand.
//!
//! Outcomes are observable on a broadcast stream: every subscriber sees
//! every [`QueueEvent`].

use malipo_core::{
    CorrelationId, OperationKind, PaymentRequest, RefundRequest, SdkError, StatusRequest,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::time::Instant;

/// Maximum processing attempts before an item is dropped
pub const MAX_ATTEMPTS: u32 = 3;

/// A deferred operation with its request payload
#[derive(Debug, Clone, PartialEq)]
pub enum QueuedOperation {
    /// Deferred payment initiation
    Payment(PaymentRequest),
    /// Deferred refund
    Refund(RefundRequest),
    /// Deferred status lookup
    StatusLookup(StatusRequest),
}

impl QueuedOperation {
    /// The logical operation this payload belongs to
    pub fn kind(&self) -> OperationKind {
        match self {
            QueuedOperation::Payment(_) => OperationKind::Payment,
            QueuedOperation::Refund(_) => OperationKind::Refund,
            QueuedOperation::StatusLookup(_) => OperationKind::StatusLookup,
        }
    }
}

/// One deferred unit of work awaiting dispatch or retry
#[derive(Debug, Clone)]
pub struct QueueItem {
    /// Unique id, shared with logs and the caller's `Queued` error
    pub id: CorrelationId,
    /// The deferred operation
    pub operation: QueuedOperation,
    /// When the item was enqueued
    pub created_at: Instant,
    /// Failed processing attempts so far
    pub attempts: u32,
    /// Earliest time the next attempt may run; `None` means immediately due
    pub next_retry_at: Option<Instant>,
}

impl QueueItem {
    fn new(operation: QueuedOperation) -> Self {
        Self {
            id: CorrelationId::new(),
            operation,
            created_at: Instant::now(),
            attempts: 0,
            next_retry_at: None,
        }
    }

    /// Whether the item may be processed at `now`
    pub fn is_due(&self, now: Instant) -> bool {
        self.next_retry_at.map_or(true, |at| at <= now)
    }
}

/// Outcome event published on the queue's broadcast stream
#[derive(Debug, Clone)]
pub enum QueueEvent {
    /// The item was delivered successfully
    Processed(QueueItem),
    /// The item exhausted its attempts and was dropped
    Failed(QueueItem),
}

/// Configuration for queue timing
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Interval between timer-driven processing ticks
    pub poll_interval: Duration,
    /// Base for the retry delay: `backoff_base * 2^attempts`
    pub backoff_base: Duration,
    /// Broadcast channel capacity for outcome events
    pub event_capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            backoff_base: Duration::from_secs(1),
            event_capacity: 64,
        }
    }
}

/// Processor invoked for each queue item
///
/// Typically the SDK's dispatcher, so deferred items flow through the same
/// circuit breaker and retry executor as direct calls.
#[async_trait]
pub trait QueueProcessor: Send + Sync {
    /// Attempt to deliver one item
    async fn process(&self, item: &QueueItem) -> Result<(), SdkError>;
}

/// Result of one manual drain pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainStats {
    /// Items delivered this pass
    pub processed: usize,
    /// Items dropped after exhausting their attempts
    pub failed: usize,
    /// Items left queued: not yet due, or re-enqueued with backoff
    pub deferred: usize,
}

/// What became of a single processing attempt
enum AttemptOutcome {
    Processed,
    Requeued,
    Dropped,
}

struct QueueInner {
    config: QueueConfig,
    processor: Arc<dyn QueueProcessor>,
    items: Mutex<VecDeque<QueueItem>>,
    /// `None` after dispose; subscribers then observe a closed stream
    events: Mutex<Option<broadcast::Sender<QueueEvent>>>,
    draining: AtomicBool,
    timer_started: AtomicBool,
    disposed: AtomicBool,
    shutdown: watch::Sender<bool>,
    /// Metrics: items delivered over the queue's lifetime
    processed_total: AtomicU64,
    /// Metrics: items dropped after exhausting attempts
    failed_total: AtomicU64,
}

impl QueueInner {
    fn emit(&self, event: QueueEvent) {
        let guard = self.events.lock();
        if let Some(tx) = guard.as_ref() {
            // No subscribers is fine; events are advisory
            let _ = tx.send(event);
        }
    }

    /// Pop and attempt the first due item, if any (timer tick)
    async fn process_one_due(&self) {
        let item = {
            let mut items = self.items.lock();
            let now = Instant::now();
            match items.iter().position(|item| item.is_due(now)) {
                Some(pos) => items.remove(pos),
                None => None,
            }
        };
        if let Some(item) = item {
            self.attempt(item, self.processor.as_ref()).await;
        }
    }

    /// Attempt one item; the item is owned here and either consumed into an
    /// event or re-enqueued as a fresh copy with bumped bookkeeping
    async fn attempt(&self, mut item: QueueItem, processor: &dyn QueueProcessor) -> AttemptOutcome {
        tracing::debug!(
            id = %item.id,
            operation = %item.operation.kind(),
            attempt = item.attempts + 1,
            "processing queued operation"
        );

        match processor.process(&item).await {
            Ok(()) => {
                self.processed_total.fetch_add(1, Ordering::Relaxed);
                tracing::info!(id = %item.id, "queued operation delivered");
                self.emit(QueueEvent::Processed(item));
                AttemptOutcome::Processed
            }
            Err(err) => {
                item.attempts += 1;
                if item.attempts >= MAX_ATTEMPTS {
                    self.failed_total.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        id = %item.id,
                        attempts = item.attempts,
                        error = %err,
                        "queued operation dropped after max attempts"
                    );
                    self.emit(QueueEvent::Failed(item));
                    AttemptOutcome::Dropped
                } else {
                    let delay = self.config.backoff_base * 2u32.pow(item.attempts);
                    item.next_retry_at = Some(Instant::now() + delay);
                    tracing::debug!(
                        id = %item.id,
                        attempts = item.attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "queued operation re-enqueued with backoff"
                    );
                    self.items.lock().push_back(item);
                    AttemptOutcome::Requeued
                }
            }
        }
    }

    /// One manual drain pass: each currently-queued item is considered once
    async fn drain_once(&self, processor: &dyn QueueProcessor) -> DrainStats {
        let mut stats = DrainStats::default();
        let snapshot_len = self.items.lock().len();

        for _ in 0..snapshot_len {
            let popped = self.items.lock().pop_front();
            let Some(item) = popped else { break };

            if !item.is_due(Instant::now()) {
                // Rotate to the tail unprocessed; the timer or a later
                // drain picks it up once due
                self.items.lock().push_back(item);
                stats.deferred += 1;
                continue;
            }

            match self.attempt(item, processor).await {
                AttemptOutcome::Processed => stats.processed += 1,
                AttemptOutcome::Dropped => stats.failed += 1,
                AttemptOutcome::Requeued => stats.deferred += 1,
            }
        }

        stats
    }
}

/// Background timer loop - attempts one due item per tick
///
/// Exits when dispose signals shutdown.
async fn timer_loop(inner: Arc<QueueInner>, mut shutdown_rx: watch::Receiver<bool>) {
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        tokio::select! {
            _ = tokio::time::sleep(inner.config.poll_interval) => {}
            _ = shutdown_rx.changed() => {
                // Shutdown signaled - loop around to re-check the flag
                continue;
            }
        }

        inner.process_one_due().await;
    }
    tracing::debug!("offline queue timer stopped");
}

/// In-memory FIFO of deferred operations
///
/// Cheap to clone; clones share the same queue. One instance exists per
/// SDK client.
#[derive(Clone)]
pub struct OfflineQueue {
    inner: Arc<QueueInner>,
}

impl OfflineQueue {
    /// Create a queue that delivers through `processor`
    pub fn new(config: QueueConfig, processor: Arc<dyn QueueProcessor>) -> Self {
        let (shutdown, _) = watch::channel(false);
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            inner: Arc::new(QueueInner {
                config,
                processor,
                items: Mutex::new(VecDeque::new()),
                events: Mutex::new(Some(events)),
                draining: AtomicBool::new(false),
                timer_started: AtomicBool::new(false),
                disposed: AtomicBool::new(false),
                shutdown,
                processed_total: AtomicU64::new(0),
                failed_total: AtomicU64::new(0),
            }),
        }
    }

    /// Append an operation and lazily start the timer task
    ///
    /// Returns the item id, which the caller surfaces in its `Queued`
    /// error. After [`OfflineQueue::dispose`] the operation is discarded.
    pub fn enqueue(&self, operation: QueuedOperation) -> CorrelationId {
        let item = QueueItem::new(operation);
        let id = item.id;

        if self.inner.disposed.load(Ordering::SeqCst) {
            tracing::warn!(id = %id, "enqueue after dispose, operation discarded");
            return id;
        }

        tracing::debug!(
            id = %id,
            operation = %item.operation.kind(),
            "operation queued for later delivery"
        );
        self.inner.items.lock().push_back(item);
        self.start_timer_if_needed();
        id
    }

    /// Manually drain the queue once with the given processor
    ///
    /// Each item in the queue at the start of the pass is considered once;
    /// failures re-enqueue with the same exponential backoff the timer path
    /// applies. A drain already in progress makes this call return
    /// immediately with empty stats.
    pub async fn process_queue(&self, processor: &dyn QueueProcessor) -> DrainStats {
        if self
            .inner
            .draining
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("queue drain already in progress, skipping");
            return DrainStats::default();
        }

        let stats = self.inner.drain_once(processor).await;
        self.inner.draining.store(false, Ordering::Release);

        tracing::debug!(
            processed = stats.processed,
            failed = stats.failed,
            deferred = stats.deferred,
            "queue drain finished"
        );
        stats
    }

    /// Remove and return the head item without processing it
    pub fn dequeue(&self) -> Option<QueueItem> {
        self.inner.items.lock().pop_front()
    }

    /// Inspect the head item without removing it
    pub fn peek(&self) -> Option<QueueItem> {
        self.inner.items.lock().front().cloned()
    }

    /// Purge items enqueued more than `max_age` ago; returns the count
    pub fn remove_expired(&self, max_age: Duration) -> usize {
        let now = Instant::now();
        let mut items = self.inner.items.lock();
        let before = items.len();
        items.retain(|item| now.duration_since(item.created_at) <= max_age);
        let purged = before - items.len();
        if purged > 0 {
            tracing::info!(purged, "expired queue items removed");
        }
        purged
    }

    /// Subscribe to outcome events
    ///
    /// Every subscriber receives every subsequent event. Returns `None`
    /// once the queue is disposed.
    pub fn subscribe(&self) -> Option<broadcast::Receiver<QueueEvent>> {
        self.inner.events.lock().as_ref().map(|tx| tx.subscribe())
    }

    /// Number of items currently queued
    pub fn len(&self) -> usize {
        self.inner.items.lock().len()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.inner.items.lock().is_empty()
    }

    /// Items delivered over the queue's lifetime
    pub fn processed_count(&self) -> u64 {
        self.inner.processed_total.load(Ordering::Relaxed)
    }

    /// Items dropped after exhausting their attempts
    pub fn failed_count(&self) -> u64 {
        self.inner.failed_total.load(Ordering::Relaxed)
    }

    /// Stop the timer, close the event stream and clear the queue
    ///
    /// Idempotent; a second call is a no-op. In-flight processing attempts
    /// complete independently.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        let _ = self.inner.shutdown.send(true);
        let dropped = {
            let mut items = self.inner.items.lock();
            let n = items.len();
            items.clear();
            n
        };
        // Dropping the sender closes every subscriber's stream
        *self.inner.events.lock() = None;
        tracing::info!(dropped, "offline queue disposed");
    }

    fn start_timer_if_needed(&self) {
        if self
            .inner
            .timer_started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            let inner = Arc::clone(&self.inner);
            let shutdown_rx = self.inner.shutdown.subscribe();
            tokio::spawn(timer_loop(inner, shutdown_rx));
        }
    }
}
