//! Bounded-concurrency batch dispatch
//!
//! Fans a list of independent operations out in consecutive chunks. Within
//! a chunk every item runs concurrently; a chunk must fully settle before
//! the next one starts. Failures are local to their index and never cancel
//! siblings.

use futures::future::join_all;
use malipo_core::SdkError;
use std::collections::HashMap;
use std::future::Future;

/// Lower bound on the concurrency clamp
pub const MIN_CONCURRENCY: usize = 1;
/// Upper bound on the concurrency clamp
pub const MAX_CONCURRENCY: usize = 10;

/// Per-index outcome of a batch run
///
/// Invariant: every input index appears in exactly one of the two maps, so
/// `successful.len() + failed.len()` equals the input length.
#[derive(Debug, Default)]
pub struct BatchResult<T> {
    /// Successful outcomes keyed by original input index
    pub successful: HashMap<usize, T>,
    /// Failures keyed by original input index
    pub failed: HashMap<usize, SdkError>,
}

impl<T> BatchResult<T> {
    /// Total number of settled items
    pub fn total(&self) -> usize {
        self.successful.len() + self.failed.len()
    }

    /// Whether every item succeeded
    pub fn is_all_successful(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Run `per_item` over `items` with bounded concurrency
///
/// `concurrency` is clamped to `[1, 10]`. The dispatcher adds no retry of
/// its own; compose retry inside `per_item` where wanted.
pub async fn run_batch<I, T, F, Fut>(
    items: Vec<I>,
    concurrency: usize,
    per_item: F,
) -> BatchResult<T>
where
    F: Fn(I) -> Fut,
    Fut: Future<Output = Result<T, SdkError>>,
{
    let concurrency = concurrency.clamp(MIN_CONCURRENCY, MAX_CONCURRENCY);
    let total = items.len();

    let mut result = BatchResult {
        successful: HashMap::new(),
        failed: HashMap::new(),
    };

    let mut items = items.into_iter().enumerate();
    loop {
        let chunk: Vec<(usize, I)> = items.by_ref().take(concurrency).collect();
        if chunk.is_empty() {
            break;
        }

        tracing::debug!(
            chunk_size = chunk.len(),
            done = result.total(),
            total,
            "dispatching batch chunk"
        );

        // Full barrier: the whole chunk settles before the next one starts
        let outcomes = join_all(chunk.into_iter().map(|(index, item)| {
            let fut = per_item(item);
            async move { (index, fut.await) }
        }))
        .await;

        for (index, outcome) in outcomes {
            match outcome {
                Ok(value) => {
                    result.successful.insert(index, value);
                }
                Err(err) => {
                    tracing::warn!(index, error = %err, "batch item failed");
                    result.failed.insert(index, err);
                }
            }
        }
    }

    result
}
