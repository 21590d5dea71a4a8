//! Batched writes against a vector index.

use recall_core::Namespace;
use std::time::Duration;
use tracing::debug;

use crate::error::VectorResult;
use crate::index::VectorIndex;
use crate::types::IndexRecord;

/// Upsert batching limits
#[derive(Debug, Clone)]
pub struct UpsertBatching {
    /// Maximum records per upsert call
    pub batch_size: usize,
    /// Pause between consecutive upsert calls
    pub batch_delay: Duration,
}

impl Default for UpsertBatching {
    fn default() -> Self {
        Self {
            batch_size: 100,
            batch_delay: Duration::from_millis(500),
        }
    }
}

impl UpsertBatching {
    pub fn new(batch_size: usize, batch_delay: Duration) -> Self {
        Self {
            batch_size: batch_size.max(1),
            batch_delay,
        }
    }
}

/// Upsert `records` in bounded batches, pausing between batches. Stops at the
/// first failing batch; earlier batches stay written (upserts are idempotent,
/// so a redelivered job converges).
pub async fn upsert_batched(
    index: &dyn VectorIndex,
    namespace: Namespace,
    records: Vec<IndexRecord>,
    batching: &UpsertBatching,
) -> VectorResult<usize> {
    let batch_size = batching.batch_size.max(1);
    let total_batches = records.len().div_ceil(batch_size);
    let mut written = 0;
    let mut records = records.into_iter().peekable();
    let mut batch_no = 0;

    while records.peek().is_some() {
        if batch_no > 0 && !batching.batch_delay.is_zero() {
            tokio::time::sleep(batching.batch_delay).await;
        }
        let batch: Vec<IndexRecord> = records.by_ref().take(batch_size).collect();
        batch_no += 1;
        debug!(
            namespace = %namespace,
            batch = batch_no,
            total_batches,
            size = batch.len(),
            "Upserting batch"
        );
        written += index.upsert(namespace, batch).await?;
    }

    Ok(written)
}
