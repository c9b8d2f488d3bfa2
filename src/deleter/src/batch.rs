use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::{DeleterError, Result};
use crate::model::{Outcome, RecordCategory, RecordRef};
use crate::pacing::ensure_active;
use crate::store::RecordStore;

/// A record that could not be deleted, with the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedDeletion {
    pub id: String,
    pub error: String,
}

/// Result of deleting one category's records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletionResult {
    /// Records handed to the deleter
    pub attempted: usize,
    /// Records the remote store acknowledged as deleted
    pub confirmed: usize,
    pub failed: Vec<FailedDeletion>,
}

impl From<&DeletionResult> for Outcome {
    fn from(result: &DeletionResult) -> Self {
        Outcome {
            attempted: result.attempted,
            confirmed_deleted: result.confirmed,
            failed: result.failed.len(),
        }
    }
}

/// Deletes records in fixed-size batches, falling back to one call per
/// record for any batch the store rejects.
pub struct BatchDeleter {
    store: Arc<dyn RecordStore>,
    batch_size: usize,
    dry_run: bool,
    cancel: CancellationToken,
}

impl BatchDeleter {
    pub fn new(
        store: Arc<dyn RecordStore>,
        batch_size: usize,
        dry_run: bool,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
            dry_run,
            cancel,
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Delete `records` of `category`.
    ///
    /// Individual failures are counted, never raised. Cancellation is checked
    /// before every call, including the per-record fallback; a call already
    /// sent is always accounted for.
    pub async fn delete(
        &self,
        category: &RecordCategory,
        records: Vec<RecordRef>,
    ) -> Result<DeletionResult> {
        if records.is_empty() {
            tracing::info!(%category, "No records to delete");
            return Ok(DeletionResult::default());
        }

        if self.dry_run {
            tracing::info!(
                %category,
                count = records.len(),
                "Dry run: would delete records"
            );
            return Ok(DeletionResult {
                attempted: records.len(),
                confirmed: 0,
                failed: Vec::new(),
            });
        }

        let batches = records.len().div_ceil(self.batch_size);
        tracing::info!(
            %category,
            count = records.len(),
            batch_size = self.batch_size,
            batches,
            "Deleting records"
        );

        let mut result = DeletionResult::default();

        for (batch_idx, chunk) in records.chunks(self.batch_size).enumerate() {
            if self.cancel.is_cancelled() {
                tracing::warn!(
                    %category,
                    confirmed = result.confirmed,
                    remaining = records.len() - result.attempted,
                    "Deletion cancelled"
                );
                return Err(DeleterError::Cancelled);
            }

            let ids: Vec<String> = chunk.iter().map(|r| r.id.clone()).collect();
            result.attempted += ids.len();

            match self.store.archive_batch(category, ids).await {
                Ok(()) => {
                    result.confirmed += chunk.len();
                    tracing::debug!(
                        %category,
                        batch = batch_idx + 1,
                        of = batches,
                        size = chunk.len(),
                        "Deleted batch"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        %category,
                        batch = batch_idx + 1,
                        error = %e,
                        "Batch delete failed, deleting records individually"
                    );
                    if let Err(e) = self.delete_individually(category, chunk, &mut result).await {
                        tracing::warn!(
                            %category,
                            confirmed = result.confirmed,
                            failed = result.failed.len(),
                            "Deletion cancelled during per-record fallback"
                        );
                        return Err(e);
                    }
                }
            }
        }

        tracing::info!(
            %category,
            attempted = result.attempted,
            confirmed = result.confirmed,
            failed = result.failed.len(),
            "Deletion completed"
        );

        Ok(result)
    }

    async fn delete_individually(
        &self,
        category: &RecordCategory,
        chunk: &[RecordRef],
        result: &mut DeletionResult,
    ) -> Result<()> {
        for record in chunk {
            ensure_active(&self.cancel)?;
            match self.store.delete_one(category, &record.id).await {
                Ok(()) => result.confirmed += 1,
                Err(e) => {
                    tracing::error!(
                        %category,
                        id = %record.id,
                        error = %e,
                        "Failed to delete record"
                    );
                    result.failed.push(FailedDeletion {
                        id: record.id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}
