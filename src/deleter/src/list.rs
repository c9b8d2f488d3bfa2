use std::sync::Arc;

use common::FailurePolicy;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::model::{RecordCategory, RecordRef};
use crate::pacing::ensure_active;
use crate::store::RecordStore;

/// Walks the unfiltered listing endpoint until it stops returning a cursor.
pub struct FullListEnumerator {
    store: Arc<dyn RecordStore>,
    page_size: u32,
    failure_policy: FailurePolicy,
    cancel: CancellationToken,
}

impl FullListEnumerator {
    pub fn new(
        store: Arc<dyn RecordStore>,
        page_size: u32,
        failure_policy: FailurePolicy,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            store,
            page_size,
            failure_policy,
            cancel,
        }
    }

    /// Every record of `category`.
    ///
    /// With [`FailurePolicy::ReturnPartial`] a remote error ends the walk and
    /// the records gathered so far are returned; with [`FailurePolicy::Abort`]
    /// the error is propagated. Cancellation always propagates.
    pub async fn list_all(&self, category: &RecordCategory) -> Result<Vec<RecordRef>> {
        tracing::debug!(%category, "Fetching all records");

        let mut records = Vec::new();
        let mut after: Option<String> = None;

        loop {
            ensure_active(&self.cancel)?;

            tracing::debug!(%category, after = ?after, "Fetching listing page");
            let page = match self
                .store
                .list_page(category, self.page_size, after.take())
                .await
            {
                Ok(page) => page,
                Err(e) => match self.failure_policy {
                    FailurePolicy::ReturnPartial => {
                        tracing::error!(
                            %category,
                            error = %e,
                            collected = records.len(),
                            "Error fetching records, continuing with partial listing"
                        );
                        break;
                    }
                    FailurePolicy::Abort => {
                        tracing::error!(%category, error = %e, "Error fetching records");
                        return Err(e.into());
                    }
                },
            };

            records.extend(page.records);

            match page.next_cursor {
                Some(next) => {
                    tracing::debug!(%category, so_far = records.len(), "Retrieved listing page");
                    after = Some(next);
                }
                None => break,
            }
        }

        tracing::info!(%category, total = records.len(), "Retrieved all records");
        Ok(records)
    }
}
