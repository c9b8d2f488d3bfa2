//! Filtered search with keyset resumption.
//!
//! The search endpoint refuses to page deeper than a fixed number of
//! results per query. Every query here is sorted by record id ascending and
//! carries an `id > threshold` predicate; once a query chain ("leg") has
//! yielded `leg_cap` records, a fresh leg is started above the highest id
//! seen. Ids in leg k+1 are strictly greater than every id in leg k, so no
//! record is returned twice and the threshold rises with every leg.

use std::sync::Arc;
use std::time::Duration;

use common::FailurePolicy;
use common::config::SearchConfig;
use tokio_util::sync::CancellationToken;

use crate::error::{DeleterError, Result};
use crate::model::{Operator, Predicate, RecordCategory, RecordRef, SearchPage, SearchRequest};
use crate::pacing::{Pacer, ensure_active, pause};
use crate::store::RecordStore;

/// Tunables for [`FilteredSearchEnumerator`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchSettings {
    /// Records per request
    pub page_limit: u32,
    /// Records drained from one leg before resuming above the last id.
    /// Must not exceed the endpoint's pagination depth limit.
    pub leg_cap: usize,
    pub leg_cooldown: Duration,
    pub page_delay: Duration,
    pub failure_policy: FailurePolicy,
}

impl Default for SearchSettings {
    fn default() -> Self {
        SearchConfig::default().into()
    }
}

impl From<SearchConfig> for SearchSettings {
    fn from(config: SearchConfig) -> Self {
        Self {
            page_limit: config.page_limit,
            leg_cap: config.leg_cap,
            leg_cooldown: config.leg_cooldown,
            page_delay: config.page_delay,
            failure_policy: config.failure_policy,
        }
    }
}

/// Where one drained leg ended
struct LegProgress {
    drained: usize,
    max_id: Option<u64>,
}

pub struct FilteredSearchEnumerator {
    store: Arc<dyn RecordStore>,
    pacer: Arc<dyn Pacer>,
    settings: SearchSettings,
    cancel: CancellationToken,
}

impl FilteredSearchEnumerator {
    pub fn new(
        store: Arc<dyn RecordStore>,
        pacer: Arc<dyn Pacer>,
        settings: SearchSettings,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            store,
            pacer,
            settings,
            cancel,
        }
    }

    pub fn settings(&self) -> &SearchSettings {
        &self.settings
    }

    /// Every record of `category` matching all `predicates`, each exactly once,
    /// in ascending id order.
    ///
    /// A remote error aborts the whole search unless the failure policy is
    /// [`FailurePolicy::ReturnPartial`]. A leg that reports matches but makes
    /// no progress is always an error.
    pub async fn search(
        &self,
        category: &RecordCategory,
        predicates: &[Predicate],
    ) -> Result<Vec<RecordRef>> {
        tracing::debug!(%category, filters = ?predicates, "Searching for records");

        let mut records = Vec::new();
        match self.walk(category, predicates, &mut records).await {
            Ok(()) => {}
            Err(DeleterError::Remote(e))
                if self.settings.failure_policy == FailurePolicy::ReturnPartial =>
            {
                tracing::error!(
                    %category,
                    error = %e,
                    collected = records.len(),
                    "Error searching records, continuing with partial result"
                );
            }
            Err(e) => {
                tracing::error!(%category, error = %e, "Error searching records");
                return Err(e);
            }
        }

        tracing::info!(%category, total = records.len(), "Found all matching records");
        Ok(records)
    }

    async fn walk(
        &self,
        category: &RecordCategory,
        predicates: &[Predicate],
        out: &mut Vec<RecordRef>,
    ) -> Result<()> {
        let mut threshold: u64 = 0;
        let mut leg: usize = 0;

        loop {
            if leg > 0 {
                tracing::debug!(%category, threshold, "Cooling down before next search leg");
                pause(self.pacer.as_ref(), self.settings.leg_cooldown, &self.cancel).await?;
            }
            leg += 1;

            let leg_predicates = with_threshold(predicates, threshold);
            let first = self.request(category, &leg_predicates, None).await?;
            let total = first.total;

            if total == 0 {
                tracing::debug!(%category, leg, threshold, "No records above threshold");
                break;
            }

            tracing::info!(%category, leg, threshold, total, "Starting search leg");

            let progress = self
                .drain_leg(category, &leg_predicates, first, out)
                .await?;

            let next_threshold = match progress.max_id {
                Some(max_id) if progress.drained > 0 && max_id > threshold => max_id,
                _ => {
                    return Err(DeleterError::InconsistentLeg {
                        category: category.to_string(),
                        threshold,
                        total,
                    });
                }
            };
            threshold = next_threshold;

            if total < self.settings.leg_cap as u64 {
                break;
            }

            tracing::info!(
                %category,
                leg,
                drained = progress.drained,
                next_threshold = threshold,
                "Leg reached the depth cap, resuming above last id"
            );
        }

        Ok(())
    }

    /// Follow one leg's cursors until they run out or `leg_cap` records
    /// have been taken. Never requests a page beyond the cap.
    async fn drain_leg(
        &self,
        category: &RecordCategory,
        predicates: &[Predicate],
        first: SearchPage,
        out: &mut Vec<RecordRef>,
    ) -> Result<LegProgress> {
        let cap = self.settings.leg_cap;
        let mut progress = LegProgress {
            drained: 0,
            max_id: None,
        };
        let mut page = first;

        loop {
            if let (Some(first), Some(last)) = (page.records.first(), page.records.last()) {
                tracing::debug!(
                    %category,
                    first_id = %first.id,
                    last_id = %last.id,
                    "Search page"
                );
            }

            for record in page.records {
                if progress.drained >= cap {
                    break;
                }
                let id = record.numeric_id()?;
                progress.max_id = Some(progress.max_id.map_or(id, |m| m.max(id)));
                progress.drained += 1;
                out.push(record);
            }

            if progress.drained >= cap {
                tracing::info!(
                    %category,
                    cap,
                    "Reached leg cap, stopping pagination regardless of cursor"
                );
                break;
            }

            let Some(after) = page.next_cursor else {
                break;
            };

            pause(self.pacer.as_ref(), self.settings.page_delay, &self.cancel).await?;
            page = self.request(category, predicates, Some(after)).await?;
            tracing::debug!(%category, drained = progress.drained, total = page.total, "Leg progress");
        }

        Ok(progress)
    }

    async fn request(
        &self,
        category: &RecordCategory,
        predicates: &[Predicate],
        after: Option<String>,
    ) -> Result<SearchPage> {
        ensure_active(&self.cancel)?;
        let request = SearchRequest {
            predicates: predicates.to_vec(),
            page_size: self.settings.page_limit,
            after,
        };
        Ok(self.store.search(category, request).await?)
    }
}

/// Caller predicates plus `id > threshold`
fn with_threshold(predicates: &[Predicate], threshold: u64) -> Vec<Predicate> {
    let mut leg = predicates.to_vec();
    leg.push(Predicate::new(
        SearchRequest::SORT_PROPERTY,
        Operator::Gt,
        threshold.to_string(),
    ));
    leg
}
