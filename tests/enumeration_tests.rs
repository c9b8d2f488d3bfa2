use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use deleter::model::{OBJECT_ID_PROPERTY, Operator};
use deleter::testing::{InMemoryRecordStore, RecordingPacer, StoreCall};
use deleter::{FilteredSearchEnumerator, NoPacing, Predicate, RecordCategory, SearchSettings};
use tokio_util::sync::CancellationToken;

fn contacts() -> RecordCategory {
    RecordCategory::new("contacts")
}

fn searcher(store: Arc<InMemoryRecordStore>) -> FilteredSearchEnumerator {
    FilteredSearchEnumerator::new(
        store,
        Arc::new(NoPacing),
        SearchSettings::default(),
        CancellationToken::new(),
    )
}

/// Threshold values of every leg's first request, in order
async fn leg_thresholds(store: &InMemoryRecordStore) -> Vec<String> {
    store
        .calls()
        .await
        .into_iter()
        .filter_map(|call| match call {
            StoreCall::Search {
                predicates,
                after: None,
                ..
            } => predicates
                .iter()
                .find(|p| p.property_name == OBJECT_ID_PROPERTY && p.operator == Operator::Gt)
                .and_then(|p| p.value.clone()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_every_record_returned_once_across_cap_boundary() {
    for n in [0u64, 1, 9_999, 10_000, 10_001, 25_000] {
        let store = Arc::new(InMemoryRecordStore::new());
        if n > 0 {
            store.insert_range(&contacts(), 1..=n).await;
        }

        let records = searcher(store.clone())
            .search(&contacts(), &[])
            .await
            .unwrap_or_else(|e| panic!("search over {n} records failed: {e}"));

        let ids: Vec<u64> = records.iter().map(|r| r.numeric_id().unwrap()).collect();
        let unique: HashSet<u64> = ids.iter().copied().collect();
        assert_eq!(ids.len(), n as usize, "N = {n}");
        assert_eq!(unique.len(), n as usize, "duplicates for N = {n}");
        assert_eq!(ids, (1..=n).collect::<Vec<_>>(), "N = {n}");
    }
}

#[tokio::test]
async fn test_leg_seam_excludes_threshold_record() {
    let store = Arc::new(InMemoryRecordStore::new());
    store.insert_range(&contacts(), 1..=10_001).await;

    let records = searcher(store.clone())
        .search(&contacts(), &[])
        .await
        .unwrap();

    assert_eq!(records.len(), 10_001);
    assert_eq!(records[9_999].id, "10000");
    assert_eq!(records[10_000].id, "10001");
    assert_eq!(leg_thresholds(&store).await, vec!["0", "10000"]);

    // 50 pages of 200 in the first leg, one page in the second
    assert_eq!(store.search_calls().await, 51);
}

#[tokio::test]
async fn test_full_leg_followed_by_empty_leg() {
    let store = Arc::new(InMemoryRecordStore::new());
    store.insert_range(&contacts(), 1..=10_000).await;

    let records = searcher(store.clone())
        .search(&contacts(), &[])
        .await
        .unwrap();

    assert_eq!(records.len(), 10_000);
    assert_eq!(leg_thresholds(&store).await, vec!["0", "10000"]);
}

#[tokio::test]
async fn test_sparse_ids_resume_above_last_seen() {
    let store = Arc::new(InMemoryRecordStore::new());
    for id in (1..=15_000u64).map(|i| i * 7) {
        store.insert(&contacts(), id, Default::default()).await;
    }

    let records = searcher(store.clone())
        .search(&contacts(), &[])
        .await
        .unwrap();

    assert_eq!(records.len(), 15_000);
    assert_eq!(leg_thresholds(&store).await, vec!["0", "70000"]);
}

#[tokio::test]
async fn test_filtered_search_spans_legs() {
    let store = Arc::new(InMemoryRecordStore::new());
    for id in 1..=30_000u64 {
        let mut props = serde_json::Map::new();
        if id % 2 == 1 {
            props.insert("email".into(), format!("{id}@example.com").into());
        }
        store.insert(&contacts(), id, props).await;
    }

    let records = searcher(store.clone())
        .search(&contacts(), &[Predicate::has_property("email")])
        .await
        .unwrap();

    assert_eq!(records.len(), 15_000);
    assert!(records.iter().all(|r| r.numeric_id().unwrap() % 2 == 1));
    assert_eq!(leg_thresholds(&store).await, vec!["0", "19999"]);
}

#[tokio::test]
async fn test_pacing_pattern_for_three_legs() {
    let store = Arc::new(InMemoryRecordStore::new());
    store.insert_range(&contacts(), 1..=25_000).await;
    let pacer = Arc::new(RecordingPacer::default());

    let settings = SearchSettings::default();
    FilteredSearchEnumerator::new(store, pacer.clone(), settings, CancellationToken::new())
        .search(&contacts(), &[])
        .await
        .unwrap();

    let pauses = pacer.pauses().await;
    let cooldowns = pauses.iter().filter(|d| **d == settings.leg_cooldown).count();
    let page_delays = pauses.iter().filter(|d| **d == settings.page_delay).count();

    assert_eq!(cooldowns, 2);
    // 49 + 49 + 24 follow-up pages
    assert_eq!(page_delays, 122);
    assert_eq!(pacer.total().await, Duration::from_secs(2) + Duration::from_millis(12_200));
}
