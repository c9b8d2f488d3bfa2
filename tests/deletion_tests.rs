use std::io::Write;
use std::sync::Arc;

use common::Configuration;
use deleter::testing::{InMemoryRecordStore, StoreCall};
use deleter::{
    BatchDeleter, DeleterError, Engine, NoPacing, RecordCategory, RecordRef, UsageError,
};
use tokio_util::sync::CancellationToken;

fn deals() -> RecordCategory {
    RecordCategory::new("deals")
}

fn engine(store: Arc<InMemoryRecordStore>) -> Engine {
    Engine::new(
        &Configuration::default(),
        store,
        Arc::new(NoPacing),
        CancellationToken::new(),
    )
    .unwrap()
}

#[tokio::test]
async fn test_batch_fallback_accounting() {
    let store = Arc::new(InMemoryRecordStore::new());
    store.insert_range(&deals(), 1..=250).await;
    store.fail_archive_call(2).await;
    store
        .fail_delete_of((101..=120).map(|id| id.to_string()))
        .await;

    let records: Vec<RecordRef> = (1..=250).map(|id| RecordRef::new(id.to_string())).collect();
    let deleter = BatchDeleter::new(store.clone(), 100, false, CancellationToken::new());
    let result = deleter.delete(&deals(), records).await.unwrap();

    assert_eq!(result.confirmed, 100 + 80 + 50);
    assert_eq!(result.attempted, 250);
    assert_eq!(result.failed.len(), 20);

    let calls = store.calls().await;
    let archive_sizes: Vec<usize> = calls
        .iter()
        .filter_map(|call| match call {
            StoreCall::ArchiveBatch { ids, .. } => Some(ids.len()),
            _ => None,
        })
        .collect();
    assert_eq!(archive_sizes, vec![100, 100, 50]);
    assert_eq!(store.delete_calls().await, 100);

    // chunk 2's individual deletes sit between the 2nd and 3rd archive calls
    let second = calls
        .iter()
        .position(|c| matches!(c, StoreCall::ArchiveBatch { ids, .. } if ids[0] == "101"))
        .unwrap();
    assert!(
        calls[second + 1..second + 101]
            .iter()
            .all(|c| matches!(c, StoreCall::DeleteOne { .. }))
    );

    assert_eq!(store.ids(&deals()).await, (101..=120).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_csv_with_empty_id_queues_three_records() {
    let store = Arc::new(InMemoryRecordStore::new());
    store.insert_range(&RecordCategory::new("contacts"), 1..=10).await;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "hubspot_id,email").unwrap();
    writeln!(file, "1,a@example.com").unwrap();
    writeln!(file, ",b@example.com").unwrap();
    writeln!(file, "2,c@example.com").unwrap();
    writeln!(file, "3,d@example.com").unwrap();

    let summary = engine(store.clone())
        .delete_from_external_list("contacts", file.path())
        .await
        .unwrap();

    let outcome = summary.get(&RecordCategory::new("contacts")).unwrap();
    assert_eq!(outcome.attempted, 3);
    assert_eq!(outcome.confirmed_deleted, 3);
    assert_eq!(store.remaining(&RecordCategory::new("contacts")).await, 7);
}

#[tokio::test]
async fn test_csv_duplicate_id_deleted_once() {
    let store = Arc::new(InMemoryRecordStore::new());
    store.insert_range(&RecordCategory::new("contacts"), 5..=5).await;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "hubspot_id").unwrap();
    writeln!(file, "5").unwrap();
    writeln!(file, "5").unwrap();

    let summary = engine(store.clone())
        .delete_from_external_list("contacts", file.path())
        .await
        .unwrap();

    let outcome = summary.get(&RecordCategory::new("contacts")).unwrap();
    assert_eq!(outcome.attempted, 1);
    assert_eq!(outcome.confirmed_deleted, 1);
    assert_eq!(
        store.calls().await,
        vec![StoreCall::ArchiveBatch {
            category: RecordCategory::new("contacts"),
            ids: vec!["5".to_string()],
        }]
    );
}

#[tokio::test]
async fn test_csv_path_like_id_never_reaches_store() {
    let store = Arc::new(InMemoryRecordStore::new());
    store.insert_range(&RecordCategory::new("contacts"), 1..=10).await;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "hubspot_id").unwrap();
    writeln!(file, "5").unwrap();
    writeln!(file, "../../../account-info/v3/details").unwrap();

    let err = engine(store.clone())
        .delete_from_external_list("contacts", file.path())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        DeleterError::Usage(UsageError::InvalidRecordId { .. })
    ));
    assert!(store.calls().await.is_empty());
}

#[tokio::test]
async fn test_naive_date_never_reaches_store() {
    let store = Arc::new(InMemoryRecordStore::new());
    store.insert_range(&deals(), 1..=10).await;

    let err = engine(store.clone())
        .delete_by_date_range(Some("2024-03-01T00:00:00"), None, Some(&["deals"][..]))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        DeleterError::Usage(UsageError::MissingTimezone(_))
    ));
    assert!(store.calls().await.is_empty());
}

#[tokio::test]
async fn test_property_presence_past_depth_limit() {
    let store = Arc::new(InMemoryRecordStore::new());
    for id in 1..=10_250u64 {
        let mut props = serde_json::Map::new();
        props.insert("email".into(), format!("{id}@example.com").into());
        store.insert(&deals(), id, props).await;
    }

    let count = engine(store.clone())
        .delete_by_property("deals", "email")
        .await
        .unwrap();

    assert_eq!(count, 10_250);
    assert_eq!(store.remaining(&deals()).await, 0);
    assert_eq!(store.archive_calls().await, 103);
}

#[tokio::test]
async fn test_listing_failure_returns_partial_by_default() {
    let store = Arc::new(InMemoryRecordStore::new());
    store.insert_range(&deals(), 1..=250).await;
    store.fail_list_call(2).await;

    let summary = engine(store.clone())
        .delete_objects_by_type(&["deals"])
        .await
        .unwrap();

    assert_eq!(summary.confirmed_counts()["deals"], 100);
    assert_eq!(store.remaining(&deals()).await, 150);
}

#[tokio::test]
async fn test_search_failure_aborts_by_default() {
    let store = Arc::new(InMemoryRecordStore::new());
    store.insert_range(&deals(), 1..=500).await;
    store.fail_search_call(2).await;

    let err = engine(store.clone())
        .delete_by_query(
            "deals",
            r#"{"filters": [{"propertyName": "hs_object_id", "operator": "GTE", "value": "1"}]}"#,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, DeleterError::Remote(_)));
    assert_eq!(store.archive_calls().await, 0);
    assert_eq!(store.remaining(&deals()).await, 500);
}

#[tokio::test]
async fn test_cancelled_engine_stops() {
    let store = Arc::new(InMemoryRecordStore::new());
    store.insert_range(&deals(), 1..=10).await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let engine = Engine::new(
        &Configuration::default(),
        store.clone(),
        Arc::new(NoPacing),
        cancel,
    )
    .unwrap();

    assert!(matches!(
        engine.delete_all().await,
        Err(DeleterError::Cancelled)
    ));
    assert_eq!(store.remaining(&deals()).await, 10);
}
