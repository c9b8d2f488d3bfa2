//! Dispatches a [`Criterion`] to an enumerator and the batch deleter.

use std::path::Path;
use std::sync::Arc;

use common::Configuration;
use common::config::ExternalListConfig;
use tokio_util::sync::CancellationToken;

use crate::batch::BatchDeleter;
use crate::criteria::{Criterion, DateRange};
use crate::discovery::{CategoryDiscovery, NoCustomCategories};
use crate::error::Result;
use crate::external_list::ExternalList;
use crate::list::FullListEnumerator;
use crate::model::{CategoryCatalog, DeletionSummary, Outcome, Predicate, RecordCategory, RecordRef};
use crate::pacing::Pacer;
use crate::search::{FilteredSearchEnumerator, SearchSettings};
use crate::store::RecordStore;

/// Keyword accepted in place of a category list meaning "every category"
pub const ALL_CATEGORIES: &str = "all";

/// One configured deletion context. Construct once and reuse for every
/// operation against the same portal.
pub struct Engine {
    catalog: CategoryCatalog,
    lister: FullListEnumerator,
    searcher: FilteredSearchEnumerator,
    deleter: BatchDeleter,
    discovery: Arc<dyn CategoryDiscovery>,
    external_list: ExternalListConfig,
}

impl Engine {
    pub fn new(
        config: &Configuration,
        store: Arc<dyn RecordStore>,
        pacer: Arc<dyn Pacer>,
        cancel: CancellationToken,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            catalog: CategoryCatalog::new(config.categories.builtin.iter().cloned()),
            lister: FullListEnumerator::new(
                store.clone(),
                config.listing.page_size,
                config.listing.failure_policy,
                cancel.clone(),
            ),
            searcher: FilteredSearchEnumerator::new(
                store.clone(),
                pacer,
                SearchSettings::from(config.search.clone()),
                cancel.clone(),
            ),
            deleter: BatchDeleter::new(
                store,
                config.deletion.batch_size,
                config.deletion.dry_run,
                cancel,
            ),
            discovery: Arc::new(NoCustomCategories),
            external_list: config.external_list.clone(),
        })
    }

    pub fn with_discovery(mut self, discovery: Arc<dyn CategoryDiscovery>) -> Self {
        self.discovery = discovery;
        self
    }

    pub fn catalog(&self) -> &CategoryCatalog {
        &self.catalog
    }

    pub fn is_dry_run(&self) -> bool {
        self.deleter.is_dry_run()
    }

    /// Execute one criterion and report per-category outcomes.
    pub async fn run(&self, criterion: Criterion) -> Result<DeletionSummary> {
        tracing::info!(
            criterion = criterion.kind(),
            dry_run = self.is_dry_run(),
            "Starting deletion"
        );

        let mut summary = DeletionSummary::default();

        match criterion {
            Criterion::All => {
                for category in self.all_categories().await? {
                    let records = self.lister.list_all(&category).await?;
                    self.delete_into(&mut summary, category, records).await?;
                }
            }
            Criterion::Categories(categories) => {
                for category in categories {
                    let records = self.lister.list_all(&category).await?;
                    self.delete_into(&mut summary, category, records).await?;
                }
            }
            Criterion::DateRange { range, categories } => {
                let categories = match categories {
                    Some(categories) => categories,
                    None => self.all_categories().await?,
                };
                let predicates = range.predicates();
                for category in categories {
                    let records = self.searcher.search(&category, &predicates).await?;
                    self.delete_into(&mut summary, category, records).await?;
                }
            }
            Criterion::Query {
                category,
                predicates,
            } => {
                let records = self.searcher.search(&category, &predicates).await?;
                self.delete_into(&mut summary, category, records).await?;
            }
            Criterion::PropertyPresence { category, property } => {
                let predicates = [Predicate::has_property(property)];
                let records = self.searcher.search(&category, &predicates).await?;
                self.delete_into(&mut summary, category, records).await?;
            }
            Criterion::ExternalList(list) => {
                for (category, records) in list.into_groups() {
                    self.delete_into(&mut summary, category, records).await?;
                }
            }
        }

        let total = summary.total();
        tracing::info!(
            categories = summary.len(),
            attempted = total.attempted,
            confirmed = total.confirmed_deleted,
            failed = total.failed,
            "Deletion finished"
        );
        Ok(summary)
    }

    /// Every record of every built-in and discovered category
    pub async fn delete_all(&self) -> Result<DeletionSummary> {
        self.run(Criterion::All).await
    }

    /// Every record of the named categories
    pub async fn delete_objects_by_type<S: AsRef<str>>(
        &self,
        categories: &[S],
    ) -> Result<DeletionSummary> {
        let categories = self.catalog.resolve_all(categories)?;
        self.run(Criterion::Categories(categories)).await
    }

    /// Records created and/or modified at or after the given timestamps.
    ///
    /// `categories` of `None`, or a list containing `all`, selects every
    /// category. Timestamps must carry an explicit UTC offset.
    pub async fn delete_by_date_range<S: AsRef<str>>(
        &self,
        created_after: Option<&str>,
        modified_after: Option<&str>,
        categories: Option<&[S]>,
    ) -> Result<DeletionSummary> {
        let range = DateRange::parse(created_after, modified_after)?;
        let categories = match categories {
            Some(names) if !names.iter().any(|n| n.as_ref().trim() == ALL_CATEGORIES) => {
                Some(self.catalog.resolve_all(names)?)
            }
            _ => None,
        };
        self.run(Criterion::DateRange { range, categories }).await
    }

    /// Records of `category` matching a JSON search query; returns the
    /// confirmed count
    pub async fn delete_by_query(&self, category: &str, query: &str) -> Result<usize> {
        let category = self.catalog.resolve(category)?;
        let criterion = Criterion::query(category, query)?;
        Ok(self.run(criterion).await?.total().confirmed_deleted)
    }

    /// Records of `category` where `property` has any value; returns the
    /// confirmed count
    pub async fn delete_by_property(&self, category: &str, property: &str) -> Result<usize> {
        let category = self.catalog.resolve(category)?;
        let criterion = Criterion::property_presence(category, property)?;
        Ok(self.run(criterion).await?.total().confirmed_deleted)
    }

    /// Records named in a CSV file. Rows without a category column value
    /// belong to `default_category`.
    pub async fn delete_from_external_list(
        &self,
        default_category: &str,
        path: &Path,
    ) -> Result<DeletionSummary> {
        let default_category = self.catalog.resolve(default_category)?;
        let list =
            ExternalList::from_path(path, &default_category, &self.external_list, &self.catalog)?;
        self.run(Criterion::ExternalList(list)).await
    }

    /// Same as [`Engine::delete_from_external_list`] with an explicit id column
    pub async fn delete_from_external_list_with_column(
        &self,
        default_category: &str,
        path: &Path,
        id_column: &str,
    ) -> Result<DeletionSummary> {
        let default_category = self.catalog.resolve(default_category)?;
        let columns = ExternalListConfig {
            id_column: id_column.to_string(),
            ..self.external_list.clone()
        };
        let list = ExternalList::from_path(path, &default_category, &columns, &self.catalog)?;
        self.run(Criterion::ExternalList(list)).await
    }

    async fn all_categories(&self) -> Result<Vec<RecordCategory>> {
        let mut categories = self.catalog.builtin().to_vec();
        for category in self.discovery.custom_categories().await? {
            if !categories.contains(&category) {
                categories.push(category);
            }
        }
        tracing::debug!(count = categories.len(), "Resolved categories");
        Ok(categories)
    }

    async fn delete_into(
        &self,
        summary: &mut DeletionSummary,
        category: RecordCategory,
        records: Vec<RecordRef>,
    ) -> Result<()> {
        let result = self.deleter.delete(&category, records).await?;
        summary.record(category, Outcome::from(&result));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DeleterError, UsageError};
    use crate::pacing::NoPacing;
    use crate::store::MockRecordStore;
    use crate::testing::{InMemoryRecordStore, StoreCall};
    use async_trait::async_trait;
    use std::io::Write;

    fn config() -> Configuration {
        let mut config = Configuration::default();
        config.categories.builtin = vec!["contacts".to_string(), "deals".to_string()];
        config
    }

    fn silent_store() -> MockRecordStore {
        let mut store = MockRecordStore::new();
        store.expect_list_page().never();
        store.expect_search().never();
        store.expect_archive_batch().never();
        store.expect_delete_one().never();
        store.expect_create_batch().never();
        store
    }

    fn engine(store: Arc<dyn RecordStore>, config: &Configuration) -> Engine {
        Engine::new(config, store, Arc::new(NoPacing), CancellationToken::new()).unwrap()
    }

    #[tokio::test]
    async fn test_naive_timestamp_rejected_before_any_call() {
        let engine = engine(Arc::new(silent_store()), &config());

        let err = engine
            .delete_by_date_range::<&str>(Some("2024-03-01T00:00:00"), None, None)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DeleterError::Usage(UsageError::MissingTimezone(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_category_rejected_before_any_call() {
        let engine = engine(Arc::new(silent_store()), &config());

        let err = engine
            .delete_by_property("widgets", "email")
            .await
            .unwrap_err();
        assert!(err.is_usage());

        let err = engine
            .delete_by_date_range(Some("2024-03-01T00:00:00+0000"), None, Some(&["widgets"][..]))
            .await
            .unwrap_err();
        assert!(err.is_usage());
    }

    #[tokio::test]
    async fn test_missing_id_column_rejected_before_any_call() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "id\n1\n2").unwrap();

        let engine = engine(Arc::new(silent_store()), &config());
        let err = engine
            .delete_from_external_list("contacts", file.path())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DeleterError::Usage(UsageError::MissingIdColumn(_))
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = config();
        config.search.leg_cap = 20_000;
        let result = Engine::new(
            &config,
            Arc::new(silent_store()),
            Arc::new(NoPacing),
            CancellationToken::new(),
        );
        assert!(matches!(result, Err(DeleterError::Config(_))));
    }

    #[tokio::test]
    async fn test_delete_all_covers_every_builtin_category() {
        let store = Arc::new(InMemoryRecordStore::new());
        store.insert_range(&RecordCategory::new("contacts"), 1..=150).await;
        store.insert_range(&RecordCategory::new("deals"), 1..=3).await;

        let engine = engine(store.clone(), &config());
        let summary = engine.delete_all().await.unwrap();

        let counts = summary.confirmed_counts();
        assert_eq!(counts["contacts"], 150);
        assert_eq!(counts["deals"], 3);
        assert_eq!(store.remaining(&RecordCategory::new("contacts")).await, 0);
    }

    struct FixedDiscovery;

    #[async_trait]
    impl CategoryDiscovery for FixedDiscovery {
        async fn custom_categories(&self) -> Result<Vec<RecordCategory>> {
            Ok(vec![RecordCategory::new("2-999")])
        }
    }

    #[tokio::test]
    async fn test_discovered_categories_included() {
        let store = Arc::new(InMemoryRecordStore::new());
        store.insert_range(&RecordCategory::new("2-999"), 1..=4).await;

        let engine = engine(store, &config()).with_discovery(Arc::new(FixedDiscovery));
        let summary = engine.delete_all().await.unwrap();

        assert_eq!(summary.len(), 3);
        assert_eq!(summary.confirmed_counts()["2-999"], 4);
    }

    #[tokio::test]
    async fn test_date_range_searches_with_gte_predicate() {
        let store = Arc::new(InMemoryRecordStore::new());
        let deals = RecordCategory::new("deals");
        for (id, created) in [(1u64, 1_000i64), (2, 1_709_269_200_000), (3, 1_800_000_000_000)] {
            let mut props = serde_json::Map::new();
            props.insert("createdate".into(), created.to_string().into());
            store.insert(&deals, id, props).await;
        }

        let engine = engine(store.clone(), &config());
        let summary = engine
            .delete_by_date_range(Some("2024-03-01T00:00:00-0500"), None, Some(&["deals"][..]))
            .await
            .unwrap();

        assert_eq!(summary.confirmed_counts()["deals"], 2);
        assert_eq!(store.remaining(&deals).await, 1);

        let first_search = store
            .calls()
            .await
            .into_iter()
            .find_map(|call| match call {
                StoreCall::Search { predicates, .. } => Some(predicates),
                _ => None,
            })
            .unwrap();
        assert_eq!(first_search[0].property_name, "createdate");
        assert_eq!(first_search[0].value.as_deref(), Some("1709269200000"));
    }

    #[tokio::test]
    async fn test_all_keyword_selects_every_category() {
        let store = Arc::new(InMemoryRecordStore::new());
        let engine = engine(store, &config());
        let summary = engine
            .delete_by_date_range(None, Some("2024-03-01T00:00:00Z"), Some(&["all"][..]))
            .await
            .unwrap();
        assert_eq!(summary.len(), 2);
    }

    #[tokio::test]
    async fn test_property_presence_returns_count() {
        let store = Arc::new(InMemoryRecordStore::new());
        let contacts = RecordCategory::new("contacts");
        for id in 1..=10u64 {
            let mut props = serde_json::Map::new();
            if id <= 4 {
                props.insert("email".into(), format!("{id}@example.com").into());
            }
            store.insert(&contacts, id, props).await;
        }

        let engine = engine(store.clone(), &config());
        assert_eq!(engine.delete_by_property("contacts", "email").await.unwrap(), 4);
        assert_eq!(store.remaining(&contacts).await, 6);
    }

    #[tokio::test]
    async fn test_query_returns_count() {
        let store = Arc::new(InMemoryRecordStore::new());
        store.insert_range(&RecordCategory::new("deals"), 1..=20).await;

        let engine = engine(store, &config());
        let count = engine
            .delete_by_query(
                "deals",
                r#"[{"propertyName": "hs_object_id", "operator": "LTE", "value": "5"}]"#,
            )
            .await
            .unwrap();
        assert_eq!(count, 5);
    }

    #[tokio::test]
    async fn test_external_list_grouped_by_category() {
        let store = Arc::new(InMemoryRecordStore::new());
        store.insert_range(&RecordCategory::new("contacts"), 1..=5).await;
        store.insert_range(&RecordCategory::new("deals"), 1..=5).await;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "hubspot_id,object_type\n1,\n2,deals\n3,deals\n,deals").unwrap();

        let engine = engine(store.clone(), &config());
        let summary = engine
            .delete_from_external_list("contacts", file.path())
            .await
            .unwrap();

        assert_eq!(summary.confirmed_counts()["contacts"], 1);
        assert_eq!(summary.confirmed_counts()["deals"], 2);
        assert_eq!(summary.total().confirmed_deleted, 3);
    }

    #[tokio::test]
    async fn test_dry_run_deletes_nothing() {
        let store = Arc::new(InMemoryRecordStore::new());
        store.insert_range(&RecordCategory::new("contacts"), 1..=7).await;
        let mut config = config();
        config.deletion.dry_run = true;

        let engine = engine(store.clone(), &config);
        let summary = engine.delete_objects_by_type(&["contacts"]).await.unwrap();

        let outcome = summary.get(&RecordCategory::new("contacts")).unwrap();
        assert_eq!(outcome.attempted, 7);
        assert_eq!(outcome.confirmed_deleted, 0);
        assert_eq!(store.remaining(&RecordCategory::new("contacts")).await, 7);
    }
}
