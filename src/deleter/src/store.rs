//! The seam between the engine and the remote CRM.

use async_trait::async_trait;
use hubspot_sdk::objects::{
    FilterGroup, ObjectProperties, SearchObjectsRequest, Sort, SortDirection, next_after,
};
use hubspot_sdk::{HubSpotClient, HubSpotError};
use serde_json::{Map, Value};

use crate::model::{ListPage, RecordCategory, RecordRef, SearchPage, SearchRequest};

/// Record operations the enumerators and the deleter need.
///
/// Errors are the remote client's classified categories; callers decide per
/// operation whether a failure aborts, degrades or is swallowed.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// One page of the unfiltered listing
    async fn list_page(
        &self,
        category: &RecordCategory,
        limit: u32,
        after: Option<String>,
    ) -> Result<ListPage, HubSpotError>;

    /// One page of a filtered search, sorted by record id ascending
    async fn search(
        &self,
        category: &RecordCategory,
        request: SearchRequest,
    ) -> Result<SearchPage, HubSpotError>;

    /// Delete every id in one call; all-or-nothing from the caller's view
    async fn archive_batch(
        &self,
        category: &RecordCategory,
        ids: Vec<String>,
    ) -> Result<(), HubSpotError>;

    async fn delete_one(&self, category: &RecordCategory, id: &str) -> Result<(), HubSpotError>;

    async fn create_batch(
        &self,
        category: &RecordCategory,
        records: Vec<Map<String, Value>>,
    ) -> Result<Vec<RecordRef>, HubSpotError>;
}

#[async_trait]
impl RecordStore for HubSpotClient {
    async fn list_page(
        &self,
        category: &RecordCategory,
        limit: u32,
        after: Option<String>,
    ) -> Result<ListPage, HubSpotError> {
        let page = self
            .list_objects(category.as_str(), limit, after.as_deref())
            .await?;
        Ok(ListPage {
            next_cursor: next_after(&page.paging),
            records: page
                .results
                .into_iter()
                .map(|o| RecordRef::new(o.id))
                .collect(),
        })
    }

    async fn search(
        &self,
        category: &RecordCategory,
        request: SearchRequest,
    ) -> Result<SearchPage, HubSpotError> {
        let body = SearchObjectsRequest {
            filter_groups: vec![FilterGroup {
                filters: request.predicates,
            }],
            sorts: vec![Sort {
                property_name: SearchRequest::SORT_PROPERTY.to_string(),
                direction: SortDirection::Ascending,
            }],
            limit: request.page_size,
            after: request.after,
        };
        let resp = self.search_objects(category.as_str(), &body).await?;
        Ok(SearchPage {
            total: resp.total,
            next_cursor: next_after(&resp.paging),
            records: resp
                .results
                .into_iter()
                .map(|o| RecordRef::new(o.id))
                .collect(),
        })
    }

    async fn archive_batch(
        &self,
        category: &RecordCategory,
        ids: Vec<String>,
    ) -> Result<(), HubSpotError> {
        HubSpotClient::archive_batch(self, category.as_str(), &ids).await
    }

    async fn delete_one(&self, category: &RecordCategory, id: &str) -> Result<(), HubSpotError> {
        self.archive_object(category.as_str(), id).await
    }

    async fn create_batch(
        &self,
        category: &RecordCategory,
        records: Vec<Map<String, Value>>,
    ) -> Result<Vec<RecordRef>, HubSpotError> {
        let inputs = records
            .into_iter()
            .map(|properties| ObjectProperties { properties })
            .collect();
        let resp = HubSpotClient::create_batch(self, category.as_str(), inputs).await?;
        Ok(resp
            .results
            .into_iter()
            .map(|o| RecordRef::new(o.id))
            .collect())
    }
}
