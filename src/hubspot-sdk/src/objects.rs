//! CRM object endpoints (`/crm/v3/objects/{object_type}`) and their wire types.

use serde::{Deserialize, Serialize};

use crate::{HubSpotClient, HubSpotError};

/// Property every CRM object carries; its value is the numeric record id.
pub const OBJECT_ID_PROPERTY: &str = "hs_object_id";

/// Search filter operators understood by the CRM search endpoint
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FilterOperator {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    Between,
    In,
    NotIn,
    HasProperty,
    NotHasProperty,
    ContainsToken,
    NotContainsToken,
}

/// One search condition. Passed to the remote store verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Filter {
    pub property_name: String,
    pub operator: FilterOperator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high_value: Option<String>,
}

impl Filter {
    pub fn new(
        property_name: impl Into<String>,
        operator: FilterOperator,
        value: impl Into<String>,
    ) -> Self {
        Self {
            property_name: property_name.into(),
            operator,
            value: Some(value.into()),
            values: None,
            high_value: None,
        }
    }

    /// Matches records where the property has any value
    pub fn has_property(property_name: impl Into<String>) -> Self {
        Self {
            property_name: property_name.into(),
            operator: FilterOperator::HasProperty,
            value: None,
            values: None,
            high_value: None,
        }
    }
}

/// Filters inside one group are ANDed; groups are ORed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FilterGroup {
    pub filters: Vec<Filter>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Sort {
    pub property_name: String,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SearchObjectsRequest {
    pub filter_groups: Vec<FilterGroup>,
    pub sorts: Vec<Sort>,
    pub limit: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimpleObject {
    pub id: String,
    #[serde(default)]
    pub properties: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NextPage {
    pub after: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Paging {
    #[serde(default)]
    pub next: Option<NextPage>,
}

/// Response of `GET /crm/v3/objects/{object_type}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ObjectPage {
    #[serde(default)]
    pub results: Vec<SimpleObject>,
    #[serde(default)]
    pub paging: Option<Paging>,
}

/// Response of `POST /crm/v3/objects/{object_type}/search`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchObjectsResponse {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub results: Vec<SimpleObject>,
    #[serde(default)]
    pub paging: Option<Paging>,
}

/// Cursor for the following page, if any
pub fn next_after(paging: &Option<Paging>) -> Option<String> {
    paging
        .as_ref()
        .and_then(|p| p.next.as_ref())
        .map(|n| n.after.clone())
        .filter(|after| !after.is_empty())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ObjectId {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ObjectProperties {
    pub properties: serde_json::Map<String, serde_json::Value>,
}

/// Envelope used by every batch endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchInput<T> {
    pub inputs: Vec<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchResponse {
    #[serde(default)]
    pub results: Vec<SimpleObject>,
}

#[derive(Serialize)]
struct ListQuery<'a> {
    limit: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    after: Option<&'a str>,
}

impl HubSpotClient {
    // ── Object operations ──────────────────────────────────────────

    /// Fetch one page of objects, unfiltered
    pub async fn list_objects(
        &self,
        object_type: &str,
        limit: u32,
        after: Option<&str>,
    ) -> Result<ObjectPage, HubSpotError> {
        self.get(
            &format!("/crm/v3/objects/{object_type}"),
            &ListQuery { limit, after },
        )
        .await
    }

    /// Run one page of a filtered, sorted search
    pub async fn search_objects(
        &self,
        object_type: &str,
        request: &SearchObjectsRequest,
    ) -> Result<SearchObjectsResponse, HubSpotError> {
        self.post(&format!("/crm/v3/objects/{object_type}/search"), request)
            .await
    }

    /// Archive up to 100 objects in one call
    pub async fn archive_batch(&self, object_type: &str, ids: &[String]) -> Result<(), HubSpotError> {
        let body = BatchInput {
            inputs: ids.iter().map(|id| ObjectId { id: id.clone() }).collect(),
        };
        self.post_no_content(&format!("/crm/v3/objects/{object_type}/batch/archive"), &body)
            .await
    }

    /// Archive a single object
    pub async fn archive_object(&self, object_type: &str, id: &str) -> Result<(), HubSpotError> {
        self.delete(&["crm", "v3", "objects", object_type, id]).await
    }

    /// Create up to 100 objects in one call
    pub async fn create_batch(
        &self,
        object_type: &str,
        inputs: Vec<ObjectProperties>,
    ) -> Result<BatchResponse, HubSpotError> {
        self.post(
            &format!("/crm/v3/objects/{object_type}/batch/create"),
            &BatchInput { inputs },
        )
        .await
    }
}
