use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::ops::RangeInclusive;

use async_trait::async_trait;
use common::config::{SEARCH_DEPTH_LIMIT, SEARCH_PAGE_MAX};
use hubspot_sdk::HubSpotError;
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use crate::model::{
    ListPage, OBJECT_ID_PROPERTY, Operator, Predicate, RecordCategory, RecordRef, SearchPage,
    SearchRequest,
};
use crate::store::RecordStore;

/// A call observed by [`InMemoryRecordStore`]
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    List {
        category: RecordCategory,
        after: Option<String>,
    },
    Search {
        category: RecordCategory,
        predicates: Vec<Predicate>,
        after: Option<String>,
    },
    ArchiveBatch {
        category: RecordCategory,
        ids: Vec<String>,
    },
    DeleteOne {
        category: RecordCategory,
        id: String,
    },
    CreateBatch {
        category: RecordCategory,
        count: usize,
    },
}

#[derive(Debug, Default)]
struct State {
    records: BTreeMap<RecordCategory, BTreeMap<u64, Map<String, Value>>>,
    calls: Vec<StoreCall>,
    failing_lists: HashSet<usize>,
    failing_searches: HashSet<usize>,
    failing_archives: HashSet<usize>,
    failing_ids: HashSet<String>,
}

impl State {
    fn count(&self, pred: impl Fn(&StoreCall) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }
}

/// A synthetic CRM portal.
///
/// Search paging behaves like the remote endpoint: results are sorted by
/// id, `total` counts every match, cursors are result offsets and requesting
/// an offset at or beyond the depth limit is a client error. Listing cursors
/// are the last id returned. Failures can be injected by call number
/// (1-based, per call kind) or by record id.
#[derive(Debug)]
pub struct InMemoryRecordStore {
    depth_limit: usize,
    state: Mutex<State>,
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self {
            depth_limit: SEARCH_DEPTH_LIMIT,
            state: Mutex::new(State::default()),
        }
    }

    pub fn with_depth_limit(mut self, depth_limit: usize) -> Self {
        self.depth_limit = depth_limit;
        self
    }

    pub async fn insert(&self, category: &RecordCategory, id: u64, properties: Map<String, Value>) {
        self.state
            .lock()
            .await
            .records
            .entry(category.clone())
            .or_default()
            .insert(id, properties);
    }

    pub async fn insert_range(&self, category: &RecordCategory, ids: RangeInclusive<u64>) {
        let mut state = self.state.lock().await;
        let records = state.records.entry(category.clone()).or_default();
        for id in ids {
            records.insert(id, Map::new());
        }
    }

    pub async fn fail_list_call(&self, n: usize) {
        self.state.lock().await.failing_lists.insert(n);
    }

    pub async fn fail_search_call(&self, n: usize) {
        self.state.lock().await.failing_searches.insert(n);
    }

    pub async fn fail_archive_call(&self, n: usize) {
        self.state.lock().await.failing_archives.insert(n);
    }

    /// Individual deletes of these ids fail
    pub async fn fail_delete_of<I, S>(&self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut state = self.state.lock().await;
        state.failing_ids.extend(ids.into_iter().map(Into::into));
    }

    pub async fn calls(&self) -> Vec<StoreCall> {
        self.state.lock().await.calls.clone()
    }

    pub async fn list_calls(&self) -> usize {
        let state = self.state.lock().await;
        state.count(|c| matches!(c, StoreCall::List { .. }))
    }

    pub async fn search_calls(&self) -> usize {
        let state = self.state.lock().await;
        state.count(|c| matches!(c, StoreCall::Search { .. }))
    }

    pub async fn archive_calls(&self) -> usize {
        let state = self.state.lock().await;
        state.count(|c| matches!(c, StoreCall::ArchiveBatch { .. }))
    }

    pub async fn delete_calls(&self) -> usize {
        let state = self.state.lock().await;
        state.count(|c| matches!(c, StoreCall::DeleteOne { .. }))
    }

    pub async fn create_calls(&self) -> usize {
        let state = self.state.lock().await;
        state.count(|c| matches!(c, StoreCall::CreateBatch { .. }))
    }

    /// Records of `category` still present
    pub async fn remaining(&self, category: &RecordCategory) -> usize {
        self.state
            .lock()
            .await
            .records
            .get(category)
            .map_or(0, BTreeMap::len)
    }

    pub async fn ids(&self, category: &RecordCategory) -> Vec<u64> {
        self.state
            .lock()
            .await
            .records
            .get(category)
            .map(|r| r.keys().copied().collect())
            .unwrap_or_default()
    }
}

fn injected(status: u16) -> HubSpotError {
    HubSpotError::Server {
        status,
        message: "injected failure".to_string(),
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn list_page(
        &self,
        category: &RecordCategory,
        limit: u32,
        after: Option<String>,
    ) -> Result<ListPage, HubSpotError> {
        let mut state = self.state.lock().await;
        state.calls.push(StoreCall::List {
            category: category.clone(),
            after: after.clone(),
        });
        let n = state.count(|c| matches!(c, StoreCall::List { .. }));
        if state.failing_lists.contains(&n) {
            return Err(injected(503));
        }

        let start = match after {
            Some(cursor) => cursor.parse::<u64>().map_err(|_| HubSpotError::Client {
                status: 400,
                message: format!("invalid cursor '{cursor}'"),
            })?,
            None => 0,
        };

        let Some(records) = state.records.get(category) else {
            return Ok(ListPage::default());
        };
        let mut ids = records
            .range(start.saturating_add(1)..)
            .map(|(id, _)| *id)
            .take(limit as usize + 1)
            .collect::<Vec<_>>();
        let has_more = ids.len() > limit as usize;
        ids.truncate(limit as usize);

        Ok(ListPage {
            next_cursor: if has_more {
                ids.last().map(u64::to_string)
            } else {
                None
            },
            records: ids.iter().map(|id| RecordRef::new(id.to_string())).collect(),
        })
    }

    async fn search(
        &self,
        category: &RecordCategory,
        request: SearchRequest,
    ) -> Result<SearchPage, HubSpotError> {
        let mut state = self.state.lock().await;
        state.calls.push(StoreCall::Search {
            category: category.clone(),
            predicates: request.predicates.clone(),
            after: request.after.clone(),
        });
        let n = state.count(|c| matches!(c, StoreCall::Search { .. }));
        if state.failing_searches.contains(&n) {
            return Err(injected(500));
        }

        if request.page_size == 0 || request.page_size > SEARCH_PAGE_MAX {
            return Err(HubSpotError::Client {
                status: 400,
                message: format!("limit must be between 1 and {SEARCH_PAGE_MAX}"),
            });
        }

        let offset = match &request.after {
            Some(cursor) => cursor.parse::<usize>().map_err(|_| HubSpotError::Client {
                status: 400,
                message: format!("invalid cursor '{cursor}'"),
            })?,
            None => 0,
        };
        if offset >= self.depth_limit {
            return Err(HubSpotError::Client {
                status: 400,
                message: format!("cannot page beyond {} results", self.depth_limit),
            });
        }

        let matched: Vec<u64> = state
            .records
            .get(category)
            .map(|records| {
                records
                    .iter()
                    .filter(|(id, props)| {
                        request.predicates.iter().all(|p| matches(p, **id, props))
                    })
                    .map(|(id, _)| *id)
                    .collect()
            })
            .unwrap_or_default();

        let end = (offset + request.page_size as usize).min(matched.len());
        let page = matched.get(offset..end).unwrap_or_default();

        Ok(SearchPage {
            records: page.iter().map(|id| RecordRef::new(id.to_string())).collect(),
            total: matched.len() as u64,
            next_cursor: (end < matched.len()).then(|| end.to_string()),
        })
    }

    async fn archive_batch(
        &self,
        category: &RecordCategory,
        ids: Vec<String>,
    ) -> Result<(), HubSpotError> {
        let mut state = self.state.lock().await;
        state.calls.push(StoreCall::ArchiveBatch {
            category: category.clone(),
            ids: ids.clone(),
        });
        let n = state.count(|c| matches!(c, StoreCall::ArchiveBatch { .. }));
        if state.failing_archives.contains(&n) {
            return Err(injected(500));
        }

        if let Some(records) = state.records.get_mut(category) {
            for id in ids.iter().filter_map(|id| id.parse::<u64>().ok()) {
                records.remove(&id);
            }
        }
        Ok(())
    }

    async fn delete_one(&self, category: &RecordCategory, id: &str) -> Result<(), HubSpotError> {
        let mut state = self.state.lock().await;
        state.calls.push(StoreCall::DeleteOne {
            category: category.clone(),
            id: id.to_string(),
        });
        if state.failing_ids.contains(id) {
            return Err(injected(500));
        }

        if let (Some(records), Ok(id)) = (state.records.get_mut(category), id.parse::<u64>()) {
            records.remove(&id);
        }
        Ok(())
    }

    async fn create_batch(
        &self,
        category: &RecordCategory,
        records: Vec<Map<String, Value>>,
    ) -> Result<Vec<RecordRef>, HubSpotError> {
        let mut state = self.state.lock().await;
        state.calls.push(StoreCall::CreateBatch {
            category: category.clone(),
            count: records.len(),
        });

        let existing = state.records.entry(category.clone()).or_default();
        let mut next = existing.keys().next_back().copied().unwrap_or(0) + 1;
        let mut created = Vec::with_capacity(records.len());
        for properties in records {
            existing.insert(next, properties);
            created.push(RecordRef::new(next.to_string()));
            next += 1;
        }
        Ok(created)
    }
}

fn property_value(id: u64, props: &Map<String, Value>, name: &str) -> Option<String> {
    if name == OBJECT_ID_PROPERTY {
        return Some(id.to_string());
    }
    match props.get(name)? {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Numeric comparison when both sides are numbers, text otherwise
fn compare(actual: &str, expected: &str) -> Ordering {
    match (actual.parse::<f64>(), expected.parse::<f64>()) {
        (Ok(a), Ok(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        _ => actual.cmp(expected),
    }
}

fn matches(predicate: &Predicate, id: u64, props: &Map<String, Value>) -> bool {
    let actual = property_value(id, props, &predicate.property_name);
    let value = predicate.value.as_deref();

    match predicate.operator {
        Operator::HasProperty => actual.is_some(),
        Operator::NotHasProperty => actual.is_none(),
        Operator::Neq => match (actual, value) {
            (Some(a), Some(v)) => compare(&a, v) != Ordering::Equal,
            _ => true,
        },
        Operator::In | Operator::NotIn => {
            let listed = match (&actual, &predicate.values) {
                (Some(a), Some(values)) => values.iter().any(|v| compare(a, v) == Ordering::Equal),
                _ => false,
            };
            listed == (predicate.operator == Operator::In)
        }
        Operator::Between => match (actual, value, predicate.high_value.as_deref()) {
            (Some(a), Some(low), Some(high)) => {
                compare(&a, low) != Ordering::Less && compare(&a, high) != Ordering::Greater
            }
            _ => false,
        },
        Operator::ContainsToken | Operator::NotContainsToken => {
            let contains = match (actual, value) {
                (Some(a), Some(v)) => a.to_lowercase().contains(&v.to_lowercase()),
                _ => false,
            };
            contains == (predicate.operator == Operator::ContainsToken)
        }
        Operator::Eq | Operator::Lt | Operator::Lte | Operator::Gt | Operator::Gte => {
            let (Some(a), Some(v)) = (actual, value) else {
                return false;
            };
            let ord = compare(&a, v);
            match predicate.operator {
                Operator::Eq => ord == Ordering::Equal,
                Operator::Lt => ord == Ordering::Less,
                Operator::Lte => ord != Ordering::Greater,
                Operator::Gt => ord == Ordering::Greater,
                _ => ord != Ordering::Less,
            }
        }
    }
}
