use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{DeleterError, UsageError};

pub use hubspot_sdk::objects::OBJECT_ID_PROPERTY;
/// One opaque search condition, passed to the remote store verbatim.
pub use hubspot_sdk::{Filter as Predicate, FilterOperator as Operator};

/// Name of a kind of CRM record (`contacts`, `deals`, a custom object type id, ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordCategory(String);

impl RecordCategory {
    /// Wrap a name without checking it against a catalog
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Custom object types are addressed by `2-<digits>` type ids or
    /// `p<portal>_<name>` fully qualified names.
    fn is_custom_object_type(name: &str) -> bool {
        if let Some(digits) = name.strip_prefix("2-") {
            return !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit());
        }
        if let Some(rest) = name.strip_prefix('p') {
            if let Some((portal, object)) = rest.split_once('_') {
                return !portal.is_empty()
                    && portal.bytes().all(|b| b.is_ascii_digit())
                    && !object.is_empty()
                    && object
                        .bytes()
                        .all(|b| b.is_ascii_alphanumeric() || b == b'_');
            }
        }
        false
    }
}

impl fmt::Display for RecordCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Categories the engine will accept from a caller
#[derive(Debug, Clone)]
pub struct CategoryCatalog {
    builtin: Vec<RecordCategory>,
}

impl CategoryCatalog {
    pub fn new<I, S>(builtin: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            builtin: builtin.into_iter().map(RecordCategory::new).collect(),
        }
    }

    pub fn builtin(&self) -> &[RecordCategory] {
        &self.builtin
    }

    /// Resolve a caller-supplied name. Built-in categories and custom object
    /// type ids are accepted; anything else is a usage error.
    pub fn resolve(&self, name: &str) -> Result<RecordCategory, UsageError> {
        let name = name.trim();
        if let Some(category) = self.builtin.iter().find(|c| c.as_str() == name) {
            return Ok(category.clone());
        }
        if RecordCategory::is_custom_object_type(name) {
            return Ok(RecordCategory::new(name));
        }
        Err(UsageError::UnknownCategory(name.to_string()))
    }

    pub fn resolve_all<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<RecordCategory>, UsageError> {
        if names.is_empty() {
            return Err(UsageError::EmptyCategoryList);
        }
        let mut resolved: Vec<RecordCategory> = Vec::with_capacity(names.len());
        for name in names {
            let category = self.resolve(name.as_ref())?;
            if !resolved.contains(&category) {
                resolved.push(category);
            }
        }
        Ok(resolved)
    }
}

/// Reference to one remote record.
///
/// The id is a decimal string; its numeric value orders records and seeds
/// keyset resumption.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordRef {
    pub id: String,
}

impl RecordRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    pub fn numeric_id(&self) -> Result<u64, DeleterError> {
        self.id
            .trim()
            .parse()
            .map_err(|_| DeleterError::NonNumericId {
                id: self.id.clone(),
            })
    }
}

/// One page of a search. Results are always sorted by record id, ascending;
/// the store adapter adds that sort to every request.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub predicates: Vec<Predicate>,
    pub page_size: u32,
    pub after: Option<String>,
}

impl SearchRequest {
    pub const SORT_PROPERTY: &'static str = OBJECT_ID_PROPERTY;
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SearchPage {
    pub records: Vec<RecordRef>,
    /// Matches for the whole query, not just this page
    pub total: u64,
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ListPage {
    pub records: Vec<RecordRef>,
    pub next_cursor: Option<String>,
}

/// Best-effort counts for one category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Outcome {
    pub attempted: usize,
    pub confirmed_deleted: usize,
    pub failed: usize,
}

impl Outcome {
    pub fn merge(&mut self, other: Outcome) {
        self.attempted += other.attempted;
        self.confirmed_deleted += other.confirmed_deleted;
        self.failed += other.failed;
    }
}

/// Per-category outcomes of one engine run
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeletionSummary {
    outcomes: BTreeMap<RecordCategory, Outcome>,
}

impl DeletionSummary {
    pub fn record(&mut self, category: RecordCategory, outcome: Outcome) {
        self.outcomes.entry(category).or_default().merge(outcome);
    }

    pub fn get(&self, category: &RecordCategory) -> Option<&Outcome> {
        self.outcomes.get(category)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RecordCategory, &Outcome)> {
        self.outcomes.iter()
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn total(&self) -> Outcome {
        let mut total = Outcome::default();
        for outcome in self.outcomes.values() {
            total.merge(*outcome);
        }
        total
    }

    /// Confirmed deletions per category, the shape callers usually print
    pub fn confirmed_counts(&self) -> BTreeMap<String, usize> {
        self.outcomes
            .iter()
            .map(|(category, outcome)| (category.to_string(), outcome.confirmed_deleted))
            .collect()
    }
}

impl fmt::Display for DeletionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (category, outcome) in &self.outcomes {
            if !first {
                f.write_str(", ")?;
            }
            first = false;
            write!(
                f,
                "{category}: {}/{}",
                outcome.confirmed_deleted, outcome.attempted
            )?;
            if outcome.failed > 0 {
                write!(f, " ({} failed)", outcome.failed)?;
            }
        }
        Ok(())
    }
}
