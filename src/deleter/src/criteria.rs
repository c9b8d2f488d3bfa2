//! What a caller can ask the engine to delete.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use serde::Deserialize;

use crate::error::UsageError;
use crate::external_list::ExternalList;
use crate::model::{Operator, Predicate, RecordCategory};

/// Property holding a record's creation time
pub const CREATED_PROPERTY: &str = "createdate";
/// Property holding a record's last modification time
pub const MODIFIED_PROPERTY: &str = "lastmodifieddate";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

/// A validated deletion request. Each variant carries everything the engine
/// needs; no further caller input is consulted once one is built.
#[derive(Debug, Clone)]
pub enum Criterion {
    /// Every built-in and discovered category, via the full listing
    All,
    /// The named categories, via the full listing
    Categories(Vec<RecordCategory>),
    /// Records created or modified at or after the given instants.
    /// `None` selects every built-in and discovered category.
    DateRange {
        range: DateRange,
        categories: Option<Vec<RecordCategory>>,
    },
    /// Records of one category matching caller-supplied predicates
    Query {
        category: RecordCategory,
        predicates: Vec<Predicate>,
    },
    /// Records of one category where `property` has any value
    PropertyPresence {
        category: RecordCategory,
        property: String,
    },
    /// Records named in a tabular source
    ExternalList(ExternalList),
}

impl Criterion {
    pub fn property_presence(
        category: RecordCategory,
        property: impl Into<String>,
    ) -> Result<Self, UsageError> {
        let property = property.into().trim().to_string();
        if property.is_empty() {
            return Err(UsageError::EmptyPropertyName);
        }
        Ok(Criterion::PropertyPresence { category, property })
    }

    pub fn query(category: RecordCategory, query: &str) -> Result<Self, UsageError> {
        Ok(Criterion::Query {
            category,
            predicates: parse_query(query)?,
        })
    }

    /// Short name used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Criterion::All => "all",
            Criterion::Categories(_) => "categories",
            Criterion::DateRange { .. } => "date_range",
            Criterion::Query { .. } => "query",
            Criterion::PropertyPresence { .. } => "property_presence",
            Criterion::ExternalList(_) => "external_list",
        }
    }
}

/// Lower bounds on creation and modification time. At least one is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateRange {
    created_after: Option<DateTime<FixedOffset>>,
    modified_after: Option<DateTime<FixedOffset>>,
}

impl DateRange {
    pub fn new(
        created_after: Option<DateTime<FixedOffset>>,
        modified_after: Option<DateTime<FixedOffset>>,
    ) -> Result<Self, UsageError> {
        if created_after.is_none() && modified_after.is_none() {
            return Err(UsageError::NoDateCriteria);
        }
        Ok(Self {
            created_after,
            modified_after,
        })
    }

    /// Parse caller-supplied timestamps. Each must carry an explicit offset.
    pub fn parse(
        created_after: Option<&str>,
        modified_after: Option<&str>,
    ) -> Result<Self, UsageError> {
        Self::new(
            created_after.map(parse_timestamp).transpose()?,
            modified_after.map(parse_timestamp).transpose()?,
        )
    }

    pub fn created_after(&self) -> Option<&DateTime<FixedOffset>> {
        self.created_after.as_ref()
    }

    pub fn modified_after(&self) -> Option<&DateTime<FixedOffset>> {
        self.modified_after.as_ref()
    }

    /// `GTE` predicates over UTC epoch milliseconds
    pub fn predicates(&self) -> Vec<Predicate> {
        let mut predicates = Vec::with_capacity(2);
        if let Some(ts) = &self.created_after {
            predicates.push(date_predicate(CREATED_PROPERTY, ts));
        }
        if let Some(ts) = &self.modified_after {
            predicates.push(date_predicate(MODIFIED_PROPERTY, ts));
        }
        predicates
    }
}

fn date_predicate(property: &str, timestamp: &DateTime<FixedOffset>) -> Predicate {
    let millis = timestamp.timestamp_millis();
    tracing::debug!(
        property,
        timestamp = %timestamp,
        epoch_millis = millis,
        "Converted timestamp to UTC milliseconds"
    );
    Predicate::new(property, Operator::Gte, millis.to_string())
}

/// Parse `YYYY-MM-DDTHH:MM:SS±HHMM` (RFC 3339 is accepted too).
///
/// A timestamp without an offset is rejected rather than assumed to be
/// local or UTC time.
pub fn parse_timestamp(input: &str) -> Result<DateTime<FixedOffset>, UsageError> {
    let input = input.trim();
    if let Ok(ts) = DateTime::parse_from_str(input, TIMESTAMP_FORMAT) {
        return Ok(ts);
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(input) {
        return Ok(ts);
    }

    let naive = NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%S").is_ok()
        || NaiveDateTime::parse_from_str(input, "%Y-%m-%d %H:%M:%S").is_ok()
        || NaiveDate::parse_from_str(input, "%Y-%m-%d").is_ok();
    if naive {
        Err(UsageError::MissingTimezone(input.to_string()))
    } else {
        Err(UsageError::InvalidTimestamp(input.to_string()))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum QueryDocument {
    Filters(Vec<Predicate>),
    Wrapped { filters: Vec<Predicate> },
}

/// Parse an ad-hoc search query: a JSON array of filters, or an object with
/// a `filters` array. Filters use the search endpoint's own field names.
pub fn parse_query(query: &str) -> Result<Vec<Predicate>, UsageError> {
    let doc: QueryDocument =
        serde_json::from_str(query).map_err(|e| UsageError::InvalidQuery(e.to_string()))?;
    let filters = match doc {
        QueryDocument::Filters(filters) | QueryDocument::Wrapped { filters } => filters,
    };
    if filters.is_empty() {
        return Err(UsageError::InvalidQuery(
            "query must contain at least one filter".to_string(),
        ));
    }
    if filters.iter().any(|f| f.property_name.trim().is_empty()) {
        return Err(UsageError::EmptyPropertyName);
    }
    Ok(filters)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets_normalised_to_same_instant() {
        let eastern = DateRange::parse(Some("2024-03-01T00:00:00-0500"), None).unwrap();
        let utc = DateRange::parse(Some("2024-03-01T05:00:00+0000"), None).unwrap();

        let a = eastern.predicates();
        let b = utc.predicates();
        assert_eq!(a, b);
        assert_eq!(a[0].property_name, CREATED_PROPERTY);
        assert_eq!(a[0].operator, Operator::Gte);
        assert_eq!(a[0].value.as_deref(), Some("1709269200000"));
    }

    #[test]
    fn test_rfc3339_accepted() {
        let ts = parse_timestamp("2024-03-01T05:00:00Z").unwrap();
        assert_eq!(ts.timestamp_millis(), 1_709_269_200_000);
        let ts = parse_timestamp("2024-03-01T00:00:00-05:00").unwrap();
        assert_eq!(ts.timestamp_millis(), 1_709_269_200_000);
    }

    #[test]
    fn test_naive_timestamp_rejected() {
        for input in ["2024-03-01T00:00:00", "2024-03-01 00:00:00", "2024-03-01"] {
            assert_eq!(
                parse_timestamp(input),
                Err(UsageError::MissingTimezone(input.to_string()))
            );
        }
    }

    #[test]
    fn test_garbage_timestamp_rejected() {
        assert_eq!(
            parse_timestamp("last tuesday"),
            Err(UsageError::InvalidTimestamp("last tuesday".to_string()))
        );
    }

    #[test]
    fn test_date_range_requires_a_bound() {
        assert_eq!(DateRange::parse(None, None), Err(UsageError::NoDateCriteria));
    }

    #[test]
    fn test_both_bounds_produce_two_predicates() {
        let range = DateRange::parse(
            Some("2024-01-01T00:00:00+0000"),
            Some("2024-02-01T00:00:00+0100"),
        )
        .unwrap();
        let predicates = range.predicates();
        assert_eq!(predicates.len(), 2);
        assert_eq!(predicates[1].property_name, MODIFIED_PROPERTY);
        assert_eq!(predicates[1].value.as_deref(), Some("1706742000000"));
    }

    #[test]
    fn test_parse_query_shapes() {
        let plain = parse_query(
            r#"[{"propertyName": "lifecyclestage", "operator": "EQ", "value": "lead"}]"#,
        )
        .unwrap();
        let wrapped = parse_query(
            r#"{"filters": [{"propertyName": "lifecyclestage", "operator": "EQ", "value": "lead"}]}"#,
        )
        .unwrap();
        assert_eq!(plain, wrapped);
        assert_eq!(plain[0].operator, Operator::Eq);
    }

    #[test]
    fn test_parse_query_rejects_bad_input() {
        assert!(matches!(
            parse_query("lifecyclestage = lead"),
            Err(UsageError::InvalidQuery(_))
        ));
        assert!(matches!(parse_query("[]"), Err(UsageError::InvalidQuery(_))));
        assert_eq!(
            parse_query(r#"[{"propertyName": " ", "operator": "HAS_PROPERTY"}]"#),
            Err(UsageError::EmptyPropertyName)
        );
    }

    #[test]
    fn test_property_presence_requires_name() {
        assert_eq!(
            Criterion::property_presence(RecordCategory::new("contacts"), "  ").unwrap_err(),
            UsageError::EmptyPropertyName
        );
        let criterion =
            Criterion::property_presence(RecordCategory::new("contacts"), "email").unwrap();
        assert_eq!(criterion.kind(), "property_presence");
    }
}
