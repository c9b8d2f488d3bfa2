use common::ConfigError;
use hubspot_sdk::HubSpotError;
use thiserror::Error;

/// Caller mistakes, rejected before any request is sent
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UsageError {
    #[error(
        "timestamp '{0}' has no timezone offset; use YYYY-MM-DDTHH:MM:SS±HHMM (e.g. 2024-03-01T00:00:00-0500)"
    )]
    MissingTimezone(String),

    #[error("timestamp '{0}' is not in YYYY-MM-DDTHH:MM:SS±HHMM format")]
    InvalidTimestamp(String),

    #[error("either created-after or modified-after must be specified")]
    NoDateCriteria,

    #[error("column '{0}' not found in CSV file")]
    MissingIdColumn(String),

    #[error("unknown record category '{0}'")]
    UnknownCategory(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("at least one record category is required")]
    EmptyCategoryList,

    #[error("property name cannot be empty")]
    EmptyPropertyName,

    #[error("line {line}: record id '{id}' is not numeric")]
    InvalidRecordId { line: u64, id: String },
}

#[derive(Debug, Error)]
pub enum DeleterError {
    #[error(transparent)]
    Remote(#[from] HubSpotError),

    #[error(transparent)]
    Usage(#[from] UsageError),

    /// A search leg reported matches but yielded nothing usable as the next
    /// threshold. Continuing would repeat the same leg forever.
    #[error(
        "search for {category} reported {total} matches above id {threshold} but made no progress"
    )]
    InconsistentLeg {
        category: String,
        threshold: u64,
        total: u64,
    },

    #[error("record id '{id}' is not numeric")]
    NonNumericId { id: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl DeleterError {
    pub fn is_usage(&self) -> bool {
        matches!(self, DeleterError::Usage(_))
    }
}

pub type Result<T, E = DeleterError> = std::result::Result<T, E>;
