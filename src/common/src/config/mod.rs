use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

/// Default configuration file, looked up in the working directory.
pub const CONFIG_FILE: &str = "hubspot-deleter.toml";

/// Prefix for environment overrides, e.g. `HUBSPOT_DELETER__SEARCH__LEG_CAP`.
pub const ENV_PREFIX: &str = "HUBSPOT_DELETER__";

/// Deepest result offset the CRM search endpoint will page to for one query.
pub const SEARCH_DEPTH_LIMIT: usize = 10_000;

/// Largest page the CRM search endpoint accepts.
pub const SEARCH_PAGE_MAX: u32 = 200;

/// Largest number of ids accepted by one batch archive call.
pub const BATCH_ARCHIVE_MAX: usize = 100;

/// What an enumerator does when the remote store fails part-way through a walk.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Surface the error and discard everything collected so far.
    Abort,
    /// Log the error and hand back the records collected before it.
    ReturnPartial,
}

impl std::fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailurePolicy::Abort => write!(f, "abort"),
            FailurePolicy::ReturnPartial => write!(f, "return_partial"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HubSpotConfig {
    /// API root, without the `/crm/v3` suffix
    ///
    /// Env: HUBSPOT_DELETER__HUBSPOT__BASE_URL
    pub base_url: String,
    /// Private app access token. The CLI also reads `HUBSPOT_TOKEN`.
    ///
    /// Env: HUBSPOT_DELETER__HUBSPOT__TOKEN
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl Default for HubSpotConfig {
    fn default() -> Self {
        Self {
            base_url: String::from("https://api.hubapi.com"),
            token: None,
        }
    }
}

/// Unfiltered listing walk (`GET /objects/{category}`)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ListingConfig {
    /// Records requested per listing page
    pub page_size: u32,
    /// Env: HUBSPOT_DELETER__LISTING__FAILURE_POLICY
    pub failure_policy: FailurePolicy,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            page_size: 100,
            failure_policy: FailurePolicy::ReturnPartial,
        }
    }
}

/// Filtered search walk (`POST /objects/{category}/search`)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Records requested per search page
    pub page_limit: u32,
    /// Records drained from one sorted query chain before resuming above
    /// the highest id seen. Must not exceed [`SEARCH_DEPTH_LIMIT`].
    ///
    /// Env: HUBSPOT_DELETER__SEARCH__LEG_CAP
    pub leg_cap: usize,
    /// Pause before every leg after the first
    #[serde(with = "humantime_serde")]
    pub leg_cooldown: Duration,
    /// Pause before every follow-up page inside a leg
    #[serde(with = "humantime_serde")]
    pub page_delay: Duration,
    /// Env: HUBSPOT_DELETER__SEARCH__FAILURE_POLICY
    pub failure_policy: FailurePolicy,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            page_limit: SEARCH_PAGE_MAX,
            leg_cap: SEARCH_DEPTH_LIMIT,
            leg_cooldown: Duration::from_secs(1),
            page_delay: Duration::from_millis(100),
            failure_policy: FailurePolicy::Abort,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeletionConfig {
    /// Ids per batch archive call
    pub batch_size: usize,
    /// Enumerate and count without issuing archive or delete calls.
    ///
    /// Env: HUBSPOT_DELETER__DELETION__DRY_RUN
    pub dry_run: bool,
}

impl Default for DeletionConfig {
    fn default() -> Self {
        Self {
            batch_size: BATCH_ARCHIVE_MAX,
            dry_run: false,
        }
    }
}

/// Column names used when reading ids from a CSV file
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExternalListConfig {
    pub id_column: String,
    /// Optional per-row category column; overrides the category given on
    /// the command line when present and non-empty.
    pub category_column: String,
}

impl Default for ExternalListConfig {
    fn default() -> Self {
        Self {
            id_column: String::from("hubspot_id"),
            category_column: String::from("object_type"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CategoriesConfig {
    /// Standard object types processed by "delete everything" runs
    pub builtin: Vec<String>,
}

impl Default for CategoriesConfig {
    fn default() -> Self {
        Self {
            builtin: [
                "contacts", "companies", "deals", "tickets", "notes", "emails", "tasks",
                "meetings", "calls",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Configuration {
    pub hubspot: HubSpotConfig,
    pub listing: ListingConfig,
    pub search: SearchConfig,
    pub deletion: DeletionConfig,
    pub external_list: ExternalListConfig,
    pub categories: CategoriesConfig,
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid HubSpot base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("search.page_limit {0} exceeds the endpoint maximum of {max}", max = SEARCH_PAGE_MAX)]
    PageLimitTooLarge(u32),

    #[error(
        "search.leg_cap {0} exceeds the search endpoint's pagination depth limit of {max}",
        max = SEARCH_DEPTH_LIMIT
    )]
    LegCapTooLarge(usize),

    #[error("search.leg_cap {leg_cap} is smaller than search.page_limit {page_limit}")]
    LegCapBelowPage { leg_cap: usize, page_limit: u32 },

    #[error("deletion.batch_size {0} exceeds the batch archive maximum of {max}", max = BATCH_ARCHIVE_MAX)]
    BatchTooLarge(usize),

    #[error("external_list.id_column cannot be empty")]
    EmptyIdColumn,

    #[error("categories.builtin cannot be empty")]
    NoCategories,
}

impl Configuration {
    pub fn load() -> Result<Self, Box<figment::Error>> {
        Self::figment(Toml::file(CONFIG_FILE))
            .extract()
            .map_err(Box::new)
    }

    pub fn load_from_path(path: &Path) -> Result<Self, Box<figment::Error>> {
        Self::figment(Toml::file_exact(path))
            .extract()
            .map_err(Box::new)
    }

    fn figment(file: figment::providers::Data<Toml>) -> Figment {
        Figment::from(Serialized::defaults(Configuration::default()))
            .merge(file)
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Reject settings the remote endpoints cannot honour.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Err(e) = url::Url::parse(&self.hubspot.base_url) {
            return Err(ConfigError::InvalidBaseUrl {
                url: self.hubspot.base_url.clone(),
                reason: e.to_string(),
            });
        }

        if self.listing.page_size == 0 {
            return Err(ConfigError::Zero {
                field: "listing.page_size",
            });
        }
        if self.search.page_limit == 0 {
            return Err(ConfigError::Zero {
                field: "search.page_limit",
            });
        }
        if self.search.page_limit > SEARCH_PAGE_MAX {
            return Err(ConfigError::PageLimitTooLarge(self.search.page_limit));
        }
        if self.search.leg_cap == 0 {
            return Err(ConfigError::Zero {
                field: "search.leg_cap",
            });
        }
        if self.search.leg_cap > SEARCH_DEPTH_LIMIT {
            return Err(ConfigError::LegCapTooLarge(self.search.leg_cap));
        }
        if self.search.leg_cap < self.search.page_limit as usize {
            return Err(ConfigError::LegCapBelowPage {
                leg_cap: self.search.leg_cap,
                page_limit: self.search.page_limit,
            });
        }

        if self.deletion.batch_size == 0 {
            return Err(ConfigError::Zero {
                field: "deletion.batch_size",
            });
        }
        if self.deletion.batch_size > BATCH_ARCHIVE_MAX {
            return Err(ConfigError::BatchTooLarge(self.deletion.batch_size));
        }

        if self.external_list.id_column.trim().is_empty() {
            return Err(ConfigError::EmptyIdColumn);
        }
        if self.categories.builtin.is_empty() {
            return Err(ConfigError::NoCategories);
        }

        Ok(())
    }
}
