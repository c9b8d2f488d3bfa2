//! Bulk record enumeration and deletion against the HubSpot CRM API.
//!
//! Records are found by one of two enumerators and handed to the
//! [`BatchDeleter`]:
//!
//! - [`FullListEnumerator`] walks the unfiltered listing endpoint to
//!   exhaustion by following its cursors.
//! - [`FilteredSearchEnumerator`] walks the filtered search endpoint in
//!   "legs" of keyset resumption, so result sets deeper than the endpoint's
//!   pagination ceiling are still retrieved completely and without duplicates.
//!
//! The [`Engine`] picks the enumerator for a [`Criterion`] and aggregates
//! per-category [`Outcome`]s.

pub mod batch;
pub mod criteria;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod external_list;
pub mod list;
pub mod model;
pub mod pacing;
pub mod search;
pub mod seeder;
pub mod store;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use batch::{BatchDeleter, DeletionResult, FailedDeletion};
pub use criteria::{Criterion, DateRange};
pub use discovery::{CategoryDiscovery, NoCustomCategories};
pub use engine::Engine;
pub use error::{DeleterError, UsageError};
pub use external_list::ExternalList;
pub use list::FullListEnumerator;
pub use model::{
    CategoryCatalog, DeletionSummary, ListPage, Outcome, Predicate, RecordCategory, RecordRef,
    SearchPage, SearchRequest,
};
pub use pacing::{NoPacing, Pacer, SleepPacer};
pub use search::{FilteredSearchEnumerator, SearchSettings};
pub use seeder::{SeedKind, Seeder};
pub use store::RecordStore;
