//! Test utilities for the deletion engine.
//!
//! This module is only available when the `testing` feature is enabled or during tests:
//!
//! ```toml
//! [dev-dependencies]
//! deleter = { path = "src/deleter", features = ["testing"] }
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use deleter::testing::InMemoryRecordStore;
//!
//! let store = Arc::new(InMemoryRecordStore::new());
//! store.insert_range(&RecordCategory::new("contacts"), 1..=25_000).await;
//! ```

mod memory_store;
mod pacer;

pub use memory_store::{InMemoryRecordStore, StoreCall};
pub use pacer::RecordingPacer;
