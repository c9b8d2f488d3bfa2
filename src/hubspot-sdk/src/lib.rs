mod client;
mod error;
pub mod objects;

pub use client::{DEFAULT_BASE_URL, HubSpotClient};
pub use error::HubSpotError;
pub use objects::{Filter, FilterOperator};
