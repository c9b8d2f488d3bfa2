use async_trait::async_trait;

use crate::error::Result;
use crate::model::RecordCategory;

/// Finds portal-specific record categories to include in "all categories" runs.
#[async_trait]
pub trait CategoryDiscovery: Send + Sync {
    async fn custom_categories(&self) -> Result<Vec<RecordCategory>>;
}

/// Discovers nothing; only built-in categories are processed.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCustomCategories;

#[async_trait]
impl CategoryDiscovery for NoCustomCategories {
    async fn custom_categories(&self) -> Result<Vec<RecordCategory>> {
        Ok(Vec::new())
    }
}
