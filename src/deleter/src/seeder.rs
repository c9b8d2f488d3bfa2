//! Creates synthetic records for exercising deletions against a sandbox portal.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{Result, UsageError};
use crate::model::{RecordCategory, RecordRef};
use crate::pacing::ensure_active;
use crate::store::RecordStore;

/// Largest number of records created per batch call
pub const SEED_BATCH_SIZE: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedKind {
    Contacts,
    Companies,
    Deals,
}

impl SeedKind {
    pub fn category(&self) -> RecordCategory {
        RecordCategory::new(self.to_string())
    }

    fn properties(&self) -> Map<String, Value> {
        let tag = Uuid::new_v4().simple().to_string();
        let short = &tag[..12];
        let mut props = Map::new();
        match self {
            SeedKind::Contacts => {
                props.insert("email".into(), format!("seed-{short}@example.com").into());
                props.insert("firstname".into(), "Seed".into());
                props.insert("lastname".into(), short.into());
            }
            SeedKind::Companies => {
                props.insert("name".into(), format!("Seed Company {short}").into());
                props.insert("domain".into(), format!("{short}.example.com").into());
            }
            SeedKind::Deals => {
                props.insert("dealname".into(), format!("Seed Deal {short}").into());
                props.insert("pipeline".into(), "default".into());
                props.insert("dealstage".into(), "appointmentscheduled".into());
            }
        }
        props
    }
}

impl fmt::Display for SeedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeedKind::Contacts => write!(f, "contacts"),
            SeedKind::Companies => write!(f, "companies"),
            SeedKind::Deals => write!(f, "deals"),
        }
    }
}

impl FromStr for SeedKind {
    type Err = UsageError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "contacts" => Ok(SeedKind::Contacts),
            "companies" => Ok(SeedKind::Companies),
            "deals" => Ok(SeedKind::Deals),
            other => Err(UsageError::UnknownCategory(other.to_string())),
        }
    }
}

pub struct Seeder {
    store: Arc<dyn RecordStore>,
    cancel: CancellationToken,
}

impl Seeder {
    pub fn new(store: Arc<dyn RecordStore>, cancel: CancellationToken) -> Self {
        Self { store, cancel }
    }

    /// Create `count` records of `kind`, returning the ids the store assigned
    pub async fn seed(&self, kind: SeedKind, count: usize) -> Result<Vec<RecordRef>> {
        let category = kind.category();
        tracing::info!(%category, count, "Seeding records");

        let mut created = Vec::with_capacity(count);
        let mut remaining = count;

        while remaining > 0 {
            ensure_active(&self.cancel)?;
            let size = remaining.min(SEED_BATCH_SIZE);
            let batch = (0..size).map(|_| kind.properties()).collect();
            let refs = self.store.create_batch(&category, batch).await?;
            tracing::debug!(%category, created = refs.len(), "Created batch");
            created.extend(refs);
            remaining -= size;
        }

        tracing::info!(%category, created = created.len(), "Seeding completed");
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryRecordStore;

    #[test]
    fn test_kind_parses() {
        assert_eq!("deals".parse::<SeedKind>().unwrap(), SeedKind::Deals);
        assert_eq!(SeedKind::Companies.category().as_str(), "companies");
        assert!("tickets".parse::<SeedKind>().is_err());
    }

    #[test]
    fn test_contact_emails_are_unique() {
        let a = SeedKind::Contacts.properties();
        let b = SeedKind::Contacts.properties();
        assert_ne!(a["email"], b["email"]);
    }

    #[tokio::test]
    async fn test_seed_in_batches() {
        let store = Arc::new(InMemoryRecordStore::new());
        let seeder = Seeder::new(store.clone(), CancellationToken::new());

        let created = seeder.seed(SeedKind::Deals, 250).await.unwrap();

        assert_eq!(created.len(), 250);
        assert_eq!(store.create_calls().await, 3);
        assert_eq!(store.remaining(&RecordCategory::new("deals")).await, 250);
    }
}
