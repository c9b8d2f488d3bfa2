//! Record ids supplied in a CSV file.

use std::collections::{BTreeMap, HashSet};
use std::io::Read;
use std::path::Path;

use common::config::ExternalListConfig;

use crate::error::{DeleterError, Result, UsageError};
use crate::model::{CategoryCatalog, RecordCategory, RecordRef};

/// Record references read from a tabular source, grouped by category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalList {
    groups: BTreeMap<RecordCategory, Vec<RecordRef>>,
    seen: HashSet<(RecordCategory, String)>,
}

impl ExternalList {
    /// Read a CSV source with a header row.
    ///
    /// `columns.id_column` must be present; rows with an empty id are
    /// skipped and a non-numeric id rejects the whole file. An id repeated
    /// within a category is kept once. When `columns.category_column` is
    /// present, a non-empty value in it overrides `default_category` for
    /// that row.
    pub fn from_reader<R: Read>(
        reader: R,
        default_category: &RecordCategory,
        columns: &ExternalListConfig,
        catalog: &CategoryCatalog,
    ) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        let headers = reader.headers()?.clone();
        let id_idx = headers
            .iter()
            .position(|h| h == columns.id_column)
            .ok_or_else(|| UsageError::MissingIdColumn(columns.id_column.clone()))?;
        let category_idx = headers.iter().position(|h| h == columns.category_column);

        let mut list = ExternalList::default();
        let mut skipped = 0usize;
        let mut duplicates = 0usize;

        for row in reader.records() {
            let row = row?;
            let id = row.get(id_idx).unwrap_or_default();
            if id.is_empty() {
                skipped += 1;
                continue;
            }
            let id: u64 = id.parse().map_err(|_| UsageError::InvalidRecordId {
                line: row.position().map_or(0, |p| p.line()),
                id: id.to_string(),
            })?;

            let category = match category_idx.and_then(|idx| row.get(idx)) {
                Some(name) if !name.is_empty() => catalog.resolve(name)?,
                _ => default_category.clone(),
            };
            if !list.push(category, RecordRef::new(id.to_string())) {
                duplicates += 1;
            }
        }

        tracing::info!(
            records = list.len(),
            categories = list.groups.len(),
            skipped,
            duplicates,
            "Read records from CSV"
        );
        Ok(list)
    }

    pub fn from_path(
        path: &Path,
        default_category: &RecordCategory,
        columns: &ExternalListConfig,
        catalog: &CategoryCatalog,
    ) -> Result<Self> {
        tracing::debug!(path = %path.display(), "Reading records from CSV file");
        let file = std::fs::File::open(path).map_err(DeleterError::Io)?;
        Self::from_reader(file, default_category, columns, catalog)
    }

    /// Add `record` to `category`. Returns false if it was already listed.
    pub fn push(&mut self, category: RecordCategory, record: RecordRef) -> bool {
        if !self.seen.insert((category.clone(), record.id.clone())) {
            return false;
        }
        self.groups.entry(category).or_default().push(record);
        true
    }

    pub fn len(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn categories(&self) -> impl Iterator<Item = &RecordCategory> {
        self.groups.keys()
    }

    pub fn records(&self, category: &RecordCategory) -> &[RecordRef] {
        self.groups.get(category).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn into_groups(self) -> BTreeMap<RecordCategory, Vec<RecordRef>> {
        self.groups
    }
}
