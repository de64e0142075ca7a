use std::collections::HashSet;

use crate::Record;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("record id {0:?} appears more than once")]
pub struct DuplicateId(pub String);

/// First-seen-wins record set.
///
/// Keeps the accepted records in encounter order alongside the index of ids
/// already seen. A later record with a known id is dropped; the stored
/// attributes are never overwritten.
#[derive(Debug, Default, Clone)]
pub struct Deduplicator {
    seen: HashSet<String>,
    records: Vec<Record>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from previously accepted records, which must already be unique.
    pub fn from_records(records: Vec<Record>) -> Result<Self, DuplicateId> {
        let mut seen = HashSet::with_capacity(records.len());
        for record in &records {
            if !seen.insert(record.unique_id.clone()) {
                return Err(DuplicateId(record.unique_id.clone()));
            }
        }
        Ok(Self { seen, records })
    }

    /// Returns `true` if the record was new and has been appended.
    pub fn accept(&mut self, record: Record) -> bool {
        if self.seen.contains(&record.unique_id) {
            return false;
        }
        self.seen.insert(record.unique_id.clone());
        self.records.push(record);
        true
    }

    /// Accept a batch, returning how many were new. The new records are the
    /// tail of [`records`](Self::records).
    pub fn accept_all(&mut self, records: impl IntoIterator<Item = Record>) -> usize {
        let mut added = 0;
        for record in records {
            if self.accept(record) {
                added += 1;
            }
        }
        added
    }

    pub fn contains(&self, unique_id: &str) -> bool {
        self.seen.contains(unique_id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    /// Drop everything accepted after the first `len` records.
    pub fn truncate(&mut self, len: usize) {
        for record in self.records.drain(len.min(self.records.len())..) {
            self.seen.remove(&record.unique_id);
        }
    }
}
