use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use gridscan_fs::{AtomicWriteOptions, atomic_write, ensure_parent_dir, read_if_exists, remove_if_exists};
use gridscan_geo::{Cell, CellId, RadiusQuery};
use gridscan_record::{Deduplicator, Record};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::state::RunState;
use crate::status::{CellOutcome, CellStatus};
use crate::{Error, Result};

/// Format version written into every checkpoint.
pub const CHECKPOINT_VERSION: u32 = 1;

#[derive(Serialize)]
struct DocumentRef<'a> {
    version: u32,
    query: &'a RadiusQuery,
    cells: Vec<CellEntryRef<'a>>,
    records: &'a [Record],
    updated_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct CellEntryRef<'a> {
    cell: &'a Cell,
    status: &'a CellStatus,
}

#[derive(Deserialize)]
struct Document {
    version: u32,
    query: RadiusQuery,
    cells: Vec<CellEntry>,
    records: Vec<Record>,
}

#[derive(Deserialize)]
struct CellEntry {
    cell: Cell,
    status: CellStatus,
}

/// Durable [`RunState`] for one query.
///
/// Each commit serializes the whole state and replaces the checkpoint file by
/// atomic rename before returning. If that write fails the in-memory state is
/// rolled back, so memory and disk never disagree.
#[derive(Debug)]
pub struct CheckpointStore {
    path: PathBuf,
    state: RunState,
    write_options: AtomicWriteOptions,
}

impl CheckpointStore {
    /// Read the checkpoint at `path`, if there is one.
    ///
    /// # Errors
    ///
    /// [`Error::Corrupt`] if the file cannot be parsed or violates the state
    /// invariants; [`Error::Io`] if it cannot be read.
    pub fn load(path: impl AsRef<Path>) -> Result<Option<RunState>> {
        let path = path.as_ref();
        let Some(bytes) = read_if_exists(path)? else {
            return Ok(None);
        };

        let corrupt = |reason: String| Error::Corrupt {
            path: path.to_path_buf(),
            reason,
        };

        let document: Document = serde_json::from_slice(&bytes).map_err(|e| corrupt(e.to_string()))?;
        if document.version != CHECKPOINT_VERSION {
            return Err(corrupt(format!(
                "unsupported version {} (expected {CHECKPOINT_VERSION})",
                document.version
            )));
        }
        document
            .query
            .validate(None)
            .map_err(|e| corrupt(format!("stored query is invalid: {e}")))?;

        let mut seen = HashSet::with_capacity(document.cells.len());
        for entry in &document.cells {
            if !seen.insert(entry.cell.id) {
                return Err(corrupt(format!("cell {} listed twice", entry.cell.id)));
            }
        }

        let dedup = Deduplicator::from_records(document.records).map_err(|e| corrupt(e.to_string()))?;
        let (cells, statuses) = document
            .cells
            .into_iter()
            .map(|entry| (entry.cell, entry.status))
            .unzip();

        Ok(Some(RunState::from_parts(document.query, cells, statuses, dedup)))
    }

    /// Resume the checkpoint at `path`, or create it with every cell pending.
    ///
    /// # Errors
    ///
    /// [`Error::QueryMismatch`] if the file belongs to another query, and
    /// [`Error::Corrupt`] if its cell list differs from `cells`.
    pub fn open(path: impl Into<PathBuf>, query: RadiusQuery, cells: Vec<Cell>) -> Result<Self> {
        let path = path.into();

        match Self::load(&path)? {
            Some(state) => {
                if state.query() != &query {
                    return Err(Error::QueryMismatch {
                        path,
                        stored: describe(state.query()),
                    });
                }
                if state.cells() != cells.as_slice() {
                    return Err(Error::Corrupt {
                        path,
                        reason: format!(
                            "stored cell list ({} cells) does not match the plan ({} cells)",
                            state.total_cells(),
                            cells.len()
                        ),
                    });
                }
                info!(
                    path = %path.display(),
                    completed = state.completed_count(),
                    skipped = state.skipped_count(),
                    pending = state.pending_count(),
                    records = state.records().len(),
                    "resuming from checkpoint"
                );
                Ok(Self {
                    path,
                    state,
                    write_options: AtomicWriteOptions::default(),
                })
            }
            None => {
                ensure_parent_dir(&path)?;
                let store = Self {
                    path,
                    state: RunState::new(query, cells),
                    write_options: AtomicWriteOptions::default(),
                };
                store.persist()?;
                info!(path = %store.path.display(), cells = store.state.total_cells(), "created checkpoint");
                Ok(store)
            }
        }
    }

    /// Skip fsync on every commit. Only for tests and throwaway runs.
    #[must_use]
    pub fn without_sync(mut self) -> Self {
        self.write_options = self.write_options.sync(false);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn into_state(self) -> RunState {
        self.state
    }

    pub fn pending_cells(&self) -> Vec<Cell> {
        self.state.pending_cells()
    }

    /// Mark `cell` completed or skipped, accept its records, and persist.
    /// Returns how many of `records` were new.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownCell`] and [`Error::CellAlreadyTerminal`] leave the
    /// state untouched. A failed write rolls the commit back and returns
    /// [`Error::Io`]; the cell stays pending.
    pub fn commit_cell(
        &mut self,
        cell: CellId,
        outcome: CellOutcome,
        records: impl IntoIterator<Item = Record>,
    ) -> Result<usize> {
        let before = self.state.records().len();
        let added = self.state.apply(cell, outcome.into(), records)?;

        if let Err(e) = self.persist() {
            self.state.revert(cell, before);
            return Err(e);
        }

        debug!(
            cell,
            added,
            records = self.state.records().len(),
            pending = self.state.pending_count(),
            "cell committed"
        );
        Ok(added)
    }

    /// Delete the checkpoint at `path`. Returns whether one existed.
    pub fn remove(path: impl AsRef<Path>) -> Result<bool> {
        Ok(remove_if_exists(path)?)
    }

    fn persist(&self) -> Result<()> {
        let document = DocumentRef {
            version: CHECKPOINT_VERSION,
            query: self.state.query(),
            cells: self
                .state
                .cell_statuses()
                .map(|(cell, status)| CellEntryRef { cell, status })
                .collect(),
            records: self.state.records(),
            updated_at: Utc::now(),
        };
        let bytes = serde_json::to_vec_pretty(&document)?;
        atomic_write(&self.path, &bytes, self.write_options)?;
        Ok(())
    }
}

fn describe(query: &RadiusQuery) -> String {
    format!(
        "center {}, radius {} km, cell {} km, types {}",
        query.center, query.radius_km, query.max_cell_km, query.type_filter
    )
}

#[cfg(test)]
mod tests {
    use std::fs;

    use gridscan_geo::{GeoPoint, plan};
    use tempfile::tempdir;

    use super::*;
    use crate::SkipReason;

    fn query() -> RadiusQuery {
        RadiusQuery::new(GeoPoint::new(51.0447, -114.0719).unwrap(), 3.0, 2.0)
    }

    fn cells(query: &RadiusQuery) -> Vec<Cell> {
        plan(query.center, query.radius_km, query.max_cell_km).unwrap()
    }

    #[test]
    fn open_creates_file_with_all_pending() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("run.json");
        let store = CheckpointStore::open(&path, query(), cells(&query())).unwrap();

        assert!(path.exists());
        let loaded = CheckpointStore::load(&path).unwrap().unwrap();
        assert_eq!(loaded.pending_count(), store.state().total_cells());
        assert_eq!(loaded.query(), &query());
    }

    #[test]
    fn commit_is_visible_after_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.json");
        let planned = cells(&query());
        let mut store = CheckpointStore::open(&path, query(), planned.clone()).unwrap().without_sync();

        let added = store
            .commit_cell(
                planned[0].id,
                CellOutcome::Completed { saturated: false },
                vec![Record::new("a").attribute("latitude", 51.0447), Record::new("b")],
            )
            .unwrap();
        assert_eq!(added, 2);
        store
            .commit_cell(
                planned[1].id,
                CellOutcome::Skipped(SkipReason {
                    error: "HTTP 503".into(),
                    attempts: 4,
                    fatal: false,
                }),
                Vec::new(),
            )
            .unwrap();

        let loaded = CheckpointStore::load(&path).unwrap().unwrap();
        assert_eq!(loaded.completed(), vec![planned[0].id]);
        assert_eq!(loaded.skipped().len(), 1);
        assert_eq!(loaded.records(), store.state().records());
        assert_eq!(loaded.cells(), planned.as_slice());
    }

    #[test]
    fn failed_write_rolls_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.json");
        let planned = cells(&query());
        let mut store = CheckpointStore::open(&path, query(), planned.clone()).unwrap();
        store
            .commit_cell(planned[0].id, CellOutcome::Completed { saturated: false }, vec![Record::new("a")])
            .unwrap();

        // a directory in place of the file makes the rename fail
        fs::remove_file(&path).unwrap();
        fs::create_dir(&path).unwrap();

        let err = store
            .commit_cell(planned[1].id, CellOutcome::Completed { saturated: false }, vec![Record::new("b")])
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)));
        assert!(store.state().status(planned[1].id).unwrap().is_pending());
        assert!(!store.state().contains_record("b"));
        assert_eq!(store.state().records().len(), 1);

        fs::remove_dir(&path).unwrap();
        store
            .commit_cell(planned[1].id, CellOutcome::Completed { saturated: false }, vec![Record::new("b")])
            .unwrap();
        let loaded = CheckpointStore::load(&path).unwrap().unwrap();
        assert_eq!(loaded.completed(), vec![planned[0].id, planned[1].id]);
    }

    #[test]
    fn terminal_cell_cannot_be_recommitted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.json");
        let planned = cells(&query());
        let mut store = CheckpointStore::open(&path, query(), planned.clone()).unwrap();
        store
            .commit_cell(planned[0].id, CellOutcome::Completed { saturated: false }, Vec::new())
            .unwrap();

        let err = store
            .commit_cell(planned[0].id, CellOutcome::Completed { saturated: false }, vec![Record::new("late")])
            .unwrap_err();
        assert!(matches!(err, Error::CellAlreadyTerminal { .. }));
        assert!(!store.state().contains_record("late"));
    }

    #[test]
    fn remove_reports_existence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.json");
        assert!(!CheckpointStore::remove(&path).unwrap());
        CheckpointStore::open(&path, query(), cells(&query())).unwrap();
        assert!(CheckpointStore::remove(&path).unwrap());
        assert!(CheckpointStore::load(&path).unwrap().is_none());
    }
}
