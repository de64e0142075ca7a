use std::fmt;
use std::path::Path;

use gridscan_fs::{AtomicWriteOptions, atomic_write, ensure_parent_dir};
use gridscan_geo::{Bounds, CellId};
use gridscan_record::Record;
use gridscan_state::{RunState, SkipReason};
use serde::Serialize;

use crate::Result;

/// Run-level lifecycle: `Planning -> Running -> Completed`, or
/// `Running -> Cancelled` when cancellation is observed with cells left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Planning,
    Running,
    Completed,
    Cancelled,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Planning => "planning",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Per-cell lifecycle as seen by the workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellPhase {
    Pending,
    Fetching,
    Completed,
    Skipped,
}

impl fmt::Display for CellPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Fetching => "fetching",
            Self::Completed => "completed",
            Self::Skipped => "skipped",
        };
        f.write_str(name)
    }
}

/// Snapshot handed to the progress callback after every commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunProgress {
    pub completed: usize,
    pub skipped: usize,
    pub total: usize,
    pub records: usize,
}

impl RunProgress {
    pub(crate) fn of(state: &RunState) -> Self {
        Self {
            completed: state.completed_count(),
            skipped: state.skipped_count(),
            total: state.total_cells(),
            records: state.records().len(),
        }
    }

    pub fn finished(&self) -> usize {
        self.completed + self.skipped
    }
}

/// A cell that permanently failed, with its last error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedCell {
    pub cell: CellId,
    pub bounds: Bounds,
    pub reason: SkipReason,
}

/// Result of [`RunCoordinator::run`](crate::RunCoordinator::run).
///
/// A report with skipped cells is a partial success: the records are valid,
/// the listed cells were not covered.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub status: RunPhase,
    pub records: Vec<Record>,
    pub skipped: Vec<SkippedCell>,
    pub completed_cells: usize,
    pub total_cells: usize,
    /// Cells left for a later resume. Empty unless cancelled.
    pub pending: Vec<CellId>,
    /// Completed cells that hit the source's per-query cap.
    pub saturated: Vec<CellId>,
}

impl RunReport {
    pub(crate) fn from_state(state: RunState, status: RunPhase) -> Self {
        let skipped = state
            .cell_statuses()
            .filter_map(|(cell, status)| {
                status.skip_reason().map(|reason| SkippedCell {
                    cell: cell.id,
                    bounds: cell.bounds,
                    reason: reason.clone(),
                })
            })
            .collect();
        let pending = state.pending_cells().iter().map(|cell| cell.id).collect();

        Self {
            status,
            skipped,
            completed_cells: state.completed_count(),
            total_cells: state.total_cells(),
            pending,
            saturated: state.saturated(),
            records: state.into_records(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.status == RunPhase::Completed && self.skipped.is_empty()
    }

    /// Write `{records, skipped}` to `path` as pretty JSON, atomically.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let output = Output {
            records: &self.records,
            skipped: &self.skipped,
        };
        let bytes = serde_json::to_vec_pretty(&output)?;
        ensure_parent_dir(path)?;
        atomic_write(path, &bytes, AtomicWriteOptions::default())?;
        Ok(())
    }
}

#[derive(Serialize)]
struct Output<'a> {
    records: &'a [Record],
    skipped: &'a [SkippedCell],
}
