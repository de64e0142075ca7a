use std::collections::HashMap;

use gridscan_geo::{Cell, CellId, RadiusQuery};
use gridscan_record::{Deduplicator, Record};

use crate::status::{CellStatus, SkipReason};
use crate::{Error, Result};

/// In-memory progress of one radius query.
///
/// Every planned cell has exactly one status, so the completed and skipped
/// sets can never overlap. Records are unique by id and kept in first-seen
/// order.
#[derive(Debug, Clone)]
pub struct RunState {
    query: RadiusQuery,
    cells: Vec<Cell>,
    statuses: Vec<CellStatus>,
    index: HashMap<CellId, usize>,
    dedup: Deduplicator,
}

impl RunState {
    /// Fresh state with every cell pending.
    pub fn new(query: RadiusQuery, cells: Vec<Cell>) -> Self {
        let statuses = vec![CellStatus::Pending; cells.len()];
        Self::from_parts(query, cells, statuses, Deduplicator::new())
    }

    pub(crate) fn from_parts(
        query: RadiusQuery,
        cells: Vec<Cell>,
        statuses: Vec<CellStatus>,
        dedup: Deduplicator,
    ) -> Self {
        let index = cells.iter().enumerate().map(|(i, cell)| (cell.id, i)).collect();
        Self {
            query,
            cells,
            statuses,
            index,
            dedup,
        }
    }

    pub fn query(&self) -> &RadiusQuery {
        &self.query
    }

    /// Planned cells in dispatch order.
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn status(&self, cell: CellId) -> Option<&CellStatus> {
        self.index.get(&cell).map(|&i| &self.statuses[i])
    }

    pub fn cell_statuses(&self) -> impl Iterator<Item = (&Cell, &CellStatus)> {
        self.cells.iter().zip(&self.statuses)
    }

    /// Cells still to fetch, in planned order.
    pub fn pending_cells(&self) -> Vec<Cell> {
        self.cell_statuses()
            .filter(|(_, status)| status.is_pending())
            .map(|(cell, _)| *cell)
            .collect()
    }

    pub fn completed(&self) -> Vec<CellId> {
        self.cell_statuses()
            .filter(|(_, status)| status.is_completed())
            .map(|(cell, _)| cell.id)
            .collect()
    }

    pub fn skipped(&self) -> Vec<(CellId, &SkipReason)> {
        self.cell_statuses()
            .filter_map(|(cell, status)| status.skip_reason().map(|reason| (cell.id, reason)))
            .collect()
    }

    /// Completed cells whose result count hit the source cap.
    pub fn saturated(&self) -> Vec<CellId> {
        self.cell_statuses()
            .filter(|(_, status)| matches!(status, CellStatus::Completed { saturated: true }))
            .map(|(cell, _)| cell.id)
            .collect()
    }

    pub fn completed_count(&self) -> usize {
        self.statuses.iter().filter(|s| s.is_completed()).count()
    }

    pub fn skipped_count(&self) -> usize {
        self.statuses.iter().filter(|s| s.is_skipped()).count()
    }

    pub fn pending_count(&self) -> usize {
        self.statuses.iter().filter(|s| s.is_pending()).count()
    }

    pub fn total_cells(&self) -> usize {
        self.cells.len()
    }

    pub fn is_finished(&self) -> bool {
        self.statuses.iter().all(|s| !s.is_pending())
    }

    pub fn records(&self) -> &[Record] {
        self.dedup.records()
    }

    pub fn contains_record(&self, unique_id: &str) -> bool {
        self.dedup.contains(unique_id)
    }

    pub fn into_records(self) -> Vec<Record> {
        self.dedup.into_records()
    }

    /// Move a pending cell to its terminal status and accept its records.
    /// Returns how many records were new.
    pub(crate) fn apply(
        &mut self,
        cell: CellId,
        status: CellStatus,
        records: impl IntoIterator<Item = Record>,
    ) -> Result<usize> {
        let i = *self.index.get(&cell).ok_or(Error::UnknownCell(cell))?;
        if !self.statuses[i].is_pending() {
            return Err(Error::CellAlreadyTerminal {
                cell,
                status: self.statuses[i].clone(),
            });
        }

        let added = self.dedup.accept_all(records);
        self.statuses[i] = status;
        Ok(added)
    }

    /// Undo an [`apply`](Self::apply) that could not be persisted.
    pub(crate) fn revert(&mut self, cell: CellId, records_before: usize) {
        self.dedup.truncate(records_before);
        if let Some(&i) = self.index.get(&cell) {
            self.statuses[i] = CellStatus::Pending;
        }
    }
}
