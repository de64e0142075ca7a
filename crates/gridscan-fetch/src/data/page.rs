use std::time::Duration;

use gridscan_record::Record;

/// The source asked us to slow down without failing the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RateLimitSignal {
    pub retry_after: Option<Duration>,
}

/// One page of listings for a cell.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Page {
    pub records: Vec<Record>,
    /// Items the source produced before any client-side filtering. This is
    /// what counts against the per-query cap.
    pub returned: usize,
    /// `None` once the source has no further pages.
    pub next_cursor: Option<String>,
    pub rate_limit: Option<RateLimitSignal>,
}

impl Page {
    /// A final page carrying `records`.
    pub fn last(records: Vec<Record>) -> Self {
        Self {
            returned: records.len(),
            records,
            next_cursor: None,
            rate_limit: None,
        }
    }

    /// Set the pre-filter item count when the source dropped some items.
    #[must_use]
    pub fn returned(mut self, returned: usize) -> Self {
        self.returned = returned;
        self
    }

    /// Count charged against the cap; never less than the records kept.
    pub fn cap_usage(&self) -> usize {
        self.returned.max(self.records.len())
    }

    #[must_use]
    pub fn next_cursor(mut self, cursor: impl Into<String>) -> Self {
        self.next_cursor = Some(cursor.into());
        self
    }

    #[must_use]
    pub fn rate_limit(mut self, signal: RateLimitSignal) -> Self {
        self.rate_limit = Some(signal);
        self
    }
}

/// Everything fetched for one cell.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CellHarvest {
    pub records: Vec<Record>,
    pub pages: u32,
    /// Items the source returned before filtering, summed over pages.
    pub returned: usize,
    /// The per-query cap was reached; listings beyond it are lost.
    pub saturated: bool,
}
