use std::collections::HashSet;
use std::sync::Arc;

use gridscan_geo::{Cell, TypeFilter};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::data::{CellHarvest, FetchOptions};
use crate::effects::source::ListingSource;
use crate::error::SourceError;
use crate::rate::{RateLimiter, ReleaseHint};

/// Drives pagination for one cell.
///
/// Every page request first takes a token from the shared [`RateLimiter`] and
/// runs under [`FetchOptions::page_timeout`].
pub struct CellFetcher<S: ListingSource> {
    source: S,
    limiter: Arc<RateLimiter>,
    options: FetchOptions,
    cancel: CancellationToken,
}

impl<S: ListingSource> CellFetcher<S> {
    pub fn new(source: S, limiter: Arc<RateLimiter>, options: FetchOptions) -> Self {
        Self {
            source,
            limiter,
            options,
            cancel: CancellationToken::new(),
        }
    }

    /// Give up waiting for a request slot once `cancel` fires. A page already
    /// sent is still awaited.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn options(&self) -> &FetchOptions {
        &self.options
    }

    /// Fetch every page for `cell`.
    ///
    /// Stops when the source reports no further pages, when the cumulative
    /// number of items the source returned reaches
    /// [`FetchOptions::per_cell_cap`] (a cap of 0 disables the check), when a
    /// cursor repeats, or after [`FetchOptions::max_pages`]. The cap counts
    /// items before any filtering the source applies locally, so a filtered
    /// cell can be saturated while holding fewer records than the cap.
    /// A saturated cell is truncated to the cap and flagged, not failed.
    ///
    /// # Errors
    ///
    /// The first page error, [`SourceError::Timeout`] when a page exceeds its
    /// timeout, or [`SourceError::Cancelled`] when cancellation fires while
    /// waiting on the limiter. Records from earlier pages are discarded.
    pub async fn fetch(&self, cell: &Cell, filter: &TypeFilter) -> Result<CellHarvest, SourceError> {
        let cap = self.options.per_cell_cap;
        let mut harvest = CellHarvest::default();
        let mut cursor: Option<String> = None;
        let mut seen_cursors = HashSet::new();

        loop {
            if !self.limiter.acquire_or_cancel(&self.cancel).await {
                debug!(cell = cell.id, page = harvest.pages + 1, "cancelled while waiting for a request slot");
                return Err(SourceError::Cancelled);
            }

            let request = self.source.fetch_page(&cell.bounds, filter, cursor.as_deref());
            let page = match tokio::time::timeout(self.options.page_timeout, request).await {
                Ok(page) => page?,
                Err(_) => {
                    debug!(cell = cell.id, page = harvest.pages + 1, "page request timed out");
                    return Err(SourceError::Timeout);
                }
            };
            harvest.pages += 1;

            debug!(
                cell = cell.id,
                page = harvest.pages,
                records = page.records.len(),
                returned = page.returned,
                more = page.next_cursor.is_some(),
                "page fetched"
            );

            match page.rate_limit {
                Some(signal) => self.limiter.release(ReleaseHint::Cooldown(signal.retry_after)),
                None => self.limiter.release(ReleaseHint::Done),
            }

            harvest.returned += page.cap_usage();
            harvest.records.extend(page.records);

            if cap > 0 && harvest.returned >= cap {
                harvest.records.truncate(cap);
                harvest.saturated = true;
                warn!(
                    cell = cell.id,
                    cap,
                    kept = harvest.records.len(),
                    bounds = %cell.bounds,
                    "cell reached the per-query result cap, some listings may be missing"
                );
                break;
            }

            let Some(next) = page.next_cursor else {
                break;
            };
            if !seen_cursors.insert(next.clone()) {
                warn!(cell = cell.id, cursor = %next, "source repeated a cursor, stopping pagination");
                break;
            }
            if harvest.pages >= self.options.max_pages {
                warn!(cell = cell.id, pages = harvest.pages, "page limit reached, stopping pagination");
                break;
            }
            cursor = Some(next);
        }

        Ok(harvest)
    }
}
