use std::collections::VecDeque;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use gridscan_fetch::{
    CellFetcher, CellHarvest, FetchOptions, ListingSource, RateLimitConfig, RateLimiter, RetryCoordinator,
    RetryError, RetryPolicy,
};
use gridscan_geo::{Cell, GeoPoint, RadiusQuery, plan};
use gridscan_record::Record;
use gridscan_state::{CellOutcome, CheckpointStore, RunState, SkipReason};
use parking_lot::Mutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::report::{CellPhase, RunPhase, RunProgress, RunReport};
use crate::{Error, Result};

/// Callback invoked after every cell commit.
pub type ProgressFn = dyn Fn(&RunProgress) + Send + Sync;

/// Knobs for one run.
///
/// # Examples
///
/// ```
/// use gridscan::RunOptions;
///
/// let options = RunOptions::default().workers(8).clip_to_radius(false);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RunOptions {
    /// Concurrent cell fetches.
    ///
    /// Default: 4
    pub workers: usize,

    /// Drop records whose coordinates fall outside the query disk.
    ///
    /// Default: true
    pub clip_to_radius: bool,

    /// Largest `max_cell_km` the source is trusted with.
    ///
    /// Default: 5 km
    pub cell_cap_km: Option<f64>,

    pub fetch: FetchOptions,
    pub retry: RetryPolicy,

    /// `None` disables rate limiting.
    pub rate_limit: Option<RateLimitConfig>,

    /// fsync the checkpoint on every commit.
    ///
    /// Default: true
    pub sync_checkpoint: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            workers: 4,
            clip_to_radius: true,
            cell_cap_km: Some(5.0),
            fetch: FetchOptions::default(),
            retry: RetryPolicy::default(),
            rate_limit: Some(RateLimitConfig::default()),
            sync_checkpoint: true,
        }
    }
}

impl RunOptions {
    #[must_use]
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    #[must_use]
    pub fn clip_to_radius(mut self, clip: bool) -> Self {
        self.clip_to_radius = clip;
        self
    }

    #[must_use]
    pub fn cell_cap_km(mut self, cap: Option<f64>) -> Self {
        self.cell_cap_km = cap;
        self
    }

    #[must_use]
    pub fn fetch(mut self, fetch: FetchOptions) -> Self {
        self.fetch = fetch;
        self
    }

    #[must_use]
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn rate_limit(mut self, rate_limit: Option<RateLimitConfig>) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    #[must_use]
    pub fn sync_checkpoint(mut self, sync: bool) -> Self {
        self.sync_checkpoint = sync;
        self
    }
}

/// Plans a query, fetches every pending cell through a bounded worker pool,
/// and commits each result to the checkpoint before moving on.
///
/// Per-cell failures are contained: the cell is recorded as skipped and the
/// run continues. Only invalid input and checkpoint errors abort a run.
pub struct RunCoordinator<S> {
    source: Arc<S>,
    options: RunOptions,
    cancel: CancellationToken,
    on_progress: Option<Arc<ProgressFn>>,
}

impl<S> fmt::Debug for RunCoordinator<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunCoordinator")
            .field("options", &self.options)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl<S: ListingSource + 'static> RunCoordinator<S> {
    pub fn new(source: S, options: RunOptions) -> Self {
        Self {
            source: Arc::new(source),
            options,
            cancel: CancellationToken::new(),
            on_progress: None,
        }
    }

    /// Stop dispatching cells once `token` is cancelled.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    #[must_use]
    pub fn on_progress(mut self, callback: impl Fn(&RunProgress) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Arc::new(callback));
        self
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Run (or resume) `query` against the checkpoint at `checkpoint`.
    ///
    /// Cells already completed or skipped in the checkpoint are not fetched
    /// again. On cancellation, in-flight pages finish and their cells are
    /// committed; cells still waiting on backoff or the rate limiter, and the
    /// rest of the queue, stay pending and the report is
    /// [`RunPhase::Cancelled`].
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidInput`] before any I/O
    /// - [`Error::Checkpoint`] if the checkpoint is corrupt, belongs to
    ///   another query, or cannot be written
    pub async fn run(&self, query: &RadiusQuery, checkpoint: impl Into<PathBuf>) -> Result<RunReport> {
        query.validate(self.options.cell_cap_km)?;
        let cells = plan(query.center, query.radius_km, query.max_cell_km)?;
        info!(
            phase = %RunPhase::Planning,
            center = %query.center,
            radius_km = query.radius_km,
            cells = cells.len(),
            types = %query.type_filter,
            "planned grid"
        );

        let path = checkpoint.into();
        let sync = self.options.sync_checkpoint;
        let key = query.clone();
        let store = tokio::task::spawn_blocking(move || {
            let store = CheckpointStore::open(path, key, cells)?;
            Ok::<_, gridscan_state::Error>(if sync { store } else { store.without_sync() })
        })
        .await??;

        let pending = store.pending_cells();
        let initial = RunProgress::of(store.state());
        if let Some(callback) = &self.on_progress {
            callback(&initial);
        }

        let store = Arc::new(Mutex::new(store));
        let cancel = self.cancel.child_token();
        let worker_count = self.options.workers.max(1).min(pending.len());
        info!(
            phase = %RunPhase::Running,
            pending = pending.len(),
            completed = initial.completed,
            skipped = initial.skipped,
            workers = worker_count,
            "dispatching cells"
        );

        let limiter = Arc::new(match &self.options.rate_limit {
            Some(config) => RateLimiter::new(config.clone()),
            None => RateLimiter::unlimited(),
        });
        let context = Arc::new(RunContext {
            queue: Mutex::new(VecDeque::from(pending)),
            store: Arc::clone(&store),
            fetcher: CellFetcher::new(Arc::clone(&self.source), Arc::clone(&limiter), self.options.fetch.clone())
                .with_cancellation(cancel.clone()),
            retry: RetryCoordinator::new(self.options.retry.clone(), limiter).with_cancellation(cancel.clone()),
            query: query.clone(),
            clip_to_radius: self.options.clip_to_radius,
            cancel: cancel.clone(),
            on_progress: self.on_progress.clone(),
        });

        let mut workers = JoinSet::new();
        for _ in 0..worker_count {
            workers.spawn(Arc::clone(&context).work());
        }

        let mut failure = None;
        while let Some(joined) = workers.join_next().await {
            let result = joined.map_err(Error::from).and_then(|outcome| outcome);
            if let Err(e) = result
                && failure.is_none()
            {
                warn!(error = %e, "aborting run");
                cancel.cancel();
                failure = Some(e);
            }
        }
        if let Some(e) = failure {
            return Err(e);
        }
        drop(context);

        let state = match Arc::try_unwrap(store) {
            Ok(store) => store.into_inner().into_state(),
            Err(shared) => shared.lock().state().clone(),
        };
        Ok(finish(state, cancel.is_cancelled()))
    }
}

fn finish(state: RunState, cancelled: bool) -> RunReport {
    let status = if cancelled && !state.is_finished() {
        RunPhase::Cancelled
    } else {
        RunPhase::Completed
    };
    info!(
        phase = %status,
        completed = state.completed_count(),
        skipped = state.skipped_count(),
        pending = state.pending_count(),
        records = state.records().len(),
        "run finished"
    );
    RunReport::from_state(state, status)
}

struct RunContext<S: ListingSource> {
    queue: Mutex<VecDeque<Cell>>,
    store: Arc<Mutex<CheckpointStore>>,
    fetcher: CellFetcher<Arc<S>>,
    retry: RetryCoordinator,
    query: RadiusQuery,
    clip_to_radius: bool,
    cancel: CancellationToken,
    on_progress: Option<Arc<ProgressFn>>,
}

impl<S: ListingSource + 'static> RunContext<S> {
    async fn work(self: Arc<Self>) -> Result<()> {
        loop {
            if self.cancel.is_cancelled() {
                return Ok(());
            }
            let next = self.queue.lock().pop_front();
            let Some(cell) = next else {
                return Ok(());
            };
            debug!(cell = cell.id, phase = %CellPhase::Fetching, bounds = %cell.bounds, "fetching cell");

            let (outcome, records) = match self.retry.fetch_cell(&self.fetcher, &cell, &self.query.type_filter).await {
                Ok(harvest) => self.completed(&cell, harvest),
                Err(RetryError::Cancelled { attempts }) => {
                    debug!(cell = cell.id, attempts, phase = %CellPhase::Pending, "cancelled while waiting, left pending");
                    return Ok(());
                }
                Err(error) => {
                    let reason = skip_reason(&error);
                    warn!(cell = cell.id, phase = %CellPhase::Skipped, reason = %reason, "skipping cell");
                    (CellOutcome::Skipped(reason), Vec::new())
                }
            };

            let store = Arc::clone(&self.store);
            let progress = tokio::task::spawn_blocking(move || {
                let mut store = store.lock();
                store.commit_cell(cell.id, outcome, records)?;
                Ok::<_, gridscan_state::Error>(RunProgress::of(store.state()))
            })
            .await??;

            if let Some(callback) = &self.on_progress {
                callback(&progress);
            }
        }
    }

    fn completed(&self, cell: &Cell, harvest: CellHarvest) -> (CellOutcome, Vec<Record>) {
        let fetched = harvest.records.len();
        let records = if self.clip_to_radius {
            clip(&self.query, harvest.records)
        } else {
            harvest.records
        };
        debug!(
            cell = cell.id,
            phase = %CellPhase::Completed,
            pages = harvest.pages,
            fetched,
            kept = records.len(),
            saturated = harvest.saturated,
            "cell fetched"
        );
        (CellOutcome::Completed { saturated: harvest.saturated }, records)
    }
}

/// Keep records inside the query disk. Records without coordinates are kept.
fn clip(query: &RadiusQuery, records: Vec<Record>) -> Vec<Record> {
    records
        .into_iter()
        .filter(|record| match record.coordinates() {
            Some((latitude, longitude)) => query.covers(&GeoPoint { latitude, longitude }),
            None => true,
        })
        .collect()
}

fn skip_reason(error: &RetryError) -> SkipReason {
    SkipReason {
        error: error
            .last_error()
            .map_or_else(|| error.to_string(), ToString::to_string),
        attempts: error.attempts(),
        fatal: matches!(error, RetryError::Fatal { .. }),
    }
}

#[cfg(test)]
mod tests {
    use gridscan_fetch::SourceError;

    use super::*;

    fn query() -> RadiusQuery {
        RadiusQuery::new(GeoPoint::new(51.0447, -114.0719).unwrap(), 2.0, 2.0)
    }

    #[test]
    fn clip_keeps_records_inside_or_without_coordinates() {
        let records = vec![
            Record::new("inside")
                .attribute("latitude", 51.05)
                .attribute("longitude", -114.07),
            Record::new("outside")
                .attribute("latitude", 51.2)
                .attribute("longitude", -114.07),
            Record::new("unknown"),
        ];
        let kept: Vec<String> = clip(&query(), records).into_iter().map(|r| r.unique_id).collect();
        assert_eq!(kept, ["inside", "unknown"]);
    }

    #[test]
    fn skip_reason_carries_last_error() {
        let exhausted = RetryError::Exhausted {
            attempts: 4,
            last: SourceError::Timeout,
        };
        let reason = skip_reason(&exhausted);
        assert_eq!(reason.attempts, 4);
        assert_eq!(reason.error, "page request timed out");
        assert!(!reason.fatal);

        let fatal = RetryError::Fatal {
            attempts: 1,
            error: SourceError::Unauthorized { status: 401 },
        };
        assert!(skip_reason(&fatal).fatal);
    }

    #[test]
    fn options_builders() {
        let options = RunOptions::default().workers(0).rate_limit(None).cell_cap_km(None);
        assert_eq!(options.workers, 0);
        assert!(options.rate_limit.is_none());
        assert!(options.clip_to_radius);
    }
}
