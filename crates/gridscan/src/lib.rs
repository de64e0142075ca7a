//! Radius search over a size-capped listing source.
//!
//! A [`RadiusQuery`] is tiled into grid cells small enough that the source's
//! per-query cap is rarely hit. [`RunCoordinator`] fetches every cell through
//! one shared rate limiter, retries transient failures, deduplicates listings
//! by id, and commits each cell to a checkpoint so an interrupted run resumes
//! where it stopped.
//!
//! # Example
//!
//! ```no_run
//! # async fn run(source: impl gridscan::ListingSource + 'static) -> gridscan::Result<()> {
//! use gridscan::{GeoPoint, RadiusQuery, RunCoordinator, RunOptions};
//!
//! let query = RadiusQuery::new(GeoPoint::new(51.0447, -114.0719)?, 16.0, 2.0);
//! let report = RunCoordinator::new(source, RunOptions::default())
//!     .run(&query, "calgary.checkpoint.json")
//!     .await?;
//! println!("{} listings, {} cells skipped", report.records.len(), report.skipped.len());
//! # Ok(())
//! # }
//! ```

mod cli;
mod config;
mod coordinator;
mod error;
mod progress;
mod report;

pub use cli::{Cli, Overrides};
pub use config::{ApifySettings, DEFAULT_CONFIG_FILE, ENV_PREFIX, Settings};
pub use coordinator::{ProgressFn, RunCoordinator, RunOptions};
pub use error::{Error, Result};
pub use progress::ProgressTracker;
pub use report::{CellPhase, RunPhase, RunProgress, RunReport, SkippedCell};

pub use gridscan_fetch::{
    FetchOptions, ListingSource, Page, RateLimitConfig, RetryPolicy, SourceError,
};
pub use gridscan_geo::{Bounds, Cell, CellId, GeoPoint, RadiusQuery, TypeFilter};
pub use gridscan_record::Record;
pub use gridscan_state::{CheckpointStore, SkipReason};

#[cfg(feature = "reqwest")]
pub use gridscan_fetch::ApifySource;
