//! Rate-limited, retrying, paginated fetching of one grid cell.
//!
//! # Architecture
//!
//! This crate follows the three-layer pattern:
//! - [`data`] - Immutable options and page types
//! - [`core`] - Pure transformations (backoff schedule)
//! - [`effects`] - I/O behind the [`ListingSource`] trait
//!
//! A single [`RateLimiter`] is shared by every fetch of a run; it is the only
//! place the source's request budget is enforced.

pub mod core;
pub mod data;
pub mod effects;
mod error;
pub mod rate;

pub use crate::core::retry_delay;
pub use data::{CellHarvest, FetchOptions, Page, RateLimitConfig, RateLimitSignal, RetryPolicy};
pub use effects::{CellFetcher, ListingSource, RetryCoordinator};
pub use error::{ErrorClass, RetryError, SourceError};
pub use rate::{RateLimiter, ReleaseHint};

#[cfg(feature = "reqwest")]
pub use effects::ApifySource;
