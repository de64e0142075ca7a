//! Immutable data types for cell fetching.

pub mod options;
pub mod page;

pub use options::{FetchOptions, RateLimitConfig, RetryPolicy};
pub use page::{CellHarvest, Page, RateLimitSignal};
