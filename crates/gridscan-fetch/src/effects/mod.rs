//! I/O against the listing source.

mod fetcher;
mod retrying;
mod source;

#[cfg(feature = "reqwest")]
mod apify;

pub use fetcher::CellFetcher;
pub use retrying::RetryCoordinator;
pub use source::ListingSource;

#[cfg(feature = "reqwest")]
pub use apify::{ApifySource, normalize_place};
