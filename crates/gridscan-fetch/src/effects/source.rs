use std::future::Future;
use std::sync::Arc;

use gridscan_geo::{Bounds, TypeFilter};

use crate::data::Page;
use crate::error::SourceError;

/// A paginated listing source queried one bounding box at a time.
///
/// Implementations map their transport failures onto [`SourceError`] so the
/// retry loop can classify them. Timeouts are applied by the caller.
///
/// # Implementations
///
/// - [`ApifySource`](crate::ApifySource): Google Places crawler on Apify
/// - Mock implementations for testing
pub trait ListingSource: Send + Sync {
    /// Request one page of listings inside `bounds`.
    ///
    /// `cursor` is `None` for the first page and the previous page's
    /// `next_cursor` afterwards.
    fn fetch_page(
        &self,
        bounds: &Bounds,
        filter: &TypeFilter,
        cursor: Option<&str>,
    ) -> impl Future<Output = Result<Page, SourceError>> + Send;
}

impl<S: ListingSource> ListingSource for Arc<S> {
    fn fetch_page(
        &self,
        bounds: &Bounds,
        filter: &TypeFilter,
        cursor: Option<&str>,
    ) -> impl Future<Output = Result<Page, SourceError>> + Send {
        (**self).fetch_page(bounds, filter, cursor)
    }
}

impl<S: ListingSource> ListingSource for &S {
    fn fetch_page(
        &self,
        bounds: &Bounds,
        filter: &TypeFilter,
        cursor: Option<&str>,
    ) -> impl Future<Output = Result<Page, SourceError>> + Send {
        (**self).fetch_page(bounds, filter, cursor)
    }
}
