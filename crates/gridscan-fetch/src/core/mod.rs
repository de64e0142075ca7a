//! Pure transformations used by the fetch loop.

mod retry;

pub use retry::retry_delay;
