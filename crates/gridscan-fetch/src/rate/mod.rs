//! Request budget shared by every worker.

mod limiter;

pub use limiter::{RateLimiter, ReleaseHint};
