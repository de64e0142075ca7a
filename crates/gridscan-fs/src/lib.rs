//! Crash-safe file primitives.
//!
//! Every write lands in a sibling temporary file first and is renamed over the
//! destination, so readers observe either the previous content or the new
//! content, never a torn file.

mod error;
pub mod primitives;

pub use error::{Error, Result};
pub use primitives::{AtomicWriteOptions, atomic_read, atomic_write, ensure_parent_dir, read_if_exists, remove_if_exists};
