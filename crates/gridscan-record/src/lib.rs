//! Listing records and their deduplication.

mod dedup;
mod record;

pub use dedup::{DuplicateId, Deduplicator};
pub use record::{Attributes, Record};
