//! Run state for a grid scan and its durable checkpoint.
//!
//! [`RunState`] tracks which planned cells are pending, completed or skipped
//! together with the deduplicated records. [`CheckpointStore`] persists it
//! after every cell as a full JSON snapshot replaced by atomic rename, so a
//! crash never leaves a partially applied commit on disk.

mod error;
mod state;
mod status;
mod store;

pub use error::{Error, Result};
pub use state::RunState;
pub use status::{CellOutcome, CellStatus, SkipReason};
pub use store::{CHECKPOINT_VERSION, CheckpointStore};
