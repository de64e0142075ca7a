use std::path::PathBuf;

use gridscan_geo::CellId;

use crate::CellStatus;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("checkpoint {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("checkpoint {path} belongs to a different query ({stored}); remove it or rerun that query")]
    QueryMismatch { path: PathBuf, stored: String },

    #[error("cell {0} is not part of this run")]
    UnknownCell(CellId),

    #[error("cell {cell} is already {status}")]
    CellAlreadyTerminal { cell: CellId, status: CellStatus },

    #[error("failed to encode checkpoint: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] gridscan_fs::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
