use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid query: {0}")]
    InvalidInput(#[from] gridscan_geo::Error),

    #[error(transparent)]
    Checkpoint(#[from] gridscan_state::Error),

    #[error("missing setting `{0}`; pass it on the command line, in gridscan.toml or as GRIDSCAN_{1}")]
    MissingSetting(&'static str, &'static str),

    #[error("config file {0} not found")]
    ConfigNotFound(PathBuf),

    #[error(transparent)]
    Config(#[from] figment::Error),

    #[error("failed to write output: {0}")]
    Output(#[from] gridscan_fs::Error),

    #[error("failed to encode output: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("worker task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, Error>;
