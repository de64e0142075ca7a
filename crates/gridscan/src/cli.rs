use std::path::PathBuf;

use clap::{ArgAction, Parser};
use serde::Serialize;

/// Cover a radius with grid cells and collect every listing once.
///
/// Every flag can also be set in `gridscan.toml` or as a `GRIDSCAN_*`
/// environment variable; flags win.
#[derive(Clone, Debug, Default, Parser)]
#[command(name = "gridscan", version = env!("CARGO_PKG_VERSION"), about, long_about = None)]
pub struct Cli {
    /// Config file (default: ./gridscan.toml if present)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Center latitude in degrees
    #[arg(long, allow_negative_numbers = true)]
    pub latitude: Option<f64>,

    /// Center longitude in degrees
    #[arg(long, allow_negative_numbers = true)]
    pub longitude: Option<f64>,

    /// Search radius in km
    #[arg(short, long = "radius", value_name = "KM")]
    pub radius_km: Option<f64>,

    /// Largest cell edge in km
    #[arg(long = "cell-size", value_name = "KM")]
    pub max_cell_km: Option<f64>,

    /// Comma separated categories, or "all"
    #[arg(short, long)]
    pub types: Option<String>,

    /// Concurrent cell fetches
    #[arg(short, long)]
    pub workers: Option<usize>,

    #[arg(long, value_name = "FILE")]
    pub checkpoint: Option<PathBuf>,

    /// Where to write the results
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Keep the checkpoint after a finished run
    #[arg(long)]
    pub keep_checkpoint: bool,

    /// Keep listings outside the radius
    #[arg(long)]
    pub no_clip: bool,

    /// Discard an existing checkpoint and start over
    #[arg(long)]
    pub fresh: bool,

    /// -v for debug, -vv for trace
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

/// The subset of flags that overrides [`Settings`](crate::Settings).
#[derive(Debug, Serialize)]
pub struct Overrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    radius_km: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_cell_km: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    types: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    workers: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    checkpoint: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    keep_checkpoint: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    clip_to_radius: Option<bool>,
}

impl Cli {
    /// Flags the user actually passed. Unset flags leave lower layers alone.
    pub fn overrides(&self) -> Overrides {
        Overrides {
            latitude: self.latitude,
            longitude: self.longitude,
            radius_km: self.radius_km,
            max_cell_km: self.max_cell_km,
            types: self.types.clone(),
            workers: self.workers,
            checkpoint: self.checkpoint.clone(),
            output: self.output.clone(),
            keep_checkpoint: self.keep_checkpoint.then_some(true),
            clip_to_radius: self.no_clip.then_some(false),
        }
    }

    /// Default log filter for the verbosity level.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "gridscan=info",
            1 => "gridscan=debug",
            _ => "gridscan=trace",
        }
    }
}
