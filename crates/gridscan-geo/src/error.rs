#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("latitude {0} is outside [-90, 90]")]
    LatitudeOutOfRange(f64),

    #[error("longitude {0} is outside [-180, 180]")]
    LongitudeOutOfRange(f64),

    #[error("radius must be a finite, non-negative number of km (got {0})")]
    InvalidRadius(f64),

    #[error("cell size must be a finite, positive number of km (got {0})")]
    InvalidCellSize(f64),

    #[error("cell size {requested} km exceeds the source cap of {cap} km")]
    CellSizeAboveCap { requested: f64, cap: f64 },

    #[error("a {radius_km} km disk around ({latitude}, {longitude}) reaches a pole")]
    ContainsPole {
        latitude: f64,
        longitude: f64,
        radius_km: f64,
    },

    #[error("a {radius_km} km disk around ({latitude}, {longitude}) crosses the antimeridian")]
    CrossesAntimeridian {
        latitude: f64,
        longitude: f64,
        radius_km: f64,
    },

    #[error("planning grid of {rows}x{cols} tiles exceeds the limit of {limit}")]
    TooManyCells { rows: u64, cols: u64, limit: u64 },

    #[error("type filter contains an empty entry")]
    EmptyTypeFilterEntry,
}

pub type Result<T> = std::result::Result<T, Error>;
