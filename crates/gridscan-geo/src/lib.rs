//! Geodesic primitives and grid planning.
//!
//! A [`RadiusQuery`] describes a disk on the Earth's surface. [`plan`] tiles
//! that disk into [`Cell`]s small enough for a size-capped listing source,
//! deterministically, so a resumed run sees the same cell ids in the same
//! order.

mod cell;
mod error;
mod planner;
mod point;
mod query;

pub use cell::{Bounds, Cell, CellId};
pub use error::{Error, Result};
pub use planner::{ZERO_RADIUS_KM, plan};
pub use point::{EARTH_RADIUS_KM, GeoPoint, KM_PER_DEGREE};
pub use query::{RadiusQuery, TypeFilter};
