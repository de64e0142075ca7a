//! Disk tiling.
//!
//! The disk's bounding box is cut into a centered grid of tiles no larger than
//! `max_cell_km` on a side. Tiles are numbered row-major (south to north, west
//! to east) over the whole grid, and only tiles that can intersect the disk are
//! kept. Neighbouring tiles share bit-identical edges, so the union has no gaps;
//! at worst it overlaps the disk's rim.

use crate::{Bounds, Cell, EARTH_RADIUS_KM, Error, GeoPoint, KM_PER_DEGREE, Result};

/// Radii at or below this are treated as a point query.
pub const ZERO_RADIUS_KM: f64 = 1e-9;

const MAX_TILES: u64 = 1_000_000;

/// Tile the disk of `radius_km` around `center` into cells of at most
/// `max_cell_km`.
///
/// Deterministic: identical inputs yield identical ids, bounds and order.
pub fn plan(center: GeoPoint, radius_km: f64, max_cell_km: f64) -> Result<Vec<Cell>> {
    center.validate()?;
    if !radius_km.is_finite() || radius_km < 0.0 {
        return Err(Error::InvalidRadius(radius_km));
    }
    if !max_cell_km.is_finite() || max_cell_km <= 0.0 {
        return Err(Error::InvalidCellSize(max_cell_km));
    }

    if radius_km <= ZERO_RADIUS_KM {
        return Ok(vec![point_cell(center, max_cell_km)]);
    }

    let half_lat = radius_km / KM_PER_DEGREE;
    if center.latitude + half_lat >= 90.0 || center.latitude - half_lat <= -90.0 {
        return Err(Error::ContainsPole {
            latitude: center.latitude,
            longitude: center.longitude,
            radius_km,
        });
    }

    // exact longitude half-extent of a spherical cap
    let ratio = (radius_km / EARTH_RADIUS_KM).sin() / center.latitude.to_radians().cos();
    if ratio >= 1.0 {
        return Err(Error::ContainsPole {
            latitude: center.latitude,
            longitude: center.longitude,
            radius_km,
        });
    }
    let half_lon = ratio.asin().to_degrees();
    if center.longitude - half_lon < -180.0 || center.longitude + half_lon > 180.0 {
        return Err(Error::CrossesAntimeridian {
            latitude: center.latitude,
            longitude: center.longitude,
            radius_km,
        });
    }

    let lat_step = max_cell_km / KM_PER_DEGREE;
    let rows = tile_count(2.0 * radius_km / max_cell_km);
    let lat_origin = center.latitude - rows as f64 * lat_step / 2.0;
    let lat_edge = |i: u64| (lat_origin + i as f64 * lat_step).clamp(-90.0, 90.0);

    // measure longitude at the tiled latitude nearest the equator so no tile is
    // wider than max_cell_km anywhere along its height
    let widest_lat = nearest_to_equator(lat_edge(0), lat_edge(rows));
    let lon_step = max_cell_km / (KM_PER_DEGREE * widest_lat.to_radians().cos());
    let cols = tile_count(2.0 * half_lon / lon_step);
    let lon_origin = center.longitude - cols as f64 * lon_step / 2.0;
    let lon_edge = |j: u64| (lon_origin + j as f64 * lon_step).clamp(-180.0, 180.0);

    if rows.saturating_mul(cols) > MAX_TILES {
        return Err(Error::TooManyCells {
            rows,
            cols,
            limit: MAX_TILES,
        });
    }

    let mut cells = Vec::new();
    for row in 0..rows {
        for col in 0..cols {
            let bounds = Bounds {
                south: lat_edge(row),
                north: lat_edge(row + 1),
                west: lon_edge(col),
                east: lon_edge(col + 1),
            };
            // ids fit: rows * cols <= MAX_TILES
            let cell = Cell::new((row * cols + col) as u32, bounds);
            if center.distance_km(&cell.centroid) - cell.half_diagonal_km() <= radius_km {
                cells.push(cell);
            }
        }
    }

    Ok(cells)
}

fn tile_count(extent_in_steps: f64) -> u64 {
    (extent_in_steps.ceil() as u64).max(1)
}

fn nearest_to_equator(south: f64, north: f64) -> f64 {
    if south <= 0.0 && north >= 0.0 {
        0.0
    } else if south.abs() < north.abs() {
        south
    } else {
        north
    }
}

fn point_cell(center: GeoPoint, max_cell_km: f64) -> Cell {
    let half_lat = max_cell_km / KM_PER_DEGREE / 2.0;
    let half_lon = {
        let cos = center.latitude.to_radians().cos().max(f64::EPSILON);
        max_cell_km / (KM_PER_DEGREE * cos) / 2.0
    };
    let bounds = Bounds {
        south: (center.latitude - half_lat).max(-90.0),
        north: (center.latitude + half_lat).min(90.0),
        west: (center.longitude - half_lon).max(-180.0),
        east: (center.longitude + half_lon).min(180.0),
    };
    Cell {
        id: 0,
        bounds,
        centroid: center,
    }
}
