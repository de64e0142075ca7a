use serde::{Deserialize, Serialize};

use crate::GeoPoint;

/// Row-major index of a tile in the planning grid.
pub type CellId = u32;

/// Axis-aligned latitude/longitude box. Edges are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl Bounds {
    pub fn contains(&self, point: &GeoPoint) -> bool {
        (self.south..=self.north).contains(&point.latitude)
            && (self.west..=self.east).contains(&point.longitude)
    }

    pub fn center(&self) -> GeoPoint {
        GeoPoint {
            latitude: (self.south + self.north) / 2.0,
            longitude: (self.west + self.east) / 2.0,
        }
    }

    pub fn corners(&self) -> [GeoPoint; 4] {
        [
            GeoPoint { latitude: self.north, longitude: self.east },
            GeoPoint { latitude: self.south, longitude: self.east },
            GeoPoint { latitude: self.south, longitude: self.west },
            GeoPoint { latitude: self.north, longitude: self.west },
        ]
    }

    /// Closed ring `[lon, lat]` starting and ending at the north-east corner,
    /// clockwise, as GeoJSON polygon consumers expect.
    pub fn polygon_ring(&self) -> Vec<[f64; 2]> {
        let mut ring: Vec<[f64; 2]> = self
            .corners()
            .iter()
            .map(|p| [p.longitude, p.latitude])
            .collect();
        ring.push(ring[0]);
        ring
    }

    /// North-south extent in km.
    pub fn height_km(&self) -> f64 {
        GeoPoint { latitude: self.south, longitude: self.west }
            .distance_km(&GeoPoint { latitude: self.north, longitude: self.west })
    }

    /// Widest east-west extent in km, measured along the box edge nearest the
    /// equator.
    pub fn width_km(&self) -> f64 {
        let lat = if self.south <= 0.0 && self.north >= 0.0 {
            0.0
        } else if self.south.abs() < self.north.abs() {
            self.south
        } else {
            self.north
        };
        (self.east - self.west) * crate::KM_PER_DEGREE * lat.to_radians().cos()
    }

    pub fn is_well_formed(&self) -> bool {
        [self.south, self.west, self.north, self.east]
            .iter()
            .all(|v| v.is_finite())
            && self.south <= self.north
            && self.west <= self.east
            && self.south >= -90.0
            && self.north <= 90.0
            && self.west >= -180.0
            && self.east <= 180.0
    }
}

impl std::fmt::Display for Bounds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "lat {:.4}..{:.4}, lon {:.4}..{:.4}",
            self.south, self.north, self.west, self.east
        )
    }
}

/// One query unit against the listing source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub id: CellId,
    pub bounds: Bounds,
    pub centroid: GeoPoint,
}

impl Cell {
    pub fn new(id: CellId, bounds: Bounds) -> Self {
        Self {
            id,
            centroid: bounds.center(),
            bounds,
        }
    }

    /// Largest distance from the centroid to any corner.
    pub fn half_diagonal_km(&self) -> f64 {
        self.bounds
            .corners()
            .iter()
            .map(|c| self.centroid.distance_km(c))
            .fold(0.0, f64::max)
    }
}
