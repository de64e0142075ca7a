use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Mean Earth radius used by every distance computation in the workspace.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Length of one degree of latitude (and of longitude at the equator) on the
/// sphere of radius [`EARTH_RADIUS_KM`].
pub const KM_PER_DEGREE: f64 = EARTH_RADIUS_KM * std::f64::consts::PI / 180.0;

/// A WGS84-style coordinate in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    /// Build a validated point.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        let point = Self {
            latitude,
            longitude,
        };
        point.validate()?;
        Ok(point)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(Error::LatitudeOutOfRange(self.latitude));
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(Error::LongitudeOutOfRange(self.longitude));
        }
        Ok(())
    }

    /// Great-circle distance in km (haversine).
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let dlat = lat2 - lat1;
        let dlon = (other.longitude - self.longitude).to_radians();

        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        // clamp guards asin against a > 1 from rounding
        2.0 * EARTH_RADIUS_KM * a.sqrt().min(1.0).asin()
    }
}

impl std::fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.5}, {:.5})", self.latitude, self.longitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range() {
        assert_eq!(
            GeoPoint::new(90.5, 0.0),
            Err(Error::LatitudeOutOfRange(90.5))
        );
        assert_eq!(
            GeoPoint::new(0.0, -180.01),
            Err(Error::LongitudeOutOfRange(-180.01))
        );
        assert!(GeoPoint::new(f64::NAN, 0.0).is_err());
        assert!(GeoPoint::new(-90.0, 180.0).is_ok());
    }

    #[test]
    fn distance_is_zero_for_same_point() {
        let p = GeoPoint::new(51.0447, -114.0719).unwrap();
        assert_eq!(p.distance_km(&p), 0.0);
    }

    #[test]
    fn one_degree_of_latitude() {
        let a = GeoPoint::new(10.0, 20.0).unwrap();
        let b = GeoPoint::new(11.0, 20.0).unwrap();
        assert!((a.distance_km(&b) - KM_PER_DEGREE).abs() < 1e-9);
    }

    #[test]
    fn longitude_shrinks_with_latitude() {
        let equator = GeoPoint::new(0.0, 0.0)
            .unwrap()
            .distance_km(&GeoPoint::new(0.0, 1.0).unwrap());
        let north = GeoPoint::new(60.0, 0.0)
            .unwrap()
            .distance_km(&GeoPoint::new(60.0, 1.0).unwrap());
        assert!((equator - KM_PER_DEGREE).abs() < 1e-9);
        // great circle is slightly shorter than the parallel at 60N
        assert!(north < equator * 0.5 + 1e-6);
        assert!(north > equator * 0.49);
    }
}
