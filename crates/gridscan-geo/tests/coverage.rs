//! Coverage and determinism of the grid planner across a spread of queries.

use gridscan_geo::{EARTH_RADIUS_KM, GeoPoint, plan};

/// Point reached by travelling `distance_km` from `origin` on `bearing_deg`.
fn destination(origin: GeoPoint, bearing_deg: f64, distance_km: f64) -> GeoPoint {
    let delta = distance_km / EARTH_RADIUS_KM;
    let theta = bearing_deg.to_radians();
    let lat1 = origin.latitude.to_radians();
    let lon1 = origin.longitude.to_radians();

    let lat2 = (lat1.sin() * delta.cos() + lat1.cos() * delta.sin() * theta.cos()).asin();
    let lon2 = lon1
        + (theta.sin() * delta.sin() * lat1.cos()).atan2(delta.cos() - lat1.sin() * lat2.sin());

    GeoPoint {
        latitude: lat2.to_degrees(),
        longitude: lon2.to_degrees(),
    }
}

fn queries() -> Vec<(GeoPoint, f64, f64)> {
    vec![
        (GeoPoint::new(51.0447, -114.0719).unwrap(), 16.0, 2.0),
        (GeoPoint::new(51.0447, -114.0719).unwrap(), 2.0, 2.0),
        (GeoPoint::new(51.0447, -114.0719).unwrap(), 0.5, 2.0),
        (GeoPoint::new(0.0, 0.0).unwrap(), 12.5, 3.0),
        (GeoPoint::new(-33.8688, 151.2093).unwrap(), 30.0, 5.0),
        (GeoPoint::new(64.1466, -21.9426).unwrap(), 20.0, 1.5),
        (GeoPoint::new(-0.01, 36.8).unwrap(), 7.0, 2.5),
    ]
}

#[test]
fn every_point_in_the_disk_is_inside_some_cell() {
    for (center, radius, size) in queries() {
        let cells = plan(center, radius, size).unwrap();

        for bearing in (0..360).step_by(5) {
            for step in 0..=20 {
                // stay a hair inside the rim to keep float noise out of it
                let distance = radius * (step as f64 / 20.0) * (1.0 - 1e-9);
                let p = destination(center, bearing as f64, distance);
                assert!(center.distance_km(&p) <= radius);
                assert!(
                    cells.iter().any(|c| c.bounds.contains(&p)),
                    "{p} at {distance} km / {bearing} deg from {center} not covered ({radius} km, {size} km cells)"
                );
            }
        }
    }
}

#[test]
fn planning_is_deterministic() {
    for (center, radius, size) in queries() {
        let first = plan(center, radius, size).unwrap();
        let second = plan(center, radius, size).unwrap();
        assert_eq!(first, second);

        let ids: Vec<u32> = first.iter().map(|c| c.id).collect();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(ids, sorted, "ids must be unique and in row-major order");
    }
}

#[test]
fn every_cell_can_reach_the_disk() {
    for (center, radius, size) in queries() {
        for cell in plan(center, radius, size).unwrap() {
            assert!(cell.bounds.is_well_formed());
            assert!(center.distance_km(&cell.centroid) - cell.half_diagonal_km() <= radius);
        }
    }
}
