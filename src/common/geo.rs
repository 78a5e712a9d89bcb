// src/common/geo.rs

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::common::error::AppError;

/// Earth radius used by the nearest-branch search, in miles.
pub const EARTH_RADIUS_MILES: f64 = 3959.0;

/// A validated point: finite latitude in [-90, 90], finite longitude in [-180, 180].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Coordinates {
    #[schema(example = 40.7128)]
    pub latitude: f64,
    #[schema(example = json!(-74.006))]
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, AppError> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(AppError::InvalidInput(format!(
                "latitude must be a number between -90 and 90, got {latitude}"
            )));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(AppError::InvalidInput(format!(
                "longitude must be a number between -180 and 180, got {longitude}"
            )));
        }
        Ok(Self { latitude, longitude })
    }

    /// Great-circle distance to `other` in miles (spherical law of cosines).
    pub fn distance_miles(&self, other: &Coordinates) -> f64 {
        distance_miles(self.latitude, self.longitude, other.latitude, other.longitude)
    }
}

/// Spherical law of cosines. The acos argument is clamped to [-1, 1]: rounding
/// can push it just past 1.0 for identical points, which would make acos NaN.
pub fn distance_miles(lat_q: f64, long_q: f64, lat_i: f64, long_i: f64) -> f64 {
    let (lat_q, lat_i) = (lat_q.to_radians(), lat_i.to_radians());
    let delta_long = long_i.to_radians() - long_q.to_radians();

    let cosine = lat_q.cos() * lat_i.cos() * delta_long.cos() + lat_q.sin() * lat_i.sin();

    EARTH_RADIUS_MILES * cosine.clamp(-1.0, 1.0).acos()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOWNTOWN: (f64, f64) = (40.7128, -74.0060);
    const UPTOWN: (f64, f64) = (40.8448, -73.8648);
    const QUERY: (f64, f64) = (40.7306, -73.9352);

    #[test]
    fn same_point_is_zero_miles() {
        for &(lat, long) in &[DOWNTOWN, UPTOWN, (0.0, 0.0), (89.9999, 179.9999), (-33.8688, 151.2093)] {
            let d = distance_miles(lat, long, lat, long);
            assert!(!d.is_nan(), "distance for ({lat}, {long}) is NaN");
            assert!(d.abs() < 1e-3, "distance for ({lat}, {long}) was {d}");
        }
    }

    #[test]
    fn downtown_is_nearer_than_uptown() {
        let downtown = distance_miles(QUERY.0, QUERY.1, DOWNTOWN.0, DOWNTOWN.1);
        let uptown = distance_miles(QUERY.0, QUERY.1, UPTOWN.0, UPTOWN.1);

        assert!(downtown < uptown, "downtown {downtown} vs uptown {uptown}");
    }

    #[test]
    fn new_york_to_los_angeles_is_about_2450_miles() {
        let d = distance_miles(40.7128, -74.0060, 34.0522, -118.2437);
        assert!((2400.0..2500.0).contains(&d), "got {d}");
    }

    #[test]
    fn distance_is_symmetric() {
        let a = Coordinates::new(51.5074, -0.1278).unwrap();
        let b = Coordinates::new(48.8566, 2.3522).unwrap();

        assert!((a.distance_miles(&b) - b.distance_miles(&a)).abs() < 1e-9);
    }

    #[test]
    fn antipodes_do_not_produce_nan() {
        let d = distance_miles(0.0, 0.0, 0.0, 180.0);
        assert!((d - EARTH_RADIUS_MILES * std::f64::consts::PI).abs() < 1e-6);
    }

    #[test]
    fn out_of_range_coordinates_are_rejected() {
        assert!(Coordinates::new(90.5, 0.0).is_err());
        assert!(Coordinates::new(0.0, -180.5).is_err());
        assert!(Coordinates::new(f64::NAN, 0.0).is_err());
        assert!(Coordinates::new(0.0, f64::INFINITY).is_err());
        assert!(Coordinates::new(-90.0, 180.0).is_ok());
    }
}
