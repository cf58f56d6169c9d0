use geo::{GeodesicDistance, Point};

use crate::models::Coordinates;

/// Decimal places kept in reported distances
const DISTANCE_PRECISION: i32 = 3;

/// Geodesic distance between two points in kilometers
///
/// Uses Karney's algorithm on the WGS84 ellipsoid and rounds the result to
/// three decimal places.
///
/// # Returns
/// `None` if either point is missing or out of range; callers treat this
/// as "cannot rank by distance".
pub fn geodesic_distance_km(from: Option<Coordinates>, to: Option<Coordinates>) -> Option<f64> {
    let (from, to) = (from?, to?);
    if !from.is_valid() || !to.is_valid() {
        return None;
    }

    let meters = Point::new(from.longitude, from.latitude)
        .geodesic_distance(&Point::new(to.longitude, to.latitude));

    meters
        .is_finite()
        .then(|| round_km(meters / 1000.0))
}

#[inline]
fn round_km(km: f64) -> f64 {
    let factor = 10f64.powi(DISTANCE_PRECISION);
    (km * factor).round() / factor
}
