//! Great-circle distance between fixes.
//!
//! Uses the haversine formula on a spherical Earth. Good to well under a
//! meter at the ranges a capture is decided over.

use geo::{Distance, HaversineMeasure, Point};

/// Mean Earth radius used for all distance calculations.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Haversine distance between two `(lon, lat)` points in meters.
pub fn haversine_distance(p1: Point, p2: Point) -> f64 {
    HaversineMeasure::new(EARTH_RADIUS_METERS).distance(p1, p2)
}

/// Human readable distance: whole meters below a kilometer, otherwise
/// kilometers with one decimal.
pub fn format_distance(meters: f64) -> String {
    if meters < 1000.0 {
        format!("{}m", meters.round() as i64)
    } else {
        format!("{:.1}km", meters / 1000.0)
    }
}
