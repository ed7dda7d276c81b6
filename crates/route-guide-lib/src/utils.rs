//! Utility functions for fixed-point coordinates and spatial predicates

use crate::{Point, Rectangle};
use geo::{Coord, Rect};

/// Fixed-point scale: one degree is stored as this many units
pub const COORD_FACTOR: i32 = 10_000_000;

/// Precomputed constant: COORD_FACTOR as a float
const COORD_FACTOR_F64: f64 = COORD_FACTOR as f64;

/// Earth's radius in meters
pub const EARTH_RADIUS_M: f64 = 6371000.0;

/// Convert a fixed-point coordinate to floating degrees
#[inline(always)]
pub fn to_degrees(value: i32) -> f64 {
    value as f64 / COORD_FACTOR_F64
}

/// Convert floating degrees to the nearest fixed-point coordinate
///
/// Values outside the `i32` range saturate.
#[inline(always)]
pub fn from_degrees(degrees: f64) -> i32 {
    (degrees * COORD_FACTOR_F64).round() as i32
}

/// Convert a fixed-point coordinate to radians
#[inline(always)]
fn to_radians(value: i32) -> f64 {
    to_degrees(value).to_radians()
}

/// Check whether a point lies inside a rectangle, edges included
///
/// The rectangle corners may come in any orientation; bounds are normalized per axis
/// before testing.
#[inline]
pub fn contains(point: &Point, rect: &Rectangle) -> bool {
    let bounds = rect.bounds();
    let (left, bottom) = bounds.min().x_y();
    let (right, top) = bounds.max().x_y();

    left <= point.longitude
        && point.longitude <= right
        && bottom <= point.latitude
        && point.latitude <= top
}

/// Great-circle distance between two points in whole meters (truncated)
///
/// Uses the Haversine formula with a spherical Earth of radius [`EARTH_RADIUS_M`].
#[inline]
pub fn distance(p1: &Point, p2: &Point) -> i32 {
    let lat1 = to_radians(p1.latitude);
    let lat2 = to_radians(p2.latitude);
    let lon1 = to_radians(p1.longitude);
    let lon2 = to_radians(p2.longitude);

    let delta_lat = lat2 - lat1;
    let delta_lon = lon2 - lon1;

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    (EARTH_RADIUS_M * c) as i32
}

/// Smallest axis-aligned box containing every point, or `None` for no points
pub fn bounding_box<'a>(points: impl IntoIterator<Item = &'a Point>) -> Option<Rect<i32>> {
    let mut points = points.into_iter();
    let first = points.next()?;

    let mut min_x = first.longitude;
    let mut min_y = first.latitude;
    let mut max_x = first.longitude;
    let mut max_y = first.latitude;

    for point in points {
        min_x = min_x.min(point.longitude);
        min_y = min_y.min(point.latitude);
        max_x = max_x.max(point.longitude);
        max_y = max_y.max(point.latitude);
    }

    Some(Rect::new(
        Coord { x: min_x, y: min_y },
        Coord { x: max_x, y: max_y },
    ))
}
