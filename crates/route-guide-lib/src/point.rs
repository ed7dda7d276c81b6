//! Value types exchanged by the route guide calls
//!
//! Coordinates are fixed-point integers (degrees × 1e7) so that feature lookups can rely
//! on exact equality and the JSON database round-trips without drift.

use crate::utils;
use geo::{Coord, Rect};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A location in fixed-point degrees
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Point {
    /// Latitude in degrees × 1e7
    pub latitude: i32,
    /// Longitude in degrees × 1e7
    pub longitude: i32,
}

impl Point {
    #[inline]
    pub const fn new(latitude: i32, longitude: i32) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Build a point from floating degrees, snapped to the nearest fixed-point step
    #[inline]
    pub fn from_degrees(lat: f64, lon: f64) -> Self {
        Self {
            latitude: utils::from_degrees(lat),
            longitude: utils::from_degrees(lon),
        }
    }

    #[inline]
    pub fn latitude_degrees(&self) -> f64 {
        utils::to_degrees(self.latitude)
    }

    #[inline]
    pub fn longitude_degrees(&self) -> f64 {
        utils::to_degrees(self.longitude)
    }

    /// Whether the point lies within ±90° latitude and ±180° longitude
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.latitude.unsigned_abs() <= 90 * utils::COORD_FACTOR as u32
            && self.longitude.unsigned_abs() <= 180 * utils::COORD_FACTOR as u32
    }

    /// Key used by the note registry: both coordinates separated by a space
    ///
    /// The separator keeps distinct pairs such as `(1, 23)` and `(12, 3)` apart.
    #[inline]
    pub fn registry_key(&self) -> String {
        format!("{} {}", self.latitude, self.longitude)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({:.7}, {:.7})",
            self.latitude_degrees(),
            self.longitude_degrees()
        )
    }
}

/// x is the longitude, y the latitude
impl From<Point> for Coord<i32> {
    #[inline]
    fn from(point: Point) -> Self {
        Coord {
            x: point.longitude,
            y: point.latitude,
        }
    }
}

impl From<Coord<i32>> for Point {
    #[inline]
    fn from(coord: Coord<i32>) -> Self {
        Point::new(coord.y, coord.x)
    }
}

/// Area between two opposite corners, in any orientation
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rectangle {
    pub lo: Point,
    pub hi: Point,
}

impl Rectangle {
    #[inline]
    pub const fn new(lo: Point, hi: Point) -> Self {
        Self { lo, hi }
    }

    /// A rectangle covering the whole fixed-point coordinate space
    pub const fn world() -> Self {
        Self {
            lo: Point::new(i32::MIN, i32::MIN),
            hi: Point::new(i32::MAX, i32::MAX),
        }
    }

    /// The corners as a normalized `geo::Rect` (min/max taken per axis)
    #[inline]
    pub fn bounds(&self) -> Rect<i32> {
        Rect::new(Coord::from(self.lo), Coord::from(self.hi))
    }
}

impl fmt::Display for Rectangle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} - {}]", self.lo, self.hi)
    }
}

/// A named location; an empty name means there is nothing known at that point
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Feature {
    pub location: Point,
    pub name: String,
}

impl Feature {
    pub fn new(location: Point, name: impl Into<String>) -> Self {
        Self {
            location,
            name: name.into(),
        }
    }

    /// The placeholder returned when a lookup finds nothing
    pub fn unnamed(location: Point) -> Self {
        Self {
            location,
            name: String::new(),
        }
    }

    #[inline]
    pub fn is_named(&self) -> bool {
        !self.name.is_empty()
    }
}

/// A chat message attached to a location
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteNote {
    pub location: Point,
    pub message: String,
}

impl RouteNote {
    pub fn new(location: Point, message: impl Into<String>) -> Self {
        Self {
            location,
            message: message.into(),
        }
    }
}

/// Aggregate of one completed RecordRoute session
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteSummary {
    /// Number of points received
    pub point_count: i32,
    /// Number of received points that matched a stored feature location
    pub feature_count: i32,
    /// Sum of the distances between consecutive points, in whole meters
    pub distance: i32,
    /// Whole seconds between the session start and the end of input
    pub elapsed_time: i32,
}
