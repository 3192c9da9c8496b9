use crate::core::geo::{normalize_lng, LatLng};
use serde::{Deserialize, Serialize};

/// Geographic edges of the visible map region, in degrees.
///
/// `west > east` means the region wraps across the antimeridian.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewBounds {
    pub north: f64,
    pub south: f64,
    pub west: f64,
    pub east: f64,
}

impl ViewBounds {
    pub fn new(north: f64, south: f64, west: f64, east: f64) -> Self {
        Self {
            north,
            south,
            west,
            east,
        }
    }

    /// Returns a copy with both longitudes wrapped and north/south ordered.
    pub fn normalized(&self) -> Self {
        Self {
            north: self.north.max(self.south),
            south: self.north.min(self.south),
            west: normalize_lng(self.west),
            east: normalize_lng(self.east),
        }
    }

    /// Checks whether the bounds wrap across the ±180° line
    pub fn crosses_antimeridian(&self) -> bool {
        let n = self.normalized();
        n.west > n.east
    }

    /// Splits the longitude range into contiguous `(west, east)` spans.
    ///
    /// A crossing range yields `[west, 180]` followed by `[-180, east]`.
    pub fn lng_spans(&self) -> Vec<(f64, f64)> {
        let n = self.normalized();
        if n.west > n.east {
            vec![(n.west, 180.0), (-180.0, n.east)]
        } else {
            vec![(n.west, n.east)]
        }
    }

    /// Width of the longitude range in degrees, measured eastward from `west`.
    pub fn lng_width(&self) -> f64 {
        let n = self.normalized();
        if n.west > n.east {
            n.east + 360.0 - n.west
        } else {
            n.east - n.west
        }
    }

    /// Gets the center point of the bounds
    pub fn center(&self) -> LatLng {
        let n = self.normalized();
        LatLng::new(
            (n.north + n.south) / 2.0,
            normalize_lng(n.west + self.lng_width() / 2.0),
        )
    }
}

/// The visible map region plus its zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub bounds: ViewBounds,
    pub zoom: f64,
}

impl Viewport {
    /// Creates a new viewport
    pub fn new(bounds: ViewBounds, zoom: f64) -> Self {
        Self { bounds, zoom }
    }

    pub fn center(&self) -> LatLng {
        self.bounds.center()
    }

    pub fn crosses_antimeridian(&self) -> bool {
        self.bounds.crosses_antimeridian()
    }
}
