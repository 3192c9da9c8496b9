use crate::core::constants::{EARTH_RADIUS_M, MAX_LATITUDE};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Represents a geographical coordinate with latitude and longitude
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    /// Creates a new LatLng coordinate
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Validates that both components are finite and within valid ranges
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }

    /// Great-circle distance to another coordinate in meters
    pub fn distance_to(&self, other: &LatLng) -> f64 {
        haversine_meters(self, other)
    }
}

impl Default for LatLng {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// Great-circle distance between two points on a spherical earth, in meters.
pub fn haversine_meters(a: &LatLng, b: &LatLng) -> f64 {
    let lat1_rad = a.lat.to_radians();
    let lat2_rad = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);

    // Rounding can push h a hair above 1 for antipodal points.
    2.0 * EARTH_RADIUS_M * h.min(1.0).sqrt().asin()
}

/// Wraps a longitude into `[-180, 180)`. `180` itself is left as `180`.
pub fn normalize_lng(lng: f64) -> f64 {
    if lng == 180.0 || !lng.is_finite() {
        return lng;
    }
    (lng + 180.0).rem_euclid(360.0) - 180.0
}

/// Clamps latitude to the Web Mercator band
pub fn clamp_lat(lat: f64) -> f64 {
    lat.clamp(-MAX_LATITUDE, MAX_LATITUDE)
}

fn tiles_per_axis(zoom: u8) -> f64 {
    2_f64.powi(zoom as i32)
}

/// Column of the slippy-map tile containing `lng` at `zoom`.
pub fn lng_to_tile_x(lng: f64, zoom: u8) -> u32 {
    let n = tiles_per_axis(zoom);
    let x = ((lng + 180.0) / 360.0 * n).floor();
    x.clamp(0.0, n - 1.0) as u32
}

/// Row of the slippy-map tile containing `lat` at `zoom`.
pub fn lat_to_tile_y(lat: f64, zoom: u8) -> u32 {
    let n = tiles_per_axis(zoom);
    let lat_rad = clamp_lat(lat).to_radians();
    let y = ((1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0 * n).floor();
    y.clamp(0.0, n - 1.0) as u32
}

/// Longitude of the west edge of tile column `x`.
pub fn tile_x_to_lng(x: u32, zoom: u8) -> f64 {
    x as f64 / tiles_per_axis(zoom) * 360.0 - 180.0
}

/// Latitude of the north edge of tile row `y`.
pub fn tile_y_to_lat(y: u32, zoom: u8) -> f64 {
    let n = tiles_per_axis(zoom);
    (PI * (1.0 - 2.0 * y as f64 / n)).sinh().atan().to_degrees()
}

/// Represents a tile coordinate in the slippy map tile system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    pub x: u32,
    pub y: u32,
    pub z: u8,
}

impl TileCoord {
    pub fn new(x: u32, y: u32, z: u8) -> Self {
        Self { x, y, z }
    }

    /// Creates a tile coordinate from a LatLng and zoom level
    pub fn from_lat_lng(lat_lng: &LatLng, zoom: u8) -> Self {
        Self::new(
            lng_to_tile_x(lat_lng.lng, zoom),
            lat_to_tile_y(lat_lng.lat, zoom),
            zoom,
        )
    }

    /// Converts tile coordinate to LatLng (northwest corner)
    pub fn to_lat_lng(&self) -> LatLng {
        LatLng::new(tile_y_to_lat(self.y, self.z), tile_x_to_lng(self.x, self.z))
    }

    /// Checks if the tile is valid for the given zoom level
    pub fn is_valid(&self) -> bool {
        let max_coord = 2_u64.pow(self.z as u32);
        (self.x as u64) < max_coord && (self.y as u64) < max_coord
    }
}
