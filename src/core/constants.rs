//! Core constants for the query planner, throttle and point filters.
//! Keeping them in a single place makes it easier to tweak engine-wide magic numbers.

use std::time::Duration;

/// Mean earth radius used by the haversine distance, in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Web Mercator latitude limit. Tile math is undefined beyond it.
pub const MAX_LATITUDE: f64 = 85.051_128_78;

/// Meters spanned by one degree of latitude (and of longitude at the equator).
pub const METERS_PER_DEGREE: f64 = 111_320.0;

/// Floor for the cosine factor when converting meters to longitude degrees.
pub const MIN_LNG_SCALE: f64 = 0.15;

/// Highest zoom the query planner will plan at.
pub const MAX_QUERY_ZOOM: u8 = 22;

/// Upper bound on individual tiles a single query plan may cover.
pub const MAX_QUERY_TILES: usize = 24;

/// East edges at the antimeridian are pulled in to this value before tile indexing.
pub const EAST_EDGE_LIMIT: f64 = 179.999_999;

/// Nudge applied to a south edge sitting exactly on the Mercator limit.
pub const SOUTH_EDGE_EPSILON: f64 = 1e-6;

/// Decimal places kept per edge when building a canonical query key.
pub const QUERY_KEY_PRECISION: i32 = 5;

/// Minimum spacing between two alert feed requests.
pub const MIN_FETCH_INTERVAL: Duration = Duration::from_millis(2_500);

/// Cooldown used when a 429 carries no usable retry directive.
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(30);

/// Quiet period after the last view change before a fetch cycle starts.
pub const VIEW_CHANGE_DEBOUNCE: Duration = Duration::from_millis(650);

/// Poll interval for the primary warning feed.
pub const WARNING_POLL_INTERVAL: Duration = Duration::from_secs(60);
