//! Viewport to tile-aligned query boxes.
//!
//! A viewport is snapped outward to the slippy-map tiles that cover it. Each
//! contiguous longitude span becomes one union box, which is what actually
//! gets requested from the alert feed. If the covering tiles at the requested
//! zoom exceed [`MAX_QUERY_TILES`], the planner steps down one zoom level at a
//! time until the plan fits.

use crate::core::constants::{
    EAST_EDGE_LIMIT, MAX_LATITUDE, MAX_QUERY_TILES, MAX_QUERY_ZOOM, SOUTH_EDGE_EPSILON,
};
use crate::core::geo::{clamp_lat, lat_to_tile_y, lng_to_tile_x, tile_x_to_lng, tile_y_to_lat};
use crate::core::viewport::Viewport;
use serde::{Deserialize, Serialize};

/// A box in degrees whose edges sit on tile boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TileBox {
    pub top: f64,
    pub bottom: f64,
    pub left: f64,
    pub right: f64,
}

impl TileBox {
    pub fn new(top: f64, bottom: f64, left: f64, right: f64) -> Self {
        Self {
            top,
            bottom,
            left,
            right,
        }
    }

    /// Box covering tile columns `x_min..=x_max` and rows `y_min..=y_max`.
    pub fn from_tile_range(x_min: u32, x_max: u32, y_min: u32, y_max: u32, zoom: u8) -> Self {
        Self::new(
            tile_y_to_lat(y_min, zoom),
            tile_y_to_lat(y_max + 1, zoom),
            tile_x_to_lng(x_min, zoom),
            tile_x_to_lng(x_max + 1, zoom),
        )
    }
}

/// Result of planning a viewport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryPlan {
    /// One union box per longitude span. These are the boxes that get queried.
    pub request_boxes: Vec<TileBox>,
    /// Every individual tile behind the union boxes, for diagnostic overlays.
    pub debug_boxes: Vec<TileBox>,
    /// Zoom the boxes were snapped at.
    pub used_zoom: u8,
}

impl QueryPlan {
    /// Number of individual tiles the plan covers
    pub fn tile_count(&self) -> usize {
        self.debug_boxes.len()
    }
}

/// Inclusive tile index ranges for one longitude span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TileRange {
    x_min: u32,
    x_max: u32,
    y_min: u32,
    y_max: u32,
}

impl TileRange {
    fn tile_count(&self) -> usize {
        (self.x_max - self.x_min + 1) as usize * (self.y_max - self.y_min + 1) as usize
    }
}

/// Plans tile-aligned request boxes for a viewport.
#[derive(Debug, Clone)]
pub struct TileQueryPlanner {
    max_tiles: usize,
    max_zoom: u8,
}

impl Default for TileQueryPlanner {
    fn default() -> Self {
        Self::new(MAX_QUERY_TILES)
    }
}

impl TileQueryPlanner {
    pub fn new(max_tiles: usize) -> Self {
        Self {
            max_tiles: max_tiles.max(1),
            max_zoom: MAX_QUERY_ZOOM,
        }
    }

    pub fn max_tiles(&self) -> usize {
        self.max_tiles
    }

    /// Plans the viewport at the highest zoom not above its own whose tile
    /// count fits the cap. Zoom 0 is returned even when it does not fit.
    pub fn plan(&self, viewport: &Viewport) -> QueryPlan {
        let requested = if viewport.zoom.is_finite() {
            viewport.zoom.round().clamp(0.0, self.max_zoom as f64) as u8
        } else {
            0
        };

        let mut zoom = requested;
        loop {
            let plan = self.plan_at_zoom(viewport, zoom);
            if plan.tile_count() <= self.max_tiles || zoom == 0 {
                if zoom < requested {
                    log::debug!(
                        "query plan reduced from z{} to z{} ({} tiles)",
                        requested,
                        zoom,
                        plan.tile_count()
                    );
                }
                return plan;
            }
            zoom -= 1;
        }
    }

    /// Builds the plan at exactly `zoom`, regardless of the tile cap.
    pub fn plan_at_zoom(&self, viewport: &Viewport, zoom: u8) -> QueryPlan {
        let bounds = viewport.bounds.normalized();
        let north = clamp_lat(bounds.north);
        let south = clamp_lat(bounds.south);

        let mut request_boxes = Vec::new();
        let mut debug_boxes = Vec::new();

        for (west, east) in viewport.bounds.lng_spans() {
            let range = Self::tile_range(north, south, west, east, zoom);
            request_boxes.push(TileBox::from_tile_range(
                range.x_min,
                range.x_max,
                range.y_min,
                range.y_max,
                zoom,
            ));

            debug_boxes.reserve(range.tile_count());
            for y in range.y_min..=range.y_max {
                for x in range.x_min..=range.x_max {
                    debug_boxes.push(TileBox::from_tile_range(x, x, y, y, zoom));
                }
            }
        }

        QueryPlan {
            request_boxes,
            debug_boxes,
            used_zoom: zoom,
        }
    }

    fn tile_range(north: f64, south: f64, west: f64, east: f64, zoom: u8) -> TileRange {
        // Edges sitting exactly on the world limit would index one tile past the end.
        let east = if east >= 180.0 { EAST_EDGE_LIMIT } else { east };
        let south = if south <= -MAX_LATITUDE {
            -MAX_LATITUDE + SOUTH_EDGE_EPSILON
        } else {
            south
        };

        let (x_a, x_b) = (lng_to_tile_x(west, zoom), lng_to_tile_x(east, zoom));
        let (y_a, y_b) = (lat_to_tile_y(north, zoom), lat_to_tile_y(south, zoom));

        TileRange {
            x_min: x_a.min(x_b),
            x_max: x_a.max(x_b),
            y_min: y_a.min(y_b),
            y_max: y_a.max(y_b),
        }
    }
}

/// Plans a viewport with the default tile cap.
pub fn plan_query(viewport: &Viewport) -> QueryPlan {
    TileQueryPlanner::default().plan(viewport)
}
