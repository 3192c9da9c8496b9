//! # hazardmap
//!
//! Viewport-driven hazard alert querying and marker clustering.
//!
//! The crate turns a map viewport into a small set of tile-aligned bounding
//! box queries against a rate-limited alert feed, gates those queries behind
//! deduplication and backoff, and clusters the returned alerts (and a large
//! static point dataset) into renderable markers under a visible-point budget.

pub mod background;
pub mod core;
pub mod data;
pub mod feeds;
pub mod prelude;
pub mod spatial;
pub mod tiles;
pub use crate::core::constants;

// Re-export public API
pub use core::{
    config::HazardMapConfig,
    geo::{LatLng, TileCoord},
    viewport::{ViewBounds, Viewport},
};

pub use tiles::planner::{QueryPlan, TileBox, TileQueryPlanner};

pub use feeds::{
    alert::Alert,
    environment::{Environment, EnvironmentMode},
    orchestrator::{AlertFetchOrchestrator, CycleOutcome},
    throttle::RateLimitState,
    warnings::WarningReport,
};

pub use spatial::{
    clustering::{Cluster, Clusterable, Clustering},
    filter::{RadarView, ViewportPointFilter},
};

pub use data::radar::{RadarDataset, RadarPoint};

pub use background::markers::{MarkerService, MarkerUpdate};

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types
#[derive(Debug, thiserror::Error)]
pub enum HazardMapError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP {status}")]
    Http { status: u16 },

    #[error("Rate limited (retry directive: {})", retry_after.as_deref().unwrap_or("none"))]
    RateLimited { retry_after: Option<String> },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl HazardMapError {
    /// Whether the upstream asked us to slow down (HTTP 429)
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

/// Error type alias for convenience
pub type Error = HazardMapError;
