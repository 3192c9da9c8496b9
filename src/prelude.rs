//! Prelude module for common hazardmap types and traits
//!
//! This module re-exports the most commonly used types, traits, and functions
//! for easy importing with `use hazardmap::prelude::*;`

pub use crate::core::{
    config::{
        ClusterRadii, FeedConfig, HazardMapConfig, RadarFilterConfig, SchedulingConfig,
        ThrottleConfig,
    },
    geo::{haversine_meters, normalize_lng, LatLng, TileCoord},
    time::{Clock, ManualClock, SystemClock},
    viewport::{ViewBounds, Viewport},
};

pub use crate::tiles::planner::{plan_query, QueryPlan, TileBox, TileQueryPlanner};

pub use crate::feeds::{
    alert::Alert,
    environment::{Environment, EnvironmentMode},
    orchestrator::{AlertFetchOrchestrator, CycleOutcome},
    source::{AlertSource, HttpAlertSource},
    throttle::{GateDecision, RateLimitState},
    warnings::{HttpWarningSource, WarningReport, WarningSource},
};

pub use crate::spatial::{
    clustering::{Cluster, Clusterable, Clustering, ClusteringConfig},
    filter::{RadarView, ViewportPointFilter},
    index::RadarIndex,
};

pub use crate::data::radar::{RadarDataset, RadarPoint, RadarSource};

pub use crate::background::{
    cycle::{CycleScheduler, CycleToken},
    markers::{MarkerService, MarkerUpdate},
};

pub use crate::{Error, HazardMapError, Result};

pub use fxhash::{FxHashMap as HashMap, FxHashSet as HashSet};
