//! Configuration system for feed access, throttling and marker density
//!
//! Every group has a `Default` carrying the engine's standard values.
//! [`HazardMapConfig::from_env`] overlays `HAZARDMAP_*` environment variables
//! on top of those defaults, and a couple of presets cover common densities.

use crate::core::constants::{
    DEFAULT_BACKOFF, MAX_QUERY_TILES, MIN_FETCH_INTERVAL, VIEW_CHANGE_DEBOUNCE,
    WARNING_POLL_INTERVAL,
};
use crate::data::radar::RadarSource;
use crate::feeds::environment::EnvironmentMode;
use crate::{Error, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct HazardMapConfig {
    pub feeds: FeedConfig,
    pub throttle: ThrottleConfig,
    pub scheduling: SchedulingConfig,
    pub clustering: ClusterRadii,
    pub radar: RadarFilterConfig,
    pub radar_source: Option<RadarSource>,
}

impl Default for HazardMapConfig {
    fn default() -> Self {
        Self {
            feeds: FeedConfig::default(),
            throttle: ThrottleConfig::default(),
            scheduling: SchedulingConfig::default(),
            clustering: ClusterRadii::default(),
            radar: RadarFilterConfig::default(),
            radar_source: None,
        }
    }
}

impl HazardMapConfig {
    /// Tighter radii and a larger budget for dense urban datasets
    pub fn dense_city() -> Self {
        Self {
            clustering: ClusterRadii {
                alert_radius_m: 120.0,
                radar_radius_m: 60.0,
                warning_radius_m: 120.0,
            },
            radar: RadarFilterConfig {
                padding_m: 800.0,
                min_zoom: 12.0,
                max_visible: 800,
            },
            ..Self::default()
        }
    }

    /// Wider radii and an earlier zoom floor for sparse rural coverage
    pub fn sparse_region() -> Self {
        Self {
            clustering: ClusterRadii {
                alert_radius_m: 600.0,
                radar_radius_m: 400.0,
                warning_radius_m: 600.0,
            },
            radar: RadarFilterConfig {
                padding_m: 5_000.0,
                min_zoom: 8.0,
                max_visible: 250,
            },
            ..Self::default()
        }
    }

    /// Defaults overlaid with `HAZARDMAP_*` variables from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get("HAZARDMAP_ALERT_URL") {
            config.feeds.alert_url = url;
        }
        config.feeds.warning_url = get("HAZARDMAP_WARNING_URL");
        config.feeds.warning_token = get("HAZARDMAP_WARNING_TOKEN");
        if let Some(mode) = get("HAZARDMAP_ENV") {
            config.feeds.environment = mode.parse()?;
        }
        if let Some(secs) = get("HAZARDMAP_WARNING_POLL_SECS") {
            config.feeds.warning_poll_interval =
                Duration::from_secs(parse_nonzero("HAZARDMAP_WARNING_POLL_SECS", &secs)?);
        }
        if let Some(max) = get("HAZARDMAP_MAX_QUERY_TILES") {
            config.throttle.max_query_tiles = parse_nonzero("HAZARDMAP_MAX_QUERY_TILES", &max)?;
        }
        if let Some(ms) = get("HAZARDMAP_MIN_FETCH_INTERVAL_MS") {
            config.throttle.min_interval =
                Duration::from_millis(parse_var("HAZARDMAP_MIN_FETCH_INTERVAL_MS", &ms)?);
        }
        if let Some(ms) = get("HAZARDMAP_DEBOUNCE_MS") {
            config.scheduling.debounce =
                Duration::from_millis(parse_var("HAZARDMAP_DEBOUNCE_MS", &ms)?);
        }
        if let Some(radius) = get("HAZARDMAP_ALERT_RADIUS_M") {
            config.clustering.alert_radius_m = parse_var("HAZARDMAP_ALERT_RADIUS_M", &radius)?;
        }
        if let Some(radius) = get("HAZARDMAP_RADAR_RADIUS_M") {
            config.clustering.radar_radius_m = parse_var("HAZARDMAP_RADAR_RADIUS_M", &radius)?;
        }
        if let Some(max) = get("HAZARDMAP_RADAR_MAX_VISIBLE") {
            config.radar.max_visible = parse_var("HAZARDMAP_RADAR_MAX_VISIBLE", &max)?;
        }
        if let Some(zoom) = get("HAZARDMAP_RADAR_MIN_ZOOM") {
            config.radar.min_zoom = parse_var("HAZARDMAP_RADAR_MIN_ZOOM", &zoom)?;
        }
        if let Some(path) = get("HAZARDMAP_RADAR_PATH") {
            config.radar_source = Some(RadarSource::File(PathBuf::from(path)));
        } else if let Some(url) = get("HAZARDMAP_RADAR_URL") {
            config.radar_source = Some(RadarSource::Url(url));
        }

        Ok(config)
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{} has an invalid value '{}'", key, value)))
}

/// Like [`parse_var`], but zero is rejected too.
fn parse_nonzero<T: FromStr + PartialEq + Default>(key: &str, value: &str) -> Result<T> {
    let parsed: T = parse_var(key, value)?;
    if parsed == T::default() {
        return Err(Error::Config(format!("{} must be greater than zero", key)));
    }
    Ok(parsed)
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeedConfig {
    /// Alert feed endpoint queried with `env/top/bottom/left/right`
    pub alert_url: String,
    /// Primary warning feed endpoint; the poller stays off without it
    pub warning_url: Option<String>,
    /// Bearer credential for the warning feed
    pub warning_token: Option<String>,
    pub environment: EnvironmentMode,
    pub warning_poll_interval: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            alert_url: "http://localhost:8080/api/alerts".to_string(),
            warning_url: None,
            warning_token: None,
            environment: EnvironmentMode::Auto,
            warning_poll_interval: WARNING_POLL_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThrottleConfig {
    pub min_interval: Duration,
    pub default_backoff: Duration,
    pub max_query_tiles: usize,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            min_interval: MIN_FETCH_INTERVAL,
            default_backoff: DEFAULT_BACKOFF,
            max_query_tiles: MAX_QUERY_TILES,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchedulingConfig {
    pub debounce: Duration,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            debounce: VIEW_CHANGE_DEBOUNCE,
        }
    }
}

/// Clustering radii in meters, per point family
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterRadii {
    pub alert_radius_m: f64,
    pub radar_radius_m: f64,
    pub warning_radius_m: f64,
}

impl Default for ClusterRadii {
    fn default() -> Self {
        Self {
            alert_radius_m: 250.0,
            radar_radius_m: 150.0,
            warning_radius_m: 250.0,
        }
    }
}

/// Visibility rules for the static radar dataset
#[derive(Debug, Clone, PartialEq)]
pub struct RadarFilterConfig {
    /// Extra margin around the viewport, in meters
    pub padding_m: f64,
    /// Below this zoom nothing is shown
    pub min_zoom: f64,
    /// More matches than this and nothing is shown
    pub max_visible: usize,
}

impl Default for RadarFilterConfig {
    fn default() -> Self {
        Self {
            padding_m: 1_500.0,
            min_zoom: 10.0,
            max_visible: 400,
        }
    }
}
