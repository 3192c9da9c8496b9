//! Region tag selection for alert feed queries.
//!
//! In `Auto` mode the tag is inferred from the viewport center with a plain
//! lat/lng box test. This is a heuristic for picking a feed partition and is
//! not meant as authoritative geofencing.

use crate::core::geo::LatLng;
use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Feed partition queried for a viewport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Environment {
    NorthAmerica,
    RestOfWorld,
}

impl Environment {
    /// Tag sent as the `env` query parameter
    pub fn tag(&self) -> &'static str {
        match self {
            Self::NorthAmerica => "na",
            Self::RestOfWorld => "row",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// How the environment tag is chosen for each cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EnvironmentMode {
    #[default]
    Auto,
    Fixed(Environment),
}

impl EnvironmentMode {
    /// Resolves the tag for a viewport centered on `center`.
    pub fn resolve(&self, center: &LatLng) -> Environment {
        match self {
            Self::Fixed(env) => *env,
            Self::Auto => {
                let in_lng = (-170.0..=-30.0).contains(&center.lng);
                let in_lat = (5.0..=85.0).contains(&center.lat);
                if in_lng && in_lat {
                    Environment::NorthAmerica
                } else {
                    Environment::RestOfWorld
                }
            }
        }
    }
}

impl FromStr for EnvironmentMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" | "" => Ok(Self::Auto),
            "na" => Ok(Self::Fixed(Environment::NorthAmerica)),
            "row" => Ok(Self::Fixed(Environment::RestOfWorld)),
            other => Err(Error::Config(format!(
                "unknown environment mode '{}', expected auto, na or row",
                other
            ))),
        }
    }
}
