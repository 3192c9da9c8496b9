//! Query deduplication and rate limiting for the alert feed.
//!
//! [`RateLimitState`] is a single-owner record. Every check and every update
//! takes an explicit `now_ms`, so the gating rules can be exercised without
//! a live timer.

use crate::core::config::ThrottleConfig;
use crate::core::constants::QUERY_KEY_PRECISION;
use crate::feeds::environment::Environment;
use crate::tiles::planner::TileBox;
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::time::Duration;

/// Process-lifetime throttle bookkeeping for one feed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitState {
    /// No request may start before this instant (epoch ms)
    pub backoff_until: u64,
    /// When the last successful fetch completed, if any
    pub last_fetch_at: Option<u64>,
    /// Canonical key of the last query that was let through
    pub last_query_key: Option<String>,
    /// Generation of the cycle still fetching `last_query_key`, or `None`
    /// once that fetch has completed
    #[serde(default)]
    pub key_owner: Option<u64>,
}

/// What the gate decided for a cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Go ahead; the key has already been recorded
    Proceed { key: String },
    /// A server-requested cooldown is still running
    CoolingDown { remaining_secs: u64 },
    /// Too soon after the last fetch. Not a failure.
    Throttled,
    /// Same boxes and environment as the last query
    Unchanged,
}

impl RateLimitState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies the cooldown, interval and dedup rules in that order.
    ///
    /// On `Proceed` the key is stored immediately, owned by `generation`, so
    /// a second cycle of the same generation with the same query is
    /// suppressed while the first is still in flight. A key left behind by
    /// a superseded generation that never completed does not suppress
    /// anything.
    pub fn check(
        &mut self,
        generation: u64,
        now_ms: u64,
        boxes: &[TileBox],
        env: Environment,
        config: &ThrottleConfig,
    ) -> GateDecision {
        if now_ms < self.backoff_until {
            let remaining = self.backoff_until - now_ms;
            return GateDecision::CoolingDown {
                remaining_secs: remaining.div_ceil(1000),
            };
        }

        if let Some(last) = self.last_fetch_at {
            if now_ms.saturating_sub(last) < config.min_interval.as_millis() as u64 {
                return GateDecision::Throttled;
            }
        }

        let key = query_key(boxes, env);
        if self.last_query_key.as_deref() == Some(key.as_str()) {
            match self.key_owner {
                None => return GateDecision::Unchanged,
                Some(owner) if owner == generation => return GateDecision::Unchanged,
                Some(owner) => log::debug!("retrying query abandoned by cycle {}", owner),
            }
        }

        self.last_query_key = Some(key.clone());
        self.key_owner = Some(generation);
        GateDecision::Proceed { key }
    }

    pub fn record_success(&mut self, now_ms: u64) {
        self.last_fetch_at = Some(now_ms);
        self.key_owner = None;
    }

    /// Starts a cooldown from a 429's retry directive and returns its length.
    pub fn record_rate_limited(
        &mut self,
        now_ms: u64,
        retry_after: Option<&str>,
        config: &ThrottleConfig,
    ) -> Duration {
        let wait = parse_retry_after(retry_after, now_ms, config.default_backoff);
        let wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX);
        self.backoff_until = now_ms.saturating_add(wait_ms);
        self.last_query_key = None;
        self.key_owner = None;
        wait
    }

    /// Forgets the in-flight key so a failed query can be retried later.
    pub fn record_failure(&mut self) {
        self.last_query_key = None;
        self.key_owner = None;
    }

    /// Remaining cooldown in whole seconds, rounded up
    pub fn remaining_backoff_secs(&self, now_ms: u64) -> u64 {
        self.backoff_until.saturating_sub(now_ms).div_ceil(1000)
    }
}

fn canonical_edge(value: f64) -> f64 {
    let scale = 10_f64.powi(QUERY_KEY_PRECISION);
    // Adding 0.0 folds -0.0 into 0.0 so both print the same.
    (value * scale).round() / scale + 0.0
}

/// Canonical, comparable key for a set of request boxes in an environment.
pub fn query_key(boxes: &[TileBox], env: Environment) -> String {
    let precision = QUERY_KEY_PRECISION as usize;
    let mut key = String::with_capacity(boxes.len() * 48 + 4);
    for (i, b) in boxes.iter().enumerate() {
        if i > 0 {
            key.push('|');
        }
        let _ = write!(
            key,
            "{:.p$},{:.p$},{:.p$},{:.p$}",
            canonical_edge(b.top),
            canonical_edge(b.bottom),
            canonical_edge(b.left),
            canonical_edge(b.right),
            p = precision
        );
    }
    key.push('@');
    key.push_str(env.tag());
    key
}

/// Interprets a retry directive: whole or fractional seconds, an HTTP date,
/// or anything else which falls back to `default`.
pub fn parse_retry_after(value: Option<&str>, now_ms: u64, default: Duration) -> Duration {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return default;
    };

    if let Ok(secs) = value.parse::<f64>() {
        if secs.is_finite() {
            let millis = (secs.max(0.0) * 1000.0).min(u64::MAX as f64);
            return Duration::from_millis(millis as u64);
        }
        return default;
    }

    match DateTime::parse_from_rfc2822(value) {
        Ok(date) => {
            let target = date.timestamp_millis();
            let wait = (target - now_ms as i64).max(0);
            Duration::from_millis(wait as u64)
        }
        Err(_) => default,
    }
}

/// Countdown message shown while a cooldown is running
pub fn cooldown_message(remaining_secs: u64) -> String {
    format!(
        "Alert feed is rate limited, retrying in {}s",
        remaining_secs
    )
}
