//! Primary warning feed: user-submitted reports polled on a fixed interval.

use crate::core::geo::LatLng;
use crate::feeds::source::{check_status, HTTP_CLIENT};
use crate::prelude::HashMap;
use crate::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// One report from the warning feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarningReport {
    pub user_id: String,
    pub url: String,
    pub point: LatLng,
    pub created: String,
}

fn scalar_to_string(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

impl WarningReport {
    /// Shape-checks one entry. `point` must be a `[lat, lng]` pair of numbers.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let point = object.get("point")?.as_array()?;
        if point.len() != 2 {
            return None;
        }
        let lat = point[0].as_f64().filter(|v| v.is_finite())?;
        let lng = point[1].as_f64().filter(|v| v.is_finite())?;

        Some(Self {
            user_id: scalar_to_string(object.get("userId")),
            url: scalar_to_string(object.get("url")),
            point: LatLng::new(lat, lng),
            created: scalar_to_string(object.get("created")),
        })
    }

    /// `userId-url-created`
    pub fn identity_key(&self) -> String {
        format!("{}-{}-{}", self.user_id, self.url, self.created)
    }
}

/// Parses a warning feed body, dropping malformed entries and duplicates
/// (last occurrence wins).
pub fn parse_warnings(body: &Value) -> Result<Vec<WarningReport>> {
    let entries = body
        .as_array()
        .ok_or_else(|| Error::Parse("warning feed body is not an array".to_string()))?;

    let mut slots: HashMap<String, usize> = HashMap::default();
    let mut reports: Vec<WarningReport> = Vec::with_capacity(entries.len());
    for report in entries.iter().filter_map(WarningReport::from_value) {
        let key = report.identity_key();
        match slots.get(&key) {
            Some(&slot) => reports[slot] = report,
            None => {
                slots.insert(key, reports.len());
                reports.push(report);
            }
        }
    }
    Ok(reports)
}

/// Anything that can return the current warning set
#[async_trait]
pub trait WarningSource: Send + Sync {
    async fn fetch_warnings(&self) -> Result<Vec<WarningReport>>;
}

/// Warning feed over HTTP with a bearer credential
#[derive(Debug, Clone)]
pub struct HttpWarningSource {
    url: String,
    token: Option<String>,
}

impl HttpWarningSource {
    pub fn new(url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            url: url.into(),
            token,
        }
    }
}

#[async_trait]
impl WarningSource for HttpWarningSource {
    async fn fetch_warnings(&self) -> Result<Vec<WarningReport>> {
        let token = self
            .token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| Error::Config("warning feed credential is not set".to_string()))?;

        let response = HTTP_CLIENT
            .get(&self.url)
            .bearer_auth(token)
            .send()
            .await?;
        check_status(&response)?;

        let body: Value = response.json().await?;
        parse_warnings(&body)
    }
}

/// Polls a [`WarningSource`] and hands each successful set to `publish`.
pub struct WarningPoller {
    source: Arc<dyn WarningSource>,
    interval: Duration,
}

impl WarningPoller {
    pub fn new(source: Arc<dyn WarningSource>, interval: Duration) -> Self {
        Self { source, interval }
    }

    /// Polls until a configuration error occurs or the task is dropped.
    ///
    /// Transport failures keep the previous set and wait for the next tick.
    /// Missing configuration stops the loop: it cannot fix itself.
    pub async fn run(self, mut publish: impl FnMut(PollEvent) + Send) {
        if self.interval.is_zero() {
            let message = "warning poll interval must be greater than zero".to_string();
            log::error!("warning feed disabled: {}", message);
            publish(PollEvent::Disabled(message));
            return;
        }

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match self.source.fetch_warnings().await {
                Ok(reports) => {
                    log::info!("warning feed returned {} report(s)", reports.len());
                    publish(PollEvent::Reports(reports));
                }
                Err(Error::Config(message)) => {
                    log::error!("warning feed disabled: {}", message);
                    publish(PollEvent::Disabled(message));
                    return;
                }
                Err(err) => {
                    log::warn!("warning feed poll failed: {}", err);
                    publish(PollEvent::Failed(err.to_string()));
                }
            }
        }
    }
}

/// What a single poll produced
#[derive(Debug, Clone, PartialEq)]
pub enum PollEvent {
    Reports(Vec<WarningReport>),
    Failed(String),
    Disabled(String),
}
