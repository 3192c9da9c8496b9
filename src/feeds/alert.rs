use crate::core::geo::LatLng;
use crate::prelude::HashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A live hazard alert with a valid location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub uuid: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub subtype: String,
    pub street: Option<String>,
    pub city: Option<String>,
    pub pub_millis: Option<i64>,
    pub location: LatLng,
}

/// Alert entry as it appears on the wire. Every field is optional so one bad
/// row never fails the whole response.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAlert {
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub street: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub pub_millis: Option<Value>,
    #[serde(default)]
    pub location: Option<RawLocation>,
}

/// `{x: lng, y: lat}` as sent by the feed
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawLocation {
    #[serde(default)]
    pub x: Option<Value>,
    #[serde(default)]
    pub y: Option<Value>,
}

/// Response body of one alert feed query
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlertsResponse {
    #[serde(default)]
    pub alerts: Vec<Value>,
}

fn finite_number(value: &Option<Value>) -> Option<f64> {
    value.as_ref()?.as_f64().filter(|v| v.is_finite())
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl Alert {
    /// Builds an alert from a wire entry, or `None` if it has no numeric location.
    pub fn from_raw(raw: RawAlert) -> Option<Self> {
        let location = raw.location.as_ref()?;
        let lng = finite_number(&location.x)?;
        let lat = finite_number(&location.y)?;

        let pub_millis = raw
            .pub_millis
            .as_ref()
            .and_then(Value::as_f64)
            .filter(|v| v.is_finite())
            .map(|v| v as i64);

        let mut alert = Self {
            id: String::new(),
            uuid: raw.uuid.filter(|u| !u.is_empty()),
            kind: raw.kind.unwrap_or_default(),
            subtype: raw.subtype.unwrap_or_default(),
            street: raw.street,
            city: raw.city,
            pub_millis,
            location: LatLng::new(lat, lng),
        };
        alert.id = raw
            .id
            .as_ref()
            .and_then(value_to_string)
            .unwrap_or_else(|| alert.identity_key());
        Some(alert)
    }

    /// Parses one loose JSON entry, skipping anything that does not fit.
    pub fn from_value(value: Value) -> Option<Self> {
        serde_json::from_value::<RawAlert>(value)
            .ok()
            .and_then(Self::from_raw)
    }

    /// `uuid` when present, otherwise type, location and timestamp combined.
    pub fn identity_key(&self) -> String {
        match &self.uuid {
            Some(uuid) => uuid.clone(),
            None => format!(
                "{}:{:.6}:{:.6}:{}",
                self.kind,
                self.location.lat,
                self.location.lng,
                self.pub_millis.unwrap_or(0)
            ),
        }
    }

    /// Human readable label, e.g. `"ACCIDENT / ACCIDENT_MAJOR"`
    pub fn label(&self) -> String {
        if self.subtype.is_empty() {
            self.kind.clone()
        } else {
            format!("{} / {}", self.kind, self.subtype)
        }
    }
}

/// Collapses alerts sharing an identity key. The last occurrence wins and
/// keeps the slot of the first.
pub fn dedupe_alerts(alerts: impl IntoIterator<Item = Alert>) -> Vec<Alert> {
    let mut slots: HashMap<String, usize> = HashMap::default();
    let mut out: Vec<Alert> = Vec::new();

    for alert in alerts {
        let key = alert.identity_key();
        match slots.get(&key) {
            Some(&slot) => out[slot] = alert,
            None => {
                slots.insert(key, out.len());
                out.push(alert);
            }
        }
    }
    out
}
