//! Static speed-radar dataset.
//!
//! One record per line: `lng,lat,rest`, where `rest` holds an optional
//! double-quoted description followed by a bracketed identifier, e.g.
//! `12.34,56.78,"Main St"[abc123]`.

use crate::core::geo::LatLng;
use crate::feeds::source::{check_status, HTTP_CLIENT};
use crate::prelude::HashMap;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A fixed radar location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadarPoint {
    pub id: String,
    pub lat: f64,
    pub lng: f64,
    pub desc: String,
}

impl RadarPoint {
    pub fn position(&self) -> LatLng {
        LatLng::new(self.lat, self.lng)
    }

    /// Parses one dataset line, or `None` if it lacks coordinates or an id.
    pub fn parse_line(line: &str) -> Option<Self> {
        let mut fields = line.trim().splitn(3, ',');
        let lng = parse_coord(fields.next()?)?;
        let lat = parse_coord(fields.next()?)?;
        let rest = fields.next().unwrap_or("");

        let open = rest.rfind('[')?;
        let close = open + rest[open..].find(']')?;
        let id = rest[open + 1..close].trim();
        if id.is_empty() {
            return None;
        }

        Some(Self {
            id: id.to_string(),
            lat,
            lng,
            desc: quoted(&rest[..open]).unwrap_or_default(),
        })
    }
}

fn parse_coord(field: &str) -> Option<f64> {
    field.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Text between the first pair of double quotes
fn quoted(text: &str) -> Option<String> {
    let start = text.find('"')? + 1;
    let len = text[start..].find('"')?;
    Some(text[start..start + len].trim().to_string())
}

/// The whole dataset, loaded once and never mutated afterwards
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RadarDataset {
    points: Vec<RadarPoint>,
}

impl RadarDataset {
    /// Parses the line format, skipping bad lines. Duplicate ids collapse
    /// to their last occurrence.
    pub fn parse(text: &str) -> Self {
        let mut slots: HashMap<String, usize> = HashMap::default();
        let mut points: Vec<RadarPoint> = Vec::new();
        let mut skipped = 0usize;

        for line in text.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let Some(point) = RadarPoint::parse_line(line) else {
                skipped += 1;
                continue;
            };
            match slots.get(&point.id) {
                Some(&slot) => points[slot] = point,
                None => {
                    slots.insert(point.id.clone(), points.len());
                    points.push(point);
                }
            }
        }

        if skipped > 0 {
            log::debug!("skipped {} malformed radar line(s)", skipped);
        }
        Self { points }
    }

    pub fn points(&self) -> &[RadarPoint] {
        &self.points
    }

    pub fn into_points(self) -> Vec<RadarPoint> {
        self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Where the dataset comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadarSource {
    File(PathBuf),
    Url(String),
}

impl RadarSource {
    /// Reads and parses the dataset.
    pub async fn load(&self) -> Result<RadarDataset> {
        let text = match self {
            Self::File(path) => tokio::fs::read_to_string(path).await?,
            Self::Url(url) => {
                let response = HTTP_CLIENT.get(url).send().await?;
                check_status(&response)?;
                response.text().await?
            }
        };
        let dataset = RadarDataset::parse(&text);
        log::info!("loaded {} radar point(s) from {:?}", dataset.len(), self);
        Ok(dataset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_line() {
        let point = RadarPoint::parse_line("12.34,56.78,\"Main St\"[abc123]").unwrap();
        assert_eq!(
            point,
            RadarPoint {
                id: "abc123".to_string(),
                lat: 56.78,
                lng: 12.34,
                desc: "Main St".to_string(),
            }
        );
    }

    #[test]
    fn test_description_is_optional() {
        let point = RadarPoint::parse_line("-3.7, 40.4 ,[r-9]").unwrap();
        assert_eq!(point.id, "r-9");
        assert_eq!(point.desc, "");
        assert_eq!(point.position(), LatLng::new(40.4, -3.7));
    }

    #[test]
    fn test_description_may_contain_commas() {
        let point = RadarPoint::parse_line("1,2,\"A1, km 12\" [x]").unwrap();
        assert_eq!(point.desc, "A1, km 12");
        assert_eq!(point.id, "x");
    }

    #[test]
    fn test_bad_lines_are_skipped() {
        assert!(RadarPoint::parse_line("12.34,56.78,\"Main St\"").is_none());
        assert!(RadarPoint::parse_line("12.34,56.78,\"Main St\"[]").is_none());
        assert!(RadarPoint::parse_line("abc,56.78,[id]").is_none());
        assert!(RadarPoint::parse_line("12.34").is_none());
        assert!(RadarPoint::parse_line("12.34,56.78,[open").is_none());
    }

    #[test]
    fn test_dataset_duplicates_collapse_to_last() {
        let text = "1,1,\"first\"[a]\n\n2,2,\"other\"[b]\nbroken line\n3,3,\"second\"[a]\n";
        let dataset = RadarDataset::parse(text);
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.points()[0].id, "a");
        assert_eq!(dataset.points()[0].desc, "second");
        assert_eq!(dataset.points()[0].lat, 3.0);
        assert_eq!(dataset.points()[1].id, "b");
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("hazardmap-radar-{}.txt", std::process::id()));
        tokio::fs::write(&path, "10,20,\"Ring road\"[r1]\n11,21,[r2]\n")
            .await
            .unwrap();

        let dataset = RadarSource::File(path.clone()).load().await.unwrap();
        assert_eq!(dataset.len(), 2);
        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let source = RadarSource::File(PathBuf::from("/nonexistent/hazardmap/radars.txt"));
        assert!(matches!(source.load().await, Err(crate::Error::Io(_))));
    }
}
