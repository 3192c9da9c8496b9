//! Viewport filtering of the static point dataset under a visible budget.

use crate::core::config::RadarFilterConfig;
use crate::core::constants::{METERS_PER_DEGREE, MIN_LNG_SCALE};
use crate::core::geo::{normalize_lng, LatLng};
use crate::core::viewport::{ViewBounds, Viewport};
use crate::spatial::clustering::Clusterable;
use crate::spatial::index::PointIndex;

/// Viewport bounds grown by a margin, split into contiguous longitude spans.
#[derive(Debug, Clone, PartialEq)]
pub struct PaddedBounds {
    pub north: f64,
    pub south: f64,
    /// One span, or two when the padded range wraps the antimeridian
    pub spans: Vec<(f64, f64)>,
}

impl PaddedBounds {
    /// Grows `bounds` by `padding_m` meters on every side.
    ///
    /// The longitude margin is scaled by the cosine of the center latitude,
    /// floored at [`MIN_LNG_SCALE`] so it stays finite near the poles.
    pub fn around(bounds: &ViewBounds, padding_m: f64) -> Self {
        let b = bounds.normalized();
        let padding_m = padding_m.max(0.0);
        let dlat = padding_m / METERS_PER_DEGREE;
        let lng_scale = b.center().lat.to_radians().cos().max(MIN_LNG_SCALE);
        let dlng = padding_m / (METERS_PER_DEGREE * lng_scale);

        let north = (b.north + dlat).min(90.0);
        let south = (b.south - dlat).max(-90.0);
        let spans = if b.lng_width() + 2.0 * dlng >= 360.0 {
            vec![(-180.0, 180.0)]
        } else {
            ViewBounds::new(north, south, b.west - dlng, b.east + dlng).lng_spans()
        };

        Self {
            north,
            south,
            spans,
        }
    }

    pub fn contains(&self, point: &LatLng) -> bool {
        if point.lat < self.south || point.lat > self.north {
            return false;
        }
        let lng = normalize_lng(point.lng);
        self.spans
            .iter()
            .any(|&(west, east)| lng >= west && lng <= east)
    }
}

/// What the static layer should show for a viewport
#[derive(Debug, Clone, PartialEq)]
pub enum RadarView<T> {
    /// Zoomed out past the floor
    Hidden,
    /// More matches than the budget; nothing is shown
    TooMany { budget: usize },
    Visible(Vec<T>),
}

impl<T> RadarView<T> {
    /// Items to render, empty unless [`RadarView::Visible`]
    pub fn items(&self) -> &[T] {
        match self {
            Self::Visible(items) => items,
            Self::Hidden | Self::TooMany { .. } => &[],
        }
    }

    pub fn is_too_many(&self) -> bool {
        matches!(self, Self::TooMany { .. })
    }

    /// Transforms the visible list, leaving the other states alone.
    pub fn map<U>(self, f: impl FnOnce(Vec<T>) -> Vec<U>) -> RadarView<U> {
        match self {
            Self::Hidden => RadarView::Hidden,
            Self::TooMany { budget } => RadarView::TooMany { budget },
            Self::Visible(items) => RadarView::Visible(f(items)),
        }
    }

    /// Status line for the states that hide markers
    pub fn status_message(&self) -> Option<String> {
        match self {
            Self::TooMany { .. } => Some("Too many radars here, zoom in to see them".to_string()),
            Self::Hidden | Self::Visible(_) => None,
        }
    }
}

/// Selects the points inside a padded viewport, all or nothing.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewportPointFilter {
    pub padding_m: f64,
    pub min_zoom: f64,
    pub max_visible: usize,
}

impl Default for ViewportPointFilter {
    fn default() -> Self {
        Self::from(&RadarFilterConfig::default())
    }
}

impl From<&RadarFilterConfig> for ViewportPointFilter {
    fn from(config: &RadarFilterConfig) -> Self {
        Self {
            padding_m: config.padding_m,
            min_zoom: config.min_zoom,
            max_visible: config.max_visible,
        }
    }
}

impl ViewportPointFilter {
    pub fn new(padding_m: f64, min_zoom: f64, max_visible: usize) -> Self {
        Self {
            padding_m,
            min_zoom,
            max_visible,
        }
    }

    pub fn padded_bounds(&self, viewport: &Viewport) -> PaddedBounds {
        PaddedBounds::around(&viewport.bounds, self.padding_m)
    }

    /// Linear scan over `points`.
    pub fn filter<T, I>(&self, points: I, viewport: &Viewport) -> RadarView<T>
    where
        T: Clusterable,
        I: IntoIterator<Item = T>,
    {
        if viewport.zoom < self.min_zoom {
            return RadarView::Hidden;
        }
        let bounds = self.padded_bounds(viewport);
        self.collect_within(points, &bounds)
    }

    /// Same result as [`filter`](Self::filter), using envelope queries.
    pub fn filter_indexed<'a, T: Clusterable>(
        &self,
        index: &'a PointIndex<T>,
        viewport: &Viewport,
    ) -> RadarView<&'a T> {
        if viewport.zoom < self.min_zoom {
            return RadarView::Hidden;
        }
        let bounds = self.padded_bounds(viewport);
        self.collect_within(index.query(&bounds), &bounds)
    }

    /// Stops as soon as the match count passes the budget.
    fn collect_within<T, I>(&self, candidates: I, bounds: &PaddedBounds) -> RadarView<T>
    where
        T: Clusterable,
        I: IntoIterator<Item = T>,
    {
        let mut matches = Vec::new();
        for point in candidates {
            if !bounds.contains(&point.position()) {
                continue;
            }
            matches.push(point);
            if matches.len() > self.max_visible {
                log::debug!("radar view over budget of {}", self.max_visible);
                return RadarView::TooMany {
                    budget: self.max_visible,
                };
            }
        }
        RadarView::Visible(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::radar::RadarPoint;

    fn radar(id: &str, lat: f64, lng: f64) -> RadarPoint {
        RadarPoint {
            id: id.to_string(),
            lat,
            lng,
            desc: String::new(),
        }
    }

    fn viewport(north: f64, south: f64, west: f64, east: f64, zoom: f64) -> Viewport {
        Viewport::new(ViewBounds::new(north, south, west, east), zoom)
    }

    #[test]
    fn test_overflow_shows_nothing() {
        let filter = ViewportPointFilter::new(0.0, 10.0, 2);
        let points = vec![
            radar("a", 0.1, 0.1),
            radar("b", 0.2, 0.2),
            radar("c", 0.3, 0.3),
        ];
        let view = filter.filter(&points, &viewport(1.0, 0.0, 0.0, 1.0, 12.0));

        assert_eq!(view, RadarView::TooMany { budget: 2 });
        assert!(view.items().is_empty());
        assert!(view.status_message().is_some());
    }

    #[test]
    fn test_exactly_budget_is_visible() {
        let filter = ViewportPointFilter::new(0.0, 10.0, 2);
        let points = vec![radar("a", 0.1, 0.1), radar("b", 0.2, 0.2), radar("far", 30.0, 30.0)];
        let view = filter.filter(&points, &viewport(1.0, 0.0, 0.0, 1.0, 12.0));
        let ids: Vec<&str> = view.items().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_below_zoom_floor_is_hidden() {
        let filter = ViewportPointFilter::new(0.0, 10.0, 400);
        let points = vec![radar("a", 0.5, 0.5)];
        assert_eq!(
            filter.filter(&points, &viewport(1.0, 0.0, 0.0, 1.0, 9.5)),
            RadarView::Hidden
        );
    }

    #[test]
    fn test_padding_extends_bounds() {
        // 1500 m is about 0.0135 degrees of latitude.
        let filter = ViewportPointFilter::new(1_500.0, 0.0, 400);
        let points = vec![radar("inside", 1.01, 0.5), radar("outside", 1.02, 0.5)];
        let view = filter.filter(&points, &viewport(1.0, 0.0, 0.0, 1.0, 12.0));
        let ids: Vec<&str> = view.items().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["inside"]);
    }

    #[test]
    fn test_antimeridian_membership() {
        let filter = ViewportPointFilter::new(0.0, 0.0, 400);
        let points = vec![
            radar("east", 0.0, 179.5),
            radar("west", 0.0, -179.5),
            radar("greenwich", 0.0, 0.0),
        ];
        let view = filter.filter(&points, &viewport(5.0, -5.0, 170.0, -170.0, 12.0));
        let ids: Vec<&str> = view.items().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["east", "west"]);
    }

    #[test]
    fn test_padding_near_pole_stays_finite() {
        let bounds = PaddedBounds::around(&ViewBounds::new(89.5, 88.5, 0.0, 1.0), 1_500.0);
        let dlng = 1_500.0 / (METERS_PER_DEGREE * MIN_LNG_SCALE);
        assert_eq!(bounds.spans.len(), 1);
        assert!((bounds.spans[0].0 + dlng).abs() < 1e-9);
        assert!((bounds.spans[0].1 - (1.0 + dlng)).abs() < 1e-9);
        assert!(bounds.north <= 90.0);
    }

    #[test]
    fn test_padding_across_antimeridian_splits() {
        let bounds = PaddedBounds::around(&ViewBounds::new(1.0, -1.0, 175.0, 179.99), 10_000.0);
        assert_eq!(bounds.spans.len(), 2);
        assert_eq!(bounds.spans[0].1, 180.0);
        assert_eq!(bounds.spans[1].0, -180.0);
        assert!(bounds.contains(&LatLng::new(0.0, -179.98)));
    }

    #[test]
    fn test_whole_world_padding() {
        let bounds = PaddedBounds::around(&ViewBounds::new(60.0, -60.0, -180.0, 180.0), 1_500.0);
        assert_eq!(bounds.spans, vec![(-180.0, 180.0)]);
        assert!(bounds.contains(&LatLng::new(0.0, 180.0)));
    }

    #[test]
    fn test_map_keeps_state() {
        let view: RadarView<u32> = RadarView::TooMany { budget: 3 };
        let mapped: RadarView<usize> = view.map(|v| vec![v.len()]);
        assert_eq!(mapped, RadarView::TooMany { budget: 3 });

        let view: RadarView<u32> = RadarView::Visible(vec![1, 2]);
        let mapped: RadarView<usize> = view.map(|v| vec![v.len()]);
        assert_eq!(mapped, RadarView::Visible(vec![2]));
    }
}
