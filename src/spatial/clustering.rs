use crate::core::geo::{haversine_meters, LatLng};
use crate::data::radar::RadarPoint;
use crate::feeds::alert::Alert;
use crate::feeds::warnings::WarningReport;
use serde::Serialize;
use std::borrow::Cow;
use std::cmp::Ordering;

/// A point that can be grouped into clusters
pub trait Clusterable {
    fn position(&self) -> LatLng;

    /// Stable identifier, used to name the cluster it seeds
    fn item_id(&self) -> Cow<'_, str>;

    /// Members with the highest recency become the cluster's primary.
    /// `None` for items without a timestamp, which then fall back to the
    /// first member.
    fn recency(&self) -> Option<i64> {
        None
    }
}

impl Clusterable for Alert {
    fn position(&self) -> LatLng {
        self.location
    }

    fn item_id(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.id)
    }

    fn recency(&self) -> Option<i64> {
        self.pub_millis
    }
}

impl Clusterable for RadarPoint {
    fn position(&self) -> LatLng {
        LatLng::new(self.lat, self.lng)
    }

    fn item_id(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.id)
    }
}

impl Clusterable for WarningReport {
    fn position(&self) -> LatLng {
        self.point
    }

    fn item_id(&self) -> Cow<'_, str> {
        Cow::Owned(self.identity_key())
    }
}

impl<T: Clusterable> Clusterable for &T {
    fn position(&self) -> LatLng {
        (**self).position()
    }

    fn item_id(&self) -> Cow<'_, str> {
        (**self).item_id()
    }

    fn recency(&self) -> Option<i64> {
        (**self).recency()
    }
}

/// Represents a cluster of markers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cluster<T> {
    /// Unique identifier for the cluster
    pub id: String,
    /// Unweighted mean of member coordinates
    pub center: LatLng,
    /// Items in this cluster
    pub items: Vec<T>,
    primary: usize,
}

impl<T: Clusterable> Cluster<T> {
    fn from_members(items: Vec<T>) -> Self {
        let count = items.len().max(1) as f64;
        let (lat_sum, lng_sum) = items.iter().fold((0.0, 0.0), |(lat, lng), item| {
            let p = item.position();
            (lat + p.lat, lng + p.lng)
        });

        let id = items
            .first()
            .map(|seed| format!("cluster_{}", seed.item_id()))
            .unwrap_or_default();

        Self {
            id,
            center: LatLng::new(lat_sum / count, lng_sum / count),
            primary: primary_index(&items),
            items,
        }
    }
}

impl<T> Cluster<T> {
    /// Get the number of items in the cluster
    pub fn count(&self) -> usize {
        self.items.len()
    }

    /// Check if this is a single-item cluster
    pub fn is_single(&self) -> bool {
        self.items.len() == 1
    }

    /// Representative member for popups and detail views
    pub fn primary(&self) -> &T {
        &self.items[self.primary]
    }

    /// Maps every member, keeping the cluster's shape.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Cluster<U> {
        Cluster {
            id: self.id,
            center: self.center,
            items: self.items.into_iter().map(f).collect(),
            primary: self.primary,
        }
    }
}

/// Index of the most recent member, first member on ties or without timestamps.
fn primary_index<T: Clusterable>(items: &[T]) -> usize {
    let mut best = 0;
    let mut best_recency = items.first().and_then(Clusterable::recency);
    for (i, item) in items.iter().enumerate().skip(1) {
        let recency = item.recency();
        if recency > best_recency {
            best = i;
            best_recency = recency;
        }
    }
    best
}

/// Configuration for clustering
#[derive(Debug, Clone, PartialEq)]
pub struct ClusteringConfig {
    /// Two points closer than this (great-circle meters) are linked
    pub radius_m: f64,
    /// Seed clusters in latitude/longitude order rather than input order
    pub canonical_order: bool,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            radius_m: 250.0,
            canonical_order: true,
        }
    }
}

/// Greedy single-linkage clustering over a radius.
///
/// A cluster grows from a seed by repeatedly absorbing every remaining point
/// within the radius of any current member, until a pass absorbs nothing.
/// Each pass is `O(members × remaining)`, which is fine for the per-viewport
/// counts this is used with. The grouping is not an optimal partition: with
/// input-order seeding the result depends on which point seeds first.
#[derive(Debug, Clone, Default)]
pub struct Clustering {
    config: ClusteringConfig,
}

impl Clustering {
    pub fn new(config: ClusteringConfig) -> Self {
        Self { config }
    }

    pub fn with_radius(radius_m: f64) -> Self {
        Self::new(ClusteringConfig {
            radius_m,
            ..ClusteringConfig::default()
        })
    }

    pub fn config(&self) -> &ClusteringConfig {
        &self.config
    }

    pub fn cluster<T: Clusterable>(&self, items: Vec<T>) -> Vec<Cluster<T>> {
        if items.is_empty() {
            return Vec::new();
        }

        let positions: Vec<LatLng> = items.iter().map(Clusterable::position).collect();
        let mut order: Vec<usize> = (0..items.len()).collect();
        if self.config.canonical_order {
            order.sort_by(|&a, &b| {
                let (pa, pb) = (positions[a], positions[b]);
                match pa.lat.total_cmp(&pb.lat) {
                    Ordering::Equal => pa.lng.total_cmp(&pb.lng),
                    other => other,
                }
            });
        }

        let radius = self.config.radius_m;
        let mut groups: Vec<Vec<usize>> = Vec::new();
        let mut remaining = order;
        remaining.reverse();

        while let Some(seed) = remaining.pop() {
            let mut members = vec![seed];
            let mut frontier = vec![seed];

            // Only points absorbed in the previous pass can link anything new.
            while !frontier.is_empty() {
                let (near, far): (Vec<usize>, Vec<usize>) =
                    remaining.iter().partition(|&&candidate| {
                        frontier.iter().any(|&member| {
                            haversine_meters(&positions[member], &positions[candidate]) <= radius
                        })
                    });
                remaining = far;
                members.extend_from_slice(&near);
                frontier = near;
            }
            groups.push(members);
        }

        let mut slots: Vec<Option<T>> = items.into_iter().map(Some).collect();
        groups
            .into_iter()
            .map(|group| {
                let members: Vec<T> = group.into_iter().filter_map(|i| slots[i].take()).collect();
                Cluster::from_members(members)
            })
            .collect()
    }
}

/// Clusters `items` with the default settings and the given radius.
pub fn cluster_points<T: Clusterable>(items: Vec<T>, radius_m: f64) -> Vec<Cluster<T>> {
    Clustering::with_radius(radius_m).cluster(items)
}
