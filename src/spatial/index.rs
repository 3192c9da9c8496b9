use crate::spatial::clustering::Clusterable;
use crate::spatial::filter::PaddedBounds;

use rstar::{RTree, RTreeObject, AABB};

/// A point stored in the R-tree, keyed by `[lng, lat]`
#[derive(Debug, Clone)]
pub struct IndexedPoint<T> {
    coords: [f64; 2],
    pub data: T,
}

impl<T: Clusterable> IndexedPoint<T> {
    pub fn new(data: T) -> Self {
        let position = data.position();
        Self {
            coords: [position.lng, position.lat],
            data,
        }
    }
}

// --- rstar integration -------------------------------------------------------------------------

impl<T> RTreeObject for IndexedPoint<T> {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.coords)
    }
}

/// R-tree over a static point set, built once and queried per viewport
pub struct PointIndex<T> {
    rtree: RTree<IndexedPoint<T>>,
}

/// Index over the radar dataset
pub type RadarIndex = PointIndex<crate::data::radar::RadarPoint>;

impl<T: Clusterable> PointIndex<T> {
    pub fn new(points: impl IntoIterator<Item = T>) -> Self {
        let items: Vec<IndexedPoint<T>> = points.into_iter().map(IndexedPoint::new).collect();
        Self {
            rtree: RTree::bulk_load(items),
        }
    }
}

impl<T> PointIndex<T> {
    /// Points inside `bounds`, one envelope per longitude span.
    pub fn query<'a>(&'a self, bounds: &PaddedBounds) -> impl Iterator<Item = &'a T> + 'a {
        let envelopes: Vec<AABB<[f64; 2]>> = bounds
            .spans
            .iter()
            .map(|&(west, east)| AABB::from_corners([west, bounds.south], [east, bounds.north]))
            .collect();
        envelopes.into_iter().flat_map(move |envelope| {
            self.rtree
                .locate_in_envelope(&envelope)
                .map(|item| &item.data)
        })
    }

    pub fn is_empty(&self) -> bool {
        self.rtree.size() == 0
    }

    pub fn len(&self) -> usize {
        self.rtree.size()
    }
}

impl<T: Clusterable> Default for PointIndex<T> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}
