pub mod clustering;
pub mod filter;
pub mod index;

pub use clustering::{cluster_points, Cluster, Clusterable, Clustering, ClusteringConfig};
pub use filter::{PaddedBounds, RadarView, ViewportPointFilter};
pub use index::{PointIndex, RadarIndex};
