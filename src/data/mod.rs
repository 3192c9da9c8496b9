pub mod radar;

pub use radar::{RadarDataset, RadarPoint, RadarSource};
