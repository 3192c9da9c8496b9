pub mod cycle;
pub mod markers;

pub use cycle::{CycleScheduler, CycleToken};
pub use markers::{MarkerService, MarkerUpdate};
