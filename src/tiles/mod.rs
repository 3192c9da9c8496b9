pub mod planner;

// Re-exports for convenience
pub use planner::{plan_query, QueryPlan, TileBox, TileQueryPlanner};
