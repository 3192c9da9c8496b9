//! Live alert feed access: wire model, gating, transport and fetch cycles.

pub mod alert;
pub mod environment;
pub mod orchestrator;
pub mod source;
pub mod throttle;
pub mod warnings;

pub use alert::{dedupe_alerts, Alert};
pub use environment::{Environment, EnvironmentMode};
pub use orchestrator::{AlertFetchOrchestrator, CycleOutcome};
pub use source::{AlertSource, HttpAlertSource};
pub use throttle::{GateDecision, RateLimitState};
pub use warnings::{WarningReport, WarningSource};
