//! One alert fetch cycle: gate, fan out, merge, publish.

use crate::background::cycle::CycleToken;
use crate::core::config::ThrottleConfig;
use crate::core::time::Clock;
use crate::core::viewport::Viewport;
use crate::feeds::alert::{dedupe_alerts, Alert};
use crate::feeds::environment::{Environment, EnvironmentMode};
use crate::feeds::source::AlertSource;
use crate::feeds::throttle::{cooldown_message, GateDecision, RateLimitState};
use crate::tiles::planner::QueryPlan;
use crate::Error;
use futures::future::join_all;
use std::sync::{Arc, Mutex};

/// How a fetch cycle ended
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Fresh alert set to replace the previous one wholesale
    Published {
        alerts: Vec<Alert>,
        env: Environment,
    },
    /// Refused: a server cooldown is still running
    CoolingDown { remaining_secs: u64 },
    /// Refused: too soon after the last fetch
    Throttled,
    /// Refused: same query as last time
    Unchanged,
    /// The feed answered 429; a cooldown is now in effect
    RateLimited { retry_in_secs: u64 },
    /// Transport or HTTP failure; previous markers stay as they are
    Failed(String),
    /// A newer cycle took over; nothing was applied
    Cancelled,
}

impl CycleOutcome {
    /// Status line to display, or `None` for silent outcomes
    pub fn status_message(&self) -> Option<String> {
        match self {
            Self::CoolingDown { remaining_secs } => Some(cooldown_message(*remaining_secs)),
            Self::RateLimited { retry_in_secs } => Some(cooldown_message(*retry_in_secs)),
            Self::Failed(message) => Some(format!("Failed to load alerts: {}", message)),
            Self::Published { .. } | Self::Throttled | Self::Unchanged | Self::Cancelled => None,
        }
    }

    pub fn is_published(&self) -> bool {
        matches!(self, Self::Published { .. })
    }
}

/// Issues the per-box queries of a plan and owns the feed's throttle state.
pub struct AlertFetchOrchestrator {
    source: Arc<dyn AlertSource>,
    clock: Arc<dyn Clock>,
    config: ThrottleConfig,
    mode: EnvironmentMode,
    state: Mutex<RateLimitState>,
}

impl AlertFetchOrchestrator {
    pub fn new(
        source: Arc<dyn AlertSource>,
        clock: Arc<dyn Clock>,
        config: ThrottleConfig,
        mode: EnvironmentMode,
    ) -> Self {
        Self {
            source,
            clock,
            config,
            mode,
            state: Mutex::new(RateLimitState::default()),
        }
    }

    /// Snapshot of the throttle state
    pub fn state(&self) -> RateLimitState {
        self.state
            .lock()
            .map(|state| state.clone())
            .unwrap_or_default()
    }

    pub fn config(&self) -> &ThrottleConfig {
        &self.config
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut RateLimitState) -> R) -> Option<R> {
        self.state.lock().ok().map(|mut state| f(&mut state))
    }

    /// Runs one cycle for `plan`.
    ///
    /// The throttle state is only locked between suspension points, and
    /// after the requests resolve nothing is written unless `token` is
    /// still current.
    pub async fn run_cycle(
        &self,
        viewport: &Viewport,
        plan: &QueryPlan,
        token: &CycleToken,
    ) -> CycleOutcome {
        if token.is_cancelled() {
            return CycleOutcome::Cancelled;
        }

        let env = self.mode.resolve(&viewport.center());
        let now = self.clock.now_ms();
        let decision = self
            .with_state(|state| {
                state.check(token.generation(), now, &plan.request_boxes, env, &self.config)
            })
            .unwrap_or(GateDecision::Unchanged);

        let key = match decision {
            GateDecision::Proceed { key } => key,
            GateDecision::CoolingDown { remaining_secs } => {
                log::debug!("alert cycle refused, cooldown {}s left", remaining_secs);
                return CycleOutcome::CoolingDown { remaining_secs };
            }
            GateDecision::Throttled => {
                log::debug!("alert cycle throttled");
                return CycleOutcome::Throttled;
            }
            GateDecision::Unchanged => return CycleOutcome::Unchanged,
        };

        log::debug!(
            "fetching {} box(es) at z{} key={}",
            plan.request_boxes.len(),
            plan.used_zoom,
            key
        );
        let requests = plan
            .request_boxes
            .iter()
            .map(|bbox| self.source.fetch_alerts(env, bbox));
        let responses = join_all(requests).await;

        if token.is_cancelled() {
            log::debug!("dropping results of superseded cycle {}", token.generation());
            return CycleOutcome::Cancelled;
        }

        let now = self.clock.now_ms();
        let mut entries = Vec::new();
        let mut failure: Option<Error> = None;
        for response in responses {
            match response {
                Ok(alerts) => entries.extend(alerts),
                Err(err) if err.is_rate_limited() => {
                    failure = Some(err);
                    break;
                }
                Err(err) => {
                    if failure.is_none() {
                        failure = Some(err);
                    }
                }
            }
        }

        match failure {
            Some(Error::RateLimited { retry_after }) => {
                let wait = self
                    .with_state(|state| {
                        state.record_rate_limited(now, retry_after.as_deref(), &self.config)
                    })
                    .unwrap_or(self.config.default_backoff);
                let retry_in_secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
                log::warn!("alert feed rate limited, backing off {}s", retry_in_secs);
                CycleOutcome::RateLimited { retry_in_secs }
            }
            Some(err) => {
                self.with_state(RateLimitState::record_failure);
                log::warn!("alert cycle failed: {}", err);
                CycleOutcome::Failed(err.to_string())
            }
            None => {
                self.with_state(|state| state.record_success(now));
                let total = entries.len();
                let alerts = dedupe_alerts(entries.into_iter().filter_map(Alert::from_value));
                log::info!(
                    "published {} alert(s) from {} entries (env={})",
                    alerts.len(),
                    total,
                    env
                );
                CycleOutcome::Published { alerts, env }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::time::ManualClock;
    use crate::core::viewport::ViewBounds;
    use crate::tiles::planner::{plan_query, TileBox};
    use crate::Result;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedSource {
        calls: AtomicUsize,
        reply: fn(&TileBox) -> Result<Vec<Value>>,
    }

    #[async_trait]
    impl AlertSource for ScriptedSource {
        async fn fetch_alerts(&self, _env: Environment, bbox: &TileBox) -> Result<Vec<Value>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.reply)(bbox)
        }
    }

    fn orchestrator(
        reply: fn(&TileBox) -> Result<Vec<Value>>,
    ) -> (AlertFetchOrchestrator, Arc<ScriptedSource>, Arc<ManualClock>) {
        let source = Arc::new(ScriptedSource {
            calls: AtomicUsize::new(0),
            reply,
        });
        let clock = Arc::new(ManualClock::new(1_000_000));
        let orchestrator = AlertFetchOrchestrator::new(
            source.clone(),
            clock.clone(),
            ThrottleConfig::default(),
            EnvironmentMode::Auto,
        );
        (orchestrator, source, clock)
    }

    fn viewport(west: f64, east: f64) -> Viewport {
        Viewport::new(ViewBounds::new(10.0, -10.0, west, east), 5.0)
    }

    #[tokio::test]
    async fn test_merges_boxes_and_dedupes() {
        let (orch, source, _) = orchestrator(|bbox| {
            Ok(vec![
                json!({"uuid": "shared", "type": "JAM", "location": {"x": 0.0, "y": 0.0}}),
                json!({"type": "HAZARD", "location": {"x": bbox.left, "y": 0.0}}),
                json!({"type": "BROKEN"}),
            ])
        });
        let vp = viewport(170.0, -170.0);
        let plan = plan_query(&vp);
        let outcome = orch.run_cycle(&vp, &plan, &CycleToken::detached()).await;

        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        match outcome {
            CycleOutcome::Published { alerts, env } => {
                assert_eq!(env, Environment::RestOfWorld);
                assert_eq!(alerts.len(), 3);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(orch.state().last_fetch_at, Some(1_000_000));
    }

    #[tokio::test]
    async fn test_identical_query_issues_one_call() {
        let (orch, source, clock) = orchestrator(|_| Ok(Vec::new()));
        let vp = viewport(0.0, 10.0);
        let plan = plan_query(&vp);

        assert!(orch.run_cycle(&vp, &plan, &CycleToken::detached()).await.is_published());
        clock.advance(std::time::Duration::from_secs(10));
        let again = orch.run_cycle(&vp, &plan, &CycleToken::detached()).await;

        assert_eq!(again, CycleOutcome::Unchanged);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_http_failure_keeps_state_and_reports() {
        let (orch, _, _) = orchestrator(|_| Err(Error::Http { status: 503 }));
        let vp = viewport(0.0, 10.0);
        let plan = plan_query(&vp);
        let outcome = orch.run_cycle(&vp, &plan, &CycleToken::detached()).await;

        assert_eq!(outcome, CycleOutcome::Failed("HTTP 503".to_string()));
        assert_eq!(
            outcome.status_message().as_deref(),
            Some("Failed to load alerts: HTTP 503")
        );
        let state = orch.state();
        assert_eq!(state.last_fetch_at, None);
        assert_eq!(state.backoff_until, 0);
    }

    #[tokio::test]
    async fn test_rate_limit_wins_over_other_failures() {
        let (orch, _, _) = orchestrator(|bbox| {
            if bbox.left < 0.0 {
                Err(Error::RateLimited {
                    retry_after: Some("12".to_string()),
                })
            } else {
                Err(Error::Http { status: 500 })
            }
        });
        let vp = viewport(170.0, -170.0);
        let plan = plan_query(&vp);
        let outcome = orch.run_cycle(&vp, &plan, &CycleToken::detached()).await;

        assert_eq!(outcome, CycleOutcome::RateLimited { retry_in_secs: 12 });
        assert_eq!(orch.state().backoff_until, 1_012_000);
    }

    #[tokio::test]
    async fn test_cancelled_token_skips_everything() {
        let (orch, source, _) = orchestrator(|_| Ok(Vec::new()));
        let scheduler = crate::background::cycle::CycleScheduler::new(std::time::Duration::ZERO);
        let stale = scheduler.begin();
        let _fresh = scheduler.begin();

        let vp = viewport(0.0, 10.0);
        let outcome = orch.run_cycle(&vp, &plan_query(&vp), &stale).await;
        assert_eq!(outcome, CycleOutcome::Cancelled);
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
        assert_eq!(orch.state(), RateLimitState::default());
    }
}
