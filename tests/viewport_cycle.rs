use async_trait::async_trait;
use hazardmap::prelude::*;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// End-to-end scenarios: view changes driving gated, cancelable fetch cycles
#[cfg(test)]
mod viewport_cycle_tests {
    use super::*;

    /// Alert feed fake that records every box it is asked for
    struct RecordingSource {
        requests: Mutex<Vec<TileBox>>,
        delay: Duration,
        rate_limit: Option<&'static str>,
    }

    impl RecordingSource {
        fn new() -> Arc<Self> {
            Self::build(Duration::ZERO, None)
        }

        fn slow(delay: Duration) -> Arc<Self> {
            Self::build(delay, None)
        }

        fn rate_limited(retry_after: &'static str) -> Arc<Self> {
            Self::build(Duration::ZERO, Some(retry_after))
        }

        fn build(delay: Duration, rate_limit: Option<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                requests: Mutex::new(Vec::new()),
                delay,
                rate_limit,
            })
        }

        fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl AlertSource for RecordingSource {
        async fn fetch_alerts(&self, _env: Environment, bbox: &TileBox) -> Result<Vec<Value>> {
            self.requests.lock().unwrap().push(*bbox);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if let Some(retry_after) = self.rate_limit {
                return Err(Error::RateLimited {
                    retry_after: Some(retry_after.to_string()),
                });
            }
            let center_lng = (bbox.left + bbox.right) / 2.0;
            let center_lat = (bbox.top + bbox.bottom) / 2.0;
            Ok(vec![json!({
                "uuid": format!("{:.4}:{:.4}", center_lat, center_lng),
                "type": "HAZARD",
                "location": {"x": center_lng, "y": center_lat},
            })])
        }
    }

    fn berlin() -> Viewport {
        Viewport::new(ViewBounds::new(52.52, 52.48, 13.38, 13.42), 13.0)
    }

    fn paris() -> Viewport {
        Viewport::new(ViewBounds::new(48.88, 48.84, 2.32, 2.37), 13.0)
    }

    fn service_with(
        source: Arc<RecordingSource>,
        clock: Arc<ManualClock>,
        config: HazardMapConfig,
    ) -> MarkerService {
        MarkerService::with_sources(config, source, clock)
    }

    fn alert_updates(updates: &[MarkerUpdate]) -> Vec<&Vec<Cluster<Alert>>> {
        updates
            .iter()
            .filter_map(|u| match u {
                MarkerUpdate::Alerts { clusters, .. } => Some(clusters),
                _ => None,
            })
            .collect()
    }

    /// A 429 with `Retry-After: 30` blocks the next cycle without a network call
    #[tokio::test]
    async fn test_retry_after_blocks_next_cycle() {
        let source = RecordingSource::rate_limited("30");
        let clock = Arc::new(ManualClock::new(5_000_000));
        let orchestrator = AlertFetchOrchestrator::new(
            source.clone(),
            clock.clone(),
            ThrottleConfig::default(),
            EnvironmentMode::Auto,
        );

        let vp = berlin();
        let first = orchestrator
            .run_cycle(&vp, &plan_query(&vp), &CycleToken::detached())
            .await;
        assert_eq!(first, CycleOutcome::RateLimited { retry_in_secs: 30 });
        assert_eq!(
            first.status_message().as_deref(),
            Some("Alert feed is rate limited, retrying in 30s")
        );
        let calls_after_429 = source.calls();

        clock.advance(Duration::from_secs(10));
        let vp = paris();
        let second = orchestrator
            .run_cycle(&vp, &plan_query(&vp), &CycleToken::detached())
            .await;
        assert_eq!(second, CycleOutcome::CoolingDown { remaining_secs: 20 });
        assert_eq!(source.calls(), calls_after_429);

        clock.advance(Duration::from_secs(21));
        let third = orchestrator
            .run_cycle(&vp, &plan_query(&vp), &CycleToken::detached())
            .await;
        assert!(matches!(third, CycleOutcome::RateLimited { .. }));
        assert!(source.calls() > calls_after_429);
    }

    /// Identical consecutive view changes hit the feed once
    #[tokio::test(start_paused = true)]
    async fn test_identical_viewports_issue_one_request_set() {
        let source = RecordingSource::new();
        let clock = Arc::new(ManualClock::new(1_000_000));
        let service = service_with(source.clone(), clock.clone(), HazardMapConfig::default());

        service.on_viewport_changed(berlin()).await.unwrap();
        let calls = source.calls();
        assert!(calls > 0);

        clock.advance(Duration::from_secs(5));
        service.on_viewport_changed(berlin()).await.unwrap();
        assert_eq!(source.calls(), calls);

        let updates = service.try_recv_updates();
        assert_eq!(alert_updates(&updates).len(), 1);
        assert!(!updates
            .iter()
            .any(|u| matches!(u, MarkerUpdate::AlertStatus(_))));
    }

    /// A cycle overtaken by a newer view change never publishes
    #[tokio::test(start_paused = true)]
    async fn test_superseded_cycle_results_are_dropped() {
        let source = RecordingSource::slow(Duration::from_secs(2));
        let clock = Arc::new(ManualClock::new(1_000_000));
        let service = service_with(source.clone(), clock.clone(), HazardMapConfig::default());

        let stale = service.on_viewport_changed(berlin());
        tokio::time::sleep(Duration::from_millis(700)).await;
        assert!(source.calls() > 0, "first cycle should be in flight");

        let fresh = service.on_viewport_changed(paris());
        stale.await.unwrap();
        fresh.await.unwrap();

        let updates = service.try_recv_updates();
        let published = alert_updates(&updates);
        assert_eq!(published.len(), 1);
        for cluster in published[0] {
            assert!(cluster.center.lng < 5.0, "stale Berlin alert leaked through");
        }
        assert_eq!(
            service.orchestrator().state().last_fetch_at,
            Some(1_000_000)
        );
    }

    /// A small pan over the same tiles while a fetch is in flight still publishes
    #[tokio::test(start_paused = true)]
    async fn test_same_tiles_pan_during_fetch_still_publishes() {
        let source = RecordingSource::slow(Duration::from_secs(2));
        let clock = Arc::new(ManualClock::new(1_000_000));
        let service = service_with(source.clone(), clock.clone(), HazardMapConfig::default());

        let first = berlin();
        let nudged = Viewport::new(ViewBounds::new(52.521, 52.481, 13.381, 13.421), 13.0);
        let boxes = plan_query(&first).request_boxes;
        assert_eq!(boxes, plan_query(&nudged).request_boxes);

        let stale = service.on_viewport_changed(first);
        tokio::time::sleep(Duration::from_millis(700)).await;
        assert_eq!(source.calls(), boxes.len(), "first cycle should be in flight");

        let fresh = service.on_viewport_changed(nudged);
        stale.await.unwrap();
        fresh.await.unwrap();

        assert_eq!(source.calls(), 2 * boxes.len());
        assert_eq!(alert_updates(&service.try_recv_updates()).len(), 1);
        let state = service.orchestrator().state();
        assert_eq!(state.last_fetch_at, Some(1_000_000));
        assert_eq!(state.key_owner, None);
    }

    /// Bursts of pans inside the debounce window collapse into one cycle
    #[tokio::test(start_paused = true)]
    async fn test_pan_burst_is_debounced() {
        let source = RecordingSource::new();
        let clock = Arc::new(ManualClock::new(1_000_000));
        let service = service_with(source.clone(), clock, HazardMapConfig::default());

        let mut handles = Vec::new();
        let mut last = berlin();
        for step in 0..4 {
            let offset = step as f64 * 0.01;
            let bounds = ViewBounds::new(52.52, 52.48, 13.38 + offset, 13.42 + offset);
            last = Viewport::new(bounds, 13.0);
            handles.push(service.on_viewport_changed(last));
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let last_plan = plan_query(&last);
        let requests = source.requests.lock().unwrap().clone();
        assert_eq!(requests, last_plan.request_boxes);
        assert_eq!(alert_updates(&service.try_recv_updates()).len(), 1);
    }

    /// Antimeridian viewports fetch both sides
    #[tokio::test(start_paused = true)]
    async fn test_antimeridian_viewport_queries_both_sides() {
        let source = RecordingSource::new();
        let clock = Arc::new(ManualClock::new(1_000_000));
        let service = service_with(source.clone(), clock, HazardMapConfig::default());

        let vp = Viewport::new(ViewBounds::new(10.0, -10.0, 170.0, -170.0), 5.0);
        service.on_viewport_changed(vp).await.unwrap();

        let requests = source.requests.lock().unwrap().clone();
        assert_eq!(requests.len(), 2);
        assert!(requests.iter().any(|b| b.left >= 0.0));
        assert!(requests.iter().any(|b| b.right <= 0.0));
    }

    /// Rate limiting is surfaced as a countdown status
    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_status_reaches_ui() {
        let source = RecordingSource::rate_limited("45");
        let clock = Arc::new(ManualClock::new(1_000_000));
        let service = service_with(source, clock, HazardMapConfig::default());

        service.on_viewport_changed(berlin()).await.unwrap();
        assert_eq!(
            service.try_recv_updates(),
            vec![MarkerUpdate::AlertStatus(
                "Alert feed is rate limited, retrying in 45s".to_string()
            )]
        );
    }

    /// Over-budget radar views show nothing instead of a partial subset
    #[tokio::test(start_paused = true)]
    async fn test_radar_overflow_hides_layer() {
        let mut config = HazardMapConfig::default();
        config.radar.max_visible = 2;
        let service = service_with(
            RecordingSource::new(),
            Arc::new(ManualClock::new(1_000_000)),
            config,
        );
        service.set_radar_dataset(RadarDataset::parse(
            "13.39,52.49,\"A\"[a]\n13.40,52.50,\"B\"[b]\n13.41,52.51,\"C\"[c]\n",
        ));

        let _cycle = service.on_viewport_changed(berlin());
        let radar: Vec<MarkerUpdate> = service
            .try_recv_updates()
            .into_iter()
            .filter(|u| matches!(u, MarkerUpdate::Radar(_)))
            .collect();
        assert_eq!(
            radar,
            vec![MarkerUpdate::Radar(RadarView::TooMany { budget: 2 })]
        );
    }

    /// Dataset loaded from disk feeds the radar layer for the last viewport
    #[tokio::test]
    async fn test_radar_loaded_from_file() {
        let path = std::env::temp_dir().join(format!(
            "hazardmap-viewport-cycle-{}.txt",
            std::process::id()
        ));
        tokio::fs::write(&path, "13.40,52.50,\"Ring\"[r1]\n")
            .await
            .unwrap();

        let service = service_with(
            RecordingSource::new(),
            Arc::new(ManualClock::new(1_000_000)),
            HazardMapConfig::default(),
        );
        let _ = service.on_viewport_changed(berlin());
        service
            .load_radar(RadarSource::File(path.clone()))
            .await
            .unwrap();
        assert!(service.radar_loaded());

        let visible = service.try_recv_updates().into_iter().any(|u| {
            matches!(u, MarkerUpdate::Radar(RadarView::Visible(ref clusters)) if clusters.len() == 1)
        });
        assert!(visible);
        service.shutdown();
        let _ = tokio::fs::remove_file(&path).await;
    }
}
