//! Marker service: turns view changes into renderable marker updates.
//!
//! Alerts go through a debounced, cancelable fetch cycle. The static radar
//! layer is recomputed synchronously on every view change once its dataset
//! has loaded. Warnings arrive on their own polling schedule. Everything is
//! delivered to the embedding UI over one channel drained with
//! [`MarkerService::try_recv_updates`].

use crate::background::cycle::CycleScheduler;
use crate::core::config::HazardMapConfig;
use crate::core::time::{Clock, SystemClock};
use crate::core::viewport::Viewport;
use crate::data::radar::{RadarDataset, RadarPoint, RadarSource};
use crate::feeds::alert::Alert;
use crate::feeds::orchestrator::{AlertFetchOrchestrator, CycleOutcome};
use crate::feeds::source::{AlertSource, HttpAlertSource};
use crate::feeds::warnings::{
    HttpWarningSource, PollEvent, WarningPoller, WarningReport, WarningSource,
};
use crate::spatial::clustering::{Cluster, Clustering};
use crate::spatial::filter::{RadarView, ViewportPointFilter};
use crate::spatial::index::RadarIndex;
use crate::tiles::planner::{TileBox, TileQueryPlanner};
use crossbeam_channel::{unbounded, Receiver, Sender};
use futures::future::{AbortHandle, Abortable};
use std::future::Future;
use std::sync::{Arc, Mutex, RwLock};
use tokio::task::JoinHandle;

/// Something the UI should apply to its marker layers
#[derive(Debug, Clone, PartialEq)]
pub enum MarkerUpdate {
    /// Replaces the alert layer wholesale
    Alerts {
        clusters: Vec<Cluster<Alert>>,
        /// Tile-aligned boxes of the cycle, for optional debug overlays
        debug_boxes: Vec<TileBox>,
        used_zoom: u8,
    },
    /// Cooldown countdown or failure text for the alert layer
    AlertStatus(String),
    Radar(RadarView<Cluster<RadarPoint>>),
    Warnings(Vec<Cluster<WarningReport>>),
    WarningStatus(String),
}

/// Radar dataset plus the rules for showing it
struct RadarLayer {
    filter: ViewportPointFilter,
    clustering: Clustering,
    index: RwLock<Option<RadarIndex>>,
    last_viewport: Mutex<Option<Viewport>>,
}

impl RadarLayer {
    fn install(&self, dataset: RadarDataset) {
        let index = RadarIndex::new(dataset.into_points());
        log::info!("radar index ready with {} point(s)", index.len());
        if let Ok(mut slot) = self.index.write() {
            *slot = Some(index);
        }
    }

    fn is_loaded(&self) -> bool {
        self.index
            .read()
            .map(|slot| slot.is_some())
            .unwrap_or(false)
    }

    fn remember(&self, viewport: Viewport) {
        if let Ok(mut last) = self.last_viewport.lock() {
            *last = Some(viewport);
        }
    }

    /// `None` until the dataset has loaded
    fn view(&self, viewport: &Viewport) -> Option<RadarView<Cluster<RadarPoint>>> {
        let slot = self.index.read().ok()?;
        let index = slot.as_ref()?;
        let view = self
            .filter
            .filter_indexed(index, viewport)
            .map(|points| self.clustering.cluster(points.into_iter().cloned().collect()));
        Some(view)
    }

    fn view_for_last(&self) -> Option<RadarView<Cluster<RadarPoint>>> {
        let viewport = (*self.last_viewport.lock().ok()?)?;
        self.view(&viewport)
    }
}

/// Wires planning, gating, fetching, filtering and clustering together.
pub struct MarkerService {
    config: HazardMapConfig,
    planner: TileQueryPlanner,
    orchestrator: Arc<AlertFetchOrchestrator>,
    scheduler: CycleScheduler,
    radar: Arc<RadarLayer>,
    update_tx: Sender<MarkerUpdate>,
    update_rx: Receiver<MarkerUpdate>,
    background: Mutex<Vec<AbortHandle>>,
}

impl MarkerService {
    /// Service talking to the configured HTTP alert feed
    pub fn new(config: HazardMapConfig) -> Self {
        let source = Arc::new(HttpAlertSource::new(config.feeds.alert_url.clone()));
        Self::with_sources(config, source, Arc::new(SystemClock))
    }

    /// Service over an arbitrary alert source and clock
    pub fn with_sources(
        config: HazardMapConfig,
        alert_source: Arc<dyn AlertSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let orchestrator = Arc::new(AlertFetchOrchestrator::new(
            alert_source,
            clock,
            config.throttle.clone(),
            config.feeds.environment,
        ));
        let radar = Arc::new(RadarLayer {
            filter: ViewportPointFilter::from(&config.radar),
            clustering: Clustering::with_radius(config.clustering.radar_radius_m),
            index: RwLock::new(None),
            last_viewport: Mutex::new(None),
        });
        let (update_tx, update_rx) = unbounded();

        Self {
            planner: TileQueryPlanner::new(config.throttle.max_query_tiles),
            scheduler: CycleScheduler::new(config.scheduling.debounce),
            orchestrator,
            radar,
            update_tx,
            update_rx,
            background: Mutex::new(Vec::new()),
            config,
        }
    }

    pub fn config(&self) -> &HazardMapConfig {
        &self.config
    }

    pub fn orchestrator(&self) -> &AlertFetchOrchestrator {
        &self.orchestrator
    }

    /// Starts the configured background work: radar loading and warning polling.
    pub fn start(&self) {
        if let Some(source) = self.config.radar_source.clone() {
            let _ = self.load_radar(source);
        }
        match &self.config.feeds.warning_url {
            Some(url) => {
                let token = self.config.feeds.warning_token.clone();
                let source = HttpWarningSource::new(url.clone(), token);
                let _ = self.start_warning_poller(Arc::new(source));
            }
            None => log::info!("no warning feed configured"),
        }
    }

    /// Handles a pan or zoom.
    ///
    /// The radar layer is published right away. The alert cycle runs after
    /// the debounce period unless a newer view change replaces it; the
    /// returned handle resolves when that cycle finishes or is dropped.
    pub fn on_viewport_changed(&self, viewport: Viewport) -> JoinHandle<()> {
        self.radar.remember(viewport);
        if let Some(view) = self.radar.view(&viewport) {
            self.publish(MarkerUpdate::Radar(view));
        }

        let plan = self.planner.plan(&viewport);
        let orchestrator = self.orchestrator.clone();
        let tx = self.update_tx.clone();
        let clustering = Clustering::with_radius(self.config.clustering.alert_radius_m);

        self.scheduler.schedule(move |token| async move {
            let outcome = orchestrator.run_cycle(&viewport, &plan, &token).await;
            if token.is_cancelled() {
                return;
            }
            let update = match outcome {
                CycleOutcome::Published { alerts, .. } => MarkerUpdate::Alerts {
                    clusters: clustering.cluster(alerts),
                    debug_boxes: plan.debug_boxes,
                    used_zoom: plan.used_zoom,
                },
                other => match other.status_message() {
                    Some(message) => MarkerUpdate::AlertStatus(message),
                    None => return,
                },
            };
            let _ = tx.send(update);
        })
    }

    /// Installs an already loaded dataset and refreshes the radar layer.
    pub fn set_radar_dataset(&self, dataset: RadarDataset) {
        self.radar.install(dataset);
        if let Some(view) = self.radar.view_for_last() {
            self.publish(MarkerUpdate::Radar(view));
        }
    }

    pub fn radar_loaded(&self) -> bool {
        self.radar.is_loaded()
    }

    /// Loads the radar dataset in the background; canceled by [`shutdown`](Self::shutdown).
    pub fn load_radar(&self, source: RadarSource) -> JoinHandle<()> {
        let radar = self.radar.clone();
        let tx = self.update_tx.clone();
        self.spawn_tracked(async move {
            match source.load().await {
                Ok(dataset) => {
                    radar.install(dataset);
                    if let Some(view) = radar.view_for_last() {
                        let _ = tx.send(MarkerUpdate::Radar(view));
                    }
                }
                Err(err) => log::error!("radar dataset unavailable: {}", err),
            }
        })
    }

    /// Polls `source` until shutdown or a configuration error.
    pub fn start_warning_poller(&self, source: Arc<dyn WarningSource>) -> JoinHandle<()> {
        let tx = self.update_tx.clone();
        let clustering = Clustering::with_radius(self.config.clustering.warning_radius_m);
        let poller = WarningPoller::new(source, self.config.feeds.warning_poll_interval);

        self.spawn_tracked(poller.run(move |event| {
            let update = match event {
                PollEvent::Reports(reports) => MarkerUpdate::Warnings(clustering.cluster(reports)),
                PollEvent::Failed(message) => {
                    MarkerUpdate::WarningStatus(format!("Failed to load warnings: {}", message))
                }
                PollEvent::Disabled(message) => {
                    MarkerUpdate::WarningStatus(format!("Warnings disabled: {}", message))
                }
            };
            let _ = tx.send(update);
        }))
    }

    /// Try to receive pending marker updates (non-blocking)
    pub fn try_recv_updates(&self) -> Vec<MarkerUpdate> {
        let mut updates = Vec::new();
        while let Ok(update) = self.update_rx.try_recv() {
            updates.push(update);
        }
        updates
    }

    /// Cancels the alert cycle, the dataset load and the warning poller.
    pub fn shutdown(&self) {
        self.scheduler.cancel();
        if let Ok(mut handles) = self.background.lock() {
            for handle in handles.drain(..) {
                handle.abort();
            }
        }
        log::debug!("marker service shut down");
    }

    fn publish(&self, update: MarkerUpdate) {
        let _ = self.update_tx.send(update);
    }

    fn spawn_tracked<F>(&self, task: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (handle, registration) = AbortHandle::new_pair();
        if let Ok(mut handles) = self.background.lock() {
            handles.push(handle);
        }
        tokio::spawn(async move {
            let _ = Abortable::new(task, registration).await;
        })
    }
}

impl Drop for MarkerService {
    fn drop(&mut self) {
        self.shutdown();
    }
}
