use anyhow::{bail, Context};
use hazardmap::{
    spatial::filter::RadarView, HazardMapConfig, MarkerService, MarkerUpdate, ViewBounds,
    Viewport,
};
use std::time::Duration;

const USAGE: &str = "usage: hazardmap-app <north> <south> <west> <east> <zoom>";

/// Headless driver: runs one view change through the marker service
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let viewport = parse_viewport(&args)?;
    let config = HazardMapConfig::from_env().context("invalid HAZARDMAP_* configuration")?;

    let service = MarkerService::new(config);
    service.start();
    wait_for_radar(&service, Duration::from_secs(5)).await;

    let cycle = service.on_viewport_changed(viewport);
    tokio::select! {
        result = cycle => result.context("alert cycle task failed")?,
        _ = tokio::signal::ctrl_c() => log::info!("interrupted"),
    }

    for update in service.try_recv_updates() {
        println!("{}", describe(&update));
    }
    service.shutdown();
    Ok(())
}

fn parse_viewport(args: &[String]) -> anyhow::Result<Viewport> {
    if args.len() != 5 {
        bail!(USAGE);
    }
    let mut values = [0.0; 5];
    for (slot, arg) in values.iter_mut().zip(args) {
        *slot = arg
            .parse()
            .with_context(|| format!("'{}' is not a number\n{}", arg, USAGE))?;
    }
    let [north, south, west, east, zoom] = values;
    Ok(Viewport::new(ViewBounds::new(north, south, west, east), zoom))
}

async fn wait_for_radar(service: &MarkerService, limit: Duration) {
    if service.config().radar_source.is_none() {
        return;
    }
    let started = tokio::time::Instant::now();
    while !service.radar_loaded() && started.elapsed() < limit {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    if !service.radar_loaded() {
        log::warn!("radar dataset not ready after {:?}", limit);
    }
}

fn describe(update: &MarkerUpdate) -> String {
    match update {
        MarkerUpdate::Alerts {
            clusters,
            debug_boxes,
            used_zoom,
        } => {
            let mut lines = vec![format!(
                "alerts: {} cluster(s) from {} box(es) at z{}",
                clusters.len(),
                debug_boxes.len(),
                used_zoom
            )];
            for cluster in clusters {
                let primary = cluster.primary();
                lines.push(format!(
                    "  {} x{} at ({:.5}, {:.5}) {}",
                    cluster.id,
                    cluster.count(),
                    cluster.center.lat,
                    cluster.center.lng,
                    primary.label()
                ));
            }
            lines.join("\n")
        }
        MarkerUpdate::AlertStatus(message) => format!("alerts: {}", message),
        MarkerUpdate::Radar(RadarView::Hidden) => "radars: hidden at this zoom".to_string(),
        MarkerUpdate::Radar(view @ RadarView::TooMany { budget }) => format!(
            "radars: more than {} in view, {}",
            budget,
            view.status_message().unwrap_or_default()
        ),
        MarkerUpdate::Radar(RadarView::Visible(clusters)) => {
            let points: usize = clusters.iter().map(|c| c.count()).sum();
            format!("radars: {} point(s) in {} cluster(s)", points, clusters.len())
        }
        MarkerUpdate::Warnings(clusters) => format!("warnings: {} cluster(s)", clusters.len()),
        MarkerUpdate::WarningStatus(message) => format!("warnings: {}", message),
    }
}
