use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

mod ais;
mod app_metrics;
mod bridge_text;
mod bridges;
mod config;
mod coordinator;
mod current_bridge;
mod eta;
mod events;
mod geometry;
mod gps_analyzer;
mod passage;
mod proximity;
mod status;
mod stream_reader;
mod triggers;
mod vessel;
mod vessel_registry;
mod web;

use ais::AisRecord;
use app_metrics::{AppMetrics, MetricsLogger};
use bridge_text::BridgeTextService;
use bridges::BridgeRegistry;
use config::Config;
use coordinator::SystemCoordinator;
use events::{EventBus, TrackerEvent};
use stream_reader::AisStreamReader;
use triggers::TriggerGuard;
use vessel_registry::VesselRegistry;
use web::api::{AppState, BridgeStatus};

const AIS_CHANNEL_CAPACITY: usize = 1024;
const CLEANUP_SWEEP_INTERVAL: Duration = Duration::from_secs(30);
const METRICS_LOG_INTERVAL: Duration = Duration::from_secs(60);

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

fn init_logging(config: &Config) -> tracing_appender::non_blocking::WorkerGuard {
    let file_appender = tracing_appender::rolling::daily(
        &config.logging.directory,
        &config.logging.file_prefix,
    );
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let level = if config.debug { "debug" } else { config.logging.level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::fmt::layer().with_writer(file_writer).with_ansi(false))
        .init();
    guard
}

/// Drain everything already queued and keep only the newest position report
/// per MMSI. AIS is a position stream, not an event log, so under burst the
/// latest fix wins.
fn drain_latest(
    first: AisRecord,
    rx: &mut mpsc::Receiver<AisRecord>,
    metrics: &mut AppMetrics,
) -> Vec<AisRecord> {
    let mut batch = vec![first];
    while let Ok(rec) = rx.try_recv() {
        batch.push(rec);
    }
    metrics.ais_records += batch.len() as u64;
    if batch.len() == 1 {
        return batch;
    }

    let mut latest_position: HashMap<String, usize> = HashMap::new();
    let mut keep = vec![true; batch.len()];
    for (i, rec) in batch.iter().enumerate() {
        if let AisRecord::Position(p) = rec {
            if let Some(prev) = latest_position.insert(p.mmsi.clone(), i) {
                keep[prev] = false;
                metrics.coalesced_records += 1;
            }
        }
    }
    batch
        .into_iter()
        .zip(keep)
        .filter(|(_, k)| *k)
        .map(|(rec, _)| rec)
        .collect()
}

/// Regenerate the bridge text and publish it together with fresh snapshots.
fn publish_output(
    registry: &VesselRegistry,
    coordinator: &SystemCoordinator,
    text_service: &mut BridgeTextService,
    status_tx: &watch::Sender<BridgeStatus>,
    vessels_tx: &watch::Sender<Vec<vessel::VesselSnapshot>>,
    metrics: &mut AppMetrics,
    now: i64,
) {
    let snapshots = registry.snapshots();
    let output = text_service.generate(&snapshots, registry.bridges(), coordinator, now);
    if output.changed {
        metrics.bridge_texts_emitted += 1;
        info!(alarm = output.alarm, "bridge text: {}", output.text);
        let _ = status_tx.send(BridgeStatus {
            bridge_text: output.text,
            alarm_generic: output.alarm,
        });
    }
    let _ = vessels_tx.send(snapshots);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_file("config.json").unwrap_or_else(|e| {
        eprintln!("Warning: could not load config.json: {}", e);
        eprintln!("Using default configuration");
        Config::default()
    });
    let _log_guard = init_logging(&config);
    info!("Bridge monitor starting");

    let events = EventBus::new();
    let mut registry = VesselRegistry::new(BridgeRegistry::new(), events.clone());
    let target_names: Vec<&str> = registry
        .bridges()
        .target_bridges()
        .iter()
        .map(|b| b.name())
        .collect();
    info!("Tracking target bridges: {}", target_names.join(", "));
    let mut coordinator = SystemCoordinator::new();
    let mut text_service = BridgeTextService::new();
    let mut triggers = TriggerGuard::new();
    let mut metrics = AppMetrics::new();
    let mut metrics_logger = MetricsLogger::new(METRICS_LOG_INTERVAL);

    let (record_tx, mut record_rx) = mpsc::channel::<AisRecord>(AIS_CHANNEL_CAPACITY);
    let (status_tx, status_rx) = watch::channel(BridgeStatus {
        bridge_text: bridge_text::IDLE_TEXT.to_string(),
        alarm_generic: false,
    });
    let (vessels_tx, vessels_rx) = watch::channel(Vec::<vessel::VesselSnapshot>::new());

    // AIS transport
    let reader = AisStreamReader::new(config.stream.clone(), config.api_key.clone(), record_tx);
    tokio::spawn(reader.run());

    // Web status API
    if config.web.enabled {
        let state = AppState { status_rx: status_rx.clone(), vessels_rx: vessels_rx.clone() };
        let port = config.web.port;
        tokio::spawn(async move {
            if let Err(e) = web::server::start_web_server(state, port).await {
                warn!("Web server terminated: {}", e);
            }
        });
    }

    // Lifecycle event log. Subscribers never block the write path; a lagging
    // receiver just misses events.
    {
        let mut event_rx = events.subscribe();
        tokio::spawn(async move {
            while let Ok(event) = event_rx.recv().await {
                match event {
                    TrackerEvent::StatusChanged { vessel, old_status, new_status, reason, .. } => {
                        info!(
                            mmsi = %vessel.mmsi,
                            from = old_status.as_str(),
                            to = new_status.as_str(),
                            reason,
                            "status changed"
                        );
                    }
                    TrackerEvent::EtaCalculationError { mmsi } => {
                        warn!(mmsi = %mmsi, "eta calculation failed");
                    }
                    _ => {}
                }
            }
        });
    }

    let mut cleanup_tick = tokio::time::interval(CLEANUP_SWEEP_INTERVAL);
    let mut metrics_tick = tokio::time::interval(Duration::from_secs(10));

    // Single-writer loop: every mutation of the registry happens here, in
    // AIS arrival order per vessel.
    loop {
        tokio::select! {
            maybe_record = record_rx.recv() => {
                let Some(first) = maybe_record else {
                    warn!("AIS record channel closed");
                    break;
                };
                let records = drain_latest(first, &mut record_rx, &mut metrics);
                let now = now_ms();
                for record in records {
                    match record {
                        AisRecord::Position(report) => {
                            metrics.position_reports += 1;
                            if let Some(snapshot) = registry.update_vessel(&report, &mut coordinator, now) {
                                if let Some(trigger) = triggers.on_status(&snapshot) {
                                    info!(mmsi = %trigger.mmsi, bridge = trigger.bridge, "trigger: boat_near");
                                }
                            }
                        }
                        AisRecord::Static(static_data) => {
                            metrics.static_reports += 1;
                            registry.update_static(&static_data, now);
                        }
                    }
                }
                publish_output(
                    &registry, &coordinator, &mut text_service,
                    &status_tx, &vessels_tx, &mut metrics, now,
                );
            }
            _ = cleanup_tick.tick() => {
                let now = now_ms();
                let removed = registry.sweep(&mut coordinator, now);
                if !removed.is_empty() {
                    metrics.vessels_removed += removed.len() as u64;
                    for mmsi in &removed {
                        triggers.clear_vessel(mmsi);
                    }
                    publish_output(
                        &registry, &coordinator, &mut text_service,
                        &status_tx, &vessels_tx, &mut metrics, now,
                    );
                }
            }
            _ = metrics_tick.tick() => {
                metrics.vessels_tracked = registry.len();
                metrics_logger.check_and_log(&mut metrics);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown requested");
                break;
            }
        }
    }

    info!("Bridge monitor stopped");
    Ok(())
}
