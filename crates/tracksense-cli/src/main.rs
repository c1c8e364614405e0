//! `tracksense` – simulated cone-detection node.
//!
//! 1. Initialises logging (`RUST_LOG`, `TRACKSENSE_LOG_FORMAT`).
//! 2. Resolves the configuration, falling back to defaults on any problem.
//! 3. Loads the track file into the landmark map.
//! 4. Opens the UDP bus. Failure here is fatal.
//! 5. Runs the pipeline until Ctrl-C or a fatal bus read error.

mod config;
mod track;

use std::process::ExitCode;

use tracing::{error, info, warn};
use tracksense_middleware::UdpBus;
use tracksense_perception::DetectionEngine;
use tracksense_runtime::{Pipeline, telemetry};
use tracksense_types::SenseError;

fn main() -> ExitCode {
    telemetry::init_tracing();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "tracksense stopped with an error");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), SenseError> {
    let cfg = config::resolve(&config::config_path());
    info!(
        bind = %cfg.bus.bind,
        peers = ?cfg.bus.peers,
        detection_range = cfg.perception.detection_range,
        bearing_unit = ?cfg.perception.bearing_unit,
        "starting tracksense"
    );

    let map = track::load(&cfg.track.path);
    let engine = DetectionEngine::new(cfg.perception.clone(), cfg.ids, map)?;

    let inbound = UdpBus::open(cfg.bus.bind, cfg.bus.peers.clone())?;
    let outbound = inbound.try_clone()?;

    let pipeline = Pipeline::spawn(inbound, outbound, engine, &cfg.runtime)?;

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    let signal = pipeline.shutdown_signal();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("shutdown requested");
        signal.trigger();
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; graceful shutdown on Ctrl-C will not be available");
    }

    let report = pipeline.join()?;
    info!(
        frames = report.ingest.frames,
        poses = report.ingest.poses,
        detections = report.ingest.detections.accepted,
        out_of_range = report.ingest.detections.out_of_range,
        overflowed = report.ingest.detections.overflowed,
        written = report.writer.written,
        failed = report.writer.failed,
        "tracksense stopped"
    );
    Ok(())
}
