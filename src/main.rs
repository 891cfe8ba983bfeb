//! Camera Feed Controller CLI
//!
//! Runs the control loop against a camera on the network, saving photos
//! under a local directory.

use camfeed::{
    camera::{CameraLink, CameraTransport},
    controller::{ControlEvent, ControlInput, Controller, ControllerSettings},
    display::NullDisplay,
    metrics::MetricsRegistry,
    storage::LocalStorage,
    timelapse::TickOutcome,
    FileConfig,
};
use clap::Parser;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Pause between control-loop passes.
const PASS_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Parser)]
#[command(name = "camfeed", version, about = "Live preview, snapshot and timelapse controller for an HTTP camera")]
struct Args {
    /// TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Camera API base URL, overriding the configuration.
    #[arg(long)]
    base_url: Option<String>,

    /// Directory that stands in for the storage card.
    #[arg(long, default_value = ".")]
    storage_root: PathBuf,

    /// Start a timelapse session immediately.
    #[arg(long)]
    timelapse: bool,

    /// Take one snapshot after startup.
    #[arg(long)]
    snapshot: bool,

    /// Stop after this many seconds.
    #[arg(long)]
    duration_secs: Option<u64>,
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    info!("camfeed v{}", camfeed::VERSION);

    let mut config = match &args.config {
        Some(path) => match FileConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => FileConfig::default(),
    };
    if let Some(url) = &args.base_url {
        config.camera.base_url = url.clone();
    }
    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = std::fs::create_dir_all(&args.storage_root) {
        eprintln!("Failed to create {}: {}", args.storage_root.display(), e);
        std::process::exit(1);
    }

    #[cfg(feature = "http")]
    let transport = match camfeed::camera::ReqwestTransport::new(
        &config.camera.base_url,
        &config.camera.user_agent,
        config.request_timeout(),
        config.stream_read_timeout(),
    ) {
        Ok(transport) => transport,
        Err(e) => {
            eprintln!("Failed to set up HTTP client: {}", e);
            std::process::exit(1);
        }
    };

    #[cfg(not(feature = "http"))]
    let transport = {
        warn!("Built without the http feature; using a simulated camera");
        simulated_camera()
    };

    run(transport, &config, &args);
}

#[cfg(not(feature = "http"))]
fn simulated_camera() -> camfeed::MockTransport {
    use camfeed::camera::MockReply;

    let frame = vec![
        0xFF, 0xD8, 0xFF, 0xC0, 0x00, 0x11, 0x08, 0x00, 0x78, 0x00, 0xA0, 0x00, 0xFF, 0xD9,
    ];
    let mut transport = camfeed::MockTransport::new();
    transport
        .set_default("/stream", MockReply::raw(frame.repeat(64)))
        .set_default("/capture", MockReply::jpeg(frame));
    transport
}

fn run<T: CameraTransport>(transport: T, config: &FileConfig, args: &Args) {
    let running = Arc::new(AtomicBool::new(true));
    let handler_flag = Arc::clone(&running);
    if let Err(e) = ctrlc::set_handler(move || handler_flag.store(false, Ordering::SeqCst)) {
        warn!("Failed to install Ctrl-C handler: {}", e);
    }

    let registry = match MetricsRegistry::new() {
        Ok(registry) => Some(registry),
        Err(e) => {
            warn!("Metrics disabled: {}", e);
            None
        }
    };

    let link = CameraLink::new(transport, config.camera_profiles());
    let mut controller = Controller::new(
        link,
        LocalStorage::new(&args.storage_root),
        NullDisplay,
        ControllerSettings::from_config(config),
    );

    let mut pending = VecDeque::new();
    if args.snapshot {
        pending.push_back(ControlInput::Snapshot);
    }
    if args.timelapse {
        pending.push_back(ControlInput::StartTimelapse);
    }

    let started = Instant::now();
    let deadline = args.duration_secs.map(|secs| started + Duration::from_secs(secs));
    let mut frames_shown: u64 = 0;

    info!(base_url = %config.camera.base_url, storage = %args.storage_root.display(), "Control loop running");

    while running.load(Ordering::SeqCst) {
        let now = Instant::now();
        if deadline.map_or(false, |at| now >= at) {
            break;
        }

        let input = pending.pop_front().unwrap_or_default();
        match controller.poll(now, input) {
            ControlEvent::FrameShown => frames_shown += 1,
            ControlEvent::SnapshotSaved(path) => info!("Snapshot saved to {}", path.display()),
            ControlEvent::SnapshotFailed(e) => warn!("Snapshot failed: {}", e),
            ControlEvent::TimelapseStarted(id) => info!("Timelapse session {} started", id),
            ControlEvent::TimelapseFailed(e) => warn!("Timelapse could not start: {}", e),
            ControlEvent::Timelapse(TickOutcome::Saved(_)) => {
                if let Some(status) = controller.timelapse().status(now) {
                    info!("{}", status);
                }
            }
            ControlEvent::Timelapse(TickOutcome::Stopped(summary)) => {
                info!("Timelapse session {} captured {} photos", summary.session_id, summary.photo_count)
            }
            _ => {}
        }

        std::thread::sleep(PASS_INTERVAL);
    }

    if let Some(summary) = controller.shutdown(Instant::now()) {
        info!("Timelapse session {} captured {} photos", summary.session_id, summary.photo_count);
    }
    info!(
        frames_shown,
        elapsed_secs = started.elapsed().as_secs(),
        "Control loop stopped"
    );

    if let Some(registry) = registry {
        registry.update(&controller.metrics_snapshot());
        match registry.encode() {
            Ok(text) => println!("{}", text),
            Err(e) => warn!("Failed to encode metrics: {}", e),
        }
    }
}
