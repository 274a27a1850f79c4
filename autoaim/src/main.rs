//! # Autoaim Supervisor Binary
//!
//! Wires the six pipeline workers to their backends, runs them on
//! dedicated OS threads, and coordinates shutdown.
//!
//! # Usage
//!
//! ```bash
//! # Full simulation (no hardware, loopback serial)
//! autoaim --config config/autoaim.yaml --simulate
//!
//! # Real MCU link, simulation perception backends
//! autoaim --config config/autoaim.yaml --device /dev/ttyUSB0
//!
//! # Verbose JSON logs
//! autoaim --config config/autoaim.yaml -s -v --json
//! ```
//!
//! Exit codes: 0 on a clean shutdown, 1 on a fatal startup failure
//! (invalid configuration, or the mandatory serial transport failed to
//! open).

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use autoaim_common::config::{ConfigLoader, LogLevel, PipelineConfig};
use autoaim_common::PipelineError;
use autoaim_pipeline::camera::CameraWorker;
use autoaim_pipeline::detection::DetectionWorker;
use autoaim_pipeline::gimbal::GimbalLimits;
use autoaim_pipeline::imu::ImuWorker;
use autoaim_pipeline::pf::PfWorker;
use autoaim_pipeline::prediction::PredictionWorker;
use autoaim_pipeline::serial::{McuLink, SerialPort, UsbWorker};
use autoaim_pipeline::sim::{KinematicFilter, LoopbackLink, SimCamera, SimDetector, SimImu};
use autoaim_pipeline::rt;
use autoaim_shared::{SharedLatest, SharedScalars};
use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

/// Autoaim - robotic aim-and-fire pipeline supervisor
#[derive(Parser, Debug)]
#[command(name = "autoaim")]
#[command(version)]
#[command(about = "Aim-and-fire pipeline: detection, tracking, prediction, gimbal control")]
struct Args {
    /// Path to the YAML pipeline configuration.
    #[arg(short, long, default_value = "/etc/autoaim/autoaim.yaml")]
    config: PathBuf,

    /// Serial device override (takes precedence over the config).
    #[arg(short, long)]
    device: Option<String>,

    /// Full simulation: perception backends and a loopback serial link.
    #[arg(short = 's', long)]
    simulate: bool,

    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

fn main() {
    if let Err(e) = run() {
        // The subscriber may not be installed yet when startup fails.
        eprintln!("fatal: {e}");
        error!("fatal: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = PipelineConfig::load(&args.config)?;
    if let Some(device) = &args.device {
        config.serial.device = device.clone();
    }
    config
        .validate()
        .map_err(|e| PipelineError::ConfigInvalid(e.to_string()))?;

    setup_tracing(&args, config.shared.log_level);
    info!(
        service = %config.shared.service_name,
        "autoaim v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        ctrlc::set_handler(move || {
            info!("received shutdown signal");
            stop.store(true, Ordering::Relaxed);
        })?;
    }

    if args.simulate {
        info!("simulation mode: loopback serial link");
        run_pipeline(LoopbackLink::new(), &config, stop);
    } else {
        // The MCU link is the one mandatory transport.
        let port = SerialPort::open(&config.serial.device, config.serial.baud)?;
        info!("perception backends: simulation (SDK bindings are wired at integration)");
        run_pipeline(port, &config, stop);
    }

    info!("autoaim shutdown complete");
    Ok(())
}

/// Spawn all six workers and join them in reverse dependency order.
fn run_pipeline<L: McuLink + 'static>(link: L, config: &PipelineConfig, stop: Arc<AtomicBool>) {
    let shared = Arc::new(SharedLatest::new());
    let scalars = Arc::new(SharedScalars::new(config.prediction.initial_bullet_speed));

    let mut camera = CameraWorker::new(SimCamera::new(), Arc::clone(&shared), Arc::clone(&stop));
    let mut imu = ImuWorker::new(SimImu::new(), Arc::clone(&shared), Arc::clone(&stop));
    let mut detection = DetectionWorker::new(
        SimDetector::new(),
        Arc::clone(&shared),
        Arc::clone(&stop),
        &config.detection,
    );
    let mut pf = PfWorker::new(
        KinematicFilter::new(config.pf.particle_count),
        Arc::clone(&shared),
        Arc::clone(&stop),
    );
    let mut prediction = PredictionWorker::new(
        Arc::clone(&shared),
        Arc::clone(&scalars),
        Arc::clone(&stop),
        &config.prediction,
        GimbalLimits::from_config(&config.gimbal),
    );
    let mut usb = UsbWorker::new(
        link,
        Arc::clone(&shared),
        Arc::clone(&scalars),
        Arc::clone(&stop),
    );

    // One OS thread per worker, pinned by role when the rt feature is on.
    let camera_t = spawn_worker("camera", 0, move || camera.run());
    let imu_t = spawn_worker("imu", 1, move || imu.run());
    let detection_t = spawn_worker("detection", 2, move || detection.run());
    let pf_t = spawn_worker("pf", 3, move || pf.run());
    let prediction_t = spawn_worker("prediction", 4, move || prediction.run());
    let usb_t = spawn_worker("usb", 5, move || usb.run());

    // Park until shutdown is requested.
    while !stop.load(Ordering::Relaxed) {
        std::thread::sleep(std::time::Duration::from_millis(50));
    }

    // Join in reverse dependency order so every consumer drains before
    // its producer goes away.
    for (name, handle) in [
        ("usb", usb_t),
        ("prediction", prediction_t),
        ("pf", pf_t),
        ("detection", detection_t),
        ("imu", imu_t),
        ("camera", camera_t),
    ] {
        if handle.join().is_err() {
            error!(worker = name, "worker thread panicked");
        }
    }
}

fn spawn_worker<F>(name: &str, cpu: usize, body: F) -> std::thread::JoinHandle<()>
where
    F: FnOnce() + Send + 'static,
{
    std::thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            rt::pin_current_thread(cpu);
            body();
        })
        .unwrap_or_else(|e| panic!("failed to spawn {name} worker: {e}"))
}

/// Set up the tracing subscriber from CLI arguments and config.
fn setup_tracing(args: &Args, config_level: LogLevel) {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        match config_level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_thread_names(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_thread_names(true)
            .init();
    }
}
