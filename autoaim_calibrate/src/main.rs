//! # Gimbal Pitch Calibration Tool
//!
//! One-shot, out-of-band tool that measures the gimbal's physical pitch
//! limits and writes the `gimbal:` calibration artifact consumed by the
//! runtime configuration.
//!
//! The operator manually holds the gimbal against each hard stop; the
//! tool records 50 IMU samples per stop, takes the median, applies the
//! safety margin, and writes the result as YAML.
//!
//! ```bash
//! autoaim_calibrate --output gimbal.yaml
//! ```
//!
//! Reads attitude through the same [`ImuDriver`] contract as the
//! runtime; this build binds the simulation driver, hardware IMUs are
//! wired at integration.

use std::io::Write as _;
use std::path::PathBuf;
use std::time::Duration;

use autoaim_common::config::GimbalConfig;
use autoaim_pipeline::imu::ImuDriver;
use autoaim_pipeline::sim::SimImu;
use clap::Parser;
use serde::Serialize;

/// Samples recorded per hard stop.
const SAMPLES_PER_STOP: usize = 50;

/// Interval between samples.
const SAMPLE_INTERVAL: Duration = Duration::from_millis(20);

/// Safety margin applied to both measured limits [rad] (~3°).
const SAFETY_MARGIN: f32 = 0.0524;

/// Gimbal pitch-limit calibration
#[derive(Parser, Debug)]
#[command(name = "autoaim_calibrate")]
#[command(version)]
#[command(about = "Guided gimbal pitch-limit calibration producing the runtime artifact")]
struct Args {
    /// Output path for the YAML calibration artifact.
    #[arg(short, long, default_value = "gimbal.yaml")]
    output: PathBuf,

    /// Skip the interactive confirmations (sample immediately).
    #[arg(short = 'y', long)]
    non_interactive: bool,
}

/// Artifact document: a `gimbal:` section mergeable into the runtime
/// config.
#[derive(Debug, Serialize)]
struct Artifact {
    gimbal: GimbalConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let mut imu = SimImu::new();

    println!("gimbal pitch calibration");
    println!("========================\n");

    let pitch_min = calibrate_stop(
        &mut imu,
        "STEP 1/2: tilt the gimbal DOWN to its hard stop and hold it",
        args.non_interactive,
    )?;
    println!("  minimum pitch: {pitch_min:.4} rad ({:.1}°)\n", pitch_min.to_degrees());

    let pitch_max = calibrate_stop(
        &mut imu,
        "STEP 2/2: tilt the gimbal UP to its hard stop and hold it",
        args.non_interactive,
    )?;
    println!("  maximum pitch: {pitch_max:.4} rad ({:.1}°)\n", pitch_max.to_degrees());

    let range = pitch_max - pitch_min;
    if range <= 2.0 * SAFETY_MARGIN {
        return Err(format!(
            "measured range {range:.4} rad is too small - did the gimbal move between steps?"
        )
        .into());
    }

    let artifact = Artifact {
        gimbal: GimbalConfig {
            pitch_min: pitch_min + SAFETY_MARGIN,
            pitch_max: pitch_max - SAFETY_MARGIN,
            safety_margin: SAFETY_MARGIN,
            ..GimbalConfig::default()
        },
    };

    let yaml = serde_yaml::to_string(&artifact)?;
    std::fs::write(&args.output, &yaml)?;
    println!("calibration written to {:?}:\n\n{yaml}", args.output);
    Ok(())
}

/// Guide the operator to one hard stop and return the median pitch.
fn calibrate_stop<D: ImuDriver>(
    imu: &mut D,
    instruction: &str,
    non_interactive: bool,
) -> Result<f32, Box<dyn std::error::Error>> {
    println!("{instruction}");
    if !non_interactive {
        print!("press ENTER when the gimbal is held steady... ");
        std::io::stdout().flush()?;
        let mut line = String::new();
        std::io::stdin().read_line(&mut line)?;
    }

    print!("recording {SAMPLES_PER_STOP} samples ");
    std::io::stdout().flush()?;
    let mut samples = Vec::with_capacity(SAMPLES_PER_STOP);
    while samples.len() < SAMPLES_PER_STOP {
        match imu.read() {
            Ok(sample) => {
                samples.push(sample.pitch_rad());
                print!(".");
                std::io::stdout().flush()?;
            }
            Err(e) => {
                eprintln!("\nimu read failed: {e}, retrying");
            }
        }
        std::thread::sleep(SAMPLE_INTERVAL);
    }
    println!(" done");

    Ok(median(&mut samples))
}

/// Median of a sample set (mean of the middle pair for even counts).
fn median(samples: &mut [f32]) -> f32 {
    samples.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = samples.len();
    if n % 2 == 0 {
        (samples[n / 2 - 1] + samples[n / 2]) / 2.0
    } else {
        samples[n / 2]
    }
}
