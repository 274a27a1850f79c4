//! # Autoaim Pipeline
//!
//! The six worker stages of the aim-and-fire controller and the domain
//! algorithms that run inside them. Workers exchange latest-value
//! snapshots through [`autoaim_shared::SharedLatest`] and never couple
//! on rate:
//!
//! | Worker | Pace | Reads | Writes |
//! |---|---|---|---|
//! | [`camera::CameraWorker`] | SDK-paced | device | `camera` |
//! | [`imu::ImuWorker`] | driver-paced | device | `imu` |
//! | [`detection::DetectionWorker`] | camera edge | `camera`, `imu` | `detection` |
//! | [`pf::PfWorker`] | 100 Hz | `detection` | `pf` |
//! | [`prediction::PredictionWorker`] | pf edge | `pf`, `imu`, scalars | `prediction` |
//! | [`serial::UsbWorker`] | prediction edge | `prediction`, device | scalars |
//!
//! Device SDKs, the detector, and the particle filter kernels are
//! external: each is a trait here ([`camera::CameraDriver`],
//! [`imu::ImuDriver`], [`detection::Detector`], [`pf::ParticleFilter`],
//! [`serial::McuLink`]) with deterministic simulation implementations in
//! [`sim`] so the full pipeline runs without hardware.

pub mod camera;
pub mod detection;
pub mod gimbal;
pub mod imu;
pub mod pf;
pub mod pool;
pub mod prediction;
pub mod rt;
pub mod serial;
pub mod sim;
