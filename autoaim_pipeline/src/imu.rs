//! IMU worker: read, stamp, publish.
//!
//! Angles stay in degrees on the slot; conversion to radians happens
//! at the consumer sites, because some consumers log degrees.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use autoaim_common::types::ImuSample;
use autoaim_common::PipelineResult;
use autoaim_shared::SharedLatest;
use tracing::{info, warn};

/// IMU driver contract.
///
/// `read` blocks at the driver's pace and returns world-frame Euler
/// angles in degrees plus the device-reported time. Implementations
/// must bound the block so the worker can observe the stop flag.
pub trait ImuDriver: Send {
    /// Read the next attitude sample.
    fn read(&mut self) -> PipelineResult<ImuSample>;
}

/// Driver-paced producer for the `imu` slot.
pub struct ImuWorker<D: ImuDriver> {
    driver: D,
    shared: Arc<SharedLatest>,
    stop: Arc<AtomicBool>,
}

impl<D: ImuDriver> ImuWorker<D> {
    /// Create a worker around an opened IMU driver.
    pub fn new(driver: D, shared: Arc<SharedLatest>, stop: Arc<AtomicBool>) -> Self {
        Self {
            driver,
            shared,
            stop,
        }
    }

    /// Run until the stop flag is set.
    pub fn run(&mut self) {
        while !self.stop.load(Ordering::Relaxed) {
            let mut sample = match self.driver.read() {
                Ok(sample) => sample,
                Err(e) => {
                    warn!(error = %e, "imu read failed, retrying");
                    continue;
                }
            };
            sample.timestamp = Instant::now();
            self.shared.imu.publish(sample);
        }
        info!(
            final_version = self.shared.imu.version(),
            "imu worker stopped"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedImu;

    impl ImuDriver for FixedImu {
        fn read(&mut self) -> PipelineResult<ImuSample> {
            Ok(ImuSample {
                timestamp: Instant::now(),
                time: 1.0,
                euler_deg: [0.0, 10.0, 45.0],
            })
        }
    }

    #[test]
    fn published_sample_keeps_degrees() {
        let shared = Arc::new(SharedLatest::new());
        let mut driver = FixedImu;
        let sample = driver.read().unwrap();
        shared.imu.publish(sample);

        let got = shared.imu.load().unwrap();
        assert_eq!(got.euler_deg[2], 45.0);
        assert!((got.yaw_rad() - std::f32::consts::FRAC_PI_4).abs() < 1e-6);
    }
}
