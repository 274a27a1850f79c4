//! The process-wide registry of stage outputs.

use autoaim_common::types::{CameraFrame, GimbalCommand, ImuSample, RobotState};

use crate::slot::LatestSlot;

/// One slot per stage output; data flows strictly forward.
///
/// Each slot has exactly one producer:
///
/// | Slot | Producer | Consumers |
/// |---|---|---|
/// | `camera` | camera worker | detection |
/// | `imu` | IMU worker | detection, prediction |
/// | `detection` | detection worker | particle filter |
/// | `pf` | particle filter worker | prediction |
/// | `prediction` | prediction worker | USB TX |
#[derive(Debug, Default)]
pub struct SharedLatest {
    /// Latest grabbed frame.
    pub camera: LatestSlot<CameraFrame>,
    /// Latest attitude sample.
    pub imu: LatestSlot<ImuSample>,
    /// Latest measurement formed from a frame.
    pub detection: LatestSlot<RobotState>,
    /// Latest filter posterior mean.
    pub pf: LatestSlot<RobotState>,
    /// Latest gimbal command.
    pub prediction: LatestSlot<GimbalCommand>,
}

impl SharedLatest {
    /// Empty registry, all slots at version 0.
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn slots_start_empty() {
        let shared = SharedLatest::new();
        assert_eq!(shared.camera.version(), 0);
        assert_eq!(shared.imu.version(), 0);
        assert_eq!(shared.detection.version(), 0);
        assert_eq!(shared.pf.version(), 0);
        assert_eq!(shared.prediction.version(), 0);
        assert!(shared.camera.load().is_none());
    }

    #[test]
    fn slots_are_independent() {
        let shared = SharedLatest::new();
        shared.imu.publish(ImuSample {
            timestamp: Instant::now(),
            time: 0.0,
            euler_deg: [0.0; 3],
        });
        assert_eq!(shared.imu.version(), 1);
        assert_eq!(shared.camera.version(), 0);
    }
}
