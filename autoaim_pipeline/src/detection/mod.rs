//! Detection worker: frame → armors → tracked robot measurement.
//!
//! Edge-triggered on the `camera` slot. Each new frame runs the detector
//! stack (inference, keypoint refinement, PnP), groups armors into
//! robots, lets the [`selector::Selector`] pick the tracked group,
//! rotates it into the world frame with the current IMU attitude, and
//! publishes a [`RobotState`] measurement carrying the frame timestamp.

pub mod robot;
pub mod selector;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use autoaim_common::angles::{cam_to_world, wrap_pi};
use autoaim_common::config::DetectionConfig;
use autoaim_common::consts::EDGE_POLL_BACKOFF;
use autoaim_common::types::{CameraFrame, Detection, RobotState, TrackState};
use autoaim_shared::{SharedLatest, VersionCursor};
use tracing::{debug, info};

pub use robot::{form_robot, from_one_armor, from_two_armors, group_armors};
pub use selector::{Selection, Selector};

/// Detector stack contract: inference, refinement, and pose recovery.
///
/// All three stages run on the detection thread; `tvec` is in metres and
/// `yaw_rad` in the camera frame after [`Detector::solve_pnp`].
pub trait Detector: Send {
    /// Run inference over a packed BGR24 buffer.
    fn predict(&mut self, raw: &[u8], width: u32, height: u32) -> Vec<Detection>;

    /// Refine keypoints with traditional CV and update confidences.
    fn refine_keypoints(&mut self, dets: &mut Vec<Detection>, width: u32, height: u32);

    /// Solve PnP per detection, populating `tvec` and `yaw_rad`.
    fn solve_pnp(&mut self, dets: &mut [Detection]);
}

/// Camera-edge-triggered producer for the `detection` slot.
pub struct DetectionWorker<D: Detector> {
    detector: D,
    shared: Arc<SharedLatest>,
    stop: Arc<AtomicBool>,
    selector: Selector,
    camera_cursor: VersionCursor,
    confidence_threshold: f32,
    default_radius: f32,
    prev_state: Option<RobotState>,
    prev_frame_time: Option<Instant>,
}

impl<D: Detector> DetectionWorker<D> {
    /// Create a worker around a loaded detector stack.
    pub fn new(
        detector: D,
        shared: Arc<SharedLatest>,
        stop: Arc<AtomicBool>,
        config: &DetectionConfig,
    ) -> Self {
        Self {
            detector,
            shared,
            stop,
            selector: Selector::new(config.max_ttl),
            camera_cursor: VersionCursor::new(),
            confidence_threshold: config.confidence_threshold,
            default_radius: config.default_radius,
            prev_state: None,
            prev_frame_time: None,
        }
    }

    /// Run until the stop flag is set.
    pub fn run(&mut self) {
        while !self.stop.load(Ordering::Relaxed) {
            let Some(frame) = self.camera_cursor.poll(&self.shared.camera) else {
                std::thread::sleep(EDGE_POLL_BACKOFF);
                continue;
            };
            self.process_frame(&frame);
        }
        info!(
            final_version = self.shared.detection.version(),
            "detection worker stopped"
        );
    }

    /// One full detection cycle over a grabbed frame.
    fn process_frame(&mut self, frame: &CameraFrame) {
        let dt = self
            .prev_frame_time
            .map(|prev| frame.timestamp.saturating_duration_since(prev).as_secs_f32())
            .unwrap_or(0.0);
        self.prev_frame_time = Some(frame.timestamp);

        let mut dets = self
            .detector
            .predict(&frame.raw_data, frame.width, frame.height);
        self.detector
            .refine_keypoints(&mut dets, frame.width, frame.height);
        dets.retain(|d| d.confidence >= self.confidence_threshold);
        self.detector.solve_pnp(&mut dets);

        let groups = group_armors(&dets);
        let selection = self.selector.select(&groups, dt);

        // Rotate the selected group into the world frame. Without an IMU
        // sample yet, camera and world coincide.
        let (yaw_imu, pitch_imu) = match self.shared.imu.load() {
            Some(imu) => (imu.yaw_rad(), imu.pitch_rad()),
            None => (0.0, 0.0),
        };
        let world: Vec<Detection> = selection
            .armors
            .iter()
            .map(|d| {
                let mut w = *d;
                w.tvec = cam_to_world(&d.tvec, yaw_imu, pitch_imu);
                w.yaw_rad = wrap_pi(d.yaw_rad + yaw_imu);
                w
            })
            .collect();

        // A fresh acquisition must not inherit the previous robot's ring
        // geometry.
        let prior = if selection.acquired {
            None
        } else {
            self.prev_state.as_ref()
        };

        match form_robot(&world, prior, self.default_radius, frame.timestamp) {
            Ok(mut measurement) => {
                measurement.track = if selection.acquired {
                    TrackState::Reset
                } else {
                    TrackState::Tracking
                };
                self.prev_state = Some(measurement);
                self.shared.detection.publish(measurement);
            }
            Err(e) => {
                debug!(
                    error = %e,
                    target_id = ?self.selector.target(),
                    "no measurement this cycle"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autoaim_common::types::ImuSample;
    use nalgebra::Vector3;

    /// Emits one armor at a fixed camera-frame pose for every frame.
    struct OneTargetDetector {
        tvec: Vector3<f32>,
        yaw_rad: f32,
    }

    impl Detector for OneTargetDetector {
        fn predict(&mut self, _raw: &[u8], _w: u32, _h: u32) -> Vec<Detection> {
            vec![Detection {
                class_id: 7,
                keypoints: [[0.0; 2]; 4],
                confidence: 0.9,
                tvec: self.tvec,
                yaw_rad: self.yaw_rad,
            }]
        }

        fn refine_keypoints(&mut self, _dets: &mut Vec<Detection>, _w: u32, _h: u32) {}

        fn solve_pnp(&mut self, _dets: &mut [Detection]) {}
    }

    fn make_worker(
        shared: &Arc<SharedLatest>,
        tvec: Vector3<f32>,
    ) -> DetectionWorker<OneTargetDetector> {
        DetectionWorker::new(
            OneTargetDetector { tvec, yaw_rad: 0.0 },
            Arc::clone(shared),
            Arc::new(AtomicBool::new(false)),
            &DetectionConfig::default(),
        )
    }

    fn frame_at(timestamp: Instant) -> CameraFrame {
        CameraFrame {
            timestamp,
            width: 4,
            height: 2,
            raw_data: vec![0; 24],
        }
    }

    #[test]
    fn first_measurement_requests_filter_reset() {
        let shared = Arc::new(SharedLatest::new());
        let mut worker = make_worker(&shared, Vector3::new(0.0, 0.0, 3.0));

        let frame_time = Instant::now();
        worker.process_frame(&frame_at(frame_time));

        let meas = shared.detection.load().unwrap();
        assert_eq!(meas.track, TrackState::Reset);
        assert_eq!(meas.class_id, 7);
        assert_eq!(meas.timestamp, frame_time);

        // Second frame of the same target: plain tracking update.
        worker.process_frame(&frame_at(Instant::now()));
        let meas = shared.detection.load().unwrap();
        assert_eq!(meas.track, TrackState::Tracking);
        assert_eq!(shared.detection.version(), 2);
    }

    #[test]
    fn low_confidence_detections_are_dropped() {
        let shared = Arc::new(SharedLatest::new());
        let mut worker = make_worker(&shared, Vector3::new(0.0, 0.0, 3.0));
        worker.confidence_threshold = 0.95; // above the stub's 0.9

        worker.process_frame(&frame_at(Instant::now()));
        assert_eq!(shared.detection.version(), 0);
    }

    #[test]
    fn world_rotation_applies_imu_yaw() {
        let shared = Arc::new(SharedLatest::new());
        let mut worker = make_worker(&shared, Vector3::new(0.0, 0.0, 3.0));

        // Camera panned left 90°: the target straight ahead lies at
        // world −X, facing world yaw π/2.
        shared.imu.publish(ImuSample {
            timestamp: Instant::now(),
            time: 0.0,
            euler_deg: [0.0, 0.0, 90.0],
        });
        worker.process_frame(&frame_at(Instant::now()));

        let meas = shared.detection.load().unwrap();
        let r = DetectionConfig::default().default_radius;
        assert!((meas.state[autoaim_common::types::idx::X] + 3.0 + r).abs() < 1e-4);
        assert!((meas.yaw() - std::f32::consts::FRAC_PI_2).abs() < 1e-4);
    }
}
