//! Deterministic simulation backends for every external contract.
//!
//! Selected by the binary's `--simulate` flag: the full pipeline runs
//! against these with no camera, IMU, GPU, or MCU attached. All motion
//! is closed-form so test assertions stay deterministic.

use std::time::{Duration, Instant};

use autoaim_common::angles::wrap_pi;
use autoaim_common::types::{CameraFrame, Detection, ImuSample, RobotState, TrackState};
use autoaim_common::PipelineResult;
use nalgebra::Vector3;

use crate::camera::CameraDriver;
use crate::detection::Detector;
use crate::imu::ImuDriver;
use crate::pf::ParticleFilter;
use crate::serial::McuLink;

/// Synthetic camera producing blank frames at a fixed rate.
pub struct SimCamera {
    width: u32,
    height: u32,
    period: Duration,
}

impl SimCamera {
    /// 640×480 at roughly 200 fps.
    pub fn new() -> Self {
        Self {
            width: 640,
            height: 480,
            period: Duration::from_millis(5),
        }
    }
}

impl Default for SimCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraDriver for SimCamera {
    fn grab(&mut self, frame: &mut CameraFrame) -> PipelineResult<()> {
        std::thread::sleep(self.period);
        frame.width = self.width;
        frame.height = self.height;
        frame
            .raw_data
            .resize(self.width as usize * self.height as usize * 3, 0);
        Ok(())
    }
}

/// Level, static attitude at ~1 kHz.
pub struct SimImu {
    t: f32,
}

impl SimImu {
    /// IMU reporting zero roll/pitch/yaw.
    pub fn new() -> Self {
        Self { t: 0.0 }
    }
}

impl Default for SimImu {
    fn default() -> Self {
        Self::new()
    }
}

impl ImuDriver for SimImu {
    fn read(&mut self) -> PipelineResult<ImuSample> {
        std::thread::sleep(Duration::from_millis(1));
        self.t += 0.001;
        Ok(ImuSample {
            timestamp: Instant::now(),
            time: self.t,
            euler_deg: [0.0, 0.0, 0.0],
        })
    }
}

/// Detector reporting one armor of a fixed class at a fixed camera-frame
/// pose on every frame.
pub struct SimDetector {
    /// Reported robot class.
    pub class_id: i32,
    /// Armor position in the camera frame [m].
    pub tvec: Vector3<f32>,
    /// Armor facing angle in the camera frame [rad].
    pub yaw_rad: f32,
}

impl SimDetector {
    /// A class-7 target 3 m straight ahead, facing the camera.
    pub fn new() -> Self {
        Self {
            class_id: 7,
            tvec: Vector3::new(0.0, 0.0, 3.0),
            yaw_rad: 0.0,
        }
    }
}

impl Default for SimDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl Detector for SimDetector {
    fn predict(&mut self, _raw: &[u8], _width: u32, _height: u32) -> Vec<Detection> {
        vec![Detection {
            class_id: self.class_id,
            keypoints: [[0.0; 2]; 4],
            confidence: 0.95,
            tvec: self.tvec,
            yaw_rad: self.yaw_rad,
        }]
    }

    fn refine_keypoints(&mut self, _dets: &mut Vec<Detection>, _width: u32, _height: u32) {}

    fn solve_pnp(&mut self, _dets: &mut [Detection]) {}
}

/// Closed-form CPU stand-in for the particle filter kernels.
///
/// Propagates the state kinematically on `predict` and blends toward
/// measurements on `step` with a fixed gain. The recorded particle count
/// only sizes the real kernel; here it is kept for parity with the
/// production constructor.
pub struct KinematicFilter {
    state: RobotState,
    initialized: bool,
    particle_count: usize,
    gain: f32,
}

impl KinematicFilter {
    /// Create with the configured particle count.
    pub fn new(particle_count: usize) -> Self {
        Self {
            state: RobotState::zeroed(-1, Instant::now()),
            initialized: false,
            particle_count,
            gain: 0.5,
        }
    }

    /// Particle count the kernel was created with.
    pub fn particle_count(&self) -> usize {
        self.particle_count
    }
}

impl ParticleFilter for KinematicFilter {
    fn reset(&mut self, meas: &RobotState) {
        self.state = *meas;
        self.state.track = TrackState::Tracking;
        self.initialized = true;
    }

    fn predict(&mut self, dt: f32) {
        if !self.initialized {
            return;
        }
        use autoaim_common::types::idx::*;
        let s = &mut self.state.state;
        let half_dt2 = 0.5 * dt * dt;
        s[X] += s[VX] * dt + s[AX] * half_dt2;
        s[Y] += s[VY] * dt + s[AY] * half_dt2;
        s[Z] += s[VZ] * dt + s[AZ] * half_dt2;
        s[VX] += s[AX] * dt;
        s[VY] += s[AY] * dt;
        s[VZ] += s[AZ] * dt;
        s[YAW] = wrap_pi(s[YAW] + s[YAW_RATE] * dt + s[YAW_ACC] * half_dt2);
        s[YAW_RATE] += s[YAW_ACC] * dt;
    }

    fn step(&mut self, meas: &RobotState, dt: f32) {
        if !self.initialized {
            self.reset(meas);
            return;
        }
        self.predict(dt);

        use autoaim_common::types::idx::*;
        let g = self.gain;
        let s = &mut self.state.state;
        let m = &meas.state;
        for i in [X, Y, Z, R1, R2, H] {
            s[i] += g * (m[i] - s[i]);
        }
        s[YAW] = wrap_pi(s[YAW] + g * wrap_pi(m[YAW] - s[YAW]));
        self.state.class_id = meas.class_id;
        self.state.timestamp = meas.timestamp;
    }

    fn mean(&self) -> RobotState {
        self.state
    }
}

/// In-memory MCU: records sent frames, replays queued RX bytes.
#[derive(Default)]
pub struct LoopbackLink {
    sent: Vec<Vec<u8>>,
    rx_queue: Vec<u8>,
}

impl LoopbackLink {
    /// Empty loopback.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue bytes to be returned by subsequent `recv` calls.
    pub fn queue_rx(&mut self, bytes: &[u8]) {
        self.rx_queue.extend_from_slice(bytes);
    }

    /// Number of frames sent so far.
    pub fn sent_count(&self) -> usize {
        self.sent.len()
    }
}

impl McuLink for LoopbackLink {
    fn send(&mut self, frame: &[u8]) -> PipelineResult<usize> {
        self.sent.push(frame.to_vec());
        Ok(frame.len())
    }

    fn recv(&mut self, buf: &mut [u8]) -> PipelineResult<usize> {
        let n = self.rx_queue.len().min(buf.len());
        buf[..n].copy_from_slice(&self.rx_queue[..n]);
        self.rx_queue.drain(..n);
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autoaim_common::types::idx;

    #[test]
    fn kinematic_filter_tracks_measurements() {
        let mut filter = KinematicFilter::new(100);
        let mut meas = RobotState::zeroed(7, Instant::now());
        meas.state[idx::Z] = 3.0;
        meas.state[idx::R1] = 0.25;
        meas.state[idx::R2] = 0.25;
        meas.track = TrackState::Reset;

        filter.reset(&meas);
        assert_eq!(filter.mean().state[idx::Z], 3.0);

        // Converges onto a moved target.
        meas.state[idx::Z] = 4.0;
        for _ in 0..20 {
            filter.step(&meas, 0.01);
        }
        assert!((filter.mean().state[idx::Z] - 4.0).abs() < 1e-3);
        assert_eq!(filter.particle_count(), 100);
    }

    #[test]
    fn kinematic_filter_coasts_on_predict() {
        let mut filter = KinematicFilter::new(10);
        let mut meas = RobotState::zeroed(7, Instant::now());
        meas.state[idx::VX] = 2.0;
        filter.reset(&meas);

        for _ in 0..100 {
            filter.predict(0.01);
        }
        assert!((filter.mean().state[idx::X] - 2.0).abs() < 1e-4);
    }

    #[test]
    fn uninitialised_filter_ignores_predict() {
        let mut filter = KinematicFilter::new(10);
        filter.predict(0.01);
        assert_eq!(filter.mean().class_id, -1);
    }

    #[test]
    fn sim_detector_feeds_one_armor() {
        let mut det = SimDetector::new();
        let dets = det.predict(&[], 640, 480);
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].class_id, 7);
    }

    #[test]
    fn loopback_replays_rx() {
        let mut link = LoopbackLink::new();
        link.queue_rx(&[1, 2, 3]);
        let mut buf = [0u8; 8];
        assert_eq!(link.recv(&mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], &[1, 2, 3]);
        assert_eq!(link.recv(&mut buf).unwrap(), 0);
    }
}
