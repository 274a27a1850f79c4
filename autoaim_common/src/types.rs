//! Data types exchanged between pipeline stages.
//!
//! Every type here is published through the latest-value registry as an
//! immutable snapshot: once a value is handed to `publish`, no field is
//! ever mutated again. Consumers that need a modified copy clone first.

use std::time::Instant;

use nalgebra::Vector3;

/// One raw frame grabbed from the camera SDK.
///
/// `raw_data` is packed BGR24, `width * height * 3` bytes. The timestamp
/// is taken by the camera worker on grab return and travels with the
/// frame through detection, the particle filter, and prediction.
#[derive(Debug, Clone)]
pub struct CameraFrame {
    /// Grab time (monotonic).
    pub timestamp: Instant,
    /// Frame width [px].
    pub width: u32,
    /// Frame height [px].
    pub height: u32,
    /// Packed BGR24 pixels, `width * height * 3` bytes.
    pub raw_data: Vec<u8>,
}

impl CameraFrame {
    /// Expected byte length of `raw_data` for the frame dimensions.
    #[inline]
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

/// One attitude sample from the IMU driver.
///
/// Euler angles arrive in **degrees** in the world frame; consumers
/// convert to radians where needed (some log sinks want degrees).
#[derive(Debug, Clone, Copy)]
pub struct ImuSample {
    /// Sample time (monotonic, stamped by the IMU worker).
    pub timestamp: Instant,
    /// Device-reported time [s].
    pub time: f32,
    /// `[roll, pitch, yaw]` in degrees, world frame.
    pub euler_deg: [f32; 3],
}

impl ImuSample {
    /// Pitch in radians.
    #[inline]
    pub fn pitch_rad(&self) -> f32 {
        crate::angles::deg2rad(self.euler_deg[1])
    }

    /// Yaw in radians.
    #[inline]
    pub fn yaw_rad(&self) -> f32 {
        crate::angles::deg2rad(self.euler_deg[2])
    }
}

/// A single armor-plate observation after PnP.
///
/// `tvec` and `yaw_rad` start in the camera frame; the detection worker
/// rotates the selected group into the world frame before forming a
/// robot, so a `Detection` inside a published [`RobotState`] cycle is
/// already world-frame.
#[derive(Debug, Clone, Copy)]
pub struct Detection {
    /// Robot class reported by the detector.
    pub class_id: i32,
    /// Refined corner keypoints `[x, y]` [px].
    pub keypoints: [[f32; 2]; 4],
    /// Detector confidence in [0, 1].
    pub confidence: f32,
    /// Armor centre translation [m].
    pub tvec: Vector3<f32>,
    /// Armor facing angle [rad].
    pub yaw_rad: f32,
}

/// Particle filter lifecycle request carried on a measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackState {
    /// Continue filtering with this measurement.
    #[default]
    Tracking,
    /// Reinitialise the particle set from this measurement before stepping.
    Reset,
}

/// Index constants for the 15-slot robot state vector.
pub mod idx {
    /// Centre position X [m].
    pub const X: usize = 0;
    /// Centre position Y [m].
    pub const Y: usize = 1;
    /// Centre position Z [m].
    pub const Z: usize = 2;
    /// Velocity X [m/s].
    pub const VX: usize = 3;
    /// Velocity Y [m/s].
    pub const VY: usize = 4;
    /// Velocity Z [m/s].
    pub const VZ: usize = 5;
    /// Acceleration X [m/s²].
    pub const AX: usize = 6;
    /// Acceleration Y [m/s²].
    pub const AY: usize = 7;
    /// Acceleration Z [m/s²].
    pub const AZ: usize = 8;
    /// Robot yaw [rad].
    pub const YAW: usize = 9;
    /// Yaw rate [rad/s].
    pub const YAW_RATE: usize = 10;
    /// Yaw acceleration [rad/s²].
    pub const YAW_ACC: usize = 11;
    /// Armor ring 1 radius [m].
    pub const R1: usize = 12;
    /// Armor ring 2 radius [m].
    pub const R2: usize = 13;
    /// Vertical offset between rings [m].
    pub const H: usize = 14;
}

/// Tracked robot state: the measurement emitted by Detection and the
/// posterior mean emitted by the particle filter.
///
/// The state vector layout is
/// `[x y z vx vy vz ax ay az yaw yaw_rate yaw_acc r1 r2 h]`
/// (see [`idx`]). `timestamp` is the originating camera frame's grab
/// time, carried unchanged through the filter.
#[derive(Debug, Clone, Copy)]
pub struct RobotState {
    /// 15-slot state vector.
    pub state: [f32; 15],
    /// Robot class this state tracks.
    pub class_id: i32,
    /// Originating camera frame timestamp.
    pub timestamp: Instant,
    /// Filter lifecycle request.
    pub track: TrackState,
}

impl RobotState {
    /// Zeroed state for the given class and source timestamp.
    pub fn zeroed(class_id: i32, timestamp: Instant) -> Self {
        Self {
            state: [0.0; 15],
            class_id,
            timestamp,
            track: TrackState::Tracking,
        }
    }

    /// Centre position [m].
    #[inline]
    pub fn position(&self) -> Vector3<f32> {
        Vector3::new(self.state[idx::X], self.state[idx::Y], self.state[idx::Z])
    }

    /// Robot yaw [rad].
    #[inline]
    pub fn yaw(&self) -> f32 {
        self.state[idx::YAW]
    }

    /// Ring radii `(r1, r2)` [m].
    #[inline]
    pub fn radii(&self) -> (f32, f32) {
        (self.state[idx::R1], self.state[idx::R2])
    }

    /// Both radii are strictly positive.
    #[inline]
    pub fn radii_valid(&self) -> bool {
        self.state[idx::R1] > 0.0 && self.state[idx::R2] > 0.0
    }
}

/// Gimbal command produced by the prediction stage, consumed by USB TX.
///
/// Angles are in the camera/gimbal frame, radians.
#[derive(Debug, Clone, Copy)]
pub struct GimbalCommand {
    /// Yaw command [rad].
    pub yaw: f32,
    /// Pitch command [rad].
    pub pitch: f32,
    /// Target inside the fire window.
    pub fire: bool,
    /// Target beyond the chase distance.
    pub chase: bool,
    /// Aim solution valid (reserved for filter lock state).
    pub aim: bool,
    /// Command formation time (monotonic).
    pub timestamp: Instant,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camera_frame_expected_len() {
        let frame = CameraFrame {
            timestamp: Instant::now(),
            width: 640,
            height: 480,
            raw_data: vec![0; 640 * 480 * 3],
        };
        assert_eq!(frame.raw_data.len(), frame.expected_len());
    }

    #[test]
    fn imu_sample_converts_degrees() {
        let imu = ImuSample {
            timestamp: Instant::now(),
            time: 0.0,
            euler_deg: [0.0, 90.0, -180.0],
        };
        assert!((imu.pitch_rad() - std::f32::consts::FRAC_PI_2).abs() < 1e-6);
        assert!((imu.yaw_rad() + std::f32::consts::PI).abs() < 1e-6);
    }

    #[test]
    fn robot_state_accessors() {
        let mut rs = RobotState::zeroed(3, Instant::now());
        rs.state[idx::X] = 1.0;
        rs.state[idx::Z] = 5.0;
        rs.state[idx::R1] = 0.2;
        rs.state[idx::R2] = 0.3;
        assert_eq!(rs.position(), Vector3::new(1.0, 0.0, 5.0));
        assert_eq!(rs.radii(), (0.2, 0.3));
        assert!(rs.radii_valid());
    }

    #[test]
    fn zeroed_state_has_invalid_radii() {
        let rs = RobotState::zeroed(0, Instant::now());
        assert!(!rs.radii_valid());
        assert_eq!(rs.track, TrackState::Tracking);
    }
}
