//! Angle wrapping, armor-ring sector math, and camera/world rotations.
//!
//! The pipeline commits to a single frame convention end-to-end:
//! camera frame is X right, Y down, Z forward (computer-vision standard);
//! the world frame coincides with the camera frame at zero yaw/pitch.
//! Yaw rotates about the vertical (Y) axis, positive = left turn.
//! Pitch rotates about the camera's right (X) axis, positive = tilt down.
//!
//! Detection and Prediction both import these helpers; the convention
//! must not fork between stages.

use nalgebra::{Matrix3, Vector3};

/// π as `f32`.
pub const PI: f32 = std::f32::consts::PI;
/// π/2 as `f32`.
pub const HALF_PI: f32 = 0.5 * PI;
/// π/4 as `f32`.
pub const QUARTER_PI: f32 = 0.25 * PI;
/// 2π as `f32`.
pub const TWO_PI: f32 = 2.0 * PI;

/// Wrap an angle into (−π, π].
#[inline]
pub fn wrap_pi(angle: f32) -> f32 {
    let wrapped = (angle + PI).rem_euclid(TWO_PI) - PI;
    if wrapped <= -PI {
        wrapped + TWO_PI
    } else {
        wrapped
    }
}

/// Degrees to radians.
#[inline]
pub fn deg2rad(deg: f32) -> f32 {
    deg * (PI / 180.0)
}

/// Armor-ring sector of a robot yaw.
///
/// The four armor plates sit at yaw offsets of π/2; the sector index
/// identifies which plate currently faces the camera. Even sectors map
/// to ring 1 (`r1`), odd sectors to ring 2 (`r2`).
///
/// Always returns a value in `{0, 1, 2, 3}`.
#[inline]
pub fn sector_from_yaw(yaw: f32) -> u8 {
    let theta = wrap_pi(yaw);
    let sector = ((theta + QUARTER_PI) / HALF_PI).floor() as i32;
    (sector & 3) as u8
}

/// Fold a yaw into the front half-turn [−π/4, 3π/4).
///
/// Used by the motion model to place the sector-selected armor on its
/// ring: plates repeat every π with alternating radii, so the facing
/// angle only matters modulo π.
#[inline]
pub fn fold_quadrant(yaw: f32) -> f32 {
    (yaw + QUARTER_PI).rem_euclid(PI) - QUARTER_PI
}

/// Rotation about the vertical (Y) axis; positive yaw turns left.
///
/// With X right and Z forward, a left turn carries the forward
/// direction toward −X.
#[inline]
pub fn rot_yaw(yaw: f32) -> Matrix3<f32> {
    let (s, c) = yaw.sin_cos();
    Matrix3::new(
        c, 0.0, -s, //
        0.0, 1.0, 0.0, //
        s, 0.0, c,
    )
}

/// Rotation about the camera's right (X) axis; positive pitch tilts down.
#[inline]
pub fn rot_pitch(pitch: f32) -> Matrix3<f32> {
    let (s, c) = pitch.sin_cos();
    Matrix3::new(
        1.0, 0.0, 0.0, //
        0.0, c, -s, //
        0.0, s, c,
    )
}

/// Camera→world rotation for the given gimbal attitude.
///
/// Pitch is applied first (camera tilt), then yaw (camera pan):
/// `R_cam2world = rot_yaw(yaw) * rot_pitch(pitch)`.
#[inline]
pub fn r_cam2world(yaw: f32, pitch: f32) -> Matrix3<f32> {
    rot_yaw(yaw) * rot_pitch(pitch)
}

/// World→camera rotation (transpose of [`r_cam2world`]).
#[inline]
pub fn r_world2cam(yaw: f32, pitch: f32) -> Matrix3<f32> {
    r_cam2world(yaw, pitch).transpose()
}

/// Rotate a camera-frame position into the world frame.
#[inline]
pub fn cam_to_world(tvec: &Vector3<f32>, yaw: f32, pitch: f32) -> Vector3<f32> {
    r_cam2world(yaw, pitch) * tvec
}
