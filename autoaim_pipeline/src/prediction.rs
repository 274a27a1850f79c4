//! Prediction worker: lead-time convergence and gimbal command formation.
//!
//! Edge-triggered on the `pf` slot. Each new posterior mean is projected
//! forward by the converged lead horizon (projectile flight + processing
//! latency + actuator lag), rotated into the gimbal frame, corrected for
//! ballistic drop, clamped to the gimbal limits, and published with the
//! fire/chase/aim flags.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use autoaim_common::angles::{fold_quadrant, r_world2cam, sector_from_yaw};
use autoaim_common::config::PredictionConfig;
use autoaim_common::consts::{
    ALPHA_BULLET_SPEED, ALPHA_PROCESSING_TIME, CHASE_THRESHOLD_M, EDGE_POLL_BACKOFF, GRAVITY,
    HEIGHT_TOLERANCE_M, PREDICTION_CONVERGENCE_THRESHOLD, PREDICTION_MAX_ITERS,
    PROCESSING_TIME_DEFAULT_S, WIDTH_TOLERANCE_M,
};
use autoaim_common::types::{idx, GimbalCommand, ImuSample, RobotState};
use autoaim_shared::{SharedLatest, SharedScalars, VersionCursor};
use nalgebra::Vector3;
use tracing::{info, trace};

use crate::gimbal::GimbalLimits;

/// Exponential smoothing update: `value ← α·measurement + (1−α)·value`.
#[inline]
fn ewma(value: &mut f32, measurement: f32, alpha: f32) {
    *value = alpha * measurement + (1.0 - alpha) * *value;
}

/// Project the robot state forward by `t` seconds and return the aimed
/// armor position in the world frame.
///
/// Centre translates with constant acceleration; yaw advances with rate
/// and acceleration; the facing sector picks the ring radius, and the
/// folded yaw places the plate on that ring.
pub fn motion_model(state: &[f32; 15], t: f32) -> Vector3<f32> {
    let tt = t * t;
    let mut x = state[idx::X] + state[idx::VX] * t + 0.5 * state[idx::AX] * tt;
    let mut y = state[idx::Y] + state[idx::VY] * t + 0.5 * state[idx::AY] * tt;
    let mut z = state[idx::Z] + state[idx::VZ] * t + 0.5 * state[idx::AZ] * tt;

    let yaw = state[idx::YAW] + state[idx::YAW_RATE] * t + 0.5 * state[idx::YAW_ACC] * tt;
    let radius = if sector_from_yaw(yaw) % 2 == 1 {
        state[idx::R2]
    } else {
        state[idx::R1]
    };
    let facing = fold_quadrant(yaw);
    x += radius * facing.sin();
    z -= radius * facing.cos();
    y += state[idx::H];

    Vector3::new(x, y, z)
}

/// Converge the lead time against the motion model.
///
/// Starts from the straight-line flight time to the current centre and
/// iterates `pos ← motion_model(t)`, `t ← ‖pos‖/v + extra_delay` until
/// successive horizons differ by less than the convergence threshold, or
/// the iteration cap is hit. Returns the aimed world position, the
/// converged horizon, and the iteration count.
pub fn converge_lead(
    state: &[f32; 15],
    bullet_speed: f32,
    extra_delay: f32,
) -> (Vector3<f32>, f32, usize) {
    let centre = Vector3::new(state[idx::X], state[idx::Y], state[idx::Z]);
    let mut t_lead = centre.norm() / bullet_speed + extra_delay;
    let mut pos = centre;
    let mut iters = 0;

    while iters < PREDICTION_MAX_ITERS {
        pos = motion_model(state, t_lead);
        let t_next = pos.norm() / bullet_speed + extra_delay;
        let converged = (t_next - t_lead).abs() < PREDICTION_CONVERGENCE_THRESHOLD;
        t_lead = t_next;
        iters += 1;
        if converged {
            break;
        }
    }
    (pos, t_lead, iters)
}

/// Gravity drop over a straight flight of `distance` at `speed` [m].
#[inline]
pub fn bullet_drop(distance: f32, speed: f32) -> f32 {
    let inv_v = 1.0 / speed;
    0.5 * GRAVITY * distance * distance * inv_v * inv_v
}

/// PF-edge-triggered producer for the `prediction` slot.
pub struct PredictionWorker {
    shared: Arc<SharedLatest>,
    scalars: Arc<SharedScalars>,
    stop: Arc<AtomicBool>,
    pf_cursor: VersionCursor,
    limits: GimbalLimits,
    bullet_speed: f32,
    processing_time: f32,
    t_gimbal_actuation: f32,
    tolerance_coeff: f32,
}

impl PredictionWorker {
    /// Create a worker with smoothing state seeded from config.
    pub fn new(
        shared: Arc<SharedLatest>,
        scalars: Arc<SharedScalars>,
        stop: Arc<AtomicBool>,
        config: &PredictionConfig,
        limits: GimbalLimits,
    ) -> Self {
        Self {
            shared,
            scalars,
            stop,
            pf_cursor: VersionCursor::new(),
            limits,
            bullet_speed: config.initial_bullet_speed,
            processing_time: PROCESSING_TIME_DEFAULT_S,
            t_gimbal_actuation: config.t_gimbal_actuation,
            tolerance_coeff: config.tolerance_coeff,
        }
    }

    /// Run until the stop flag is set.
    pub fn run(&mut self) {
        while !self.stop.load(Ordering::Relaxed) {
            let Some(rs) = self.pf_cursor.poll(&self.shared.pf) else {
                std::thread::sleep(EDGE_POLL_BACKOFF);
                continue;
            };
            let imu = self.shared.imu.load();
            let command = self.compute(&rs, imu.as_deref());
            self.shared.prediction.publish(command);
        }
        info!(
            final_version = self.shared.prediction.version(),
            "prediction worker stopped"
        );
    }

    /// Form one gimbal command from a filter state.
    fn compute(&mut self, rs: &RobotState, imu: Option<&ImuSample>) -> GimbalCommand {
        ewma(
            &mut self.bullet_speed,
            self.scalars.bullet_speed.load(),
            ALPHA_BULLET_SPEED,
        );

        let observed_latency = Instant::now()
            .saturating_duration_since(rs.timestamp)
            .as_secs_f32();
        ewma(
            &mut self.processing_time,
            observed_latency,
            ALPHA_PROCESSING_TIME,
        );

        let extra_delay = self.processing_time + self.t_gimbal_actuation;
        let (pos_world, t_lead, iters) = converge_lead(&rs.state, self.bullet_speed, extra_delay);
        trace!(t_lead, iters, "lead converged");

        let (yaw_imu, pitch_imu) = match imu {
            Some(imu) => (imu.yaw_rad(), imu.pitch_rad()),
            None => (0.0, 0.0),
        };
        let mut pos_cam = r_world2cam(yaw_imu, pitch_imu) * pos_world;

        let distance = pos_cam.norm();
        pos_cam.y += bullet_drop(distance, self.bullet_speed);

        let mut yaw_cmd = pos_cam.x.atan2(pos_cam.z);
        let mut pitch_cmd = pos_cam.y.atan2(pos_cam.z);
        self.limits.apply(&mut yaw_cmd, &mut pitch_cmd);

        let half_coeff = 0.5 * self.tolerance_coeff;
        let fire = pos_cam.x.abs() < WIDTH_TOLERANCE_M * half_coeff
            && pos_cam.y.abs() < HEIGHT_TOLERANCE_M * half_coeff;
        let chase = pos_cam.z > CHASE_THRESHOLD_M;

        GimbalCommand {
            yaw: yaw_cmd,
            pitch: pitch_cmd,
            fire,
            chase,
            aim: true, // reserved for a future filter lock state
            timestamp: Instant::now(),
        }
    }
}
