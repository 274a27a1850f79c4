//! Pipeline-wide constants.
//!
//! Single source of truth for numeric defaults and tuning values.
//! Imported by all crates; no duplication permitted. Values that are
//! expected to differ between robots live in [`crate::config`] instead;
//! the defaults here seed those config sections.

use std::time::Duration;

/// Exponential smoothing factor for the measured bullet speed.
pub const ALPHA_BULLET_SPEED: f32 = 0.1;

/// Exponential smoothing factor for the observed processing latency.
pub const ALPHA_PROCESSING_TIME: f32 = 0.1;

/// Lead-time convergence threshold [s].
pub const PREDICTION_CONVERGENCE_THRESHOLD: f32 = 0.01;

/// Maximum lead-time fixed-point iterations per prediction cycle.
pub const PREDICTION_MAX_ITERS: usize = 10;

/// Forward distance beyond which the chase flag is raised [m].
pub const CHASE_THRESHOLD_M: f32 = 6.0;

/// Armor plate width tolerance for the fire window [m].
pub const WIDTH_TOLERANCE_M: f32 = 0.13;

/// Armor plate height tolerance for the fire window [m].
pub const HEIGHT_TOLERANCE_M: f32 = 0.13;

/// Empirical scaling applied to both fire-window tolerances.
pub const TOLERANCE_COEFF_DEFAULT: f32 = 1.0;

/// Particle filter tick period (100 Hz).
pub const PF_TICK: Duration = Duration::from_millis(10);

/// Particle filter step size [s]; equals [`PF_TICK`].
pub const PF_DT: f32 = 0.01;

/// Default particle count for the filter kernel.
pub const PARTICLE_COUNT_DEFAULT: usize = 10_000;

/// Armor ring radius seeded on first target acquisition [m].
pub const DEFAULT_RADIUS_M: f32 = 0.25;

/// Default selector grace window before a lost target is released [s].
pub const MAX_TTL_DEFAULT_S: f32 = 0.3;

/// Default gimbal actuation delay added to the lead horizon [s].
pub const T_GIMBAL_ACTUATION_DEFAULT_S: f32 = 0.1;

/// Bullet speed assumed before the first MCU measurement arrives [m/s].
pub const BULLET_SPEED_DEFAULT: f32 = 20.0;

/// Initial smoothed processing latency [s].
pub const PROCESSING_TIME_DEFAULT_S: f32 = 0.05;

/// Gravitational acceleration for the ballistic drop model [m/s²].
pub const GRAVITY: f32 = 9.81;

/// Default serial device for the MCU link.
pub const DEFAULT_SERIAL_DEVICE: &str = "/dev/ttyUSB0";

/// Default serial baud rate (8N1, no flow control).
pub const DEFAULT_BAUD: u32 = 115_200;

/// Backoff applied by edge-triggered workers when no new version is seen.
pub const EDGE_POLL_BACKOFF: Duration = Duration::from_millis(1);

/// Detection confidence floor applied after keypoint refinement.
pub const CONFIDENCE_THRESHOLD_DEFAULT: f32 = 0.5;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_are_consistent() {
        assert!(ALPHA_BULLET_SPEED > 0.0 && ALPHA_BULLET_SPEED < 1.0);
        assert!(ALPHA_PROCESSING_TIME > 0.0 && ALPHA_PROCESSING_TIME < 1.0);
        assert!(PREDICTION_CONVERGENCE_THRESHOLD > 0.0);
        assert!(PREDICTION_MAX_ITERS > 0);
        assert!(DEFAULT_RADIUS_M > 0.0);
        assert!(MAX_TTL_DEFAULT_S > 0.0);
        assert!(BULLET_SPEED_DEFAULT > 0.0);
    }

    #[test]
    fn pf_dt_matches_tick() {
        assert_eq!(PF_TICK.as_secs_f32(), PF_DT);
    }
}
