//! Gimbal limit policy.
//!
//! Limits come from the calibration artifact (the `gimbal:` config
//! section). Pitch is always clamped inside the calibrated range minus
//! the safety margin; yaw is wrapped for 360° slip-ring gimbals and
//! clamped otherwise.

use autoaim_common::angles::wrap_pi;
use autoaim_common::config::GimbalConfig;

/// Proximity band treated as "at the limit" for diagnostics [rad].
const LIMIT_TOLERANCE: f32 = 0.08;

/// Calibrated gimbal limits plus the command clamp policy.
#[derive(Debug, Clone, Copy)]
pub struct GimbalLimits {
    pitch_min: f32,
    pitch_max: f32,
    yaw_min: f32,
    yaw_max: f32,
    has_yaw_limits: bool,
    margin: f32,
}

impl GimbalLimits {
    /// Build from the calibration artifact section.
    pub fn from_config(config: &GimbalConfig) -> Self {
        Self {
            pitch_min: config.pitch_min,
            pitch_max: config.pitch_max,
            yaw_min: config.yaw_min,
            yaw_max: config.yaw_max,
            has_yaw_limits: config.has_yaw_limits,
            margin: config.safety_margin,
        }
    }

    /// Apply the clamp policy to a raw command.
    ///
    /// Pitch lands in `[pitch_min + margin, pitch_max − margin]`. Yaw is
    /// wrapped into (−π, π] when the gimbal rotates freely, otherwise
    /// clamped with the same margin.
    pub fn apply(&self, yaw: &mut f32, pitch: &mut f32) {
        *pitch = pitch.clamp(self.pitch_min + self.margin, self.pitch_max - self.margin);

        if self.has_yaw_limits {
            *yaw = yaw.clamp(self.yaw_min + self.margin, self.yaw_max - self.margin);
        } else {
            *yaw = wrap_pi(*yaw);
        }
    }

    /// Whether a pitch command lies within the physical range.
    #[inline]
    pub fn is_reachable(&self, pitch: f32) -> bool {
        pitch >= self.pitch_min && pitch <= self.pitch_max
    }

    /// Whether the commanded pitch sits near a hard limit.
    #[inline]
    pub fn at_pitch_limit(&self, pitch: f32) -> bool {
        pitch < self.pitch_min + LIMIT_TOLERANCE || pitch > self.pitch_max - LIMIT_TOLERANCE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autoaim_common::angles::PI;

    fn limits(has_yaw_limits: bool) -> GimbalLimits {
        GimbalLimits::from_config(&GimbalConfig {
            pitch_min: -0.17,
            pitch_max: 0.87,
            yaw_min: -3.14,
            yaw_max: 3.14,
            has_yaw_limits,
            safety_margin: 0.05,
        })
    }

    #[test]
    fn pitch_clamped_inside_margin() {
        let lim = limits(false);
        let mut yaw = 0.0;

        let mut pitch = 2.0;
        lim.apply(&mut yaw, &mut pitch);
        assert!((pitch - 0.82).abs() < 1e-6);

        let mut pitch = -1.0;
        lim.apply(&mut yaw, &mut pitch);
        assert!((pitch + 0.12).abs() < 1e-6);

        let mut pitch = 0.3;
        lim.apply(&mut yaw, &mut pitch);
        assert!((pitch - 0.3).abs() < 1e-6);
    }

    #[test]
    fn free_yaw_wraps_into_range() {
        let lim = limits(false);
        let mut pitch = 0.0;

        let mut yaw = 3.0 * PI;
        lim.apply(&mut yaw, &mut pitch);
        assert!(yaw > -PI && yaw <= PI);
        assert!((yaw - PI).abs() < 1e-5);

        let mut yaw = -2.5 * PI;
        lim.apply(&mut yaw, &mut pitch);
        assert!(yaw > -PI && yaw <= PI);
    }

    #[test]
    fn limited_yaw_clamps_with_margin() {
        let lim = limits(true);
        let mut pitch = 0.0;

        let mut yaw = 4.0;
        lim.apply(&mut yaw, &mut pitch);
        assert!((yaw - (3.14 - 0.05)).abs() < 1e-6);

        let mut yaw = -4.0;
        lim.apply(&mut yaw, &mut pitch);
        assert!((yaw + (3.14 - 0.05)).abs() < 1e-6);
    }

    #[test]
    fn reachability_and_limit_proximity() {
        let lim = limits(false);
        assert!(lim.is_reachable(0.0));
        assert!(!lim.is_reachable(1.0));
        assert!(lim.at_pitch_limit(-0.15));
        assert!(lim.at_pitch_limit(0.85));
        assert!(!lim.at_pitch_limit(0.3));
    }
}
