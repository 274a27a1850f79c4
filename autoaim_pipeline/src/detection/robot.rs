//! Robot pose reconstruction from one or two world-frame armors.
//!
//! A robot carries four armor plates on two horizontal rings: plates at
//! robot yaw θ and θ + π sit on ring 1 (radius `r1`), plates at θ ± π/2
//! on ring 2 (radius `r2`, vertical offset `h`). Each observed armor
//! projects a centre hypothesis
//! `centre = (tx − r·sin(yaw), ty, tz + r·cos(yaw))`;
//! reconstruction inverts that projection.

use std::time::Instant;

use autoaim_common::angles::{sector_from_yaw, wrap_pi, HALF_PI, PI};
use autoaim_common::types::{idx, Detection, RobotState};
use autoaim_common::{PipelineError, PipelineResult};

/// Minimum plausible ring radius [m]; solved radii are clamped up to it.
const MIN_RING_RADIUS_M: f32 = 0.05;

/// Determinant floor below which a two-armor pair is degenerate.
const MIN_PAIR_DETERMINANT: f32 = 0.2;

/// Group detections into per-robot armor sets by class id.
///
/// Input order is preserved inside each group. Empty input produces no
/// groups; oversized groups (>2 armors) survive here and are discarded
/// by [`form_robot`].
pub fn group_armors(dets: &[Detection]) -> Vec<Vec<Detection>> {
    let mut groups: Vec<Vec<Detection>> = Vec::new();
    for det in dets {
        match groups.iter_mut().find(|g| g[0].class_id == det.class_id) {
            Some(group) => group.push(*det),
            None => groups.push(vec![*det]),
        }
    }
    groups
}

/// Form a robot state from the selected armors.
///
/// Zero armors (selector coasting) and groups of more than two armors
/// fail with [`PipelineError::InsufficientDetections`]; the cycle is
/// skipped and the selector TTL carries the track.
pub fn form_robot(
    armors: &[Detection],
    prev: Option<&RobotState>,
    default_radius: f32,
    timestamp: Instant,
) -> PipelineResult<RobotState> {
    match armors {
        [single] => Ok(from_one_armor(single, prev, default_radius, timestamp)),
        [a, b] => Ok(from_two_armors(a, b, prev, default_radius, timestamp)),
        _ => Err(PipelineError::InsufficientDetections),
    }
}

/// Reconstruct the robot from a single armor observation.
///
/// With a valid prior for the same robot, the armor's yaw is snapped to
/// the prior-relative candidate (`prev_yaw`, `prev_yaw ± π/2`,
/// `prev_yaw + π`) closest to the observation, so plate hand-offs keep
/// the robot yaw continuous. Without a prior, both radii seed from the
/// configured default.
pub fn from_one_armor(
    det: &Detection,
    prev: Option<&RobotState>,
    default_radius: f32,
    timestamp: Instant,
) -> RobotState {
    let prior = prev.filter(|p| p.class_id == det.class_id && p.radii_valid());

    let (chosen_yaw, r1, r2, h) = match prior {
        None => (det.yaw_rad, default_radius, default_radius, 0.0),
        Some(p) => {
            let base = p.yaw();
            let candidates = [base, base + HALF_PI, base - HALF_PI, base + PI];
            let chosen = candidates
                .into_iter()
                .min_by(|a, b| {
                    wrap_pi(a - det.yaw_rad)
                        .abs()
                        .partial_cmp(&wrap_pi(b - det.yaw_rad).abs())
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .expect("candidate list is non-empty");
            let (r1, r2) = p.radii();
            (chosen, r1, r2, p.state[idx::H])
        }
    };

    let radius = ring_radius(chosen_yaw, r1, r2);

    let mut rs = RobotState::zeroed(det.class_id, timestamp);
    rs.state[idx::X] = det.tvec.x - radius * det.yaw_rad.sin();
    rs.state[idx::Y] = det.tvec.y;
    rs.state[idx::Z] = det.tvec.z + radius * det.yaw_rad.cos();
    rs.state[idx::YAW] = wrap_pi(chosen_yaw);
    rs.state[idx::R1] = r1;
    rs.state[idx::R2] = r2;
    rs.state[idx::H] = h;
    rs
}

/// Reconstruct the robot from two simultaneously visible armors.
///
/// The two plates sit on different rings with yaws ≈ π/2 apart. Equating
/// both centre hypotheses gives a 2×2 linear system in the two radii:
///
/// ```text
/// r_f·sin(y_f) − r_s·sin(y_s) = tx_f − tx_s
/// r_f·cos(y_f) − r_s·cos(y_s) = tz_s − tz_f
/// ```
///
/// with determinant `sin(y_s − y_f)` (≈ ±1 for a valid pair). Armors are
/// canonically ordered by ring parity before solving, so swapping the
/// observed pair yields the identical state. Degenerate pairs (same
/// ring, near-singular system) fall back to the nearer single armor.
pub fn from_two_armors(
    a: &Detection,
    b: &Detection,
    prev: Option<&RobotState>,
    default_radius: f32,
    timestamp: Instant,
) -> RobotState {
    // Canonical ordering: `first` on ring 1 (even sector), `second` on
    // ring 2 (odd sector).
    let (first, second) = if sector_from_yaw(a.yaw_rad) % 2 == 0 {
        (a, b)
    } else {
        (b, a)
    };

    let same_ring = sector_from_yaw(first.yaw_rad) % 2 == sector_from_yaw(second.yaw_rad) % 2;
    let determinant = (second.yaw_rad - first.yaw_rad).sin();
    if same_ring || determinant.abs() < MIN_PAIR_DETERMINANT {
        let nearer = if a.tvec.norm() <= b.tvec.norm() { a } else { b };
        return from_one_armor(nearer, prev, default_radius, timestamp);
    }

    let dx = first.tvec.x - second.tvec.x;
    let dz = second.tvec.z - first.tvec.z;
    let (sf, cf) = first.yaw_rad.sin_cos();
    let (ss, cs) = second.yaw_rad.sin_cos();

    // Cramer's rule on [sf, -ss; cf, -cs].
    let r1 = ((-cs) * dx + ss * dz) / determinant;
    let r2 = (sf * dz - cf * dx) / determinant;
    let r1 = r1.max(MIN_RING_RADIUS_M);
    let r2 = r2.max(MIN_RING_RADIUS_M);

    // Both hypotheses agree up to noise; average them.
    let cx = (first.tvec.x - r1 * sf + second.tvec.x - r2 * ss) * 0.5;
    let cz = (first.tvec.z + r1 * cf + second.tvec.z + r2 * cs) * 0.5;
    let cy = (first.tvec.y + second.tvec.y) * 0.5;

    let mut rs = RobotState::zeroed(first.class_id, timestamp);
    rs.state[idx::X] = cx;
    rs.state[idx::Y] = cy;
    rs.state[idx::Z] = cz;
    rs.state[idx::YAW] = wrap_pi(first.yaw_rad);
    rs.state[idx::R1] = r1;
    rs.state[idx::R2] = r2;
    rs.state[idx::H] = second.tvec.y - first.tvec.y;
    rs
}

/// Radius of the ring whose plate faces the camera at the given yaw.
#[inline]
fn ring_radius(yaw: f32, r1: f32, r2: f32) -> f32 {
    if sector_from_yaw(yaw) % 2 == 1 {
        r2
    } else {
        r1
    }
}
