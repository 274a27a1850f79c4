//! Particle filter worker: fixed 100 Hz predict/update cadence.
//!
//! The particle set is process-local mutable state owned by this worker
//! and never shared; only the posterior mean is published. The kernel
//! itself ([`ParticleFilter`]) is opaque to the core: the production
//! build binds CUDA kernels, tests and simulation bind
//! [`crate::sim::KinematicFilter`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use autoaim_common::consts::{PF_DT, PF_TICK};
use autoaim_common::types::{RobotState, TrackState};
use autoaim_shared::{SharedLatest, VersionCursor};
use tracing::info;

/// Particle filter kernel contract.
///
/// Implementations own the particle set. `mean` must be callable at any
/// time and return the current posterior mean as a full [`RobotState`].
pub trait ParticleFilter: Send {
    /// Reinitialise the particle set from a measurement.
    fn reset(&mut self, meas: &RobotState);

    /// Propagate all particles by `dt` seconds without a measurement.
    fn predict(&mut self, dt: f32);

    /// One predict-then-update step against a measurement.
    fn step(&mut self, meas: &RobotState, dt: f32);

    /// Posterior mean over the particle set.
    fn mean(&self) -> RobotState;
}

/// 100 Hz periodic producer for the `pf` slot.
pub struct PfWorker<F: ParticleFilter> {
    filter: F,
    shared: Arc<SharedLatest>,
    stop: Arc<AtomicBool>,
    detection_cursor: VersionCursor,
    last_meas_time: Option<Instant>,
}

impl<F: ParticleFilter> PfWorker<F> {
    /// Create a worker around an initialised kernel.
    pub fn new(filter: F, shared: Arc<SharedLatest>, stop: Arc<AtomicBool>) -> Self {
        Self {
            filter,
            shared,
            stop,
            detection_cursor: VersionCursor::new(),
            last_meas_time: None,
        }
    }

    /// Run until the stop flag is set.
    ///
    /// Uses absolute-deadline pacing (`next += 10 ms`) so jitter does
    /// not accumulate; an overrunning tick proceeds immediately without
    /// skipping a grid point.
    pub fn run(&mut self) {
        let mut next = Instant::now();
        while !self.stop.load(Ordering::Relaxed) {
            next += PF_TICK;
            self.tick();
            let now = Instant::now();
            if next > now {
                std::thread::sleep(next - now);
            }
        }
        info!(
            final_version = self.shared.pf.version(),
            "pf worker stopped"
        );
    }

    /// One filter tick: consume a new measurement if present, else
    /// predict-only, then publish the mean.
    fn tick(&mut self) {
        match self.detection_cursor.poll(&self.shared.detection) {
            Some(meas) => {
                if meas.track == TrackState::Reset {
                    self.filter.reset(&meas);
                }
                self.filter.step(&meas, PF_DT);
                self.last_meas_time = Some(meas.timestamp);
            }
            None => self.filter.predict(PF_DT),
        }

        let mut mean = self.filter.mean();
        // The published timestamp is the camera frame that produced the
        // newest consumed measurement, not the tick time.
        if let Some(t) = self.last_meas_time {
            mean.timestamp = t;
        }
        self.shared.pf.publish(mean);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autoaim_common::types::idx;

    /// Records kernel calls; mean returns the last measurement seen.
    #[derive(Default)]
    struct ProbeFilter {
        resets: u32,
        steps: u32,
        predicts: u32,
        last: Option<RobotState>,
    }

    impl ParticleFilter for ProbeFilter {
        fn reset(&mut self, meas: &RobotState) {
            self.resets += 1;
            self.last = Some(*meas);
        }

        fn predict(&mut self, _dt: f32) {
            self.predicts += 1;
        }

        fn step(&mut self, meas: &RobotState, _dt: f32) {
            self.steps += 1;
            self.last = Some(*meas);
        }

        fn mean(&self) -> RobotState {
            self.last
                .unwrap_or_else(|| RobotState::zeroed(-1, Instant::now()))
        }
    }

    fn measurement(track: TrackState, timestamp: Instant) -> RobotState {
        let mut rs = RobotState::zeroed(7, timestamp);
        rs.state[idx::Z] = 3.0;
        rs.state[idx::R1] = 0.25;
        rs.state[idx::R2] = 0.25;
        rs.track = track;
        rs
    }

    #[test]
    fn reset_measurement_reinitialises_before_step() {
        let shared = Arc::new(SharedLatest::new());
        let stop = Arc::new(AtomicBool::new(false));
        let mut worker = PfWorker::new(ProbeFilter::default(), Arc::clone(&shared), stop);

        let t0 = Instant::now();
        shared.detection.publish(measurement(TrackState::Reset, t0));
        worker.tick();
        assert_eq!(worker.filter.resets, 1);
        assert_eq!(worker.filter.steps, 1);
        assert_eq!(worker.filter.predicts, 0);

        // Same version: next tick is predict-only.
        worker.tick();
        assert_eq!(worker.filter.predicts, 1);
        assert_eq!(worker.filter.steps, 1);

        // Tracking measurement: step without reset.
        shared
            .detection
            .publish(measurement(TrackState::Tracking, Instant::now()));
        worker.tick();
        assert_eq!(worker.filter.resets, 1);
        assert_eq!(worker.filter.steps, 2);
    }

    #[test]
    fn published_mean_carries_measurement_timestamp() {
        let shared = Arc::new(SharedLatest::new());
        let stop = Arc::new(AtomicBool::new(false));
        let mut worker = PfWorker::new(ProbeFilter::default(), Arc::clone(&shared), stop);

        let frame_time = Instant::now();
        shared
            .detection
            .publish(measurement(TrackState::Reset, frame_time));
        worker.tick();

        let mean = shared.pf.load().unwrap();
        assert_eq!(mean.timestamp, frame_time);

        // Predict-only ticks keep the last measurement's timestamp.
        worker.tick();
        worker.tick();
        let mean = shared.pf.load().unwrap();
        assert_eq!(mean.timestamp, frame_time);
        assert_eq!(shared.pf.version(), 3);
    }

    #[test]
    fn every_tick_publishes() {
        let shared = Arc::new(SharedLatest::new());
        let stop = Arc::new(AtomicBool::new(false));
        let mut worker = PfWorker::new(ProbeFilter::default(), Arc::clone(&shared), stop);

        for _ in 0..5 {
            worker.tick();
        }
        assert_eq!(shared.pf.version(), 5);
        assert_eq!(worker.filter.predicts, 5);
    }
}
