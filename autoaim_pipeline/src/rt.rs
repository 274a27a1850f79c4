//! Optional real-time thread placement.
//!
//! With the `rt` feature, worker threads are pinned to CPU cores via
//! `sched_setaffinity`; without it every call is a no-op so development
//! machines and CI need no privileges.

/// Pin the calling thread to a CPU core.
#[cfg(feature = "rt")]
pub fn pin_current_thread(cpu: usize) {
    use nix::sched::{sched_setaffinity, CpuSet};
    use nix::unistd::Pid;
    use tracing::warn;

    let mut cpuset = CpuSet::new();
    if let Err(e) = cpuset.set(cpu) {
        warn!(cpu, error = %e, "invalid CPU index, thread not pinned");
        return;
    }
    if let Err(e) = sched_setaffinity(Pid::from_raw(0), &cpuset) {
        warn!(cpu, error = %e, "sched_setaffinity failed, thread not pinned");
    }
}

/// Pin the calling thread to a CPU core (no-op without the `rt` feature).
#[cfg(not(feature = "rt"))]
pub fn pin_current_thread(_cpu: usize) {}
