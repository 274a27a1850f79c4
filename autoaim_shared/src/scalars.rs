//! Shared atomic scalars updated out-of-band by USB RX.
//!
//! Approximate freshness is fine here; all accesses are relaxed.

use std::sync::atomic::{AtomicU32, Ordering};

/// An `f32` stored in an `AtomicU32` via bit casting.
#[derive(Debug)]
pub struct AtomicF32 {
    bits: AtomicU32,
}

impl AtomicF32 {
    /// Create with an initial value.
    pub fn new(value: f32) -> Self {
        Self {
            bits: AtomicU32::new(value.to_bits()),
        }
    }

    /// Load with relaxed ordering.
    #[inline]
    pub fn load(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Relaxed))
    }

    /// Store with relaxed ordering.
    #[inline]
    pub fn store(&self, value: f32) {
        self.bits.store(value.to_bits(), Ordering::Relaxed);
    }
}

/// Out-of-band scalar channel from the MCU to the pipeline.
#[derive(Debug)]
pub struct SharedScalars {
    /// Last measured muzzle speed [m/s].
    pub bullet_speed: AtomicF32,
}

impl SharedScalars {
    /// Scalars seeded with the given initial bullet speed.
    pub fn new(initial_bullet_speed: f32) -> Self {
        Self {
            bullet_speed: AtomicF32::new(initial_bullet_speed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_f32_roundtrip() {
        let a = AtomicF32::new(1.5);
        assert_eq!(a.load(), 1.5);
        a.store(-27.25);
        assert_eq!(a.load(), -27.25);
    }

    #[test]
    fn scalars_seed_bullet_speed() {
        let scalars = SharedScalars::new(20.0);
        assert_eq!(scalars.bullet_speed.load(), 20.0);
        scalars.bullet_speed.store(24.5);
        assert_eq!(scalars.bullet_speed.load(), 24.5);
    }
}
