//! Latest-value slot with version stamping.
//!
//! A slot is a `(snapshot, version)` pair. Writers replace the snapshot
//! and then bump the version with release ordering; readers load the
//! version with acquire ordering before taking the snapshot handle.
//! Snapshots are reference-counted and never mutated after publish.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwapOption;

/// Atomically publishable immutable snapshot with a monotone version.
///
/// Single producer per slot; any number of concurrent readers.
#[derive(Debug)]
pub struct LatestSlot<T> {
    value: ArcSwapOption<T>,
    version: AtomicU64,
}

impl<T> LatestSlot<T> {
    /// Create an empty slot at version 0.
    pub fn new() -> Self {
        Self {
            value: ArcSwapOption::empty(),
            version: AtomicU64::new(0),
        }
    }

    /// Publish a new snapshot, replacing the previous one.
    ///
    /// Returns the new version. The snapshot handle is visible to any
    /// reader that subsequently observes the returned version.
    pub fn publish(&self, value: T) -> u64 {
        self.publish_arc(Arc::new(value))
    }

    /// Publish an already reference-counted snapshot.
    pub fn publish_arc(&self, value: Arc<T>) -> u64 {
        self.value.store(Some(value));
        self.version.fetch_add(1, Ordering::Release) + 1
    }

    /// Current snapshot handle, if any. Never blocks.
    #[inline]
    pub fn load(&self) -> Option<Arc<T>> {
        self.value.load_full()
    }

    /// Current version with acquire ordering.
    #[inline]
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Current `(handle, version)` pair.
    ///
    /// The version is sampled first, so the returned handle belongs to
    /// that version or a later publish, never an earlier one.
    pub fn snapshot(&self) -> (Option<Arc<T>>, u64) {
        let version = self.version();
        (self.load(), version)
    }
}

impl<T> Default for LatestSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Edge-trigger helper: remembers the last version a consumer observed.
///
/// Consumers call [`VersionCursor::poll`] at the top of each iteration
/// and skip the cycle when it returns `None`.
#[derive(Debug, Clone, Copy, Default)]
pub struct VersionCursor {
    last_seen: u64,
}

impl VersionCursor {
    /// Cursor that has seen nothing (version 0).
    pub fn new() -> Self {
        Self { last_seen: 0 }
    }

    /// Take the slot's snapshot if its version advanced since last poll.
    ///
    /// Advances the cursor whenever the version changed, even if the
    /// slot is empty, so an empty publish is not re-polled forever.
    pub fn poll<T>(&mut self, slot: &LatestSlot<T>) -> Option<Arc<T>> {
        let version = slot.version();
        if version == self.last_seen {
            return None;
        }
        self.last_seen = version;
        slot.load()
    }

    /// Whether the slot's version advanced, without taking a snapshot.
    pub fn peek<T>(&self, slot: &LatestSlot<T>) -> bool {
        slot.version() != self.last_seen
    }

    /// Last version this cursor consumed.
    #[inline]
    pub fn last_seen(&self) -> u64 {
        self.last_seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn empty_slot_reads_none_at_version_zero() {
        let slot: LatestSlot<u32> = LatestSlot::new();
        let (value, version) = slot.snapshot();
        assert!(value.is_none());
        assert_eq!(version, 0);
    }

    #[test]
    fn publish_bumps_version_and_replaces_value() {
        let slot = LatestSlot::new();
        assert_eq!(slot.publish(1u32), 1);
        assert_eq!(slot.publish(2u32), 2);
        let (value, version) = slot.snapshot();
        assert_eq!(value.as_deref(), Some(&2));
        assert_eq!(version, 2);
    }

    #[test]
    fn old_handle_survives_replacement() {
        let slot = LatestSlot::new();
        slot.publish(vec![1u8, 2, 3]);
        let held = slot.load().unwrap();
        slot.publish(vec![9u8]);
        // The held snapshot is byte-stable regardless of later publishes.
        assert_eq!(*held, vec![1u8, 2, 3]);
        assert_eq!(*slot.load().unwrap(), vec![9u8]);
    }

    #[test]
    fn cursor_fires_once_per_version() {
        let slot = LatestSlot::new();
        let mut cursor = VersionCursor::new();
        assert!(cursor.poll(&slot).is_none());

        slot.publish(10u32);
        assert_eq!(cursor.poll(&slot).as_deref(), Some(&10));
        assert!(cursor.poll(&slot).is_none());

        slot.publish(11u32);
        assert!(cursor.peek(&slot));
        assert_eq!(cursor.poll(&slot).as_deref(), Some(&11));
    }

    #[test]
    fn versions_are_monotone_under_concurrent_reads() {
        let slot = Arc::new(LatestSlot::new());
        let writer = {
            let slot = Arc::clone(&slot);
            thread::spawn(move || {
                for i in 0..10_000u64 {
                    slot.publish(i);
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let slot = Arc::clone(&slot);
                thread::spawn(move || {
                    let mut prev = 0u64;
                    for _ in 0..10_000 {
                        let v = slot.version();
                        assert!(v >= prev, "version went backwards: {prev} -> {v}");
                        prev = v;
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for r in readers {
            r.join().unwrap();
        }
        assert_eq!(slot.version(), 10_000);
    }

    #[test]
    fn reader_at_version_v_sees_value_at_least_v() {
        let slot = Arc::new(LatestSlot::new());
        let writer = {
            let slot = Arc::clone(&slot);
            thread::spawn(move || {
                for i in 1..=5_000u64 {
                    slot.publish(i);
                }
            })
        };
        let reader = {
            let slot = Arc::clone(&slot);
            thread::spawn(move || {
                for _ in 0..5_000 {
                    let (value, version) = slot.snapshot();
                    if let Some(v) = value {
                        // Publish stores the value before bumping the
                        // version, so the observed value can only be
                        // from the sampled version or later.
                        assert!(*v >= version, "value {v} older than version {version}");
                    }
                }
            })
        };
        writer.join().unwrap();
        reader.join().unwrap();
    }
}
