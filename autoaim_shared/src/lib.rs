//! # Autoaim Latest-Value Registry
//!
//! Lock-free, single-producer-per-slot, multi-consumer exchange of
//! immutable snapshots between pipeline workers of unequal rate.
//!
//! Each stage output lives in a [`LatestSlot`]: an atomically replaceable
//! snapshot handle paired with a monotonically increasing version
//! counter. Producers publish, consumers read without blocking, and
//! intermediate values may be lost by design (latest wins). A consumer
//! detects arrival of a new value by watching the version, never by
//! comparing content.
//!
//! ## Ordering
//!
//! Publish is release, read is acquire: a reader that observes version
//! `v` is guaranteed to see the snapshot published at `v` (or a later
//! one), along with every write that happened-before that publish.
//!
//! ## Usage
//!
//! ```rust
//! use autoaim_shared::{LatestSlot, VersionCursor};
//!
//! let slot: LatestSlot<u32> = LatestSlot::new();
//! slot.publish(7);
//!
//! let mut cursor = VersionCursor::new();
//! assert_eq!(cursor.poll(&slot).as_deref(), Some(&7));
//! assert!(cursor.poll(&slot).is_none()); // no new version yet
//! ```

pub mod registry;
pub mod scalars;
pub mod slot;

pub use registry::SharedLatest;
pub use scalars::{AtomicF32, SharedScalars};
pub use slot::{LatestSlot, VersionCursor};
