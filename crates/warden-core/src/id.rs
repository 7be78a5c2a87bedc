//! Strongly-typed identifiers for execution units, segments, and versions.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter for unique [`UnitId`] allocation.
static UNIT_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Identifies an execution unit (thread, isolated interpreter, or
/// process-local worker) participating in shared state access.
///
/// Units are registered with the guard chain before their first access.
/// IDs allocated via [`UnitId::next`] are unique for the process
/// lifetime, so a detached unit's ID is never reused for a new unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId(pub u64);

impl UnitId {
    /// Allocate a fresh, unique unit ID.
    ///
    /// Each call returns an ID that has never been returned before
    /// within this process. Thread-safe.
    pub fn next() -> Self {
        Self(UNIT_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unit#{}", self.0)
    }
}

impl From<u64> for UnitId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Identifies a shared buffer segment within the buffer pool.
///
/// The ID is a slot index plus a generation tag. Freeing a segment bumps
/// its slot's generation, so a stale ID held past the segment's last
/// detach fails its O(1) liveness check instead of aliasing whatever
/// segment reuses the slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SegmentId {
    index: u32,
    generation: u32,
}

impl SegmentId {
    /// Create a segment ID from a slot index and generation tag.
    pub fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Slot index within the buffer pool.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Generation tag of the slot at allocation time.
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seg#{}.g{}", self.index, self.generation)
    }
}

/// Per-node version counter in the state tree.
///
/// Incremented on every committed write that touches the node. Version 0
/// means the node has never been written (including "does not exist
/// yet"), which is what lets a first write propose against an absent
/// path. Used as the optimistic-concurrency token by the merge engine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Version(pub u64);

impl Version {
    /// The version of a node that has never been committed.
    pub const ZERO: Self = Self(0);

    /// The next version after this one.
    pub fn bumped(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Generation of a zone registration.
///
/// Contracts are immutable once registered; re-registering a prefix with
/// a changed contract bumps the generation. Buffer handles issued under
/// an older generation stay valid until their refcount drains — segment
/// lifetime is attachment-driven, not generation-driven.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ZoneGeneration(pub u32);

impl ZoneGeneration {
    /// The next generation after this one.
    pub fn bumped(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for ZoneGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_ids_are_unique() {
        let a = UnitId::next();
        let b = UnitId::next();
        assert_ne!(a, b);
    }

    #[test]
    fn segment_id_round_trip() {
        let id = SegmentId::new(7, 3);
        assert_eq!(id.index(), 7);
        assert_eq!(id.generation(), 3);
        assert_eq!(id.to_string(), "seg#7.g3");
    }

    #[test]
    fn version_bump_is_monotonic() {
        let v = Version::ZERO;
        assert!(v.bumped() > v);
        assert_eq!(v.bumped(), Version(1));
    }

    #[test]
    fn zone_generation_bump() {
        assert_eq!(ZoneGeneration(4).bumped(), ZoneGeneration(5));
    }
}
