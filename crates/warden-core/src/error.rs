//! Error types for the Warden shared-state subsystem.
//!
//! One enum per subsystem: registry, buffer pool, merge engine, and the
//! guard chain. The guard chain wraps the inner subsystems' errors so
//! every access returns a single typed failure without losing the
//! originating cause.
//!
//! All rejections are side-effect-free: no error leaves the state tree
//! or a buffer's reference count partially updated.

use std::error::Error;
use std::fmt;

use crate::contract::{AccessOp, Mutability};
use crate::id::{SegmentId, UnitId, Version};
use crate::path::Path;
use crate::value::{Dtype, ValueType};

/// Errors from the zone registry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RegistryError {
    /// An overlapping zone with an incompatible contract already exists.
    ContractConflict {
        /// The prefix being registered.
        prefix: Path,
        /// The already-registered prefix it conflicts with.
        existing: Path,
    },
    /// No zone governs the path and the registry's default mode is
    /// strict, so no synthetic open contract is available.
    UnguardedPath {
        /// The unresolvable path.
        path: Path,
    },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ContractConflict { prefix, existing } => {
                write!(
                    f,
                    "contract conflict: '{prefix}' overlaps incompatibly with registered zone '{existing}'"
                )
            }
            Self::UnguardedPath { path } => {
                write!(f, "no zone governs path '{path}' (strict registry)")
            }
        }
    }
}

impl Error for RegistryError {}

/// Errors from the shared buffer pool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BufferError {
    /// Allocation would exceed the pool's configured capacity.
    ///
    /// Resource exhaustion is reported, never hidden; the caller decides
    /// whether to shed load or retry.
    CapacityExceeded {
        /// Bytes requested.
        requested: usize,
        /// Remaining capacity in bytes.
        capacity: usize,
    },
    /// A region access fell outside the segment's bounds.
    RangeOutOfBounds {
        /// The addressed segment.
        segment: SegmentId,
        /// Requested starting byte offset.
        offset: usize,
        /// Requested length in bytes.
        len: usize,
        /// Actual segment length in bytes.
        byte_len: usize,
    },
    /// The segment ID's generation does not match the slot — the segment
    /// was freed (and possibly reallocated) after the handle was issued.
    StaleSegment {
        /// The stale segment ID.
        segment: SegmentId,
    },
    /// A detach (or region access) by a unit with no outstanding
    /// attachment to the segment.
    NotAttached {
        /// The addressed segment.
        segment: SegmentId,
        /// The unit without an attachment.
        unit: UnitId,
    },
    /// A write through a view that was attached read-only.
    ReadOnlyAttachment {
        /// The addressed segment.
        segment: SegmentId,
        /// The unit holding the read-only view.
        unit: UnitId,
    },
    /// The requested byte length does not equal `dtype.size()` times the
    /// product of the shape.
    LengthMismatch {
        /// Bytes requested.
        byte_len: usize,
        /// Bytes implied by dtype and shape.
        expected: usize,
        /// The requested dtype.
        dtype: Dtype,
    },
}

impl fmt::Display for BufferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CapacityExceeded {
                requested,
                capacity,
            } => {
                write!(
                    f,
                    "buffer pool capacity exceeded: requested {requested} bytes, {capacity} available"
                )
            }
            Self::RangeOutOfBounds {
                segment,
                offset,
                len,
                byte_len,
            } => {
                write!(
                    f,
                    "range [{offset}, {}) out of bounds for {segment} ({byte_len} bytes)",
                    offset + len
                )
            }
            Self::StaleSegment { segment } => {
                write!(f, "stale segment id {segment}: segment has been freed")
            }
            Self::NotAttached { segment, unit } => {
                write!(f, "{unit} has no attachment to {segment}")
            }
            Self::ReadOnlyAttachment { segment, unit } => {
                write!(f, "{unit} holds a read-only attachment to {segment}")
            }
            Self::LengthMismatch {
                byte_len,
                expected,
                dtype,
            } => {
                write!(
                    f,
                    "byte length {byte_len} does not match shape ({expected} bytes of {dtype})"
                )
            }
        }
    }
}

impl Error for BufferError {}

/// Errors from the merge engine.
#[derive(Clone, Debug, PartialEq)]
pub enum MergeError {
    /// The proposal's base version no longer matches the tree — a
    /// concurrent write committed first. The caller may re-read and
    /// retry with a refreshed base version.
    StaleWriteConflict {
        /// The proposal's target path.
        path: Path,
        /// The base version the proposal carried.
        expected: Version,
        /// The tree's current version at the target path.
        found: Version,
    },
    /// The target path descends through an existing leaf scalar, so
    /// there is no map to merge into.
    PathObstructed {
        /// The leaf path blocking descent.
        path: Path,
    },
    /// An append-only merge would overwrite an existing value.
    ///
    /// Raised inside the commit's critical section so the append-only
    /// check and the commit are atomic; the guard chain surfaces it as
    /// an immutable-zone violation.
    AppendOverwrite {
        /// The first existing path the patch would overwrite.
        path: Path,
    },
}

impl fmt::Display for MergeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StaleWriteConflict {
                path,
                expected,
                found,
            } => {
                write!(
                    f,
                    "stale write at '{path}': proposed against {expected}, tree is at {found}"
                )
            }
            Self::PathObstructed { path } => {
                write!(f, "path obstructed: '{path}' is a leaf, not a map")
            }
            Self::AppendOverwrite { path } => {
                write!(f, "append-only merge would overwrite '{path}'")
            }
        }
    }
}

impl Error for MergeError {}

/// Errors from the access guard chain.
///
/// The chain's three layers each contribute variants: the supervising
/// guard rejects unknown units and disallowed operations, the context
/// guard enforces mutability policy and strict-mode key declarations,
/// and the field guard surfaces type mismatches plus any error from the
/// registry, pool, or merge engine it delegates to.
#[derive(Clone, Debug, PartialEq)]
pub enum GuardError {
    /// The requesting unit is not registered.
    UnknownUnit {
        /// The unknown unit.
        unit: UnitId,
    },
    /// The unit's role does not permit the requested operation.
    OperationDenied {
        /// The requesting unit.
        unit: UnitId,
        /// The denied operation.
        op: AccessOp,
    },
    /// A single write whose patch touches paths governed by two
    /// different zones. One write commits under one zone's policy;
    /// spanning writes must be split by the caller.
    CrossZoneWrite {
        /// The write's target path.
        path: Path,
        /// The zone governing the patch's first touched path.
        zone: Path,
        /// The second zone the patch reached into.
        other: Path,
    },
    /// A write against a read-only zone, or an overwrite against an
    /// append-only zone.
    ImmutableZoneViolation {
        /// The write's target path.
        path: Path,
        /// The zone's mutability policy.
        mutability: Mutability,
    },
    /// An access to a key not declared in its zone's contract, under
    /// strict mode.
    UndeclaredField {
        /// The undeclared path.
        path: Path,
        /// The governing zone's prefix.
        zone: Path,
    },
    /// A value whose runtime type does not match the declared type.
    TypeMismatch {
        /// The offending path.
        path: Path,
        /// The declared type.
        expected: ValueType,
        /// The value's actual type.
        found: ValueType,
    },
    /// A read or attach addressed a path with no value.
    NotFound {
        /// The missing path.
        path: Path,
    },
    /// An attach addressed a path whose value is not a buffer handle.
    NotABuffer {
        /// The addressed path.
        path: Path,
    },
    /// An error from the zone registry.
    Registry(RegistryError),
    /// An error from the shared buffer pool.
    Buffer(BufferError),
    /// An error from the merge engine.
    Merge(MergeError),
}

impl fmt::Display for GuardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownUnit { unit } => write!(f, "unknown unit {unit}"),
            Self::OperationDenied { unit, op } => {
                write!(f, "{unit} is not permitted to {op}")
            }
            Self::CrossZoneWrite { path, zone, other } => {
                write!(
                    f,
                    "write at '{path}' spans zones '{zone}' and '{other}'"
                )
            }
            Self::ImmutableZoneViolation { path, mutability } => {
                write!(f, "write to '{path}' violates {mutability} zone policy")
            }
            Self::UndeclaredField { path, zone } => {
                write!(
                    f,
                    "'{path}' is not declared in strict zone '{zone}'"
                )
            }
            Self::TypeMismatch {
                path,
                expected,
                found,
            } => {
                write!(
                    f,
                    "type mismatch at '{path}': declared {expected}, got {found}"
                )
            }
            Self::NotFound { path } => write!(f, "no value at '{path}'"),
            Self::NotABuffer { path } => write!(f, "value at '{path}' is not a buffer"),
            Self::Registry(e) => write!(f, "registry: {e}"),
            Self::Buffer(e) => write!(f, "buffer: {e}"),
            Self::Merge(e) => write!(f, "merge: {e}"),
        }
    }
}

impl Error for GuardError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Registry(e) => Some(e),
            Self::Buffer(e) => Some(e),
            Self::Merge(e) => Some(e),
            _ => None,
        }
    }
}

impl From<RegistryError> for GuardError {
    fn from(e: RegistryError) -> Self {
        Self::Registry(e)
    }
}

impl From<BufferError> for GuardError {
    fn from(e: BufferError) -> Self {
        Self::Buffer(e)
    }
}

impl From<MergeError> for GuardError {
    fn from(e: MergeError) -> Self {
        Self::Merge(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_write_display_names_versions() {
        let e = MergeError::StaleWriteConflict {
            path: Path::parse("a.b").unwrap(),
            expected: Version(3),
            found: Version(5),
        };
        let msg = e.to_string();
        assert!(msg.contains("a.b"));
        assert!(msg.contains("v3"));
        assert!(msg.contains("v5"));
    }

    #[test]
    fn guard_error_sources_chain() {
        let inner = BufferError::StaleSegment {
            segment: SegmentId::new(1, 2),
        };
        let outer = GuardError::from(inner.clone());
        assert_eq!(outer, GuardError::Buffer(inner));
        assert!(outer.source().is_some());
        assert!(GuardError::NotFound {
            path: Path::root(),
        }
        .source()
        .is_none());
    }
}
