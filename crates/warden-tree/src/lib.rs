//! Versioned state tree and optimistic merge engine for Warden.
//!
//! The state tree is the authoritative in-memory representation of
//! shared state: a hierarchical, path-addressable mapping from keys to
//! scalar values or buffer handles, with a version counter on every
//! node. The merge engine applies structured partial updates against it,
//! detecting conflicting concurrent writes via the version counters and
//! refusing silent overwrite.
//!
//! Writes to a given path are linearized by the version counter: of two
//! concurrent writers carrying the same base version, exactly one
//! commits and the other observes a stale-write conflict it may retry
//! with a refreshed base. Commits are atomic across the touched subtree;
//! readers never observe a torn merge.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod engine;
pub mod merge;
pub mod node;
pub mod plain;
pub mod tree;

pub use engine::{CommitReceipt, MergeEngine};
pub use merge::{MergePatch, PendingMerge};
pub use node::{StateNode, VersionedNode};
pub use plain::PlainValue;
pub use tree::{ApplyMode, ApplyOutcome, StateTree};
