//! Core types for the Warden guarded shared-state subsystem.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the fundamental abstractions used throughout the Warden workspace:
//! type IDs, tree paths, value and contract types, buffer handle
//! descriptors, error types, and commit events.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod contract;
pub mod error;
pub mod event;
pub mod id;
pub mod path;
pub mod value;

pub use contract::{AccessOp, DeclaredKeys, Mutability, ZoneContract, ZoneSpec};
pub use error::{BufferError, GuardError, MergeError, RegistryError};
pub use event::CommitEvent;
pub use id::{SegmentId, UnitId, Version, ZoneGeneration};
pub use path::{Path, PathError};
pub use value::{BufferHandle, Dtype, Shape, Value, ValueType};
