//! Warden: guarded zero-copy shared state for concurrent execution units.
//!
//! This is the top-level facade crate that re-exports the public API from
//! all Warden sub-crates. For most users, adding `warden` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use warden::prelude::*;
//!
//! // Assemble the subsystem with one strict zone.
//! let zones = vec![ZoneSpec {
//!     prefix: Path::parse("config").unwrap(),
//!     contract: ZoneContract {
//!         keys: DeclaredKeys::Declared(
//!             [("rate".to_string(), ValueType::Float)].into_iter().collect(),
//!         ),
//!         mutability: Mutability::Mutable,
//!         strict: true,
//!     },
//! }];
//! let config = StateConfig {
//!     zones,
//!     ..StateConfig::default()
//! };
//! let (state, _events) = GuardedState::new(config).unwrap();
//!
//! // Writes carry the base version last observed at the target.
//! let worker = state.register_unit(Role::Worker);
//! let rate = Path::parse("config.rate").unwrap();
//! state
//!     .write(
//!         worker,
//!         rate.clone(),
//!         MergePatch::leaf(Value::Float(0.5)),
//!         Version::ZERO,
//!     )
//!     .unwrap();
//! assert_eq!(state.read(worker, rate).unwrap(), Value::Float(0.5));
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in the
//! prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `warden-core` | Paths, IDs, values, contracts, error types |
//! | [`zone`] | `warden-zone` | The zone registry and prefix resolution |
//! | [`buffer`] | `warden-buffer` | The zero-copy shared buffer pool |
//! | [`tree`] | `warden-tree` | The versioned state tree and merge engine |
//! | [`guard`] | `warden-guard` | The guard chain and `GuardedState` front door |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Paths, IDs, values, contracts, and error types (`warden-core`).
pub use warden_core as types;

/// Zone registry and longest-prefix resolution (`warden-zone`).
pub use warden_zone as zone;

/// Reference-counted zero-copy shared buffer pool (`warden-buffer`).
///
/// Most users reach buffers through [`guard::GuardedState::attach`];
/// this module exposes the pool directly for embeddings that manage
/// their own attachment discipline.
pub use warden_buffer as buffer;

/// Versioned state tree and optimistic merge engine (`warden-tree`).
pub use warden_tree as tree;

/// The access guard chain and the [`guard::GuardedState`] orchestrator
/// (`warden-guard`).
pub use warden_guard as guard;

/// Common imports for typical Warden usage.
///
/// ```rust
/// use warden::prelude::*;
/// ```
///
/// This imports the front door, unit roles, paths, values, contracts,
/// and the patch and version types writes are built from.
pub mod prelude {
    // Core types
    pub use warden_core::{
        BufferHandle, Dtype, Mutability, Path, Value, ValueType, Version, ZoneContract, ZoneSpec,
    };
    pub use warden_core::{DeclaredKeys, UnitId, ZoneGeneration};

    // Errors
    pub use warden_core::{BufferError, GuardError, MergeError, RegistryError};

    // Buffer pool
    pub use warden_buffer::{Attachment, BufferConfig, BufferView};

    // Tree and merge
    pub use warden_tree::{CommitReceipt, MergePatch, PendingMerge, PlainValue};

    // Guard chain front door
    pub use warden_guard::{GuardedState, Role, StateConfig};
}
