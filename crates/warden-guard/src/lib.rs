//! Layered access guard chain and orchestrator for Warden shared state.
//!
//! Every read, write, attach, and snapshot passes through three layers,
//! each narrower than the one above it:
//!
//! ```text
//! SupervisingGuard   is the unit registered? does its role permit the op?
//!   └── ContextGuard   which zone governs the path? mutability? strict keys?
//!         └── FieldGuard   do leaf types and buffer shapes match? dispatch.
//! ```
//!
//! An outer rejection short-circuits inner layers, so a rejected access
//! never reaches the tree, the pool, or a reference count. All
//! rejections are side-effect-free.
//!
//! [`GuardedState`] assembles the chain with the registries, pool, and
//! merge engine behind one front door.
//!
//! # Quick start
//!
//! ```
//! use warden_guard::{GuardedState, Role, StateConfig};
//! use warden_core::{Path, Value, Version};
//! use warden_tree::MergePatch;
//!
//! let (state, _events) = GuardedState::new(StateConfig::default()).unwrap();
//! let worker = state.register_unit(Role::Worker);
//!
//! let path = Path::parse("sensors.temperature").unwrap();
//! state
//!     .write(
//!         worker,
//!         path.clone(),
//!         MergePatch::leaf(Value::Float(21.5)),
//!         Version::ZERO,
//!     )
//!     .unwrap();
//! assert_eq!(state.read(worker, path).unwrap(), Value::Float(21.5));
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod chain;
pub mod context;
pub mod request;
pub mod state;
pub mod units;

pub use chain::{
    ContextGuard, FieldGuard, GuardChain, Interceptor, ScopedInterceptor, SupervisingGuard,
};
pub use context::GuardContext;
pub use request::{AccessKind, AccessOutcome, AccessRequest};
pub use state::{GuardedState, StateConfig};
pub use units::{Role, UnitRegistry};

// GuardedState crosses unit boundaries by construction.
const _: fn() = || {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<GuardedState>();
};
