//! Zone registry and contract resolution for Warden shared state.
//!
//! The registry declares named regions ("zones") of the state tree and
//! the contract each must satisfy. Registration happens at construction
//! time; resolution is a longest-prefix match performed by the guard
//! chain on every access.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod registry;

pub use registry::{ResolvedZone, ZoneRegistry};
