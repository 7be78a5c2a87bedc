//! Reference-counted zero-copy shared buffer pool for Warden.
//!
//! Bulk numeric payloads live in pool-managed segments that execution
//! units attach to without the bytes crossing a serialization boundary.
//! The pool is the sole authority for allocation and reclamation;
//! reference-count accounting on attachments is the only lifetime
//! mechanism — there is no collector scanning for unreachable segments.
//!
//! # Architecture
//!
//! ```text
//! BufferPool (slot table + free list, Mutex-guarded bookkeeping)
//! ├── Slot[] (generation-tagged; stale SegmentIds fail O(1))
//! │   └── Arc<SegmentStorage> (zero-init Vec<u8> behind RwLock)
//! │       └── RangeLockTable (exclusive byte-range write locks)
//! ├── BufferView (zero-copy view: an Arc clone, no byte copy)
//! └── Attachment (scoped view; detaches on drop, all exit paths)
//! ```
//!
//! # Concurrency contract
//!
//! Concurrent readers are always safe. A writer must hold the exclusive
//! range lock for the bytes it mutates; overlapping writers queue,
//! disjoint writers interleave. The pool never serializes unrelated
//! writers beyond the bounded critical section of the byte copy itself —
//! callers coordinate intent through the guard chain's mutability
//! policy, not through the pool.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod pool;
pub mod range_lock;
pub mod segment;
pub mod view;

pub use config::BufferConfig;
pub use pool::BufferPool;
pub use range_lock::{RangeLockGuard, RangeLockTable};
pub use segment::{RegionGuard, SegmentStorage};
pub use view::{Attachment, BufferView};
