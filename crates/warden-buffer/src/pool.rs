//! The [`BufferPool`]: slot-indexed segment allocation with
//! attachment-count reclamation.

use std::sync::{Arc, Mutex};

use indexmap::IndexMap;

use warden_core::{BufferError, BufferHandle, Dtype, SegmentId, Shape, UnitId};

use crate::config::BufferConfig;
use crate::segment::SegmentStorage;
use crate::view::{Attachment, BufferView};

/// One live segment's bookkeeping.
struct LiveSegment {
    storage: Arc<SegmentStorage>,
    byte_len: usize,
    /// Per-unit attachment counts. A unit may attach more than once;
    /// each attach must be paired with a detach.
    attachments: IndexMap<UnitId, u32>,
    /// Set on first attach. A segment is reclaimed when its attachment
    /// count returns to zero *after* having been attached — a freshly
    /// allocated, never-attached segment stays alive for its writer.
    ever_attached: bool,
}

/// A pool slot. Freeing bumps the generation so stale [`SegmentId`]s
/// fail their liveness check in O(1) instead of aliasing a reused slot.
struct Slot {
    generation: u32,
    live: Option<LiveSegment>,
}

struct PoolState {
    slots: Vec<Slot>,
    free: Vec<usize>,
    used_bytes: usize,
}

/// Allocator and lifetime authority for shared buffer segments.
///
/// All bookkeeping sits behind one `Mutex`; the lock covers only slot
/// table updates, never the payload bytes — region reads and writes go
/// through the segment's own storage and range locks. The pool is
/// `Sync`: every execution unit calls it through a shared reference.
///
/// Reference-count accounting is the sole lifetime mechanism. Every
/// `attach` must be paired with a `detach` on all exit paths (the
/// [`Attachment`] guard does this automatically) or the segment leaks
/// for the process lifetime.
pub struct BufferPool {
    config: BufferConfig,
    state: Mutex<PoolState>,
}

// Compile-time assertion: the pool is shared across units.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<BufferPool>();
};

impl BufferPool {
    /// Create an empty pool with the given limits.
    pub fn new(config: BufferConfig) -> Self {
        Self {
            config,
            state: Mutex::new(PoolState {
                slots: Vec::new(),
                free: Vec::new(),
                used_bytes: 0,
            }),
        }
    }

    /// Reserve a zero-initialized segment.
    ///
    /// `byte_len` must equal `dtype.size()` times the product of
    /// `shape`, or the allocation fails with
    /// [`BufferError::LengthMismatch`]. Exhaustion of the configured
    /// capacity fails with [`BufferError::CapacityExceeded`]; the caller
    /// handles backpressure by shedding or retrying.
    pub fn allocate(
        &self,
        byte_len: usize,
        dtype: Dtype,
        shape: Shape,
    ) -> Result<BufferHandle, BufferError> {
        let expected = dtype.size() * shape.iter().product::<usize>();
        if byte_len != expected {
            return Err(BufferError::LengthMismatch {
                byte_len,
                expected,
                dtype,
            });
        }
        if byte_len > self.config.max_segment_bytes {
            return Err(BufferError::CapacityExceeded {
                requested: byte_len,
                capacity: self.config.max_segment_bytes,
            });
        }

        let mut state = self.state.lock().unwrap();
        let remaining = self.config.max_total_bytes - state.used_bytes;
        if byte_len > remaining {
            return Err(BufferError::CapacityExceeded {
                requested: byte_len,
                capacity: remaining,
            });
        }

        let index = match state.free.pop() {
            Some(index) => index,
            None => {
                state.slots.push(Slot {
                    generation: 0,
                    live: None,
                });
                state.slots.len() - 1
            }
        };
        let id = SegmentId::new(index as u32, state.slots[index].generation);
        let storage = SegmentStorage::new(id, byte_len);
        state.slots[index].live = Some(LiveSegment {
            storage,
            byte_len,
            attachments: IndexMap::new(),
            ever_attached: false,
        });
        state.used_bytes += byte_len;

        Ok(BufferHandle {
            segment: id,
            byte_len,
            dtype,
            shape,
        })
    }

    /// Attach `unit` to a segment, returning a zero-copy view.
    ///
    /// The view shares the segment's storage by reference; the payload
    /// never crosses a serialization boundary. Increments the segment's
    /// attachment count.
    pub fn attach(&self, handle: &BufferHandle, unit: UnitId) -> Result<BufferView, BufferError> {
        let mut state = self.state.lock().unwrap();
        let live = live_mut(&mut state, handle.segment)?;
        *live.attachments.entry(unit).or_insert(0) += 1;
        live.ever_attached = true;
        Ok(BufferView::new(
            Arc::clone(&live.storage),
            handle.clone(),
            unit,
        ))
    }

    /// Attach with scoped release: the returned guard detaches on drop,
    /// on all exit paths including failure paths.
    pub fn attach_scoped(
        &self,
        handle: &BufferHandle,
        unit: UnitId,
    ) -> Result<Attachment<'_>, BufferError> {
        let view = self.attach(handle, unit)?;
        Ok(Attachment::new(self, view))
    }

    /// Detach `unit` from a segment.
    ///
    /// When the last attachment is released the segment is reclaimed:
    /// the slot's generation is bumped and its bytes are freed once the
    /// final storage reference drops.
    pub fn detach(&self, segment: SegmentId, unit: UnitId) -> Result<(), BufferError> {
        let mut state = self.state.lock().unwrap();
        let live = live_mut(&mut state, segment)?;
        let Some(count) = live.attachments.get_mut(&unit) else {
            return Err(BufferError::NotAttached { segment, unit });
        };
        *count -= 1;
        if *count == 0 {
            live.attachments.swap_remove(&unit);
        }
        if live.ever_attached && live.attachments.is_empty() {
            let index = segment.index() as usize;
            let byte_len = live.byte_len;
            let slot = &mut state.slots[index];
            slot.live = None;
            slot.generation += 1;
            state.used_bytes -= byte_len;
            state.free.push(index);
        }
        Ok(())
    }

    /// Whether the segment behind `id` is still live.
    pub fn is_live(&self, id: SegmentId) -> bool {
        let state = self.state.lock().unwrap();
        state
            .slots
            .get(id.index() as usize)
            .is_some_and(|s| s.generation == id.generation() && s.live.is_some())
    }

    /// Total outstanding attachments on a segment (0 if freed).
    pub fn attachment_count(&self, id: SegmentId) -> usize {
        let state = self.state.lock().unwrap();
        state
            .slots
            .get(id.index() as usize)
            .filter(|s| s.generation == id.generation())
            .and_then(|s| s.live.as_ref())
            .map(|l| l.attachments.values().map(|&c| c as usize).sum())
            .unwrap_or(0)
    }

    /// Copy out a segment's full byte content without touching its
    /// attachment counts. Used by snapshot extraction.
    pub fn resolve_bytes(&self, handle: &BufferHandle) -> Result<Vec<u8>, BufferError> {
        let storage = {
            let mut state = self.state.lock().unwrap();
            Arc::clone(&live_mut(&mut state, handle.segment)?.storage)
        };
        storage.read_region(0, storage.byte_len())
    }

    /// Bytes currently allocated across all live segments.
    pub fn used_bytes(&self) -> usize {
        self.state.lock().unwrap().used_bytes
    }
}

/// Resolve a segment ID to its live bookkeeping, enforcing the
/// generation tag.
fn live_mut(state: &mut PoolState, id: SegmentId) -> Result<&mut LiveSegment, BufferError> {
    let slot = state
        .slots
        .get_mut(id.index() as usize)
        .filter(|s| s.generation == id.generation())
        .ok_or(BufferError::StaleSegment { segment: id })?;
    slot.live
        .as_mut()
        .ok_or(BufferError::StaleSegment { segment: id })
}
