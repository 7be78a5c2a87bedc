//! Zero-copy buffer views and scoped attachments.

use std::fmt;
use std::sync::Arc;

use warden_core::{BufferError, BufferHandle, SegmentId, UnitId};

use crate::pool::BufferPool;
use crate::segment::{RegionGuard, SegmentStorage};

/// A unit's zero-copy view of a shared buffer segment.
///
/// The view is an `Arc` clone of the segment's storage — obtaining or
/// using it never copies the payload or crosses a serialization
/// boundary. A view corresponds to one outstanding attachment; drop the
/// view and call [`BufferPool::detach`], or use [`Attachment`] to do
/// both on all exit paths.
///
/// Views are writable by default. [`read_only`](BufferView::read_only)
/// demotes a view so its write paths fail; the guard chain uses this to
/// carry zone mutability policy down to byte writes.
pub struct BufferView {
    storage: Arc<SegmentStorage>,
    handle: BufferHandle,
    unit: UnitId,
    writable: bool,
}

impl BufferView {
    pub(crate) fn new(storage: Arc<SegmentStorage>, handle: BufferHandle, unit: UnitId) -> Self {
        Self {
            storage,
            handle,
            unit,
            writable: true,
        }
    }

    /// Demote the view: reads stay available, write paths fail with
    /// [`BufferError::ReadOnlyAttachment`].
    pub fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }

    /// Whether write paths are available on this view.
    pub fn is_writable(&self) -> bool {
        self.writable
    }

    fn check_writable(&self) -> Result<(), BufferError> {
        if self.writable {
            Ok(())
        } else {
            Err(BufferError::ReadOnlyAttachment {
                segment: self.segment(),
                unit: self.unit,
            })
        }
    }

    /// The handle this view was attached through.
    pub fn handle(&self) -> &BufferHandle {
        &self.handle
    }

    /// The segment this view points into.
    pub fn segment(&self) -> SegmentId {
        self.handle.segment
    }

    /// The attached unit.
    pub fn unit(&self) -> UnitId {
        self.unit
    }

    /// Segment length in bytes.
    pub fn byte_len(&self) -> usize {
        self.storage.byte_len()
    }

    /// Copy out the bytes of `[offset, offset + len)`.
    pub fn read_region(&self, offset: usize, len: usize) -> Result<Vec<u8>, BufferError> {
        self.storage.read_region(offset, len)
    }

    /// Run `f` over a region's bytes without copying them out.
    pub fn with_region<R>(
        &self,
        offset: usize,
        len: usize,
        f: impl FnOnce(&[u8]) -> R,
    ) -> Result<R, BufferError> {
        self.storage.with_region(offset, len, f)
    }

    /// Write `bytes` at `offset` under the segment's range lock.
    pub fn write_region(&self, offset: usize, bytes: &[u8]) -> Result<(), BufferError> {
        self.check_writable()?;
        self.storage.write_region(offset, bytes)
    }

    /// Claim exclusive write access to a byte range.
    ///
    /// Blocks while an overlapping claim is held. Use for multi-step
    /// read-modify-write sequences; single writes can go straight
    /// through [`write_region`](BufferView::write_region).
    pub fn lock_range(&self, offset: usize, len: usize) -> Result<RegionGuard<'_>, BufferError> {
        self.check_writable()?;
        self.storage.lock_range(offset, len)
    }
}

impl fmt::Debug for BufferView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferView")
            .field("handle", &self.handle)
            .field("unit", &self.unit)
            .field("writable", &self.writable)
            .finish()
    }
}

/// A scoped attachment: a [`BufferView`] that detaches itself on drop.
///
/// Guarantees the attach/detach pairing on all exit paths, including
/// failure paths — the invariant the pool's refcount reclamation
/// depends on. [`detach`](Attachment::detach) releases explicitly when
/// the caller wants the error.
pub struct Attachment<'p> {
    pool: &'p BufferPool,
    view: Option<BufferView>,
}

impl<'p> Attachment<'p> {
    pub(crate) fn new(pool: &'p BufferPool, view: BufferView) -> Self {
        Self {
            pool,
            view: Some(view),
        }
    }

    /// The underlying view.
    ///
    /// # Panics
    ///
    /// Never panics in practice: the view is only absent after
    /// [`detach`](Attachment::detach), which consumes `self`.
    pub fn view(&self) -> &BufferView {
        self.view.as_ref().expect("attachment holds a view until detached")
    }

    /// Demote the attachment's view to read-only.
    pub fn read_only(mut self) -> Self {
        if let Some(view) = self.view.take() {
            self.view = Some(view.read_only());
        }
        self
    }

    /// Detach explicitly, surfacing any pool error.
    ///
    /// The view is dropped before the detach so the storage reference
    /// is released by the time the segment is reclaimed.
    pub fn detach(mut self) -> Result<(), BufferError> {
        let view = self.view.take().expect("attachment holds a view until detached");
        let segment = view.segment();
        let unit = view.unit();
        drop(view);
        self.pool.detach(segment, unit)
    }
}

impl fmt::Debug for Attachment<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attachment").field("view", &self.view).finish()
    }
}

impl Drop for Attachment<'_> {
    fn drop(&mut self) {
        if let Some(view) = self.view.take() {
            let segment = view.segment();
            let unit = view.unit();
            drop(view);
            // Detach failure here means the segment was already freed;
            // nothing further to release.
            let _ = self.pool.detach(segment, unit);
        }
    }
}
