//! Segment storage: zero-initialized byte buffers with bounds-checked
//! region access and range-locked writes.

use std::sync::{Arc, RwLock};

use warden_core::{BufferError, SegmentId};

use crate::range_lock::{RangeLockGuard, RangeLockTable};

/// Backing storage for one shared buffer segment.
///
/// The bytes live in a zero-initialized `Vec<u8>` behind a `RwLock`;
/// attached units share the storage through `Arc` clones, so attaching
/// never copies the payload. Every region access is bounds-checked; an
/// out-of-bounds request fails with [`BufferError::RangeOutOfBounds`]
/// rather than panicking.
///
/// Writer exclusivity is a two-level scheme: the [`RangeLockTable`]
/// expresses the contract (overlapping writers queue, disjoint writers
/// interleave), while the `RwLock` bounds the actual byte copy. The
/// write lock is held only for the duration of the copy.
#[derive(Debug)]
pub struct SegmentStorage {
    id: SegmentId,
    byte_len: usize,
    data: RwLock<Vec<u8>>,
    locks: RangeLockTable,
}

impl SegmentStorage {
    /// Create zero-initialized storage of `byte_len` bytes.
    pub fn new(id: SegmentId, byte_len: usize) -> Arc<Self> {
        Arc::new(Self {
            id,
            byte_len,
            data: RwLock::new(vec![0; byte_len]),
            locks: RangeLockTable::new(),
        })
    }

    /// The segment ID this storage was allocated under.
    pub fn id(&self) -> SegmentId {
        self.id
    }

    /// Total length in bytes.
    pub fn byte_len(&self) -> usize {
        self.byte_len
    }

    fn check_range(&self, offset: usize, len: usize) -> Result<(), BufferError> {
        let end = offset.checked_add(len);
        match end {
            Some(end) if end <= self.byte_len => Ok(()),
            _ => Err(BufferError::RangeOutOfBounds {
                segment: self.id,
                offset,
                len,
                byte_len: self.byte_len,
            }),
        }
    }

    /// Copy out the bytes of `[offset, offset + len)`.
    ///
    /// Readers never block each other and never block on range locks;
    /// they observe bytes that were fully written at some point no
    /// earlier than the read (writers copy under the write lock, so
    /// reads are never torn mid-copy).
    pub fn read_region(&self, offset: usize, len: usize) -> Result<Vec<u8>, BufferError> {
        self.check_range(offset, len)?;
        let data = self.data.read().unwrap();
        Ok(data[offset..offset + len].to_vec())
    }

    /// Run `f` over the bytes of `[offset, offset + len)` without
    /// copying them out.
    pub fn with_region<R>(
        &self,
        offset: usize,
        len: usize,
        f: impl FnOnce(&[u8]) -> R,
    ) -> Result<R, BufferError> {
        self.check_range(offset, len)?;
        let data = self.data.read().unwrap();
        Ok(f(&data[offset..offset + len]))
    }

    /// Acquire the exclusive write claim on `[offset, offset + len)`.
    ///
    /// Blocks while an overlapping claim is held; disjoint claims are
    /// granted immediately. The returned guard writes through to this
    /// storage and releases the claim on drop.
    pub fn lock_range(&self, offset: usize, len: usize) -> Result<RegionGuard<'_>, BufferError> {
        self.check_range(offset, len)?;
        let lock = self.locks.lock(offset, len);
        Ok(RegionGuard {
            storage: self,
            lock,
        })
    }

    /// Write `bytes` at `offset`, acquiring the range claim internally.
    pub fn write_region(&self, offset: usize, bytes: &[u8]) -> Result<(), BufferError> {
        let guard = self.lock_range(offset, bytes.len())?;
        guard.write(bytes)
    }
}

/// Exclusive claim on a byte range of one segment.
///
/// Holding the guard is what makes a writer "the" writer for its range;
/// dropping it releases the claim on all exit paths, including failures.
#[must_use]
pub struct RegionGuard<'a> {
    storage: &'a SegmentStorage,
    lock: RangeLockGuard<'a>,
}

impl RegionGuard<'_> {
    /// Starting byte offset of the claimed range.
    pub fn offset(&self) -> usize {
        self.lock.offset()
    }

    /// Length of the claimed range in bytes.
    pub fn len(&self) -> usize {
        self.lock.len()
    }

    /// Whether the claimed range is zero-length.
    pub fn is_empty(&self) -> bool {
        self.lock.is_empty()
    }

    /// Overwrite the whole claimed range.
    ///
    /// `bytes` must be exactly the claimed length.
    pub fn write(&self, bytes: &[u8]) -> Result<(), BufferError> {
        if bytes.len() != self.len() {
            return Err(BufferError::RangeOutOfBounds {
                segment: self.storage.id,
                offset: self.offset(),
                len: bytes.len(),
                byte_len: self.len(),
            });
        }
        let mut data = self.storage.data.write().unwrap();
        data[self.offset()..self.offset() + self.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// Copy out the claimed range's current bytes.
    pub fn read(&self) -> Vec<u8> {
        let data = self.storage.data.read().unwrap();
        data[self.offset()..self.offset() + self.len()].to_vec()
    }
}

// Compile-time assertion: storage must be shareable across units.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<SegmentStorage>();
};
