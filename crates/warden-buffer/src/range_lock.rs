//! Exclusive byte-range locks over a single segment.
//!
//! [`RangeLockTable`] tracks the byte ranges currently claimed by
//! writers. Acquisition blocks while any held range overlaps the
//! requested one; disjoint ranges are granted immediately, so unrelated
//! writers to the same segment proceed in parallel. Release happens on
//! guard drop, on all exit paths.

use std::sync::{Condvar, Mutex};

/// A half-open byte range `[start, end)`.
type Range = (usize, usize);

fn overlaps(a: Range, b: Range) -> bool {
    a.0 < b.1 && b.0 < a.1
}

/// Table of exclusive byte-range claims for one segment.
#[derive(Debug, Default)]
pub struct RangeLockTable {
    held: Mutex<Vec<Range>>,
    released: Condvar,
}

impl RangeLockTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire an exclusive claim on `[offset, offset + len)`.
    ///
    /// Blocks while any held range overlaps. Zero-length requests are
    /// granted immediately and conflict with nothing.
    ///
    /// Re-entrant acquisition of an overlapping range from the same
    /// thread deadlocks, as with any non-reentrant lock.
    pub fn lock(&self, offset: usize, len: usize) -> RangeLockGuard<'_> {
        let range = (offset, offset + len);
        let mut held = self.held.lock().unwrap();
        while len > 0 && held.iter().any(|&h| overlaps(h, range)) {
            held = self.released.wait(held).unwrap();
        }
        held.push(range);
        RangeLockGuard { table: self, range }
    }

    /// Try to acquire without blocking. Returns `None` if an overlapping
    /// range is held.
    pub fn try_lock(&self, offset: usize, len: usize) -> Option<RangeLockGuard<'_>> {
        let range = (offset, offset + len);
        let mut held = self.held.lock().unwrap();
        if len > 0 && held.iter().any(|&h| overlaps(h, range)) {
            return None;
        }
        held.push(range);
        Some(RangeLockGuard { table: self, range })
    }

    /// Number of ranges currently held.
    pub fn held_count(&self) -> usize {
        self.held.lock().unwrap().len()
    }
}

/// RAII claim on a byte range; releases and wakes waiters on drop.
#[must_use]
pub struct RangeLockGuard<'a> {
    table: &'a RangeLockTable,
    range: Range,
}

impl RangeLockGuard<'_> {
    /// Starting byte offset of the claimed range.
    pub fn offset(&self) -> usize {
        self.range.0
    }

    /// Length of the claimed range in bytes.
    pub fn len(&self) -> usize {
        self.range.1 - self.range.0
    }

    /// Whether the claimed range is zero-length.
    pub fn is_empty(&self) -> bool {
        self.range.0 == self.range.1
    }
}

impl Drop for RangeLockGuard<'_> {
    fn drop(&mut self) {
        let mut held = self.table.held.lock().unwrap();
        if let Some(pos) = held.iter().position(|&h| h == self.range) {
            held.swap_remove(pos);
        }
        drop(held);
        self.table.released.notify_all();
    }
}
