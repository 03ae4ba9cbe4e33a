//! Fixed-capacity segment backing a [`ChunkQueue`](crate::ChunkQueue).
//!
//! A segment is written front to back exactly once and drained front to back
//! exactly once. Once both cursors reach the capacity it is handed to the
//! [`SegmentPool`](crate::SegmentPool), reset, and reused by a later push.

use std::fmt;

/// Append-only-then-drain buffer with independent write and read cursors.
///
/// Slots hold `Option<T>` so that reading an element leaves `None` behind.
/// A segment parked in the pool therefore never keeps a consumed element
/// alive, no matter how long the pool holds on to it.
///
/// # Invariant
///
/// `0 <= read <= write <= capacity`, and every slot in `read..write` is
/// `Some`. Every other slot is `None`.
pub(crate) struct Segment<T> {
    storage: Box<[Option<T>]>,
    write: usize,
    read: usize,
}

impl<T> Segment<T> {
    /// Allocates an empty segment holding up to `capacity` elements.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub(crate) fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "segment capacity must be at least 1");
        Self {
            storage: std::iter::repeat_with(|| None).take(capacity).collect(),
            write: 0,
            read: 0,
        }
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Number of elements written but not yet read.
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.write - self.read
    }

    /// Returns `true` once every slot has been written since the last reset.
    #[inline]
    pub(crate) fn is_fully_written(&self) -> bool {
        self.write == self.storage.len()
    }

    /// Returns `true` when nothing is left to read.
    #[inline]
    pub(crate) fn is_exhausted(&self) -> bool {
        self.read == self.write
    }

    /// Fully written and fully read: the only state in which a segment may be
    /// recycled.
    #[inline]
    pub(crate) fn is_drained(&self) -> bool {
        self.is_fully_written() && self.is_exhausted()
    }

    /// Appends `value`, handing it back as `Err` when the segment is full.
    #[inline]
    pub(crate) fn write(&mut self, value: T) -> Result<(), T> {
        if self.is_fully_written() {
            return Err(value);
        }
        self.storage[self.write] = Some(value);
        self.write += 1;
        Ok(())
    }

    /// Takes the oldest unread element out of its slot.
    ///
    /// The slot is left empty, so the segment holds no reference to the
    /// returned element afterwards.
    #[inline]
    pub(crate) fn read(&mut self) -> Option<T> {
        if self.is_exhausted() {
            return None;
        }
        let value = self.storage[self.read].take();
        self.read += 1;
        debug_assert!(value.is_some(), "unread slot was empty");
        value
    }

    #[inline]
    pub(crate) fn peek(&self) -> Option<&T> {
        if self.is_exhausted() {
            return None;
        }
        self.storage[self.read].as_ref()
    }

    /// Rewinds both cursors. Slots are left as they are: every slot below the
    /// read cursor was already emptied by [`read`](Self::read).
    #[inline]
    pub(crate) fn reset(&mut self) {
        self.write = 0;
        self.read = 0;
    }

    #[cfg(test)]
    pub(crate) fn cursors(&self) -> (usize, usize) {
        (self.write, self.read)
    }

    #[cfg(test)]
    pub(crate) fn storage_ptr(&self) -> *const Option<T> {
        self.storage.as_ptr()
    }

    #[cfg(test)]
    pub(crate) fn occupied_slots(&self) -> usize {
        self.storage.iter().filter(|slot| slot.is_some()).count()
    }
}

impl<T> fmt::Debug for Segment<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Segment")
            .field("capacity", &self.capacity())
            .field("write", &self.write)
            .field("read", &self.read)
            .finish()
    }
}
