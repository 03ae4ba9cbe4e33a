//! Segment pool for allocation-free queue churn.
//!
//! This module provides a thread-safe object pool for [`Segment`] instances.
//! Segments that a queue has fully written and fully drained are reset and
//! parked here, and the next queue that needs a fresh tail segment takes one
//! back out instead of going to the allocator.

use std::fmt;

use crossbeam_queue::SegQueue;

use crate::segment::Segment;

/// Thread-safe pool of reusable, reset segments.
///
/// A pool hands out segments of a single capacity. It can be private to one
/// [`ChunkQueue`](crate::ChunkQueue) or shared between many queues through an
/// `Arc`; sharing introduces no ordering between those queues.
///
/// # Thread Safety
///
/// Acquiring and releasing are lock-free and may happen concurrently from any
/// number of threads. This says nothing about the queues themselves, which
/// still need exclusive access for push and pop.
///
/// # Memory Management
///
/// - Segments are created with [`segment_capacity`](Self::segment_capacity)
///   slots on a pool miss
/// - Released segments hold no elements: every slot was emptied as it was read
/// - An unbounded pool keeps every released segment; a pool built with
///   [`with_max_idle`](Self::with_max_idle) drops segments beyond that limit
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use chunkq::{ChunkQueue, SegmentPool};
///
/// let pool = Arc::new(SegmentPool::with_max_idle(32, 8));
/// let mut inbox: ChunkQueue<u64> = ChunkQueue::with_pool(pool.clone());
/// let mut outbox: ChunkQueue<u64> = ChunkQueue::with_pool(pool);
///
/// inbox.push_back(1);
/// outbox.push_back(2);
/// assert_eq!(inbox.pop_front(), Some(1));
/// ```
pub struct SegmentPool<T> {
    segments: SegQueue<Segment<T>>,
    segment_capacity: usize,
    max_idle: Option<usize>,
}

impl<T> SegmentPool<T> {
    /// Creates an unbounded pool handing out segments of `segment_capacity`.
    ///
    /// # Panics
    ///
    /// Panics if `segment_capacity` is zero.
    pub fn new(segment_capacity: usize) -> Self {
        assert!(segment_capacity > 0, "segment capacity must be at least 1");
        Self {
            segments: SegQueue::new(),
            segment_capacity,
            max_idle: None,
        }
    }

    /// Creates a pool that keeps at most `max_idle` retired segments.
    ///
    /// Segments released while the pool already holds `max_idle` of them are
    /// dropped. A `max_idle` of zero disables recycling entirely.
    ///
    /// # Panics
    ///
    /// Panics if `segment_capacity` is zero.
    pub fn with_max_idle(segment_capacity: usize, max_idle: usize) -> Self {
        Self {
            max_idle: Some(max_idle),
            ..Self::new(segment_capacity)
        }
    }

    #[inline]
    pub fn segment_capacity(&self) -> usize {
        self.segment_capacity
    }

    #[inline]
    pub fn max_idle(&self) -> Option<usize> {
        self.max_idle
    }

    /// Number of retired segments currently held.
    ///
    /// Only a snapshot when other threads acquire or release concurrently.
    #[inline]
    pub fn idle(&self) -> usize {
        self.segments.len()
    }

    /// Retrieves a reset segment from the pool or allocates one if the pool
    /// is empty.
    ///
    /// # Performance
    ///
    /// - **Pool hit**: single lock-free pop
    /// - **Pool miss**: one allocation of `segment_capacity` slots
    #[inline]
    pub(crate) fn acquire(&self) -> Segment<T> {
        self.segments.pop().unwrap_or_else(|| {
            log::trace!(
                "segment pool miss, allocating segment of capacity {}",
                self.segment_capacity
            );
            Segment::new(self.segment_capacity)
        })
    }

    /// Returns a drained segment to the pool for reuse.
    ///
    /// The caller guarantees that `segment` is fully written and fully read,
    /// and that it came from a pool of the same capacity. Both are checked
    /// in debug builds only.
    #[inline]
    pub(crate) fn release(&self, mut segment: Segment<T>) {
        debug_assert!(
            segment.is_drained(),
            "released a segment that is not drained: {segment:?}"
        );
        debug_assert_eq!(segment.capacity(), self.segment_capacity);

        if let Some(max_idle) = self.max_idle {
            if self.segments.len() >= max_idle {
                log::debug!(
                    "segment pool holds {} idle segments, dropping released segment",
                    max_idle
                );
                return;
            }
        }

        segment.reset();
        self.segments.push(segment);
        log::trace!("segment recycled, {} idle", self.segments.len());
    }
}

impl<T> fmt::Debug for SegmentPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SegmentPool")
            .field("segment_capacity", &self.segment_capacity)
            .field("max_idle", &self.max_idle)
            .field("idle", &self.idle())
            .finish()
    }
}
