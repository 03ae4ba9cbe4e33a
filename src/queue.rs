//! Unbounded FIFO queue built from pooled fixed-capacity segments.
//!
//! # Architecture
//!
//! ```text
//! push_back ──► [ back segment ] ... [ front segment ] ──► pop_front
//!                     ▲                      │
//!                     │ acquire              │ release (drained only)
//!                     └──── [ SegmentPool ] ◄┘
//! ```
//!
//! Pushes only touch the back segment and pops only touch the front one, so
//! both are O(1). A segment goes back to the pool once it has been fully
//! written and fully read. A segment that has been read up to its write
//! cursor but is not yet full stays where it is: it is still the write
//! target for the next push.

use std::collections::VecDeque;
use std::fmt;
use std::iter::FusedIterator;
use std::sync::Arc;

use crate::pool::SegmentPool;
use crate::segment::Segment;

/// Unbounded FIFO queue that stores elements in recycled segments.
///
/// Designed to back a high-churn mailbox: elements are written into
/// fixed-capacity segments drawn from a [`SegmentPool`], so steady push/pop
/// traffic allocates nothing once the pool is warm.
///
/// The queue does no synchronization of its own. Pushing and popping take
/// `&mut self`; an owner that shares a queue between threads wraps it in a
/// lock.
///
/// # Example
///
/// ```rust
/// use chunkq::ChunkQueue;
///
/// let mut q = ChunkQueue::new(17);
/// q.push_back("ping");
/// q.push_back("pong");
///
/// assert_eq!(q.len(), 2);
/// assert_eq!(q.pop_front(), Some("ping"));
/// assert_eq!(q.pop_front(), Some("pong"));
/// assert_eq!(q.pop_front(), None);
/// ```
pub struct ChunkQueue<T> {
    /// Front is the oldest segment. Only the front may have been partially
    /// read and only the back may be partially written.
    segments: VecDeque<Segment<T>>,

    /// Pushes minus successful pops.
    len: usize,

    pool: Arc<SegmentPool<T>>,
}

impl<T> ChunkQueue<T> {
    /// Creates an empty queue with a private, unbounded segment pool.
    ///
    /// Use [`ChunkQueueBuilder`](crate::ChunkQueueBuilder) for fallible
    /// construction or a bounded pool.
    ///
    /// # Panics
    ///
    /// Panics if `segment_capacity` is zero.
    pub fn new(segment_capacity: usize) -> Self {
        Self::with_pool(Arc::new(SegmentPool::new(segment_capacity)))
    }

    /// Creates an empty queue drawing its segments from `pool`.
    ///
    /// The queue's segment capacity is the pool's.
    pub fn with_pool(pool: Arc<SegmentPool<T>>) -> Self {
        Self {
            segments: VecDeque::new(),
            len: 0,
            pool,
        }
    }

    /// Number of queued elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn segment_capacity(&self) -> usize {
        self.pool.segment_capacity()
    }

    /// The pool this queue recycles its segments through.
    #[inline]
    pub fn pool(&self) -> &Arc<SegmentPool<T>> {
        &self.pool
    }

    /// Appends `value` to the back of the queue.
    ///
    /// A new segment is taken from the pool when there is no back segment or
    /// the back segment is full. Never fails.
    pub fn push_back(&mut self, value: T) {
        let needs_segment = self
            .segments
            .back()
            .map_or(true, Segment::is_fully_written);
        if needs_segment {
            let segment = self.pool.acquire();
            self.segments.push_back(segment);
        }

        let rejected = match self.segments.back_mut() {
            Some(back) => back.write(value),
            None => Err(value),
        };

        // Unreachable while push takes `&mut self`. A full back segment may
        // still hold unread elements, so it must never be written over.
        if let Err(value) = rejected {
            log::warn!("back segment rejected a write, appending a fresh segment");
            let mut segment = self.pool.acquire();
            if segment.write(value).is_err() {
                unreachable!("freshly acquired segment is full");
            }
            self.segments.push_back(segment);
        }

        self.len += 1;
    }

    /// Removes and returns the element at the front of the queue, or `None`
    /// if the queue is empty.
    pub fn pop_front(&mut self) -> Option<T> {
        while let Some(front) = self.segments.front_mut() {
            if let Some(value) = front.read() {
                self.len -= 1;
                return Some(value);
            }

            if !front.is_fully_written() {
                // Nothing to read, but this is also the back segment and the
                // next push writes into it. Keep it.
                return None;
            }

            if let Some(drained) = self.segments.pop_front() {
                self.pool.release(drained);
            }
        }
        None
    }

    /// Returns a reference to the front element without removing it.
    pub fn front(&self) -> Option<&T> {
        // A drained segment can linger at the front until the next pop.
        self.segments.iter().find_map(Segment::peek)
    }

    /// Removes every element, recycling drained segments as usual.
    pub fn clear(&mut self) {
        while self.pop_front().is_some() {}
    }

    /// Removes elements in FIFO order through an iterator.
    ///
    /// Elements the iterator has not yielded when it is dropped are removed
    /// as well.
    pub fn drain(&mut self) -> Drain<'_, T> {
        Drain { queue: self }
    }

    #[cfg(test)]
    pub(crate) fn segments(&self) -> &VecDeque<Segment<T>> {
        &self.segments
    }

    #[cfg(test)]
    pub(crate) fn assert_invariants(&self) {
        let buffered: usize = self.segments.iter().map(Segment::len).sum();
        assert_eq!(buffered, self.len, "len out of step with segments");

        let last = self.segments.len().saturating_sub(1);
        for (i, seg) in self.segments.iter().enumerate() {
            let (write, read) = seg.cursors();
            assert!(read <= write && write <= seg.capacity());
            if i > 0 {
                assert_eq!(read, 0, "only the front segment may be partially read");
            }
            if i < last {
                assert!(
                    seg.is_fully_written(),
                    "only the back segment may be partially written"
                );
            }
        }
    }
}

impl<T> Extend<T> for ChunkQueue<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.push_back(value);
        }
    }
}

impl<T> fmt::Debug for ChunkQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkQueue")
            .field("len", &self.len)
            .field("segments", &self.segments.len())
            .field("pool", &self.pool)
            .finish()
    }
}

/// Draining iterator returned by [`ChunkQueue::drain`].
pub struct Drain<'a, T> {
    queue: &'a mut ChunkQueue<T>,
}

impl<T> Iterator for Drain<'_, T> {
    type Item = T;

    #[inline]
    fn next(&mut self) -> Option<T> {
        self.queue.pop_front()
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.queue.len(), Some(self.queue.len()))
    }
}

impl<T> ExactSizeIterator for Drain<'_, T> {}

impl<T> FusedIterator for Drain<'_, T> {}

impl<T> Drop for Drain<'_, T> {
    fn drop(&mut self) {
        self.queue.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::init_logging;
    use rand::{Rng, SeedableRng, rngs::SmallRng};
    use std::sync::Weak;

    #[test]
    fn test_push_pop_in_order() {
        init_logging();
        let mut q = ChunkQueue::new(4);
        assert_eq!(q.len(), 0);
        assert!(q.is_empty());

        for i in 0..10 {
            q.push_back(i);
            q.assert_invariants();
        }
        assert_eq!(q.len(), 10);
        assert_eq!(q.segments().len(), 3);

        for i in 0..10 {
            assert_eq!(q.pop_front(), Some(i));
            q.assert_invariants();
        }
        assert_eq!(q.pop_front(), None);
        assert!(q.is_empty());
    }

    #[test]
    fn test_randomized_against_model() {
        init_logging();
        const CAPACITY: usize = 17;
        const RUNS: usize = 128;
        const STEPS: usize = 200;

        let seed = 0x00C4_u64;
        let mut rng = SmallRng::seed_from_u64(seed);
        let mut q = ChunkQueue::new(CAPACITY);
        let mut model = VecDeque::new();

        for init in 0..RUNS {
            for i in 0..init {
                q.push_back(i);
                model.push_back(i);
            }
            for i in init..init + STEPS {
                if rng.random_bool(0.5) {
                    q.push_back(i);
                    model.push_back(i);
                } else if !model.is_empty() {
                    let got = q.pop_front();
                    let want = model.pop_front();
                    assert_eq!(got, want, "seed {seed} backlog {init} step {i}");
                }
                assert_eq!(q.len(), model.len(), "seed {seed} backlog {init} step {i}");
            }
            q.assert_invariants();
        }

        // Whatever is left comes out in order.
        while let Some(want) = model.pop_front() {
            assert_eq!(q.pop_front(), Some(want));
        }
        assert_eq!(q.pop_front(), None);
    }

    #[test]
    fn test_retains_undrained_segment() {
        init_logging();
        let mut q = ChunkQueue::new(17);
        q.push_back(1);
        let ptr = q.segments()[0].storage_ptr();

        assert_eq!(q.pop_front(), Some(1));
        assert_eq!(q.segments().len(), 1);
        assert_eq!(q.segments()[0].storage_ptr(), ptr);

        assert_eq!(q.pop_front(), None);
        assert_eq!(q.segments().len(), 1);
        assert_eq!(q.segments()[0].storage_ptr(), ptr);

        // The retained segment stays out of the pool and keeps taking writes.
        assert_eq!(q.pool().idle(), 0);
        q.push_back(2);
        assert_eq!(q.segments()[0].storage_ptr(), ptr);
        assert_eq!(q.segments()[0].cursors(), (2, 1));
    }

    #[test]
    fn test_retains_segment_one_short_of_drained() {
        init_logging();
        let cap = 5;
        let mut q = ChunkQueue::new(cap);
        for i in 0..cap {
            q.push_back(i);
        }
        for i in 0..cap - 1 {
            assert_eq!(q.pop_front(), Some(i));
        }
        assert!(!q.is_empty());
        assert_eq!(q.segments().len(), 1);
        assert_eq!(q.pool().idle(), 0);

        // The segment is full, so the next push opens a second one; nothing
        // was recycled because the last element is still unread.
        q.push_back(cap);
        assert_eq!(q.segments().len(), 2);
        assert_eq!(q.pop_front(), Some(cap - 1));
        assert_eq!(q.pop_front(), Some(cap));
        assert_eq!(q.pool().idle(), 1);
        q.assert_invariants();
    }

    #[test]
    fn test_drained_segment_is_recycled_and_reused() {
        init_logging();
        let cap = 3;
        let mut q = ChunkQueue::new(cap);
        for i in 0..cap {
            q.push_back(i);
        }
        let ptr = q.segments()[0].storage_ptr();
        for i in 0..cap {
            assert_eq!(q.pop_front(), Some(i));
        }

        // The drained segment is detached on the pop that finds it empty.
        assert_eq!(q.segments().len(), 1);
        assert_eq!(q.pop_front(), None);
        assert_eq!(q.segments().len(), 0);
        assert_eq!(q.pool().idle(), 1);

        q.push_back(42);
        assert_eq!(q.pool().idle(), 0);
        assert_eq!(q.segments()[0].storage_ptr(), ptr);
        assert_eq!(q.segments()[0].cursors(), (1, 0));
        assert_eq!(q.pop_front(), Some(42));
        q.assert_invariants();
    }

    #[test]
    fn test_capacity_one() {
        init_logging();
        let mut q = ChunkQueue::new(1);
        q.extend(0..5);
        assert_eq!(q.segments().len(), 5);
        assert_eq!(q.drain().collect::<Vec<_>>(), vec![0, 1, 2, 3, 4]);
        assert!(q.is_empty());
        q.assert_invariants();
    }

    #[test]
    fn test_no_reference_to_consumed_values() {
        init_logging();
        let mut q = ChunkQueue::new(8);
        let values: Vec<_> = (0..5).map(Arc::new).collect();
        let weak: Vec<Weak<i32>> = values.iter().map(Arc::downgrade).collect();
        q.extend(values);

        for _ in 0..3 {
            drop(q.pop_front());
        }
        // The segment is still in place as the write target.
        assert_eq!(q.segments().len(), 1);
        assert_eq!(q.segments()[0].occupied_slots(), 2);
        assert!(weak[..3].iter().all(|w| w.upgrade().is_none()));
        assert!(weak[3..].iter().all(|w| w.upgrade().is_some()));
    }

    #[test]
    fn test_no_reference_to_consumed_values_in_pool() {
        let pool = Arc::new(SegmentPool::new(2));
        let mut q = ChunkQueue::with_pool(pool.clone());
        let value = Arc::new(String::from("payload"));
        let weak = Arc::downgrade(&value);

        q.push_back(value);
        q.push_back(Arc::new(String::from("other")));
        q.clear();
        assert_eq!(pool.idle(), 1);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_front_skips_drained_segment() {
        let mut q = ChunkQueue::new(2);
        assert_eq!(q.front(), None);

        q.extend([1, 2, 3]);
        assert_eq!(q.front(), Some(&1));
        q.pop_front();
        q.pop_front();
        // The first segment is drained but not yet detached.
        assert_eq!(q.segments().len(), 2);
        assert_eq!(q.front(), Some(&3));
        assert_eq!(q.pop_front(), Some(3));
        assert_eq!(q.front(), None);
    }

    #[test]
    fn test_drain_drop_clears_remaining() {
        let mut q = ChunkQueue::new(4);
        q.extend(0..10);
        {
            let mut drain = q.drain();
            assert_eq!(drain.len(), 10);
            assert_eq!(drain.next(), Some(0));
            assert_eq!(drain.next(), Some(1));
        }
        assert!(q.is_empty());
        assert_eq!(q.pop_front(), None);
        q.assert_invariants();
    }

    #[test]
    fn test_shared_pool_between_queues() {
        init_logging();
        let pool = Arc::new(SegmentPool::new(4));
        let mut a = ChunkQueue::with_pool(pool.clone());
        let mut b = ChunkQueue::with_pool(pool.clone());

        a.extend(0..8);
        a.clear();
        assert_eq!(pool.idle(), 2);

        b.extend(100..108);
        assert_eq!(pool.idle(), 0);
        assert_eq!(b.drain().collect::<Vec<_>>(), (100..108).collect::<Vec<_>>());
        assert_eq!(a.pop_front(), None);
    }

    #[test]
    fn test_steady_churn_does_not_allocate() {
        let pool = Arc::new(SegmentPool::new(4));
        let mut q = ChunkQueue::with_pool(pool.clone());

        // Warm up: two segments in flight at most.
        q.extend(0..8);
        q.clear();
        let idle = pool.idle();

        for round in 0..100 {
            q.extend(0..8);
            assert_eq!(q.len(), 8, "round {round}");
            q.clear();
            assert_eq!(pool.idle(), idle, "round {round}");
        }
    }

    #[test]
    fn test_queue_moves_across_threads() {
        let mut q = ChunkQueue::new(3);
        q.extend(0..7);
        let handle = std::thread::spawn(move || q.drain().collect::<Vec<_>>());
        assert_eq!(handle.join().unwrap(), (0..7).collect::<Vec<_>>());
    }

    #[test]
    #[should_panic(expected = "segment capacity must be at least 1")]
    fn test_zero_capacity_assertion() {
        let _ = ChunkQueue::<u8>::new(0);
    }
}
