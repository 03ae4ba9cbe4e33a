//! Unbounded FIFO queue built from pooled, fixed-capacity segments.
//!
//! `chunkq` backs high-churn message queues, such as an actor mailbox,
//! without allocating per element. Elements are appended to fixed-capacity
//! segments. A segment that has been fully written and fully read goes back
//! to a [`SegmentPool`] and is reused by the next push that needs room.
//!
//! ```rust
//! use chunkq::ChunkQueueBuilder;
//!
//! let mut mailbox = ChunkQueueBuilder::new()
//!     .with_segment_capacity(64)
//!     .with_max_idle(16)
//!     .build()
//!     .unwrap();
//!
//! mailbox.push_back("hello");
//! assert_eq!(mailbox.pop_front(), Some("hello"));
//! assert_eq!(mailbox.pop_front(), None);
//! ```
//!
//! The crate logs through the [`log`] facade and never installs a logger.

use std::sync::Arc;

pub use crate::{
    pool::SegmentPool,
    queue::{ChunkQueue, Drain},
};

pub(crate) mod pool;
pub(crate) mod queue;
pub(crate) mod segment;

#[cfg(test)]
pub(crate) mod test_utils;

/// Segment capacity used when a builder is given neither a capacity nor a
/// pool.
pub const DEFAULT_SEGMENT_CAPACITY: usize = 64;

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    #[error("segment capacity must be at least 1")]
    ZeroSegmentCapacity,
    #[error("segment capacity {requested} does not match shared pool capacity {pool}")]
    CapacityMismatch { pool: usize, requested: usize },
    #[error("max idle cannot be configured on a shared pool")]
    MaxIdleWithSharedPool,
}

/// Fallible, configurable construction of a [`ChunkQueue`].
pub struct ChunkQueueBuilder<T> {
    segment_capacity: Option<usize>,
    max_idle: Option<usize>,
    pool: Option<Arc<SegmentPool<T>>>,
}

impl<T> Default for ChunkQueueBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ChunkQueueBuilder<T> {
    pub fn new() -> Self {
        Self {
            segment_capacity: None,
            max_idle: None,
            pool: None,
        }
    }

    pub fn with_segment_capacity(mut self, capacity: usize) -> Self {
        self.segment_capacity = Some(capacity);
        self
    }

    /// Bounds the number of idle segments the queue's private pool keeps.
    pub fn with_max_idle(mut self, max_idle: usize) -> Self {
        self.max_idle = Some(max_idle);
        self
    }

    /// Draws segments from a pool shared with other queues.
    pub fn with_pool(mut self, pool: Arc<SegmentPool<T>>) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn build(self) -> Result<ChunkQueue<T>, BuildError> {
        if self.segment_capacity == Some(0) {
            return Err(BuildError::ZeroSegmentCapacity);
        }

        let pool = match self.pool {
            Some(pool) => {
                if self.max_idle.is_some() {
                    return Err(BuildError::MaxIdleWithSharedPool);
                }
                match self.segment_capacity {
                    Some(requested) if requested != pool.segment_capacity() => {
                        return Err(BuildError::CapacityMismatch {
                            pool: pool.segment_capacity(),
                            requested,
                        });
                    }
                    _ => pool,
                }
            }
            None => {
                let capacity = self.segment_capacity.unwrap_or(DEFAULT_SEGMENT_CAPACITY);
                Arc::new(match self.max_idle {
                    Some(max_idle) => SegmentPool::with_max_idle(capacity, max_idle),
                    None => SegmentPool::new(capacity),
                })
            }
        };

        Ok(ChunkQueue::with_pool(pool))
    }
}
