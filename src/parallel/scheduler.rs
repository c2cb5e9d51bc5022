//! Chunk sizing and partitioning

use std::ops::Range;

/// Maximum number of items per remote request
pub const REMOTE_BATCH_LIMIT: usize = 10;

/// Upper bound on local concurrency
pub const MAX_LOCAL_CONCURRENCY: usize = 10;

/// Work budget spread across the items of a local batch
const LOCAL_WORK_BUDGET: usize = 1000;

/// Local concurrency for a batch: `min(10, max(1, 1000 / count))`
pub fn local_concurrency(item_count: usize) -> usize {
    let per_item = LOCAL_WORK_BUDGET.checked_div(item_count).unwrap_or(LOCAL_WORK_BUDGET);
    per_item.clamp(1, MAX_LOCAL_CONCURRENCY)
}

/// Remote chunk size: the configured batch size, clamped to the request limit
pub fn remote_concurrency(batch_size: usize) -> usize {
    batch_size.clamp(1, REMOTE_BATCH_LIMIT)
}

/// Partition of `total` items into consecutive chunks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    total: usize,
    chunk_size: usize,
}

impl ChunkPlan {
    /// Plan chunks of `chunk_size`; the last may be smaller
    pub fn new(total: usize, chunk_size: usize) -> Self {
        Self {
            total,
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Number of chunks
    pub fn len(&self) -> usize {
        self.total.div_ceil(self.chunk_size)
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Index ranges of every chunk, in order
    pub fn ranges(&self) -> impl Iterator<Item = Range<usize>> + '_ {
        (0..self.total)
            .step_by(self.chunk_size)
            .map(move |start| start..(start + self.chunk_size).min(self.total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_concurrency() {
        assert_eq!(local_concurrency(0), 10);
        assert_eq!(local_concurrency(1), 10);
        assert_eq!(local_concurrency(100), 10);
        assert_eq!(local_concurrency(101), 9);
        assert_eq!(local_concurrency(250), 4);
        assert_eq!(local_concurrency(5000), 1);
    }

    #[test]
    fn test_remote_concurrency() {
        assert_eq!(remote_concurrency(0), 1);
        assert_eq!(remote_concurrency(4), 4);
        assert_eq!(remote_concurrency(50), 10);
    }

    #[test]
    fn test_chunk_ranges() {
        let plan = ChunkPlan::new(25, 10);
        assert_eq!(plan.len(), 3);
        let ranges: Vec<_> = plan.ranges().collect();
        assert_eq!(ranges, vec![0..10, 10..20, 20..25]);
    }

    #[test]
    fn test_empty_plan() {
        let plan = ChunkPlan::new(0, 4);
        assert!(plan.is_empty());
        assert_eq!(plan.len(), 0);
        assert_eq!(plan.ranges().count(), 0);
    }

    #[test]
    fn test_exact_multiple() {
        let plan = ChunkPlan::new(20, 10);
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.ranges().last(), Some(10..20));
    }
}
