use std::num::NonZeroUsize;
use std::ops::Range;

/// Splits `total` samples among `num_workers` and returns the shard for `worker_id`.
///
/// Properties:
/// - Ranges are contiguous, disjoint and cover `[0..total)`.
/// - Sizes differ by at most 1 (balanced partition).
fn shard_range(total: usize, worker_id: usize, num_workers: usize) -> Range<usize> {
    let base = total / num_workers;
    let rem = total % num_workers;

    let start = worker_id * base + worker_id.min(rem);
    let extra = usize::from(worker_id < rem);

    start..start + base + extra
}

/// The position of a worker among the workers of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardSpec {
    pub worker_id: usize,
    pub num_workers: NonZeroUsize,
}

impl ShardSpec {
    /// # Returns
    /// `None` if `worker_id` is not below `num_workers`.
    pub fn new(worker_id: usize, num_workers: NonZeroUsize) -> Option<Self> {
        (worker_id < num_workers.get()).then_some(Self {
            worker_id,
            num_workers,
        })
    }

    #[inline]
    pub fn range(self, total: usize) -> Range<usize> {
        shard_range(total, self.worker_id, self.num_workers.get())
    }

    /// This worker's part of `items`.
    pub fn slice<T>(self, items: &[T]) -> &[T] {
        &items[self.range(items.len())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(id: usize, workers: usize) -> ShardSpec {
        ShardSpec::new(id, NonZeroUsize::new(workers).unwrap()).unwrap()
    }

    #[test]
    fn shard_range_balanced() {
        // total 10, workers 3 => sizes 4,3,3
        assert_eq!(spec(0, 3).range(10), 0..4);
        assert_eq!(spec(1, 3).range(10), 4..7);
        assert_eq!(spec(2, 3).range(10), 7..10);
    }

    #[test]
    fn more_workers_than_samples() {
        let items = [1, 2];
        assert_eq!(spec(1, 4).slice(&items), &[2]);
        assert!(spec(3, 4).slice(&items).is_empty());
    }

    #[test]
    fn worker_id_out_of_range() {
        assert!(ShardSpec::new(3, NonZeroUsize::new(3).unwrap()).is_none());
    }
}
