//! Static, load-balanced split of the point index range across workers.
//!
//! Every execution strategy uses this same split, so that results stay comparable
//! between strategies and worker counts.

use std::ops::Range;

/// Contiguous range of point indices owned by one worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Partition {
    pub offset: usize,
    pub len: usize,
}
impl Partition {
    pub fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.len
    }
}

/// Partition of worker `worker` when splitting `total` points across `workers` workers.
///
/// Every worker gets `total / workers` points, the first `total % workers` workers one
/// additional point. Offsets are the prefix sums of the lengths in worker order.
///
/// ## Panics
/// If `workers` is zero or `worker >= workers`.
pub fn partition_for(total: usize, workers: usize, worker: usize) -> Partition {
    assert!(worker < workers, "worker {} does not exist among {} workers", worker, workers);
    let (base, remainder) = (total / workers, total % workers);
    Partition {
        offset: worker * base + worker.min(remainder),
        len: base + usize::from(worker < remainder),
    }
}

/// Partitions of all `workers` workers, in worker order. Empty for zero workers.
pub fn partition(total: usize, workers: usize) -> Vec<Partition> {
    (0..workers).map(|w| partition_for(total, workers, w)).collect()
}

/// Split `items` into the disjoint mutable slices described by `partitions`.
/// The partitions have to be consecutive and start at 0, as produced by [`partition`].
pub(crate) fn split_mut<'a, T>(mut items: &'a mut [T], partitions: &[Partition]) -> Vec<&'a mut [T]> {
    partitions.iter()
        .map(|p| {
            let (head, tail) = std::mem::take(&mut items).split_at_mut(p.len);
            items = tail;
            head
        })
        .collect()
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic]
    fn zero_workers_panics() {
        partition_for(10, 0, 0);
    }

    #[test]
    fn zero_workers_have_no_partitions() {
        assert!(partition(10, 0).is_empty());
    }

    #[test]
    fn covers_range_without_gaps_or_overlaps() {
        for total in 0..64 {
            for workers in 1..12 {
                let parts = partition(total, workers);
                assert_eq!(parts.len(), workers);
                assert_eq!(parts.iter().map(|p| p.len).sum::<usize>(), total);
                let mut expected_offset = 0;
                for p in &parts {
                    assert_eq!(p.offset, expected_offset);
                    expected_offset += p.len;
                }
                assert_eq!(expected_offset, total);
            }
        }
    }

    #[test]
    fn remainder_goes_to_first_workers() {
        let lens: Vec<usize> = partition(10, 4).iter().map(|p| p.len).collect();
        assert_eq!(lens, vec![3, 3, 2, 2]);
        assert_eq!(partition(10, 4)[2], Partition { offset: 6, len: 2 });
        assert_eq!(partition(2, 3)[2], Partition { offset: 2, len: 0 });
    }

    #[test]
    fn stable_across_calls() {
        assert_eq!(partition(1001, 7), partition(1001, 7));
        for w in 0..7 {
            assert_eq!(partition_for(1001, 7, w), partition(1001, 7)[w]);
        }
    }

    #[test]
    fn split_mut_follows_partitions() {
        let mut items: Vec<usize> = (0..10).collect();
        let parts = partition(items.len(), 3);
        let slices = split_mut(&mut items, &parts);
        assert_eq!(slices.iter().map(|s| s.len()).collect::<Vec<_>>(), vec![4, 3, 3]);
        assert_eq!(slices[1].to_vec(), vec![4, 5, 6]);
    }
}
