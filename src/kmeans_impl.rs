//! The strategy-independent phases of a k-means iteration: nearest-centroid assignment
//! over a partition, and the centroid update from reduced statistics.

use crate::{accumulator::ClusterAccumulator, distances::squared_distance, memory::*};

/// Index of the centroid closest to `sample`.
///
/// Centroids are scanned in index order and only a strictly smaller distance replaces the
/// current best, so ties resolve to the lowest centroid index.
#[inline(always)]
pub fn nearest_centroid<T: Primitive>(sample: &[T], centroids: &Matrix<T>) -> usize {
    let mut best = (0, i128::MAX);
    for (idx, c) in centroids.iter_rows().enumerate() {
        let dist = squared_distance(sample, c);
        if dist < best.1 {
            best = (idx, dist);
        }
    }
    best.0
}

/// Assignment phase over one worker's partition: write the nearest centroid of every
/// sample into the corresponding slot of `assignments`.
///
/// Only `assignments` is written, which is the exclusively borrowed slice of the worker
/// owning these samples, so concurrent calls on disjoint partitions can not race.
pub fn assign_partition<T: Primitive>(samples: MatrixView<'_, T>, centroids: &Matrix<T>, assignments: &mut [usize]) {
    debug_assert_eq!(samples.rows(), assignments.len());
    samples.iter_rows()
        .zip(assignments.iter_mut())
        .for_each(|(s, assignment)| *assignment = nearest_centroid(s, centroids));
}

/// Centroid update: every cluster with at least one point becomes the mean of its points,
/// using truncating (toward zero) integer division. Clusters without points keep their
/// previous centroid.
pub fn update_centroids<T: Primitive>(reduced: &ClusterAccumulator, centroids: &mut Matrix<T>) {
    debug_assert_eq!((reduced.k(), reduced.sample_dims()), (centroids.rows(), centroids.cols()));
    for (cluster, &count) in reduced.counts().iter().enumerate() {
        if count == 0 {
            continue;
        }
        let count = count as i64;
        centroids.row_mut(cluster).iter_mut()
            .zip(reduced.sum(cluster).iter())
            .for_each(|(c, &sum)| *c = T::narrow(sum / count));
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use rand::prelude::*;

    #[test]
    fn ties_resolve_to_lowest_index() {
        let centroids = Matrix::from_vec(vec![2i32, 0, -2, 0, 2, 0], 3, 2).unwrap();
        assert_eq!(nearest_centroid(&[0, 0], &centroids), 0);
        assert_eq!(nearest_centroid(&[-1, 0], &centroids), 1);
        assert_eq!(nearest_centroid(&[3, 0], &centroids), 0);
    }

    #[test]
    fn assignment_is_optimal() {
        let mut rnd = StdRng::seed_from_u64(1337);
        let (sample_cnt, sample_dims, k) = (500, 4, 9);
        let samples = Matrix::from_vec(
            (0..sample_cnt * sample_dims).map(|_| rnd.gen_range(-50..50)).collect(), sample_cnt, sample_dims).unwrap();
        let centroids = Matrix::from_vec(
            (0..k * sample_dims).map(|_| rnd.gen_range(-50..50)).collect(), k, sample_dims).unwrap();

        let mut assignments = vec![usize::MAX; sample_cnt];
        assign_partition(samples.full_view(), &centroids, &mut assignments);

        for (s, &assigned) in samples.iter_rows().zip(assignments.iter()) {
            let assigned_dist = squared_distance(s, centroids.row(assigned));
            for (idx, c) in centroids.iter_rows().enumerate() {
                let dist = squared_distance(s, c);
                assert!(assigned_dist <= dist);
                if dist == assigned_dist {
                    assert!(assigned <= idx, "tie not resolved to lowest index");
                }
            }
        }
    }

    #[test]
    fn update_truncates_toward_zero() {
        let samples = Matrix::from_vec(vec![-3i32, 3, -4, 4, 1, 1], 3, 2).unwrap();
        let reduced = ClusterAccumulator::of_partition(1, samples.full_view(), &[0, 0, 0]);
        let mut centroids = Matrix::<i32>::zeroed(1, 2);
        update_centroids(&reduced, &mut centroids);
        assert_eq!(centroids.row(0), &[-2, 2]);

        // (-7, 7) / 2: floor division would give -4
        let samples = Matrix::from_vec(vec![-3i32, 3, -4, 4], 2, 2).unwrap();
        let reduced = ClusterAccumulator::of_partition(1, samples.full_view(), &[0, 0]);
        update_centroids(&reduced, &mut centroids);
        assert_eq!(centroids.row(0), &[-3, 3]);
    }

    #[test]
    fn empty_cluster_keeps_its_centroid() {
        let samples = Matrix::from_vec(vec![1i32, 0, 2, 0, 3, 0], 3, 2).unwrap();
        let reduced = ClusterAccumulator::of_partition(2, samples.full_view(), &[0, 0, 0]);
        let mut centroids = Matrix::from_vec(vec![2, 0, 1337, -1], 2, 2).unwrap();
        update_centroids(&reduced, &mut centroids);
        assert_eq!(centroids.as_slice(), &[2, 0, 1337, -1]);
    }
}
