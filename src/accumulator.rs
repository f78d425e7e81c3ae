use crate::{memory::*, KMeansError, Result};

/// Per-cluster coordinate sums and point counts of one worker's partition.
///
/// Created fresh each iteration by each worker, merged into a single global accumulator
/// by the reduction, and consumed by the centroid update.
/// Integer addition is exact, so merging in any order or grouping yields identical results.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClusterAccumulator {
    k: usize,
    sample_dims: usize,
    /// [row-major] = [<sum cluster0>,<sum cluster1>,...]
    sums: Vec<i64>,
    counts: Vec<u64>,
}
impl ClusterAccumulator {
    pub fn new(k: usize, sample_dims: usize) -> Self {
        Self { k, sample_dims, sums: vec![0; k * sample_dims], counts: vec![0; k] }
    }

    pub fn k(&self) -> usize { self.k }
    pub fn sample_dims(&self) -> usize { self.sample_dims }
    pub fn counts(&self) -> &[u64] { &self.counts }

    pub fn sum(&self, cluster: usize) -> &[i64] {
        &self.sums[cluster * self.sample_dims..(cluster + 1) * self.sample_dims]
    }

    /// Total amount of points accumulated (equals N after a full reduction).
    pub fn total_count(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Amount of clusters with at least one point.
    pub fn non_empty_clusters(&self) -> usize {
        self.counts.iter().filter(|&&c| c > 0).count()
    }

    /// Add every point of `samples` to the sum and count of its assigned cluster.
    pub fn accumulate<T: Primitive>(&mut self, samples: MatrixView<'_, T>, assignments: &[usize]) {
        debug_assert_eq!(samples.rows(), assignments.len());
        let dims = self.sample_dims;
        samples.iter_rows()
            .zip(assignments.iter().cloned())
            .for_each(|(s, cluster_id)| {
                self.counts[cluster_id] += 1;
                self.sums[cluster_id * dims..(cluster_id + 1) * dims].iter_mut()
                    .zip(s.iter())
                    .for_each(|(acc, sv)| *acc += sv.widen());
            });
    }

    /// Convenience: accumulator of a single partition.
    pub fn of_partition<T: Primitive>(k: usize, samples: MatrixView<'_, T>, assignments: &[usize]) -> Self {
        let mut acc = Self::new(k, samples.cols());
        acc.accumulate(samples, assignments);
        acc
    }

    /// Element-wise addition of `other` into `self`.
    pub fn merge(&mut self, other: &ClusterAccumulator) {
        debug_assert_eq!((self.k, self.sample_dims), (other.k, other.sample_dims));
        self.sums.iter_mut().zip(other.sums.iter()).for_each(|(a, b)| *a += b);
        self.counts.iter_mut().zip(other.counts.iter()).for_each(|(a, b)| *a += b);
    }

    /// Reduce all per-worker accumulators into a single global one.
    pub fn reduce<I>(k: usize, sample_dims: usize, partials: I) -> Self
                where I: IntoIterator<Item = ClusterAccumulator> {
        partials.into_iter().fold(Self::new(k, sample_dims), |mut global, local| {
            global.merge(&local);
            global
        })
    }

    /// Flatten into a single wire buffer: [<sums>..., <counts>...].
    pub fn to_flat(&self) -> Vec<i64> {
        let mut flat = Vec::with_capacity(self.sums.len() + self.counts.len());
        flat.extend_from_slice(&self.sums);
        flat.extend(self.counts.iter().map(|&c| c as i64));
        flat
    }

    /// Inverse of [`ClusterAccumulator::to_flat`].
    ///
    /// ## Errors
    /// [`KMeansError::Collective`] if the buffer does not have the expected length or
    /// carries negative counts.
    pub fn from_flat(k: usize, sample_dims: usize, mut flat: Vec<i64>) -> Result<Self> {
        if flat.len() != k * sample_dims + k {
            return Err(KMeansError::Collective(format!(
                "reduced buffer has {} values, expected {}", flat.len(), k * sample_dims + k)));
        }
        let counts = flat.split_off(k * sample_dims).into_iter()
            .map(|c| u64::try_from(c)
                .map_err(|_| KMeansError::Collective(format!("negative cluster count {} in reduced buffer", c))))
            .collect::<Result<Vec<u64>>>()?;
        Ok(Self { k, sample_dims, sums: flat, counts })
    }
}
