use crate::{accumulator::ClusterAccumulator, memory::*, Result};

mod lloyd;
mod threadpool;
mod parallel_for;
pub(crate) mod distributed;

pub(crate) use lloyd::Lloyd;
pub(crate) use threadpool::ThreadPool;
pub(crate) use parallel_for::ParallelFor;

/// The parts of an iteration that differ between execution strategies.
///
/// [`Lloyd`] drives a strategy through the fixed iteration order
/// `share_centroids -> assign -> accumulate`, and performs the centroid update itself.
pub(crate) trait ExecutionStrategy<T: Primitive> {
    fn name(&self) -> &'static str;

    /// Called directly before the first and after the last iteration, so that the timed
    /// region starts and ends at the same point on every worker.
    fn synchronize(&mut self) -> Result<()> { Ok(()) }

    /// Make `centroids` visible to every worker. Shared-memory strategies hand out a
    /// shared reference in [`ExecutionStrategy::assign`] instead.
    fn share_centroids(&mut self, _centroids: &mut Matrix<T>) -> Result<()> { Ok(()) }

    /// Assignment phase over all points this strategy is responsible for.
    /// Returns only after every worker finished its partition.
    fn assign(&mut self, samples: &Matrix<T>, centroids: &Matrix<T>, assignments: &mut [usize]) -> Result<()>;

    /// Accumulate sums/counts per worker and reduce them into the global statistics.
    /// Returns only after the reduction completed.
    fn accumulate(&mut self, samples: &Matrix<T>, assignments: &[usize]) -> Result<ClusterAccumulator>;
}
