use super::ExecutionStrategy;
use crate::{accumulator::ClusterAccumulator, kmeans_impl, memory::*, partition, KMeansError, Result, RunContext};
use rayon::prelude::*;

/// Assignment delegated to a rayon parallel iterator on a dedicated pool; accumulation
/// runs single-threaded after the parallel loop.
pub(crate) struct ParallelFor {
    k: usize,
    pool: rayon::ThreadPool,
    work_packet_size: usize,
}
impl ParallelFor {
    pub(crate) fn new(ctx: &RunContext) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(ctx.workers)
            .thread_name(|idx| format!("kmeans-rayon-{}", idx))
            .build()
            .map_err(|e| KMeansError::Resource(format!("failed to build rayon pool: {}", e)))?;
        // rayon does not do static scheduling, so the smallest static partition serves as
        // minimum work-packet size instead
        let work_packet_size = partition::partition_for(ctx.sample_cnt, ctx.workers, ctx.workers - 1).len.max(1);
        Ok(Self { k: ctx.k, pool, work_packet_size })
    }
}

impl<T: Primitive> ExecutionStrategy<T> for ParallelFor {
    fn name(&self) -> &'static str { "parallel-for" }

    fn assign(&mut self, samples: &Matrix<T>, centroids: &Matrix<T>, assignments: &mut [usize]) -> Result<()> {
        let work_packet_size = self.work_packet_size;
        self.pool.install(|| {
            samples.as_slice().par_chunks_exact(samples.cols())
                .with_min_len(work_packet_size)
                .zip(assignments.par_iter_mut())
                .for_each(|(s, assignment)| *assignment = kmeans_impl::nearest_centroid(s, centroids));
        });
        Ok(())
    }

    fn accumulate(&mut self, samples: &Matrix<T>, assignments: &[usize]) -> Result<ClusterAccumulator> {
        Ok(ClusterAccumulator::of_partition(self.k, samples.full_view(), assignments))
    }
}
