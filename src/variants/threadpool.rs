use super::ExecutionStrategy;
use crate::{
    accumulator::ClusterAccumulator, kmeans_impl, memory::*,
    partition::{self, Partition},
    KMeansError, Result, RunContext,
};
use std::thread;
use tracing::trace;

/// Run every job on its own scoped OS thread and join all of them before returning.
/// Results are returned in job order.
///
/// ## Errors
/// [`KMeansError::Resource`] if a thread could not be spawned or a job panicked.
/// Threads that were already spawned are joined in either case.
pub(crate) fn fork_join<F, R>(jobs: Vec<F>) -> Result<Vec<R>>
            where F: FnOnce() -> R + Send, R: Send {
    thread::scope(|scope| {
        let mut handles = Vec::with_capacity(jobs.len());
        for (worker, job) in jobs.into_iter().enumerate() {
            let handle = thread::Builder::new()
                .name(format!("kmeans-worker-{}", worker))
                .spawn_scoped(scope, job)
                .map_err(|e| KMeansError::Resource(format!("failed to spawn worker thread {}: {}", worker, e)))?;
            handles.push(handle);
        }
        // join everything first, a panic must not leave other workers unjoined
        let joined: Vec<_> = handles.into_iter().map(|handle| handle.join()).collect();
        joined.into_iter().enumerate()
            .map(|(worker, res)| res
                .map_err(|_| KMeansError::Resource(format!("worker thread {} panicked", worker))))
            .collect()
    })
}

/// Explicit worker threads, one per static partition.
///
/// Assignment and accumulation are each forked over the partitions and joined; the
/// joining thread reduces the per-worker accumulators.
pub(crate) struct ThreadPool {
    k: usize,
    partitions: Vec<Partition>,
}
impl ThreadPool {
    pub(crate) fn new(ctx: &RunContext) -> Self {
        Self { k: ctx.k, partitions: partition::partition(ctx.sample_cnt, ctx.workers) }
    }
}

impl<T: Primitive> ExecutionStrategy<T> for ThreadPool {
    fn name(&self) -> &'static str { "threads" }

    fn assign(&mut self, samples: &Matrix<T>, centroids: &Matrix<T>, assignments: &mut [usize]) -> Result<()> {
        let jobs: Vec<_> = self.partitions.iter()
            .zip(partition::split_mut(assignments, &self.partitions))
            .enumerate()
            .map(|(worker, (p, owned))| {
                let part = samples.view(p.range());
                move || {
                    trace!(worker, offset = p.offset, len = p.len, "assigning partition");
                    kmeans_impl::assign_partition(part, centroids, owned)
                }
            })
            .collect();
        fork_join(jobs)?;
        Ok(())
    }

    fn accumulate(&mut self, samples: &Matrix<T>, assignments: &[usize]) -> Result<ClusterAccumulator> {
        let k = self.k;
        let jobs: Vec<_> = self.partitions.iter()
            .map(|p| {
                let (part, owned) = (samples.view(p.range()), &assignments[p.range()]);
                move || ClusterAccumulator::of_partition(k, part, owned)
            })
            .collect();
        let partials = fork_join(jobs)?;
        Ok(ClusterAccumulator::reduce(self.k, samples.cols(), partials))
    }
}
