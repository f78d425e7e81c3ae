use super::{ExecutionStrategy, Lloyd};
use crate::{
    accumulator::ClusterAccumulator, collective::Collective, kmeans_impl, memory::*, partition,
    KMeansConfig, KMeansError, KMeansState, Result, RunContext,
};
use tracing::{debug, info};

/// Message-passing strategy: every rank owns the partition it was scattered, centroids are
/// broadcast by the root at the start of each iteration, and the statistics are combined
/// with an all-reduce, after which every rank computes the same centroids.
pub(crate) struct Distributed<'c, C: Collective> {
    comm: &'c mut C,
    k: usize,
    sample_dims: usize,
}
impl<'c, C: Collective> Distributed<'c, C> {
    pub(crate) fn new(comm: &'c mut C, ctx: &RunContext) -> Self {
        Self { comm, k: ctx.k, sample_dims: ctx.sample_dims }
    }
}

impl<'c, T: Primitive, C: Collective> ExecutionStrategy<T> for Distributed<'c, C> {
    fn name(&self) -> &'static str { "distributed" }

    fn synchronize(&mut self) -> Result<()> {
        self.comm.barrier()
    }

    fn share_centroids(&mut self, centroids: &mut Matrix<T>) -> Result<()> {
        let mut flat = centroids.as_slice().iter().map(|c| c.widen()).collect();
        self.comm.broadcast(&mut flat)?;
        *centroids = narrow_matrix(flat, self.k, self.sample_dims)?;
        Ok(())
    }

    fn assign(&mut self, samples: &Matrix<T>, centroids: &Matrix<T>, assignments: &mut [usize]) -> Result<()> {
        kmeans_impl::assign_partition(samples.full_view(), centroids, assignments);
        Ok(())
    }

    fn accumulate(&mut self, samples: &Matrix<T>, assignments: &[usize]) -> Result<ClusterAccumulator> {
        let local = ClusterAccumulator::of_partition(self.k, samples.full_view(), assignments);
        let reduced = self.comm.all_reduce(&local.to_flat(), |a, b| a + b)?;
        ClusterAccumulator::from_flat(self.k, self.sample_dims, reduced)
    }
}

fn narrow_matrix<T: Primitive>(flat: Vec<i64>, rows: usize, cols: usize) -> Result<Matrix<T>> {
    if flat.len() != rows * cols {
        return Err(KMeansError::Collective(format!(
            "received {} values, expected a {}x{} matrix", flat.len(), rows, cols)));
    }
    Matrix::from_vec(flat.into_iter().map(T::narrow).collect(), rows, cols)
}

/// Make sure every rank runs with the same N, D, K and I. A mismatch poisons the
/// reduced value, so every rank fails instead of blocking in a later collective.
fn verify_shape<C: Collective>(comm: &mut C, ctx: &RunContext) -> Result<()> {
    let own = [ctx.sample_cnt, ctx.sample_dims, ctx.k, ctx.iterations].map(|v| v as i64);
    let agreed = comm.all_reduce(&own, |a, b| if a == b { a } else { -1 })?;
    if agreed[..] != own[..] {
        return Err(KMeansError::InvalidArgument(format!(
            "rank {} disagrees with its group about the run shape (points, dims, clusters, iterations) = {:?}",
            ctx.rank, own)));
    }
    Ok(())
}

/// Scatter the static partitions from the root. Only the root passes `samples`.
fn scatter_samples<T: Primitive, C: Collective>(comm: &mut C, ctx: &RunContext, samples: Option<&Matrix<T>>) -> Result<Matrix<T>> {
    let chunks = samples.map(|samples| {
        partition::partition(ctx.sample_cnt, ctx.workers).iter()
            .map(|p| samples.view(p.range()).as_slice().iter().map(|v| v.widen()).collect())
            .collect()
    });
    let local = comm.scatter(chunks)?;
    let own = partition::partition_for(ctx.sample_cnt, ctx.workers, ctx.rank);
    narrow_matrix(local, own.len, ctx.sample_dims)
}

/// Collect the assignments of all ranks on every rank: each rank fills its own slice of an
/// otherwise zeroed buffer, summing all buffers yields the full assignment vector.
fn gather_assignments<C: Collective>(comm: &mut C, ctx: &RunContext, local: &[usize]) -> Result<Vec<usize>> {
    let own = partition::partition_for(ctx.sample_cnt, ctx.workers, ctx.rank);
    let mut full = vec![0i64; ctx.sample_cnt];
    full[own.range()].iter_mut().zip(local.iter()).for_each(|(f, &a)| *f = a as i64);
    comm.all_reduce(&full, |a, b| a + b)?.into_iter()
        .map(|a| usize::try_from(a).map_err(|_| KMeansError::Collective(format!("invalid cluster id {} gathered", a))))
        .collect()
}

/// Run a distributed k-means on the calling rank.
///
/// ## Arguments
/// - **comm**: This rank's endpoint of the group; `ctx.workers`/`ctx.rank` have to match it
/// - **samples**: All points on the root (rank 0), `None` on every other rank
/// - **centroids**: Initial centroids on the root; ignored on all other ranks
/// - **ctx**: Shape of the run, identical on every rank except for `rank`
///
/// ## Returns
/// The same final state on every rank, including the assignments of all points.
pub(crate) fn calculate<T: Primitive, C: Collective>(comm: &mut C, samples: Option<&Matrix<T>>, centroids: Matrix<T>,
                                                     ctx: &RunContext, config: &KMeansConfig<'_, T>) -> Result<KMeansState<T>> {
    if comm.world_size() != ctx.workers || comm.rank() != ctx.rank {
        return Err(KMeansError::InvalidArgument(format!(
            "endpoint is rank {} of {}, but the run was set up as rank {} of {}",
            comm.rank(), comm.world_size(), ctx.rank, ctx.workers)));
    }
    if ctx.rank == 0 && samples.is_none() {
        return Err(KMeansError::InvalidArgument("the root rank has to provide the samples".into()));
    }
    verify_shape(comm, ctx)?;

    let local_samples = scatter_samples(comm, ctx, samples)?;
    debug!(rank = ctx.rank, local_points = local_samples.rows(), "partition received");

    let mut state = KMeansState::new(local_samples.rows(), ctx.sample_dims, ctx.k);
    state.centroids = centroids;
    {
        let mut strategy = Distributed::new(&mut *comm, ctx);
        Lloyd::calculate(&mut strategy, &local_samples, &mut state, ctx, config)?;
    }

    state.assignments = gather_assignments(comm, ctx, &state.assignments)?;
    if ctx.rank == 0 {
        info!(ranks = ctx.workers, checksum = state.checksum(), elapsed = ?state.elapsed, "distributed run finished");
    }
    Ok(state)
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::collective::local::local_group;
    use std::thread;

    #[test]
    fn shape_mismatch_fails_on_every_rank() {
        let results: Vec<Result<()>> = thread::scope(|s| {
            let handles: Vec<_> = local_group(3).into_iter()
                .map(|mut comm| s.spawn(move || {
                    let clusters = if comm.rank() == 2 { 3 } else { 2 };
                    let ctx = RunContext::new(10, 2, clusters, 5, 3, comm.rank()).unwrap();
                    verify_shape(&mut comm, &ctx)
                }))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(results.iter().all(|r| matches!(r, Err(KMeansError::InvalidArgument(_)))));
    }

    #[test]
    fn scatter_and_gather_follow_the_partitions() {
        let samples = Matrix::from_vec((0..14).collect::<Vec<i32>>(), 7, 2).unwrap();
        let samples = &samples;
        let results: Vec<(Matrix<i32>, Vec<usize>)> = thread::scope(|s| {
            let handles: Vec<_> = local_group(3).into_iter()
                .map(|mut comm| s.spawn(move || {
                    let ctx = RunContext::new(7, 2, 2, 1, 3, comm.rank()).unwrap();
                    let local = scatter_samples(&mut comm, &ctx, (ctx.rank == 0).then_some(samples)).unwrap();
                    let local_assignments = vec![ctx.rank; local.rows()];
                    (local, gather_assignments(&mut comm, &ctx, &local_assignments).unwrap())
                }))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(results[0].0.as_slice(), &[0, 1, 2, 3, 4, 5]);
        assert_eq!(results[1].0.as_slice(), &[6, 7, 8, 9]);
        assert_eq!(results[2].0.as_slice(), &[10, 11, 12, 13]);
        for (_, gathered) in &results {
            assert_eq!(gathered, &vec![0, 0, 0, 1, 1, 2, 2]);
        }
    }
}
