use super::ExecutionStrategy;
use crate::{kmeans_impl, memory::*, KMeansConfig, KMeansState, Result, RunContext};
use std::time::Instant;
use tracing::debug;

/// Fixed-iteration Lloyd loop, shared by all execution strategies.
pub(crate) struct Lloyd<T: Primitive> {
    _p: std::marker::PhantomData<T>
}
impl<T: Primitive> Lloyd<T> {
    /// Run `ctx.iterations` iterations on `samples` (the points this rank holds), starting
    /// from the centroids in `state`. There is no early termination.
    ///
    /// Per iteration: centroids are shared, every worker assigns its partition (join),
    /// per-worker statistics are accumulated and reduced (join), and the centroids are
    /// updated from the reduced statistics by this thread alone.
    pub(crate) fn calculate<S>(strategy: &mut S, samples: &Matrix<T>, state: &mut KMeansState<T>,
                               ctx: &RunContext, config: &KMeansConfig<'_, T>) -> Result<()>
                where S: ExecutionStrategy<T> {
        strategy.synchronize()?;
        let start = Instant::now();

        for iteration in 1..=ctx.iterations {
            strategy.share_centroids(&mut state.centroids)?;
            strategy.assign(samples, &state.centroids, &mut state.assignments)?;
            let reduced = strategy.accumulate(samples, &state.assignments)?;
            debug_assert_eq!(reduced.total_count(), ctx.sample_cnt as u64);

            kmeans_impl::update_centroids(&reduced, &mut state.centroids);
            state.centroid_frequency.copy_from_slice(reduced.counts());

            debug!(strategy = strategy.name(), rank = ctx.rank, iteration,
                non_empty_clusters = reduced.non_empty_clusters(), "iteration done");
            (config.iteration_done)(state, iteration);
        }

        strategy.synchronize()?;
        state.elapsed = start.elapsed();
        Ok(())
    }
}
