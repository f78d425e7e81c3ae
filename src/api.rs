use crate::{
    collective::Collective, inits, memory::*,
    variants::{self, ExecutionStrategy, Lloyd},
    KMeansError, Result, RunContext,
};
use std::{fmt::Write, time::Duration};
use tracing::info;

/// Seed of the centroid initialization, unless configured otherwise.
pub const DEFAULT_SEED: u64 = 42;

pub type InitDoneCallbackFn<'a, T> = &'a dyn Fn(&KMeansState<T>);
pub type IterationDoneCallbackFn<'a, T> = &'a dyn Fn(&KMeansState<T>, usize);

/// This is a structure holding various configuration options for a k-means calculation, such as
/// the seed of the initialization, the amount of workers, or a couple of callbacks, that can be
/// set to get status information from a running k-means calculation.
///
/// For a more detailed information about all possible options, have a look at [`KMeansConfigBuilder`].
pub struct KMeansConfig<'a, T: Primitive> {
    /// Callback that is called, when the initialization phase finished
    /// ## Arguments
    /// - **state**: Current [`KMeansState`] after the initialization
    pub(crate) init_done: InitDoneCallbackFn<'a, T>,
    /// Callback that is called after each iteration
    /// ## Arguments
    /// - **state**: Current [`KMeansState`] after the iteration
    /// - **iteration_id**: Number of the current iteration (starting at 1)
    pub(crate) iteration_done: IterationDoneCallbackFn<'a, T>,
    /// Seed of the initialization's random number generator
    pub(crate) seed: u64,
    /// Amount of worker threads used by the shared-memory strategies
    pub(crate) workers: usize,
}
impl<'a, T: Primitive> Default for KMeansConfig<'a, T> {
    fn default() -> Self {
        Self {
            init_done: &|_| {},
            iteration_done: &|_, _| {},
            seed: DEFAULT_SEED,
            workers: std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
        }
    }
}
impl<'a, T: Primitive> KMeansConfig<'a, T> {
    /// Use the [`KMeansConfigBuilder`] to build a [`KMeansConfig`] instance.
    pub fn build() -> KMeansConfigBuilder<'a, T> {
        KMeansConfigBuilder { config: KMeansConfig::default() }
    }
    pub fn seed(&self) -> u64 { self.seed }
    pub fn workers(&self) -> usize { self.workers }
}
impl<'a, T: Primitive> std::fmt::Debug for KMeansConfig<'a, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KMeansConfig").field("seed", &self.seed).field("workers", &self.workers).finish()
    }
}

pub struct KMeansConfigBuilder<'a, T: Primitive> {
    config: KMeansConfig<'a, T>
}
impl<'a, T: Primitive> KMeansConfigBuilder<'a, T> {
    /// Set the callback that should be called after the centroid initialization, before the iteration starts.
    pub fn init_done(mut self, init_done: InitDoneCallbackFn<'a, T>) -> Self {
        self.config.init_done = init_done; self
    }
    /// Set the callback that should be called after each iteration during a running k-means calculation.
    pub fn iteration_done(mut self, iteration_done: IterationDoneCallbackFn<'a, T>) -> Self {
        self.config.iteration_done = iteration_done; self
    }
    /// Set the seed of the random number generator used by the initialization.
    /// Identical seeds select identical initial centroids.
    /// ## Default
    /// [`DEFAULT_SEED`]
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed; self
    }
    /// Set the amount of worker threads of the shared-memory strategies.
    /// ## Default
    /// The available parallelism of the machine
    pub fn workers(mut self, workers: usize) -> Self {
        self.config.workers = workers; self
    }
    /// Return the internally built configuration structure.
    pub fn build(self) -> KMeansConfig<'a, T> { self.config }
}


/// This is the internally used data-structure, storing the current state during calculation, as
/// well as the final result, as returned by the API.
/// All mutations are done in this structure, making [`KMeans`] immutable.
///
/// ## Generics
/// - **T**: Underlying coordinate primitive that was used for the calculation
///
/// ## Fields
/// - **k**: The amount of clusters that were requested when calculating this k-means result
/// - **centroids**: Calculated cluster centers, one row per cluster
/// - **centroid_frequency**: Amount of samples in each cluster, as of the last reduction
/// - **assignments**: Vector mapping each sample to its respective nearest cluster
/// - **elapsed**: Wall-clock time of the iteration loop (initialization and setup excluded)
#[derive(Clone, Debug)]
pub struct KMeansState<T: Primitive> {
    pub k: usize,
    pub centroids: Matrix<T>,
    pub centroid_frequency: Vec<u64>,
    pub assignments: Vec<usize>,
    pub elapsed: Duration,
}
impl<T: Primitive> KMeansState<T> {
    pub(crate) fn new(sample_cnt: usize, sample_dims: usize, k: usize) -> Self {
        Self {
            k,
            centroids: Matrix::zeroed(k, sample_dims),
            centroid_frequency: vec![0; k],
            assignments: vec![0; sample_cnt],
            elapsed: Duration::ZERO,
        }
    }

    /// Sum of all centroid coordinates: a compact signature of the result.
    pub fn checksum(&self) -> i64 {
        self.centroids.sum()
    }

    /// Human readable listing of the final centroids, followed by the checksum.
    pub fn describe_centroids(&self) -> String {
        let mut out = String::from("--- Final centroids ---\n");
        for (idx, c) in self.centroids.iter_rows().enumerate() {
            let coords: Vec<String> = c.iter().map(|v| v.to_string()).collect();
            let _ = writeln!(out, "Centroid {}: [{}]", idx, coords.join(", "));
        }
        let _ = write!(out, "\n--- Checksum ---\n{}\n", self.checksum());
        out
    }
}


/// Entrypoint of this crate's API-Surface.
///
/// Create an instance of this struct, giving the samples you want to operate on. The primitive type
/// of the passed samples array will be the coordinate type of the centroids in the returned
/// [`KMeansState`] structure.
///
/// ## Supported execution strategies
/// All strategies share partitioning, assignment, reduction and update, and produce identical
/// results for identical input, iteration count and seed.
/// - Explicit worker threads [`KMeans::kmeans_threads`]
/// - Rayon parallel loop [`KMeans::kmeans_parallel_for`]
/// - Message passing between ranks [`KMeans::kmeans_distributed`] / [`KMeans::join_distributed`]
///
/// ## Supported initialization methods
/// - Seeded shuffled sample [`KMeans::init_shuffled_sample`]
/// - Precomputed centroids [`KMeans::init_precomputed`]
pub struct KMeans<T: Primitive> {
    samples: Matrix<T>,
}
impl<T: Primitive> KMeans<T> {
    /// Create a new instance of the [`KMeans`] structure.
    ///
    /// ## Arguments
    /// - **samples**: Vector of samples [row-major] = [<sample0>,<sample1>,<sample2>,...]
    /// - **sample_cnt**: Amount of samples, contained in the passed **samples** vector
    /// - **sample_dims**: Amount of dimensions each sample from the **sample** vector has
    pub fn new(samples: Vec<T>, sample_cnt: usize, sample_dims: usize) -> Result<Self> {
        Ok(Self::from_matrix(Matrix::from_vec(samples, sample_cnt, sample_dims)?))
    }

    pub fn from_matrix(samples: Matrix<T>) -> Self {
        Self { samples }
    }

    pub fn sample_cnt(&self) -> usize { self.samples.rows() }
    pub fn sample_dims(&self) -> usize { self.samples.cols() }
    pub fn samples(&self) -> &Matrix<T> { &self.samples }

    /// Validate the run, and initialize a fresh state with the given initialization method.
    fn initialize<'a, F>(&self, k: usize, iterations: usize, workers: usize, rank: usize, init: F,
                         config: &KMeansConfig<'a, T>) -> Result<(RunContext, KMeansState<T>)>
                where for<'c> F: FnOnce(&KMeans<T>, &mut KMeansState<T>, &KMeansConfig<'c, T>) -> Result<()> {
        let ctx = RunContext::new(self.sample_cnt(), self.sample_dims(), k, iterations, workers, rank)?;
        let mut state = KMeansState::new(ctx.sample_cnt, ctx.sample_dims, ctx.k);
        init(self, &mut state, config)?;
        (config.init_done)(&state);
        Ok((ctx, state))
    }

    fn run_shared<'a, S>(&self, strategy: &mut S, ctx: &RunContext, mut state: KMeansState<T>,
                         config: &KMeansConfig<'a, T>) -> Result<KMeansState<T>>
                where S: ExecutionStrategy<T> {
        info!(strategy = strategy.name(), points = ctx.sample_cnt, dims = ctx.sample_dims, clusters = ctx.k,
            iterations = ctx.iterations, workers = ctx.workers, "starting k-means");
        Lloyd::calculate(strategy, &self.samples, &mut state, ctx, config)?;
        info!(strategy = strategy.name(), checksum = state.checksum(), elapsed = ?state.elapsed, "k-means finished");
        Ok(state)
    }

    /// K-Means using explicitly spawned worker threads, one per static partition
    /// (amount: [`KMeansConfigBuilder::workers`]).
    ///
    /// ## Arguments
    /// - **k**: Amount of clusters to search for
    /// - **iterations**: Amount of iterations to run (there is no early termination)
    /// - **init**: Initialization-Method to use for the initialization of the **k** centroids
    /// - **config**: [`KMeansConfig`] instance, containing several configuration options for the calculation.
    ///
    /// ## Returns
    /// Instance of [`KMeansState`], containing the final state (result).
    ///
    /// ## Example
    /// ```rust
    /// use kmeans_par::*;
    ///
    /// let (sample_cnt, sample_dims, k, iterations) = (2000, 4, 8, 20);
    /// let samples: Vec<i32> = (0..sample_cnt * sample_dims).map(|i| ((i * 7919) % 1000) as i32).collect();
    ///
    /// let kmean = KMeans::new(samples, sample_cnt, sample_dims).unwrap();
    /// let config = KMeansConfig::build().workers(4).build();
    /// let result = kmean.kmeans_threads(k, iterations, KMeans::init_shuffled_sample, &config).unwrap();
    ///
    /// println!("Centroids: {:?}", result.centroids);
    /// println!("Checksum: {}", result.checksum());
    /// ```
    pub fn kmeans_threads<'a, F>(&self, k: usize, iterations: usize, init: F, config: &KMeansConfig<'a, T>) -> Result<KMeansState<T>>
                where for<'c> F: FnOnce(&KMeans<T>, &mut KMeansState<T>, &KMeansConfig<'c, T>) -> Result<()> {
        let (ctx, state) = self.initialize(k, iterations, config.workers, 0, init, config)?;
        let mut strategy = variants::ThreadPool::new(&ctx);
        self.run_shared(&mut strategy, &ctx, state, config)
    }

    /// K-Means using a rayon parallel loop for the assignment phase, on a dedicated pool of
    /// [`KMeansConfigBuilder::workers`] threads. Accumulation runs single-threaded.
    ///
    /// Arguments and result are the same as for [`KMeans::kmeans_threads`].
    pub fn kmeans_parallel_for<'a, F>(&self, k: usize, iterations: usize, init: F, config: &KMeansConfig<'a, T>) -> Result<KMeansState<T>>
                where for<'c> F: FnOnce(&KMeans<T>, &mut KMeansState<T>, &KMeansConfig<'c, T>) -> Result<()> {
        let (ctx, state) = self.initialize(k, iterations, config.workers, 0, init, config)?;
        let mut strategy = variants::ParallelFor::new(&ctx)?;
        self.run_shared(&mut strategy, &ctx, state, config)
    }

    /// Distributed K-Means, called on the root rank (rank 0) of **comm**, which holds the samples.
    /// All other ranks of the group have to call [`KMeans::join_distributed`] with the same shape.
    ///
    /// The root initializes the centroids and scatters the static partitions; afterwards every
    /// rank iterates on its own partition only, exchanging nothing but collectives.
    ///
    /// ## Returns
    /// Instance of [`KMeansState`], identical on every rank, including all assignments.
    pub fn kmeans_distributed<'a, C, F>(&self, comm: &mut C, k: usize, iterations: usize, init: F,
                                        config: &KMeansConfig<'a, T>) -> Result<KMeansState<T>>
                where C: Collective, for<'c> F: FnOnce(&KMeans<T>, &mut KMeansState<T>, &KMeansConfig<'c, T>) -> Result<()> {
        if comm.rank() != 0 {
            return Err(KMeansError::InvalidArgument(format!(
                "rank {} does not hold the samples, use KMeans::join_distributed", comm.rank())));
        }
        let (ctx, state) = self.initialize(k, iterations, comm.world_size(), 0, init, config)?;
        info!(strategy = "distributed", points = ctx.sample_cnt, dims = ctx.sample_dims, clusters = ctx.k,
            iterations = ctx.iterations, ranks = ctx.workers, "starting k-means");
        variants::distributed::calculate(comm, Some(&self.samples), state.centroids, &ctx, config)
    }

    /// Take part in a distributed K-Means as a non-root rank of **comm**.
    ///
    /// ## Arguments
    /// - **sample_cnt**, **sample_dims**, **k**, **iterations**: Shape of the run, has to match the root's
    /// - **config**: Only the callbacks are used, initialization happens on the root
    pub fn join_distributed<'a, C: Collective>(comm: &mut C, sample_cnt: usize, sample_dims: usize, k: usize,
                                               iterations: usize, config: &KMeansConfig<'a, T>) -> Result<KMeansState<T>> {
        let ctx = RunContext::new(sample_cnt, sample_dims, k, iterations, comm.world_size(), comm.rank())?;
        if ctx.rank == 0 {
            return Err(KMeansError::InvalidArgument("the root rank has to use KMeans::kmeans_distributed".into()));
        }
        variants::distributed::calculate(comm, None, Matrix::zeroed(k, sample_dims), &ctx, config)
    }

    /// Seeded random sample initialization method (a.k.a. Forgy)
    ///
    /// ## Description
    /// The indices of all samples are shuffled (Fisher-Yates) by a generator seeded with
    /// [`KMeansConfigBuilder::seed`], the first k shuffled samples become the initial centroids.
    /// The same seed and samples therefore always select the same initial centroids.
    ///
    /// ## Note
    /// This method is not meant for direct invocation. Pass a reference to it, to an instance-method of [`KMeans`].
    pub fn init_shuffled_sample(kmean: &KMeans<T>, state: &mut KMeansState<T>, config: &KMeansConfig<'_, T>) -> Result<()> {
        inits::shuffledsample::calculate(kmean, state, config)
    }

    /// Precomputed initialization method
    ///
    /// ## Description
    /// Uses the given centroids [row-major] = [<centroid0>,<centroid1>,...] as initial centroids.
    /// Fails with [`KMeansError::InvalidArgument`] unless exactly k × sample_dims values are given.
    pub fn init_precomputed(centroids: Vec<T>) -> impl FnOnce(&KMeans<T>, &mut KMeansState<T>, &KMeansConfig<'_, T>) -> Result<()> {
        move |_kmean, state, _config| inits::precomputed::calculate(state, centroids)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::collective::local::local_group;
    use rand::prelude::*;
    use std::{cell::Cell, thread};

    fn random_samples(seed: u64, sample_cnt: usize, sample_dims: usize) -> Vec<i32> {
        let mut rnd = StdRng::seed_from_u64(seed);
        (0..sample_cnt * sample_dims).map(|_| rnd.gen_range(-10_000..10_000)).collect()
    }

    /// Distributed run on an in-process group. The root initializes from `precomputed`
    /// if given, otherwise from the seeded shuffled sample.
    fn distributed_run(samples: &[i32], sample_cnt: usize, sample_dims: usize, k: usize, iterations: usize, ranks: usize,
                       precomputed: Option<&[i32]>) -> Vec<KMeansState<i32>> {
        thread::scope(|s| {
            let handles: Vec<_> = local_group(ranks).into_iter()
                .map(|mut comm| s.spawn(move || {
                    let config = KMeansConfig::default();
                    if comm.rank() == 0 {
                        let kmean = KMeans::new(samples.to_vec(), sample_cnt, sample_dims).unwrap();
                        match precomputed {
                            Some(centroids) => kmean.kmeans_distributed(&mut comm, k, iterations,
                                KMeans::init_precomputed(centroids.to_vec()), &config).unwrap(),
                            None => kmean.kmeans_distributed(&mut comm, k, iterations,
                                KMeans::init_shuffled_sample, &config).unwrap(),
                        }
                    } else {
                        KMeans::join_distributed(&mut comm, sample_cnt, sample_dims, k, iterations, &config).unwrap()
                    }
                }))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        })
    }

    #[test]
    fn four_point_example() {
        let kmean = KMeans::new(vec![0, 0, 1, 0, 0, 5, 1, 5], 4, 2).unwrap();
        let config = KMeansConfig::build().workers(2).build();
        let res = kmean.kmeans_threads(2, 1, KMeans::init_precomputed(vec![0, 0, 0, 5]), &config).unwrap();

        assert_eq!(res.assignments, vec![0, 0, 1, 1]);
        assert_eq!(res.centroids.as_slice(), &[0, 0, 0, 5]);
        assert_eq!(res.centroid_frequency, vec![2, 2]);
        assert_eq!(res.checksum(), 5);
    }

    #[test]
    fn identical_initial_centroids_leave_one_cluster_empty() {
        let samples = vec![1, 0, 2, 0, 3, 0, 4, 1];
        let kmean = KMeans::new(samples, 4, 2).unwrap();
        let config = KMeansConfig::build().workers(3).build();

        let threads = kmean.kmeans_threads(2, 3, KMeans::init_precomputed(vec![9, 9, 9, 9]), &config).unwrap();
        assert_eq!(threads.assignments, vec![0; 4]);
        assert_eq!(threads.centroid_frequency, vec![4, 0]);
        assert_eq!(threads.centroids.row(0), &[2, 0]);
        assert_eq!(threads.centroids.row(1), &[9, 9]);

        let par = kmean.kmeans_parallel_for(2, 3, KMeans::init_precomputed(vec![9, 9, 9, 9]), &config).unwrap();
        assert_eq!(par.centroids, threads.centroids);

        for ranks in [1, 3] {
            for res in distributed_run(kmean.samples().as_slice(), 4, 2, 2, 3, ranks, Some(&[9, 9, 9, 9][..])) {
                assert_eq!(res.assignments, vec![0; 4], "ranks = {}", ranks);
                assert_eq!(res.centroid_frequency, vec![4, 0]);
                assert_eq!(res.centroids, threads.centroids);
            }
        }
    }

    #[test]
    fn strategies_and_worker_counts_agree() {
        let (sample_cnt, sample_dims, k, iterations) = (1531, 3, 7, 12);
        let samples = random_samples(1337, sample_cnt, sample_dims);
        let kmean = KMeans::new(samples.clone(), sample_cnt, sample_dims).unwrap();

        let reference = kmean.kmeans_threads(k, iterations, KMeans::init_shuffled_sample,
            &KMeansConfig::build().workers(1).build()).unwrap();
        assert_eq!(reference.centroid_frequency.iter().sum::<u64>(), sample_cnt as u64);

        for workers in [2, 3, 8, 64] {
            let config = KMeansConfig::build().workers(workers).build();
            let threads = kmean.kmeans_threads(k, iterations, KMeans::init_shuffled_sample, &config).unwrap();
            let par = kmean.kmeans_parallel_for(k, iterations, KMeans::init_shuffled_sample, &config).unwrap();
            for res in [&threads, &par] {
                assert_eq!(res.centroids, reference.centroids, "workers = {}", workers);
                assert_eq!(res.assignments, reference.assignments);
                assert_eq!(res.checksum(), reference.checksum());
            }
        }
        for ranks in [1, 2, 5] {
            for res in distributed_run(&samples, sample_cnt, sample_dims, k, iterations, ranks, None) {
                assert_eq!(res.centroids, reference.centroids, "ranks = {}", ranks);
                assert_eq!(res.assignments, reference.assignments);
                assert_eq!(res.centroid_frequency, reference.centroid_frequency);
            }
        }
    }

    #[test]
    fn seed_selects_initial_centroids() {
        let samples = random_samples(3, 500, 2);
        let kmean = KMeans::new(samples, 500, 2).unwrap();
        let initial = |seed: u64| {
            let captured = std::cell::RefCell::new(None);
            let on_init = |s: &KMeansState<i32>| { *captured.borrow_mut() = Some(s.centroids.clone()); };
            let config = KMeansConfig::build().seed(seed).workers(2).init_done(&on_init).build();
            kmean.kmeans_threads(5, 1, KMeans::init_shuffled_sample, &config).unwrap();
            captured.into_inner().unwrap()
        };
        assert_eq!(initial(42), initial(42));
        assert_ne!(initial(42), initial(4242));
    }

    #[test]
    fn iteration_callback_runs_every_iteration() {
        let kmean = KMeans::new(random_samples(5, 200, 2), 200, 2).unwrap();
        let (calls, last) = (Cell::new(0), Cell::new(0));
        let on_iteration = |s: &KMeansState<i32>, nr: usize| {
            assert_eq!(s.centroid_frequency.iter().sum::<u64>(), 200);
            calls.set(calls.get() + 1);
            last.set(nr);
        };
        let config = KMeansConfig::build().iteration_done(&on_iteration).build();
        kmean.kmeans_parallel_for(4, 9, KMeans::init_shuffled_sample, &config).unwrap();
        assert_eq!((calls.get(), last.get()), (9, 9));
    }

    #[test]
    fn invalid_runs_are_rejected() {
        let kmean = KMeans::new(vec![0i32; 8], 4, 2).unwrap();
        let config = KMeansConfig::build().workers(2).build();
        for (k, iterations) in [(0, 1), (5, 1), (2, 0)] {
            assert!(matches!(kmean.kmeans_threads(k, iterations, KMeans::init_shuffled_sample, &config),
                Err(KMeansError::InvalidArgument(_))));
        }
        let no_workers = KMeansConfig::build().workers(0).build();
        assert!(matches!(kmean.kmeans_parallel_for(2, 1, KMeans::init_shuffled_sample, &no_workers),
            Err(KMeansError::InvalidArgument(_))));
    }

    #[test]
    fn describes_centroids() {
        let kmean = KMeans::new(vec![0, 0, 1, 0, 0, 5, 1, 5], 4, 2).unwrap();
        let res = kmean.kmeans_threads(2, 1, KMeans::init_precomputed(vec![0, 0, 0, 5]), &KMeansConfig::default()).unwrap();
        assert_eq!(res.describe_centroids(),
            "--- Final centroids ---\nCentroid 0: [0, 0]\nCentroid 1: [0, 5]\n\n--- Checksum ---\n5\n");
    }
}
