use crate::{KMeansError, Result};

/// Validated shape of a single k-means run, handed explicitly to every component
/// instead of being read from process-wide state.
///
/// ## Fields
/// - **sample_cnt**: Amount of points (N)
/// - **sample_dims**: Amount of dimensions per point (D)
/// - **k**: Amount of clusters (K)
/// - **iterations**: Fixed amount of iterations to run (I)
/// - **workers**: Amount of workers (threads or ranks) sharing the points
/// - **rank**: Index of the worker/rank this context belongs to (0 = coordinator)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunContext {
    pub sample_cnt: usize,
    pub sample_dims: usize,
    pub k: usize,
    pub iterations: usize,
    pub workers: usize,
    pub rank: usize,
}
impl RunContext {
    /// Validate the run parameters. This happens before any run state is allocated.
    ///
    /// ## Errors
    /// [`KMeansError::InvalidArgument`] if any of N, D, K, I or the worker count is zero,
    /// if K > N, or if `rank` is not a valid worker index.
    pub fn new(sample_cnt: usize, sample_dims: usize, k: usize, iterations: usize, workers: usize, rank: usize) -> Result<Self> {
        let positive = [("points", sample_cnt), ("dimensions", sample_dims), ("clusters", k),
                        ("iterations", iterations), ("workers", workers)];
        if let Some((name, _)) = positive.iter().find(|(_, v)| *v == 0) {
            return Err(KMeansError::InvalidArgument(format!("amount of {} must be > 0", name)));
        }
        if k > sample_cnt {
            return Err(KMeansError::InvalidArgument(format!(
                "amount of clusters ({}) exceeds amount of points ({})", k, sample_cnt)));
        }
        if rank >= workers {
            return Err(KMeansError::InvalidArgument(format!(
                "rank {} is not below the amount of workers ({})", rank, workers)));
        }
        Ok(Self { sample_cnt, sample_dims, k, iterations, workers, rank })
    }
}
