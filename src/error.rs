use std::{io, path::PathBuf};

/// Error type of every fallible operation in this crate.
///
/// None of these are retried: a k-means run is a batch computation without
/// partial results, so any error discards the run.
#[derive(Debug, thiserror::Error)]
pub enum KMeansError {
    /// A run parameter is zero, out of range, or inconsistent with the data.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The dataset could not be opened or read.
    #[error("cannot read dataset '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The dataset is shorter than N×D values or contains a non-integer token.
    #[error("malformed dataset: {0}")]
    Format(String),
    /// A worker thread, thread pool or child process could not be created, or died.
    #[error("resource failure: {0}")]
    Resource(String),
    /// A collective operation failed: peer disconnected, or protocol mismatch.
    #[error("collective failure: {0}")]
    Collective(String),
}

pub type Result<T, E = KMeansError> = std::result::Result<T, E>;
