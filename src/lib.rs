//! # kmeans-par - API documentation
//!
//! kmeans-par is a small rust library for fixed-iteration k-means clustering of integer points,
//! with one algorithm and three interchangeable execution strategies.
//!
//! ## Design target
//! Its main target is reproducibility across execution strategies: for the same input,
//! iteration count and seed, every strategy and every worker count produce exactly the same
//! centroids, down to the last integer. All arithmetic on coordinates is integer arithmetic
//! (sums are accumulated as [`i64`], distances compared as [`i128`], means truncated toward zero),
//! so no floating point reduction order can make results diverge.
//!
//! ## Supported execution strategies
//! - Explicit worker threads, one per static partition of the points
//! - A rayon parallel loop over the assignment phase
//! - Message passing between ranks that share no memory (see [`collective`])
//!
//! For the entry points, have a look at the documentation of [`KMeans`].
//!
//! ## Supported centroid initializations
//! - Seeded shuffled sample: the first k points of a seeded permutation
//! - Precomputed centroids
//!
//! ## Supported primitive types
//! - [`i8`]
//! - [`i16`]
//! - [`i32`]
//!
//! ## Example
//! ```rust
//! use kmeans_par::*;
//!
//! fn main() {
//!     let (sample_cnt, sample_dims, k, iterations) = (20000, 4, 8, 50);
//!
//!     // Generate some deterministic data
//!     let samples: Vec<i32> = (0..sample_cnt * sample_dims).map(|i| ((i * 7919) % 10007) as i32).collect();
//!
//!     let kmean = KMeans::new(samples, sample_cnt, sample_dims).unwrap();
//!     let config = KMeansConfig::build().workers(4).build();
//!     let threads = kmean.kmeans_threads(k, iterations, KMeans::init_shuffled_sample, &config).unwrap();
//!     let parallel_for = kmean.kmeans_parallel_for(k, iterations, KMeans::init_shuffled_sample, &config).unwrap();
//!
//!     assert_eq!(threads.centroids, parallel_for.centroids);
//!     println!("{}", threads.describe_centroids());
//! }
//! ```
//!
//! ## Example (using the status event callbacks)
//! ```rust
//! use kmeans_par::*;
//!
//! fn main() {
//!     let (sample_cnt, sample_dims, k, iterations) = (5000, 2, 4, 10);
//!     let samples: Vec<i16> = (0..sample_cnt * sample_dims).map(|i| (i % 1000) as i16).collect();
//!
//!     let conf = KMeansConfig::build()
//!         .init_done(&|_| println!("Initialization completed."))
//!         .iteration_done(&|s, nr| println!("Iteration {} - Checksum: {}", nr, s.checksum()))
//!         .build();
//!
//!     let kmean = KMeans::new(samples, sample_cnt, sample_dims).unwrap();
//!     let result = kmean.kmeans_threads(k, iterations, KMeans::init_shuffled_sample, &conf).unwrap();
//!     println!("Cluster sizes: {:?}", result.centroid_frequency);
//! }
//! ```
//!
//! ## Short API-Overview / Description
//! Entry-point of the library is the [`KMeans`] struct. This struct is generic over the coordinate
//! primitive. To use KMeans, an instance of this struct is created, taking over the sample data into
//! its ownership.
//!
//! The [`KMeans`] struct's instance-methods represent the supported execution strategies. Calling such
//! a method does not mutate it, so multiple runs can be done on the same instance. Internally, a new
//! instance of [`KMeansState`] is used to store the state (and finally the result) of a calculation.
//!
//! Every run is validated before any state is allocated, failures are reported as [`KMeansError`].

mod error;
mod memory;
mod context;
mod partition;
mod distances;
mod accumulator;
mod kmeans_impl;
mod api;
mod variants;
mod inits;
mod dataset;
pub mod collective;

pub use error::{KMeansError, Result};
pub use api::{KMeansState, KMeansConfig, KMeansConfigBuilder, KMeans, DEFAULT_SEED};
pub use memory::{Primitive, Matrix, MatrixView};
pub use context::RunContext;
pub use partition::{partition, partition_for, Partition};
pub use accumulator::ClusterAccumulator;
pub use distances::squared_distance;
pub use kmeans_impl::nearest_centroid;
pub use inits::shuffledsample::shuffled_indices;
pub use dataset::{read_dataset, parse_dataset};
pub use collective::{Collective, local::{local_group, LocalCollective}, tcp::{connect, TcpCollective, TcpRoot}};
