use crate::{memory::*, KMeans, KMeansConfig, KMeansState, Result};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

/// Fisher-Yates shuffle of all point indices `0..sample_cnt`, driven by a generator seeded
/// with `seed`. The same `(sample_cnt, seed)` always yields the same permutation.
pub fn shuffled_indices(sample_cnt: usize, seed: u64) -> Vec<usize> {
    let mut rnd = ChaCha8Rng::seed_from_u64(seed);
    let mut indices: Vec<usize> = (0..sample_cnt).collect();
    indices.shuffle(&mut rnd);
    indices
}

#[inline(always)]
pub fn calculate<T: Primitive>(kmean: &KMeans<T>, state: &mut KMeansState<T>, config: &KMeansConfig<'_, T>) -> Result<()> {
    shuffled_indices(kmean.sample_cnt(), config.seed).into_iter()
        .take(state.k)
        .enumerate()
        .for_each(|(ci, si)| { // Copy the first k shuffled samples into state.centroids
            state.centroids.set_row(ci, kmean.samples().row(si));
        });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_permutation() {
        assert_eq!(shuffled_indices(1000, 42), shuffled_indices(1000, 42));
        assert_ne!(shuffled_indices(1000, 42), shuffled_indices(1000, 43));
    }

    #[test]
    fn permutation_of_all_indices() {
        let mut indices = shuffled_indices(257, 42);
        indices.sort_unstable();
        assert_eq!(indices, (0..257).collect::<Vec<_>>());
    }

    #[test]
    fn picks_k_distinct_samples() {
        let samples: Vec<i32> = (0..100).flat_map(|i| [i, -i]).collect();
        let kmean = KMeans::new(samples, 100, 2).unwrap();
        let config = KMeansConfig::build().seed(7).build();
        let mut state = KMeansState::new(100, 2, 10);
        calculate(&kmean, &mut state, &config).unwrap();

        let expected: Vec<i32> = shuffled_indices(100, 7).into_iter().take(10)
            .flat_map(|i| [i as i32, -(i as i32)]).collect();
        assert_eq!(state.centroids.as_slice(), &expected[..]);

        let mut firsts: Vec<i32> = state.centroids.iter_rows().map(|c| c[0]).collect();
        firsts.sort_unstable();
        firsts.dedup();
        assert_eq!(firsts.len(), 10);
    }
}
