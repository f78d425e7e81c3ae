use crate::{memory::*, KMeansError, KMeansState, Result};

#[inline(always)]
pub fn calculate<T: Primitive>(state: &mut KMeansState<T>, computed: Vec<T>) -> Result<()> {
    let (k, dims) = (state.centroids.rows(), state.centroids.cols());
    if computed.len() != k * dims {
        return Err(KMeansError::InvalidArgument(format!(
            "{} precomputed centroid values given, {} clusters of {} dimensions need {}",
            computed.len(), k, dims, k * dims)));
    }
    state.centroids = Matrix::from_vec(computed, k, dims)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::{KMeans, KMeansConfig, KMeansError};

    #[test]
    fn train_with_precomputed_centroids() {
        let samples = vec![0, 1, 10, 11, 20, 21];
        let centroids = vec![0, 21];
        let (sample_cnt, sample_dims) = (samples.len(), 1);

        let kmean: KMeans<i32> = KMeans::new(samples, sample_cnt, sample_dims).unwrap();
        let result = kmean.kmeans_threads(2, 200, KMeans::init_precomputed(centroids), &KMeansConfig::default()).unwrap();

        // 10 is equally far from 3 and 17 and stays with the lower cluster
        assert_eq!(result.centroids.as_slice(), &[3, 17]);
    }

    #[test]
    fn wrong_amount_of_values_is_rejected() {
        let kmean: KMeans<i32> = KMeans::new(vec![0, 1, 2, 3], 2, 2).unwrap();
        let res = kmean.kmeans_threads(2, 1, KMeans::init_precomputed(vec![0, 1, 2]), &KMeansConfig::default());
        assert!(matches!(res, Err(KMeansError::InvalidArgument(_))));
    }
}
