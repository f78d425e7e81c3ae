use kmeans_par::*;
use rand::prelude::*;

fn main() {
    let (sample_cnt, sample_dims, k, iterations) = (20000, 8, 4, 100);

    // Generate some random data
    let mut rnd = StdRng::seed_from_u64(1337);
    let samples: Vec<i32> = (0..sample_cnt * sample_dims).map(|_| rnd.gen_range(-10_000..10_000)).collect();

    // Calculate kmeans on explicit worker threads, using the seeded shuffled sample as initialization-method
    let kmean = KMeans::new(samples, sample_cnt, sample_dims).unwrap();
    let result = kmean.kmeans_threads(k, iterations, KMeans::init_shuffled_sample, &KMeansConfig::default()).unwrap();

    println!("Centroids: {:?}", result.centroids);
    println!("Cluster sizes: {:?}", result.centroid_frequency);
    println!("Checksum: {}", result.checksum());
}
