use kmeans_par::*;
use rand::prelude::*;

fn main() {
    let (sample_cnt, sample_dims, k, iterations) = (20000, 8, 4, 25);

    // Generate some random data
    let mut rnd = StdRng::seed_from_u64(1337);
    let samples: Vec<i32> = (0..sample_cnt * sample_dims).map(|_| rnd.gen_range(-10_000..10_000)).collect();

    let conf = KMeansConfig::build()
        .init_done(&|_| println!("Initialization completed."))
        .iteration_done(&|s, nr|
            println!("Iteration {} - Checksum: {} | Non-empty clusters: {}",
                nr, s.checksum(), s.centroid_frequency.iter().filter(|&&c| c > 0).count()))
        .build();

    // Calculate kmeans with the rayon parallel loop
    let kmean = KMeans::new(samples, sample_cnt, sample_dims).unwrap();
    let result = kmean.kmeans_parallel_for(k, iterations, KMeans::init_shuffled_sample, &conf).unwrap();

    println!("{}", result.describe_centroids());
}
