mod euclideandistance;

pub use euclideandistance::squared_distance;
