pub(crate) mod shuffledsample;
pub(crate) mod precomputed;
