//! Seeded synthetic datasets for demos and tests.

use ndarray::{Array2, ArrayView2};
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::{Dataset, DatasetError};

/// Isotropic Gaussian blobs, one per row of `centers`.
///
/// Samples are laid out class by class (all of class 0, then class 1, ...),
/// so unshuffled contiguous folds see very skewed label distributions.
pub fn make_blobs(
    samples_per_class: usize,
    centers: ArrayView2<f64>,
    cluster_std: f64,
    seed: u64,
) -> Result<Dataset<usize, f64>, DatasetError> {
    if samples_per_class == 0 || centers.nrows() == 0 {
        return Err(DatasetError::Empty);
    }
    let noise = Normal::new(0.0, cluster_std)
        .map_err(|e| DatasetError::InvalidParameter(format!("cluster_std: {e}")))?;
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);

    let n_samples = samples_per_class * centers.nrows();
    let mut records = Array2::zeros((n_samples, centers.ncols()));
    let mut targets = Vec::with_capacity(n_samples);
    for (class, center) in centers.rows().into_iter().enumerate() {
        for i in 0..samples_per_class {
            let row = class * samples_per_class + i;
            for (j, &c) in center.iter().enumerate() {
                records[[row, j]] = c + noise.sample(&mut rng);
            }
            targets.push(class);
        }
    }
    Dataset::new(records, targets)
}

/// Random blob centres drawn uniformly from `[-spread, spread]` per feature.
pub fn random_centers(n_classes: usize, n_features: usize, spread: f64, seed: u64) -> Array2<f64> {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    Array2::from_shape_fn((n_classes, n_features), |_| rng.random_range(-spread..=spread))
}
