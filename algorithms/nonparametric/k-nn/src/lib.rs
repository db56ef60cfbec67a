use std::collections::HashMap;

use modsel_helpers::{DataPoint, Dataset, Distance, Estimator, Float, Label, accuracy};
use ndarray::ArrayView1;
use thiserror::Error;

#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

/// Errors that can occur when using the k-NN classifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KnnError {
    #[error("k cannot be zero for a k-NN classifier")]
    InvalidK,
    /// `predict` or `score` was called before `fit`.
    #[error("the classifier has not been fitted")]
    NotFitted,
    #[error("query has {actual} features, the training data has {expected}")]
    FeatureMismatch { expected: usize, actual: usize },
    /// Invalid distance comparison (likely due to NaN values in data)
    #[error("invalid distance comparison (likely due to NaN values in data)")]
    InvalidDistance,
}

/// A k-Nearest Neighbors (k-NN) classifier.
///
/// This classifier predicts the label of a new data point by finding the `k`
/// most similar points in its training set and taking a majority vote among
/// their labels. A tied vote goes to the tied label whose closest neighbour
/// is nearest.
///
/// # Type Parameters
///
/// * `L`: The type of the label (e.g., `usize`, `&'static str`, or a custom `enum`).
/// * `F`: The float type for the features (e.g., `f32`, `f64`).
/// * `D`: The distance metric, which must implement the `Distance` trait.
#[derive(Debug, Clone)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
pub struct KnnClassifier<L, F, D>
where
    L: Label,
    F: Float,
    D: Distance<F>,
{
    k: usize,
    training_data: Vec<DataPoint<L, F>>,
    distance: D,
}

impl<L, F, D> KnnClassifier<L, F, D>
where
    L: Label,
    F: Float,
    D: Distance<F>,
{
    /// Creates an unfitted classifier; `k` is checked when fitting.
    pub fn new(k: usize, distance: D) -> Self {
        Self {
            k,
            training_data: Vec::new(),
            distance,
        }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn is_fitted(&self) -> bool {
        !self.training_data.is_empty()
    }

    /// Predicts the label for a new, unseen data point.
    ///
    /// # Errors
    ///
    /// Returns `KnnError::NotFitted` before `fit`, `KnnError::FeatureMismatch`
    /// for a query of the wrong width and `KnnError::InvalidDistance` when a
    /// distance is NaN.
    pub fn predict(&self, features: ArrayView1<F>) -> Result<L, KnnError> {
        let first = self.training_data.first().ok_or(KnnError::NotFitted)?;
        if first.n_features() != features.len() {
            return Err(KnnError::FeatureMismatch {
                expected: first.n_features(),
                actual: features.len(),
            });
        }

        // 1. Relative distances (e.g. squared Euclidean) to every training point.
        let mut distances: Vec<(F, &L)> = self
            .training_data
            .iter()
            .map(|dp| (self.distance.rdistance(dp.features.view(), features), &dp.label))
            .collect();
        if distances.iter().any(|(d, _)| d.is_nan()) {
            return Err(KnnError::InvalidDistance);
        }

        // 2. Closest `k` first; k may exceed the training set.
        let num_neighbors = self.k.min(distances.len());
        distances.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        let neighbors = &distances[..num_neighbors];

        // 3. Votes, remembering the rank of each label's closest neighbour.
        let mut votes: HashMap<&L, (usize, usize)> = HashMap::new();
        for (rank, &(_, label)) in neighbors.iter().enumerate() {
            votes.entry(label).or_insert((0, rank)).0 += 1;
        }

        votes
            .into_iter()
            .max_by(|(_, (ca, ra)), (_, (cb, rb))| ca.cmp(cb).then_with(|| rb.cmp(ra)))
            .map(|(label, _)| label.clone())
            .ok_or(KnnError::NotFitted)
    }

    /// Predicts every row of `data`.
    pub fn predict_dataset(&self, data: &Dataset<L, F>) -> Result<Vec<L>, KnnError> {
        data.records()
            .rows()
            .into_iter()
            .map(|row| self.predict(row))
            .collect()
    }
}

impl<L, F, D> Estimator<L, F> for KnnClassifier<L, F, D>
where
    L: Label,
    F: Float,
    D: Distance<F>,
{
    type Error = KnnError;

    /// Memorises the training set.
    fn fit(&mut self, data: &Dataset<L, F>) -> Result<(), KnnError> {
        if self.k == 0 {
            return Err(KnnError::InvalidK);
        }
        if self.k > data.n_samples() {
            log::debug!(
                "k = {} exceeds the {} training samples; voting over all of them",
                self.k,
                data.n_samples()
            );
        }
        self.training_data = data.to_points();
        Ok(())
    }

    /// Classification accuracy on `data`.
    fn score(&self, data: &Dataset<L, F>) -> Result<f64, KnnError> {
        let predicted = self.predict_dataset(data)?;
        Ok(accuracy(&predicted, data.targets()))
    }
}
