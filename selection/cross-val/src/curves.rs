//! Train/test score curves for diagnosing under- and over-fitting.

use cv_split::Split;
use modsel_helpers::{Dataset, Estimator, Float, Label};
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::{CrossValidator, CvError, EvaluationResult, Result};

/// Scores for one value of the swept parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct CurvePoint<T> {
    pub value: T,
    pub result: EvaluationResult,
}

impl<T> CurvePoint<T> {
    /// Mean train score minus mean test score. A large gap points at
    /// over-fitting, two low scores at under-fitting.
    pub fn generalization_gap(&self) -> Option<f64> {
        self.result
            .mean_train_score()
            .map(|train| train - self.result.mean_test_score())
    }
}

/// Cross-validates one model per parameter value, always with train scores.
pub fn validation_curve<L, F, M, T, B>(
    template: B,
    values: &[T],
    dataset: &Dataset<L, F>,
    splits: &[Split],
) -> Result<Vec<CurvePoint<T>>>
where
    L: Label,
    F: Float,
    M: Estimator<L, F> + Send + 'static,
    T: Clone + Sync + std::fmt::Debug,
    B: Fn(&T) -> M + Sync,
{
    if values.is_empty() {
        return Err(CvError::InvalidArgument(
            "validation curve needs at least one parameter value".to_string(),
        ));
    }
    let validator = CrossValidator::new().with_train_score(true);
    values
        .iter()
        .map(|value| {
            log::debug!("validation curve at {value:?}");
            let result = validator.evaluate(|| template(value), dataset, splits)?;
            Ok(CurvePoint {
                value: value.clone(),
                result,
            })
        })
        .collect()
}

/// Scores for one training-set fraction.
#[derive(Debug, Clone, PartialEq)]
pub struct LearningPoint {
    pub train_fraction: f64,
    /// Number of training samples actually used, per fold.
    pub train_sizes: Vec<usize>,
    pub result: EvaluationResult,
}

/// Cross-validates on growing subsets of each fold's training indices.
///
/// Each fold keeps its full test set and trains on the first
/// `ceil(fraction * n_train)` of its training indices (at least one). With a
/// seed, the training indices of fold `i` are first permuted with
/// `seed + i`, which matters for datasets stored class by class.
pub fn learning_curve<L, F, M, Fac>(
    model_factory: Fac,
    dataset: &Dataset<L, F>,
    splits: &[Split],
    train_fractions: &[f64],
    shuffle_seed: Option<u64>,
) -> Result<Vec<LearningPoint>>
where
    L: Label,
    F: Float,
    M: Estimator<L, F> + Send + 'static,
    Fac: Fn() -> M + Sync,
{
    if train_fractions.is_empty() {
        return Err(CvError::InvalidArgument(
            "learning curve needs at least one train fraction".to_string(),
        ));
    }
    if let Some(bad) = train_fractions.iter().find(|&&f| !(f > 0.0 && f <= 1.0)) {
        return Err(CvError::InvalidArgument(format!(
            "train fractions must lie in (0, 1], got {bad}"
        )));
    }

    let ordered: Vec<Vec<usize>> = splits
        .iter()
        .map(|split| {
            let mut train = split.train_indices.clone();
            if let Some(seed) = shuffle_seed {
                let mut rng =
                    Xoshiro256PlusPlus::seed_from_u64(seed.wrapping_add(split.fold as u64));
                train.shuffle(&mut rng);
            }
            train
        })
        .collect();

    let validator = CrossValidator::new().with_train_score(true);
    train_fractions
        .iter()
        .map(|&fraction| {
            let truncated: Vec<Split> = splits
                .iter()
                .zip(&ordered)
                .map(|(split, train)| {
                    let n = ((train.len() as f64 * fraction).ceil() as usize)
                        .clamp(1, train.len().max(1));
                    Split::new(
                        split.fold,
                        train[..n.min(train.len())].to_vec(),
                        split.test_indices.clone(),
                    )
                })
                .collect();
            let train_sizes = truncated.iter().map(Split::n_train).collect();
            let result = validator.evaluate(&model_factory, dataset, &truncated)?;
            Ok(LearningPoint {
                train_fraction: fraction,
                train_sizes,
                result,
            })
        })
        .collect()
}
