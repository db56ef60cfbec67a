use std::collections::HashMap;
use std::error::Error as StdError;

use thiserror::Error;

use crate::{Dataset, Float, Label};

/// Type-erased estimator error, as carried across the harness boundary.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// The capability set the model-selection harness needs from a model.
///
/// `fit` trains in place on the given samples; `score` evaluates the trained
/// model on another set of samples, higher being better (accuracy for
/// classifiers, R² for regressors, ...).
pub trait Estimator<L, F>
where
    L: Label,
    F: Float,
{
    type Error: StdError + Send + Sync + 'static;

    fn fit(&mut self, data: &Dataset<L, F>) -> Result<(), Self::Error>;

    fn score(&self, data: &Dataset<L, F>) -> Result<f64, Self::Error>;
}

/// Fraction of positions where `predicted` and `actual` agree.
///
/// Returns 0.0 for empty input; only the common prefix is compared when the
/// lengths differ.
pub fn accuracy<L: PartialEq>(predicted: &[L], actual: &[L]) -> f64 {
    let n = predicted.len().min(actual.len());
    if n == 0 {
        return 0.0;
    }
    let hits = predicted
        .iter()
        .zip(actual)
        .filter(|(p, a)| p == a)
        .count();
    hits as f64 / n as f64
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BaselineError {
    #[error("the baseline has not been fitted")]
    NotFitted,
}

/// Predicts the most frequent training label for every sample.
///
/// Ties between equally frequent labels go to the smallest label. Useful as
/// the score floor any real model should beat.
#[derive(Debug, Clone)]
pub struct MajorityClass<L: Label> {
    majority: Option<L>,
}

impl<L: Label> Default for MajorityClass<L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: Label> MajorityClass<L> {
    pub fn new() -> Self {
        Self { majority: None }
    }

    pub fn majority(&self) -> Option<&L> {
        self.majority.as_ref()
    }
}

impl<L, F> Estimator<L, F> for MajorityClass<L>
where
    L: Label,
    F: Float,
{
    type Error = BaselineError;

    fn fit(&mut self, data: &Dataset<L, F>) -> Result<(), BaselineError> {
        let mut votes: HashMap<&L, usize> = HashMap::new();
        for label in data.targets() {
            *votes.entry(label).or_insert(0) += 1;
        }
        self.majority = votes
            .into_iter()
            .max_by(|(la, ca), (lb, cb)| ca.cmp(cb).then_with(|| lb.cmp(la)))
            .map(|(label, _)| label.clone());
        Ok(())
    }

    fn score(&self, data: &Dataset<L, F>) -> Result<f64, BaselineError> {
        let majority = self.majority.as_ref().ok_or(BaselineError::NotFitted)?;
        let hits = data.targets().iter().filter(|&l| l == majority).count();
        Ok(hits as f64 / data.n_samples() as f64)
    }
}
