//! Hyperparameter search over grids and random samples, ranked by
//! cross-validated score.

use std::time::Duration;

use cross_val::{CancelToken, CrossValidator, CvError, EvaluationResult};
use cv_split::{Split, SplitError, SplitStrategy};
use modsel_helpers::{BoxError, Dataset, Estimator, Float, Label};
use thiserror::Error;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

mod outcome;
mod params;
mod space;

pub use outcome::{CandidateResult, FailedCandidate, SearchOutcome};
pub use params::{ParamError, ParamValue, ParameterConfiguration};
pub use space::{Distribution, ParameterGrid, ParameterSampler, ParameterSpace};

/// Errors that end a search.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error(transparent)]
    Split(#[from] SplitError),
    #[error(transparent)]
    Cv(#[from] CvError),
    /// Every candidate failed; the failures are kept for diagnosis.
    #[error("all {} candidates failed", .0.len())]
    AllCandidatesFailed(Vec<FailedCandidate>),
    #[error("search cancelled after {evaluated} evaluated candidates")]
    Cancelled { evaluated: usize },
    #[error("refitting the best configuration {config} failed: {source}")]
    Refit { config: String, source: BoxError },
}

pub type Result<T> = std::result::Result<T, SearchError>;

/// Knobs shared by every candidate evaluation of a search.
#[derive(Debug, Clone)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
pub struct SearchConfig {
    pub return_train_score: bool,
    /// Fit the best configuration once more on the whole dataset.
    pub refit: bool,
    /// Per-fold limit, see [`CrossValidator::with_timeout`].
    pub timeout: Option<Duration>,
    /// Evaluate candidates on the rayon pool (`parallel` feature only).
    pub parallel: bool,
    #[cfg_attr(feature = "serde", serde(skip))]
    pub cancel: Option<CancelToken>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            return_train_score: false,
            refit: true,
            timeout: None,
            parallel: false,
            cancel: None,
        }
    }
}

impl SearchConfig {
    pub fn with_train_score(mut self, return_train_score: bool) -> Self {
        self.return_train_score = return_train_score;
        self
    }

    pub fn with_refit(mut self, refit: bool) -> Self {
        self.refit = refit;
        self
    }

    pub fn with_timeout(mut self, limit: Duration) -> Self {
        self.timeout = Some(limit);
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }
}

// Why one candidate produced no score.
enum CandidateFailure {
    Bind(BoxError),
    Cv(CvError),
}

/// Evaluates every candidate of a parameter space and ranks them.
///
/// A template binds each [`ParameterConfiguration`] to a model prototype;
/// every fold of that candidate then trains a fresh clone of the prototype.
#[derive(Debug, Clone, Default)]
pub struct SearchDriver {
    config: SearchConfig,
}

impl SearchDriver {
    pub fn new(config: SearchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Computes the splits once from `strategy`, then searches.
    pub fn search<L, F, M, T, S>(
        &self,
        template: T,
        space: &S,
        dataset: &Dataset<L, F>,
        strategy: &SplitStrategy,
    ) -> Result<SearchOutcome<M>>
    where
        L: Label,
        F: Float,
        M: Estimator<L, F> + Clone + Send + Sync + 'static,
        T: Fn(&ParameterConfiguration) -> std::result::Result<M, BoxError> + Sync,
        S: ParameterSpace + ?Sized,
    {
        let splits = strategy.splits(dataset)?;
        log::debug!("searching with {strategy}: {} splits", splits.len());
        self.search_with_splits(template, space, dataset, &splits)
    }

    /// Searches with precomputed splits; every candidate sees the same folds.
    pub fn search_with_splits<L, F, M, T, S>(
        &self,
        template: T,
        space: &S,
        dataset: &Dataset<L, F>,
        splits: &[Split],
    ) -> Result<SearchOutcome<M>>
    where
        L: Label,
        F: Float,
        M: Estimator<L, F> + Clone + Send + Sync + 'static,
        T: Fn(&ParameterConfiguration) -> std::result::Result<M, BoxError> + Sync,
        S: ParameterSpace + ?Sized,
    {
        let candidates = space.candidates()?;
        if candidates.is_empty() {
            return Err(SearchError::InvalidArgument(
                "the parameter space produced no candidates".to_string(),
            ));
        }
        log::info!("evaluating {} candidates", candidates.len());

        let mut validator = CrossValidator::new().with_train_score(self.config.return_train_score);
        if let Some(limit) = self.config.timeout {
            validator = validator.with_timeout(limit);
        }
        if let Some(token) = &self.config.cancel {
            validator = validator.with_cancel_token(token.clone());
        }

        let outcomes = self.run_candidates(&template, &candidates, dataset, splits, &validator);

        let mut scored = Vec::with_capacity(candidates.len());
        let mut failed = Vec::new();
        for (index, (config, outcome)) in candidates.into_iter().zip(outcomes).enumerate() {
            let (fold, reason) = match outcome {
                None => return Err(SearchError::Cancelled { evaluated: index }),
                Some(Ok(result)) => {
                    log::debug!(
                        "candidate {index} {config}: mean {:.4} (std {:.4})",
                        result.mean_test_score(),
                        result.std_test_score()
                    );
                    scored.push((index, config, result));
                    continue;
                }
                Some(Err(CandidateFailure::Bind(err))) => (None, err.to_string()),
                Some(Err(CandidateFailure::Cv(CvError::Cancelled { .. }))) => {
                    return Err(SearchError::Cancelled { evaluated: index });
                }
                Some(Err(CandidateFailure::Cv(err))) if err.is_model_failure() => {
                    (err.fold(), err.to_string())
                }
                Some(Err(CandidateFailure::Cv(err))) => return Err(err.into()),
            };
            log::warn!("candidate {index} {config} failed: {reason}");
            failed.push(FailedCandidate {
                index,
                config,
                fold,
                reason,
            });
        }

        if scored.is_empty() {
            return Err(SearchError::AllCandidatesFailed(failed));
        }
        let ranked = outcome::rank(scored);
        let best = &ranked[0];
        log::info!(
            "best of {} candidates: {} with mean score {:.4} ({} failed)",
            ranked.len() + failed.len(),
            best.config,
            best.mean_test_score(),
            failed.len()
        );

        let best_estimator = if self.config.refit {
            Some(refit(&template, &best.config, dataset)?)
        } else {
            None
        };

        Ok(SearchOutcome {
            ranked,
            failed,
            best_estimator,
        })
    }

    // `None` marks a candidate skipped because of cancellation.
    fn run_candidates<L, F, M, T>(
        &self,
        template: &T,
        candidates: &[ParameterConfiguration],
        dataset: &Dataset<L, F>,
        splits: &[Split],
        validator: &CrossValidator,
    ) -> Vec<Option<std::result::Result<EvaluationResult, CandidateFailure>>>
    where
        L: Label,
        F: Float,
        M: Estimator<L, F> + Clone + Send + Sync + 'static,
        T: Fn(&ParameterConfiguration) -> std::result::Result<M, BoxError> + Sync,
    {
        let evaluate = |config: &ParameterConfiguration| {
            if self.config.is_cancelled() {
                return None;
            }
            let prototype = match template(config) {
                Ok(model) => model,
                Err(err) => return Some(Err(CandidateFailure::Bind(err))),
            };
            Some(
                validator
                    .evaluate(|| prototype.clone(), dataset, splits)
                    .map_err(CandidateFailure::Cv),
            )
        };

        #[cfg(feature = "parallel")]
        if self.config.parallel {
            return candidates.par_iter().map(evaluate).collect();
        }

        let mut outcomes = Vec::with_capacity(candidates.len());
        for config in candidates {
            let outcome = evaluate(config);
            let stop = outcome.is_none();
            outcomes.push(outcome);
            if stop {
                break;
            }
        }
        outcomes
    }
}

fn refit<L, F, M, T>(
    template: &T,
    config: &ParameterConfiguration,
    dataset: &Dataset<L, F>,
) -> Result<M>
where
    L: Label,
    F: Float,
    M: Estimator<L, F>,
    T: Fn(&ParameterConfiguration) -> std::result::Result<M, BoxError>,
{
    let failure = |source: BoxError| SearchError::Refit {
        config: config.to_string(),
        source,
    };
    let mut model = template(config).map_err(failure)?;
    model.fit(dataset).map_err(|e| failure(e.into()))?;
    log::debug!("refitted {config} on {} samples", dataset.n_samples());
    Ok(model)
}

/// Exhaustive search over `grid` with the default [`SearchConfig`].
pub fn grid_search<L, F, M, T>(
    template: T,
    grid: &ParameterGrid,
    dataset: &Dataset<L, F>,
    strategy: &SplitStrategy,
) -> Result<SearchOutcome<M>>
where
    L: Label,
    F: Float,
    M: Estimator<L, F> + Clone + Send + Sync + 'static,
    T: Fn(&ParameterConfiguration) -> std::result::Result<M, BoxError> + Sync,
{
    SearchDriver::default().search(template, grid, dataset, strategy)
}

/// Randomized search over `sampler` with the default [`SearchConfig`].
pub fn randomized_search<L, F, M, T>(
    template: T,
    sampler: &ParameterSampler,
    dataset: &Dataset<L, F>,
    strategy: &SplitStrategy,
) -> Result<SearchOutcome<M>>
where
    L: Label,
    F: Float,
    M: Estimator<L, F> + Clone + Send + Sync + 'static,
    T: Fn(&ParameterConfiguration) -> std::result::Result<M, BoxError> + Sync,
{
    SearchDriver::default().search(template, sampler, dataset, strategy)
}

#[cfg(test)]
mod tests;
