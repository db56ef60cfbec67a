//! Cross-validation: fit and score a model on every split, then aggregate.

use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use cv_split::{Split, SplitError, SplitStrategy};
use modsel_helpers::{BoxError, Dataset, DatasetError, Estimator, Float, Label};
use ndarray::Array1;
use thiserror::Error;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

mod curves;

pub use curves::{CurvePoint, LearningPoint, learning_curve, validation_curve};

/// Which model call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fit,
    Score,
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Fit => write!(f, "fit"),
            Stage::Score => write!(f, "score"),
        }
    }
}

/// Errors that can occur while cross-validating a model.
#[derive(Debug, Error)]
pub enum CvError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error(transparent)]
    Split(#[from] SplitError),
    /// The model failed on one fold; the whole evaluation is abandoned.
    #[error("fold {fold}: model {stage} failed: {source}")]
    ModelFailure {
        fold: usize,
        stage: Stage,
        source: BoxError,
    },
    #[error("fold {fold}: fit and score did not finish within {limit:?}")]
    Timeout { fold: usize, limit: Duration },
    #[error("evaluation cancelled after {completed} completed folds")]
    Cancelled { completed: usize },
}

impl CvError {
    /// True for failures caused by the model rather than by the arguments.
    pub fn is_model_failure(&self) -> bool {
        matches!(self, CvError::ModelFailure { .. } | CvError::Timeout { .. })
    }

    /// Fold the failure happened in, when there is one.
    pub fn fold(&self) -> Option<usize> {
        match self {
            CvError::ModelFailure { fold, .. } | CvError::Timeout { fold, .. } => Some(*fold),
            _ => None,
        }
    }
}

impl From<DatasetError> for CvError {
    fn from(err: DatasetError) -> Self {
        CvError::InvalidArgument(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CvError>;

/// Shared flag for cooperative cancellation.
///
/// Checked between units of work only; a fit that is already running is
/// never interrupted.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Scores and timings of one fold.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
pub struct FoldScores {
    pub fold: usize,
    pub test_score: f64,
    pub train_score: Option<f64>,
    pub fit_time: Duration,
    pub score_time: Duration,
}

/// Aggregated outcome of cross-validating one model configuration.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
pub struct EvaluationResult {
    folds: Vec<FoldScores>,
    mean_test_score: f64,
    std_test_score: f64,
}

fn mean_std(scores: &[f64]) -> (f64, f64) {
    let scores = Array1::from(scores.to_vec());
    match scores.mean() {
        Some(mean) => (mean, scores.std(0.0)),
        None => (f64::NAN, f64::NAN),
    }
}

impl EvaluationResult {
    pub fn from_folds(folds: Vec<FoldScores>) -> Self {
        let test: Vec<f64> = folds.iter().map(|f| f.test_score).collect();
        let (mean_test_score, std_test_score) = mean_std(&test);
        Self {
            folds,
            mean_test_score,
            std_test_score,
        }
    }

    /// Builds a result from bare test scores, with zero timings.
    pub fn from_scores(scores: &[f64]) -> Self {
        Self::from_folds(
            scores
                .iter()
                .enumerate()
                .map(|(fold, &test_score)| FoldScores {
                    fold,
                    test_score,
                    train_score: None,
                    fit_time: Duration::ZERO,
                    score_time: Duration::ZERO,
                })
                .collect(),
        )
    }

    pub fn folds(&self) -> &[FoldScores] {
        &self.folds
    }

    pub fn n_splits(&self) -> usize {
        self.folds.len()
    }

    pub fn test_scores(&self) -> Vec<f64> {
        self.folds.iter().map(|f| f.test_score).collect()
    }

    /// Per-fold train scores, if they were requested.
    pub fn train_scores(&self) -> Option<Vec<f64>> {
        self.folds.iter().map(|f| f.train_score).collect()
    }

    pub fn mean_test_score(&self) -> f64 {
        self.mean_test_score
    }

    /// Population standard deviation of the test scores.
    pub fn std_test_score(&self) -> f64 {
        self.std_test_score
    }

    pub fn mean_train_score(&self) -> Option<f64> {
        self.train_scores().map(|s| mean_std(&s).0)
    }

    pub fn std_train_score(&self) -> Option<f64> {
        self.train_scores().map(|s| mean_std(&s).1)
    }

    pub fn mean_fit_time(&self) -> Duration {
        let total: Duration = self.folds.iter().map(|f| f.fit_time).sum();
        total / self.folds.len().max(1) as u32
    }
}

/// Runs fit + score over a set of splits.
///
/// Each fold gets a fresh model from the factory and only reads the dataset
/// and its split, so folds are independent of each other.
#[derive(Debug, Clone, Default)]
pub struct CrossValidator {
    return_train_score: bool,
    timeout: Option<Duration>,
    parallel: bool,
    cancel: Option<CancelToken>,
}

impl CrossValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also score each fold's model on its own training data.
    pub fn with_train_score(mut self, return_train_score: bool) -> Self {
        self.return_train_score = return_train_score;
        self
    }

    /// Upper bound on the wall time of one fold's fit and scoring.
    ///
    /// With a limit set, each fold runs on its own worker thread. A fold that
    /// overruns is reported as [`CvError::Timeout`]; its worker is left to
    /// finish in the background and its result is dropped.
    pub fn with_timeout(mut self, limit: Duration) -> Self {
        self.timeout = Some(limit);
        self
    }

    /// Evaluate folds on the rayon pool. Only effective with the `parallel`
    /// feature; results are still aggregated in fold order.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn return_train_score(&self) -> bool {
        self.return_train_score
    }

    pub fn is_parallel(&self) -> bool {
        self.parallel && cfg!(feature = "parallel")
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }

    /// Cross-validates the models produced by `model_factory` on `splits`.
    ///
    /// Any fold failure aborts the evaluation; when several folds fail the
    /// one with the lowest position is reported, whatever order they ran in.
    pub fn evaluate<L, F, M, Fac>(
        &self,
        model_factory: Fac,
        dataset: &Dataset<L, F>,
        splits: &[Split],
    ) -> Result<EvaluationResult>
    where
        L: Label,
        F: Float,
        M: Estimator<L, F> + Send + 'static,
        Fac: Fn() -> M + Sync,
    {
        check_splits(splits, dataset.n_samples())?;

        let outcomes = self.run_folds(&model_factory, dataset, splits);
        let mut folds = Vec::with_capacity(splits.len());
        for outcome in outcomes {
            match outcome {
                Some(Ok(scores)) => folds.push(scores),
                Some(Err(err)) => return Err(err),
                None => {
                    return Err(CvError::Cancelled {
                        completed: folds.len(),
                    });
                }
            }
        }

        let result = EvaluationResult::from_folds(folds);
        log::info!(
            "cross-validated {} folds: mean test score {:.4} (std {:.4})",
            result.n_splits(),
            result.mean_test_score(),
            result.std_test_score()
        );
        Ok(result)
    }

    /// Computes the splits from `strategy`, then evaluates.
    pub fn evaluate_strategy<L, F, M, Fac>(
        &self,
        model_factory: Fac,
        dataset: &Dataset<L, F>,
        strategy: &SplitStrategy,
    ) -> Result<EvaluationResult>
    where
        L: Label,
        F: Float,
        M: Estimator<L, F> + Send + 'static,
        Fac: Fn() -> M + Sync,
    {
        let splits = strategy.splits(dataset)?;
        log::debug!("{strategy}: {} splits", splits.len());
        self.evaluate(model_factory, dataset, &splits)
    }

    // `None` marks a fold skipped because of cancellation.
    fn run_folds<L, F, M, Fac>(
        &self,
        model_factory: &Fac,
        dataset: &Dataset<L, F>,
        splits: &[Split],
    ) -> Vec<Option<Result<FoldScores>>>
    where
        L: Label,
        F: Float,
        M: Estimator<L, F> + Send + 'static,
        Fac: Fn() -> M + Sync,
    {
        #[cfg(feature = "parallel")]
        if self.is_parallel() {
            return splits
                .par_iter()
                .map(|split| {
                    if self.is_cancelled() {
                        None
                    } else {
                        Some(self.run_fold(model_factory, dataset, split))
                    }
                })
                .collect();
        }

        let mut outcomes = Vec::with_capacity(splits.len());
        for split in splits {
            if self.is_cancelled() {
                outcomes.push(None);
                break;
            }
            let outcome = self.run_fold(model_factory, dataset, split);
            let failed = outcome.is_err();
            outcomes.push(Some(outcome));
            if failed {
                break;
            }
        }
        outcomes
    }

    fn run_fold<L, F, M, Fac>(
        &self,
        model_factory: &Fac,
        dataset: &Dataset<L, F>,
        split: &Split,
    ) -> Result<FoldScores>
    where
        L: Label,
        F: Float,
        M: Estimator<L, F> + Send + 'static,
        Fac: Fn() -> M + Sync,
    {
        let train = dataset.select(&split.train_indices)?;
        let test = dataset.select(&split.test_indices)?;
        let model = model_factory();
        let fold = split.fold;
        let with_train = self.return_train_score;

        let scores = match self.timeout {
            None => fit_and_score(model, &train, &test, fold, with_train),
            Some(limit) => {
                let (tx, rx) = mpsc::channel();
                thread::Builder::new()
                    .name(format!("cv-fold-{fold}"))
                    .spawn(move || {
                        // The receiver is gone once the deadline passed.
                        let _ = tx.send(fit_and_score(model, &train, &test, fold, with_train));
                    })
                    .map_err(|e| CvError::ModelFailure {
                        fold,
                        stage: Stage::Fit,
                        source: Box::new(e),
                    })?;
                match rx.recv_timeout(limit) {
                    Ok(scores) => scores,
                    Err(RecvTimeoutError::Timeout) => Err(CvError::Timeout { fold, limit }),
                    Err(RecvTimeoutError::Disconnected) => Err(CvError::ModelFailure {
                        fold,
                        stage: Stage::Fit,
                        source: "fold worker panicked".into(),
                    }),
                }
            }
        }?;

        log::debug!(
            "fold {fold}: fit {:?}, test score {:.4}{}",
            scores.fit_time,
            scores.test_score,
            scores
                .train_score
                .map(|s| format!(", train score {s:.4}"))
                .unwrap_or_default()
        );
        Ok(scores)
    }
}

fn fit_and_score<L, F, M>(
    mut model: M,
    train: &Dataset<L, F>,
    test: &Dataset<L, F>,
    fold: usize,
    with_train: bool,
) -> Result<FoldScores>
where
    L: Label,
    F: Float,
    M: Estimator<L, F>,
{
    let failure = |stage: Stage| move |e: M::Error| CvError::ModelFailure {
        fold,
        stage,
        source: Box::new(e),
    };

    let start = Instant::now();
    model.fit(train).map_err(failure(Stage::Fit))?;
    let fit_time = start.elapsed();

    let start = Instant::now();
    let test_score = model.score(test).map_err(failure(Stage::Score))?;
    let score_time = start.elapsed();

    let train_score = if with_train {
        Some(model.score(train).map_err(failure(Stage::Score))?)
    } else {
        None
    };

    Ok(FoldScores {
        fold,
        test_score,
        train_score,
        fit_time,
        score_time,
    })
}

fn check_splits(splits: &[Split], n_samples: usize) -> Result<()> {
    if splits.is_empty() {
        return Err(CvError::InvalidArgument("no splits to evaluate".to_string()));
    }
    for split in splits {
        if split.train_indices.is_empty() || split.test_indices.is_empty() {
            return Err(CvError::InvalidArgument(format!(
                "fold {} has an empty train or test side",
                split.fold
            )));
        }
        if let Some(max) = split.max_index().filter(|&m| m >= n_samples) {
            return Err(CvError::InvalidArgument(format!(
                "fold {} references sample {max} but the dataset has {n_samples}",
                split.fold
            )));
        }
    }
    Ok(())
}

/// Four-argument form: evaluate with default settings and the given
/// train-score choice.
pub fn evaluate<L, F, M, Fac>(
    model_factory: Fac,
    dataset: &Dataset<L, F>,
    splits: &[Split],
    return_train_score: bool,
) -> Result<EvaluationResult>
where
    L: Label,
    F: Float,
    M: Estimator<L, F> + Send + 'static,
    Fac: Fn() -> M + Sync,
{
    CrossValidator::new()
        .with_train_score(return_train_score)
        .evaluate(model_factory, dataset, splits)
}

/// Evaluates with default settings on the splits of `strategy`.
pub fn cross_val_score<L, F, M, Fac>(
    model_factory: Fac,
    dataset: &Dataset<L, F>,
    strategy: &SplitStrategy,
) -> Result<EvaluationResult>
where
    L: Label,
    F: Float,
    M: Estimator<L, F> + Send + 'static,
    Fac: Fn() -> M + Sync,
{
    CrossValidator::new().evaluate_strategy(model_factory, dataset, strategy)
}
