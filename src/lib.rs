//! Model selection for the workspace's estimators: splitters, a
//! cross-validator and a hyperparameter search driver.
//!
//! The pieces live in their own crates and are re-exported here:
//!
//! * [`cv_split`]: train/test index splitters and [`SplitStrategy`].
//! * [`cross_val`]: [`CrossValidator`] and score curves.
//! * [`param_search`]: [`SearchDriver`], [`ParameterGrid`], [`ParameterSampler`].
//! * [`k_nn`]: a k-nearest-neighbours classifier to select models for.

pub use cross_val::{
    self, CancelToken, CrossValidator, CvError, EvaluationResult, FoldScores, cross_val_score,
    evaluate, learning_curve, validation_curve,
};
pub use cv_split::{
    self, Split, SplitError, SplitStrategy, TimeSeriesOptions, group_k_fold_splits,
    holdout_split, k_fold_splits, leave_one_out_splits, repeated_k_fold_splits, shuffle_splits,
    stratified_k_fold_splits, time_series_splits, time_series_splits_with,
};
pub use k_nn::{self, KnnClassifier, KnnError};
pub use modsel_helpers::{
    self, BoxError, DataPoint, Dataset, DatasetError, Distance, Estimator, Float, L1Dist, L2Dist,
    LInfDist, Label, LpDist, MajorityClass, Metric, accuracy, datasets,
};
pub use param_search::{
    self, Distribution, ParamValue, ParameterConfiguration, ParameterGrid, ParameterSampler,
    ParameterSpace, SearchConfig, SearchDriver, SearchError, SearchOutcome, grid_search,
    randomized_search,
};
