use std::fmt::{Display, Formatter};

use modsel_helpers::{Dataset, Float, Label};

#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

use crate::{
    Result, Split, SplitError, TimeSeriesOptions, group_k_fold_splits, holdout_split,
    k_fold_splits, leave_one_out_splits, repeated_k_fold_splits, shuffle_splits,
    stratified_k_fold_splits, time_series_splits_with,
};

/// A splitting strategy together with its parameters.
///
/// Lets callers hand "how to split" to the cross-validator or the search
/// driver as a value; the strategy pulls labels or groups from the dataset
/// when it needs them.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
pub enum SplitStrategy {
    Holdout { test_fraction: f64, seed: u64 },
    KFold { k: usize, shuffle: bool, seed: u64 },
    StratifiedKFold { k: usize, shuffle: bool, seed: u64 },
    GroupKFold { k: usize },
    TimeSeries { k: usize, options: TimeSeriesOptions },
    LeaveOneOut,
    ShuffleSplit { n_splits: usize, test_fraction: f64, seed: u64 },
    RepeatedKFold { k: usize, n_repeats: usize, seed: u64 },
}

impl Default for SplitStrategy {
    fn default() -> Self {
        SplitStrategy::KFold {
            k: 5,
            shuffle: false,
            seed: 0,
        }
    }
}

impl SplitStrategy {
    pub fn time_series(k: usize) -> Self {
        SplitStrategy::TimeSeries {
            k,
            options: TimeSeriesOptions::default(),
        }
    }

    /// Computes the splits for `data`.
    ///
    /// Stratified k-fold reads the dataset targets; group k-fold reads its
    /// groups and fails when the dataset carries none.
    pub fn splits<L, F>(&self, data: &Dataset<L, F>) -> Result<Vec<Split>>
    where
        L: Label,
        F: Float,
    {
        let n = data.n_samples();
        match *self {
            SplitStrategy::Holdout {
                test_fraction,
                seed,
            } => Ok(vec![holdout_split(n, test_fraction, seed)?]),
            SplitStrategy::KFold { k, shuffle, seed } => k_fold_splits(n, k, shuffle, seed),
            SplitStrategy::StratifiedKFold { k, shuffle, seed } => {
                stratified_k_fold_splits(data.targets(), k, shuffle, seed)
            }
            SplitStrategy::GroupKFold { k } => {
                let groups = data.groups().ok_or_else(|| {
                    SplitError::InvalidArgument(
                        "group k-fold needs a dataset with group identifiers".to_string(),
                    )
                })?;
                group_k_fold_splits(groups, k)
            }
            SplitStrategy::TimeSeries { k, options } => time_series_splits_with(n, k, options),
            SplitStrategy::LeaveOneOut => leave_one_out_splits(n),
            SplitStrategy::ShuffleSplit {
                n_splits,
                test_fraction,
                seed,
            } => shuffle_splits(n, n_splits, test_fraction, seed),
            SplitStrategy::RepeatedKFold { k, n_repeats, seed } => {
                repeated_k_fold_splits(n, k, n_repeats, seed)
            }
        }
    }
}

impl Display for SplitStrategy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SplitStrategy::Holdout { test_fraction, .. } => {
                write!(f, "holdout ({:.0}% test)", test_fraction * 100.0)
            }
            SplitStrategy::KFold { k, shuffle, .. } => {
                write!(f, "{k}-fold{}", if *shuffle { " (shuffled)" } else { "" })
            }
            SplitStrategy::StratifiedKFold { k, shuffle, .. } => write!(
                f,
                "stratified {k}-fold{}",
                if *shuffle { " (shuffled)" } else { "" }
            ),
            SplitStrategy::GroupKFold { k } => write!(f, "group {k}-fold"),
            SplitStrategy::TimeSeries { k, .. } => write!(f, "time series ({k} splits)"),
            SplitStrategy::LeaveOneOut => write!(f, "leave-one-out"),
            SplitStrategy::ShuffleSplit { n_splits, .. } => {
                write!(f, "shuffle split ({n_splits} splits)")
            }
            SplitStrategy::RepeatedKFold { k, n_repeats, .. } => {
                write!(f, "{k}-fold x {n_repeats}")
            }
        }
    }
}
