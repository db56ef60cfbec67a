use crate::{Result, Split, invalid};

#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

/// Extra knobs for [`time_series_splits_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
pub struct TimeSeriesOptions {
    /// Keep only the most recent `max_train_size` samples for training.
    pub max_train_size: Option<usize>,
    /// Samples dropped between the end of training and the start of testing.
    pub gap: usize,
    /// Test window length; defaults to `n_samples / (k + 1)`.
    pub test_size: Option<usize>,
}

impl TimeSeriesOptions {
    pub fn with_max_train_size(mut self, max_train_size: usize) -> Self {
        self.max_train_size = Some(max_train_size);
        self
    }

    pub fn with_gap(mut self, gap: usize) -> Self {
        self.gap = gap;
        self
    }

    pub fn with_test_size(mut self, test_size: usize) -> Self {
        self.test_size = Some(test_size);
        self
    }
}

/// Forward-chaining splits for ordered data.
///
/// The samples are cut into `k + 1` nearly equal contiguous chunks; the
/// remainder of the division goes to the first chunk. Fold `i` trains on
/// everything before its test chunk, so training sets are nested and test
/// chunks are disjoint, contiguous and increasing.
///
/// With 6 samples and `k = 3`: `[0,1,2]|[3]`, `[0,1,2,3]|[4]`, `[0,1,2,3,4]|[5]`.
pub fn time_series_splits(n_samples: usize, k: usize) -> Result<Vec<Split>> {
    time_series_splits_with(n_samples, k, TimeSeriesOptions::default())
}

/// [`time_series_splits`] with a rolling window, a train/test gap or an
/// explicit test size.
pub fn time_series_splits_with(
    n_samples: usize,
    k: usize,
    options: TimeSeriesOptions,
) -> Result<Vec<Split>> {
    if k < 1 {
        return invalid(format!("time series split needs k >= 1, got {k}"));
    }
    if n_samples < k + 1 {
        return invalid(format!(
            "time series split with k = {k} needs at least {} samples, got {n_samples}",
            k + 1
        ));
    }
    let test_size = options.test_size.unwrap_or(n_samples / (k + 1));
    if test_size == 0 {
        return invalid("time series test size must be positive");
    }
    if options.max_train_size == Some(0) {
        return invalid("max_train_size must be positive");
    }
    let needed = k * test_size + options.gap;
    if needed >= n_samples {
        return invalid(format!(
            "{k} test windows of {test_size} plus a gap of {} leave no training samples out of {n_samples}",
            options.gap
        ));
    }

    let first_test_start = n_samples - k * test_size;
    Ok((0..k)
        .map(|i| {
            let test_start = first_test_start + i * test_size;
            let train_end = test_start - options.gap;
            let train_start = options
                .max_train_size
                .map_or(0, |max| train_end.saturating_sub(max));
            Split::new(
                i,
                (train_start..train_end).collect(),
                (test_start..test_start + test_size).collect(),
            )
        })
        .collect())
}
