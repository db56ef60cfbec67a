use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use thiserror::Error;

use crate::{DataPoint, Float, Label};

#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

/// Errors raised while building or slicing a [`Dataset`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DatasetError {
    #[error("a dataset needs at least one sample")]
    Empty,
    #[error("a dataset needs at least one feature")]
    NoFeatures,
    #[error("{what} has {actual} entries but the dataset has {expected} samples")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("sample {index} has {actual} features, expected {expected}")]
    RaggedFeatures {
        index: usize,
        expected: usize,
        actual: usize,
    },
    #[error("index {index} is out of range for {n_samples} samples")]
    IndexOutOfRange { index: usize, n_samples: usize },
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

/// An ordered collection of samples: a feature matrix, one label per row and
/// an optional group identifier per row.
///
/// Construction checks the invariants the splitters rely on: at least one
/// sample, at least one feature and parallel sequences of equal length.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
pub struct Dataset<L, F>
where
    L: Label,
    F: Float,
{
    records: Array2<F>,
    targets: Vec<L>,
    groups: Option<Vec<u64>>,
}

impl<L, F> Dataset<L, F>
where
    L: Label,
    F: Float,
{
    pub fn new(records: Array2<F>, targets: Vec<L>) -> Result<Self, DatasetError> {
        if records.nrows() == 0 {
            return Err(DatasetError::Empty);
        }
        if records.ncols() == 0 {
            return Err(DatasetError::NoFeatures);
        }
        if targets.len() != records.nrows() {
            return Err(DatasetError::LengthMismatch {
                what: "targets",
                expected: records.nrows(),
                actual: targets.len(),
            });
        }
        Ok(Self {
            records,
            targets,
            groups: None,
        })
    }

    /// Attaches a group identifier to every sample, for group-aware splitting.
    pub fn with_groups(mut self, groups: Vec<u64>) -> Result<Self, DatasetError> {
        if groups.len() != self.n_samples() {
            return Err(DatasetError::LengthMismatch {
                what: "groups",
                expected: self.n_samples(),
                actual: groups.len(),
            });
        }
        self.groups = Some(groups);
        Ok(self)
    }

    pub fn from_points(points: Vec<DataPoint<L, F>>) -> Result<Self, DatasetError> {
        let n_features = points.first().ok_or(DatasetError::Empty)?.n_features();
        let mut records = Array2::zeros((points.len(), n_features));
        let mut targets = Vec::with_capacity(points.len());
        for (i, dp) in points.into_iter().enumerate() {
            if dp.n_features() != n_features {
                return Err(DatasetError::RaggedFeatures {
                    index: i,
                    expected: n_features,
                    actual: dp.n_features(),
                });
            }
            records.row_mut(i).assign(&dp.features);
            targets.push(dp.label);
        }
        Self::new(records, targets)
    }

    pub fn n_samples(&self) -> usize {
        self.records.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.records.ncols()
    }

    pub fn records(&self) -> ArrayView2<'_, F> {
        self.records.view()
    }

    pub fn row(&self, index: usize) -> ArrayView1<'_, F> {
        self.records.row(index)
    }

    pub fn targets(&self) -> &[L] {
        &self.targets
    }

    pub fn groups(&self) -> Option<&[u64]> {
        self.groups.as_deref()
    }

    /// Distinct labels in ascending order.
    pub fn classes(&self) -> Vec<L> {
        let mut classes = self.targets.clone();
        classes.sort();
        classes.dedup();
        classes
    }

    /// Copies the given rows, in the given order, into a new dataset.
    ///
    /// Groups travel with their samples. Fails on an empty selection or on
    /// any index outside `0..n_samples`.
    pub fn select(&self, indices: &[usize]) -> Result<Self, DatasetError> {
        if indices.is_empty() {
            return Err(DatasetError::Empty);
        }
        let n_samples = self.n_samples();
        if let Some(&index) = indices.iter().find(|&&i| i >= n_samples) {
            return Err(DatasetError::IndexOutOfRange { index, n_samples });
        }
        Ok(Self {
            records: self.records.select(Axis(0), indices),
            targets: indices.iter().map(|&i| self.targets[i].clone()).collect(),
            groups: self
                .groups
                .as_ref()
                .map(|g| indices.iter().map(|&i| g[i]).collect()),
        })
    }

    pub fn to_points(&self) -> Vec<DataPoint<L, F>> {
        self.records
            .rows()
            .into_iter()
            .zip(&self.targets)
            .map(|(row, label)| DataPoint::new(row.to_owned(), label.clone()))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ArrayView1<'_, F>, &L)> {
        self.records.rows().into_iter().zip(self.targets.iter())
    }

    /// Column means, handy for centring or sanity checks on generated data.
    pub fn feature_means(&self) -> Array1<F> {
        self.records
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(self.n_features()))
    }
}
