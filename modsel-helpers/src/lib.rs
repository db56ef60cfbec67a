use ndarray::{NdFloat, ScalarOperand};

use num_traits::{AsPrimitive, FromPrimitive};
use rand::distr::uniform::SampleUniform;

use std::fmt::Debug;
use std::hash::Hash;
use std::iter::Sum;
use std::ops::{AddAssign, DivAssign, MulAssign, SubAssign};

// Include submodules
mod common;
mod dataset;
pub mod datasets;
mod distance;
mod estimator;

// Re-export types from submodules
pub use common::DataPoint;
pub use dataset::{Dataset, DatasetError};
pub use distance::{Distance, L1Dist, L2Dist, LInfDist, LpDist, Metric, UnknownMetric};
pub use estimator::{accuracy, BaselineError, BoxError, Estimator, MajorityClass};

/// Feature scalar type, implemented for `f32` and `f64`.
pub trait Float:
    NdFloat
    + FromPrimitive
    + Default
    + Sum
    + AsPrimitive<usize>
    + for<'a> AddAssign<&'a Self>
    + for<'a> MulAssign<&'a Self>
    + for<'a> SubAssign<&'a Self>
    + for<'a> DivAssign<&'a Self>
    + num_traits::MulAdd<Output = Self>
    + SampleUniform
    + ScalarOperand
    + std::marker::Unpin
{
}

impl Float for f32 {}

impl Float for f64 {}

/// Class labels the splitters and estimators can work with.
///
/// Ordering is required so that class iteration (stratification, majority
/// ties, group assignment) is deterministic instead of depending on hash order.
pub trait Label: Clone + Eq + Hash + Debug + Ord + Send + Sync + 'static {}

impl<T> Label for T where T: Clone + Eq + Hash + Debug + Ord + Send + Sync + 'static {}
