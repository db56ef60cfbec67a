use std::fmt::{Display, Formatter};
use std::str::FromStr;

use ndarray::{ArrayView1, Zip};
use thiserror::Error;

use crate::Float;

#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

/// A distance metric between two feature vectors.
///
/// `rdistance` is a cheaper, order-preserving stand-in for `distance` (for
/// L2 it skips the square root). Neighbour searches only compare distances,
/// so they should use `rdistance`.
pub trait Distance<F: Float>: Clone + Send + Sync + Unpin {
    fn distance(&self, a: ArrayView1<F>, b: ArrayView1<F>) -> F;

    fn rdistance(&self, a: ArrayView1<F>, b: ArrayView1<F>) -> F {
        self.distance(a, b)
    }

    fn rdist_to_dist(&self, rdist: F) -> F {
        rdist
    }

    fn dist_to_rdist(&self, dist: F) -> F {
        dist
    }
}

/// Manhattan distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
pub struct L1Dist;

impl<F: Float> Distance<F> for L1Dist {
    fn distance(&self, a: ArrayView1<F>, b: ArrayView1<F>) -> F {
        Zip::from(&a)
            .and(&b)
            .fold(F::zero(), |acc, &x, &y| acc + (x - y).abs())
    }
}

/// Euclidean distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
pub struct L2Dist;

impl<F: Float> Distance<F> for L2Dist {
    fn distance(&self, a: ArrayView1<F>, b: ArrayView1<F>) -> F {
        self.rdistance(a, b).sqrt()
    }

    fn rdistance(&self, a: ArrayView1<F>, b: ArrayView1<F>) -> F {
        Zip::from(&a).and(&b).fold(F::zero(), |acc, &x, &y| {
            let d = x - y;
            acc + d * d
        })
    }

    fn rdist_to_dist(&self, rdist: F) -> F {
        rdist.sqrt()
    }

    fn dist_to_rdist(&self, dist: F) -> F {
        dist * dist
    }
}

/// Chebyshev distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
pub struct LInfDist;

impl<F: Float> Distance<F> for LInfDist {
    fn distance(&self, a: ArrayView1<F>, b: ArrayView1<F>) -> F {
        Zip::from(&a)
            .and(&b)
            .fold(F::zero(), |acc, &x, &y| acc.max((x - y).abs()))
    }
}

/// Minkowski distance of order `p`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
pub struct LpDist<F: Float>(pub F);

impl<F: Float> Distance<F> for LpDist<F> {
    fn distance(&self, a: ArrayView1<F>, b: ArrayView1<F>) -> F {
        self.rdistance(a, b).powf(F::one() / self.0)
    }

    fn rdistance(&self, a: ArrayView1<F>, b: ArrayView1<F>) -> F {
        Zip::from(&a)
            .and(&b)
            .fold(F::zero(), |acc, &x, &y| acc + (x - y).abs().powf(self.0))
    }

    fn rdist_to_dist(&self, rdist: F) -> F {
        rdist.powf(F::one() / self.0)
    }

    fn dist_to_rdist(&self, dist: F) -> F {
        dist.powf(self.0)
    }
}

/// A metric picked at run time, e.g. from a search parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
pub enum Metric {
    L1,
    #[default]
    L2,
    LInf,
    /// Minkowski distance of integer order `p >= 3`.
    Lp(u32),
}

impl Metric {
    fn minkowski<F: Float>(p: u32) -> LpDist<F> {
        // Every u32 converts for f32 and f64.
        LpDist(F::from_u32(p).unwrap_or_else(F::infinity))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown metric `{0}`, expected l1, l2, linf or lp with integer p >= 3")]
pub struct UnknownMetric(pub String);

impl FromStr for Metric {
    type Err = UnknownMetric;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "l1" | "manhattan" => Ok(Metric::L1),
            "l2" | "euclidean" => Ok(Metric::L2),
            "linf" | "chebyshev" => Ok(Metric::LInf),
            name => match name.strip_prefix('l').and_then(|p| p.parse::<u32>().ok()) {
                Some(p) if p >= 3 => Ok(Metric::Lp(p)),
                _ => Err(UnknownMetric(s.to_string())),
            },
        }
    }
}

impl Display for Metric {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Metric::L1 => write!(f, "l1"),
            Metric::L2 => write!(f, "l2"),
            Metric::LInf => write!(f, "linf"),
            Metric::Lp(p) => write!(f, "l{p}"),
        }
    }
}

impl<F: Float> Distance<F> for Metric {
    fn distance(&self, a: ArrayView1<F>, b: ArrayView1<F>) -> F {
        match self {
            Metric::L1 => L1Dist.distance(a, b),
            Metric::L2 => L2Dist.distance(a, b),
            Metric::LInf => LInfDist.distance(a, b),
            Metric::Lp(p) => Self::minkowski(*p).distance(a, b),
        }
    }

    fn rdistance(&self, a: ArrayView1<F>, b: ArrayView1<F>) -> F {
        match self {
            Metric::L1 => L1Dist.rdistance(a, b),
            Metric::L2 => L2Dist.rdistance(a, b),
            Metric::LInf => LInfDist.rdistance(a, b),
            Metric::Lp(p) => Self::minkowski(*p).rdistance(a, b),
        }
    }

    fn rdist_to_dist(&self, rdist: F) -> F {
        match self {
            Metric::L2 => L2Dist.rdist_to_dist(rdist),
            Metric::Lp(p) => Self::minkowski(*p).rdist_to_dist(rdist),
            Metric::L1 | Metric::LInf => rdist,
        }
    }

    fn dist_to_rdist(&self, dist: F) -> F {
        match self {
            Metric::L2 => L2Dist.dist_to_rdist(dist),
            Metric::Lp(p) => Self::minkowski(*p).dist_to_rdist(dist),
            Metric::L1 | Metric::LInf => dist,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_metrics_on_3_4_5_triangle() {
        let a = array![0.0, 0.0];
        let b = array![3.0, 4.0];
        assert_abs_diff_eq!(L1Dist.distance(a.view(), b.view()), 7.0);
        assert_abs_diff_eq!(L2Dist.distance(a.view(), b.view()), 5.0);
        assert_abs_diff_eq!(L2Dist.rdistance(a.view(), b.view()), 25.0);
        assert_abs_diff_eq!(LInfDist.distance(a.view(), b.view()), 4.0);
        assert_abs_diff_eq!(LpDist(2.0).distance(a.view(), b.view()), 5.0, epsilon = 1e-12);
    }

    #[test]
    fn test_rdist_conversion_roundtrip() {
        let d = 3.0_f64;
        assert_abs_diff_eq!(L2Dist.rdist_to_dist(L2Dist.dist_to_rdist(d)), d);
        let lp = LpDist(3.0_f64);
        assert_abs_diff_eq!(lp.rdist_to_dist(lp.dist_to_rdist(d)), d, epsilon = 1e-12);
    }

    #[test]
    fn test_metric_by_name() {
        let a = array![0.0, 0.0];
        let b = array![3.0, 4.0];
        let metric: Metric = "L1".parse().unwrap();
        assert_abs_diff_eq!(metric.distance(a.view(), b.view()), 7.0);
        assert_abs_diff_eq!(Metric::L2.rdistance(a.view(), b.view()), 25.0);
        assert_eq!("chebyshev".parse::<Metric>(), Ok(Metric::LInf));
        assert_eq!(Metric::LInf.to_string(), "linf");
        assert!("cosine".parse::<Metric>().is_err());
    }

    #[test]
    fn test_minkowski_metric_by_name() {
        let a = array![0.0, 0.0];
        let b = array![3.0, 4.0];
        let metric: Metric = "l3".parse().unwrap();
        assert_eq!(metric, Metric::Lp(3));
        assert_eq!(metric.to_string(), "l3");
        assert_abs_diff_eq!(metric.rdistance(a.view(), b.view()), 91.0, epsilon = 1e-9);
        assert_abs_diff_eq!(
            metric.distance(a.view(), b.view()),
            91.0_f64.cbrt(),
            epsilon = 1e-12
        );
        assert_eq!("l2".parse::<Metric>(), Ok(Metric::L2));
        assert!("l0".parse::<Metric>().is_err());
        assert!("lx".parse::<Metric>().is_err());
    }
}
