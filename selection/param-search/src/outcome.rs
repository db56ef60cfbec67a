use std::cmp::Ordering;
use std::fmt::Write;

use cross_val::EvaluationResult;

#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

use crate::ParameterConfiguration;

/// A candidate that was cross-validated successfully.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
pub struct CandidateResult {
    /// 1-based competition rank; exact ties on mean and std share a rank.
    pub rank: usize,
    /// Position of the candidate in the space's evaluation order.
    pub index: usize,
    pub config: ParameterConfiguration,
    pub result: EvaluationResult,
}

impl CandidateResult {
    pub fn mean_test_score(&self) -> f64 {
        self.result.mean_test_score()
    }

    pub fn std_test_score(&self) -> f64 {
        self.result.std_test_score()
    }
}

/// A candidate whose binding or evaluation failed.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
pub struct FailedCandidate {
    pub index: usize,
    pub config: ParameterConfiguration,
    /// Fold the failure happened in; `None` when the model could not be built.
    pub fold: Option<usize>,
    pub reason: String,
}

/// Orders scored candidates and assigns competition ranks.
///
/// Descending mean, then ascending std, then evaluation order. NaN means
/// and stds sort after every number whatever their sign bit. Only exact
/// equality on both mean and std shares a rank.
pub(crate) fn rank(
    mut scored: Vec<(usize, ParameterConfiguration, EvaluationResult)>,
) -> Vec<CandidateResult> {
    scored.sort_by(|(ia, _, a), (ib, _, b)| {
        let (mean_a, mean_b) = (a.mean_test_score(), b.mean_test_score());
        nan_last(mean_a, mean_b, mean_b.total_cmp(&mean_a))
            .then_with(|| {
                let (std_a, std_b) = (a.std_test_score(), b.std_test_score());
                nan_last(std_a, std_b, std_a.total_cmp(&std_b))
            })
            .then_with(|| ia.cmp(ib))
    });

    let mut ranked: Vec<CandidateResult> = Vec::with_capacity(scored.len());
    for (position, (index, config, result)) in scored.into_iter().enumerate() {
        let rank = match ranked.last() {
            Some(prev)
                if prev.mean_test_score() == result.mean_test_score()
                    && prev.std_test_score() == result.std_test_score() =>
            {
                prev.rank
            }
            _ => position + 1,
        };
        ranked.push(CandidateResult {
            rank,
            index,
            config,
            result,
        });
    }
    ranked
}

// Puts NaN after every number, deferring to `numeric` when neither is NaN.
fn nan_last(a: f64, b: f64, numeric: Ordering) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (false, false) => numeric,
        (nan_a, nan_b) => nan_a.cmp(&nan_b),
    }
}

/// Everything a search produced.
#[derive(Debug, Clone)]
pub struct SearchOutcome<M> {
    pub(crate) ranked: Vec<CandidateResult>,
    pub(crate) failed: Vec<FailedCandidate>,
    pub(crate) best_estimator: Option<M>,
}

impl<M> SearchOutcome<M> {
    /// The rank-1 candidate that came first in evaluation order.
    pub fn best(&self) -> &CandidateResult {
        // A search with no scored candidate returns an error instead.
        &self.ranked[0]
    }

    pub fn best_config(&self) -> &ParameterConfiguration {
        &self.best().config
    }

    pub fn best_score(&self) -> f64 {
        self.best().mean_test_score()
    }

    /// Successful candidates, best first.
    pub fn ranked(&self) -> &[CandidateResult] {
        &self.ranked
    }

    pub fn failed(&self) -> &[FailedCandidate] {
        &self.failed
    }

    /// Candidates sharing `rank`, in evaluation order.
    pub fn at_rank(&self, rank: usize) -> impl Iterator<Item = &CandidateResult> {
        self.ranked.iter().filter(move |c| c.rank == rank)
    }

    /// The best configuration refitted on the whole dataset, when refit was on.
    pub fn best_estimator(&self) -> Option<&M> {
        self.best_estimator.as_ref()
    }

    pub fn into_best_estimator(self) -> Option<M> {
        self.best_estimator
    }

    /// Renders ranks `1..=n_top`, listing every candidate that holds each rank.
    ///
    /// ```text
    /// Model with rank: 1
    /// Mean validation score: 0.973 (std: 0.025)
    /// Parameters: {k: 3, metric: l2}
    /// ```
    pub fn report(&self, n_top: usize) -> String {
        let mut out = String::new();
        for rank in 1..=n_top {
            for candidate in self.at_rank(rank) {
                // Writing into a String cannot fail.
                let _ = writeln!(out, "Model with rank: {rank}");
                let _ = writeln!(
                    out,
                    "Mean validation score: {:.3} (std: {:.3})",
                    candidate.mean_test_score(),
                    candidate.std_test_score()
                );
                let _ = writeln!(out, "Parameters: {}", candidate.config);
                out.push('\n');
            }
        }
        out
    }
}
