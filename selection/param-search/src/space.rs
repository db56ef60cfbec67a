//! Parameter spaces: exhaustive grids and seeded random samplers.

use std::collections::HashSet;

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

use crate::{ParamValue, ParameterConfiguration, Result, SearchError};

/// Upper bound on draws per requested candidate when de-duplicating a
/// sampler with continuous parameters.
const MAX_DRAWS_PER_CANDIDATE: usize = 100;

/// A source of candidate configurations for the search driver.
pub trait ParameterSpace {
    /// All candidates, in evaluation order.
    fn candidates(&self) -> Result<Vec<ParameterConfiguration>>;
}

fn invalid<T>(msg: impl Into<String>) -> Result<T> {
    Err(SearchError::InvalidArgument(msg.into()))
}

fn check_unique_names<'a>(names: impl Iterator<Item = &'a str>) -> Result<()> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return invalid(format!("parameter `{name}` is declared twice"));
        }
    }
    Ok(())
}

/// Exhaustive Cartesian product of per-parameter value lists.
///
/// Candidates come out in lexicographic order over the insertion order of
/// the parameters: the first parameter varies slowest, the last fastest.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParameterGrid {
    params: Vec<(String, Vec<ParamValue>)>,
}

impl ParameterGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<V: Into<ParamValue>>(
        mut self,
        name: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.params
            .push((name.into(), values.into_iter().map(Into::into).collect()));
        self
    }

    /// Number of candidates, without enumerating them.
    pub fn len(&self) -> usize {
        self.params.iter().map(|(_, values)| values.len()).product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ParameterSpace for ParameterGrid {
    fn candidates(&self) -> Result<Vec<ParameterConfiguration>> {
        check_unique_names(self.params.iter().map(|(name, _)| name.as_str()))?;
        if let Some((name, _)) = self.params.iter().find(|(_, values)| values.is_empty()) {
            return invalid(format!("parameter `{name}` has no values"));
        }

        let total = self.len();
        let mut candidates = Vec::with_capacity(total);
        // Mixed-radix counter; the last digit moves fastest.
        let mut digits = vec![0usize; self.params.len()];
        for _ in 0..total {
            candidates.push(
                self.params
                    .iter()
                    .zip(&digits)
                    .map(|((name, values), &d)| (name.clone(), values[d].clone()))
                    .collect(),
            );
            for (digit, (_, values)) in digits.iter_mut().zip(&self.params).rev() {
                *digit += 1;
                if *digit < values.len() {
                    break;
                }
                *digit = 0;
            }
        }
        log::debug!("parameter grid expanded to {total} candidates");
        Ok(candidates)
    }
}

/// How one parameter of a [`ParameterSampler`] is drawn.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
pub enum Distribution {
    /// Uniform over a finite list of values.
    Choice(Vec<ParamValue>),
    /// Uniform float in `[low, high)`.
    Uniform { low: f64, high: f64 },
    /// Float whose logarithm is uniform in `[ln low, ln high)`.
    LogUniform { low: f64, high: f64 },
    /// Uniform integer in `[low, high)`.
    IntUniform { low: i64, high: i64 },
}

impl Distribution {
    pub fn choice<V: Into<ParamValue>>(values: impl IntoIterator<Item = V>) -> Self {
        Distribution::Choice(values.into_iter().map(Into::into).collect())
    }

    fn validate(&self, name: &str) -> Result<()> {
        match *self {
            Distribution::Choice(ref values) if values.is_empty() => {
                invalid(format!("parameter `{name}` has no choices"))
            }
            Distribution::Uniform { low, high } | Distribution::LogUniform { low, high }
                if !(low.is_finite() && high.is_finite() && low < high) =>
            {
                invalid(format!(
                    "parameter `{name}` needs finite bounds with low < high, got [{low}, {high})"
                ))
            }
            Distribution::LogUniform { low, .. } if low <= 0.0 => {
                invalid(format!("log-uniform parameter `{name}` needs low > 0, got {low}"))
            }
            Distribution::IntUniform { low, high } if low >= high => {
                invalid(format!("parameter `{name}` needs low < high, got [{low}, {high})"))
            }
            _ => Ok(()),
        }
    }

    /// Number of distinct values, or `None` for continuous distributions.
    fn cardinality(&self) -> Option<usize> {
        match self {
            Distribution::Choice(values) => Some(values.len()),
            Distribution::IntUniform { low, high } => usize::try_from(high.abs_diff(*low)).ok(),
            Distribution::Uniform { .. } | Distribution::LogUniform { .. } => None,
        }
    }

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> ParamValue {
        match self {
            Distribution::Choice(values) => values[rng.random_range(0..values.len())].clone(),
            Distribution::Uniform { low, high } => ParamValue::Float(rng.random_range(*low..*high)),
            Distribution::LogUniform { low, high } => {
                ParamValue::Float(rng.random_range(low.ln()..high.ln()).exp())
            }
            Distribution::IntUniform { low, high } => {
                ParamValue::Int(rng.random_range(*low..*high))
            }
        }
    }
}

/// Draws `n_iter` configurations from per-parameter distributions.
///
/// The generator is seeded once per [`candidates`](ParameterSpace::candidates)
/// call, so the same sampler always yields the same sequence. Repeated
/// configurations are kept unless de-duplication is switched on.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSampler {
    params: Vec<(String, Distribution)>,
    n_iter: usize,
    seed: u64,
    deduplicate: bool,
}

impl ParameterSampler {
    pub fn new(n_iter: usize, seed: u64) -> Self {
        Self {
            params: Vec::new(),
            n_iter,
            seed,
            deduplicate: false,
        }
    }

    pub fn add(mut self, name: impl Into<String>, distribution: Distribution) -> Self {
        self.params.push((name.into(), distribution));
        self
    }

    pub fn deduplicate(mut self, deduplicate: bool) -> Self {
        self.deduplicate = deduplicate;
        self
    }

    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    /// Number of distinct configurations when every parameter is discrete.
    pub fn distinct_configurations(&self) -> Option<usize> {
        self.params
            .iter()
            .try_fold(1usize, |acc, (_, d)| d.cardinality().map(|c| acc.saturating_mul(c)))
    }

    fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> ParameterConfiguration {
        self.params
            .iter()
            .map(|(name, d)| (name.clone(), d.sample(rng)))
            .collect()
    }
}

impl ParameterSpace for ParameterSampler {
    fn candidates(&self) -> Result<Vec<ParameterConfiguration>> {
        if self.n_iter == 0 {
            return invalid("randomized search needs n_iter >= 1");
        }
        check_unique_names(self.params.iter().map(|(name, _)| name.as_str()))?;
        for (name, distribution) in &self.params {
            distribution.validate(name)?;
        }

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.seed);
        if !self.deduplicate {
            return Ok((0..self.n_iter).map(|_| self.draw(&mut rng)).collect());
        }

        let mut target = self.n_iter;
        if let Some(distinct) = self.distinct_configurations().filter(|&d| d < self.n_iter) {
            log::warn!(
                "only {distinct} distinct configurations exist; sampling {distinct} instead of n_iter = {}",
                self.n_iter
            );
            target = distinct;
        }

        let mut seen = HashSet::new();
        let mut candidates = Vec::with_capacity(target);
        let max_draws = self.n_iter.saturating_mul(MAX_DRAWS_PER_CANDIDATE);
        let mut draws = 0;
        while candidates.len() < target && draws < max_draws {
            draws += 1;
            let config = self.draw(&mut rng);
            if seen.insert(config.clone()) {
                candidates.push(config);
            }
        }
        if candidates.len() < target {
            log::warn!(
                "gave up after {draws} draws with {} of {target} distinct configurations",
                candidates.len()
            );
        }
        Ok(candidates)
    }
}
