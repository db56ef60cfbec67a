//! Train/test index splitters for cross-validation.
//!
//! Every splitter is a pure function of its arguments: the same sizes,
//! labels, groups and seed always produce the same folds. Randomness comes
//! from a `Xoshiro256PlusPlus` generator seeded explicitly per call, never
//! from a process-wide generator.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

use modsel_helpers::Label;
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_xoshiro::Xoshiro256PlusPlus;
use thiserror::Error;

#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

mod strategy;
mod time_series;

pub use strategy::SplitStrategy;
pub use time_series::{TimeSeriesOptions, time_series_splits, time_series_splits_with};

/// Errors that can occur while computing splits.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SplitError {
    /// Malformed split parameters (fold count, fractions, too few samples...).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, SplitError>;

fn invalid<T>(msg: impl Into<String>) -> Result<T> {
    Err(SplitError::InvalidArgument(msg.into()))
}

/// One train/test partition of the sample indices.
///
/// Both index lists are sorted ascending and never share an index.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
pub struct Split {
    /// Position of this split in the sequence it was produced in.
    pub fold: usize,
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
}

impl Split {
    pub fn new(fold: usize, mut train_indices: Vec<usize>, mut test_indices: Vec<usize>) -> Self {
        train_indices.sort_unstable();
        test_indices.sort_unstable();
        Self {
            fold,
            train_indices,
            test_indices,
        }
    }

    pub fn n_train(&self) -> usize {
        self.train_indices.len()
    }

    pub fn n_test(&self) -> usize {
        self.test_indices.len()
    }

    /// Largest index referenced on either side, if any.
    pub fn max_index(&self) -> Option<usize> {
        self.train_indices
            .last()
            .copied()
            .max(self.test_indices.last().copied())
    }
}

fn permutation(n_samples: usize, seed: u64) -> Vec<usize> {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let mut indices: Vec<usize> = (0..n_samples).collect();
    indices.shuffle(&mut rng);
    indices
}

/// Builds one split per fold from fold-membership lists: fold `i` tests on
/// `folds[i]` and trains on everything else.
fn splits_from_folds(folds: &[Vec<usize>]) -> Vec<Split> {
    (0..folds.len())
        .map(|i| {
            let train = folds
                .iter()
                .enumerate()
                .filter(|&(j, _)| j != i)
                .flat_map(|(_, f)| f.iter().copied())
                .collect();
            Split::new(i, train, folds[i].clone())
        })
        .collect()
}

/// A single random train/test partition.
///
/// `round(n_samples * test_fraction)` samples go to the test side (at least
/// one, and at least one left for training).
pub fn holdout_split(n_samples: usize, test_fraction: f64, seed: u64) -> Result<Split> {
    if n_samples < 2 {
        return invalid(format!("holdout needs at least 2 samples, got {n_samples}"));
    }
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return invalid(format!("test_fraction must lie in (0, 1), got {test_fraction}"));
    }
    let n_test = ((n_samples as f64 * test_fraction).round() as usize).clamp(1, n_samples - 1);
    let mut indices = permutation(n_samples, seed);
    let train = indices.split_off(n_test);
    Ok(Split::new(0, train, indices))
}

/// K-fold cross-validation.
///
/// Folds are contiguous runs of `0..n_samples` (or of a seeded permutation
/// when `shuffle` is set); the first `n_samples % k` folds hold one extra
/// sample. `seed` is ignored when `shuffle` is false.
pub fn k_fold_splits(n_samples: usize, k: usize, shuffle: bool, seed: u64) -> Result<Vec<Split>> {
    if k < 2 {
        return invalid(format!("k-fold needs k >= 2, got {k}"));
    }
    if k > n_samples {
        return invalid(format!("k ({k}) cannot exceed the number of samples ({n_samples})"));
    }

    let indices: Vec<usize> = if shuffle {
        permutation(n_samples, seed)
    } else {
        (0..n_samples).collect()
    };

    let base = n_samples / k;
    let remainder = n_samples % k;
    let mut folds = Vec::with_capacity(k);
    let mut current = 0;
    for i in 0..k {
        let size = if i < remainder { base + 1 } else { base };
        folds.push(indices[current..current + size].to_vec());
        current += size;
    }
    Ok(splits_from_folds(&folds))
}

/// K-fold that keeps each fold's label mix close to the full dataset's.
///
/// Classes are visited in ascending order and their indices dealt
/// round-robin over the folds, carrying the round-robin position from one
/// class to the next, so fold sizes differ by at most one and every class is
/// spread as evenly as its size allows. A class with fewer than `k` members
/// only triggers a warning; `k` larger than every class is an error since
/// some folds would get no test samples.
pub fn stratified_k_fold_splits<L: Label>(
    labels: &[L],
    k: usize,
    shuffle: bool,
    seed: u64,
) -> Result<Vec<Split>> {
    if k < 2 {
        return invalid(format!("stratified k-fold needs k >= 2, got {k}"));
    }
    if labels.is_empty() {
        return invalid("stratified k-fold needs at least one label");
    }

    let mut by_class: BTreeMap<&L, Vec<usize>> = BTreeMap::new();
    for (i, label) in labels.iter().enumerate() {
        by_class.entry(label).or_default().push(i);
    }

    let largest = by_class.values().map(Vec::len).max().unwrap_or(0);
    if k > largest {
        return invalid(format!(
            "k ({k}) cannot be greater than the number of members in every class (largest has {largest})"
        ));
    }
    for (label, members) in &by_class {
        if members.len() < k {
            log::warn!(
                "class {label:?} has only {} members, fewer than k = {k}; some folds will not contain it",
                members.len()
            );
        }
    }

    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let mut folds = vec![Vec::new(); k];
    let mut position = 0;
    for members in by_class.values_mut() {
        if shuffle {
            members.shuffle(&mut rng);
        }
        for &i in members.iter() {
            folds[position % k].push(i);
            position += 1;
        }
    }
    Ok(splits_from_folds(&folds))
}

/// K-fold where every group lands wholly in one fold.
///
/// Groups are taken largest first (ties broken by ascending identifier) and
/// each goes to the fold currently holding the fewest samples (ties broken
/// by lowest fold index).
pub fn group_k_fold_splits<G>(groups: &[G], k: usize) -> Result<Vec<Split>>
where
    G: Clone + Eq + Hash + Ord,
{
    if k < 2 {
        return invalid(format!("group k-fold needs k >= 2, got {k}"));
    }

    let mut sizes: BTreeMap<&G, usize> = BTreeMap::new();
    for g in groups {
        *sizes.entry(g).or_insert(0) += 1;
    }
    if sizes.len() < k {
        return invalid(format!(
            "number of distinct groups ({}) must be at least k ({k})",
            sizes.len()
        ));
    }

    let mut order: Vec<(&G, usize)> = sizes.into_iter().collect();
    // Stable sort keeps the ascending-identifier order among equal sizes.
    order.sort_by(|a, b| b.1.cmp(&a.1));

    let mut load = vec![0usize; k];
    let mut fold_of: HashMap<&G, usize> = HashMap::with_capacity(order.len());
    for (group, size) in order {
        let (lightest, _) = load
            .iter()
            .enumerate()
            .min_by_key(|&(i, &l)| (l, i))
            .unwrap_or((0, &0));
        load[lightest] += size;
        fold_of.insert(group, lightest);
    }

    let mut folds = vec![Vec::new(); k];
    for (i, g) in groups.iter().enumerate() {
        folds[fold_of[g]].push(i);
    }
    Ok(splits_from_folds(&folds))
}

/// One fold per sample: test on `{i}`, train on everything else.
pub fn leave_one_out_splits(n_samples: usize) -> Result<Vec<Split>> {
    if n_samples < 2 {
        return invalid(format!("leave-one-out needs at least 2 samples, got {n_samples}"));
    }
    Ok((0..n_samples)
        .map(|i| {
            let train = (0..n_samples).filter(|&j| j != i).collect();
            Split::new(i, train, vec![i])
        })
        .collect())
}

/// `n_splits` independent random holdout splits; split `j` uses `seed + j`.
///
/// Unlike k-fold, test sets of different splits may overlap.
pub fn shuffle_splits(
    n_samples: usize,
    n_splits: usize,
    test_fraction: f64,
    seed: u64,
) -> Result<Vec<Split>> {
    if n_splits == 0 {
        return invalid("shuffle split needs at least one split");
    }
    (0..n_splits)
        .map(|j| {
            let mut split = holdout_split(n_samples, test_fraction, seed.wrapping_add(j as u64))?;
            split.fold = j;
            Ok(split)
        })
        .collect()
}

/// Shuffled k-fold repeated `n_repeats` times; repeat `r` uses `seed + r`.
///
/// Fold numbers run on across repeats, `0..k * n_repeats`.
pub fn repeated_k_fold_splits(
    n_samples: usize,
    k: usize,
    n_repeats: usize,
    seed: u64,
) -> Result<Vec<Split>> {
    if n_repeats == 0 {
        return invalid("repeated k-fold needs at least one repeat");
    }
    let mut all = Vec::with_capacity(k * n_repeats);
    for r in 0..n_repeats {
        for mut split in k_fold_splits(n_samples, k, true, seed.wrapping_add(r as u64))? {
            split.fold += r * k;
            all.push(split);
        }
    }
    Ok(all)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn assert_disjoint(split: &Split) {
        let train: HashSet<_> = split.train_indices.iter().collect();
        assert!(split.test_indices.iter().all(|i| !train.contains(i)));
    }

    #[test]
    fn test_holdout_sizes() {
        let split = holdout_split(150, 0.4, 0).unwrap();
        assert_eq!(split.n_test(), 60);
        assert_eq!(split.n_train(), 90);
        assert_disjoint(&split);
    }

    #[test]
    fn test_holdout_keeps_both_sides_non_empty() {
        let split = holdout_split(3, 0.01, 1).unwrap();
        assert_eq!(split.n_test(), 1);
        let split = holdout_split(3, 0.99, 1).unwrap();
        assert_eq!(split.n_train(), 1);
    }

    #[test]
    fn test_holdout_rejects_bad_arguments() {
        assert!(holdout_split(1, 0.5, 0).is_err());
        assert!(holdout_split(10, 0.0, 0).is_err());
        assert!(holdout_split(10, 1.0, 0).is_err());
        assert!(holdout_split(10, f64::NAN, 0).is_err());
    }

    #[test]
    fn test_k_fold_shuffled_150_by_5() {
        let splits = k_fold_splits(150, 5, true, 0).unwrap();
        assert_eq!(splits.len(), 5);
        for split in &splits {
            assert_eq!(split.n_test(), 30);
            assert_eq!(split.n_train(), 120);
            assert_disjoint(split);
        }
        let mut all_test: Vec<usize> = splits.iter().flat_map(|s| s.test_indices.clone()).collect();
        all_test.sort();
        assert_eq!(all_test, (0..150).collect::<Vec<_>>());
    }

    #[test]
    fn test_k_fold_unshuffled_is_contiguous_with_uneven_sizes() {
        let splits = k_fold_splits(7, 3, false, 99).unwrap();
        assert_eq!(splits[0].test_indices, vec![0, 1, 2]);
        assert_eq!(splits[1].test_indices, vec![3, 4]);
        assert_eq!(splits[2].test_indices, vec![5, 6]);
        assert_eq!(splits[1].train_indices, vec![0, 1, 2, 5, 6]);
    }

    #[test]
    fn test_k_fold_rejects_bad_k() {
        assert_eq!(
            k_fold_splits(10, 1, false, 0).unwrap_err(),
            SplitError::InvalidArgument("k-fold needs k >= 2, got 1".into())
        );
        assert!(k_fold_splits(4, 5, false, 0).is_err());
    }

    #[test]
    fn test_k_fold_seed_changes_assignment() {
        let a = k_fold_splits(50, 5, true, 1).unwrap();
        let b = k_fold_splits(50, 5, true, 2).unwrap();
        assert_ne!(a, b);
        assert_eq!(a, k_fold_splits(50, 5, true, 1).unwrap());
    }

    #[test]
    fn test_stratified_balanced_classes() {
        let labels: Vec<u8> = (0..150).map(|i| (i / 50) as u8).collect();
        let splits = stratified_k_fold_splits(&labels, 5, true, 0).unwrap();
        for split in &splits {
            assert_eq!(split.n_test(), 30);
            for class in 0..3u8 {
                let count = split.test_indices.iter().filter(|&&i| labels[i] == class).count();
                assert_eq!(count, 10);
            }
        }
    }

    #[test]
    fn test_stratified_fold_sizes_differ_by_at_most_one() {
        let labels = vec!["x", "x", "x", "y", "y", "z", "z", "z", "z", "z", "z"];
        let splits = stratified_k_fold_splits(&labels, 3, false, 0).unwrap();
        let sizes: Vec<usize> = splits.iter().map(Split::n_test).collect();
        let min = sizes.iter().min().unwrap();
        let max = sizes.iter().max().unwrap();
        assert!(max - min <= 1);
        assert_eq!(sizes.iter().sum::<usize>(), labels.len());
    }

    #[test]
    fn test_stratified_small_class_is_not_fatal() {
        // "b" has a single member with k = 3: a warning, not an error.
        let labels = vec!["a", "a", "a", "a", "a", "a", "b"];
        let splits = stratified_k_fold_splits(&labels, 3, false, 0).unwrap();
        assert_eq!(splits.len(), 3);
    }

    #[test]
    fn test_stratified_k_above_every_class_fails() {
        let labels = vec![0, 0, 1, 1];
        assert!(stratified_k_fold_splits(&labels, 3, false, 0).is_err());
        assert!(stratified_k_fold_splits::<u8>(&[], 2, false, 0).is_err());
    }

    #[test]
    fn test_group_k_fold_keeps_groups_together() {
        let groups = vec![1, 1, 1, 2, 2, 3, 4, 4, 4, 4, 5];
        let splits = group_k_fold_splits(&groups, 3).unwrap();
        for split in &splits {
            let test_groups: HashSet<_> = split.test_indices.iter().map(|&i| groups[i]).collect();
            assert!(split.train_indices.iter().all(|&i| !test_groups.contains(&groups[i])));
        }
    }

    #[test]
    fn test_group_k_fold_greedy_balance() {
        // sizes: 4 -> 4, 1 -> 3, 2 -> 2, 3 -> 1, 5 -> 1
        let groups = vec![1, 1, 1, 2, 2, 3, 4, 4, 4, 4, 5];
        let splits = group_k_fold_splits(&groups, 3).unwrap();
        let sizes: Vec<usize> = splits.iter().map(Split::n_test).collect();
        // 4 -> fold0 (4), 1 -> fold1 (3), 2 -> fold2 (2), 3 -> fold2 (3), 5 -> fold1 (4)
        assert_eq!(sizes, vec![4, 4, 3]);
        assert_eq!(splits[0].test_indices, vec![6, 7, 8, 9]);
    }

    #[test]
    fn test_group_k_fold_too_few_groups() {
        assert!(group_k_fold_splits(&["a", "a", "b"], 3).is_err());
    }

    #[test]
    fn test_leave_one_out() {
        let splits = leave_one_out_splits(4).unwrap();
        assert_eq!(splits.len(), 4);
        assert_eq!(splits[2].test_indices, vec![2]);
        assert_eq!(splits[2].train_indices, vec![0, 1, 3]);
        assert!(leave_one_out_splits(1).is_err());
    }

    #[test]
    fn test_shuffle_splits_are_independent_holdouts() {
        let splits = shuffle_splits(20, 3, 0.25, 5).unwrap();
        assert_eq!(splits.len(), 3);
        for (j, split) in splits.iter().enumerate() {
            assert_eq!(split.fold, j);
            assert_eq!(split.n_test(), 5);
            let holdout = holdout_split(20, 0.25, 5 + j as u64).unwrap();
            assert_eq!(split.test_indices, holdout.test_indices);
        }
    }

    #[test]
    fn test_repeated_k_fold_numbering() {
        let splits = repeated_k_fold_splits(30, 3, 4, 0).unwrap();
        assert_eq!(splits.len(), 12);
        assert_eq!(splits.iter().map(|s| s.fold).collect::<Vec<_>>(), (0..12).collect::<Vec<_>>());
        assert!(repeated_k_fold_splits(30, 3, 0, 0).is_err());
    }

    #[test]
    fn test_split_max_index() {
        let split = Split::new(0, vec![4, 1], vec![7, 2]);
        assert_eq!(split.train_indices, vec![1, 4]);
        assert_eq!(split.max_index(), Some(7));
    }
}
