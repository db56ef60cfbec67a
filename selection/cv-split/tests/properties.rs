//! Property-based tests for the splitters.
//!
//! Each property is checked over randomized sizes, fold counts and seeds.

use std::collections::{BTreeSet, HashMap};

use cv_split::{
    Split, group_k_fold_splits, holdout_split, k_fold_splits, stratified_k_fold_splits,
    time_series_splits,
};
use proptest::prelude::*;

// ============================================================================
// Helper functions
// ============================================================================

fn is_disjoint(split: &Split) -> bool {
    let train: BTreeSet<_> = split.train_indices.iter().collect();
    split.test_indices.iter().all(|i| !train.contains(i))
}

fn covers(split: &Split, n: usize) -> bool {
    let all: BTreeSet<usize> = split
        .train_indices
        .iter()
        .chain(&split.test_indices)
        .copied()
        .collect();
    all == (0..n).collect()
}

// ============================================================================
// K-fold
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn k_fold_tests_partition_the_range(n in 2usize..200, k_seed in 0usize..1000, shuffle: bool, seed: u64) {
        let k = 2 + k_seed % (n - 1);
        let splits = k_fold_splits(n, k, shuffle, seed).unwrap();
        prop_assert_eq!(splits.len(), k);

        let mut seen = vec![0usize; n];
        for split in &splits {
            prop_assert!(is_disjoint(split));
            prop_assert!(covers(split, n));
            for &i in &split.test_indices {
                seen[i] += 1;
            }
        }
        prop_assert!(seen.iter().all(|&c| c == 1));

        let sizes: Vec<usize> = splits.iter().map(Split::n_test).collect();
        prop_assert!(sizes.iter().max().unwrap() - sizes.iter().min().unwrap() <= 1);
    }

    #[test]
    fn splitters_are_deterministic(n in 10usize..100, seed: u64) {
        let first = k_fold_splits(n, 5, true, seed).unwrap();
        prop_assert_eq!(first, k_fold_splits(n, 5, true, seed).unwrap());
        prop_assert_eq!(holdout_split(n, 0.3, seed).unwrap(), holdout_split(n, 0.3, seed).unwrap());
        let labels: Vec<u8> = (0..n).map(|i| (i % 3) as u8).collect();
        prop_assert_eq!(
            stratified_k_fold_splits(&labels, 3, true, seed).unwrap(),
            stratified_k_fold_splits(&labels, 3, true, seed).unwrap()
        );
    }

    #[test]
    fn holdout_is_a_disjoint_cover(n in 2usize..300, fraction in 0.01f64..0.99, seed: u64) {
        let split = holdout_split(n, fraction, seed).unwrap();
        prop_assert!(is_disjoint(&split));
        prop_assert!(covers(&split, n));
        prop_assert!(split.n_test() >= 1 && split.n_train() >= 1);
    }
}

// ============================================================================
// Stratified and group k-fold
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn stratified_folds_spread_each_class_evenly(
        labels in prop::collection::vec(0u8..4, 20..120),
        k in 2usize..5,
        seed: u64,
    ) {
        let mut counts: HashMap<u8, usize> = HashMap::new();
        for &l in &labels {
            *counts.entry(l).or_insert(0) += 1;
        }
        prop_assume!(counts.values().any(|&c| c >= k));

        let splits = stratified_k_fold_splits(&labels, k, true, seed).unwrap();
        for (class, total) in counts {
            let per_fold: Vec<usize> = splits
                .iter()
                .map(|s| s.test_indices.iter().filter(|&&i| labels[i] == class).count())
                .collect();
            prop_assert_eq!(per_fold.iter().sum::<usize>(), total);
            prop_assert!(per_fold.iter().max().unwrap() - per_fold.iter().min().unwrap() <= 1);
        }
        for split in &splits {
            prop_assert!(is_disjoint(split));
        }
    }

    #[test]
    fn group_k_fold_never_splits_a_group(groups in prop::collection::vec(0u32..12, 10..100), k in 2usize..5) {
        let distinct: BTreeSet<_> = groups.iter().collect();
        prop_assume!(distinct.len() >= k);

        let splits = group_k_fold_splits(&groups, k).unwrap();
        let mut test_fold_of: HashMap<u32, usize> = HashMap::new();
        for split in &splits {
            let group_of = |&i: &usize| groups[i];
            let test_groups: BTreeSet<u32> = split.test_indices.iter().map(group_of).collect();
            let train_groups: BTreeSet<u32> = split.train_indices.iter().map(group_of).collect();
            prop_assert!(test_groups.is_disjoint(&train_groups));
            for g in test_groups {
                prop_assert!(test_fold_of.insert(g, split.fold).is_none());
            }
        }
        prop_assert_eq!(test_fold_of.len(), distinct.len());
    }
}

// ============================================================================
// Time series
// ============================================================================

proptest! {
    #[test]
    fn time_series_train_sets_nest_and_tests_advance(n in 2usize..300, k_seed in 0usize..50) {
        let k = 1 + k_seed % (n - 1);
        let splits = time_series_splits(n, k).unwrap();
        prop_assert_eq!(splits.len(), k);
        for split in &splits {
            prop_assert!(is_disjoint(split));
            prop_assert!(split.train_indices.last().unwrap() < split.test_indices.first().unwrap());
        }
        for pair in splits.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            prop_assert!(a.n_train() < b.n_train());
            prop_assert!(b.train_indices.starts_with(&a.train_indices));
            prop_assert!(a.test_indices.last().unwrap() < b.test_indices.first().unwrap());
        }
        prop_assert_eq!(*splits.last().unwrap().test_indices.last().unwrap(), n - 1);
    }
}
