use super::*;
use approx::assert_abs_diff_eq;
use modsel_helpers::datasets::{make_blobs, random_centers};
use modsel_helpers::Metric;
use ndarray::Array2;

#[derive(Debug, Error)]
#[error("scripted failure")]
struct ScriptError;

/// Returns a fixed score; optionally refuses to fit.
#[derive(Debug, Clone)]
struct Scripted {
    score: f64,
    fail_fit: bool,
    fitted_on: Option<usize>,
}

impl Scripted {
    fn new(score: f64) -> Self {
        Self {
            score,
            fail_fit: false,
            fitted_on: None,
        }
    }
}

impl Estimator<u8, f64> for Scripted {
    type Error = ScriptError;

    fn fit(&mut self, data: &Dataset<u8, f64>) -> std::result::Result<(), ScriptError> {
        if self.fail_fit {
            return Err(ScriptError);
        }
        self.fitted_on = Some(data.n_samples());
        Ok(())
    }

    fn score(&self, _data: &Dataset<u8, f64>) -> std::result::Result<f64, ScriptError> {
        Ok(self.score)
    }
}

fn dataset(n: usize) -> Dataset<u8, f64> {
    let records = Array2::from_shape_fn((n, 1), |(i, _)| i as f64);
    Dataset::new(records, (0..n).map(|i| (i % 2) as u8).collect()).unwrap()
}

fn grid() -> ParameterGrid {
    ParameterGrid::new()
        .add("C", [1, 10, 20, 100])
        .add("penalty", ["l2", "l1"])
}

fn bind(config: &ParameterConfiguration) -> std::result::Result<Scripted, BoxError> {
    let c = config.get_float("C")?;
    let penalty = config.get_str("penalty")?;
    let shrink = if penalty == "l1" { 0.1 } else { 0.0 };
    Ok(Scripted::new(1.0 - 1.0 / c - shrink))
}

fn five_fold() -> SplitStrategy {
    SplitStrategy::KFold {
        k: 5,
        shuffle: false,
        seed: 0,
    }
}

#[test]
fn test_grid_of_eight_is_fully_ranked() {
    let outcome = grid_search(bind, &grid(), &dataset(10), &five_fold()).unwrap();
    assert_eq!(outcome.ranked().len(), 8);
    assert!(outcome.failed().is_empty());

    let order: Vec<usize> = outcome.ranked().iter().map(|c| c.index).collect();
    assert_eq!(order, vec![6, 4, 2, 7, 5, 3, 0, 1]);
    let ranks: Vec<usize> = outcome.ranked().iter().map(|c| c.rank).collect();
    assert_eq!(ranks, (1..=8).collect::<Vec<_>>());

    assert_eq!(outcome.best_config().to_string(), "{C: 100, penalty: l2}");
    assert_abs_diff_eq!(outcome.best_score(), 0.99, epsilon = 1e-12);
    for pair in outcome.ranked().windows(2) {
        assert!(pair[0].mean_test_score() >= pair[1].mean_test_score());
    }
}

#[test]
fn test_refit_on_full_dataset() {
    let data = dataset(10);
    let outcome = grid_search(bind, &grid(), &data, &five_fold()).unwrap();
    let best = outcome.best_estimator().unwrap();
    assert_eq!(best.fitted_on, Some(10));
    assert_abs_diff_eq!(best.score, 0.99, epsilon = 1e-12);

    let driver = SearchDriver::new(SearchConfig::default().with_refit(false));
    let outcome = driver.search(bind, &grid(), &data, &five_fold()).unwrap();
    assert!(outcome.best_estimator().is_none());
}

#[test]
fn test_failed_candidates_are_recorded_and_skipped() {
    let template = |config: &ParameterConfiguration| -> std::result::Result<Scripted, BoxError> {
        if config.get_str("penalty")? == "l1" {
            return Err("l1 is not supported".into());
        }
        let mut model = bind(config)?;
        model.fail_fit = config.get_int("C")? == 1;
        Ok(model)
    };
    let outcome = grid_search(template, &grid(), &dataset(10), &five_fold()).unwrap();

    let scored: Vec<usize> = outcome.ranked().iter().map(|c| c.index).collect();
    assert_eq!(scored, vec![6, 4, 2]);

    let failed = outcome.failed();
    assert_eq!(failed.len(), 5);
    assert_eq!(failed[0].index, 0);
    assert_eq!(failed[0].fold, Some(0));
    assert!(failed[0].reason.contains("scripted failure"));
    assert_eq!(failed[1].index, 1);
    assert_eq!(failed[1].fold, None);
    assert_eq!(failed[1].reason, "l1 is not supported");
    assert_eq!(failed[1].config.to_string(), "{C: 1, penalty: l1}");
}

#[test]
fn test_all_candidates_failing_is_an_error() {
    let template = |_: &ParameterConfiguration| -> std::result::Result<Scripted, BoxError> {
        Err("nope".into())
    };
    match grid_search(template, &grid(), &dataset(10), &five_fold()) {
        Err(SearchError::AllCandidatesFailed(failed)) => assert_eq!(failed.len(), 8),
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[test]
fn test_exact_ties_share_rank_one() {
    let template = |_: &ParameterConfiguration| -> std::result::Result<Scripted, BoxError> {
        Ok(Scripted::new(0.5))
    };
    let outcome = grid_search(template, &grid(), &dataset(10), &five_fold()).unwrap();
    assert!(outcome.ranked().iter().all(|c| c.rank == 1));
    assert_eq!(outcome.best().index, 0);
    assert_eq!(outcome.report(1).matches("Model with rank: 1").count(), 8);
}

#[test]
fn test_nan_scoring_candidate_never_wins() {
    let template = |config: &ParameterConfiguration| -> std::result::Result<Scripted, BoxError> {
        let c = config.get_int("C")?;
        Ok(Scripted::new(if c == 1 { f64::NAN } else { 0.9 }))
    };
    let grid = ParameterGrid::new().add("C", [1, 10]);
    let outcome = grid_search(template, &grid, &dataset(10), &five_fold()).unwrap();
    assert_eq!(outcome.best_config().get_int("C").unwrap(), 10);
    assert_abs_diff_eq!(outcome.best_score(), 0.9, epsilon = 1e-12);
    assert_abs_diff_eq!(outcome.best_estimator().unwrap().score, 0.9);
    assert_eq!(outcome.ranked()[1].rank, 2);
    assert!(outcome.ranked()[1].mean_test_score().is_nan());
}

#[test]
fn test_randomized_search_is_reproducible() {
    let sampler = ParameterSampler::new(20, 3)
        .add("C", Distribution::LogUniform { low: 1.0, high: 1000.0 })
        .add("penalty", Distribution::choice(["l1", "l2"]));
    let data = dataset(10);
    let a = randomized_search(bind, &sampler, &data, &five_fold()).unwrap();
    let b = randomized_search(bind, &sampler, &data, &five_fold()).unwrap();
    assert_eq!(a.ranked().len(), 20);
    // Fit timings differ between runs, so compare everything else.
    let summary = |o: &SearchOutcome<Scripted>| -> Vec<(usize, usize, String, Vec<f64>)> {
        o.ranked()
            .iter()
            .map(|c| (c.index, c.rank, c.config.to_string(), c.result.test_scores()))
            .collect()
    };
    assert_eq!(summary(&a), summary(&b));
}

#[test]
fn test_split_errors_are_fatal() {
    let strategy = SplitStrategy::KFold {
        k: 50,
        shuffle: false,
        seed: 0,
    };
    assert!(matches!(
        grid_search(bind, &grid(), &dataset(10), &strategy),
        Err(SearchError::Split(_))
    ));
    let bad_grid = ParameterGrid::new().add("C", Vec::<f64>::new());
    assert!(matches!(
        grid_search(bind, &bad_grid, &dataset(10), &five_fold()),
        Err(SearchError::InvalidArgument(_))
    ));
}

#[test]
fn test_cancelled_search() {
    let token = CancelToken::new();
    token.cancel();
    let driver = SearchDriver::new(SearchConfig::default().with_cancel_token(token));
    assert!(matches!(
        driver.search(bind, &grid(), &dataset(10), &five_fold()),
        Err(SearchError::Cancelled { evaluated: 0 })
    ));
}

#[test]
fn test_knn_grid_on_blobs() {
    let centers = random_centers(3, 4, 10.0, 2);
    let data = make_blobs(50, centers.view(), 1.0, 4).unwrap();
    let grid = ParameterGrid::new()
        .add("k", [1, 5, 15])
        .add("metric", ["l1", "l2"]);
    let template = |config: &ParameterConfiguration| -> std::result::Result<_, BoxError> {
        let k = config.get_usize("k")?;
        let metric: Metric = config.get_str("metric")?.parse()?;
        Ok(k_nn::KnnClassifier::new(k, metric))
    };
    let strategy = SplitStrategy::StratifiedKFold {
        k: 5,
        shuffle: true,
        seed: 0,
    };
    let outcome = SearchDriver::new(SearchConfig::default().with_train_score(true))
        .search(template, &grid, &data, &strategy)
        .unwrap();
    assert_eq!(outcome.ranked().len(), 6);
    assert!(outcome.best_score() > 0.9);
    assert!(outcome.best().result.mean_train_score().is_some());

    let refitted = outcome.best_estimator().unwrap();
    assert!(refitted.score(&data).unwrap() > 0.9);
}

#[cfg(feature = "parallel")]
fn summary(outcome: &SearchOutcome<Scripted>) -> Vec<(usize, usize, String, Vec<f64>)> {
    outcome
        .ranked()
        .iter()
        .map(|c| (c.index, c.rank, c.config.to_string(), c.result.test_scores()))
        .collect()
}

#[cfg(feature = "parallel")]
#[test]
fn test_parallel_search_matches_sequential() {
    let data = dataset(10);
    let sequential = grid_search(bind, &grid(), &data, &five_fold()).unwrap();
    let driver = SearchDriver::new(SearchConfig::default().with_parallel(true));
    for _ in 0..5 {
        let parallel = driver.search(bind, &grid(), &data, &five_fold()).unwrap();
        assert_eq!(summary(&parallel), summary(&sequential));
        assert_eq!(parallel.best_estimator().unwrap().fitted_on, Some(10));
    }
}

#[cfg(feature = "parallel")]
#[test]
fn test_parallel_failures_keep_candidate_and_fold_order() {
    let template = |config: &ParameterConfiguration| -> std::result::Result<Scripted, BoxError> {
        let mut model = bind(config)?;
        model.fail_fit = config.get_str("penalty")? == "l1";
        Ok(model)
    };
    let driver = SearchDriver::new(SearchConfig::default().with_parallel(true));
    let outcome = driver.search(template, &grid(), &dataset(10), &five_fold()).unwrap();

    let failed: Vec<(usize, Option<usize>)> =
        outcome.failed().iter().map(|f| (f.index, f.fold)).collect();
    // Every fold of an l1 candidate fails; the first one is reported.
    assert_eq!(failed, vec![(1, Some(0)), (3, Some(0)), (5, Some(0)), (7, Some(0))]);
    let scored: Vec<usize> = outcome.ranked().iter().map(|c| c.index).collect();
    assert_eq!(scored, vec![6, 4, 2, 0]);
}
