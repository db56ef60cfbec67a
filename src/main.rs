// Walks a k-NN classifier through the model-selection toolbox on a small
// synthetic dataset. Run with `RUST_LOG=debug` to see per-fold progress.
use modsel::datasets::make_blobs;
use ndarray::array;

use modsel::{
    BoxError, CrossValidator, Dataset, Distribution, KnnClassifier, L2Dist, MajorityClass, Metric,
    ParameterConfiguration, ParameterGrid, ParameterSampler, SearchConfig, SearchDriver,
    SplitStrategy, TimeSeriesOptions, cross_val_score, learning_curve, validation_curve,
};

const SEED: u64 = 42;

type Knn = KnnClassifier<usize, f64, Metric>;

fn bind_knn(config: &ParameterConfiguration) -> Result<Knn, BoxError> {
    let k = config.get_usize("k")?;
    let metric: Metric = config.get_str("metric")?.parse()?;
    Ok(KnnClassifier::new(k, metric))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    // 150 samples, 4 features, 3 classes of 50, stored class by class.
    let centers = array![
        [0.0, 0.0, 0.0, 0.0],
        [4.0, 4.0, 0.0, 0.0],
        [0.0, 4.0, 4.0, 4.0]
    ];
    let blobs = make_blobs(50, centers.view(), 1.5, SEED)?;
    // Ten groups of 15 consecutive samples, e.g. ten recording sessions.
    let groups = (0..blobs.n_samples()).map(|i| (i / 15) as u64).collect();
    let data: Dataset<usize, f64> = blobs.with_groups(groups)?;
    println!(
        "dataset: {} samples, {} features, classes {:?}",
        data.n_samples(),
        data.n_features(),
        data.classes()
    );

    let knn = || KnnClassifier::new(5, L2Dist);
    println!("\n5-NN under different splitting strategies:");
    let strategies = [
        SplitStrategy::Holdout {
            test_fraction: 0.4,
            seed: SEED,
        },
        SplitStrategy::KFold {
            k: 5,
            shuffle: false,
            seed: 0,
        },
        SplitStrategy::KFold {
            k: 5,
            shuffle: true,
            seed: SEED,
        },
        SplitStrategy::StratifiedKFold {
            k: 5,
            shuffle: true,
            seed: SEED,
        },
        SplitStrategy::GroupKFold { k: 5 },
        SplitStrategy::TimeSeries {
            k: 5,
            options: TimeSeriesOptions::default(),
        },
        SplitStrategy::RepeatedKFold {
            k: 5,
            n_repeats: 3,
            seed: SEED,
        },
    ];
    for strategy in &strategies {
        let result = cross_val_score(knn, &data, strategy)?;
        let name = strategy.to_string();
        println!(
            "  {name:<28} mean {:.3} (std {:.3}) over {} splits",
            result.mean_test_score(),
            result.std_test_score(),
            result.n_splits()
        );
    }

    // The floor any real model has to beat.
    let baseline = CrossValidator::new().evaluate_strategy(
        MajorityClass::<usize>::new,
        &data,
        &SplitStrategy::StratifiedKFold {
            k: 5,
            shuffle: false,
            seed: 0,
        },
    )?;
    println!("  majority-class baseline      mean {:.3}", baseline.mean_test_score());

    let splits = SplitStrategy::StratifiedKFold {
        k: 5,
        shuffle: true,
        seed: SEED,
    }
    .splits(&data)?;

    println!("\nvalidation curve over k:");
    let curve = validation_curve(
        |&k: &usize| KnnClassifier::new(k, L2Dist),
        &[1, 3, 5, 15, 45],
        &data,
        &splits,
    )?;
    for point in &curve {
        println!(
            "  k = {:<3} train {:.3}  test {:.3}  gap {:+.3}",
            point.value,
            point.result.mean_train_score().unwrap_or(f64::NAN),
            point.result.mean_test_score(),
            point.generalization_gap().unwrap_or(f64::NAN)
        );
    }

    println!("\nlearning curve for 5-NN:");
    for point in learning_curve(knn, &data, &splits, &[0.1, 0.25, 0.5, 1.0], Some(SEED))? {
        println!(
            "  {:>4.0}% of train ({:>3} samples): test {:.3}",
            point.train_fraction * 100.0,
            point.train_sizes.first().copied().unwrap_or(0),
            point.result.mean_test_score()
        );
    }

    let driver = SearchDriver::new(SearchConfig::default().with_train_score(true));
    let cv = SplitStrategy::StratifiedKFold {
        k: 5,
        shuffle: true,
        seed: SEED,
    };

    let grid = ParameterGrid::new()
        .add("k", [1, 3, 5, 9, 15])
        .add("metric", ["l1", "l2", "l3", "linf"]);
    println!("\ngrid search over {} candidates:", grid.len());
    let outcome = driver.search(bind_knn, &grid, &data, &cv)?;
    print!("{}", outcome.report(3));

    let sampler = ParameterSampler::new(10, SEED)
        .add("k", Distribution::IntUniform { low: 1, high: 30 })
        .add("metric", Distribution::choice(["l1", "l2", "linf"]))
        .deduplicate(true);
    println!("randomized search, {} draws:", sampler.n_iter());
    let outcome = driver.search(bind_knn, &sampler, &data, &cv)?;
    print!("{}", outcome.report(3));

    if let Some(model) = outcome.best_estimator() {
        let sample = data.row(0);
        println!(
            "refitted {} predicts class {} for sample 0 (true class {})",
            outcome.best_config(),
            model.predict(sample)?,
            data.targets()[0]
        );
    }
    Ok(())
}
