//! Example demonstrating the error cases of the k-NN classifier through the
//! `Estimator` interface the model-selection harness drives.

use k_nn::{KnnClassifier, KnnError};
use modsel_helpers::{Dataset, Estimator, L2Dist};
use ndarray::array;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("k-NN Classifier Error Handling Examples");
    println!("=======================================");

    let data = Dataset::new(
        array![[1.0, 1.0], [2.0, 2.0], [8.0, 8.0], [9.0, 8.0]],
        vec!["A", "A", "B", "B"],
    )?;

    println!("\n1. Fitting with k = 0:");
    let mut zero = KnnClassifier::new(0, L2Dist);
    match zero.fit(&data) {
        Err(KnnError::InvalidK) => println!("   caught expected error: {}", KnnError::InvalidK),
        other => println!("   unexpected result: {other:?}"),
    }

    println!("\n2. Predicting before fit:");
    let unfitted: KnnClassifier<&str, f64, L2Dist> = KnnClassifier::new(3, L2Dist);
    if let Err(e) = unfitted.predict(array![1.0, 1.0].view()) {
        println!("   caught expected error: {e}");
    }

    println!("\n3. Query with the wrong number of features:");
    let mut model = KnnClassifier::new(3, L2Dist);
    model.fit(&data)?;
    if let Err(e) = model.predict(array![1.0].view()) {
        println!("   caught expected error: {e}");
    }

    println!("\n4. Scoring a fitted model:");
    println!("   training accuracy: {:.2}", model.score(&data)?);
    Ok(())
}
