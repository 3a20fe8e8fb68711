//! Stratified train/test split.

use aw_types::{AwResult, DataError, Dataset};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Split `dataset` into `(train, test)` with each class contributing
/// `test_fraction` of its rows to the test side.
pub fn train_test_split(dataset: &Dataset, test_fraction: f64, seed: u64) -> AwResult<(Dataset, Dataset)> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(aw_types::config_error!(
            "test fraction must be in (0, 1), got {test_fraction}"
        ));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let (negatives, positives) = dataset.class_indices();
    let mut train = Vec::with_capacity(dataset.n_samples());
    let mut test = Vec::new();

    for (class, mut rows) in [(0u8, negatives), (1u8, positives)] {
        rows.shuffle(&mut rng);
        let n_test = ((rows.len() as f64) * test_fraction).round() as usize;
        if n_test == 0 || n_test >= rows.len() {
            return Err(DataError::InsufficientData {
                message: format!(
                    "class {class} has {} rows, too few for a {test_fraction} test split",
                    rows.len()
                ),
            }
            .into());
        }
        test.extend_from_slice(&rows[..n_test]);
        train.extend_from_slice(&rows[n_test..]);
    }

    train.shuffle(&mut rng);
    test.shuffle(&mut rng);
    Ok((dataset.select_rows(&train), dataset.select_rows(&test)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, Array2};

    fn dataset() -> Dataset {
        let labels = Array1::from_shape_fn(50, |i| if i < 20 { 1.0 } else { 0.0 });
        let features = Array2::from_shape_fn((50, 2), |(i, j)| (i * 2 + j) as f64);
        Dataset::new(features, labels, vec!["a".into(), "b".into()]).unwrap()
    }

    #[test]
    fn split_is_stratified_and_complete() {
        let (train, test) = train_test_split(&dataset(), 0.2, 3).unwrap();
        assert_eq!(train.n_samples() + test.n_samples(), 50);
        assert_eq!(test.class_counts().positives, 4);
        assert_eq!(test.class_counts().negatives, 6);
        assert_eq!(train.feature_names, vec!["a", "b"]);
    }

    #[test]
    fn bad_fraction_or_tiny_class_fails() {
        assert!(train_test_split(&dataset(), 0.0, 1).is_err());
        assert!(train_test_split(&dataset(), 1.0, 1).is_err());
        let labels = Array1::from_shape_fn(10, |i| if i == 0 { 1.0 } else { 0.0 });
        let tiny = Dataset::new(Array2::zeros((10, 1)), labels, vec!["x".into()]).unwrap();
        assert!(train_test_split(&tiny, 0.3, 1).is_err());
    }
}
