//! Stratified partitioning for fitness evaluation.

use aw_types::{AwResult, DataError, Dataset, SearchError};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// How the training data is partitioned for scoring a configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum FoldStrategy {
    /// Stratified k-fold; fitness is the mean over folds.
    KFold { k: usize },
    /// A single stratified holdout of the given fraction.
    Holdout { test_fraction: f64 },
}

impl Default for FoldStrategy {
    fn default() -> Self {
        FoldStrategy::KFold { k: 3 }
    }
}

/// One train/test partition of row indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fold {
    pub index: usize,
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

fn shuffled(mut rows: Vec<usize>, rng: &mut ChaCha8Rng) -> Vec<usize> {
    rows.shuffle(rng);
    rows
}

/// Build stratified folds over `dataset`.
///
/// Every fold keeps both classes on both sides; a class too small for that
/// is a data error.
pub fn stratified_folds(dataset: &Dataset, strategy: FoldStrategy, seed: u64) -> AwResult<Vec<Fold>> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let (negatives, positives) = dataset.class_indices();
    let classes = [
        ("negative", shuffled(negatives, &mut rng)),
        ("positive", shuffled(positives, &mut rng)),
    ];

    let mut folds = match strategy {
        FoldStrategy::KFold { k } => {
            if k < 2 {
                return Err(SearchError::InvalidConfig {
                    message: format!("k-fold needs k >= 2, got {k}"),
                }
                .into());
            }
            for (name, rows) in &classes {
                if rows.len() < k {
                    return Err(DataError::InsufficientData {
                        message: format!("{} {name} rows cannot fill {k} folds", rows.len()),
                    }
                    .into());
                }
            }

            let mut test_sets: Vec<Vec<usize>> = vec![Vec::new(); k];
            for (_, rows) in &classes {
                for (i, &row) in rows.iter().enumerate() {
                    test_sets[i % k].push(row);
                }
            }
            (0..k)
                .map(|index| {
                    let train = test_sets
                        .iter()
                        .enumerate()
                        .filter(|(j, _)| *j != index)
                        .flat_map(|(_, rows)| rows.iter().copied())
                        .collect();
                    Fold {
                        index,
                        train,
                        test: test_sets[index].clone(),
                    }
                })
                .collect::<Vec<_>>()
        }
        FoldStrategy::Holdout { test_fraction } => {
            if !(test_fraction > 0.0 && test_fraction < 1.0) {
                return Err(SearchError::InvalidConfig {
                    message: format!("holdout fraction must be in (0, 1), got {test_fraction}"),
                }
                .into());
            }
            let mut fold = Fold {
                index: 0,
                train: Vec::new(),
                test: Vec::new(),
            };
            for (name, rows) in &classes {
                let n_test = ((rows.len() as f64) * test_fraction).round() as usize;
                if n_test == 0 || n_test >= rows.len() {
                    return Err(DataError::InsufficientData {
                        message: format!(
                            "{} {name} rows cannot be split with test fraction {test_fraction}",
                            rows.len()
                        ),
                    }
                    .into());
                }
                fold.test.extend_from_slice(&rows[..n_test]);
                fold.train.extend_from_slice(&rows[n_test..]);
            }
            vec![fold]
        }
    };

    for fold in &mut folds {
        fold.train.sort_unstable();
        fold.test.sort_unstable();
    }
    Ok(folds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, Array2};

    fn dataset(negatives: usize, positives: usize) -> Dataset {
        let n = negatives + positives;
        let features = Array2::from_shape_fn((n, 1), |(i, _)| i as f64);
        let labels = Array1::from_shape_fn(n, |i| if i < positives { 1.0 } else { 0.0 });
        Dataset::new(features, labels, vec!["f".into()]).unwrap()
    }

    #[test]
    fn kfold_partitions_every_row_once() {
        let data = dataset(40, 10);
        let folds = stratified_folds(&data, FoldStrategy::KFold { k: 5 }, 7).unwrap();
        assert_eq!(folds.len(), 5);

        let mut all_test: Vec<usize> = folds.iter().flat_map(|f| f.test.clone()).collect();
        all_test.sort_unstable();
        assert_eq!(all_test, (0..50).collect::<Vec<_>>());

        for fold in &folds {
            assert_eq!(fold.train.len() + fold.test.len(), 50);
            let positives = fold.test.iter().filter(|&&r| data.labels[r] == 1.0).count();
            assert_eq!(positives, 2);
            assert!(fold.train.iter().all(|r| !fold.test.contains(r)));
        }
    }

    #[test]
    fn folds_are_seed_deterministic() {
        let data = dataset(30, 9);
        let a = stratified_folds(&data, FoldStrategy::KFold { k: 3 }, 11).unwrap();
        let b = stratified_folds(&data, FoldStrategy::KFold { k: 3 }, 11).unwrap();
        let c = stratified_folds(&data, FoldStrategy::KFold { k: 3 }, 12).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn holdout_keeps_both_classes() {
        let data = dataset(20, 10);
        let folds = stratified_folds(&data, FoldStrategy::Holdout { test_fraction: 0.2 }, 1).unwrap();
        assert_eq!(folds.len(), 1);
        assert_eq!(folds[0].test.len(), 6);
        assert_eq!(folds[0].train.len(), 24);
    }

    #[test]
    fn too_few_minority_rows_is_an_error() {
        let data = dataset(20, 2);
        assert!(stratified_folds(&data, FoldStrategy::KFold { k: 3 }, 0).is_err());
        assert!(stratified_folds(&data, FoldStrategy::Holdout { test_fraction: 0.1 }, 0).is_err());
        assert!(stratified_folds(&data, FoldStrategy::KFold { k: 1 }, 0).is_err());
    }
}
