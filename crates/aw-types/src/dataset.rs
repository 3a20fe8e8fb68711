//! Labelled tabular data consumed by the search and the classifier.

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::errors::{AwResult, DataError};

/// Column name used for the binary laundering label.
pub const LABEL_COLUMN: &str = "Is_Laundering";

/// A rectangular dataset of labelled transactions.
///
/// Rows are transactions, columns are numeric features in `feature_names`
/// order. Labels are `0.0` (legitimate) or `1.0` (laundering).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub features: Array2<f64>,
    pub labels: Array1<f64>,
    pub feature_names: Vec<String>,
}

/// Class balance summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassCounts {
    pub negatives: usize,
    pub positives: usize,
}

impl ClassCounts {
    pub fn total(&self) -> usize {
        self.negatives + self.positives
    }

    /// Fraction of rows in the positive class.
    pub fn prevalence(&self) -> f64 {
        if self.total() == 0 {
            0.0
        } else {
            self.positives as f64 / self.total() as f64
        }
    }
}

impl Dataset {
    /// Build a dataset, checking that the shapes line up.
    pub fn new(
        features: Array2<f64>,
        labels: Array1<f64>,
        feature_names: Vec<String>,
    ) -> AwResult<Self> {
        if features.nrows() != labels.len() {
            return Err(DataError::ShapeMismatch {
                rows: features.nrows(),
                labels: labels.len(),
            }
            .into());
        }
        if feature_names.len() != features.ncols() {
            return Err(DataError::FeatureNameMismatch {
                names: feature_names.len(),
                columns: features.ncols(),
            }
            .into());
        }
        Ok(Self {
            features,
            labels,
            feature_names,
        })
    }

    pub fn n_samples(&self) -> usize {
        self.features.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    pub fn is_empty(&self) -> bool {
        self.n_samples() == 0 || self.n_features() == 0
    }

    pub fn class_counts(&self) -> ClassCounts {
        let positives = self.labels.iter().filter(|&&y| y >= 0.5).count();
        ClassCounts {
            negatives: self.labels.len() - positives,
            positives,
        }
    }

    /// Row indices of each class, in row order: `(negatives, positives)`.
    pub fn class_indices(&self) -> (Vec<usize>, Vec<usize>) {
        let mut negatives = Vec::new();
        let mut positives = Vec::new();
        for (i, &y) in self.labels.iter().enumerate() {
            if y >= 0.5 {
                positives.push(i);
            } else {
                negatives.push(i);
            }
        }
        (negatives, positives)
    }

    /// Copy the given rows into a new dataset, preserving their order.
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        Self {
            features: self.features.select(Axis(0), indices),
            labels: self.labels.select(Axis(0), indices),
            feature_names: self.feature_names.clone(),
        }
    }

    /// Check that the dataset is usable for training a binary classifier.
    ///
    /// Rejects empty data, non-finite features, labels other than 0/1 and
    /// single-class label vectors.
    pub fn validate(&self) -> AwResult<()> {
        if self.is_empty() {
            return Err(DataError::Empty.into());
        }
        if self.features.nrows() != self.labels.len() {
            return Err(DataError::ShapeMismatch {
                rows: self.features.nrows(),
                labels: self.labels.len(),
            }
            .into());
        }

        for ((row, col), value) in self.features.indexed_iter() {
            if !value.is_finite() {
                return Err(DataError::NonFinite {
                    column: self
                        .feature_names
                        .get(col)
                        .cloned()
                        .unwrap_or_else(|| format!("#{col}")),
                    row,
                }
                .into());
            }
        }

        for (row, &value) in self.labels.iter().enumerate() {
            if value != 0.0 && value != 1.0 {
                return Err(DataError::InvalidLabel { value, row }.into());
            }
        }

        let counts = self.class_counts();
        if counts.positives == 0 {
            return Err(DataError::SingleClass { class: 0 }.into());
        }
        if counts.negatives == 0 {
            return Err(DataError::SingleClass { class: 1 }.into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AwError;
    use ndarray::array;

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("f{i}")).collect()
    }

    #[test]
    fn test_new_rejects_shape_mismatch() {
        let result = Dataset::new(array![[1.0, 2.0], [3.0, 4.0]], array![0.0], names(2));
        assert!(matches!(
            result,
            Err(AwError::Data(DataError::ShapeMismatch { rows: 2, labels: 1 }))
        ));

        let result = Dataset::new(array![[1.0, 2.0]], array![0.0], names(3));
        assert!(matches!(
            result,
            Err(AwError::Data(DataError::FeatureNameMismatch { .. }))
        ));
    }

    #[test]
    fn test_validate_accepts_two_classes() {
        let ds = Dataset::new(array![[1.0], [2.0], [3.0]], array![0.0, 1.0, 0.0], names(1)).unwrap();
        assert!(ds.validate().is_ok());

        let counts = ds.class_counts();
        assert_eq!(counts.positives, 1);
        assert_eq!(counts.negatives, 2);
        assert!((counts.prevalence() - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_validate_rejects_single_class() {
        let ds = Dataset::new(array![[1.0], [2.0]], array![0.0, 0.0], names(1)).unwrap();
        assert!(matches!(
            ds.validate(),
            Err(AwError::Data(DataError::SingleClass { class: 0 }))
        ));
    }

    #[test]
    fn test_validate_rejects_empty_and_non_finite() {
        let empty = Dataset::new(Array2::zeros((0, 2)), Array1::zeros(0), names(2)).unwrap();
        assert!(matches!(empty.validate(), Err(AwError::Data(DataError::Empty))));

        let nan = Dataset::new(array![[1.0], [f64::NAN]], array![0.0, 1.0], names(1)).unwrap();
        assert!(matches!(
            nan.validate(),
            Err(AwError::Data(DataError::NonFinite { row: 1, .. }))
        ));
    }

    #[test]
    fn test_validate_rejects_non_binary_labels() {
        let ds = Dataset::new(array![[1.0], [2.0]], array![0.0, 2.0], names(1)).unwrap();
        assert!(matches!(
            ds.validate(),
            Err(AwError::Data(DataError::InvalidLabel { row: 1, .. }))
        ));
    }

    #[test]
    fn test_select_rows_preserves_order() {
        let ds = Dataset::new(
            array![[1.0, 10.0], [2.0, 20.0], [3.0, 30.0]],
            array![0.0, 1.0, 0.0],
            names(2),
        )
        .unwrap();
        let subset = ds.select_rows(&[2, 0]);
        assert_eq!(subset.features, array![[3.0, 30.0], [1.0, 10.0]]);
        assert_eq!(subset.labels, array![0.0, 0.0]);
        assert_eq!(subset.feature_names, ds.feature_names);

        let (neg, pos) = ds.class_indices();
        assert_eq!(neg, vec![0, 2]);
        assert_eq!(pos, vec![1]);
    }
}
