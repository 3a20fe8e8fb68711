//! Feature scaling fitted once on the training set and exported for serving.

use aw_types::{AwResult, DataError, Dataset, TrainingError};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

/// Fitted scaling parameters, tagged by scaler type.
///
/// Both variants apply `x' = x · scale + offset` per feature; they differ
/// only in how the coefficients are fitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ScalerParams {
    MinMaxScaler {
        feature_names: Vec<String>,
        feature_range: (f64, f64),
        data_min: Vec<f64>,
        data_max: Vec<f64>,
        /// Per-feature multiplier.
        scale: Vec<f64>,
        /// Per-feature offset added after scaling.
        min: Vec<f64>,
    },
    StandardScaler {
        feature_names: Vec<String>,
        mean: Vec<f64>,
        scale: Vec<f64>,
    },
}

fn check_range(low: f64, high: f64) -> AwResult<()> {
    if !(low < high) {
        return Err(TrainingError::InvalidParameter {
            parameter: "feature_range".to_string(),
            message: format!("low {low} must be below high {high}"),
        }
        .into());
    }
    Ok(())
}

impl ScalerParams {
    /// Min-max scaling into `range`. Constant columns get a unit scale and
    /// land on `range.0`.
    pub fn fit_min_max(dataset: &Dataset, range: (f64, f64)) -> AwResult<Self> {
        check_range(range.0, range.1)?;
        if dataset.is_empty() {
            return Err(DataError::Empty.into());
        }
        let x = &dataset.features;
        let data_min: Vec<f64> = x
            .axis_iter(Axis(1))
            .map(|c| c.iter().copied().fold(f64::INFINITY, f64::min))
            .collect();
        let data_max: Vec<f64> = x
            .axis_iter(Axis(1))
            .map(|c| c.iter().copied().fold(f64::NEG_INFINITY, f64::max))
            .collect();

        let (low, high) = range;
        let scale: Vec<f64> = data_min
            .iter()
            .zip(&data_max)
            .map(|(&lo, &hi)| {
                let span = hi - lo;
                if span == 0.0 {
                    1.0
                } else {
                    (high - low) / span
                }
            })
            .collect();
        let min = data_min
            .iter()
            .zip(&scale)
            .map(|(&lo, &s)| low - lo * s)
            .collect();

        Ok(ScalerParams::MinMaxScaler {
            feature_names: dataset.feature_names.clone(),
            feature_range: range,
            data_min,
            data_max,
            scale,
            min,
        })
    }

    /// Zero mean, unit variance. Constant columns get a unit scale.
    pub fn fit_standard(dataset: &Dataset) -> AwResult<Self> {
        if dataset.is_empty() {
            return Err(DataError::Empty.into());
        }
        let x = &dataset.features;
        let mean = x
            .mean_axis(Axis(0))
            .ok_or(DataError::Empty)?
            .to_vec();
        let scale = x
            .std_axis(Axis(0), 0.0)
            .iter()
            .map(|&s| if s == 0.0 { 1.0 } else { s })
            .collect();
        Ok(ScalerParams::StandardScaler {
            feature_names: dataset.feature_names.clone(),
            mean,
            scale,
        })
    }

    pub fn feature_names(&self) -> &[String] {
        match self {
            ScalerParams::MinMaxScaler { feature_names, .. }
            | ScalerParams::StandardScaler { feature_names, .. } => feature_names,
        }
    }

    pub fn n_features(&self) -> usize {
        self.feature_names().len()
    }

    fn coefficients(&self) -> (Vec<f64>, Vec<f64>) {
        match self {
            ScalerParams::MinMaxScaler { scale, min, .. } => (scale.clone(), min.clone()),
            ScalerParams::StandardScaler { mean, scale, .. } => {
                let mul: Vec<f64> = scale.iter().map(|s| 1.0 / s).collect();
                let add = mean.iter().zip(&mul).map(|(m, k)| -m * k).collect();
                (mul, add)
            }
        }
    }

    fn check_width(&self, width: usize) -> AwResult<()> {
        if width != self.n_features() {
            return Err(TrainingError::FeatureCountMismatch {
                expected: self.n_features(),
                actual: width,
            }
            .into());
        }
        Ok(())
    }

    pub fn transform_row(&self, row: ArrayView1<'_, f64>) -> AwResult<Array1<f64>> {
        self.check_width(row.len())?;
        let (mul, add) = self.coefficients();
        Ok(row
            .iter()
            .zip(mul.iter().zip(&add))
            .map(|(x, (k, b))| x * k + b)
            .collect())
    }

    pub fn transform(&self, x: &Array2<f64>) -> AwResult<Array2<f64>> {
        self.check_width(x.ncols())?;
        let (mul, add) = self.coefficients();
        let mul = Array1::from(mul);
        let add = Array1::from(add);
        Ok(x * &mul + &add)
    }

    /// Scale a dataset's features, keeping labels and names.
    pub fn transform_dataset(&self, dataset: &Dataset) -> AwResult<Dataset> {
        if dataset.feature_names != self.feature_names() {
            return Err(DataError::InvalidFormat {
                message: "dataset columns differ from the fitted scaler".to_string(),
            }
            .into());
        }
        Dataset::new(
            self.transform(&dataset.features)?,
            dataset.labels.clone(),
            dataset.feature_names.clone(),
        )
    }
}
