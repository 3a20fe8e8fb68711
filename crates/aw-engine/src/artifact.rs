//! The exported result of a search: model, scaling, feature order, column
//! encoders and the search report, one JSON file each.

use std::fs;
use std::path::{Path, PathBuf};

use aw_data::{FeatureEncoders, ScalerParams};
use aw_model::{BoosterParams, ClassificationReport, GradientBoostedClassifier, Metric};
use aw_optimizer::{ConvergenceHistory, HyperparameterConfig, SearchStatus};
use aw_types::{ArtifactError, AwResult, TrainingError};
use chrono::{DateTime, Utc};
use ndarray::ArrayView1;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

pub const MODEL_FILE: &str = "model.json";
pub const SCALER_FILE: &str = "scaler_params.json";
pub const FEATURES_FILE: &str = "feature_columns.json";
pub const ENCODERS_FILE: &str = "encoders.json";
pub const REPORT_FILE: &str = "search_report.json";

/// Files a serving process cannot start without.
pub const REQUIRED_FILES: [&str; 3] = [MODEL_FILE, SCALER_FILE, FEATURES_FILE];
/// Files read when present.
pub const OPTIONAL_FILES: [&str; 2] = [ENCODERS_FILE, REPORT_FILE];

/// What the search found and how the final model scored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchReport {
    pub run_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub metric: Metric,
    pub best_fitness: f64,
    pub best_config: HyperparameterConfig,
    pub best_iteration: usize,
    /// Parameters the final model was trained with.
    pub booster: BoosterParams,
    pub improved_over_initial: bool,
    pub history: ConvergenceHistory,
    pub status: SearchStatus,
    pub holdout: Option<ClassificationReport>,
    pub feature_importances: Vec<(String, f64)>,
}

/// Everything needed to score a raw transaction the way training saw it.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainedArtifact {
    pub model: GradientBoostedClassifier,
    pub scaler: ScalerParams,
    pub feature_columns: Vec<String>,
    pub encoders: Option<FeatureEncoders>,
    pub report: Option<SearchReport>,
}

fn write_json<T: Serialize>(dir: &Path, name: &str, value: &T) -> AwResult<PathBuf> {
    let path = dir.join(name);
    let file = fs::File::create(&path)?;
    serde_json::to_writer_pretty(std::io::BufWriter::new(file), value)?;
    Ok(path)
}

fn read_json<T: DeserializeOwned>(dir: &Path, name: &str) -> AwResult<T> {
    let path = dir.join(name);
    if !path.exists() {
        return Err(ArtifactError::NotFound {
            path: path.display().to_string(),
        }
        .into());
    }
    let text = fs::read_to_string(&path)?;
    serde_json::from_str(&text).map_err(|e| {
        ArtifactError::Invalid {
            message: format!("{}: {e}", path.display()),
        }
        .into()
    })
}

impl TrainedArtifact {
    /// Feature order must agree across the feature list, the scaler, the
    /// encoders and the model width.
    pub fn check_consistency(&self) -> AwResult<()> {
        if self.feature_columns != self.scaler.feature_names() {
            return Err(ArtifactError::FeatureOrderMismatch {
                left: FEATURES_FILE.to_string(),
                right: SCALER_FILE.to_string(),
            }
            .into());
        }
        if let Some(encoders) = &self.encoders {
            if encoders.feature_names() != self.feature_columns {
                return Err(ArtifactError::FeatureOrderMismatch {
                    left: FEATURES_FILE.to_string(),
                    right: ENCODERS_FILE.to_string(),
                }
                .into());
            }
        }
        if self.model.n_features() != self.feature_columns.len() {
            return Err(TrainingError::FeatureCountMismatch {
                expected: self.feature_columns.len(),
                actual: self.model.n_features(),
            }
            .into());
        }
        Ok(())
    }

    /// Write every file into `dir`, creating it if needed.
    pub fn save(&self, dir: &Path) -> AwResult<Vec<PathBuf>> {
        self.check_consistency()?;
        fs::create_dir_all(dir)?;

        let mut written = vec![
            write_json(dir, MODEL_FILE, &self.model)?,
            write_json(dir, SCALER_FILE, &self.scaler)?,
            write_json(dir, FEATURES_FILE, &self.feature_columns)?,
        ];
        if let Some(encoders) = &self.encoders {
            written.push(write_json(dir, ENCODERS_FILE, encoders)?);
        }
        if let Some(report) = &self.report {
            written.push(write_json(dir, REPORT_FILE, report)?);
        }

        info!(dir = %dir.display(), files = written.len(), "artifacts exported");
        Ok(written)
    }

    /// Read an artifact directory and check it is self-consistent.
    pub fn load(dir: &Path) -> AwResult<Self> {
        let artifact = Self {
            model: read_json(dir, MODEL_FILE)?,
            scaler: read_json(dir, SCALER_FILE)?,
            feature_columns: read_json(dir, FEATURES_FILE)?,
            encoders: dir
                .join(ENCODERS_FILE)
                .exists()
                .then(|| read_json(dir, ENCODERS_FILE))
                .transpose()?,
            report: dir
                .join(REPORT_FILE)
                .exists()
                .then(|| read_json(dir, REPORT_FILE))
                .transpose()?,
        };
        artifact.check_consistency()?;
        Ok(artifact)
    }

    /// Scale an already-encoded feature vector and return the positive-class
    /// probability.
    pub fn score_features(&self, features: &[f64]) -> AwResult<f64> {
        let scaled = self.scaler.transform_row(ArrayView1::from(features))?;
        let probability = self.model.predict_proba_row(&scaled.to_vec())?;
        Ok(probability.clamp(0.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aw_types::{AwError, Dataset};
    use ndarray::{Array1, Array2};
    use tempfile::tempdir;

    fn artifact() -> TrainedArtifact {
        let labels = Array1::from_shape_fn(40, |i| if i % 4 == 0 { 1.0 } else { 0.0 });
        let features = Array2::from_shape_fn((40, 2), |(i, j)| {
            if j == 0 {
                labels[i] * 10.0 + (i % 3) as f64
            } else {
                (i % 5) as f64
            }
        });
        let names = vec!["Amount Paid".to_string(), "From Bank".to_string()];
        let data = Dataset::new(features, labels, names.clone()).unwrap();
        let scaler = ScalerParams::fit_min_max(&data, (-1.0, 1.0)).unwrap();
        let scaled = scaler.transform_dataset(&data).unwrap();
        let mut model = GradientBoostedClassifier::new(BoosterParams {
            n_estimators: 10,
            max_depth: 2,
            ..Default::default()
        });
        model.fit(&scaled.features, &scaled.labels).unwrap();
        TrainedArtifact {
            model,
            scaler,
            feature_columns: names,
            encoders: None,
            report: None,
        }
    }

    #[test]
    fn save_then_load_scores_identically() {
        let dir = tempdir().unwrap();
        let saved = artifact();
        let written = saved.save(dir.path()).unwrap();
        assert_eq!(written.len(), 3);

        let loaded = TrainedArtifact::load(dir.path()).unwrap();
        assert_eq!(loaded, saved);
        let high = loaded.score_features(&[11.0, 2.0]).unwrap();
        let low = loaded.score_features(&[1.0, 2.0]).unwrap();
        assert!(high > 0.5 && low < 0.5, "high {high} low {low}");
    }

    #[test]
    fn missing_required_file_is_not_found() {
        let dir = tempdir().unwrap();
        artifact().save(dir.path()).unwrap();
        fs::remove_file(dir.path().join(SCALER_FILE)).unwrap();
        let err = TrainedArtifact::load(dir.path()).unwrap_err();
        assert!(matches!(err, AwError::Artifact(ArtifactError::NotFound { .. })));
    }

    #[test]
    fn reordered_feature_list_is_rejected() {
        let dir = tempdir().unwrap();
        artifact().save(dir.path()).unwrap();
        fs::write(
            dir.path().join(FEATURES_FILE),
            r#"["From Bank", "Amount Paid"]"#,
        )
        .unwrap();
        let err = TrainedArtifact::load(dir.path()).unwrap_err();
        assert!(matches!(
            err,
            AwError::Artifact(ArtifactError::FeatureOrderMismatch { .. })
        ));
    }

    #[test]
    fn corrupt_file_is_invalid() {
        let dir = tempdir().unwrap();
        artifact().save(dir.path()).unwrap();
        fs::write(dir.path().join(MODEL_FILE), "{not json").unwrap();
        let err = TrainedArtifact::load(dir.path()).unwrap_err();
        assert!(matches!(err, AwError::Artifact(ArtifactError::Invalid { .. })));
    }
}
