//! Pipeline configuration: JSON file plus environment overrides.

use std::path::{Path, PathBuf};

use aw_model::{BoosterParams, FoldStrategy, Metric, DEFAULT_THRESHOLD};
use aw_optimizer::{SearchSpace, DEFAULT_A_INIT};
use aw_types::{config_error, AwResult};
use serde::{Deserialize, Serialize};

pub const ENV_DATA: &str = "AMLWOLF_DATA";
pub const ENV_OUTPUT: &str = "AMLWOLF_OUTPUT";
pub const ENV_ITERATIONS: &str = "AMLWOLF_ITERATIONS";
pub const ENV_PACK: &str = "AMLWOLF_PACK";
pub const ENV_SEED: &str = "AMLWOLF_SEED";

/// Which scaler is fitted on the training features.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalerKind {
    #[default]
    MinMax,
    Standard,
}

/// Grey Wolf settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub pack_size: usize,
    pub max_iterations: usize,
    pub a_init: f64,
    pub seed: u64,
    /// Evaluation threads; 0 uses every core.
    pub concurrency: usize,
    /// Seed wolf 0 with the library-default booster settings.
    pub seed_default_wolf: bool,
    /// Custom search space; the booster default space when absent.
    pub space: Option<SearchSpace>,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            pack_size: 10,
            max_iterations: 20,
            a_init: DEFAULT_A_INIT,
            seed: 42,
            concurrency: 0,
            seed_default_wolf: true,
            space: None,
        }
    }
}

/// End-to-end configuration for `aw-search`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub data_path: PathBuf,
    pub output_dir: PathBuf,
    /// Read at most this many CSV rows.
    pub max_rows: Option<usize>,
    /// Undersample negatives to the positive count before splitting.
    pub balance: bool,
    /// Fraction held out for the final report.
    pub test_fraction: f64,
    pub scaler: ScalerKind,
    pub feature_range: (f64, f64),
    pub folds: FoldStrategy,
    pub metric: Metric,
    /// Booster settings not covered by the search space.
    pub booster: BoosterParams,
    /// Probability threshold for hard labels in the holdout report.
    pub threshold: f64,
    pub search: SearchSettings,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("HI-Small_Trans.csv"),
            output_dir: PathBuf::from("models"),
            max_rows: None,
            balance: true,
            test_fraction: 0.2,
            scaler: ScalerKind::MinMax,
            feature_range: (-1.0, 1.0),
            folds: FoldStrategy::default(),
            metric: Metric::default(),
            booster: BoosterParams::default(),
            threshold: DEFAULT_THRESHOLD,
            search: SearchSettings::default(),
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> AwResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| config_error!("{key} has invalid value '{value}'"))
}

impl PipelineConfig {
    /// Read a JSON file, or start from defaults when `path` is `None`, then
    /// apply process environment overrides.
    pub fn load(path: Option<&Path>) -> AwResult<Self> {
        let config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .map_err(|e| config_error!("cannot read {}: {e}", path.display()))?;
                serde_json::from_str(&text)?
            }
            None => Self::default(),
        };
        let config = config.with_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from `lookup`, which maps variable names to values.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> AwResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_DATA) {
            self.data_path = PathBuf::from(v);
        }
        if let Some(v) = lookup(ENV_OUTPUT) {
            self.output_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup(ENV_ITERATIONS) {
            self.search.max_iterations = parse_env(ENV_ITERATIONS, &v)?;
        }
        if let Some(v) = lookup(ENV_PACK) {
            self.search.pack_size = parse_env(ENV_PACK, &v)?;
        }
        if let Some(v) = lookup(ENV_SEED) {
            self.search.seed = parse_env(ENV_SEED, &v)?;
        }
        Ok(self)
    }

    pub fn validate(&self) -> AwResult<()> {
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(config_error!(
                "test_fraction must be in (0, 1), got {}",
                self.test_fraction
            ));
        }
        if !(self.threshold > 0.0 && self.threshold < 1.0) {
            return Err(config_error!("threshold must be in (0, 1), got {}", self.threshold));
        }
        if !(self.feature_range.0 < self.feature_range.1) {
            return Err(config_error!(
                "feature_range must be increasing, got {:?}",
                self.feature_range
            ));
        }
        self.booster.validate()?;
        Ok(())
    }

    pub fn search_space(&self) -> SearchSpace {
        self.search
            .space
            .clone()
            .unwrap_or_else(aw_model::default_search_space)
    }
}
