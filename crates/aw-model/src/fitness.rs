//! Cross-validated fitness of a booster configuration.

use aw_optimizer::{FitnessFunction, HyperparameterConfig};
use aw_types::{AwResult, Dataset};
use tracing::{info, warn};

use crate::booster::{BoosterParams, GradientBoostedClassifier};
use crate::cv::{stratified_folds, FoldStrategy};
use crate::metrics::Metric;

struct FoldData {
    train: Dataset,
    test: Dataset,
}

/// Scores a configuration by training on each fold and averaging the
/// held-out metric.
///
/// Folds are fixed at construction, so every configuration in a run sees the
/// same partitions. Training failures score [`Metric::worst`].
pub struct CrossValidatedFitness {
    folds: Vec<FoldData>,
    base: BoosterParams,
    metric: Metric,
}

impl CrossValidatedFitness {
    /// Validate `dataset` and cut it into folds. Data problems are fatal here,
    /// before any configuration is scored.
    pub fn new(
        dataset: &Dataset,
        strategy: FoldStrategy,
        metric: Metric,
        base: BoosterParams,
        seed: u64,
    ) -> AwResult<Self> {
        dataset.validate()?;
        let folds = stratified_folds(dataset, strategy, seed)?
            .into_iter()
            .map(|fold| FoldData {
                train: dataset.select_rows(&fold.train),
                test: dataset.select_rows(&fold.test),
            })
            .collect::<Vec<_>>();

        info!(
            rows = dataset.n_samples(),
            features = dataset.n_features(),
            folds = folds.len(),
            metric = metric.name(),
            "fitness evaluator ready"
        );
        Ok(Self {
            folds,
            base,
            metric,
        })
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn n_folds(&self) -> usize {
        self.folds.len()
    }

    /// Mean held-out score, or the first error encountered.
    pub fn try_evaluate(&self, config: &HyperparameterConfig, seed: u64) -> AwResult<f64> {
        let params = BoosterParams::from_config(config, &self.base)?.with_seed(seed);
        params.validate()?;

        let mut total = 0.0;
        for fold in &self.folds {
            let mut model = GradientBoostedClassifier::new(params.clone());
            model.fit(&fold.train.features, &fold.train.labels)?;
            let scores = model.predict_proba(&fold.test.features)?;
            total += self.metric.score(&fold.test.labels, &scores)?;
        }
        Ok(total / self.folds.len() as f64)
    }
}

impl FitnessFunction for CrossValidatedFitness {
    fn evaluate(&self, config: &HyperparameterConfig, seed: u64) -> f64 {
        match self.try_evaluate(config, seed) {
            Ok(score) if score.is_finite() => score,
            Ok(score) => {
                warn!(%config, score, "non-finite fitness, scoring as worst");
                self.metric.worst()
            }
            Err(e) => {
                warn!(%config, error = %e, "configuration failed to train, scoring as worst");
                self.metric.worst()
            }
        }
    }

    fn name(&self) -> &str {
        self.metric.name()
    }
}
