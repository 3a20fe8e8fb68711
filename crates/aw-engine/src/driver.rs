//! End-to-end search: prepare data, run the pack, fit the final model.

use aw_data::{train_test_split, undersample, FeatureEncoders, RawTable, ScalerParams, TransactionLoader};
use aw_model::{
    default_initial_config, BoosterParams, ClassificationReport, CrossValidatedFitness,
    GradientBoostedClassifier,
};
use aw_optimizer::{derive_seed, GreyWolfOptimizer, GwoConfig, SearchOutcome};
use aw_types::{AwResult, Dataset};
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::artifact::{SearchReport, TrainedArtifact};
use crate::config::{PipelineConfig, ScalerKind};

const STREAM_BALANCE: u64 = 101;
const STREAM_SPLIT: u64 = 102;
const STREAM_FOLDS: u64 = 103;

/// Encoded data ready for the search.
#[derive(Debug, Clone)]
pub struct PreparedData {
    pub encoders: FeatureEncoders,
    pub train: Dataset,
    pub test: Dataset,
}

/// Result of searching on an already-prepared training set.
#[derive(Debug, Clone)]
pub struct SearchRun {
    pub scaler: ScalerParams,
    pub model: GradientBoostedClassifier,
    pub booster: BoosterParams,
    pub outcome: SearchOutcome,
}

/// Drives one complete search run from a [`PipelineConfig`].
#[derive(Debug, Clone)]
pub struct SearchDriver {
    config: PipelineConfig,
}

impl SearchDriver {
    pub fn new(config: PipelineConfig) -> AwResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn seed(&self, stream: u64) -> u64 {
        derive_seed(self.config.search.seed, &[stream])
    }

    /// Encode, optionally balance, then split into train and holdout.
    pub fn prepare(&self, table: &RawTable) -> AwResult<PreparedData> {
        let (encoders, dataset) = FeatureEncoders::fit_transform(table)?;
        dataset.validate()?;

        let dataset = if self.config.balance {
            undersample(&dataset, self.seed(STREAM_BALANCE))?
        } else {
            dataset
        };
        let (train, test) =
            train_test_split(&dataset, self.config.test_fraction, self.seed(STREAM_SPLIT))?;

        let counts = train.class_counts();
        info!(
            train_rows = train.n_samples(),
            test_rows = test.n_samples(),
            positives = counts.positives,
            prevalence = counts.prevalence(),
            "prepared training data"
        );
        Ok(PreparedData {
            encoders,
            train,
            test,
        })
    }

    pub fn fit_scaler(&self, train: &Dataset) -> AwResult<ScalerParams> {
        match self.config.scaler {
            ScalerKind::MinMax => ScalerParams::fit_min_max(train, self.config.feature_range),
            ScalerKind::Standard => ScalerParams::fit_standard(train),
        }
    }

    /// Optimizer settings for this pipeline. Wolf 0 starts from the booster
    /// defaults when they fit inside the search space.
    pub fn gwo_config(&self) -> AwResult<GwoConfig> {
        let settings = &self.config.search;
        let space = self.config.search_space();
        let mut gwo = GwoConfig::new("aml-booster-search", space)
            .with_pack_size(settings.pack_size)
            .with_max_iterations(settings.max_iterations)
            .with_a_init(settings.a_init)
            .with_seed(settings.seed)
            .with_concurrency(settings.concurrency);

        if settings.seed_default_wolf {
            let initial = default_initial_config();
            match gwo.search_space.encode(&initial) {
                Ok(_) => gwo = gwo.with_initial_config(initial),
                Err(e) => warn!(error = %e, "default booster settings not in search space; wolf 0 sampled"),
            }
        }
        gwo.validate()?;
        Ok(gwo)
    }

    /// Scale `train`, search for the best booster configuration and fit the
    /// final model on all of `train`. Data problems fail before the first
    /// iteration.
    pub fn search(&self, train: &Dataset) -> AwResult<SearchRun> {
        train.validate()?;
        let scaler = self.fit_scaler(train)?;
        let scaled = scaler.transform_dataset(train)?;

        let fitness = CrossValidatedFitness::new(
            &scaled,
            self.config.folds,
            self.config.metric,
            self.config.booster.clone(),
            self.seed(STREAM_FOLDS),
        )?;
        let optimizer = GreyWolfOptimizer::new(self.gwo_config()?)?;
        let outcome = optimizer.run(&fitness)?;

        let booster = BoosterParams::from_config(outcome.best_config(), &self.config.booster)?
            .with_seed(self.config.search.seed);
        let mut model = GradientBoostedClassifier::new(booster.clone());
        model.fit(&scaled.features, &scaled.labels)?;

        info!(
            best_fitness = outcome.best_fitness(),
            best_iteration = outcome.best.iteration,
            config = %outcome.best_config(),
            trees = model.n_trees(),
            "final model fitted"
        );
        Ok(SearchRun {
            scaler,
            model,
            booster,
            outcome,
        })
    }

    /// Prepare `table`, search, score the holdout and assemble the artifact.
    pub fn run_on_table(&self, table: &RawTable) -> AwResult<TrainedArtifact> {
        let prepared = self.prepare(table)?;
        let run = self.search(&prepared.train)?;

        let scaled_test = run.scaler.transform(&prepared.test.features)?;
        let scores = run.model.predict_proba(&scaled_test)?;
        let holdout = ClassificationReport::compute(&prepared.test.labels, &scores, self.config.threshold)?;
        info!(
            average_precision = holdout.average_precision,
            roc_auc = holdout.roc_auc,
            f1 = holdout.f1,
            samples = holdout.samples,
            "holdout evaluation"
        );

        let feature_columns = prepared.train.feature_names.clone();
        let mut feature_importances: Vec<(String, f64)> = run
            .model
            .feature_importances()
            .map(|imp| feature_columns.iter().cloned().zip(imp).collect())
            .unwrap_or_default();
        feature_importances.sort_by(|a, b| b.1.total_cmp(&a.1));

        let report = SearchReport {
            run_id: Uuid::new_v4(),
            created_at: Utc::now(),
            metric: self.config.metric,
            best_fitness: run.outcome.best_fitness(),
            best_config: run.outcome.best_config().clone(),
            best_iteration: run.outcome.best.iteration,
            booster: run.booster,
            improved_over_initial: run.outcome.history.improved_over_initial(),
            history: run.outcome.history,
            status: run.outcome.status,
            holdout: Some(holdout),
            feature_importances,
        };

        Ok(TrainedArtifact {
            model: run.model,
            scaler: run.scaler,
            feature_columns,
            encoders: Some(prepared.encoders),
            report: Some(report),
        })
    }

    /// Load the configured CSV, run the search and export to `output_dir`.
    pub fn run(&self) -> AwResult<TrainedArtifact> {
        let started = Utc::now();
        let mut loader = TransactionLoader::new();
        if let Some(max_rows) = self.config.max_rows {
            loader = loader.with_max_rows(max_rows);
        }
        let table = loader.load_csv(&self.config.data_path)?;
        let artifact = self.run_on_table(&table)?;
        artifact.save(&self.config.output_dir)?;

        info!(
            output = %self.config.output_dir.display(),
            elapsed_ms = (Utc::now() - started).num_milliseconds(),
            "search run complete"
        );
        Ok(artifact)
    }
}
