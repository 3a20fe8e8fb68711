//! # aw-model
//!
//! The classifier side of AmlWolf: a second-order gradient-boosted tree
//! classifier, imbalance-aware metrics, stratified folds, and the
//! cross-validated [`CrossValidatedFitness`] the search ranks wolves by.

pub mod booster;
pub mod cv;
pub mod fitness;
pub mod metrics;
pub mod space;

pub use booster::{BoosterParams, GradientBoostedClassifier};
pub use cv::{stratified_folds, Fold, FoldStrategy};
pub use fitness::CrossValidatedFitness;
pub use metrics::{
    average_precision, f1_at_threshold, roc_auc, ClassificationReport, ConfusionCounts, Metric,
    DEFAULT_THRESHOLD,
};
pub use space::{default_initial_config, default_search_space};
