//! AmlWolf search pipeline.
//!
//! [`SearchDriver`] loads a transaction CSV, encodes and balances it, runs the
//! grey wolf search over booster hyperparameters, fits the final model and
//! exports a [`TrainedArtifact`] for the scoring service.

pub mod artifact;
pub mod config;
pub mod driver;

pub use artifact::{
    SearchReport, TrainedArtifact, ENCODERS_FILE, FEATURES_FILE, MODEL_FILE, OPTIONAL_FILES,
    REPORT_FILE, REQUIRED_FILES, SCALER_FILE,
};
pub use config::{PipelineConfig, ScalerKind, SearchSettings};
pub use driver::{PreparedData, SearchDriver, SearchRun};
