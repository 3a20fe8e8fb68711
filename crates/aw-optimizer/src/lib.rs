//! # aw-optimizer
//!
//! Grey Wolf hyperparameter search for AmlWolf.
//!
//! Provides the search space and its continuous encoding, the pack update
//! rules, a rayon-backed evaluation pool, and run status and convergence
//! tracking. The fitness being maximized is supplied by the caller through
//! [`FitnessFunction`].

mod gwo;
mod objective;
mod pool;
mod space;
mod state;
mod streams;

pub use gwo::{
    exploration_coefficient, leader_pull, rank_pack, select_leaders, GreyWolfOptimizer, Leaders,
    SearchOutcome, Wolf,
};
pub use objective::{FitnessFn, FitnessFunction};
pub use pool::{EvaluationPool, EvaluationResult, EvaluationTask};
pub use space::{
    bin_index, clamp_axis, clamp_position, HyperparameterConfig, ParameterDef, ParameterKind,
    ParameterValue, Position, SearchSpace,
};
pub use state::{
    BestRecord, ConvergenceHistory, GwoConfig, IterationRecord, SearchId, SearchState,
    SearchStatus, DEFAULT_A_INIT,
};
pub use streams::{derive_seed, stream_rng, STREAM_EVAL, STREAM_INIT, STREAM_PULL};
