//! The ranking function the pack is optimized against.

use crate::space::HyperparameterConfig;

/// Scores a decoded configuration; higher is better.
///
/// Implementations must be total over the search space: a configuration the
/// underlying trainer rejects scores the worst value instead of failing. The
/// same `(config, seed)` pair must always give the same score, and calls may
/// run concurrently from several threads.
pub trait FitnessFunction: Sync {
    fn evaluate(&self, config: &HyperparameterConfig, seed: u64) -> f64;

    /// Human-readable objective name.
    fn name(&self) -> &str {
        "fitness"
    }
}

/// Adapter turning a plain closure into a [`FitnessFunction`].
pub struct FitnessFn<F>(pub F);

impl<F> FitnessFunction for FitnessFn<F>
where
    F: Fn(&HyperparameterConfig, u64) -> f64 + Sync,
{
    fn evaluate(&self, config: &HyperparameterConfig, seed: u64) -> f64 {
        (self.0)(config, seed)
    }

    fn name(&self) -> &str {
        "closure"
    }
}

/// NaN ranks below every real score.
pub(crate) fn sanitize_fitness(value: f64) -> f64 {
    if value.is_nan() {
        f64::NEG_INFINITY
    } else {
        value
    }
}
