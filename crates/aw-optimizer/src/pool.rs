//! Parallel fitness evaluation for one iteration of the pack.
//!
//! An iteration's evaluations are independent. They are described as
//! [`EvaluationTask`]s, each with its own derived seed, fanned out over a rayon
//! pool, and joined before any shared state is touched.

use aw_types::{AwError, AwResult};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::objective::{sanitize_fitness, FitnessFunction};
use crate::space::HyperparameterConfig;

/// Describes a single fitness evaluation for one wolf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationTask {
    /// Iteration the evaluation belongs to.
    pub iteration: usize,

    /// Pack slot of the wolf being evaluated.
    pub wolf_index: usize,

    /// Seed derived for this wolf and iteration only.
    pub seed: u64,

    /// Decoded hyperparameters to score.
    pub config: HyperparameterConfig,
}

/// Outcome of one [`EvaluationTask`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub wolf_index: usize,
    pub fitness: f64,
}

/// Worker pool used to evaluate a batch of tasks.
pub struct EvaluationPool {
    threads: usize,
    pool: Option<rayon::ThreadPool>,
}

impl std::fmt::Debug for EvaluationPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvaluationPool")
            .field("threads", &self.threads)
            .finish()
    }
}

impl EvaluationPool {
    /// `threads == 0` runs on the global rayon pool, `threads == 1` runs
    /// inline, anything else gets a dedicated pool of that size.
    pub fn new(threads: usize) -> AwResult<Self> {
        let pool = if threads > 1 {
            Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .thread_name(|i| format!("aw-eval-{i}"))
                    .build()
                    .map_err(|e| AwError::Internal(format!("failed to build evaluation pool: {e}")))?,
            )
        } else {
            None
        };
        Ok(Self { threads, pool })
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Evaluate every task and return results in task order.
    ///
    /// Returns only once all tasks have finished.
    pub fn evaluate<F: FitnessFunction>(
        &self,
        tasks: &[EvaluationTask],
        fitness: &F,
    ) -> Vec<EvaluationResult> {
        let run_one = |task: &EvaluationTask| EvaluationResult {
            wolf_index: task.wolf_index,
            fitness: sanitize_fitness(fitness.evaluate(&task.config, task.seed)),
        };

        debug!(
            tasks = tasks.len(),
            threads = self.threads,
            objective = fitness.name(),
            "dispatching evaluation batch"
        );

        match (&self.pool, self.threads) {
            (Some(pool), _) => pool.install(|| tasks.par_iter().map(run_one).collect()),
            (None, 1) => tasks.iter().map(run_one).collect(),
            (None, _) => tasks.par_iter().map(run_one).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objective::FitnessFn;
    use crate::space::ParameterValue;

    fn tasks(n: usize) -> Vec<EvaluationTask> {
        (0..n)
            .map(|i| EvaluationTask {
                iteration: 0,
                wolf_index: i,
                seed: i as u64 * 31,
                config: HyperparameterConfig::new().with("x", ParameterValue::Float(i as f64)),
            })
            .collect()
    }

    #[test]
    fn results_follow_task_order_for_every_pool_kind() {
        let fitness = FitnessFn(|c: &HyperparameterConfig, seed: u64| {
            c.get_f64("x").unwrap() * 10.0 + (seed % 7) as f64
        });
        let batch = tasks(16);

        let sequential = EvaluationPool::new(1).unwrap().evaluate(&batch, &fitness);
        let global = EvaluationPool::new(0).unwrap().evaluate(&batch, &fitness);
        let dedicated = EvaluationPool::new(4).unwrap().evaluate(&batch, &fitness);

        assert_eq!(sequential.len(), 16);
        assert_eq!(sequential, global);
        assert_eq!(sequential, dedicated);
        for (i, r) in sequential.iter().enumerate() {
            assert_eq!(r.wolf_index, i);
        }
    }

    #[test]
    fn nan_fitness_ranks_last() {
        let fitness = FitnessFn(|_: &HyperparameterConfig, _: u64| f64::NAN);
        let results = EvaluationPool::new(1).unwrap().evaluate(&tasks(2), &fitness);
        assert!(results.iter().all(|r| r.fitness == f64::NEG_INFINITY));
    }

    #[test]
    fn task_serialization_round_trip() {
        let task = tasks(3).pop().unwrap();
        let json = serde_json::to_string(&task).unwrap();
        let back: EvaluationTask = serde_json::from_str(&json).unwrap();
        assert_eq!(task, back);
    }
}
