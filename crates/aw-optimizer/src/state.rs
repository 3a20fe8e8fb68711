//! Search configuration, run status and convergence bookkeeping.

use aw_types::{AwResult, SearchError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::space::{HyperparameterConfig, Position, SearchSpace};

/// Unique search run identifier.
pub type SearchId = Uuid;

/// Default starting value of the exploration coefficient `a`.
pub const DEFAULT_A_INIT: f64 = 2.0;

/// Top-level configuration for a Grey Wolf search run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GwoConfig {
    pub id: SearchId,
    pub name: String,
    pub description: String,

    /// The hyperparameter search space.
    pub search_space: SearchSpace,

    /// Number of wolves N in the pack.
    pub pack_size: usize,

    /// Iteration budget T.
    pub max_iterations: usize,

    /// Starting value of the exploration coefficient; decays linearly to 0.
    pub a_init: f64,

    /// Base seed from which every random stream of the run is derived.
    pub seed: u64,

    /// Worker threads for fitness evaluation. 0 uses the global rayon pool,
    /// 1 evaluates sequentially.
    pub concurrency: usize,

    /// Known-good configuration to seed wolf 0 with.
    pub initial_config: Option<HyperparameterConfig>,

    pub created_at: DateTime<Utc>,
}

impl GwoConfig {
    pub fn new(name: impl Into<String>, search_space: SearchSpace) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: String::new(),
            search_space,
            pack_size: 10,
            max_iterations: 20,
            a_init: DEFAULT_A_INIT,
            seed: 42,
            concurrency: 0,
            initial_config: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_pack_size(mut self, n: usize) -> Self {
        self.pack_size = n;
        self
    }

    pub fn with_max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = n;
        self
    }

    pub fn with_a_init(mut self, a_init: f64) -> Self {
        self.a_init = a_init;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n;
        self
    }

    pub fn with_initial_config(mut self, config: HyperparameterConfig) -> Self {
        self.initial_config = Some(config);
        self
    }

    pub fn validate(&self) -> AwResult<()> {
        self.search_space.validate()?;
        if self.pack_size == 0 {
            return Err(SearchError::InvalidConfig {
                message: "pack_size must be at least 1".to_string(),
            }
            .into());
        }
        if self.max_iterations == 0 {
            return Err(SearchError::InvalidConfig {
                message: "max_iterations must be at least 1".to_string(),
            }
            .into());
        }
        if !(self.a_init > 0.0) || !self.a_init.is_finite() {
            return Err(SearchError::InvalidConfig {
                message: format!("a_init must be positive and finite, got {}", self.a_init),
            }
            .into());
        }
        Ok(())
    }
}

/// Lifecycle state for a search run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchState {
    Pending,
    Running,
    Completed,
}

/// The best solution seen so far, kept apart from the pack so later
/// iterations cannot regress it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestRecord {
    pub position: Position,
    pub fitness: f64,
    pub config: HyperparameterConfig,
    /// Iteration at which this record was first observed.
    pub iteration: usize,
    /// Pack slot that held it at that iteration.
    pub wolf_index: usize,
}

/// Aggregate status of a search run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchStatus {
    pub id: SearchId,
    pub state: SearchState,
    /// Current iteration t.
    pub iteration: usize,
    /// Current exploration coefficient a(t).
    pub exploration: f64,
    /// Fitness evaluations performed so far.
    pub evaluations: usize,
    pub best: Option<BestRecord>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl SearchStatus {
    pub fn new(config: &GwoConfig) -> Self {
        Self {
            id: config.id,
            state: SearchState::Pending,
            iteration: 0,
            exploration: config.a_init,
            evaluations: 0,
            best: None,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn mark_running(&mut self) {
        self.state = SearchState::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn mark_completed(&mut self) {
        self.state = SearchState::Completed;
        self.finished_at = Some(Utc::now());
    }

    pub fn best_fitness(&self) -> Option<f64> {
        self.best.as_ref().map(|b| b.fitness)
    }

    /// Replace the best record only on strict improvement. Ties keep the
    /// earlier record. Returns whether the record changed.
    pub fn update_best(&mut self, candidate: BestRecord) -> bool {
        let improves = match &self.best {
            None => true,
            Some(current) => candidate.fitness > current.fitness,
        };
        if improves {
            self.best = Some(candidate);
        }
        improves
    }
}

/// One line of convergence history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    pub iteration: usize,
    /// a(t) used for the position update that followed this evaluation.
    pub exploration: f64,
    /// Fitness of the alpha wolf at this iteration.
    pub iteration_best: f64,
    /// Mean fitness over the pack.
    pub mean_fitness: f64,
    /// Best-ever fitness after this iteration's reducer step.
    pub best_so_far: f64,
    /// Whether the best-ever record changed this iteration.
    pub improved: bool,
    /// Evaluations performed in this iteration.
    pub evaluations: usize,
}

/// Per-iteration convergence log. Observability only; the search never
/// reads it back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceHistory {
    pub records: Vec<IterationRecord>,
}

impl ConvergenceHistory {
    pub fn push(&mut self, record: IterationRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Best-ever fitness after each iteration.
    pub fn best_curve(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.best_so_far).collect()
    }

    /// True when any iteration after the first raised the best-ever fitness.
    pub fn improved_over_initial(&self) -> bool {
        self.records.iter().skip(1).any(|r| r.improved)
    }
}
