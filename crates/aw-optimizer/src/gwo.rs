//! Grey Wolf Optimizer.
//!
//! The pack is a fixed set of [`Wolf`]s. Each iteration evaluates the wolves
//! that moved, ranks the pack, records the best-ever solution, and moves every
//! wolf toward the three leaders (alpha, beta, delta):
//!
//! ```text
//! A = 2·a·r1 − a      C = 2·r2      D = |C·leader − x|
//! x' = mean over leaders of (leader − A·D)
//! ```
//!
//! `a` decays linearly from `a_init` to 0 over the iteration budget, moving the
//! pack from exploration to local refinement.

use aw_types::{AwResult, SearchError};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::objective::FitnessFunction;
use crate::pool::{EvaluationPool, EvaluationTask};
use crate::space::{clamp_position, HyperparameterConfig, Position};
use crate::state::{BestRecord, ConvergenceHistory, GwoConfig, IterationRecord, SearchStatus};
use crate::streams::{derive_seed, stream_rng, STREAM_EVAL, STREAM_INIT, STREAM_PULL};

/// One candidate: a position plus the fitness of exactly that position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wolf {
    pub position: Position,
    fitness: Option<f64>,
}

impl Wolf {
    pub fn new(position: Position) -> Self {
        Self {
            position,
            fitness: None,
        }
    }

    /// Fitness of the current position, `None` until evaluated.
    pub fn fitness(&self) -> Option<f64> {
        self.fitness
    }

    pub fn needs_evaluation(&self) -> bool {
        self.fitness.is_none()
    }

    pub fn set_fitness(&mut self, fitness: f64) {
        self.fitness = Some(fitness);
    }

    /// Move to a new position, discarding the now-stale fitness.
    pub fn move_to(&mut self, position: Position) {
        self.position = position;
        self.fitness = None;
    }

    fn rank_key(&self) -> f64 {
        match self.fitness {
            Some(f) if !f.is_nan() => f,
            _ => f64::NEG_INFINITY,
        }
    }
}

/// Pack indices of the three current leaders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Leaders {
    pub alpha: usize,
    pub beta: usize,
    pub delta: usize,
}

impl Leaders {
    pub fn as_array(&self) -> [usize; 3] {
        [self.alpha, self.beta, self.delta]
    }
}

/// `a(t) = a_init · (1 − t/T)`.
pub fn exploration_coefficient(iteration: usize, max_iterations: usize, a_init: f64) -> f64 {
    if max_iterations == 0 {
        return 0.0;
    }
    let t = iteration.min(max_iterations) as f64;
    a_init * (1.0 - t / max_iterations as f64)
}

/// Pack indices ordered by fitness, best first. Unevaluated wolves sort last.
pub fn rank_pack(wolves: &[Wolf]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..wolves.len()).collect();
    order.sort_by(|&a, &b| wolves[b].rank_key().total_cmp(&wolves[a].rank_key()));
    order
}

/// Derive alpha, beta and delta from the current ranking.
///
/// Packs smaller than three repeat the alpha in the missing roles.
pub fn select_leaders(wolves: &[Wolf]) -> Option<Leaders> {
    let order = rank_pack(wolves);
    let alpha = *order.first()?;
    let beta = order.get(1).copied().unwrap_or(alpha);
    let delta = order.get(2).copied().unwrap_or(alpha);
    Some(Leaders { alpha, beta, delta })
}

/// Contribution of one leader to one axis.
pub fn leader_pull(leader: f64, current: f64, a: f64, r1: f64, r2: f64) -> f64 {
    let big_a = 2.0 * a * r1 - a;
    let c = 2.0 * r2;
    let distance = (c * leader - current).abs();
    leader - big_a * distance
}

/// Final state of a search run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub best: BestRecord,
    pub history: ConvergenceHistory,
    pub status: SearchStatus,
}

impl SearchOutcome {
    pub fn best_config(&self) -> &HyperparameterConfig {
        &self.best.config
    }

    pub fn best_fitness(&self) -> f64 {
        self.best.fitness
    }
}

/// Grey Wolf Optimizer over a [`crate::SearchSpace`].
#[derive(Debug)]
pub struct GreyWolfOptimizer {
    config: GwoConfig,
    bounds: Vec<(f64, f64)>,
    pool: EvaluationPool,
}

impl GreyWolfOptimizer {
    pub fn new(config: GwoConfig) -> AwResult<Self> {
        config.validate()?;
        let bounds = config.search_space.bounds();
        let pool = EvaluationPool::new(config.concurrency)?;
        Ok(Self {
            config,
            bounds,
            pool,
        })
    }

    pub fn config(&self) -> &GwoConfig {
        &self.config
    }

    /// Build the initial pack: uniform positions, with wolf 0 taken from
    /// `initial_config` when one is configured.
    pub fn initialize_pack(&self) -> AwResult<Vec<Wolf>> {
        let space = &self.config.search_space;
        let mut rng = stream_rng(self.config.seed, &[STREAM_INIT]);
        let mut pack: Vec<Wolf> = (0..self.config.pack_size)
            .map(|_| Wolf::new(space.sample_position(&mut rng)))
            .collect();

        if let Some(initial) = &self.config.initial_config {
            let mut position = space.encode(initial)?;
            clamp_position(&mut position, &self.bounds);
            pack[0] = Wolf::new(position);
        }
        Ok(pack)
    }

    /// Compute the next position of one wolf given the leaders' positions.
    ///
    /// Every `(axis, leader)` pull draws its `r1, r2` from its own stream,
    /// so the move is identical regardless of evaluation order.
    pub fn next_position(
        &self,
        iteration: usize,
        wolf_index: usize,
        current: &[f64],
        leaders: &[&[f64]; 3],
        a: f64,
    ) -> Position {
        let mut next: Position = current
            .iter()
            .enumerate()
            .map(|(axis, &x)| {
                let sum: f64 = leaders
                    .iter()
                    .enumerate()
                    .map(|(role, leader)| {
                        let mut rng = stream_rng(
                            self.config.seed,
                            &[
                                STREAM_PULL,
                                iteration as u64,
                                wolf_index as u64,
                                axis as u64,
                                role as u64,
                            ],
                        );
                        let r1: f64 = rng.gen();
                        let r2: f64 = rng.gen();
                        leader_pull(leader[axis], x, a, r1, r2)
                    })
                    .sum();
                sum / 3.0
            })
            .collect();
        clamp_position(&mut next, &self.bounds);
        next
    }

    /// Run the full search against `fitness`.
    pub fn run<F: FitnessFunction>(&self, fitness: &F) -> AwResult<SearchOutcome> {
        let space = &self.config.search_space;
        let t_max = self.config.max_iterations;
        let mut status = SearchStatus::new(&self.config);
        let mut history = ConvergenceHistory::default();

        info!(
            run = %self.config.id,
            name = %self.config.name,
            pack_size = self.config.pack_size,
            iterations = t_max,
            dimensions = space.dimensions(),
            threads = self.pool.threads(),
            "starting grey wolf search"
        );
        status.mark_running();

        let mut pack = self.initialize_pack()?;

        for t in 0..t_max {
            let a = exploration_coefficient(t, t_max, self.config.a_init);
            status.iteration = t;
            status.exploration = a;

            // evaluate every wolf that moved; barrier before ranking
            let tasks = pack
                .iter()
                .enumerate()
                .filter(|(_, wolf)| wolf.needs_evaluation())
                .map(|(i, wolf)| {
                    Ok(EvaluationTask {
                        iteration: t,
                        wolf_index: i,
                        seed: derive_seed(self.config.seed, &[STREAM_EVAL, t as u64, i as u64]),
                        config: space.decode(&wolf.position)?,
                    })
                })
                .collect::<AwResult<Vec<_>>>()?;
            let results = self.pool.evaluate(&tasks, fitness);
            for result in &results {
                pack[result.wolf_index].set_fitness(result.fitness);
            }
            status.evaluations += results.len();

            let leaders = select_leaders(&pack).ok_or(SearchError::NoResult)?;
            let alpha = &pack[leaders.alpha];
            let iteration_best = alpha.rank_key();

            let improved = status.update_best(BestRecord {
                position: alpha.position.clone(),
                fitness: iteration_best,
                config: space.decode(&alpha.position)?,
                iteration: t,
                wolf_index: leaders.alpha,
            });
            let best_so_far = status.best_fitness().unwrap_or(iteration_best);

            let finite: Vec<f64> = pack
                .iter()
                .map(Wolf::rank_key)
                .filter(|f| f.is_finite())
                .collect();
            let mean_fitness = if finite.is_empty() {
                f64::NEG_INFINITY
            } else {
                finite.iter().sum::<f64>() / finite.len() as f64
            };

            history.push(IterationRecord {
                iteration: t,
                exploration: a,
                iteration_best,
                mean_fitness,
                best_so_far,
                improved,
                evaluations: results.len(),
            });
            debug!(
                iteration = t,
                a,
                iteration_best,
                best_so_far,
                improved,
                "iteration complete"
            );

            // the positions after the last pass would never be evaluated
            if t + 1 == t_max {
                break;
            }

            let leader_positions: [Position; 3] =
                leaders.as_array().map(|idx| pack[idx].position.clone());
            let leader_refs: [&[f64]; 3] = [
                &leader_positions[0],
                &leader_positions[1],
                &leader_positions[2],
            ];
            for (i, wolf) in pack.iter_mut().enumerate() {
                let next = self.next_position(t, i, &wolf.position, &leader_refs, a);
                wolf.move_to(next);
            }
        }

        status.mark_completed();
        let best = status.best.clone().ok_or(SearchError::NoResult)?;

        if !history.improved_over_initial() {
            warn!(
                run = %self.config.id,
                best_fitness = best.fitness,
                "search finished without improving on the initial pack"
            );
        }
        info!(
            run = %self.config.id,
            best_fitness = best.fitness,
            best_iteration = best.iteration,
            evaluations = status.evaluations,
            config = %best.config,
            "grey wolf search complete"
        );

        Ok(SearchOutcome {
            best,
            history,
            status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objective::FitnessFn;
    use crate::space::{ParameterValue, SearchSpace};
    use crate::state::SearchState;

    fn sphere_space() -> SearchSpace {
        SearchSpace::new()
            .add_float("x", -5.0, 5.0)
            .add_float("y", -5.0, 5.0)
    }

    /// Negated sphere: maximum 0 at the origin.
    fn sphere() -> FitnessFn<impl Fn(&HyperparameterConfig, u64) -> f64 + Sync> {
        FitnessFn(|c: &HyperparameterConfig, _seed: u64| {
            let x = c.get_f64("x").unwrap();
            let y = c.get_f64("y").unwrap();
            -(x * x + y * y)
        })
    }

    fn config(pack: usize, iterations: usize, seed: u64) -> GwoConfig {
        GwoConfig::new("sphere", sphere_space())
            .with_pack_size(pack)
            .with_max_iterations(iterations)
            .with_seed(seed)
            .with_concurrency(1)
    }

    #[test]
    fn exploration_coefficient_decays_linearly() {
        let t_max = 50;
        assert_eq!(exploration_coefficient(0, t_max, 2.0), 2.0);
        let mut previous = f64::INFINITY;
        for t in 0..t_max {
            let a = exploration_coefficient(t, t_max, 2.0);
            assert!(a <= previous);
            assert!(a > 0.0);
            previous = a;
        }
        assert!((exploration_coefficient(t_max - 1, t_max, 2.0) - 2.0 / 50.0).abs() < 1e-12);
        assert_eq!(exploration_coefficient(t_max, t_max, 2.0), 0.0);
        assert_eq!(exploration_coefficient(3, 0, 2.0), 0.0);
    }

    #[test]
    fn leader_pull_is_the_leader_when_a_vanishes() {
        // A = 0 whenever a = 0, so every pull lands exactly on the leader.
        assert_eq!(leader_pull(1.5, -3.0, 0.0, 0.9, 0.2), 1.5);
        // A = a(2r1 - 1) = 0 at r1 = 0.5 regardless of a.
        assert_eq!(leader_pull(1.5, -3.0, 2.0, 0.5, 0.7), 1.5);
        // r1 = 0, a = 1: A = -1, C = 2·r2 = 1, D = |1.5 + 3| = 4.5
        assert!((leader_pull(1.5, -3.0, 1.0, 0.0, 0.5) - 6.0).abs() < 1e-12);
    }

    #[test]
    fn leaders_are_derived_from_ranking() {
        let mut pack: Vec<Wolf> = (0..5).map(|i| Wolf::new(vec![i as f64])).collect();
        for (wolf, f) in pack.iter_mut().zip([0.1, 0.9, 0.5, f64::NAN, 0.7]) {
            wolf.set_fitness(f);
        }
        let leaders = select_leaders(&pack).unwrap();
        assert_eq!(leaders.as_array(), [1, 4, 2]);

        // reranking after a change picks new roles
        pack[0].set_fitness(2.0);
        assert_eq!(select_leaders(&pack).unwrap().alpha, 0);
        assert_eq!(rank_pack(&pack).last(), Some(&3));
    }

    #[test]
    fn small_packs_repeat_the_alpha() {
        let mut pack = vec![Wolf::new(vec![0.0]), Wolf::new(vec![1.0])];
        pack[0].set_fitness(0.2);
        pack[1].set_fitness(0.4);
        let leaders = select_leaders(&pack).unwrap();
        assert_eq!(leaders.as_array(), [1, 0, 1]);
        assert!(select_leaders(&[]).is_none());
    }

    #[test]
    fn moving_a_wolf_clears_its_fitness() {
        let mut wolf = Wolf::new(vec![0.0]);
        assert!(wolf.needs_evaluation());
        wolf.set_fitness(1.0);
        assert_eq!(wolf.fitness(), Some(1.0));
        wolf.move_to(vec![0.5]);
        assert!(wolf.needs_evaluation());
    }

    #[test]
    fn search_converges_toward_the_optimum() {
        let optimizer = GreyWolfOptimizer::new(config(12, 40, 3)).unwrap();
        let outcome = optimizer.run(&sphere()).unwrap();

        assert!(outcome.best_fitness() > -1e-2, "best {}", outcome.best_fitness());
        assert_eq!(outcome.history.len(), 40);
        assert_eq!(outcome.status.state, SearchState::Completed);
        // first pass evaluates the whole pack, later passes every moved wolf
        assert_eq!(outcome.status.evaluations, 12 * 40);
    }

    #[test]
    fn best_ever_never_regresses() {
        let optimizer = GreyWolfOptimizer::new(config(6, 25, 11)).unwrap();
        let outcome = optimizer.run(&sphere()).unwrap();
        let curve = outcome.history.best_curve();
        for pair in curve.windows(2) {
            assert!(pair[1] >= pair[0]);
        }
        for record in &outcome.history.records {
            assert!(record.best_so_far >= record.iteration_best);
        }
        assert_eq!(*curve.last().unwrap(), outcome.best_fitness());
    }

    #[test]
    fn same_seed_gives_identical_results() {
        let a = GreyWolfOptimizer::new(config(8, 15, 99)).unwrap().run(&sphere()).unwrap();
        let b = GreyWolfOptimizer::new(config(8, 15, 99).with_concurrency(4))
            .unwrap()
            .run(&sphere())
            .unwrap();
        assert_eq!(a.best.position, b.best.position);
        assert_eq!(a.best_fitness(), b.best_fitness());
        assert_eq!(a.history.best_curve(), b.history.best_curve());

        let c = GreyWolfOptimizer::new(config(8, 15, 100)).unwrap().run(&sphere()).unwrap();
        assert_ne!(a.best.position, c.best.position);
    }

    #[test]
    fn tied_pack_reports_initial_value_without_phantom_improvement() {
        let flat = FitnessFn(|_: &HyperparameterConfig, _: u64| 0.25);
        let optimizer = GreyWolfOptimizer::new(config(3, 1, 5)).unwrap();
        let outcome = optimizer.run(&flat).unwrap();

        assert_eq!(outcome.best_fitness(), 0.25);
        assert_eq!(outcome.best.iteration, 0);
        assert_eq!(outcome.history.len(), 1);
        assert_eq!(outcome.history.records[0].best_so_far, 0.25);
        assert!(!outcome.history.improved_over_initial());
        assert_eq!(outcome.status.evaluations, 3);
    }

    #[test]
    fn seeded_optimum_is_never_discarded() {
        let origin = HyperparameterConfig::new()
            .with("x", ParameterValue::Float(0.0))
            .with("y", ParameterValue::Float(0.0));
        let optimizer =
            GreyWolfOptimizer::new(config(5, 10, 21).with_initial_config(origin.clone())).unwrap();
        let outcome = optimizer.run(&sphere()).unwrap();

        assert_eq!(outcome.best_fitness(), 0.0);
        assert_eq!(outcome.best.iteration, 0);
        assert_eq!(outcome.best.wolf_index, 0);
        assert_eq!(outcome.best_config(), &origin);
        for record in &outcome.history.records {
            assert!(record.iteration_best <= 0.0);
            assert_eq!(record.best_so_far, 0.0);
        }
    }

    #[test]
    fn degenerate_axis_stays_fixed_through_updates() {
        let space = SearchSpace::new()
            .add_float("pinned", 0.0, 0.0)
            .add_float("free", -1.0, 1.0);
        let fitness = FitnessFn(|c: &HyperparameterConfig, _: u64| {
            assert_eq!(c.get("pinned"), Some(&ParameterValue::Float(0.0)));
            -c.get_f64("free").unwrap().abs()
        });
        let cfg = GwoConfig::new("pinned", space)
            .with_pack_size(4)
            .with_max_iterations(8)
            .with_concurrency(1);
        let outcome = GreyWolfOptimizer::new(cfg).unwrap().run(&fitness).unwrap();
        assert_eq!(outcome.best.position[0], 0.0);
    }

    #[test]
    fn next_position_stays_within_bounds() {
        let optimizer = GreyWolfOptimizer::new(config(4, 10, 1)).unwrap();
        let alpha = [5.0, -5.0];
        let beta = [4.9, -4.9];
        let delta = [-5.0, 5.0];
        for wolf in 0..20 {
            let leaders: [&[f64]; 3] = [&alpha[..], &beta[..], &delta[..]];
            let next = optimizer.next_position(0, wolf, &[0.0, 0.0], &leaders, 2.0);
            assert!(next.iter().all(|x| (-5.0..=5.0).contains(x)));
        }
    }

    #[test]
    fn evaluation_seeds_differ_per_wolf() {
        let seen = std::sync::Mutex::new(Vec::new());
        let recorder = FitnessFn(|_: &HyperparameterConfig, seed: u64| {
            seen.lock().unwrap().push(seed);
            0.0
        });
        GreyWolfOptimizer::new(config(4, 3, 8)).unwrap().run(&recorder).unwrap();
        let mut seeds = seen.into_inner().unwrap();
        let total = seeds.len();
        seeds.sort_unstable();
        seeds.dedup();
        assert_eq!(seeds.len(), total);
    }

    #[test]
    fn invalid_config_is_rejected_before_running() {
        assert!(GreyWolfOptimizer::new(config(0, 5, 1)).is_err());
        let bad_space = GwoConfig::new("bad", SearchSpace::new().add_float("x", 2.0, 1.0));
        assert!(GreyWolfOptimizer::new(bad_space).is_err());
    }
}
