//! Second-order gradient boosting with logistic loss.
//!
//! Each round fits a regression tree to the gradient `p − y` and hessian
//! `p(1 − p)` of the log loss. Leaf weights are regularized:
//!
//! ```text
//! w* = −soft(G, alpha) / (H + lambda)
//! gain = ½·[GL²/(HL+λ) + GR²/(HR+λ) − G²/(H+λ)]
//! ```
//!
//! A split is kept only when its gain exceeds `gamma` and both children carry
//! at least `min_child_weight` hessian mass.

use aw_optimizer::{HyperparameterConfig, ParameterValue};
use aw_types::{AwResult, TrainingError};
use ndarray::{Array1, Array2, ArrayView1};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

const HESSIAN_FLOOR: f64 = 1e-7;
const PROBABILITY_EPS: f64 = 1e-7;

/// Training parameters for [`GradientBoostedClassifier`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoosterParams {
    /// Learning rate applied to every tree's output.
    pub eta: f64,
    pub max_depth: usize,
    /// Row fraction sampled per tree, in (0, 1].
    pub subsample: f64,
    /// Column fraction sampled per tree, in (0, 1].
    pub colsample_bytree: f64,
    /// L1 regularization on leaf weights.
    pub alpha: f64,
    /// L2 regularization on leaf weights.
    pub lambda: f64,
    pub min_child_weight: f64,
    /// Minimum gain required to split.
    pub gamma: f64,
    pub n_estimators: usize,
    pub seed: u64,
}

impl Default for BoosterParams {
    fn default() -> Self {
        Self {
            eta: 0.3,
            max_depth: 6,
            subsample: 1.0,
            colsample_bytree: 1.0,
            alpha: 0.0,
            lambda: 1.0,
            min_child_weight: 1.0,
            gamma: 0.0,
            n_estimators: 100,
            seed: 42,
        }
    }
}

fn invalid(parameter: &str, message: impl Into<String>) -> TrainingError {
    TrainingError::InvalidParameter {
        parameter: parameter.to_string(),
        message: message.into(),
    }
}

fn as_count(parameter: &str, value: &ParameterValue) -> Result<usize, TrainingError> {
    let raw = match value {
        ParameterValue::Int(v) => *v as f64,
        other => other
            .as_f64()
            .ok_or_else(|| invalid(parameter, format!("expected a number, got {other}")))?,
    };
    if !raw.is_finite() || raw < 0.0 {
        return Err(invalid(parameter, format!("expected a non-negative integer, got {raw}")));
    }
    Ok(raw.round() as usize)
}

impl BoosterParams {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n;
        self
    }

    /// Overlay a decoded hyperparameter set onto `base`.
    ///
    /// Unknown parameter names are rejected.
    pub fn from_config(config: &HyperparameterConfig, base: &BoosterParams) -> AwResult<Self> {
        let mut params = base.clone();
        for (name, value) in config.iter() {
            let float = || {
                value
                    .as_f64()
                    .ok_or_else(|| invalid(name, format!("expected a number, got {value}")))
            };
            match name.as_str() {
                "eta" | "learning_rate" => params.eta = float()?,
                "max_depth" => params.max_depth = as_count(name, value)?,
                "subsample" => params.subsample = float()?,
                "colsample_bytree" => params.colsample_bytree = float()?,
                "alpha" | "reg_alpha" => params.alpha = float()?,
                "lambda" | "reg_lambda" => params.lambda = float()?,
                "min_child_weight" => params.min_child_weight = float()?,
                "gamma" => params.gamma = float()?,
                "n_estimators" => params.n_estimators = as_count(name, value)?,
                _ => return Err(invalid(name, "unknown booster parameter").into()),
            }
        }
        Ok(params)
    }

    pub fn validate(&self) -> AwResult<()> {
        if !(self.eta > 0.0) || !self.eta.is_finite() {
            return Err(invalid("eta", format!("must be positive, got {}", self.eta)).into());
        }
        if self.max_depth == 0 {
            return Err(invalid("max_depth", "must be at least 1").into());
        }
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            return Err(invalid("subsample", format!("must be in (0, 1], got {}", self.subsample)).into());
        }
        if !(self.colsample_bytree > 0.0 && self.colsample_bytree <= 1.0) {
            return Err(invalid(
                "colsample_bytree",
                format!("must be in (0, 1], got {}", self.colsample_bytree),
            )
            .into());
        }
        for (name, value) in [
            ("alpha", self.alpha),
            ("lambda", self.lambda),
            ("min_child_weight", self.min_child_weight),
            ("gamma", self.gamma),
        ] {
            if !(value >= 0.0) || !value.is_finite() {
                return Err(invalid(name, format!("must be non-negative, got {value}")).into());
            }
        }
        if self.n_estimators == 0 {
            return Err(invalid("n_estimators", "must be at least 1").into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum TreeNode {
    Leaf {
        weight: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

impl TreeNode {
    fn predict(&self, sample: ArrayView1<'_, f64>) -> f64 {
        match self {
            TreeNode::Leaf { weight } => *weight,
            TreeNode::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if sample[*feature] <= *threshold {
                    left.predict(sample)
                } else {
                    right.predict(sample)
                }
            }
        }
    }

    fn count_splits(&self, counts: &mut [f64]) {
        if let TreeNode::Split {
            feature,
            left,
            right,
            ..
        } = self
        {
            if let Some(c) = counts.get_mut(*feature) {
                *c += 1.0;
            }
            left.count_splits(counts);
            right.count_splits(counts);
        }
    }
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

struct GradientPair<'a> {
    grad: &'a Array1<f64>,
    hess: &'a Array1<f64>,
}

fn leaf_weight(g_sum: f64, h_sum: f64, params: &BoosterParams) -> f64 {
    let g = if g_sum > params.alpha {
        g_sum - params.alpha
    } else if g_sum < -params.alpha {
        g_sum + params.alpha
    } else {
        return 0.0;
    };
    -g / (h_sum + params.lambda)
}

fn best_split_for_feature(
    x: &Array2<f64>,
    gh: &GradientPair<'_>,
    rows: &[usize],
    feature: usize,
    params: &BoosterParams,
) -> Option<SplitCandidate> {
    let mut sorted = rows.to_vec();
    sorted.sort_by(|&a, &b| x[[a, feature]].total_cmp(&x[[b, feature]]));

    let g_total: f64 = sorted.iter().map(|&i| gh.grad[i]).sum();
    let h_total: f64 = sorted.iter().map(|&i| gh.hess[i]).sum();
    let parent = g_total * g_total / (h_total + params.lambda);

    let mut g_left = 0.0;
    let mut h_left = 0.0;
    let mut best: Option<SplitCandidate> = None;

    for (pos, &idx) in sorted.iter().enumerate().take(sorted.len().saturating_sub(1)) {
        g_left += gh.grad[idx];
        h_left += gh.hess[idx];

        let value = x[[idx, feature]];
        let next = x[[sorted[pos + 1], feature]];
        if next - value < 1e-12 {
            continue;
        }

        let g_right = g_total - g_left;
        let h_right = h_total - h_left;
        if h_left < params.min_child_weight || h_right < params.min_child_weight {
            continue;
        }

        let gain = 0.5
            * (g_left * g_left / (h_left + params.lambda)
                + g_right * g_right / (h_right + params.lambda)
                - parent);
        if best.as_ref().map_or(true, |b| gain > b.gain) {
            best = Some(SplitCandidate {
                feature,
                threshold: (value + next) / 2.0,
                gain,
            });
        }
    }
    best
}

fn build_tree(
    x: &Array2<f64>,
    gh: &GradientPair<'_>,
    rows: &[usize],
    features: &[usize],
    depth: usize,
    params: &BoosterParams,
) -> TreeNode {
    let g_sum: f64 = rows.iter().map(|&i| gh.grad[i]).sum();
    let h_sum: f64 = rows.iter().map(|&i| gh.hess[i]).sum();
    let weight = leaf_weight(g_sum, h_sum, params);

    if depth >= params.max_depth || rows.len() < 2 || h_sum < params.min_child_weight {
        return TreeNode::Leaf { weight };
    }

    // lowest feature index wins ties so the result is independent of scheduling
    let best = features
        .par_iter()
        .filter_map(|&f| best_split_for_feature(x, gh, rows, f, params))
        .max_by(|a, b| a.gain.total_cmp(&b.gain).then(b.feature.cmp(&a.feature)));

    match best {
        Some(split) if split.gain > params.gamma => {
            let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
                .iter()
                .partition(|&&i| x[[i, split.feature]] <= split.threshold);
            if left_rows.is_empty() || right_rows.is_empty() {
                return TreeNode::Leaf { weight };
            }
            TreeNode::Split {
                feature: split.feature,
                threshold: split.threshold,
                left: Box::new(build_tree(x, gh, &left_rows, features, depth + 1, params)),
                right: Box::new(build_tree(x, gh, &right_rows, features, depth + 1, params)),
            }
        }
        _ => TreeNode::Leaf { weight },
    }
}

fn subsample(rng: &mut ChaCha8Rng, n: usize, ratio: f64) -> Vec<usize> {
    if ratio >= 1.0 {
        return (0..n).collect();
    }
    let k = ((n as f64) * ratio).ceil().max(1.0) as usize;
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);
    indices.truncate(k);
    indices.sort_unstable();
    indices
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Binary gradient-boosted tree classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostedClassifier {
    params: BoosterParams,
    trees: Vec<TreeNode>,
    /// Prior log-odds of the positive class.
    base_score: f64,
    n_features: usize,
}

impl GradientBoostedClassifier {
    pub fn new(params: BoosterParams) -> Self {
        Self {
            params,
            trees: Vec::new(),
            base_score: 0.0,
            n_features: 0,
        }
    }

    pub fn params(&self) -> &BoosterParams {
        &self.params
    }

    pub fn is_fitted(&self) -> bool {
        self.n_features > 0
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> AwResult<()> {
        self.params.validate()?;
        let (n_samples, n_features) = x.dim();
        if n_samples == 0 || n_features == 0 {
            return Err(aw_types::DataError::Empty.into());
        }
        if y.len() != n_samples {
            return Err(aw_types::DataError::ShapeMismatch {
                rows: n_samples,
                labels: y.len(),
            }
            .into());
        }

        let p = y.mean().unwrap_or(0.5).clamp(PROBABILITY_EPS, 1.0 - PROBABILITY_EPS);
        let base_score = (p / (1.0 - p)).ln();
        let mut raw = Array1::from_elem(n_samples, base_score);
        let mut rng = ChaCha8Rng::seed_from_u64(self.params.seed);
        let mut trees = Vec::with_capacity(self.params.n_estimators);

        for round in 0..self.params.n_estimators {
            let probs = raw.mapv(sigmoid);
            let grad: Array1<f64> = &probs - y;
            let hess = probs.mapv(|p| (p * (1.0 - p)).max(HESSIAN_FLOOR));
            let gh = GradientPair {
                grad: &grad,
                hess: &hess,
            };

            let rows = subsample(&mut rng, n_samples, self.params.subsample);
            let columns = subsample(&mut rng, n_features, self.params.colsample_bytree);
            let tree = build_tree(x, &gh, &rows, &columns, 0, &self.params);

            // every row moves, sampled or not, so the next gradients are exact
            for (i, sample) in x.outer_iter().enumerate() {
                raw[i] += self.params.eta * tree.predict(sample);
            }
            if raw.iter().any(|v| !v.is_finite()) {
                return Err(TrainingError::Diverged {
                    message: format!("non-finite margin after round {round}"),
                }
                .into());
            }
            trees.push(tree);
        }

        debug!(
            rows = n_samples,
            features = n_features,
            trees = trees.len(),
            "booster fitted"
        );

        self.trees = trees;
        self.base_score = base_score;
        self.n_features = n_features;
        Ok(())
    }

    fn margin(&self, sample: ArrayView1<'_, f64>) -> f64 {
        self.trees
            .iter()
            .fold(self.base_score, |acc, tree| acc + self.params.eta * tree.predict(sample))
    }

    fn check_width(&self, width: usize) -> AwResult<()> {
        if !self.is_fitted() {
            return Err(TrainingError::NotFitted.into());
        }
        if width != self.n_features {
            return Err(TrainingError::FeatureCountMismatch {
                expected: self.n_features,
                actual: width,
            }
            .into());
        }
        Ok(())
    }

    /// Probability of the positive class for every row.
    pub fn predict_proba(&self, x: &Array2<f64>) -> AwResult<Array1<f64>> {
        self.check_width(x.ncols())?;
        Ok(x.outer_iter().map(|row| sigmoid(self.margin(row))).collect())
    }

    /// Probability of the positive class for a single feature vector.
    pub fn predict_proba_row(&self, features: &[f64]) -> AwResult<f64> {
        self.check_width(features.len())?;
        Ok(sigmoid(self.margin(ArrayView1::from(features))))
    }

    /// Hard labels at the given probability threshold.
    pub fn predict(&self, x: &Array2<f64>, threshold: f64) -> AwResult<Array1<f64>> {
        Ok(self
            .predict_proba(x)?
            .mapv(|p| if p >= threshold { 1.0 } else { 0.0 }))
    }

    /// Split-count feature importances, normalized to sum to one.
    pub fn feature_importances(&self) -> Option<Vec<f64>> {
        if !self.is_fitted() {
            return None;
        }
        let mut counts = vec![0.0; self.n_features];
        for tree in &self.trees {
            tree.count_splits(&mut counts);
        }
        let total: f64 = counts.iter().sum();
        if total > 0.0 {
            counts.iter_mut().for_each(|c| *c /= total);
        }
        Some(counts)
    }
}
