//! Imbalance-aware classification metrics.

use aw_types::{AwResult, DataError};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Default probability threshold for hard labels.
pub const DEFAULT_THRESHOLD: f64 = 0.5;

fn check_inputs(y_true: &Array1<f64>, scores: &Array1<f64>) -> AwResult<usize> {
    if y_true.is_empty() {
        return Err(DataError::Empty.into());
    }
    if y_true.len() != scores.len() {
        return Err(DataError::ShapeMismatch {
            rows: scores.len(),
            labels: y_true.len(),
        }
        .into());
    }
    if let Some(row) = scores.iter().position(|s| !s.is_finite()) {
        return Err(DataError::NonFinite {
            column: "score".to_string(),
            row,
        }
        .into());
    }
    Ok(y_true.iter().filter(|&&y| y >= 0.5).count())
}

/// Rows ordered by descending score.
fn descending(scores: &Array1<f64>) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
    order
}

/// Area under the precision-recall curve as the step-wise average precision
/// `Σ (Rₙ − Rₙ₋₁) · Pₙ`, with tied scores forming a single threshold.
pub fn average_precision(y_true: &Array1<f64>, scores: &Array1<f64>) -> AwResult<f64> {
    let positives = check_inputs(y_true, scores)?;
    if positives == 0 {
        return Err(DataError::SingleClass { class: 0 }.into());
    }

    let order = descending(scores);
    let mut tp = 0usize;
    let mut seen = 0usize;
    let mut prev_recall = 0.0;
    let mut ap = 0.0;

    let mut k = 0;
    while k < order.len() {
        let threshold = scores[order[k]];
        while k < order.len() && scores[order[k]] == threshold {
            if y_true[order[k]] >= 0.5 {
                tp += 1;
            }
            seen += 1;
            k += 1;
        }
        let recall = tp as f64 / positives as f64;
        let precision = tp as f64 / seen as f64;
        ap += (recall - prev_recall) * precision;
        prev_recall = recall;
    }
    Ok(ap)
}

/// Area under the ROC curve via the Mann-Whitney rank statistic, with
/// average ranks for ties.
pub fn roc_auc(y_true: &Array1<f64>, scores: &Array1<f64>) -> AwResult<f64> {
    let positives = check_inputs(y_true, scores)?;
    let negatives = y_true.len() - positives;
    if positives == 0 {
        return Err(DataError::SingleClass { class: 0 }.into());
    }
    if negatives == 0 {
        return Err(DataError::SingleClass { class: 1 }.into());
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut rank_sum = 0.0;
    let mut k = 0;
    while k < order.len() {
        let mut end = k;
        while end + 1 < order.len() && scores[order[end + 1]] == scores[order[k]] {
            end += 1;
        }
        // 1-based average rank of the tie group
        let rank = (k + end) as f64 / 2.0 + 1.0;
        for &row in &order[k..=end] {
            if y_true[row] >= 0.5 {
                rank_sum += rank;
            }
        }
        k = end + 1;
    }

    let p = positives as f64;
    let n = negatives as f64;
    Ok((rank_sum - p * (p + 1.0) / 2.0) / (p * n))
}

/// Confusion matrix at a probability threshold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionCounts {
    pub true_positives: usize,
    pub false_positives: usize,
    pub true_negatives: usize,
    pub false_negatives: usize,
}

impl ConfusionCounts {
    pub fn at_threshold(y_true: &Array1<f64>, scores: &Array1<f64>, threshold: f64) -> AwResult<Self> {
        check_inputs(y_true, scores)?;
        let mut counts = Self::default();
        for (&y, &s) in y_true.iter().zip(scores.iter()) {
            match (y >= 0.5, s >= threshold) {
                (true, true) => counts.true_positives += 1,
                (false, true) => counts.false_positives += 1,
                (false, false) => counts.true_negatives += 1,
                (true, false) => counts.false_negatives += 1,
            }
        }
        Ok(counts)
    }

    pub fn precision(&self) -> f64 {
        let flagged = self.true_positives + self.false_positives;
        if flagged == 0 {
            0.0
        } else {
            self.true_positives as f64 / flagged as f64
        }
    }

    pub fn recall(&self) -> f64 {
        let actual = self.true_positives + self.false_negatives;
        if actual == 0 {
            0.0
        } else {
            self.true_positives as f64 / actual as f64
        }
    }

    pub fn f1(&self) -> f64 {
        let (p, r) = (self.precision(), self.recall());
        if p + r == 0.0 {
            0.0
        } else {
            2.0 * p * r / (p + r)
        }
    }
}

pub fn f1_at_threshold(y_true: &Array1<f64>, scores: &Array1<f64>, threshold: f64) -> AwResult<f64> {
    Ok(ConfusionCounts::at_threshold(y_true, scores, threshold)?.f1())
}

/// Metric used to rank configurations during the search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "metric", rename_all = "snake_case")]
pub enum Metric {
    #[default]
    AveragePrecision,
    RocAuc,
    F1 { threshold: f64 },
}

impl Metric {
    pub fn score(&self, y_true: &Array1<f64>, scores: &Array1<f64>) -> AwResult<f64> {
        match self {
            Metric::AveragePrecision => average_precision(y_true, scores),
            Metric::RocAuc => roc_auc(y_true, scores),
            Metric::F1 { threshold } => f1_at_threshold(y_true, scores, *threshold),
        }
    }

    /// Floor of the metric; reported for configurations that fail to train.
    pub fn worst(&self) -> f64 {
        0.0
    }

    pub fn name(&self) -> &'static str {
        match self {
            Metric::AveragePrecision => "average_precision",
            Metric::RocAuc => "roc_auc",
            Metric::F1 { .. } => "f1",
        }
    }
}

/// Holdout summary reported after the final fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub average_precision: f64,
    pub roc_auc: f64,
    pub threshold: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub confusion: ConfusionCounts,
    pub positives: usize,
    pub samples: usize,
}

impl ClassificationReport {
    pub fn compute(y_true: &Array1<f64>, scores: &Array1<f64>, threshold: f64) -> AwResult<Self> {
        let confusion = ConfusionCounts::at_threshold(y_true, scores, threshold)?;
        Ok(Self {
            average_precision: average_precision(y_true, scores)?,
            roc_auc: roc_auc(y_true, scores)?,
            threshold,
            precision: confusion.precision(),
            recall: confusion.recall(),
            f1: confusion.f1(),
            confusion,
            positives: confusion.true_positives + confusion.false_negatives,
            samples: y_true.len(),
        })
    }
}
