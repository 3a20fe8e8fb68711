//! Serving-time risk labels.

use serde::{Deserialize, Serialize};

/// Scores at or below this are `Low`.
pub const HIGH_RISK_THRESHOLD: f64 = 0.5;
/// Scores above this are `Critical`.
pub const CRITICAL_RISK_THRESHOLD: f64 = 0.8;

/// Discrete risk category derived from a laundering probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    High,
    Critical,
}

impl RiskLevel {
    /// `score <= 0.5` is LOW, `0.5 < score <= 0.8` is HIGH, anything above is
    /// CRITICAL.
    pub fn from_score(score: f64) -> Self {
        if score > CRITICAL_RISK_THRESHOLD {
            RiskLevel::Critical
        } else if score > HIGH_RISK_THRESHOLD {
            RiskLevel::High
        } else {
            RiskLevel::Low
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "LOW"),
            RiskLevel::High => write!(f, "HIGH"),
            RiskLevel::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Response body returned for one scored transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub is_laundering: u8,
    pub risk_score: f64,
    pub risk_level: RiskLevel,
}

impl Prediction {
    pub fn from_score(score: f64) -> Self {
        let score = score.clamp(0.0, 1.0);
        Self {
            is_laundering: u8::from(score > HIGH_RISK_THRESHOLD),
            risk_score: (score * 10_000.0).round() / 10_000.0,
            risk_level: RiskLevel::from_score(score),
        }
    }
}
