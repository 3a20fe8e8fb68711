//! Search space definitions and the continuous hyperparameter encoding.
//!
//! Every parameter owns one real-valued axis. A [`Position`] is a point in
//! that box; [`SearchSpace::decode`] turns it into the typed
//! [`HyperparameterConfig`] the trainer consumes, and [`SearchSpace::encode`]
//! goes the other way to seed a wolf from a known configuration.

use aw_types::{AwResult, SearchError};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One point in the search box, one real per parameter axis.
pub type Position = Vec<f64>;

/// A single parameter dimension in the search space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDef {
    /// Hyperparameter name as understood by the trainer (e.g. "max_depth").
    pub name: String,
    /// The kind of search range.
    pub kind: ParameterKind,
}

/// Describes the semantic type and bounds of a parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterKind {
    /// Continuous range [low, high].
    FloatRange { low: f64, high: f64 },
    /// Integer range [low, high] inclusive.
    IntRange { low: i64, high: i64 },
    /// Continuous range searched in log-space.
    LogUniform { low: f64, high: f64 },
    /// Ordinal-encoded categorical choices.
    Choice { values: Vec<serde_json::Value> },
}

/// A concrete parameter value produced by decoding a position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Int(i64),
    Float(f64),
    Json(serde_json::Value),
}

impl std::fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Float(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Json(v) => write!(f, "{v}"),
        }
    }
}

impl ParameterValue {
    /// Numeric view of the value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            Self::Json(v) => v.as_f64(),
        }
    }
}

/// Clamp a single coordinate into `[low, high]`. NaN collapses to `low`.
pub fn clamp_axis(x: f64, low: f64, high: f64) -> f64 {
    if x.is_nan() {
        low
    } else {
        x.max(low).min(high)
    }
}

/// Clamp every axis of `position` into its bounds, in place.
pub fn clamp_position(position: &mut [f64], bounds: &[(f64, f64)]) {
    for (x, &(low, high)) in position.iter_mut().zip(bounds) {
        *x = clamp_axis(*x, low, high);
    }
}

/// Map `x` in `[low, high]` to one of `bins` equal-width bins.
///
/// The upper bound lands in the last bin; a degenerate range always maps to
/// bin 0.
pub fn bin_index(x: f64, low: f64, high: f64, bins: usize) -> usize {
    if bins <= 1 || high <= low {
        return 0;
    }
    let t = (clamp_axis(x, low, high) - low) / (high - low);
    let idx = (t * bins as f64).floor();
    (idx.max(0.0) as usize).min(bins - 1)
}

impl ParameterKind {
    /// Bounds of the real axis backing this parameter.
    pub fn axis_bounds(&self) -> (f64, f64) {
        match self {
            ParameterKind::FloatRange { low, high } => (*low, *high),
            ParameterKind::IntRange { low, high } => (*low as f64, *high as f64),
            ParameterKind::LogUniform { low, high } => (low.ln(), high.ln()),
            ParameterKind::Choice { .. } => (0.0, 1.0),
        }
    }

    /// Decode one axis coordinate into a typed value. Never leaves the range.
    pub fn decode_axis(&self, x: f64) -> ParameterValue {
        let (lo, hi) = self.axis_bounds();
        let x = clamp_axis(x, lo, hi);
        match self {
            ParameterKind::FloatRange { .. } => ParameterValue::Float(x),
            ParameterKind::IntRange { low, high } => {
                ParameterValue::Int((x.round() as i64).max(*low).min(*high))
            }
            ParameterKind::LogUniform { low, high } => {
                ParameterValue::Float(clamp_axis(x.exp(), *low, *high))
            }
            ParameterKind::Choice { values } => {
                let idx = bin_index(x, lo, hi, values.len());
                ParameterValue::Json(values.get(idx).cloned().unwrap_or(serde_json::Value::Null))
            }
        }
    }

    /// Encode a typed value back onto the axis. Categorical values land in the
    /// centre of their bin.
    pub fn encode_value(&self, value: &ParameterValue) -> Option<f64> {
        let (lo, hi) = self.axis_bounds();
        match self {
            ParameterKind::FloatRange { .. } | ParameterKind::IntRange { .. } => {
                value.as_f64().map(|v| clamp_axis(v, lo, hi))
            }
            ParameterKind::LogUniform { .. } => value
                .as_f64()
                .filter(|v| *v > 0.0)
                .map(|v| clamp_axis(v.ln(), lo, hi)),
            ParameterKind::Choice { values } => {
                let target = match value {
                    ParameterValue::Json(v) => v.clone(),
                    ParameterValue::Int(v) => serde_json::Value::from(*v),
                    ParameterValue::Float(v) => serde_json::Value::from(*v),
                };
                let idx = values.iter().position(|v| *v == target)?;
                Some(lo + (hi - lo) * (idx as f64 + 0.5) / values.len() as f64)
            }
        }
    }

    fn validate(&self, name: &str) -> AwResult<()> {
        let invalid = |message: &str| SearchError::InvalidParameter {
            parameter: name.to_string(),
            message: message.to_string(),
        };
        match self {
            ParameterKind::FloatRange { low, high } => {
                if !low.is_finite() || !high.is_finite() {
                    return Err(invalid("bounds must be finite").into());
                }
                if low > high {
                    return Err(SearchError::InvalidBounds {
                        parameter: name.to_string(),
                        low: *low,
                        high: *high,
                    }
                    .into());
                }
            }
            ParameterKind::IntRange { low, high } => {
                if low > high {
                    return Err(SearchError::InvalidBounds {
                        parameter: name.to_string(),
                        low: *low as f64,
                        high: *high as f64,
                    }
                    .into());
                }
            }
            ParameterKind::LogUniform { low, high } => {
                if !(*low > 0.0) || !high.is_finite() {
                    return Err(invalid("log-uniform bounds must be positive and finite").into());
                }
                if low > high {
                    return Err(SearchError::InvalidBounds {
                        parameter: name.to_string(),
                        low: *low,
                        high: *high,
                    }
                    .into());
                }
            }
            ParameterKind::Choice { values } => {
                if values.is_empty() {
                    return Err(invalid("choice needs at least one value").into());
                }
            }
        }
        Ok(())
    }
}

/// A decoded, typed hyperparameter set keyed by parameter name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HyperparameterConfig {
    values: BTreeMap<String, ParameterValue>,
}

impl HyperparameterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: ParameterValue) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: ParameterValue) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&ParameterValue> {
        self.values.get(name)
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.values.get(name).and_then(ParameterValue::as_f64)
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        match self.values.get(name)? {
            ParameterValue::Int(v) => Some(*v),
            ParameterValue::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            ParameterValue::Json(v) => v.as_i64(),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParameterValue)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl std::fmt::Display for HyperparameterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.values.iter().map(|(k, v)| format!("{k}={v}")).collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

/// The full search space: an ordered list of parameter definitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSpace {
    pub parameters: Vec<ParameterDef>,
}

impl SearchSpace {
    pub fn new() -> Self {
        Self {
            parameters: Vec::new(),
        }
    }

    pub fn add_float(mut self, name: impl Into<String>, low: f64, high: f64) -> Self {
        self.parameters.push(ParameterDef {
            name: name.into(),
            kind: ParameterKind::FloatRange { low, high },
        });
        self
    }

    pub fn add_int(mut self, name: impl Into<String>, low: i64, high: i64) -> Self {
        self.parameters.push(ParameterDef {
            name: name.into(),
            kind: ParameterKind::IntRange { low, high },
        });
        self
    }

    pub fn add_log_uniform(mut self, name: impl Into<String>, low: f64, high: f64) -> Self {
        self.parameters.push(ParameterDef {
            name: name.into(),
            kind: ParameterKind::LogUniform { low, high },
        });
        self
    }

    pub fn add_choice(mut self, name: impl Into<String>, values: Vec<serde_json::Value>) -> Self {
        self.parameters.push(ParameterDef {
            name: name.into(),
            kind: ParameterKind::Choice { values },
        });
        self
    }

    /// Number of axes D.
    pub fn dimensions(&self) -> usize {
        self.parameters.len()
    }

    /// Axis bounds in parameter order.
    pub fn bounds(&self) -> Vec<(f64, f64)> {
        self.parameters.iter().map(|p| p.kind.axis_bounds()).collect()
    }

    /// Reject empty spaces, inverted bounds and unusable parameter kinds.
    pub fn validate(&self) -> AwResult<()> {
        if self.parameters.is_empty() {
            return Err(SearchError::EmptySpace.into());
        }
        for (i, param) in self.parameters.iter().enumerate() {
            if self.parameters[..i].iter().any(|p| p.name == param.name) {
                return Err(SearchError::InvalidParameter {
                    parameter: param.name.clone(),
                    message: "duplicate parameter name".to_string(),
                }
                .into());
            }
            param.kind.validate(&param.name)?;
        }
        Ok(())
    }

    /// Decode a position into a typed configuration.
    pub fn decode(&self, position: &[f64]) -> AwResult<HyperparameterConfig> {
        self.check_dimensions(position.len())?;
        let mut config = HyperparameterConfig::new();
        for (param, &x) in self.parameters.iter().zip(position) {
            config.insert(param.name.clone(), param.kind.decode_axis(x));
        }
        Ok(config)
    }

    /// Encode a configuration into a position. Every parameter of the space
    /// must be present in `config`.
    pub fn encode(&self, config: &HyperparameterConfig) -> AwResult<Position> {
        self.parameters
            .iter()
            .map(|param| {
                let value = config.get(&param.name).ok_or_else(|| SearchError::InvalidParameter {
                    parameter: param.name.clone(),
                    message: "missing from configuration".to_string(),
                })?;
                param.kind.encode_value(value).ok_or_else(|| {
                    SearchError::InvalidParameter {
                        parameter: param.name.clone(),
                        message: format!("value {value} cannot be encoded"),
                    }
                    .into()
                })
            })
            .collect()
    }

    /// Draw a position uniformly within the axis bounds.
    pub fn sample_position<R: Rng>(&self, rng: &mut R) -> Position {
        self.bounds()
            .into_iter()
            .map(|(low, high)| {
                if high > low {
                    rng.gen_range(low..=high)
                } else {
                    low
                }
            })
            .collect()
    }

    fn check_dimensions(&self, actual: usize) -> AwResult<()> {
        if actual != self.dimensions() {
            return Err(SearchError::DimensionMismatch {
                expected: self.dimensions(),
                actual,
            }
            .into());
        }
        Ok(())
    }
}

impl Default for SearchSpace {
    fn default() -> Self {
        Self::new()
    }
}
