//! Raw cells to numeric features.
//!
//! Each column gets one [`ColumnEncoding`], decided when fitting on the
//! training table and replayed unchanged at serving time.

use aw_types::{AwResult, DataError, Dataset, LABEL_COLUMN};
use chrono::{DateTime, NaiveDateTime, Utc};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

pub const TIMESTAMP_COLUMN: &str = "Timestamp";
pub const PAYMENT_FORMAT_COLUMN: &str = "Payment Format";

const TIMESTAMP_FORMATS: [&str; 3] = ["%Y/%m/%d %H:%M", "%Y-%m-%d %H:%M:%S", "%Y/%m/%d %H:%M:%S"];

/// Ordinal code for a payment format. Unknown formats map to 0.
pub fn payment_format_code(value: &str) -> f64 {
    match value {
        "Cash" => 1.0,
        "Cheque" => 2.0,
        "ACH" => 3.0,
        "Credit Card" => 4.0,
        "Wire" => 5.0,
        "Bitcoin" => 6.0,
        "Reinvestment" => 7.0,
        _ => 0.0,
    }
}

/// Parse a timestamp cell into unix seconds.
pub fn parse_timestamp(value: &str) -> AwResult<f64> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.timestamp() as f64);
    }
    for format in TIMESTAMP_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc).timestamp() as f64);
        }
    }
    if let Ok(seconds) = value.parse::<f64>() {
        if seconds.is_finite() {
            return Ok(seconds);
        }
    }
    Err(DataError::ParseError {
        message: format!("Could not parse timestamp: {value}"),
    }
    .into())
}

fn parse_number(column: &str, value: &str) -> AwResult<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| {
            DataError::ParseError {
                message: format!("Could not parse {column} value '{value}' as a number"),
            }
            .into()
        })
}

fn parse_label(value: &str, row: usize) -> AwResult<f64> {
    match value.trim() {
        "0" | "0.0" => Ok(0.0),
        "1" | "1.0" => Ok(1.0),
        other => Err(DataError::InvalidLabel {
            value: other.parse().unwrap_or(f64::NAN),
            row,
        }
        .into()),
    }
}

/// How one raw column becomes a number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnEncoding {
    Numeric,
    /// Parsed to unix seconds.
    Timestamp,
    /// Fixed ordinal map, unknown → 0.
    PaymentFormat,
    /// Index into the sorted distinct training values.
    Label { classes: Vec<String> },
}

/// A named column and its encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnEncoder {
    pub name: String,
    pub encoding: ColumnEncoding,
}

impl ColumnEncoder {
    /// Pick an encoding for a column from its training values.
    pub fn fit(name: &str, values: &[&str]) -> Self {
        let encoding = if name == TIMESTAMP_COLUMN {
            ColumnEncoding::Timestamp
        } else if name == PAYMENT_FORMAT_COLUMN {
            ColumnEncoding::PaymentFormat
        } else if values.iter().all(|v| v.trim().parse::<f64>().is_ok()) {
            ColumnEncoding::Numeric
        } else {
            let mut classes: Vec<String> = values.iter().map(|v| v.to_string()).collect();
            classes.sort();
            classes.dedup();
            ColumnEncoding::Label { classes }
        };
        Self {
            name: name.to_string(),
            encoding,
        }
    }

    /// Encode one training cell. Unseen label values are an error here.
    pub fn encode(&self, value: &str) -> AwResult<f64> {
        match &self.encoding {
            ColumnEncoding::Numeric => parse_number(&self.name, value),
            ColumnEncoding::Timestamp => parse_timestamp(value),
            ColumnEncoding::PaymentFormat => Ok(payment_format_code(value.trim())),
            ColumnEncoding::Label { classes } => classes
                .binary_search_by(|c| c.as_str().cmp(value))
                .map(|idx| idx as f64)
                .map_err(|_| {
                    DataError::ParseError {
                        message: format!("Unseen value '{value}' in column {}", self.name),
                    }
                    .into()
                }),
        }
    }

    /// Encode a serving-time cell: unseen label values fall back to 0.
    pub fn encode_lenient(&self, value: &str) -> AwResult<f64> {
        match &self.encoding {
            ColumnEncoding::Label { classes } => Ok(classes
                .binary_search_by(|c| c.as_str().cmp(value))
                .map(|idx| idx as f64)
                .unwrap_or(0.0)),
            _ => self.encode(value),
        }
    }
}

/// Ordered encoders for every feature column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureEncoders {
    pub columns: Vec<ColumnEncoder>,
}

impl FeatureEncoders {
    /// Fit encoders for every column except the label.
    pub fn fit(table: &crate::RawTable) -> AwResult<Self> {
        let mut columns = Vec::new();
        for name in table.headers.iter().filter(|h| h.as_str() != LABEL_COLUMN) {
            let values = table.column(name)?;
            columns.push(ColumnEncoder::fit(name, &values));
        }
        if columns.is_empty() {
            return Err(DataError::InsufficientData {
                message: "table has no feature columns".to_string(),
            }
            .into());
        }
        Ok(Self { columns })
    }

    pub fn feature_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&ColumnEncoder> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Encode a labelled table into a dataset in encoder column order.
    pub fn transform(&self, table: &crate::RawTable) -> AwResult<Dataset> {
        if table.is_empty() {
            return Err(DataError::Empty.into());
        }
        let label_idx = table.column_index(LABEL_COLUMN).ok_or_else(|| DataError::ColumnNotFound {
            column: LABEL_COLUMN.to_string(),
        })?;
        let indices = self
            .columns
            .iter()
            .map(|c| {
                table.column_index(&c.name).ok_or_else(|| DataError::ColumnNotFound {
                    column: c.name.clone(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut features = Array2::zeros((table.n_rows(), self.columns.len()));
        let mut labels = Array1::zeros(table.n_rows());
        for r in 0..table.n_rows() {
            for (c, (encoder, &idx)) in self.columns.iter().zip(&indices).enumerate() {
                features[[r, c]] = encoder.encode(table.cell(r, idx)?)?;
            }
            labels[r] = parse_label(table.cell(r, label_idx)?, r)?;
        }

        Dataset::new(features, labels, self.feature_names())
    }

    /// Fit on `table` and encode it in one step.
    pub fn fit_transform(table: &crate::RawTable) -> AwResult<(Self, Dataset)> {
        let encoders = Self::fit(table)?;
        let dataset = encoders.transform(table)?;
        tracing::info!(
            rows = dataset.n_samples(),
            features = dataset.n_features(),
            "encoded transaction table"
        );
        Ok((encoders, dataset))
    }
}
