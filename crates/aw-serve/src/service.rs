//! Scoring of raw transactions against a loaded artifact.

use std::time::Instant;

use aw_engine::TrainedArtifact;
use aw_types::{AwResult, DataError, Prediction};
use serde_json::Value;
use tracing::{debug, info};

use crate::fetch::ArtifactFetcher;
use crate::source::ArtifactSource;

/// A transaction as received over the wire, keyed by raw column name.
pub type TransactionRecord = serde_json::Map<String, Value>;

/// A loaded artifact ready to score transactions.
#[derive(Debug)]
pub struct ModelService {
    artifact: TrainedArtifact,
    source: ArtifactSource,
    loaded_at: Instant,
}

fn cell_text(column: &str, value: &Value) -> AwResult<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(DataError::InvalidFormat {
            message: format!("column {column} must be a string or number, got {other}"),
        }
        .into()),
    }
}

impl ModelService {
    /// Wrap an artifact that is already in memory.
    pub fn from_artifact(artifact: TrainedArtifact, source: ArtifactSource) -> AwResult<Self> {
        artifact.check_consistency()?;
        Ok(Self {
            artifact,
            source,
            loaded_at: Instant::now(),
        })
    }

    /// Load from a local directory, or download through `fetcher` first.
    pub async fn load(source: ArtifactSource, fetcher: &ArtifactFetcher) -> AwResult<Self> {
        let dir = match &source {
            ArtifactSource::Local(path) => path.clone(),
            ArtifactSource::Remote(url) => fetcher.fetch(url).await?,
        };
        let artifact = tokio::task::spawn_blocking(move || TrainedArtifact::load(&dir))
            .await
            .map_err(|e| aw_types::internal_error!("artifact loader task failed: {e}"))??;

        info!(
            %source,
            features = artifact.feature_columns.len(),
            trees = artifact.model.n_trees(),
            encoders = artifact.encoders.is_some(),
            "model loaded"
        );
        Self::from_artifact(artifact, source)
    }

    pub fn source(&self) -> &ArtifactSource {
        &self.source
    }

    pub fn feature_columns(&self) -> &[String] {
        &self.artifact.feature_columns
    }

    pub fn uptime_secs(&self) -> u64 {
        self.loaded_at.elapsed().as_secs()
    }

    /// Encode a record into the training feature order. Every feature column
    /// must be present. Categories never seen in training encode as 0.
    pub fn encode_record(&self, record: &TransactionRecord) -> AwResult<Vec<f64>> {
        self.artifact
            .feature_columns
            .iter()
            .map(|column| {
                let value = record.get(column).ok_or_else(|| DataError::ColumnNotFound {
                    column: column.clone(),
                })?;
                let text = cell_text(column, value)?;
                match self.artifact.encoders.as_ref().and_then(|e| e.get(column)) {
                    Some(encoder) => encoder.encode_lenient(&text),
                    None => text
                        .trim()
                        .parse::<f64>()
                        .ok()
                        .filter(|v| v.is_finite())
                        .ok_or_else(|| {
                            DataError::ParseError {
                                message: format!("column {column} value '{text}' is not numeric"),
                            }
                            .into()
                        }),
                }
            })
            .collect()
    }

    /// Laundering probability in [0, 1].
    pub fn score(&self, record: &TransactionRecord) -> AwResult<f64> {
        let features = self.encode_record(record)?;
        let score = self.artifact.score_features(&features)?;
        debug!(score, "scored transaction");
        Ok(score)
    }

    pub fn predict(&self, record: &TransactionRecord) -> AwResult<Prediction> {
        Ok(Prediction::from_score(self.score(record)?))
    }
}
