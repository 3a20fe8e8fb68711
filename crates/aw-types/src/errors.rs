use thiserror::Error;

/// Main error type for the AmlWolf system
#[derive(Error, Debug)]
pub enum AwError {
    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("Training error: {0}")]
    Training(#[from] TrainingError),

    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    #[error("Artifact error: {0}")]
    Artifact(#[from] ArtifactError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors raised while loading or validating training data.
///
/// All of these are fatal for a search run: they surface before the first
/// iteration starts.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Data source not found: {0}")]
    SourceNotFound(String),

    #[error("Dataset is empty")]
    Empty,

    #[error("Shape mismatch: {rows} feature rows but {labels} labels")]
    ShapeMismatch { rows: usize, labels: usize },

    #[error("Feature name count {names} does not match column count {columns}")]
    FeatureNameMismatch { names: usize, columns: usize },

    #[error("Column not found: {column}")]
    ColumnNotFound { column: String },

    #[error("Non-finite value in column {column} at row {row}")]
    NonFinite { column: String, row: usize },

    #[error("Invalid label {value} at row {row}: labels must be 0 or 1")]
    InvalidLabel { value: f64, row: usize },

    #[error("Degenerate labels: dataset contains only class {class}")]
    SingleClass { class: u8 },

    #[error("Insufficient data: {message}")]
    InsufficientData { message: String },

    #[error("Invalid data format: {message}")]
    InvalidFormat { message: String },

    #[error("Data loading failed: {message}")]
    LoadingFailed { message: String },

    #[error("Data parsing error: {message}")]
    ParseError { message: String },
}

/// Errors raised by the classifier trainer.
///
/// The fitness evaluator recovers from these locally; only the final fit
/// propagates them.
#[derive(Error, Debug)]
pub enum TrainingError {
    #[error("Invalid hyperparameter {parameter}: {message}")]
    InvalidParameter { parameter: String, message: String },

    #[error("Model not fitted")]
    NotFitted,

    #[error("Feature count mismatch: model expects {expected}, got {actual}")]
    FeatureCountMismatch { expected: usize, actual: usize },

    #[error("Training diverged: {message}")]
    Diverged { message: String },
}

/// Errors raised while configuring or running the optimizer.
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Search space is empty")]
    EmptySpace,

    #[error("Invalid bounds for {parameter}: low {low} > high {high}")]
    InvalidBounds { parameter: String, low: f64, high: f64 },

    #[error("Invalid parameter definition for {parameter}: {message}")]
    InvalidParameter { parameter: String, message: String },

    #[error("Position has {actual} axes, search space has {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid search configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Search produced no evaluated wolves")]
    NoResult,
}

/// Errors raised while exporting or loading trained artifacts.
#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("Artifact not found: {path}")]
    NotFound { path: String },

    #[error("Artifact download failed after {attempts} attempts: {url}: {message}")]
    DownloadFailed {
        url: String,
        attempts: u32,
        message: String,
    },

    #[error("Feature order mismatch between {left} and {right}")]
    FeatureOrderMismatch { left: String, right: String },

    #[error("Invalid artifact: {message}")]
    Invalid { message: String },
}

/// Result type alias for AmlWolf operations
pub type AwResult<T> = Result<T, AwError>;

/// Macro for creating internal errors
#[macro_export]
macro_rules! internal_error {
    ($($arg:tt)*) => {
        $crate::AwError::Internal(format!($($arg)*))
    };
}

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::AwError::Config(format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = DataError::ShapeMismatch { rows: 10, labels: 9 };

        assert!(error.to_string().contains("Shape mismatch"));
        assert!(error.to_string().contains("10"));
        assert!(error.to_string().contains("9"));
    }

    #[test]
    fn test_error_conversion() {
        let training_error = TrainingError::InvalidParameter {
            parameter: "eta".to_string(),
            message: "must be positive".to_string(),
        };
        let aw_error: AwError = training_error.into();

        match aw_error {
            AwError::Training(_) => (),
            _ => panic!("Expected Training error"),
        }
    }

    #[test]
    fn test_macros() {
        let internal_err = internal_error!("Something went wrong");
        assert!(matches!(internal_err, AwError::Internal(ref m) if m == "Something went wrong"));
        let config_err = config_error!("Missing required field: {}", "data_path");
        assert!(matches!(config_err, AwError::Config(ref m) if m == "Missing required field: data_path"));
    }
}
