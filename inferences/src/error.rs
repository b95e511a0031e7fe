use std::path::PathBuf;

use thiserror::Error;

/// Failure raised by one of the artifact's stages for a given input.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StageError {
    /// Frame columns differ from the columns the preprocessor was fitted on.
    #[error("feature names mismatch: expected {expected:?}, got {actual:?}")]
    ColumnMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error("column '{0}' is missing from the input")]
    MissingColumn(String),

    #[error("found unknown category {value:?} in column '{column}' during transform")]
    UnknownCategory { column: String, value: String },

    #[error("column '{column}' expects a numeric value, got {value}")]
    MalformedNumeric { column: String, value: String },

    #[error("model expects {expected} features, got {actual}")]
    FeatureCount { expected: usize, actual: usize },

    #[error("shape error: {0}")]
    Shape(String),

    #[error("model runtime error: {0}")]
    Runtime(String),
}

/// Failure while loading the pipeline artifact. Always fatal.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("failed to read artifact {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("artifact is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("missing {0} in pipeline")]
    MissingCapability(&'static str),

    #[error("invalid '{name}' step: {message}")]
    InvalidCapability { name: &'static str, message: String },

    #[error("preprocessor yields {produced} features but model expects {expected}")]
    WidthMismatch { produced: usize, expected: usize },

    #[error("failed to load ONNX graph {path}: {message}")]
    Onnx { path: PathBuf, message: String },
}

impl StartupError {
    pub fn invalid(name: &'static str, message: impl Into<String>) -> Self {
        StartupError::InvalidCapability {
            name,
            message: message.into(),
        }
    }
}
