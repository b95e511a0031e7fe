//! Per-request failure taxonomy and how each failure is shaped on the wire.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use inferences::StageError;
use serde::Serialize;
use thiserror::Error;

use crate::validation::ValidationError;

pub const STAGE_PREPROCESS: &str = "preprocess";
pub const STAGE_DENSIFY: &str = "densify";
pub const STAGE_SCORE: &str = "score";

pub type PredictionResult = Result<f64, PredictionError>;

/// Failure past validation. Every variant is reported with status 200 and an
/// `{"error": ...}` body.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PredictionError {
    #[error("Preprocessing failed at stage '{stage}'. Error: {message}")]
    Preprocessing { stage: &'static str, message: String },

    #[error("Prediction failed at stage '{stage}'. Error: {message}")]
    Scoring { stage: &'static str, message: String },

    #[error("Internal Server Error. Details: {0}")]
    Internal(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Preprocessing,
    Scoring,
    Internal,
}

impl PredictionError {
    pub fn preprocessing(stage: &'static str, err: impl ToString) -> Self {
        PredictionError::Preprocessing {
            stage,
            message: err.to_string(),
        }
    }

    pub fn scoring(stage: &'static str, err: impl ToString) -> Self {
        PredictionError::Scoring {
            stage,
            message: err.to_string(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            PredictionError::Preprocessing { .. } => ErrorCategory::Preprocessing,
            PredictionError::Scoring { .. } => ErrorCategory::Scoring,
            PredictionError::Internal(_) => ErrorCategory::Internal,
        }
    }

    pub fn stage(&self) -> Option<&'static str> {
        match self {
            PredictionError::Preprocessing { stage, .. } | PredictionError::Scoring { stage, .. } => {
                Some(*stage)
            }
            PredictionError::Internal(_) => None,
        }
    }
}

impl From<(&'static str, StageError)> for PredictionError {
    /// Classify a stage failure by the stage that raised it.
    fn from((stage, err): (&'static str, StageError)) -> Self {
        match stage {
            STAGE_PREPROCESS | STAGE_DENSIFY => PredictionError::preprocessing(stage, err),
            STAGE_SCORE => PredictionError::scoring(stage, err),
            other => PredictionError::Internal(format!("{} failed: {}", other, err)),
        }
    }
}

#[derive(Debug, Serialize)]
struct FieldIssueBody<'a> {
    field: &'a str,
    reason: &'a str,
}

#[derive(Debug, Serialize)]
struct ValidationBody<'a> {
    error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    fields: Vec<FieldIssueBody<'a>>,
}

impl ResponseError for ValidationError {
    fn status_code(&self) -> StatusCode {
        match self {
            ValidationError::Malformed(_) => StatusCode::BAD_REQUEST,
            ValidationError::Fields(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let fields = match self {
            ValidationError::Fields(issues) => issues
                .iter()
                .map(|i| FieldIssueBody {
                    field: &i.field,
                    reason: &i.reason,
                })
                .collect(),
            ValidationError::Malformed(_) => Vec::new(),
        };
        HttpResponse::build(self.status_code()).json(ValidationBody {
            error: self.to_string(),
            fields,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::FieldIssue;

    #[test]
    fn stage_errors_are_classified_by_stage() {
        let unknown = StageError::UnknownCategory {
            column: "Brand".into(),
            value: "Lada".into(),
        };
        let err = PredictionError::from((STAGE_PREPROCESS, unknown));
        assert_eq!(err.category(), ErrorCategory::Preprocessing);
        assert_eq!(err.stage(), Some("preprocess"));
        assert!(err.to_string().contains("unknown category \"Lada\""));

        let err = PredictionError::from((STAGE_DENSIFY, StageError::Shape("bad".into())));
        assert_eq!(err.category(), ErrorCategory::Preprocessing);

        let err = PredictionError::from((STAGE_SCORE, StageError::Runtime("nan".into())));
        assert_eq!(err.category(), ErrorCategory::Scoring);
        assert!(err.to_string().starts_with("Prediction failed at stage 'score'"));
    }

    #[test]
    fn validation_statuses() {
        let malformed = ValidationError::Malformed("EOF while parsing".into());
        assert_eq!(malformed.status_code(), StatusCode::BAD_REQUEST);

        let fields = ValidationError::Fields(vec![FieldIssue::new("Year", "field required")]);
        assert_eq!(fields.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
