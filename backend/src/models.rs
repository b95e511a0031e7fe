use inferences::{Cell, FeatureFrame, StageError};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::PredictionResult;

/// Column order the pipeline was fitted on. Reordering does not fail, it
/// silently produces wrong prices, so this is fixed here and not configurable.
pub const FEATURE_COLUMNS: [&str; 8] = [
    "Mileage",
    "EngineV",
    "Year",
    "Brand",
    "Body",
    "Engine Type",
    "Registration",
    "Model",
];

/// Field names on the wire, in the same order as [`FEATURE_COLUMNS`].
pub const WIRE_FIELDS: [&str; 8] = [
    "Mileage",
    "EngineV",
    "Year",
    "Brand",
    "Body",
    "Engine_Type",
    "Registration",
    "Model",
];

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Validate)]
pub struct PredictionRequest {
    #[serde(rename = "Mileage")]
    pub mileage: f64,
    #[serde(rename = "EngineV")]
    pub engine_volume: f64,
    #[serde(rename = "Year")]
    pub year: i32,
    #[serde(rename = "Brand")]
    #[validate(length(min = 1, message = "must not be empty"))]
    pub brand: String,
    #[serde(rename = "Body")]
    #[validate(length(min = 1, message = "must not be empty"))]
    pub body: String,
    #[serde(rename = "Engine_Type")]
    #[validate(length(min = 1, message = "must not be empty"))]
    pub engine_type: String,
    #[serde(rename = "Registration")]
    #[validate(length(min = 1, message = "must not be empty"))]
    pub registration: String,
    #[serde(rename = "Model")]
    pub model: String,
}

impl PredictionRequest {
    pub fn to_row(&self) -> Vec<Cell> {
        vec![
            Cell::from(self.mileage),
            Cell::from(self.engine_volume),
            Cell::from(self.year),
            Cell::from(self.brand.as_str()),
            Cell::from(self.body.as_str()),
            Cell::from(self.engine_type.as_str()),
            Cell::from(self.registration.as_str()),
            Cell::from(self.model.as_str()),
        ]
    }

    /// Single-row frame in [`FEATURE_COLUMNS`] order.
    pub fn to_frame(&self) -> Result<FeatureFrame, StageError> {
        FeatureFrame::single_row(&FEATURE_COLUMNS, self.to_row())
    }
}

/// Body of `POST /predict`. Success and domain failure share status 200;
/// only the key tells them apart.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum PredictionResponse {
    Success { prediction: f64 },
    Failure { error: String },
}

impl From<PredictionResult> for PredictionResponse {
    fn from(result: PredictionResult) -> Self {
        match result {
            Ok(prediction) => PredictionResponse::Success { prediction },
            Err(e) => PredictionResponse::Failure {
                error: e.to_string(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub timestamp: String,
    pub execution_time_ms: Option<u64>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
            execution_time_ms: None,
        }
    }

    pub fn error(message: &str) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error: Some(message.to_string()),
            timestamp: chrono::Utc::now().to_rfc3339(),
            execution_time_ms: None,
        }
    }

    pub fn with_elapsed(mut self, started: std::time::Instant) -> Self {
        self.execution_time_ms = Some(started.elapsed().as_millis() as u64);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PredictionError;
    use crate::testing::camry;

    #[test]
    fn frame_uses_fixed_column_order() {
        let frame = camry().to_frame().unwrap();
        assert_eq!(
            frame.columns(),
            [
                "Mileage",
                "EngineV",
                "Year",
                "Brand",
                "Body",
                "Engine Type",
                "Registration",
                "Model"
            ]
        );
        assert_eq!(
            frame.rows()[0],
            vec![
                Cell::Number(120000.0),
                Cell::Number(2.0),
                Cell::Number(2012.0),
                Cell::from("Toyota"),
                Cell::from("sedan"),
                Cell::from("Petrol"),
                Cell::from("yes"),
                Cell::from("Camry"),
            ]
        );
    }

    #[test]
    fn wire_names_round_trip_through_serde() {
        let json = serde_json::to_value(camry()).unwrap();
        let keys: Vec<&str> = json.as_object().unwrap().keys().map(String::as_str).collect();
        for field in WIRE_FIELDS {
            assert!(keys.contains(&field), "missing {field}");
        }
    }

    #[test]
    fn empty_categorical_fails_validate() {
        let mut req = camry();
        req.model.clear();
        assert!(req.validate().is_ok());

        req.brand.clear();
        assert!(req.validate().is_err());
    }

    #[test]
    fn response_shapes() {
        let ok = serde_json::to_string(&PredictionResponse::from(Ok(27000.5))).unwrap();
        assert_eq!(ok, r#"{"prediction":27000.5}"#);

        let err = PredictionResponse::from(Err(PredictionError::Internal("boom".into())));
        let body = serde_json::to_value(&err).unwrap();
        assert!(body.get("prediction").is_none());
        assert_eq!(body["error"], "Internal Server Error. Details: boom");
    }
}
