//! Turns an untyped JSON payload into a [`PredictionRequest`].
//!
//! Validation runs in two passes. The first checks presence and type of every
//! field and collects all problems at once. The second runs the content rules
//! declared on [`PredictionRequest`] (non-empty categorical fields) and only
//! happens once the record could be built. Categorical membership is left to
//! the pipeline's encoder.

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use validator::Validate;

use crate::models::{PredictionRequest, FEATURE_COLUMNS, WIRE_FIELDS};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldIssue {
    pub field: String,
    pub reason: String,
}

impl FieldIssue {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Payload rejected before it reaches the prediction service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Body is not JSON at all (syntax, content type, size).
    #[error("Malformed request body: {0}")]
    Malformed(String),

    /// Body is JSON but does not describe a car.
    #[error("Invalid request fields: {}", describe(.0))]
    Fields(Vec<FieldIssue>),
}

fn describe(issues: &[FieldIssue]) -> String {
    issues
        .iter()
        .map(|i| format!("{} ({})", i.field, i.reason))
        .collect::<Vec<_>>()
        .join(", ")
}

impl ValidationError {
    pub fn fields(&self) -> Vec<&str> {
        match self {
            ValidationError::Fields(issues) => issues.iter().map(|i| i.field.as_str()).collect(),
            ValidationError::Malformed(_) => Vec::new(),
        }
    }
}

pub struct RequestValidator;

impl RequestValidator {
    pub fn validate(payload: &Value) -> Result<PredictionRequest, ValidationError> {
        let object = payload.as_object().ok_or_else(|| {
            ValidationError::Fields(vec![FieldIssue::new(
                "body",
                format!("expected a JSON object, got {}", kind(payload)),
            )])
        })?;

        let mut issues = Vec::new();
        let [mileage, engine_v, year, brand, body, engine_type, registration, model] = WIRE_FIELDS;

        let mileage = check(&mut issues, mileage, field(object, mileage).and_then(float));
        let engine_volume = check(&mut issues, engine_v, field(object, engine_v).and_then(float));
        let year = check(&mut issues, year, field(object, year).and_then(integer));
        let brand = check(&mut issues, brand, field(object, brand).and_then(string));
        let body = check(&mut issues, body, field(object, body).and_then(string));
        let engine_type = check(&mut issues, engine_type, field(object, engine_type).and_then(string));
        let registration = check(&mut issues, registration, field(object, registration).and_then(string));
        let model = check(&mut issues, model, field(object, model).and_then(string));

        let request = match (
            mileage,
            engine_volume,
            year,
            brand,
            body,
            engine_type,
            registration,
            model,
        ) {
            (
                Some(mileage),
                Some(engine_volume),
                Some(year),
                Some(brand),
                Some(body),
                Some(engine_type),
                Some(registration),
                Some(model),
            ) => PredictionRequest {
                mileage,
                engine_volume,
                year,
                brand,
                body,
                engine_type,
                registration,
                model,
            },
            _ => return Err(ValidationError::Fields(issues)),
        };

        if let Err(errors) = request.validate() {
            for (name, errs) in errors.field_errors() {
                let reason = errs
                    .iter()
                    .map(|e| match &e.message {
                        Some(message) => message.to_string(),
                        None => e.code.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join("; ");
                issues.push(FieldIssue::new(wire_name(&name.to_string()), reason));
            }
            issues.sort_by_key(|i| position(&i.field));
            return Err(ValidationError::Fields(issues));
        }

        Ok(request)
    }
}

fn check<T>(issues: &mut Vec<FieldIssue>, name: &str, parsed: Result<T, String>) -> Option<T> {
    match parsed {
        Ok(value) => Some(value),
        Err(reason) => {
            issues.push(FieldIssue::new(name, reason));
            None
        }
    }
}

fn field<'a>(object: &'a Map<String, Value>, name: &str) -> Result<&'a Value, String> {
    object.get(name).ok_or_else(|| "field required".to_string())
}

fn float(value: &Value) -> Result<f64, String> {
    let parsed = match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| format!("{} is not representable as a float", n)),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("{:?} is not a valid number", s)),
        other => Err(format!("expected a number, got {}", kind(other))),
    }?;
    if parsed.is_finite() {
        Ok(parsed)
    } else {
        Err("must be a finite number".to_string())
    }
}

fn integer(value: &Value) -> Result<i32, String> {
    let wide = match value {
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => i,
            (None, Some(f)) if f.is_finite() && f.fract() == 0.0 => f as i64,
            _ => return Err(format!("expected an integer, got {}", n)),
        },
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| format!("{:?} is not a valid integer", s))?,
        other => return Err(format!("expected an integer, got {}", kind(other))),
    };
    i32::try_from(wide).map_err(|_| format!("{} is out of range", wide))
}

fn string(value: &Value) -> Result<String, String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        other => Err(format!("expected a string, got {}", kind(other))),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Map a struct field or column name onto its wire name.
fn wire_name(name: &str) -> String {
    let rust_names = [
        "mileage",
        "engine_volume",
        "year",
        "brand",
        "body",
        "engine_type",
        "registration",
        "model",
    ];
    rust_names
        .iter()
        .chain(FEATURE_COLUMNS.iter())
        .chain(WIRE_FIELDS.iter())
        .position(|n| *n == name)
        .map(|idx| WIRE_FIELDS[idx % WIRE_FIELDS.len()].to_string())
        .unwrap_or_else(|| name.to_string())
}

fn position(field: &str) -> usize {
    WIRE_FIELDS
        .iter()
        .position(|n| *n == field)
        .unwrap_or(WIRE_FIELDS.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload() -> Value {
        json!({
            "Mileage": 120000,
            "EngineV": 2.0,
            "Year": 2012,
            "Brand": "Toyota",
            "Body": "sedan",
            "Engine_Type": "Petrol",
            "Registration": "yes",
            "Model": "Camry"
        })
    }

    #[test]
    fn builds_request_from_valid_payload() {
        let req = RequestValidator::validate(&payload()).unwrap();
        assert_eq!(req, crate::testing::camry());
    }

    #[test]
    fn matches_serde_deserialization() {
        let via_validator = RequestValidator::validate(&payload()).unwrap();
        let via_serde: PredictionRequest = serde_json::from_value(payload()).unwrap();
        assert_eq!(via_validator.to_frame().unwrap(), via_serde.to_frame().unwrap());
    }

    #[test]
    fn reports_every_missing_field() {
        let mut body = payload();
        let obj = body.as_object_mut().unwrap();
        obj.remove("Year");
        obj.remove("Brand");

        let err = RequestValidator::validate(&body).unwrap_err();
        assert_eq!(err.fields(), vec!["Year", "Brand"]);
        assert!(err.to_string().contains("Year (field required)"));
    }

    #[test]
    fn rejects_mistyped_fields() {
        let mut body = payload();
        body["Mileage"] = json!("a lot");
        body["Year"] = json!(2012.5);
        body["Model"] = json!(42);
        body["Registration"] = Value::Null;

        let err = RequestValidator::validate(&body).unwrap_err();
        assert_eq!(err.fields(), vec!["Mileage", "Year", "Registration", "Model"]);
    }

    #[test]
    fn coerces_numeric_strings_and_whole_floats() {
        let mut body = payload();
        body["Mileage"] = json!("120000");
        body["Year"] = json!(2012.0);
        body["Extra"] = json!(true);

        let req = RequestValidator::validate(&body).unwrap();
        assert_eq!(req.mileage, 120000.0);
        assert_eq!(req.year, 2012);
    }

    #[test]
    fn empty_categorical_is_rejected_but_empty_model_is_not() {
        let mut body = payload();
        body["Model"] = json!("");
        assert!(RequestValidator::validate(&body).is_ok());

        body["Engine_Type"] = json!("");
        body["Brand"] = json!("");
        let err = RequestValidator::validate(&body).unwrap_err();
        assert_eq!(err.fields(), vec!["Brand", "Engine_Type"]);
    }

    #[test]
    fn categorical_membership_is_not_checked() {
        let mut body = payload();
        body["Brand"] = json!("Lada");
        assert_eq!(RequestValidator::validate(&body).unwrap().brand, "Lada");
    }

    #[test]
    fn non_object_body_is_rejected() {
        let err = RequestValidator::validate(&json!([1, 2])).unwrap_err();
        assert_eq!(err.fields(), vec!["body"]);
    }

    #[test]
    fn out_of_range_year_is_rejected() {
        let mut body = payload();
        body["Year"] = json!(1u64 << 40);
        assert_eq!(RequestValidator::validate(&body).unwrap_err().fields(), vec!["Year"]);
    }
}
