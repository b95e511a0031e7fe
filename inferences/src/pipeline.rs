//! Loading of the serialized pipeline and the named-step check.
//!
//! The artifact is a JSON document of the form
//!
//! ```json
//! { "version": "1.0.0", "steps": { "preprocessor": { ... }, "model": { ... } } }
//! ```
//!
//! Both named steps must be present. Anything else under `steps` is ignored.

use std::path::Path;

use log::{info, warn};
use ndarray::ArrayView2;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::artifact::{ArtifactInfo, ScoringArtifact};
use crate::error::{StageError, StartupError};
use crate::preprocess::ColumnTransformer;
use crate::regressor::{Regressor, RegressorSpec};
use crate::types::{Encoded, FeatureFrame};

pub const PREPROCESSOR: &str = "preprocessor";
pub const MODEL: &str = "model";

#[derive(Deserialize)]
struct PipelineDocument {
    #[serde(default)]
    version: String,
    steps: Map<String, Value>,
}

#[derive(Debug)]
pub struct Pipeline {
    version: String,
    preprocessor: ColumnTransformer,
    model: Regressor,
}

impl Pipeline {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, StartupError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| StartupError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

        let pipeline = Self::from_json_str(&raw, base_dir)?;
        info!(
            "Loaded pipeline {} from {} ({} model, {} features)",
            pipeline.version,
            path.display(),
            pipeline.model.kind(),
            pipeline.model.n_features()
        );
        Ok(pipeline)
    }

    pub fn from_json_str(raw: &str, base_dir: &Path) -> Result<Self, StartupError> {
        let document: PipelineDocument = serde_json::from_str(raw)?;
        let mut steps = document.steps;

        let preprocessor = steps
            .remove(PREPROCESSOR)
            .ok_or(StartupError::MissingCapability(PREPROCESSOR))?;
        let model = steps
            .remove(MODEL)
            .ok_or(StartupError::MissingCapability(MODEL))?;
        for extra in steps.keys() {
            warn!("Ignoring unknown pipeline step '{}'", extra);
        }

        let preprocessor: ColumnTransformer = serde_json::from_value(preprocessor)
            .map_err(|e| StartupError::invalid(PREPROCESSOR, e.to_string()))?;
        preprocessor
            .check()
            .map_err(|e| StartupError::invalid(PREPROCESSOR, e))?;

        let spec: RegressorSpec =
            serde_json::from_value(model).map_err(|e| StartupError::invalid(MODEL, e.to_string()))?;
        let model = Regressor::from_spec(spec, base_dir)?;

        if preprocessor.n_features_out() != model.n_features() {
            return Err(StartupError::WidthMismatch {
                produced: preprocessor.n_features_out(),
                expected: model.n_features(),
            });
        }

        Ok(Self {
            version: document.version,
            preprocessor,
            model,
        })
    }
}

impl ScoringArtifact for Pipeline {
    fn preprocess(&self, frame: &FeatureFrame) -> Result<Encoded, StageError> {
        self.preprocessor.transform(frame)
    }

    fn score(&self, features: ArrayView2<'_, f64>) -> Result<Vec<f64>, StageError> {
        self.model.predict(features)
    }

    fn info(&self) -> ArtifactInfo {
        ArtifactInfo {
            version: self.version.clone(),
            capabilities: vec![PREPROCESSOR.to_string(), MODEL.to_string()],
            feature_columns: self.preprocessor.feature_names_in.clone(),
            model_kind: self.model.kind().to_string(),
            n_features: self.model.n_features(),
            known_categories: self.preprocessor.known_categories(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document() -> Value {
        json!({
            "version": "test",
            "steps": {
                "preprocessor": {
                    "kind": "column_transformer",
                    "feature_names_in": ["Mileage", "Brand"],
                    "transformers": [
                        {"kind": "passthrough", "name": "num", "columns": ["Mileage"]},
                        {"kind": "one_hot", "name": "cat", "columns": ["Brand"],
                         "categories": [["Audi", "BMW"]]}
                    ]
                },
                "model": {"kind": "linear", "intercept": 100.0, "coefficients": [2.0, 10.0, 20.0]},
                "selector": {}
            }
        })
    }

    fn load(doc: &Value) -> Result<Pipeline, StartupError> {
        Pipeline::from_json_str(&doc.to_string(), Path::new("."))
    }

    #[test]
    fn runs_both_stages() {
        let pipeline = load(&document()).unwrap();
        let frame = FeatureFrame::single_row(
            &["Mileage", "Brand"],
            vec![5.0.into(), "BMW".into()],
        )
        .unwrap();

        let dense = pipeline.preprocess(&frame).unwrap().densify().unwrap();
        assert_eq!(pipeline.score(dense.view()).unwrap(), vec![130.0]);

        let info = pipeline.info();
        assert_eq!(info.capabilities, vec!["preprocessor", "model"]);
        assert_eq!(info.n_features, 3);
        assert_eq!(info.known_categories["Brand"], vec!["Audi", "BMW"]);
    }

    #[test]
    fn missing_named_steps_fail_fast() {
        for step in [PREPROCESSOR, MODEL] {
            let mut doc = document();
            doc["steps"].as_object_mut().unwrap().remove(step);
            match load(&doc).unwrap_err() {
                StartupError::MissingCapability(name) => assert_eq!(name, step),
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[test]
    fn width_mismatch_is_rejected() {
        let mut doc = document();
        doc["steps"]["model"]["coefficients"] = json!([1.0, 2.0]);
        assert!(matches!(
            load(&doc).unwrap_err(),
            StartupError::WidthMismatch {
                produced: 3,
                expected: 2
            }
        ));
    }

    #[test]
    fn unreadable_file_reports_path() {
        let err = Pipeline::load("no/such/pipeline.json").unwrap_err();
        assert!(err.to_string().contains("no/such/pipeline.json"));
    }

    #[test]
    fn malformed_step_is_invalid_capability() {
        let mut doc = document();
        doc["steps"]["model"] = json!({"kind": "random_forest"});
        assert!(matches!(
            load(&doc).unwrap_err(),
            StartupError::InvalidCapability { name: "model", .. }
        ));
    }

    #[test]
    fn preprocessor_kind_is_checked() {
        for kind in [json!("feature_union"), Value::Null] {
            let mut doc = document();
            let step = doc["steps"]["preprocessor"].as_object_mut().unwrap();
            if kind.is_null() {
                step.remove("kind");
            } else {
                step.insert("kind".to_string(), kind);
            }
            assert!(matches!(
                load(&doc).unwrap_err(),
                StartupError::InvalidCapability { name: "preprocessor", .. }
            ));
        }
    }
}
