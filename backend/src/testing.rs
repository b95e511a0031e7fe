//! Shared fixtures for the unit tests.

use inferences::{ArtifactInfo, CsrMatrix, Encoded, FeatureFrame, Pipeline, ScoringArtifact, StageError};
use ndarray::{Array2, ArrayView2};

use crate::models::PredictionRequest;

pub const SHIPPED_PIPELINE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/models/car_price_pipeline.json");

pub fn camry() -> PredictionRequest {
    PredictionRequest {
        mileage: 120000.0,
        engine_volume: 2.0,
        year: 2012,
        brand: "Toyota".into(),
        body: "sedan".into(),
        engine_type: "Petrol".into(),
        registration: "yes".into(),
        model: "Camry".into(),
    }
}

pub fn shipped_pipeline() -> Pipeline {
    Pipeline::load(SHIPPED_PIPELINE).unwrap()
}

enum Behaviour {
    Scores(Vec<f64>),
    FailScore,
    MalformedSparse,
    Panic,
}

/// Artifact with scripted behaviour for exercising each failure path.
pub struct StubArtifact(Behaviour);

impl StubArtifact {
    pub fn scores(values: Vec<f64>) -> Self {
        Self(Behaviour::Scores(values))
    }

    pub fn failing_score() -> Self {
        Self(Behaviour::FailScore)
    }

    pub fn malformed_sparse() -> Self {
        Self(Behaviour::MalformedSparse)
    }

    pub fn panicking() -> Self {
        Self(Behaviour::Panic)
    }
}

impl ScoringArtifact for StubArtifact {
    fn preprocess(&self, frame: &FeatureFrame) -> Result<Encoded, StageError> {
        match self.0 {
            Behaviour::MalformedSparse => Ok(Encoded::Sparse(CsrMatrix {
                n_rows: 1,
                n_cols: 1,
                indptr: vec![0, 1],
                indices: vec![3],
                data: vec![1.0],
            })),
            _ => Ok(Encoded::Dense(Array2::zeros((frame.n_rows(), 1)))),
        }
    }

    fn score(&self, _features: ArrayView2<'_, f64>) -> Result<Vec<f64>, StageError> {
        match &self.0 {
            Behaviour::Scores(values) => Ok(values.clone()),
            Behaviour::FailScore => Err(StageError::Runtime("model blew up".into())),
            Behaviour::Panic => panic!("scorer exploded"),
            Behaviour::MalformedSparse => Ok(vec![1.0]),
        }
    }

    fn info(&self) -> ArtifactInfo {
        ArtifactInfo {
            version: "stub".into(),
            ..Default::default()
        }
    }
}
