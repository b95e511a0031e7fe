use std::collections::BTreeMap;

use ndarray::ArrayView2;
use serde::Serialize;

use crate::error::StageError;
use crate::types::{Encoded, FeatureFrame};

/// The opaque two-stage scoring artifact. Implementations are immutable once
/// built and are shared across request threads.
pub trait ScoringArtifact: Send + Sync {
    /// Encode raw records into the model's feature space.
    fn preprocess(&self, frame: &FeatureFrame) -> Result<Encoded, StageError>;

    /// Produce one value per row of an already densified matrix.
    fn score(&self, features: ArrayView2<'_, f64>) -> Result<Vec<f64>, StageError>;

    fn info(&self) -> ArtifactInfo;
}

/// Descriptive metadata exposed through the model-info endpoint.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ArtifactInfo {
    pub version: String,
    pub capabilities: Vec<String>,
    pub feature_columns: Vec<String>,
    pub model_kind: String,
    pub n_features: usize,
    pub known_categories: BTreeMap<String, Vec<String>>,
}
