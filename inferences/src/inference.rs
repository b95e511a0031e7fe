use std::path::{Path, PathBuf};

use tract_onnx::prelude::*;

use crate::error::{StageError, StartupError};

type Plan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Regressor exported as an ONNX graph, executed with tract.
pub struct OnnxRegressor {
    plan: Plan,
    n_features: usize,
    path: PathBuf,
}

impl OnnxRegressor {
    pub fn load<P: AsRef<Path>>(model_path: P, n_features: usize) -> Result<Self, StartupError> {
        let path = model_path.as_ref().to_path_buf();
        let plan = Self::optimize(&path, n_features).map_err(|e| StartupError::Onnx {
            path: path.clone(),
            message: format!("{:#}", e),
        })?;

        Ok(Self {
            plan,
            n_features,
            path,
        })
    }

    fn optimize(path: &Path, n_features: usize) -> TractResult<Plan> {
        tract_onnx::onnx()
            .model_for_path(path)?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, n_features)),
            )?
            .into_optimized()?
            .into_runnable()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Score one row. The graph is compiled for a `[1, n_features]` f32 input.
    pub fn predict_row(&self, row: &[f64]) -> Result<f64, StageError> {
        let input: Vec<f32> = row.iter().map(|v| *v as f32).collect();
        let tensor = Tensor::from_shape(&[1, self.n_features], &input)
            .map_err(|e| StageError::Shape(e.to_string()))?;
        let outputs = self
            .plan
            .run(tvec!(tensor.into()))
            .map_err(|e| StageError::Runtime(format!("{:#}", e)))?;

        let first = outputs
            .first()
            .ok_or_else(|| StageError::Runtime("graph returned no outputs".to_string()))?;
        let view = first
            .to_array_view::<f32>()
            .map_err(|e| StageError::Runtime(e.to_string()))?;
        let value = view
            .iter()
            .next()
            .copied()
            .ok_or_else(|| StageError::Runtime("graph returned an empty tensor".to_string()))?;

        Ok(value as f64)
    }
}

impl std::fmt::Debug for OnnxRegressor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxRegressor")
            .field("path", &self.path)
            .field("n_features", &self.n_features)
            .finish()
    }
}
