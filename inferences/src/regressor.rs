//! The "model" step: maps a dense feature matrix to one value per row.

use std::path::{Path, PathBuf};

use ndarray::ArrayView2;
use serde::Deserialize;

use crate::error::{StageError, StartupError};
use crate::inference::OnnxRegressor;

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
        #[serde(default = "default_true")]
        default_left: bool,
    },
    Leaf {
        leaf: f64,
    },
}

/// One regression tree stored as a flat node array, root at index 0.
#[derive(Debug, Clone, Deserialize)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

impl Tree {
    fn check(&self, n_features: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            if let Node::Split {
                feature, left, right, ..
            } = node
            {
                if *feature >= n_features {
                    return Err(format!("node {} splits on feature {} of {}", idx, feature, n_features));
                }
                // Children must point forward so traversal always terminates.
                for child in [*left, *right] {
                    if child <= idx || child >= self.nodes.len() {
                        return Err(format!("node {} has invalid child {}", idx, child));
                    }
                }
            }
        }
        Ok(())
    }

    fn predict(&self, features: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { leaf } => return *leaf,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    default_left,
                } => {
                    let value = features.get(*feature).copied().unwrap_or(f64::NAN);
                    idx = if value.is_nan() {
                        if *default_left {
                            *left
                        } else {
                            *right
                        }
                    } else if value < *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }
}

/// Serialized form of the model step.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RegressorSpec {
    Linear {
        intercept: f64,
        coefficients: Vec<f64>,
    },
    TreeEnsemble {
        base_score: f64,
        n_features: usize,
        trees: Vec<Tree>,
    },
    Onnx {
        path: PathBuf,
        n_features: usize,
    },
}

#[derive(Debug)]
pub enum Regressor {
    Linear {
        intercept: f64,
        coefficients: Vec<f64>,
    },
    TreeEnsemble {
        base_score: f64,
        n_features: usize,
        trees: Vec<Tree>,
    },
    Onnx(OnnxRegressor),
}

impl Regressor {
    /// Validate a spec and build the runnable regressor. Relative ONNX paths
    /// resolve against `base_dir`.
    pub fn from_spec(spec: RegressorSpec, base_dir: &Path) -> Result<Self, StartupError> {
        match spec {
            RegressorSpec::Linear {
                intercept,
                coefficients,
            } => {
                if coefficients.is_empty() {
                    return Err(StartupError::invalid("model", "linear model has no coefficients"));
                }
                Ok(Regressor::Linear {
                    intercept,
                    coefficients,
                })
            }
            RegressorSpec::TreeEnsemble {
                base_score,
                n_features,
                trees,
            } => {
                for (i, tree) in trees.iter().enumerate() {
                    tree.check(n_features)
                        .map_err(|e| StartupError::invalid("model", format!("tree {}: {}", i, e)))?;
                }
                Ok(Regressor::TreeEnsemble {
                    base_score,
                    n_features,
                    trees,
                })
            }
            RegressorSpec::Onnx { path, n_features } => {
                let path = if path.is_relative() {
                    base_dir.join(path)
                } else {
                    path
                };
                Ok(Regressor::Onnx(OnnxRegressor::load(path, n_features)?))
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Regressor::Linear { .. } => "linear",
            Regressor::TreeEnsemble { .. } => "tree_ensemble",
            Regressor::Onnx(_) => "onnx",
        }
    }

    pub fn n_features(&self) -> usize {
        match self {
            Regressor::Linear { coefficients, .. } => coefficients.len(),
            Regressor::TreeEnsemble { n_features, .. } => *n_features,
            Regressor::Onnx(onnx) => onnx.n_features(),
        }
    }

    pub fn predict(&self, features: ArrayView2<'_, f64>) -> Result<Vec<f64>, StageError> {
        if features.ncols() != self.n_features() {
            return Err(StageError::FeatureCount {
                expected: self.n_features(),
                actual: features.ncols(),
            });
        }

        features
            .rows()
            .into_iter()
            .map(|row| {
                let row = row.to_vec();
                self.predict_row(&row)
            })
            .collect()
    }

    fn predict_row(&self, row: &[f64]) -> Result<f64, StageError> {
        match self {
            Regressor::Linear {
                intercept,
                coefficients,
            } => Ok(intercept + coefficients.iter().zip(row).map(|(w, x)| w * x).sum::<f64>()),
            Regressor::TreeEnsemble {
                base_score, trees, ..
            } => Ok(base_score + trees.iter().map(|t| t.predict(row)).sum::<f64>()),
            Regressor::Onnx(onnx) => onnx.predict_row(row),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn stump() -> RegressorSpec {
        serde_json::from_value(serde_json::json!({
            "kind": "tree_ensemble",
            "base_score": 10.0,
            "n_features": 2,
            "trees": [
                {"nodes": [
                    {"feature": 0, "threshold": 0.5, "left": 1, "right": 2, "default_left": false},
                    {"leaf": 1.0},
                    {"leaf": 5.0}
                ]},
                {"nodes": [{"leaf": 0.25}]}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn tree_ensemble_sums_leaves() {
        let model = Regressor::from_spec(stump(), Path::new(".")).unwrap();
        assert_eq!(model.kind(), "tree_ensemble");

        let x = Array2::from_shape_vec((3, 2), vec![0.0, 9.0, 1.0, 9.0, f64::NAN, 0.0]).unwrap();
        assert_eq!(model.predict(x.view()).unwrap(), vec![11.25, 15.25, 15.25]);
    }

    #[test]
    fn linear_model_checks_width() {
        let spec = RegressorSpec::Linear {
            intercept: 1.0,
            coefficients: vec![2.0, 3.0],
        };
        let model = Regressor::from_spec(spec, Path::new(".")).unwrap();

        let x = Array2::from_shape_vec((1, 2), vec![1.0, 1.0]).unwrap();
        assert_eq!(model.predict(x.view()).unwrap(), vec![6.0]);

        let wide = Array2::<f64>::zeros((1, 3));
        assert_eq!(
            model.predict(wide.view()).unwrap_err(),
            StageError::FeatureCount {
                expected: 2,
                actual: 3
            }
        );
    }

    #[test]
    fn cyclic_tree_is_rejected_at_load() {
        let spec: RegressorSpec = serde_json::from_value(serde_json::json!({
            "kind": "tree_ensemble",
            "base_score": 0.0,
            "n_features": 1,
            "trees": [{"nodes": [
                {"feature": 0, "threshold": 0.0, "left": 0, "right": 1},
                {"leaf": 1.0}
            ]}]
        }))
        .unwrap();
        let err = Regressor::from_spec(spec, Path::new(".")).unwrap_err();
        assert!(err.to_string().contains("invalid child 0"));
    }
}
