//! Replay of a fitted column transformer: standard scaling for numeric
//! columns, one-hot encoding for categorical ones.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::StageError;
use crate::types::{Cell, CsrMatrix, Encoded, FeatureFrame};

fn default_sparse_output() -> bool {
    true
}

/// What the one-hot encoder does with a category it was not fitted on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandleUnknown {
    #[default]
    Error,
    Ignore,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transformer {
    StandardScaler {
        name: String,
        columns: Vec<String>,
        mean: Vec<f64>,
        scale: Vec<f64>,
    },
    OneHot {
        name: String,
        columns: Vec<String>,
        categories: Vec<Vec<String>>,
        #[serde(default)]
        handle_unknown: HandleUnknown,
    },
    Passthrough {
        name: String,
        columns: Vec<String>,
    },
}

impl Transformer {
    pub fn name(&self) -> &str {
        match self {
            Transformer::StandardScaler { name, .. }
            | Transformer::OneHot { name, .. }
            | Transformer::Passthrough { name, .. } => name,
        }
    }

    pub fn columns(&self) -> &[String] {
        match self {
            Transformer::StandardScaler { columns, .. }
            | Transformer::OneHot { columns, .. }
            | Transformer::Passthrough { columns, .. } => columns,
        }
    }

    pub fn n_features_out(&self) -> usize {
        match self {
            Transformer::OneHot { categories, .. } => categories.iter().map(Vec::len).sum(),
            other => other.columns().len(),
        }
    }

    fn check(&self) -> Result<(), String> {
        let n = self.columns().len();
        match self {
            Transformer::StandardScaler { mean, scale, .. } => {
                if mean.len() != n || scale.len() != n {
                    return Err(format!(
                        "transformer '{}' has {} columns but {} means and {} scales",
                        self.name(),
                        n,
                        mean.len(),
                        scale.len()
                    ));
                }
            }
            Transformer::OneHot { categories, .. } => {
                if categories.len() != n {
                    return Err(format!(
                        "transformer '{}' has {} columns but {} category lists",
                        self.name(),
                        n,
                        categories.len()
                    ));
                }
            }
            Transformer::Passthrough { .. } => {}
        }
        Ok(())
    }
}

/// Tag carried by the serialized preprocessor step. Only column
/// transformers are understood.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreprocessorKind {
    ColumnTransformer,
}

/// The fitted "preprocessor" step of the pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct ColumnTransformer {
    pub kind: PreprocessorKind,
    pub feature_names_in: Vec<String>,
    pub transformers: Vec<Transformer>,
    #[serde(default = "default_sparse_output")]
    pub sparse_output: bool,
}

impl ColumnTransformer {
    /// Structural checks run once at load time.
    pub fn check(&self) -> Result<(), String> {
        if self.feature_names_in.is_empty() {
            return Err("feature_names_in is empty".to_string());
        }
        if self.transformers.is_empty() {
            return Err("no transformers defined".to_string());
        }
        for transformer in &self.transformers {
            transformer.check()?;
            for column in transformer.columns() {
                if !self.feature_names_in.contains(column) {
                    return Err(format!(
                        "transformer '{}' references unknown column '{}'",
                        transformer.name(),
                        column
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn n_features_out(&self) -> usize {
        self.transformers.iter().map(Transformer::n_features_out).sum()
    }

    pub fn known_categories(&self) -> BTreeMap<String, Vec<String>> {
        let mut known = BTreeMap::new();
        for transformer in &self.transformers {
            if let Transformer::OneHot { columns, categories, .. } = transformer {
                for (column, cats) in columns.iter().zip(categories) {
                    known.insert(column.clone(), cats.clone());
                }
            }
        }
        known
    }

    pub fn transform(&self, frame: &FeatureFrame) -> Result<Encoded, StageError> {
        if frame.columns() != self.feature_names_in.as_slice() {
            return Err(StageError::ColumnMismatch {
                expected: self.feature_names_in.clone(),
                actual: frame.columns().to_vec(),
            });
        }

        let mut matrix = CsrMatrix::empty(self.n_features_out());
        for row in frame.rows() {
            let mut entries = Vec::new();
            let mut offset = 0;
            for transformer in &self.transformers {
                self.encode_into(transformer, frame, row, offset, &mut entries)?;
                offset += transformer.n_features_out();
            }
            matrix.push_row(entries);
        }

        if self.sparse_output {
            Ok(Encoded::Sparse(matrix))
        } else {
            Ok(Encoded::Dense(matrix.to_dense()?))
        }
    }

    fn encode_into(
        &self,
        transformer: &Transformer,
        frame: &FeatureFrame,
        row: &[Cell],
        offset: usize,
        entries: &mut Vec<(usize, f64)>,
    ) -> Result<(), StageError> {
        match transformer {
            Transformer::StandardScaler {
                columns,
                mean,
                scale,
                ..
            } => {
                for (i, column) in columns.iter().enumerate() {
                    let x = numeric(column, cell(frame, row, column)?)?;
                    // A constant training column has zero variance.
                    let s = if scale[i] == 0.0 { 1.0 } else { scale[i] };
                    entries.push((offset + i, (x - mean[i]) / s));
                }
            }
            Transformer::OneHot {
                columns,
                categories,
                handle_unknown,
                ..
            } => {
                let mut base = offset;
                for (column, cats) in columns.iter().zip(categories) {
                    let found = cell(frame, row, column)?;
                    let value = found
                        .as_text()
                        .map(str::to_owned)
                        .unwrap_or_else(|| found.to_string());
                    match cats.iter().position(|c| *c == value) {
                        Some(pos) => entries.push((base + pos, 1.0)),
                        None if *handle_unknown == HandleUnknown::Ignore => {}
                        None => {
                            return Err(StageError::UnknownCategory {
                                column: column.clone(),
                                value,
                            })
                        }
                    }
                    base += cats.len();
                }
            }
            Transformer::Passthrough { columns, .. } => {
                for (i, column) in columns.iter().enumerate() {
                    entries.push((offset + i, numeric(column, cell(frame, row, column)?)?));
                }
            }
        }
        Ok(())
    }
}

fn cell<'a>(frame: &FeatureFrame, row: &'a [Cell], column: &str) -> Result<&'a Cell, StageError> {
    frame
        .column_index(column)
        .and_then(|idx| row.get(idx))
        .ok_or_else(|| StageError::MissingColumn(column.to_string()))
}

fn numeric(column: &str, cell: &Cell) -> Result<f64, StageError> {
    cell.as_number().ok_or_else(|| StageError::MalformedNumeric {
        column: column.to_string(),
        value: cell.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transformer() -> ColumnTransformer {
        serde_json::from_value(serde_json::json!({
            "kind": "column_transformer",
            "feature_names_in": ["Mileage", "Brand", "Model"],
            "transformers": [
                {"kind": "standard_scaler", "name": "num", "columns": ["Mileage"],
                 "mean": [100.0], "scale": [50.0]},
                {"kind": "one_hot", "name": "cat", "columns": ["Brand"],
                 "categories": [["Audi", "BMW"]]},
                {"kind": "one_hot", "name": "model", "columns": ["Model"],
                 "categories": [["A4", "X5"]], "handle_unknown": "ignore"}
            ]
        }))
        .unwrap()
    }

    fn frame(mileage: Cell, brand: &str, model: &str) -> FeatureFrame {
        FeatureFrame::single_row(
            &["Mileage", "Brand", "Model"],
            vec![mileage, Cell::from(brand), Cell::from(model)],
        )
        .unwrap()
    }

    #[test]
    fn encodes_scaled_and_one_hot_columns() {
        let ct = transformer();
        ct.check().unwrap();
        assert_eq!(ct.n_features_out(), 5);

        let encoded = ct.transform(&frame(Cell::from(200.0), "BMW", "X5")).unwrap();
        assert!(encoded.is_sparse());
        assert_eq!(encoded.shape(), (1, 5));
        let dense = encoded.densify().unwrap();
        assert_eq!(dense.row(0).to_vec(), vec![2.0, 0.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn unknown_category_errors_unless_ignored() {
        let ct = transformer();
        let err = ct.transform(&frame(Cell::from(1.0), "Lada", "A4")).unwrap_err();
        assert_eq!(
            err,
            StageError::UnknownCategory {
                column: "Brand".into(),
                value: "Lada".into()
            }
        );

        let dense = ct
            .transform(&frame(Cell::from(100.0), "Audi", "Q7"))
            .unwrap()
            .densify()
            .unwrap();
        assert_eq!(dense.row(0).to_vec(), vec![0.0, 1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn text_in_numeric_column_is_malformed() {
        let err = transformer()
            .transform(&frame(Cell::from("lots"), "Audi", "A4"))
            .unwrap_err();
        assert!(matches!(err, StageError::MalformedNumeric { .. }));
    }

    #[test]
    fn reordered_columns_are_rejected() {
        let reordered = FeatureFrame::single_row(
            &["Brand", "Mileage", "Model"],
            vec![Cell::from("Audi"), Cell::from(1.0), Cell::from("A4")],
        )
        .unwrap();
        let err = transformer().transform(&reordered).unwrap_err();
        assert!(matches!(err, StageError::ColumnMismatch { .. }));
    }

    #[test]
    fn check_catches_unknown_columns() {
        let mut ct = transformer();
        ct.feature_names_in.retain(|c| c != "Model");
        assert!(ct.check().unwrap_err().contains("unknown column 'Model'"));
    }
}
