use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::StageError;

/// A single table cell handed to the preprocessor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Number(f64),
    Text(String),
}

impl Cell {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(v) => Some(*v),
            Cell::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            Cell::Number(_) => None,
        }
    }
}

impl std::fmt::Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cell::Number(v) => write!(f, "{}", v),
            Cell::Text(s) => write!(f, "{:?}", s),
        }
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Number(value)
    }
}

impl From<i32> for Cell {
    fn from(value: i32) -> Self {
        Cell::Number(value as f64)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

/// Row-major table with named columns, the input of the preprocessing stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureFrame {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl FeatureFrame {
    pub fn new<S: AsRef<str>>(columns: &[S]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// Build a frame holding exactly one row.
    pub fn single_row<S: AsRef<str>>(columns: &[S], row: Vec<Cell>) -> Result<Self, StageError> {
        let mut frame = Self::new(columns);
        frame.push_row(row)?;
        Ok(frame)
    }

    pub fn push_row(&mut self, row: Vec<Cell>) -> Result<(), StageError> {
        if row.len() != self.columns.len() {
            return Err(StageError::Shape(format!(
                "row has {} cells, frame has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

impl std::fmt::Display for FeatureFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.columns.join(" | "))?;
        for row in &self.rows {
            let cells: Vec<String> = row.iter().map(|c| c.to_string()).collect();
            writeln!(f, "{}", cells.join(" | "))?;
        }
        Ok(())
    }
}

/// Compressed sparse row matrix, the usual output of one-hot encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsrMatrix {
    pub n_rows: usize,
    pub n_cols: usize,
    pub indptr: Vec<usize>,
    pub indices: Vec<usize>,
    pub data: Vec<f64>,
}

impl CsrMatrix {
    pub fn empty(n_cols: usize) -> Self {
        Self {
            n_rows: 0,
            n_cols,
            indptr: vec![0],
            indices: Vec::new(),
            data: Vec::new(),
        }
    }

    /// Append a row given as `(column, value)` pairs. Zeros are not stored.
    pub fn push_row(&mut self, entries: impl IntoIterator<Item = (usize, f64)>) {
        for (col, value) in entries {
            if value != 0.0 {
                self.indices.push(col);
                self.data.push(value);
            }
        }
        self.indptr.push(self.indices.len());
        self.n_rows += 1;
    }

    pub fn nnz(&self) -> usize {
        self.data.len()
    }

    /// Expand into a dense matrix, checking the structure on the way.
    pub fn to_dense(&self) -> Result<Array2<f64>, StageError> {
        if self.indptr.len() != self.n_rows + 1 {
            return Err(StageError::Shape(format!(
                "indptr has {} entries, expected {}",
                self.indptr.len(),
                self.n_rows + 1
            )));
        }
        if self.indices.len() != self.data.len() {
            return Err(StageError::Shape(format!(
                "{} indices but {} values",
                self.indices.len(),
                self.data.len()
            )));
        }

        let mut dense = Array2::<f64>::zeros((self.n_rows, self.n_cols));
        for row in 0..self.n_rows {
            let (start, end) = (self.indptr[row], self.indptr[row + 1]);
            if start > end || end > self.data.len() {
                return Err(StageError::Shape(format!(
                    "row {} spans invalid range {}..{}",
                    row, start, end
                )));
            }
            for k in start..end {
                let col = self.indices[k];
                if col >= self.n_cols {
                    return Err(StageError::Shape(format!(
                        "column index {} out of bounds for width {}",
                        col, self.n_cols
                    )));
                }
                dense[[row, col]] += self.data[k];
            }
        }
        Ok(dense)
    }
}

/// Output of the preprocessing stage.
#[derive(Debug, Clone, PartialEq)]
pub enum Encoded {
    Sparse(CsrMatrix),
    Dense(Array2<f64>),
}

impl Encoded {
    pub fn shape(&self) -> (usize, usize) {
        match self {
            Encoded::Sparse(m) => (m.n_rows, m.n_cols),
            Encoded::Dense(m) => m.dim(),
        }
    }

    pub fn is_sparse(&self) -> bool {
        matches!(self, Encoded::Sparse(_))
    }

    /// Produce the dense matrix the model stage expects. Fails on malformed
    /// sparse structure or non-finite entries.
    pub fn densify(self) -> Result<Array2<f64>, StageError> {
        let dense = match self {
            Encoded::Sparse(m) => m.to_dense()?,
            Encoded::Dense(m) => m,
        };
        if let Some(((row, col), value)) = dense.indexed_iter().find(|(_, v)| !v.is_finite()) {
            return Err(StageError::Shape(format!(
                "non-finite value {} at ({}, {})",
                value, row, col
            )));
        }
        Ok(dense)
    }
}
