//! Dense row-major `f32` matrix.
//!
//! Node sets and edge feature sets are stored one entity per row. Every
//! operation that combines matrices validates shapes and reports
//! [`DrapeError::ShapeMismatch`] instead of panicking.

use serde::{Deserialize, Serialize};

use crate::error::{DrapeError, DrapeResult};

/// A dense `rows × cols` matrix of `f32` in row-major order.
///
/// In JSON a matrix is written as a list of rows.
///
/// # Example
///
/// ```
/// use drape_core::Matrix;
///
/// let m = Matrix::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
/// assert_eq!(m.shape(), (2, 2));
/// assert_eq!(m.row(1), &[3.0, 4.0]);
/// assert_eq!(m.get(0, 1), 2.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<f32>>", into = "Vec<Vec<f32>>")]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl Matrix {
    /// Creates a matrix filled with zeros.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// Wraps a row-major buffer.
    ///
    /// # Errors
    ///
    /// Returns [`DrapeError::ShapeMismatch`] if `data.len() != rows * cols`.
    ///
    /// # Example
    ///
    /// ```
    /// use drape_core::Matrix;
    ///
    /// assert!(Matrix::from_vec(2, 3, vec![0.0; 6]).is_ok());
    /// assert!(Matrix::from_vec(2, 3, vec![0.0; 5]).is_err());
    /// ```
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f32>) -> DrapeResult<Self> {
        if data.len() != rows * cols {
            return Err(DrapeError::shape(format!(
                "buffer of {} values cannot form a {rows}x{cols} matrix",
                data.len()
            )));
        }
        Ok(Self { rows, cols, data })
    }

    /// Builds a matrix from equally sized rows.
    ///
    /// An empty slice yields a `0 × 0` matrix.
    ///
    /// # Errors
    ///
    /// Returns [`DrapeError::ShapeMismatch`] if rows differ in length.
    pub fn from_rows<R: AsRef<[f32]>>(rows: &[R]) -> DrapeResult<Self> {
        let cols = rows.first().map_or(0, |r| r.as_ref().len());
        let mut data = Vec::with_capacity(rows.len() * cols);
        for (i, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.len() != cols {
                return Err(DrapeError::shape(format!(
                    "row {i} has {} columns, expected {cols}",
                    row.len()
                )));
            }
            data.extend_from_slice(row);
        }
        Ok(Self {
            rows: rows.len(),
            cols,
            data,
        })
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// `(rows, cols)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Returns `true` if the matrix holds no values.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The underlying row-major buffer.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Consumes the matrix and returns its row-major buffer.
    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }

    /// Row `i` as a slice. Panics if `i >= rows`, like slice indexing.
    pub fn row(&self, i: usize) -> &[f32] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    /// Mutable row `i`. Panics if `i >= rows`.
    pub fn row_mut(&mut self, i: usize) -> &mut [f32] {
        let cols = self.cols;
        &mut self.data[i * cols..(i + 1) * cols]
    }

    /// Iterator over rows.
    pub fn iter_rows(&self) -> impl Iterator<Item = &[f32]> {
        // chunks_exact(0) panics, and a zero-width matrix still has rows
        (0..self.rows).map(move |i| self.row(i))
    }

    /// Element at `(r, c)`. Panics when out of bounds.
    pub fn get(&self, r: usize, c: usize) -> f32 {
        assert!(c < self.cols, "column {c} out of bounds ({})", self.cols);
        self.data[r * self.cols + c]
    }

    /// Gathers the given rows into a new matrix (an index-select).
    ///
    /// # Errors
    ///
    /// Returns [`DrapeError::ShapeMismatch`] if an index is out of range.
    ///
    /// # Example
    ///
    /// ```
    /// use drape_core::Matrix;
    ///
    /// let m = Matrix::from_rows(&[[1.0], [2.0], [3.0]]).unwrap();
    /// let g = m.select_rows(&[2, 0, 2]).unwrap();
    /// assert_eq!(g.data(), &[3.0, 1.0, 3.0]);
    /// assert!(m.select_rows(&[3]).is_err());
    /// ```
    pub fn select_rows(&self, indices: &[usize]) -> DrapeResult<Self> {
        let mut data = Vec::with_capacity(indices.len() * self.cols);
        for &i in indices {
            if i >= self.rows {
                return Err(DrapeError::shape(format!(
                    "row index {i} out of range for {} rows",
                    self.rows
                )));
            }
            data.extend_from_slice(self.row(i));
        }
        Ok(Self {
            rows: indices.len(),
            cols: self.cols,
            data,
        })
    }

    /// Copies columns `start..end` into a new matrix.
    ///
    /// # Errors
    ///
    /// Returns [`DrapeError::ShapeMismatch`] if the range exceeds the width.
    pub fn columns(&self, start: usize, end: usize) -> DrapeResult<Self> {
        if start > end || end > self.cols {
            return Err(DrapeError::shape(format!(
                "column range {start}..{end} out of bounds for width {}",
                self.cols
            )));
        }
        let width = end - start;
        let mut data = Vec::with_capacity(self.rows * width);
        for row in self.iter_rows() {
            data.extend_from_slice(&row[start..end]);
        }
        Ok(Self {
            rows: self.rows,
            cols: width,
            data,
        })
    }

    /// Concatenates matrices along the feature axis.
    ///
    /// # Errors
    ///
    /// Returns [`DrapeError::ShapeMismatch`] if the parts have different
    /// row counts or no parts are given.
    ///
    /// # Example
    ///
    /// ```
    /// use drape_core::Matrix;
    ///
    /// let a = Matrix::from_rows(&[[1.0], [2.0]]).unwrap();
    /// let b = Matrix::from_rows(&[[3.0, 4.0], [5.0, 6.0]]).unwrap();
    /// let c = Matrix::hstack(&[&a, &b]).unwrap();
    /// assert_eq!(c.row(1), &[2.0, 5.0, 6.0]);
    /// ```
    pub fn hstack(parts: &[&Matrix]) -> DrapeResult<Self> {
        let first = parts
            .first()
            .ok_or_else(|| DrapeError::shape("hstack of zero matrices"))?;
        let rows = first.rows;
        if let Some(bad) = parts.iter().find(|m| m.rows != rows) {
            return Err(DrapeError::shape(format!(
                "hstack row mismatch: {} vs {rows}",
                bad.rows
            )));
        }
        let cols: usize = parts.iter().map(|m| m.cols).sum();
        let mut data = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            for part in parts {
                data.extend_from_slice(part.row(r));
            }
        }
        Ok(Self { rows, cols, data })
    }

    /// Element-wise sum.
    ///
    /// # Errors
    ///
    /// Returns [`DrapeError::ShapeMismatch`] if shapes differ.
    pub fn add(&self, other: &Matrix) -> DrapeResult<Self> {
        self.zip_with(other, "add", |a, b| a + b)
    }

    /// Element-wise difference.
    ///
    /// # Errors
    ///
    /// Returns [`DrapeError::ShapeMismatch`] if shapes differ.
    pub fn sub(&self, other: &Matrix) -> DrapeResult<Self> {
        self.zip_with(other, "sub", |a, b| a - b)
    }

    fn zip_with(
        &self,
        other: &Matrix,
        op: &str,
        f: impl Fn(f32, f32) -> f32,
    ) -> DrapeResult<Self> {
        if self.shape() != other.shape() {
            return Err(DrapeError::shape(format!(
                "{op}: {:?} vs {:?}",
                self.shape(),
                other.shape()
            )));
        }
        let data = self
            .data
            .iter()
            .zip(&other.data)
            .map(|(&a, &b)| f(a, b))
            .collect();
        Ok(Self {
            rows: self.rows,
            cols: self.cols,
            data,
        })
    }

    /// Applies `f` to every element.
    pub fn map(&self, f: impl Fn(f32) -> f32) -> Self {
        Self {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().map(|&x| f(x)).collect(),
        }
    }

    /// Multiplies every element by `factor`.
    pub fn scale(&self, factor: f32) -> Self {
        self.map(|x| x * factor)
    }

    /// Transpose.
    pub fn transpose(&self) -> Self {
        let mut out = Self::zeros(self.cols, self.rows);
        for r in 0..self.rows {
            for c in 0..self.cols {
                out.data[c * self.rows + r] = self.data[r * self.cols + c];
            }
        }
        out
    }

    /// Matrix product `self · other`.
    ///
    /// # Errors
    ///
    /// Returns [`DrapeError::ShapeMismatch`] if inner dimensions differ.
    ///
    /// # Example
    ///
    /// ```
    /// use drape_core::Matrix;
    ///
    /// let a = Matrix::from_rows(&[[1.0, 2.0]]).unwrap();
    /// let b = Matrix::from_rows(&[[3.0], [4.0]]).unwrap();
    /// assert_eq!(a.matmul(&b).unwrap().data(), &[11.0]);
    /// ```
    pub fn matmul(&self, other: &Matrix) -> DrapeResult<Self> {
        if self.cols != other.rows {
            return Err(DrapeError::shape(format!(
                "matmul: {:?} · {:?}",
                self.shape(),
                other.shape()
            )));
        }
        let mut out = Self::zeros(self.rows, other.cols);
        for i in 0..self.rows {
            let lhs = self.row(i);
            let dst = &mut out.data[i * other.cols..(i + 1) * other.cols];
            // No zero skip: 0 · NaN must stay NaN.
            for (k, &a) in lhs.iter().enumerate() {
                for (d, &b) in dst.iter_mut().zip(other.row(k)) {
                    *d += a * b;
                }
            }
        }
        Ok(out)
    }

    /// Returns `true` if no element is NaN or infinite.
    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|x| x.is_finite())
    }

    /// Number of NaN or infinite elements.
    pub fn non_finite_count(&self) -> usize {
        self.data.iter().filter(|x| !x.is_finite()).count()
    }
}

impl TryFrom<Vec<Vec<f32>>> for Matrix {
    type Error = DrapeError;

    fn try_from(rows: Vec<Vec<f32>>) -> Result<Self, Self::Error> {
        Self::from_rows(&rows)
    }
}

impl From<Matrix> for Vec<Vec<f32>> {
    fn from(m: Matrix) -> Self {
        m.iter_rows().map(<[f32]>::to_vec).collect()
    }
}
