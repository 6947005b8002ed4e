//! Constant expression creation.

use nalgebra::DMatrix;
use nalgebra_sparse::CscMatrix;

use super::expression::{Array, Expr};
use super::shape::Shape;
use crate::error::{ModelError, Result};

/// Create a constant expression from a scalar.
pub fn constant(value: f64) -> Expr {
    Expr::Const(Array::Scalar(value))
}

/// Create a constant vector expression. The data must be nonempty.
pub fn constant_vec(values: Vec<f64>) -> Result<Expr> {
    if values.is_empty() {
        return Err(ModelError::Shape("constant vector is empty".into()));
    }
    Ok(Expr::Const(Array::from_vec(values)))
}

/// Create a constant matrix expression from column-major data.
///
/// Both dimensions must be at least 1 and the data must fill them exactly.
pub fn constant_matrix(values: Vec<f64>, rows: usize, cols: usize) -> Result<Expr> {
    if rows == 0 || cols == 0 {
        return Err(ModelError::Shape(format!(
            "constant matrix shape ({rows}, {cols}) has a zero dimension"
        )));
    }
    if values.len() != rows * cols {
        return Err(ModelError::Shape(format!(
            "{} values do not fill a ({rows}, {cols}) matrix",
            values.len()
        )));
    }
    Ok(Expr::Const(Array::Dense(DMatrix::from_vec(
        rows, cols, values,
    ))))
}

/// Create a constant expression from a nalgebra DMatrix.
pub fn constant_dmatrix(matrix: DMatrix<f64>) -> Expr {
    Expr::Const(Array::Dense(matrix))
}

/// Create a constant expression from a sparse CSC matrix.
pub fn constant_sparse(matrix: CscMatrix<f64>) -> Expr {
    Expr::Const(Array::Sparse(matrix))
}

/// Create a zero constant with the given shape.
pub fn zeros(shape: impl Into<Shape>) -> Expr {
    let shape = shape.into();
    let value = if shape.is_scalar() {
        Array::Scalar(0.0)
    } else {
        Array::Dense(DMatrix::zeros(shape.rows(), shape.cols()))
    };
    Expr::Const(value)
}

/// Create a ones constant with the given shape.
pub fn ones(shape: impl Into<Shape>) -> Expr {
    let shape = shape.into();
    let value = if shape.is_scalar() {
        Array::Scalar(1.0)
    } else {
        Array::Dense(DMatrix::from_element(shape.rows(), shape.cols(), 1.0))
    };
    Expr::Const(value)
}

/// Create an identity matrix constant.
pub fn eye(n: usize) -> Expr {
    Expr::Const(Array::Dense(DMatrix::identity(n, n)))
}
