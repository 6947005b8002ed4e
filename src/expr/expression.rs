//! Core expression types.
//!
//! The `Expr` enum represents affine expressions over model variables.
//! Expressions form an immutable DAG using `Arc` for sharing. All operand
//! dimensions are checked when an expression is built, so a constructed
//! `Expr` is always well formed.

use std::sync::Arc;

use nalgebra::DMatrix;
use nalgebra_sparse::CscMatrix;

use super::shape::Shape;
use super::variable::VarId;
use crate::error::{ModelError, Result};

/// Efficient array storage (dense or sparse).
#[derive(Debug, Clone)]
pub enum Array {
    /// Dense matrix storage.
    Dense(DMatrix<f64>),
    /// Sparse CSC matrix storage.
    Sparse(CscMatrix<f64>),
    /// Scalar value.
    Scalar(f64),
}

impl Array {
    /// Get the shape of the array. Single-column storage reads as a vector.
    pub fn shape(&self) -> Shape {
        match self {
            Array::Dense(m) if m.ncols() == 1 => Shape::vector(m.nrows()),
            Array::Dense(m) => Shape::matrix(m.nrows(), m.ncols()),
            Array::Sparse(m) if m.ncols() == 1 => Shape::vector(m.nrows()),
            Array::Sparse(m) => Shape::matrix(m.nrows(), m.ncols()),
            Array::Scalar(_) => Shape::scalar(),
        }
    }

    /// Get the total number of elements.
    pub fn size(&self) -> usize {
        match self {
            Array::Dense(m) => m.nrows() * m.ncols(),
            Array::Sparse(m) => m.nrows() * m.ncols(),
            Array::Scalar(_) => 1,
        }
    }

    /// Materialize as a dense matrix.
    pub fn to_dense(&self) -> DMatrix<f64> {
        match self {
            Array::Dense(m) => m.clone(),
            Array::Sparse(m) => crate::sparse::csc_to_dense(m),
            Array::Scalar(v) => DMatrix::from_element(1, 1, *v),
        }
    }

    /// Create from a vector (stored as a column).
    pub fn from_vec(v: Vec<f64>) -> Self {
        let n = v.len();
        Array::Dense(DMatrix::from_vec(n, 1, v))
    }

}

impl From<f64> for Array {
    fn from(v: f64) -> Self {
        Array::Scalar(v)
    }
}

impl From<Vec<f64>> for Array {
    fn from(v: Vec<f64>) -> Self {
        Array::from_vec(v)
    }
}

impl From<&[f64]> for Array {
    fn from(v: &[f64]) -> Self {
        Array::from_vec(v.to_vec())
    }
}

impl From<DMatrix<f64>> for Array {
    fn from(m: DMatrix<f64>) -> Self {
        Array::Dense(m)
    }
}

impl From<CscMatrix<f64>> for Array {
    fn from(m: CscMatrix<f64>) -> Self {
        Array::Sparse(m)
    }
}

/// An affine expression over model variables.
///
/// Expressions are immutable and use `Arc` for efficient sharing, so
/// subexpressions can appear in many places without copying.
#[derive(Debug, Clone)]
pub enum Expr {
    /// A constant value.
    Const(Array),
    /// A reference to a model variable.
    Var { id: VarId, shape: Shape },
    /// Elementwise addition; a scalar operand broadcasts to the other shape.
    Add(Arc<Expr>, Arc<Expr>),
    /// Negation.
    Neg(Arc<Expr>),
    /// Multiplication by a scalar.
    Scale(f64, Arc<Expr>),
    /// Left multiplication by a constant matrix.
    MatMul(Array, Arc<Expr>),
    /// Sum of all entries, yielding a scalar.
    Sum(Arc<Expr>),
    /// Vertical concatenation of scalar and vector operands.
    VStack(Vec<Arc<Expr>>),
    /// Horizontal concatenation of operands with equal row counts.
    HStack(Vec<Arc<Expr>>),
}

impl Expr {
    /// Get the shape of the expression.
    pub fn shape(&self) -> Shape {
        match self {
            Expr::Const(a) => a.shape(),
            Expr::Var { shape, .. } => shape.clone(),
            Expr::Add(a, b) => {
                // A scalar operand takes the other operand's shape.
                let sa = a.shape();
                if sa.is_scalar() {
                    b.shape()
                } else {
                    sa
                }
            }
            Expr::Neg(a) | Expr::Scale(_, a) => a.shape(),
            Expr::MatMul(m, x) => m
                .shape()
                .matmul(&x.shape())
                .unwrap_or_else(Shape::scalar),
            Expr::Sum(_) => Shape::scalar(),
            Expr::VStack(parts) => {
                let n: usize = parts.iter().map(|e| e.shape().size()).sum();
                Shape::vector(n)
            }
            Expr::HStack(parts) => {
                let rows = parts[0].shape().rows();
                let cols: usize = parts.iter().map(|e| e.shape().cols()).sum();
                Shape::matrix(rows, cols)
            }
        }
    }

    /// Total number of entries.
    pub fn size(&self) -> usize {
        self.shape().size()
    }

    /// Elementwise addition. Scalar operands broadcast; otherwise shapes
    /// must match exactly.
    pub fn add(&self, other: impl IntoExpr) -> Result<Expr> {
        let other = other.into_expr();
        let (sa, sb) = (self.shape(), other.shape());
        if sa != sb && !sa.is_scalar() && !sb.is_scalar() {
            return Err(ModelError::dimension("add", sa, sb));
        }
        Ok(Expr::Add(Arc::new(self.clone()), Arc::new(other)))
    }

    /// Elementwise subtraction.
    pub fn sub(&self, other: impl IntoExpr) -> Result<Expr> {
        self.add(other.into_expr().neg())
    }

    /// Negation.
    pub fn neg(&self) -> Expr {
        Expr::Neg(Arc::new(self.clone()))
    }

    /// Multiplication by a scalar.
    pub fn scale(&self, scalar: f64) -> Expr {
        Expr::Scale(scalar, Arc::new(self.clone()))
    }

    /// Collect the ids of all variables appearing in the expression.
    pub fn variables(&self) -> Vec<VarId> {
        let mut vars = Vec::new();
        self.collect_variables(&mut vars);
        vars.sort();
        vars.dedup();
        vars
    }

    fn collect_variables(&self, vars: &mut Vec<VarId>) {
        match self {
            Expr::Const(_) => {}
            Expr::Var { id, .. } => vars.push(*id),
            Expr::Add(a, b) => {
                a.collect_variables(vars);
                b.collect_variables(vars);
            }
            Expr::Neg(a) | Expr::Scale(_, a) | Expr::MatMul(_, a) | Expr::Sum(a) => {
                a.collect_variables(vars);
            }
            Expr::VStack(parts) | Expr::HStack(parts) => {
                for e in parts {
                    e.collect_variables(vars);
                }
            }
        }
    }
}

/// Types that convert into an expression.
///
/// Lets combinators accept expressions, variables, and plain numbers
/// interchangeably.
pub trait IntoExpr {
    fn into_expr(self) -> Expr;
}

impl IntoExpr for Expr {
    fn into_expr(self) -> Expr {
        self
    }
}

impl IntoExpr for &Expr {
    fn into_expr(self) -> Expr {
        self.clone()
    }
}

impl IntoExpr for f64 {
    fn into_expr(self) -> Expr {
        Expr::Const(Array::Scalar(self))
    }
}

/// Multiply a constant matrix by an expression.
pub fn matmul(matrix: impl Into<Array>, expr: impl IntoExpr) -> Result<Expr> {
    let matrix = matrix.into();
    let expr = expr.into_expr();
    let (sm, sx) = (matrix.shape(), expr.shape());
    if sm.matmul(&sx).is_none() {
        return Err(ModelError::dimension("matmul", sm, sx));
    }
    Ok(Expr::MatMul(matrix, Arc::new(expr)))
}

/// Inner product of a constant vector with a vector expression.
pub fn dot(coeffs: &[f64], expr: impl IntoExpr) -> Result<Expr> {
    let expr = expr.into_expr();
    let shape = expr.shape();
    if shape.cols() != 1 || shape.rows() != coeffs.len() {
        return Err(ModelError::dimension(
            "dot",
            Shape::vector(coeffs.len()),
            shape,
        ));
    }
    // Row-vector product followed by a sum, so the result reads as a scalar.
    let row = DMatrix::from_vec(1, coeffs.len(), coeffs.to_vec());
    let product = Expr::MatMul(Array::Dense(row), Arc::new(expr));
    Ok(Expr::Sum(Arc::new(product)))
}

/// Sum of all entries of an expression.
pub fn sum(expr: impl IntoExpr) -> Expr {
    Expr::Sum(Arc::new(expr.into_expr()))
}

/// Stack scalar and vector expressions vertically into one vector.
///
/// Scalar operands are treated as length-one vectors. Matrix operands are
/// rejected with a dimension error.
pub fn vstack(parts: &[Expr]) -> Result<Expr> {
    if parts.is_empty() {
        return Err(ModelError::Shape("vstack of no expressions".into()));
    }
    for e in parts {
        let s = e.shape();
        if s.cols() != 1 {
            return Err(ModelError::dimension("vstack", "single column", s));
        }
    }
    Ok(Expr::VStack(parts.iter().cloned().map(Arc::new).collect()))
}

/// Stack expressions horizontally into one matrix.
///
/// All operands must have the same number of rows; scalars count as one row.
pub fn hstack(parts: &[Expr]) -> Result<Expr> {
    if parts.is_empty() {
        return Err(ModelError::Shape("hstack of no expressions".into()));
    }
    let rows = parts[0].shape().rows();
    for e in &parts[1..] {
        let s = e.shape();
        if s.rows() != rows {
            return Err(ModelError::dimension("hstack", format!("{} rows", rows), s));
        }
    }
    Ok(Expr::HStack(parts.iter().cloned().map(Arc::new).collect()))
}
