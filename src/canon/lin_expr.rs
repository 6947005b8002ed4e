//! Standard-form linear expressions.
//!
//! Lowering turns an expression tree into the standard form
//! `sum_i(A_i * x_i) + b`, with one sparse coefficient matrix per variable
//! and a flat constant vector. Matrix-shaped expressions are flattened
//! column by column.

use std::collections::HashMap;

use nalgebra_sparse::CscMatrix;

use crate::expr::{Shape, VarId};
use crate::sparse::{csc_add, csc_identity, csc_neg, csc_repeat_rows, csc_scale};

/// A linear expression in standard form: `sum_i(A_i * x_i) + b`.
///
/// Each coefficient matrix `A_i` has shape (output size, variable size).
#[derive(Debug, Clone)]
pub struct LinExpr {
    /// Coefficient matrix per variable.
    pub coeffs: HashMap<VarId, CscMatrix<f64>>,
    /// Constant term, flattened column-major.
    pub constant: Vec<f64>,
    /// Output shape of this expression.
    pub shape: Shape,
}

impl LinExpr {
    /// Create a zero linear expression with the given shape.
    pub fn zeros(shape: Shape) -> Self {
        LinExpr {
            coeffs: HashMap::new(),
            constant: vec![0.0; shape.size()],
            shape,
        }
    }

    /// Create a linear expression for a single variable (identity coefficient).
    pub fn variable(id: VarId, shape: Shape) -> Self {
        let size = shape.size();
        let mut coeffs = HashMap::new();
        coeffs.insert(id, csc_identity(size));
        LinExpr {
            coeffs,
            constant: vec![0.0; size],
            shape,
        }
    }

    /// Create a constant linear expression.
    pub fn constant(values: Vec<f64>, shape: Shape) -> Self {
        debug_assert_eq!(values.len(), shape.size());
        LinExpr {
            coeffs: HashMap::new(),
            constant: values,
            shape,
        }
    }

    /// Check if this is a constant (no variables).
    pub fn is_constant(&self) -> bool {
        self.coeffs.is_empty()
    }

    /// Output size (flattened).
    pub fn size(&self) -> usize {
        self.shape.size()
    }

    /// Add two linear expressions of the same size.
    pub fn add(&self, other: &LinExpr) -> LinExpr {
        debug_assert_eq!(self.size(), other.size());
        let coeffs = if self.coeffs.is_empty() {
            other.coeffs.clone()
        } else if other.coeffs.is_empty() {
            self.coeffs.clone()
        } else {
            let mut coeffs = self.coeffs.clone();
            for (id, coeff) in &other.coeffs {
                coeffs
                    .entry(*id)
                    .and_modify(|c| *c = csc_add(c, coeff))
                    .or_insert_with(|| coeff.clone());
            }
            coeffs
        };

        let constant = self
            .constant
            .iter()
            .zip(&other.constant)
            .map(|(a, b)| a + b)
            .collect();

        LinExpr {
            coeffs,
            constant,
            shape: self.shape.clone(),
        }
    }

    /// Negate.
    pub fn neg(&self) -> LinExpr {
        let coeffs = self.coeffs.iter().map(|(k, v)| (*k, csc_neg(v))).collect();
        LinExpr {
            coeffs,
            constant: self.constant.iter().map(|v| -v).collect(),
            shape: self.shape.clone(),
        }
    }

    /// Scale by a scalar.
    pub fn scale(&self, scalar: f64) -> LinExpr {
        let coeffs = self
            .coeffs
            .iter()
            .map(|(k, v)| (*k, csc_scale(v, scalar)))
            .collect();
        LinExpr {
            coeffs,
            constant: self.constant.iter().map(|v| v * scalar).collect(),
            shape: self.shape.clone(),
        }
    }

    /// Broadcast a scalar expression to `shape` by repeating its single row.
    pub fn broadcast_to(&self, shape: Shape) -> LinExpr {
        debug_assert_eq!(self.size(), 1);
        let n = shape.size();
        let coeffs = self
            .coeffs
            .iter()
            .map(|(k, v)| (*k, csc_repeat_rows(v, n)))
            .collect();
        LinExpr {
            coeffs,
            constant: vec![self.constant[0]; n],
            shape,
        }
    }

    /// Evaluate at the given variable values, flattened column-major.
    pub fn eval(&self, values: &HashMap<VarId, Vec<f64>>) -> Vec<f64> {
        let mut out = self.constant.clone();
        for (id, coeff) in &self.coeffs {
            if let Some(x) = values.get(id) {
                for (r, c, v) in coeff.triplet_iter() {
                    out[r] += v * x[c];
                }
            }
        }
        out
    }

    /// All variable ids in this expression, in id order.
    pub fn variables(&self) -> Vec<VarId> {
        let mut vars: Vec<_> = self.coeffs.keys().copied().collect();
        vars.sort();
        vars
    }
}
