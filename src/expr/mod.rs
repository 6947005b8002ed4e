//! Affine expression building blocks.
//!
//! Expressions are built from variables and constants with dimension-checked
//! combinators, then lowered to standard form when the model is solved.

mod constant;
mod expression;
mod shape;
mod variable;

pub use constant::{constant, constant_dmatrix, constant_matrix, constant_sparse, constant_vec, eye, ones, zeros};
pub use expression::{dot, hstack, matmul, sum, vstack, Array, Expr, IntoExpr};
pub use shape::Shape;
pub use variable::{VarId, Variable};
