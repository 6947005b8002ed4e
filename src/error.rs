//! Error types for conemodel.

use thiserror::Error;

/// Error type for modeling operations.
///
/// All modeling errors are raised synchronously at the offending call.
/// Solver-reported outcomes (infeasible, unbounded, numerical failure) are
/// not errors; they are surfaced through
/// [`SolutionStatus`](crate::model::SolutionStatus).
#[derive(Debug, Error)]
pub enum ModelError {
    /// A declared shape or domain parameter is invalid.
    #[error("shape error: {0}")]
    Shape(String),

    /// Operand dimensions do not conform.
    #[error("dimension mismatch in {op}: {lhs} vs {rhs}")]
    Dimension {
        op: &'static str,
        lhs: String,
        rhs: String,
    },

    /// A name collides within the model's namespace.
    #[error("duplicate name in model: {0:?}")]
    DuplicateName(String),

    /// A solution query was made before any solve.
    #[error("model has not been solved")]
    NotSolved,

    /// The model uses a feature this build does not support.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// The solver backend could not be set up.
    #[error("solver error: {0}")]
    Solver(String),
}

impl ModelError {
    /// Build a dimension error from two shapes.
    pub(crate) fn dimension(op: &'static str, lhs: impl ToString, rhs: impl ToString) -> Self {
        ModelError::Dimension {
            op,
            lhs: lhs.to_string(),
            rhs: rhs.to_string(),
        }
    }
}

/// Result type for modeling operations.
pub type Result<T> = std::result::Result<T, ModelError>;
