//! # conemodel
//!
//! An object-oriented modeling layer for linear and conic optimization,
//! solved with the Clarabel interior point solver.
//!
//! A [`Model`](model::Model) collects variables, affine constraints, and an
//! objective, then lowers everything to Clarabel's standard form on
//! [`solve`](model::Model::solve). Variables and constraints are referenced
//! through cheap handles; solution values are queried back through the
//! model after solving.
//!
//! ## Quick Start
//!
//! ```ignore
//! use conemodel::prelude::*;
//!
//! let mut m = Model::new("lo1");
//! let x = m.variable("x", 3, greater_than(0.0))?;
//! m.constraint(dot(&[1.0, 1.0, 2.0], &x)?, equal_to(1.0))?;
//! m.objective(Sense::Minimize, sum(&x))?;
//!
//! let outcome = m.solve()?;
//! println!("objective: {:?}", outcome.objective);
//! println!("x = {:?}", m.primal_value(&x)?);
//! ```
//!
//! ## Domains
//!
//! Variables and constraints are restricted by attaching a domain:
//!
//! - Box domains: [`equal_to`](domain::equal_to), [`greater_than`](domain::greater_than),
//!   [`less_than`](domain::less_than), [`range`](domain::range), and their
//!   per-entry `_vec` variants
//! - [`quadratic_cone`](domain::quadratic_cone): `x[0] >= ||x[1..]||`
//! - [`rotated_quadratic_cone`](domain::rotated_quadratic_cone):
//!   `2 x[0] x[1] >= ||x[2..]||^2`
//! - [`psd_cone`](domain::psd_cone): symmetric positive semidefinite
//!   matrices (needs the `sdp` feature)
//!
//! ## Solution statuses
//!
//! Solver outcomes are never errors. Infeasibility, unboundedness, and
//! iteration limits show up as primal and dual
//! [`SolutionStatus`](model::SolutionStatus) values, reported independently.

pub mod canon;
pub mod domain;
pub mod error;
pub mod expr;
pub mod model;
pub mod solver;
pub mod sparse;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use conemodel::prelude::*;
/// ```
pub mod prelude {
    // Expression building
    pub use crate::expr::{
        constant, constant_dmatrix, constant_matrix, constant_sparse, constant_vec, dot, eye,
        hstack, matmul, ones, sum, vstack, zeros, Array, Expr, IntoExpr, Shape, Variable,
    };

    // Domains
    pub use crate::domain::{
        equal_to, equal_to_vec, greater_than, greater_than_vec, less_than, less_than_vec,
        psd_cone, quadratic_cone, range, range_vec, rotated_quadratic_cone, unbounded, Domain,
    };

    // Model
    pub use crate::model::{
        Constraint, Model, ModelState, Sense, SolutionStatus, SolveOutcome,
    };

    // Solver
    pub use crate::solver::Settings;

    // Errors
    pub use crate::error::{ModelError, Result};
}

// Re-export main types at crate root
pub use error::{ModelError, Result};
pub use model::{Model, Sense, SolutionStatus, SolveOutcome};
pub use solver::Settings;
