//! Solver bridge: stuffing and the Clarabel backend.

mod clarabel;
mod stuffing;

pub use clarabel::{solve, RawSolution, Settings};
pub use stuffing::{
    stuff_problem, triangle_to_full, unrotate_dual, Binding, ConeDims, DualSpan, StuffedProblem,
    VariableMap,
};
