//! Clarabel solver integration.
//!
//! Translates a stuffed problem into Clarabel's input format, runs the
//! interior point solver, and maps its termination status onto the
//! independent primal and dual solution statuses.

use clarabel::algebra::CscMatrix as ClarabelCsc;
use clarabel::solver::{
    DefaultSettingsBuilder, DefaultSolver, IPSolver, SolverStatus, SupportedConeT,
};

use super::stuffing::{ConeDims, StuffedProblem};
use crate::error::{ModelError, Result};
use crate::model::SolutionStatus;

/// Solver settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Print solver output.
    pub verbose: bool,
    /// Maximum iterations.
    pub max_iter: u32,
    /// Time limit in seconds.
    pub time_limit: f64,
    /// Absolute duality gap tolerance.
    pub tol_gap_abs: f64,
    /// Relative duality gap tolerance.
    pub tol_gap_rel: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            verbose: false,
            max_iter: 100,
            time_limit: f64::INFINITY,
            tol_gap_abs: 1e-8,
            tol_gap_rel: 1e-8,
        }
    }
}

/// Raw solver output before it is attached back to model handles.
#[derive(Debug, Clone)]
pub struct RawSolution {
    /// Status of the primal solution.
    pub primal_status: SolutionStatus,
    /// Status of the dual solution.
    pub dual_status: SolutionStatus,
    /// Stacked primal values, or an unboundedness certificate ray.
    pub x: Vec<f64>,
    /// Stacked dual values, or an infeasibility certificate.
    pub z: Vec<f64>,
    /// Objective value when the primal solution is meaningful.
    pub objective: Option<f64>,
    /// Interior point iterations used.
    pub iterations: u32,
    /// Solve time in seconds.
    pub solve_time: f64,
}

/// Map Clarabel's single termination status onto primal/dual status pairs.
fn status_pair(status: SolverStatus) -> (SolutionStatus, SolutionStatus) {
    use SolutionStatus::*;
    match status {
        SolverStatus::Solved => (Optimal, Optimal),
        SolverStatus::AlmostSolved => (Feasible, Feasible),
        SolverStatus::PrimalInfeasible | SolverStatus::AlmostPrimalInfeasible => {
            (Undefined, Certificate)
        }
        SolverStatus::DualInfeasible | SolverStatus::AlmostDualInfeasible => {
            (Certificate, Undefined)
        }
        _ => (Unknown, Unknown),
    }
}

/// Solve the stuffed problem with Clarabel.
pub fn solve(problem: &StuffedProblem, settings: &Settings) -> Result<RawSolution> {
    let p = to_clarabel_csc(&problem.p);
    let a = to_clarabel_csc(&problem.a);
    let cones = to_clarabel_cones(&problem.cone_dims);

    let clarabel_settings = DefaultSettingsBuilder::default()
        .verbose(settings.verbose)
        .max_iter(settings.max_iter)
        .time_limit(settings.time_limit)
        .tol_gap_abs(settings.tol_gap_abs)
        .tol_gap_rel(settings.tol_gap_rel)
        .build()
        .map_err(|e| ModelError::Solver(e.to_string()))?;

    let mut solver = DefaultSolver::new(&p, &problem.q, &a, &problem.b, &cones, clarabel_settings)
        .map_err(|e| ModelError::Solver(e.to_string()))?;
    solver.solve();

    let (primal_status, dual_status) = status_pair(solver.solution.status);
    let x = solver.solution.x.clone();
    let z = solver.solution.z.clone();

    let objective = match primal_status {
        SolutionStatus::Optimal | SolutionStatus::Feasible => {
            // The objective is affine, so q'x plus the constant offset.
            let linear: f64 = problem.q.iter().zip(&x).map(|(qi, xi)| qi * xi).sum();
            Some(linear + problem.offset)
        }
        _ => None,
    };

    Ok(RawSolution {
        primal_status,
        dual_status,
        x,
        z,
        objective,
        iterations: solver.info.iterations,
        solve_time: solver.solution.solve_time,
    })
}

/// Convert nalgebra CSC to Clarabel CSC.
fn to_clarabel_csc(m: &nalgebra_sparse::CscMatrix<f64>) -> ClarabelCsc<f64> {
    ClarabelCsc::new(
        m.nrows(),
        m.ncols(),
        m.col_offsets().to_vec(),
        m.row_indices().to_vec(),
        m.values().to_vec(),
    )
}

/// Convert the cone layout to Clarabel cones.
fn to_clarabel_cones(dims: &ConeDims) -> Vec<SupportedConeT<f64>> {
    let mut cones = Vec::new();

    if dims.zero > 0 {
        cones.push(SupportedConeT::ZeroConeT(dims.zero));
    }

    if dims.nonneg > 0 {
        cones.push(SupportedConeT::NonnegativeConeT(dims.nonneg));
    }

    for &soc_dim in &dims.soc {
        cones.push(SupportedConeT::SecondOrderConeT(soc_dim));
    }

    #[cfg(feature = "sdp")]
    for &order in &dims.psd {
        cones.push(SupportedConeT::PSDTriangleConeT(order));
    }

    cones
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert!(!settings.verbose);
        assert_eq!(settings.max_iter, 100);
    }

    #[test]
    fn test_to_clarabel_cones() {
        let dims = ConeDims {
            zero: 2,
            nonneg: 3,
            soc: vec![4],
            psd: vec![],
        };
        let cones = to_clarabel_cones(&dims);
        assert_eq!(cones.len(), 3);
    }

    #[test]
    fn test_setup_rejection_is_a_solver_error() {
        // b is one row short of A; Clarabel rejects this at setup.
        let problem = StuffedProblem {
            p: nalgebra_sparse::CscMatrix::zeros(1, 1),
            q: vec![1.0],
            a: nalgebra_sparse::CscMatrix::zeros(2, 1),
            b: vec![0.0],
            cone_dims: ConeDims {
                zero: 2,
                ..Default::default()
            },
            offset: 0.0,
            dual_spans: vec![],
        };
        let err = solve(&problem, &Settings::default()).unwrap_err();
        assert!(matches!(err, ModelError::Solver(_)));
    }

    #[test]
    fn test_status_pairs_are_independent() {
        let (p, d) = status_pair(SolverStatus::PrimalInfeasible);
        assert_eq!(p, SolutionStatus::Undefined);
        assert_eq!(d, SolutionStatus::Certificate);

        let (p, d) = status_pair(SolverStatus::DualInfeasible);
        assert_eq!(p, SolutionStatus::Certificate);
        assert_eq!(d, SolutionStatus::Undefined);

        let (p, d) = status_pair(SolverStatus::MaxIterations);
        assert_eq!(p, SolutionStatus::Unknown);
        assert_eq!(d, SolutionStatus::Unknown);
    }
}
