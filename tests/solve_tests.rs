//! End-to-end solve tests.
//!
//! Optimization problems with known closed-form optima, defined as data and
//! run programmatically.

use approx::assert_relative_eq;
use conemodel::prelude::*;

/// Tolerance for comparing solver results.
const TOL: f64 = 1e-4;

struct TestCase {
    name: &'static str,
    /// Builds the model and returns it with the expected optimal value.
    build: fn() -> (Model, f64),
}

fn test_cases() -> Vec<TestCase> {
    vec![
        TestCase {
            name: "sum_lower_bound",
            build: || {
                // minimize sum(x) s.t. x >= 1, x in R^5
                // optimal: x = [1,1,1,1,1], value = 5
                let mut m = Model::new("sum_lower_bound");
                let x = m.variable("x", 5, greater_than(1.0)).unwrap();
                m.objective(Sense::Minimize, sum(&x)).unwrap();
                (m, 5.0)
            },
        },
        TestCase {
            name: "sum_equality",
            build: || {
                // minimize sum(x) s.t. x == 2, x in R^3
                // optimal: x = [2,2,2], value = 6
                let mut m = Model::new("sum_equality");
                let x = m.free_variable("x", 3).unwrap();
                m.constraint(x.to_expr(), equal_to(2.0)).unwrap();
                m.objective(Sense::Minimize, sum(&x)).unwrap();
                (m, 6.0)
            },
        },
        TestCase {
            name: "maximize_upper_bound",
            build: || {
                // maximize sum(x) s.t. x <= 3, x in R^4
                // optimal: x = [3,3,3,3], value = 12
                let mut m = Model::new("maximize_upper_bound");
                let x = m.variable("x", 4, less_than(3.0)).unwrap();
                m.objective(Sense::Maximize, sum(&x)).unwrap();
                (m, 12.0)
            },
        },
        TestCase {
            name: "weighted_sum",
            build: || {
                // minimize 2x + 3y s.t. x >= 1, y >= 2
                // optimal: x = 1, y = 2, value = 8
                let mut m = Model::new("weighted_sum");
                let x = m.variable("x", (), greater_than(1.0)).unwrap();
                let y = m.variable("y", (), greater_than(2.0)).unwrap();
                let obj = x.to_expr().scale(2.0).add(y.to_expr().scale(3.0)).unwrap();
                m.objective(Sense::Minimize, obj).unwrap();
                (m, 8.0)
            },
        },
        TestCase {
            name: "difference_lower_bound",
            build: || {
                // minimize x s.t. x - y >= 1, y >= 2
                // optimal: y = 2, x = 3, value = 3
                let mut m = Model::new("difference_lower_bound");
                let x = m.free_variable("x", ()).unwrap();
                let y = m.variable("y", (), greater_than(2.0)).unwrap();
                let diff = x.to_expr().sub(&y).unwrap();
                m.constraint(diff, greater_than(1.0)).unwrap();
                m.objective(Sense::Minimize, x.to_expr()).unwrap();
                (m, 3.0)
            },
        },
        TestCase {
            name: "constant_offset_objective",
            build: || {
                // minimize sum(x + [1,2,3]) s.t. x >= 0
                // optimal: x = 0, value = 6
                let mut m = Model::new("constant_offset_objective");
                let x = m.variable("x", 3, greater_than(0.0)).unwrap();
                let shifted = x
                    .to_expr()
                    .add(constant_vec(vec![1.0, 2.0, 3.0]).unwrap())
                    .unwrap();
                m.objective(Sense::Minimize, sum(&shifted)).unwrap();
                (m, 6.0)
            },
        },
        TestCase {
            name: "range_domain",
            build: || {
                // minimize sum(x) s.t. 1 <= x <= 2, x in R^3
                // optimal: x = [1,1,1], value = 3
                let mut m = Model::new("range_domain");
                let x = m.variable("x", 3, range(1.0, 2.0).unwrap()).unwrap();
                m.objective(Sense::Minimize, sum(&x)).unwrap();
                (m, 3.0)
            },
        },
        TestCase {
            name: "per_entry_bounds",
            build: || {
                // minimize sum(x) s.t. x >= [1, 2, 3]
                // optimal: value = 6
                let mut m = Model::new("per_entry_bounds");
                let x = m
                    .variable("x", 3, greater_than_vec(vec![1.0, 2.0, 3.0]))
                    .unwrap();
                m.objective(Sense::Minimize, sum(&x)).unwrap();
                (m, 6.0)
            },
        },
        TestCase {
            name: "norm_via_quadratic_cone",
            build: || {
                // minimize t s.t. (t, x) in Q^6, sum(x) == 5, x in R^5
                // optimal: x = [1,1,1,1,1], t = sqrt(5)
                let mut m = Model::new("norm_via_quadratic_cone");
                let t = m.free_variable("t", ()).unwrap();
                let x = m.free_variable("x", 5).unwrap();
                m.constraint(
                    vstack(&[t.to_expr(), x.to_expr()]).unwrap(),
                    quadratic_cone(6).unwrap(),
                )
                .unwrap();
                m.constraint(sum(&x), equal_to(5.0)).unwrap();
                m.objective(Sense::Minimize, t.to_expr()).unwrap();
                (m, 5.0_f64.sqrt())
            },
        },
        TestCase {
            name: "rotated_cone_hyperbola",
            build: || {
                // minimize u + v s.t. (u, v, 1) in Qr^3
                // 2uv >= 1 with u, v >= 0 gives u = v = 1/sqrt(2), value = sqrt(2)
                let mut m = Model::new("rotated_cone_hyperbola");
                let u = m.free_variable("u", ()).unwrap();
                let v = m.free_variable("v", ()).unwrap();
                m.constraint(
                    vstack(&[u.to_expr(), v.to_expr(), constant(1.0)]).unwrap(),
                    rotated_quadratic_cone(3).unwrap(),
                )
                .unwrap();
                m.objective(Sense::Minimize, u.to_expr().add(&v).unwrap())
                    .unwrap();
                (m, 2.0_f64.sqrt())
            },
        },
        TestCase {
            name: "matrix_stuffing_lp",
            build: || {
                // minimize c'x s.t. Ax == b, x >= 0
                let mut m = Model::new("matrix_stuffing_lp");
                let x = m.variable("x", 2, greater_than(0.0)).unwrap();
                let a = nalgebra::DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, -1.0]);
                m.constraint(matmul(a, &x).unwrap(), equal_to_vec(vec![4.0, 2.0]))
                    .unwrap();
                // x = [3, 1]; minimize x0 + 2 x1 = 5
                m.objective(Sense::Minimize, dot(&[1.0, 2.0], &x).unwrap())
                    .unwrap();
                (m, 5.0)
            },
        },
    ]
}

#[test]
fn known_optima() {
    for case in test_cases() {
        let (mut m, expected) = (case.build)();
        let outcome = m.solve().unwrap();
        assert_eq!(
            outcome.primal_status,
            SolutionStatus::Optimal,
            "case {}: expected optimal, got {:?}",
            case.name,
            outcome.primal_status
        );
        let value = outcome
            .objective
            .unwrap_or_else(|| panic!("case {}: no objective value", case.name));
        assert!(
            (value - expected).abs() < TOL,
            "case {}: expected {}, got {}",
            case.name,
            expected,
            value
        );
    }
}

#[test]
fn minimum_norm_projection() {
    // minimize t s.t. (t, x) in Q^6, Ax == b, 0 <= x <= 1000
    // The minimum-norm solution of Ax == b is x = [4,3,4,5,5]/7 with
    // norm sqrt(13/7).
    let mut m = Model::new("minimum_norm_projection");
    let t = m.free_variable("t", ()).unwrap();
    let x = m.variable("x", 5, range(0.0, 1000.0).unwrap()).unwrap();

    let a = nalgebra::DMatrix::from_row_slice(
        3,
        5,
        &[
            1.0, 1.0, 0.0, 0.0, 0.0, //
            0.0, 1.0, 1.0, 0.0, 0.0, //
            0.0, 0.0, 1.0, 1.0, 1.0,
        ],
    );
    m.constraint(matmul(a, &x).unwrap(), equal_to_vec(vec![1.0, 1.0, 2.0]))
        .unwrap();
    m.constraint(
        vstack(&[t.to_expr(), x.to_expr()]).unwrap(),
        quadratic_cone(6).unwrap(),
    )
    .unwrap();
    m.objective(Sense::Minimize, t.to_expr()).unwrap();

    let outcome = m.solve().unwrap();
    assert_eq!(outcome.primal_status, SolutionStatus::Optimal);
    assert_relative_eq!(
        outcome.objective.unwrap(),
        (13.0_f64 / 7.0).sqrt(),
        epsilon = TOL
    );

    let xs = m.primal_value(&x).unwrap();
    let expected = [4.0 / 7.0, 3.0 / 7.0, 4.0 / 7.0, 5.0 / 7.0, 5.0 / 7.0];
    for (got, want) in xs.iter().zip(expected) {
        assert_relative_eq!(*got, want, epsilon = TOL);
    }
}

#[test]
fn lower_bound_duals() {
    // minimize sum(x) s.t. x >= 1: every bound is active with dual 1.
    let mut m = Model::new("lower_bound_duals");
    let x = m.free_variable("x", 3).unwrap();
    let c = m.constraint(x.to_expr(), greater_than(1.0)).unwrap();
    m.objective(Sense::Minimize, sum(&x)).unwrap();

    let outcome = m.solve().unwrap();
    assert_eq!(outcome.dual_status, SolutionStatus::Optimal);
    for d in m.dual_value(&c).unwrap() {
        assert_relative_eq!(d, 1.0, epsilon = TOL);
    }
    // The constraint level is the expression's value.
    for level in m.primal_value(&c).unwrap() {
        assert_relative_eq!(level, 1.0, epsilon = TOL);
    }
}

#[test]
fn upper_bound_duals_are_nonpositive() {
    // minimize -sum(x) s.t. x <= 3: active upper bounds carry dual -1.
    let mut m = Model::new("upper_bound_duals");
    let x = m.free_variable("x", 2).unwrap();
    let c = m.constraint(x.to_expr(), less_than(3.0)).unwrap();
    m.objective(Sense::Minimize, sum(&x).scale(-1.0)).unwrap();

    m.solve().unwrap();
    for d in m.dual_value(&c).unwrap() {
        assert_relative_eq!(d, -1.0, epsilon = TOL);
    }
}

#[test]
fn infeasible_reports_certificate() {
    // x >= 1 and x <= 0 cannot both hold.
    let mut m = Model::new("infeasible");
    let x = m.free_variable("x", 2).unwrap();
    m.constraint(x.to_expr(), greater_than(1.0)).unwrap();
    m.constraint(x.to_expr(), less_than(0.0)).unwrap();
    m.objective(Sense::Minimize, sum(&x)).unwrap();

    let outcome = m.solve().unwrap();
    assert_eq!(outcome.primal_status, SolutionStatus::Undefined);
    assert_eq!(outcome.dual_status, SolutionStatus::Certificate);
    assert!(outcome.objective.is_none());
    assert_eq!(m.objective_value().unwrap(), None);
}

#[test]
fn unbounded_reports_certificate() {
    // minimize x with only an upper bound.
    let mut m = Model::new("unbounded");
    let x = m.free_variable("x", ()).unwrap();
    m.constraint(x.to_expr(), less_than(5.0)).unwrap();
    m.objective(Sense::Minimize, x.to_expr()).unwrap();

    let outcome = m.solve().unwrap();
    assert_eq!(outcome.primal_status, SolutionStatus::Certificate);
    assert_eq!(outcome.dual_status, SolutionStatus::Undefined);
}

#[test]
fn feasibility_problem_without_objective() {
    let mut m = Model::new("feasibility");
    let x = m.free_variable("x", 3).unwrap();
    m.constraint(x.to_expr(), equal_to(2.0)).unwrap();

    let outcome = m.solve().unwrap();
    assert_eq!(outcome.primal_status, SolutionStatus::Optimal);
    for v in m.primal_value(&x).unwrap() {
        assert_relative_eq!(v, 2.0, epsilon = TOL);
    }
}

#[test]
fn repeated_solves_are_deterministic() {
    let build = || {
        let mut m = Model::new("deterministic");
        let x = m.variable("x", 4, greater_than(1.0)).unwrap();
        m.constraint(sum(&x), less_than(10.0)).unwrap();
        m.objective(Sense::Minimize, dot(&[1.0, 2.0, 3.0, 4.0], &x).unwrap())
            .unwrap();
        (m, x)
    };

    let (mut m1, x1) = build();
    let (mut m2, x2) = build();
    let o1 = m1.solve().unwrap();
    let o2 = m2.solve().unwrap();

    // Identical models produce bit-identical results.
    assert_eq!(o1.objective, o2.objective);
    assert_eq!(m1.primal_value(&x1).unwrap(), m2.primal_value(&x2).unwrap());
}

#[test]
fn resolve_after_editing() {
    let mut m = Model::new("resolve");
    let x = m.variable("x", 5, greater_than(1.0)).unwrap();
    m.objective(Sense::Minimize, sum(&x)).unwrap();

    let first = m.solve().unwrap();
    assert_relative_eq!(first.objective.unwrap(), 5.0, epsilon = TOL);
    assert_eq!(m.state(), ModelState::Solved);

    // Adding a constraint reopens the model; the old solution stays
    // queryable until the next solve.
    m.constraint(sum(&x), greater_than(10.0)).unwrap();
    assert_eq!(m.state(), ModelState::Building);
    assert!(m.primal_status().is_ok());

    let second = m.solve().unwrap();
    assert_relative_eq!(second.objective.unwrap(), 10.0, epsilon = TOL);
    assert_eq!(m.state(), ModelState::Solved);
}

#[test]
fn column_major_matrix_values() {
    // X == [[1, 3], [2, 4]] stored column by column.
    let mut m = Model::new("column_major");
    let x = m.free_variable("x", (2, 2)).unwrap();
    m.constraint(x.to_expr(), equal_to_vec(vec![1.0, 2.0, 3.0, 4.0]))
        .unwrap();
    m.objective(Sense::Minimize, sum(&x)).unwrap();

    let outcome = m.solve().unwrap();
    assert_relative_eq!(outcome.objective.unwrap(), 10.0, epsilon = TOL);
    let values = m.primal_value(&x).unwrap();
    for (got, want) in values.iter().zip([1.0, 2.0, 3.0, 4.0]) {
        assert_relative_eq!(*got, want, epsilon = TOL);
    }
}

#[test]
fn solve_with_custom_settings() {
    let mut m = Model::new("settings");
    let x = m.variable("x", 3, greater_than(1.0)).unwrap();
    m.objective(Sense::Minimize, sum(&x)).unwrap();

    let settings = Settings {
        tol_gap_abs: 1e-10,
        tol_gap_rel: 1e-10,
        ..Settings::default()
    };
    let outcome = m.solve_with(&settings).unwrap();
    assert_eq!(outcome.primal_status, SolutionStatus::Optimal);
    assert!(outcome.iterations > 0);
}

#[cfg(feature = "sdp")]
#[test]
fn semidefinite_completion() {
    // Columns u = (X00, X10) and v = (X01, X11); pinning X00 = 1 and the
    // off-diagonal entries to 1 forces X11 >= 1 by positive semidefiniteness.
    let mut m = Model::new("semidefinite_completion");
    let u = m.free_variable("u", 2).unwrap();
    let v = m.free_variable("v", 2).unwrap();
    m.constraint(
        hstack(&[u.to_expr(), v.to_expr()]).unwrap(),
        psd_cone(2).unwrap(),
    )
    .unwrap();
    m.constraint(dot(&[1.0, 0.0], &u).unwrap(), equal_to(1.0)).unwrap();
    m.constraint(dot(&[0.0, 1.0], &u).unwrap(), equal_to(1.0)).unwrap();
    m.constraint(dot(&[1.0, 0.0], &v).unwrap(), equal_to(1.0)).unwrap();
    m.objective(Sense::Minimize, dot(&[0.0, 1.0], &v).unwrap())
        .unwrap();

    let outcome = m.solve().unwrap();
    assert_eq!(outcome.primal_status, SolutionStatus::Optimal);
    assert_relative_eq!(outcome.objective.unwrap(), 1.0, epsilon = 1e-3);
}

#[cfg(not(feature = "sdp"))]
#[test]
fn semidefinite_needs_feature() {
    let mut m = Model::new("no_sdp");
    m.variable("x", (2, 2), psd_cone(2).unwrap()).unwrap();
    let err = m.solve().unwrap_err();
    assert!(matches!(err, ModelError::Unsupported(_)));
}
