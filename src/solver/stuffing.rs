//! Matrix stuffing: standard-form expressions to solver format.
//!
//! This module builds the matrices (P, q, A, b) and cone layout required by
//! Clarabel from the lowered model. Clarabel solves
//! `min (1/2) x'Px + q'x  s.t.  Ax + s = b, s in K`, so every domain is
//! rewritten as a slack membership:
//!
//! - `expr == v`  becomes rows in the zero cone with `A = C`, `b = v - c`
//! - `expr >= l`  becomes rows in the nonnegative cone with `A = -C`, `b = c - l`
//! - `expr <= u`  becomes rows in the nonnegative cone with `A = C`, `b = u - c`
//! - `expr in K`  becomes `A = -C`, `b = c` with s in the matching cone
//!
//! where the lowered expression is `Cx + c`. Rotated quadratic cones are
//! mapped onto plain quadratic cones by an orthogonal change of the first
//! two rows; semidefinite domains are mapped onto Clarabel's scaled
//! triangle representation.

use std::collections::HashMap;

use nalgebra::DMatrix;
use nalgebra_sparse::CscMatrix;

use crate::canon::LinExpr;
use crate::domain::Domain;
use crate::error::{ModelError, Result};
use crate::sparse::{csc_from_triplets, dense_mul_csc};

const FRAC_1_SQRT_2: f64 = std::f64::consts::FRAC_1_SQRT_2;

/// Cone layout for Clarabel, in row order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConeDims {
    /// Number of zero cone (equality) rows.
    pub zero: usize,
    /// Number of nonnegative cone rows.
    pub nonneg: usize,
    /// Quadratic cone dimensions, one entry per cone.
    pub soc: Vec<usize>,
    /// Semidefinite cone orders, one entry per cone. A cone of order n
    /// occupies n(n+1)/2 triangle rows.
    pub psd: Vec<usize>,
}

impl ConeDims {
    /// Total number of constraint rows.
    pub fn total(&self) -> usize {
        self.zero
            + self.nonneg
            + self.soc.iter().sum::<usize>()
            + self.psd.iter().map(|n| n * (n + 1) / 2).sum::<usize>()
    }
}

/// Mapping from variable ids to column spans of the stacked solver variable.
#[derive(Debug, Clone)]
pub struct VariableMap {
    /// (start column, size) per variable, indexed by declaration order.
    spans: Vec<(usize, usize)>,
    /// Total number of scalar solver variables.
    pub total: usize,
}

impl VariableMap {
    /// Build from variable sizes in declaration order.
    pub fn from_sizes(sizes: &[usize]) -> Self {
        let mut spans = Vec::with_capacity(sizes.len());
        let mut offset = 0;
        for &size in sizes {
            spans.push((offset, size));
            offset += size;
        }
        VariableMap {
            spans,
            total: offset,
        }
    }

    /// Column span of a variable given its declaration index.
    pub fn span(&self, index: usize) -> (usize, usize) {
        self.spans[index]
    }
}

/// One lowered expression restricted to a domain.
#[derive(Debug, Clone)]
pub struct Binding {
    pub expr: LinExpr,
    pub domain: Domain,
    /// Index of the user-visible constraint this binding came from, if any.
    /// Variable domains turn into rows too but expose no dual.
    pub con: Option<usize>,
}

/// Where a constraint's dual vector lives in the solver's dual `z`.
#[derive(Debug, Clone)]
pub enum DualSpan {
    /// The constraint produced no rows.
    Empty { len: usize },
    /// A contiguous run of rows, reported as `sign * z`.
    Rows { start: usize, len: usize, sign: f64 },
    /// A two-sided range: dual is `z_lower - z_upper`.
    Range {
        lo_start: usize,
        hi_start: usize,
        len: usize,
    },
    /// A rotated cone: the orthogonal row change is applied back to `z`.
    Rotated { start: usize, len: usize },
    /// A semidefinite cone: triangle rows scatter back to a full matrix.
    Psd { start: usize, order: usize },
}

/// Stuffed problem ready for Clarabel.
#[derive(Debug)]
pub struct StuffedProblem {
    /// Quadratic cost matrix (always zero; the objective is affine).
    pub p: CscMatrix<f64>,
    /// Linear cost vector.
    pub q: Vec<f64>,
    /// Constraint matrix.
    pub a: CscMatrix<f64>,
    /// Constraint right-hand side.
    pub b: Vec<f64>,
    /// Cone layout matching the rows of `a`.
    pub cone_dims: ConeDims,
    /// Constant offset of the objective.
    pub offset: f64,
    /// Dual locations per user constraint index.
    pub dual_spans: Vec<DualSpan>,
}

/// Build the stuffed problem.
///
/// `objective` is the sense-adjusted scalar objective; `bindings` hold every
/// domain restriction in declaration order, variables first.
pub fn stuff_problem(
    objective: &LinExpr,
    bindings: &[Binding],
    var_map: &VariableMap,
    ncons: usize,
) -> Result<StuffedProblem> {
    if !cfg!(feature = "sdp") && bindings.iter().any(|b| matches!(b.domain, Domain::PsdCone(_)))
    {
        return Err(ModelError::Unsupported(
            "semidefinite domains need the `sdp` feature".into(),
        ));
    }

    let n = var_map.total;
    let (q, offset) = stuff_objective(objective, var_map);

    // Rows are grouped by cone kind: zero, nonnegative, quadratic cones,
    // then semidefinite cones, each kind in binding declaration order.
    // Pass one fixes the layout so pass two can place coefficients.
    let mut cone_dims = ConeDims::default();
    for binding in bindings {
        let size = binding.expr.size();
        match &binding.domain {
            Domain::Free => {}
            Domain::EqualTo(_) => cone_dims.zero += size,
            Domain::GreaterThan(_) | Domain::LessThan(_) => cone_dims.nonneg += size,
            Domain::Range(_, _) => cone_dims.nonneg += 2 * size,
            Domain::QuadraticCone(d) | Domain::RotatedQuadraticCone(d) => {
                cone_dims.soc.push(*d)
            }
            Domain::PsdCone(order) => cone_dims.psd.push(*order),
        }
    }

    let zero_base = 0;
    let nonneg_base = cone_dims.zero;
    let soc_base = nonneg_base + cone_dims.nonneg;
    let psd_base = soc_base + cone_dims.soc.iter().sum::<usize>();
    let total_rows = cone_dims.total();

    let mut next_zero = zero_base;
    let mut next_nonneg = nonneg_base;
    let mut next_soc = soc_base;
    let mut next_psd = psd_base;

    let mut a_rows = Vec::new();
    let mut a_cols = Vec::new();
    let mut a_vals = Vec::new();
    let mut b = vec![0.0; total_rows];
    let mut dual_spans: Vec<DualSpan> = (0..ncons).map(|_| DualSpan::Empty { len: 0 }).collect();

    let emit = |expr: &LinExpr,
                negate: bool,
                rhs: &[f64],
                next: &mut usize,
                a_rows: &mut Vec<usize>,
                a_cols: &mut Vec<usize>,
                a_vals: &mut Vec<f64>,
                b: &mut Vec<f64>|
     -> usize {
        let start = *next;
        let sign = if negate { -1.0 } else { 1.0 };
        for (id, coeff) in &expr.coeffs {
            let (col_start, _) = var_map.span(id.index());
            for (row, col, val) in coeff.triplet_iter() {
                a_rows.push(start + row);
                a_cols.push(col_start + col);
                a_vals.push(sign * val);
            }
        }
        b[start..start + rhs.len()].copy_from_slice(rhs);
        *next += expr.size();
        start
    };

    for binding in bindings {
        let expr = &binding.expr;
        let size = expr.size();
        let span = match &binding.domain {
            Domain::Free => DualSpan::Empty { len: size },
            Domain::EqualTo(bound) => {
                // Cx = v - c
                let rhs: Vec<f64> = bound
                    .expand(size)
                    .iter()
                    .zip(&expr.constant)
                    .map(|(v, c)| v - c)
                    .collect();
                let start = emit(
                    expr, false, &rhs, &mut next_zero,
                    &mut a_rows, &mut a_cols, &mut a_vals, &mut b,
                );
                DualSpan::Rows { start, len: size, sign: 1.0 }
            }
            Domain::GreaterThan(bound) => {
                // -Cx <= c - l
                let rhs: Vec<f64> = expr
                    .constant
                    .iter()
                    .zip(bound.expand(size))
                    .map(|(c, l)| c - l)
                    .collect();
                let start = emit(
                    expr, true, &rhs, &mut next_nonneg,
                    &mut a_rows, &mut a_cols, &mut a_vals, &mut b,
                );
                DualSpan::Rows { start, len: size, sign: 1.0 }
            }
            Domain::LessThan(bound) => {
                // Cx <= u - c
                let rhs: Vec<f64> = bound
                    .expand(size)
                    .iter()
                    .zip(&expr.constant)
                    .map(|(u, c)| u - c)
                    .collect();
                let start = emit(
                    expr, false, &rhs, &mut next_nonneg,
                    &mut a_rows, &mut a_cols, &mut a_vals, &mut b,
                );
                DualSpan::Rows { start, len: size, sign: -1.0 }
            }
            Domain::Range(lo, hi) => {
                let rhs_lo: Vec<f64> = expr
                    .constant
                    .iter()
                    .zip(lo.expand(size))
                    .map(|(c, l)| c - l)
                    .collect();
                let lo_start = emit(
                    expr, true, &rhs_lo, &mut next_nonneg,
                    &mut a_rows, &mut a_cols, &mut a_vals, &mut b,
                );
                let rhs_hi: Vec<f64> = hi
                    .expand(size)
                    .iter()
                    .zip(&expr.constant)
                    .map(|(u, c)| u - c)
                    .collect();
                let hi_start = emit(
                    expr, false, &rhs_hi, &mut next_nonneg,
                    &mut a_rows, &mut a_cols, &mut a_vals, &mut b,
                );
                DualSpan::Range { lo_start, hi_start, len: size }
            }
            Domain::QuadraticCone(_) => {
                // s = Cx + c
                let start = emit(
                    expr, true, &expr.constant, &mut next_soc,
                    &mut a_rows, &mut a_cols, &mut a_vals, &mut b,
                );
                DualSpan::Rows { start, len: size, sign: 1.0 }
            }
            Domain::RotatedQuadraticCone(_) => {
                let rotated = rotate_rows(expr);
                let start = emit(
                    &rotated, true, &rotated.constant, &mut next_soc,
                    &mut a_rows, &mut a_cols, &mut a_vals, &mut b,
                );
                DualSpan::Rotated { start, len: size }
            }
            Domain::PsdCone(order) => {
                let tri = scaled_triangle(expr, *order);
                let start = emit(
                    &tri, true, &tri.constant, &mut next_psd,
                    &mut a_rows, &mut a_cols, &mut a_vals, &mut b,
                );
                DualSpan::Psd { start, order: *order }
            }
        };
        if let Some(con) = binding.con {
            dual_spans[con] = span;
        }
    }

    let a = csc_from_triplets(total_rows, n, a_rows, a_cols, a_vals);
    let p = CscMatrix::zeros(n, n);

    Ok(StuffedProblem {
        p,
        q,
        a,
        b,
        cone_dims,
        offset,
        dual_spans,
    })
}

/// Stuff the scalar objective into q and its constant offset.
fn stuff_objective(objective: &LinExpr, var_map: &VariableMap) -> (Vec<f64>, f64) {
    let mut q = vec![0.0; var_map.total];
    for (id, coeff) in &objective.coeffs {
        let (start, _) = var_map.span(id.index());
        for (_row, col, val) in coeff.triplet_iter() {
            q[start + col] += *val;
        }
    }
    let offset = objective.constant.first().copied().unwrap_or(0.0);
    (q, offset)
}

/// Apply the rotated-to-plain quadratic cone row change.
///
/// The map sends rows (r0, r1, rest) to ((r0+r1)/sqrt2, (r0-r1)/sqrt2, rest)
/// and is its own inverse, so duals map back through [`unrotate_dual`].
fn rotate_rows(expr: &LinExpr) -> LinExpr {
    let n = expr.size();
    let mut t = DMatrix::identity(n, n);
    t[(0, 0)] = FRAC_1_SQRT_2;
    t[(0, 1)] = FRAC_1_SQRT_2;
    t[(1, 0)] = FRAC_1_SQRT_2;
    t[(1, 1)] = -FRAC_1_SQRT_2;
    transform_rows(expr, &t)
}

/// Map a quadratic cone dual back to the rotated cone's rows.
pub fn unrotate_dual(z: &[f64]) -> Vec<f64> {
    let mut out = z.to_vec();
    out[0] = FRAC_1_SQRT_2 * (z[0] + z[1]);
    out[1] = FRAC_1_SQRT_2 * (z[0] - z[1]);
    out
}

/// Rewrite an order-n matrix expression in Clarabel's scaled triangle form.
///
/// The expression is symmetrized first, then the upper triangle is read
/// column by column with off-diagonal entries scaled by sqrt2.
fn scaled_triangle(expr: &LinExpr, order: usize) -> LinExpr {
    let n = order;
    let tri = n * (n + 1) / 2;
    let mut s = DMatrix::zeros(tri, n * n);
    let mut t = 0;
    for j in 0..n {
        for i in 0..=j {
            if i == j {
                s[(t, i + j * n)] = 1.0;
            } else {
                s[(t, i + j * n)] = FRAC_1_SQRT_2;
                s[(t, j + i * n)] = FRAC_1_SQRT_2;
            }
            t += 1;
        }
    }
    transform_rows(expr, &s)
}

/// Scatter a scaled triangle dual back to a full column-major matrix.
pub fn triangle_to_full(z: &[f64], order: usize) -> Vec<f64> {
    let n = order;
    let mut full = vec![0.0; n * n];
    let mut t = 0;
    for j in 0..n {
        for i in 0..=j {
            if i == j {
                full[i + j * n] = z[t];
            } else {
                full[i + j * n] = FRAC_1_SQRT_2 * z[t];
                full[j + i * n] = FRAC_1_SQRT_2 * z[t];
            }
            t += 1;
        }
    }
    full
}

/// Left-multiply a lowered expression's rows by a dense matrix.
fn transform_rows(expr: &LinExpr, t: &DMatrix<f64>) -> LinExpr {
    let coeffs: HashMap<_, _> = expr
        .coeffs
        .iter()
        .map(|(id, c)| (*id, dense_mul_csc(t, c)))
        .collect();
    let mut constant = vec![0.0; t.nrows()];
    for (r, out) in constant.iter_mut().enumerate() {
        for (k, v) in expr.constant.iter().enumerate() {
            *out += t[(r, k)] * v;
        }
    }
    LinExpr {
        coeffs,
        constant,
        shape: crate::expr::Shape::vector(t.nrows()),
    }
}
