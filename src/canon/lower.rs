//! Lowering from expression trees to standard form.
//!
//! `lower` walks an [`Expr`] bottom-up and folds it into a single
//! [`LinExpr`]. Dimension checks already happened when the expression was
//! built, so lowering never fails.

use std::collections::HashMap;

use nalgebra::DMatrix;

use super::lin_expr::LinExpr;
use crate::expr::{Array, Expr, Shape};
use crate::sparse::csc_from_triplets;

/// Lower an expression tree to standard form.
pub fn lower(expr: &Expr) -> LinExpr {
    match expr {
        Expr::Const(a) => lower_constant(a),
        Expr::Var { id, shape } => LinExpr::variable(*id, shape.clone()),
        Expr::Add(a, b) => {
            let (mut la, mut lb) = (lower(a), lower(b));
            // A scalar operand repeats across the other operand's entries.
            if la.size() == 1 && lb.size() > 1 {
                la = la.broadcast_to(lb.shape.clone());
            } else if lb.size() == 1 && la.size() > 1 {
                lb = lb.broadcast_to(la.shape.clone());
            }
            la.add(&lb)
        }
        Expr::Neg(a) => lower(a).neg(),
        Expr::Scale(s, a) => lower(a).scale(*s),
        Expr::MatMul(m, x) => {
            let lin = lower(x);
            let a = left_factor(m);
            apply_block_matrix(&a, &lin, expr.shape())
        }
        Expr::Sum(a) => {
            let lin = lower(a);
            let ones = DMatrix::from_element(1, lin.size(), 1.0);
            // Summing treats the operand as one flat column.
            let flat = LinExpr {
                coeffs: lin.coeffs,
                constant: lin.constant,
                shape: Shape::vector(lin.shape.size()),
            };
            apply_block_matrix(&ones, &flat, Shape::scalar())
        }
        Expr::VStack(parts) => {
            let lowered: Vec<LinExpr> = parts.iter().map(|p| lower(p)).collect();
            concat(&lowered, expr.shape())
        }
        Expr::HStack(parts) => {
            // Column-major flattening makes a horizontal stack a flat
            // concatenation of its operands' column runs.
            let lowered: Vec<LinExpr> = parts.iter().map(|p| lower(p)).collect();
            concat(&lowered, expr.shape())
        }
    }
}

fn lower_constant(a: &Array) -> LinExpr {
    match a {
        Array::Scalar(v) => LinExpr::constant(vec![*v], Shape::scalar()),
        _ => {
            let dense = a.to_dense();
            LinExpr::constant(dense.as_slice().to_vec(), a.shape())
        }
    }
}

/// Dense left factor for a matrix product; a stored column reads as a row.
fn left_factor(m: &Array) -> DMatrix<f64> {
    let dense = m.to_dense();
    if m.shape().ndim() == 1 {
        dense.transpose()
    } else {
        dense
    }
}

/// Multiply a constant matrix onto each column block of a lowered operand.
///
/// For an operand with k rows and n columns flattened column-major,
/// `vec(A * E) = (I_n kron A) vec(E)`. Rather than materializing the
/// Kronecker product, each nonzero of the operand is routed through the
/// matching column of `a` directly.
fn apply_block_matrix(a: &DMatrix<f64>, lin: &LinExpr, out_shape: Shape) -> LinExpr {
    let m = a.nrows();
    let k = a.ncols();
    let blocks = lin.shape.cols();
    debug_assert_eq!(lin.shape.rows(), k);
    debug_assert_eq!(out_shape.size(), m * blocks);

    let mut coeffs = HashMap::new();
    for (id, c) in &lin.coeffs {
        let mut rows = Vec::new();
        let mut cols = Vec::new();
        let mut vals = Vec::new();
        for (r, col, v) in c.triplet_iter() {
            let block = r / k;
            let within = r % k;
            for i in 0..m {
                let av = a[(i, within)];
                if av != 0.0 {
                    rows.push(block * m + i);
                    cols.push(col);
                    vals.push(av * v);
                }
            }
        }
        coeffs.insert(
            *id,
            csc_from_triplets(m * blocks, c.ncols(), rows, cols, vals),
        );
    }

    let mut constant = vec![0.0; m * blocks];
    for (r, v) in lin.constant.iter().enumerate() {
        if *v != 0.0 {
            let block = r / k;
            let within = r % k;
            for i in 0..m {
                constant[block * m + i] += a[(i, within)] * v;
            }
        }
    }

    LinExpr {
        coeffs,
        constant,
        shape: out_shape,
    }
}

/// Concatenate lowered operands end to end along the flat layout.
fn concat(parts: &[LinExpr], out_shape: Shape) -> LinExpr {
    let total: usize = parts.iter().map(|p| p.size()).sum();
    debug_assert_eq!(out_shape.size(), total);

    // var id -> (triplets, var size)
    let mut acc: HashMap<_, (Vec<usize>, Vec<usize>, Vec<f64>, usize)> = HashMap::new();
    let mut constant = Vec::with_capacity(total);
    let mut offset = 0;
    for part in parts {
        for (id, c) in &part.coeffs {
            let entry = acc
                .entry(*id)
                .or_insert_with(|| (Vec::new(), Vec::new(), Vec::new(), c.ncols()));
            for (r, col, v) in c.triplet_iter() {
                entry.0.push(offset + r);
                entry.1.push(col);
                entry.2.push(*v);
            }
        }
        constant.extend_from_slice(&part.constant);
        offset += part.size();
    }

    let coeffs = acc
        .into_iter()
        .map(|(id, (rows, cols, vals, ncols))| {
            (id, csc_from_triplets(total, ncols, rows, cols, vals))
        })
        .collect();

    LinExpr {
        coeffs,
        constant,
        shape: out_shape,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{constant_vec, dot, hstack, matmul, sum, vstack, IntoExpr, VarId};

    fn var(id: usize, n: usize) -> Expr {
        Expr::Var {
            id: VarId(id),
            shape: Shape::vector(n),
        }
    }

    fn values(id: usize, x: Vec<f64>) -> HashMap<VarId, Vec<f64>> {
        [(VarId(id), x)].into()
    }

    #[test]
    fn test_lower_add_with_constant() {
        let x = var(0, 3);
        let e = x.add(constant_vec(vec![1.0, 2.0, 3.0]).unwrap()).unwrap();
        let lin = lower(&e);
        assert_eq!(lin.eval(&values(0, vec![1.0, 1.0, 1.0])), vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_lower_scalar_broadcast() {
        let x = var(0, 3);
        let e = x.add(2.0).unwrap();
        let lin = lower(&e);
        assert_eq!(lin.eval(&values(0, vec![0.0, 1.0, 2.0])), vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_lower_matmul() {
        let a = DMatrix::from_row_slice(2, 3, &[1.0, 2.0, 0.0, 0.0, 1.0, 1.0]);
        let x = var(0, 3);
        let lin = lower(&matmul(a, &x).unwrap());
        assert_eq!(lin.eval(&values(0, vec![1.0, 1.0, 1.0])), vec![3.0, 2.0]);
    }

    #[test]
    fn test_lower_dot_is_scalar() {
        let x = var(0, 3);
        let lin = lower(&dot(&[1.0, 2.0, 3.0], &x).unwrap());
        assert_eq!(lin.size(), 1);
        assert_eq!(lin.eval(&values(0, vec![1.0, 1.0, 1.0])), vec![6.0]);
    }

    #[test]
    fn test_lower_sum() {
        let x = var(0, 4);
        let lin = lower(&sum(&x));
        assert_eq!(lin.eval(&values(0, vec![1.0, 2.0, 3.0, 4.0])), vec![10.0]);
    }

    #[test]
    fn test_lower_vstack_with_scalar_first() {
        let x = var(0, 2);
        let e = vstack(&[3.0_f64.into_expr(), x.clone()]).unwrap();
        let lin = lower(&e);
        assert_eq!(lin.size(), 3);
        assert_eq!(lin.eval(&values(0, vec![5.0, 7.0])), vec![3.0, 5.0, 7.0]);
    }

    #[test]
    fn test_lower_hstack_flattens_column_major() {
        let x = var(0, 2);
        let c = constant_vec(vec![9.0, 8.0]).unwrap();
        let lin = lower(&hstack(&[x, c]).unwrap());
        assert_eq!(lin.size(), 4);
        assert_eq!(
            lin.eval(&values(0, vec![1.0, 2.0])),
            vec![1.0, 2.0, 9.0, 8.0]
        );
    }

    #[test]
    fn test_lower_shared_subexpression() {
        let x = var(0, 2);
        let y = x.scale(2.0).add(&x).unwrap();
        let lin = lower(&y);
        assert_eq!(lin.eval(&values(0, vec![1.0, -1.0])), vec![3.0, -3.0]);
    }
}
