//! Canonicalization: expression trees to standard form.

mod lin_expr;
mod lower;

pub use lin_expr::LinExpr;
pub use lower::lower;
