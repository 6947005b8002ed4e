//! Variable handles.

use super::expression::{Expr, IntoExpr};
use super::shape::Shape;

/// Identifier of a variable inside its model.
///
/// Ids index the model's variable arena in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarId(pub(crate) usize);

impl VarId {
    /// Position of the variable in declaration order.
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Handle to a variable declared in a [`Model`](crate::model::Model).
///
/// Handles are cheap to copy and only valid for the model that created
/// them. A variable is used in expressions by converting it with
/// [`IntoExpr`] or [`Variable::to_expr`].
#[derive(Debug, Clone)]
pub struct Variable {
    pub(crate) id: VarId,
    pub(crate) shape: Shape,
}

impl Variable {
    pub(crate) fn new(id: VarId, shape: Shape) -> Self {
        Variable { id, shape }
    }

    /// The variable's id within its model.
    pub fn id(&self) -> VarId {
        self.id
    }

    /// The declared shape.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Total number of scalar entries.
    pub fn size(&self) -> usize {
        self.shape.size()
    }

    /// View the variable as an expression.
    pub fn to_expr(&self) -> Expr {
        Expr::Var {
            id: self.id,
            shape: self.shape.clone(),
        }
    }
}

impl IntoExpr for Variable {
    fn into_expr(self) -> Expr {
        self.to_expr()
    }
}

impl IntoExpr for &Variable {
    fn into_expr(self) -> Expr {
        self.to_expr()
    }
}
