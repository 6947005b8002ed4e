//! The model: declarations, solving, and solution queries.
//!
//! A [`Model`] owns every declared variable and constraint and hands out
//! cheap handles into its arenas. Declarations are validated eagerly;
//! solving lowers the model to standard form, runs Clarabel, and stores the
//! solution for later queries. Solver-side failures such as infeasibility
//! are reported through [`SolutionStatus`], never as errors.

use std::collections::{HashMap, HashSet};

use crate::canon::{lower, LinExpr};
use crate::domain::Domain;
use crate::error::{ModelError, Result};
use crate::expr::{Expr, IntoExpr, Shape, VarId, Variable};
use crate::solver::{
    self, stuff_problem, triangle_to_full, unrotate_dual, Binding, DualSpan, Settings,
    VariableMap,
};

/// Objective sense.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    Minimize,
    Maximize,
}

/// Status of one side (primal or dual) of a solution.
///
/// The two sides are reported independently: an infeasible problem has an
/// undefined primal solution but a dual infeasibility certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolutionStatus {
    /// Solved to optimality within tolerances.
    Optimal,
    /// Feasible but short of the optimality tolerances.
    Feasible,
    /// The values form an infeasibility or unboundedness certificate.
    Certificate,
    /// The solver stopped without a conclusion.
    Unknown,
    /// No meaningful values on this side.
    Undefined,
}

/// Identifier of a constraint inside its model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConId(pub(crate) usize);

/// Handle to a constraint declared in a [`Model`].
#[derive(Debug, Clone)]
pub struct Constraint {
    pub(crate) id: ConId,
    pub(crate) size: usize,
}

impl Constraint {
    /// The constraint's id within its model.
    pub fn id(&self) -> ConId {
        self.id
    }

    /// Number of scalar rows.
    pub fn size(&self) -> usize {
        self.size
    }
}

/// Result of one solve call.
#[derive(Debug, Clone)]
pub struct SolveOutcome {
    pub primal_status: SolutionStatus,
    pub dual_status: SolutionStatus,
    /// Objective value when the primal side is optimal or feasible.
    pub objective: Option<f64>,
    pub iterations: u32,
    pub solve_time: f64,
}

/// Lifecycle of a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelState {
    /// Declarations are being collected; nothing solved yet or the model
    /// changed since the last solve.
    #[default]
    Building,
    /// The last solve ran to completion.
    Solved,
    /// The last solve aborted with a solver error.
    Failed,
}

struct VarEntry {
    name: String,
    shape: Shape,
    domain: Domain,
}

struct ConEntry {
    name: Option<String>,
    expr: Expr,
    domain: Domain,
}

struct Solution {
    primal_status: SolutionStatus,
    dual_status: SolutionStatus,
    objective: Option<f64>,
    /// Per variable, indexed by declaration order.
    var_values: Vec<Vec<f64>>,
    /// Per constraint: value of the constraint expression.
    con_levels: Vec<Vec<f64>>,
    /// Per constraint: dual values mapped back from the solver rows.
    con_duals: Vec<Vec<f64>>,
}

/// A conic optimization model.
#[derive(Default)]
pub struct Model {
    name: String,
    vars: Vec<VarEntry>,
    cons: Vec<ConEntry>,
    names: HashSet<String>,
    objective: Option<(Sense, Expr)>,
    state: ModelState,
    solution: Option<Solution>,
}

impl Model {
    /// Create an empty model.
    pub fn new(name: impl Into<String>) -> Self {
        Model {
            name: name.into(),
            vars: Vec::new(),
            cons: Vec::new(),
            names: HashSet::new(),
            objective: None,
            state: ModelState::Building,
            solution: None,
        }
    }

    /// The model's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ModelState {
        self.state
    }

    /// Declare a variable with the given shape and domain.
    ///
    /// Names share one namespace with constraint names and must be unique.
    /// The domain must fit the shape; a quadratic cone of dimension n only
    /// accepts vectors of length n, and a semidefinite cone of order n only
    /// accepts n x n matrices.
    pub fn variable(
        &mut self,
        name: impl Into<String>,
        shape: impl Into<Shape>,
        domain: Domain,
    ) -> Result<Variable> {
        let name = name.into();
        let shape = shape.into();
        if self.names.contains(&name) {
            return Err(ModelError::DuplicateName(name));
        }
        if shape.dims().contains(&0) {
            return Err(ModelError::Shape(format!(
                "variable shape {shape} has a zero dimension"
            )));
        }
        domain.conforms(&shape).map_err(ModelError::Shape)?;

        let id = VarId(self.vars.len());
        self.names.insert(name.clone());
        self.vars.push(VarEntry {
            name,
            shape: shape.clone(),
            domain,
        });
        self.touch();
        Ok(Variable::new(id, shape))
    }

    /// Declare an unrestricted variable.
    pub fn free_variable(
        &mut self,
        name: impl Into<String>,
        shape: impl Into<Shape>,
    ) -> Result<Variable> {
        self.variable(name, shape, Domain::Free)
    }

    /// Restrict an affine expression to a domain.
    ///
    /// The expression's shape must fit the domain; mismatches are reported
    /// as dimension errors at this call.
    pub fn constraint(&mut self, expr: impl IntoExpr, domain: Domain) -> Result<Constraint> {
        self.add_constraint(None, expr.into_expr(), domain)
    }

    /// Restrict an affine expression to a domain, under a name.
    pub fn constraint_named(
        &mut self,
        name: impl Into<String>,
        expr: impl IntoExpr,
        domain: Domain,
    ) -> Result<Constraint> {
        self.add_constraint(Some(name.into()), expr.into_expr(), domain)
    }

    fn add_constraint(
        &mut self,
        name: Option<String>,
        expr: Expr,
        domain: Domain,
    ) -> Result<Constraint> {
        if let Some(name) = &name {
            if self.names.contains(name) {
                return Err(ModelError::DuplicateName(name.clone()));
            }
        }
        let shape = expr.shape();
        domain
            .conforms(&shape)
            .map_err(|_| ModelError::dimension("constraint", &domain, shape.clone()))?;

        let id = ConId(self.cons.len());
        let size = shape.size();
        if let Some(name) = &name {
            self.names.insert(name.clone());
        }
        self.cons.push(ConEntry { name, expr, domain });
        self.touch();
        Ok(Constraint { id, size })
    }

    /// Set the objective. The expression must be scalar.
    ///
    /// Calling this again replaces the previous objective. A model without
    /// an objective solves as a feasibility problem.
    pub fn objective(&mut self, sense: Sense, expr: impl IntoExpr) -> Result<()> {
        let expr = expr.into_expr();
        let shape = expr.shape();
        if !shape.is_scalar() {
            return Err(ModelError::dimension("objective", Shape::scalar(), shape));
        }
        self.objective = Some((sense, expr));
        self.touch();
        Ok(())
    }

    /// Solve with default settings.
    pub fn solve(&mut self) -> Result<SolveOutcome> {
        self.solve_with(&Settings::default())
    }

    /// Solve with the given settings.
    ///
    /// Infeasibility, unboundedness, and solver stalls are reported through
    /// the returned statuses; `Err` is reserved for failures to set up or
    /// run the solver at all.
    pub fn solve_with(&mut self, settings: &Settings) -> Result<SolveOutcome> {
        log::debug!(
            "solving model {:?}: {} variables, {} constraints",
            self.name,
            self.vars.len(),
            self.cons.len()
        );

        let sizes: Vec<usize> = self.vars.iter().map(|v| v.shape.size()).collect();
        let var_map = VariableMap::from_sizes(&sizes);

        // Variable domains become rows too, ahead of the constraints.
        let mut bindings = Vec::new();
        for (i, var) in self.vars.iter().enumerate() {
            if matches!(var.domain, Domain::Free) {
                continue;
            }
            bindings.push(Binding {
                expr: LinExpr::variable(VarId(i), var.shape.clone()),
                domain: var.domain.clone(),
                con: None,
            });
        }
        let con_exprs: Vec<LinExpr> = self.cons.iter().map(|c| lower(&c.expr)).collect();
        for (i, (con, lin)) in self.cons.iter().zip(&con_exprs).enumerate() {
            bindings.push(Binding {
                expr: lin.clone(),
                domain: con.domain.clone(),
                con: Some(i),
            });
        }

        let (sense, objective) = match &self.objective {
            Some((sense, expr)) => (*sense, lower(expr)),
            None => (Sense::Minimize, LinExpr::zeros(Shape::scalar())),
        };
        let stuffed_objective = match sense {
            Sense::Minimize => objective,
            Sense::Maximize => objective.scale(-1.0),
        };

        let stuffed = stuff_problem(&stuffed_objective, &bindings, &var_map, self.cons.len())?;

        let raw = match solver::solve(&stuffed, settings) {
            Ok(raw) => raw,
            Err(e) => {
                self.state = ModelState::Failed;
                return Err(e);
            }
        };

        let objective = match sense {
            Sense::Minimize => raw.objective,
            Sense::Maximize => raw.objective.map(|v| -v),
        };

        let var_values: Vec<Vec<f64>> = (0..self.vars.len())
            .map(|i| {
                let (start, size) = var_map.span(i);
                raw.x[start..start + size].to_vec()
            })
            .collect();

        let value_map: HashMap<VarId, Vec<f64>> = var_values
            .iter()
            .enumerate()
            .map(|(i, v)| (VarId(i), v.clone()))
            .collect();
        let con_levels: Vec<Vec<f64>> = con_exprs.iter().map(|e| e.eval(&value_map)).collect();

        let con_duals: Vec<Vec<f64>> = stuffed
            .dual_spans
            .iter()
            .map(|span| extract_dual(span, &raw.z))
            .collect();

        self.solution = Some(Solution {
            primal_status: raw.primal_status,
            dual_status: raw.dual_status,
            objective,
            var_values,
            con_levels,
            con_duals,
        });
        self.state = ModelState::Solved;

        log::debug!(
            "model {:?} solved: primal {:?}, dual {:?}, {} iterations",
            self.name,
            raw.primal_status,
            raw.dual_status,
            raw.iterations
        );

        Ok(SolveOutcome {
            primal_status: raw.primal_status,
            dual_status: raw.dual_status,
            objective,
            iterations: raw.iterations,
            solve_time: raw.solve_time,
        })
    }

    /// Status of the primal solution from the last solve.
    pub fn primal_status(&self) -> Result<SolutionStatus> {
        Ok(self.solution()?.primal_status)
    }

    /// Status of the dual solution from the last solve.
    pub fn dual_status(&self) -> Result<SolutionStatus> {
        Ok(self.solution()?.dual_status)
    }

    /// Objective value from the last solve, when the primal side has one.
    pub fn objective_value(&self) -> Result<Option<f64>> {
        Ok(self.solution()?.objective)
    }

    /// Primal values of a variable or the level of a constraint, flattened
    /// column-major.
    pub fn primal_value<I: SolutionItem>(&self, item: &I) -> Result<Vec<f64>> {
        item.primal_in(self)
    }

    /// Dual values of a constraint, flattened column-major.
    ///
    /// Lower-bound duals are nonnegative at optimality and upper-bound
    /// duals nonpositive; a two-sided range reports the lower dual minus
    /// the upper dual. Equality duals carry the solver's sign convention
    /// for the multiplier of `expr - value`.
    pub fn dual_value(&self, constraint: &Constraint) -> Result<Vec<f64>> {
        let solution = self.solution()?;
        solution
            .con_duals
            .get(constraint.id.0)
            .cloned()
            .ok_or(ModelError::NotSolved)
    }

    /// Name of a constraint, if it was given one.
    pub fn constraint_name(&self, constraint: &Constraint) -> Option<&str> {
        self.cons
            .get(constraint.id.0)
            .and_then(|c| c.name.as_deref())
    }

    /// Name of a variable.
    pub fn variable_name(&self, variable: &Variable) -> Option<&str> {
        self.vars.get(variable.id.index()).map(|v| v.name.as_str())
    }

    fn solution(&self) -> Result<&Solution> {
        self.solution.as_ref().ok_or(ModelError::NotSolved)
    }

    /// Any declaration drops the model back into the building state. The
    /// previous solution stays queryable until the next solve, but handles
    /// declared after it report as unsolved.
    fn touch(&mut self) {
        self.state = ModelState::Building;
    }
}

fn extract_dual(span: &DualSpan, z: &[f64]) -> Vec<f64> {
    match span {
        DualSpan::Empty { len } => vec![0.0; *len],
        DualSpan::Rows { start, len, sign } => z[*start..*start + *len]
            .iter()
            .map(|v| sign * v)
            .collect(),
        DualSpan::Range {
            lo_start,
            hi_start,
            len,
        } => (0..*len).map(|i| z[lo_start + i] - z[hi_start + i]).collect(),
        DualSpan::Rotated { start, len } => unrotate_dual(&z[*start..*start + *len]),
        DualSpan::Psd { start, order } => {
            let tri = order * (order + 1) / 2;
            triangle_to_full(&z[*start..*start + tri], *order)
        }
    }
}

/// Model items whose primal values can be queried after a solve.
pub trait SolutionItem: sealed::Sealed {
    #[doc(hidden)]
    fn primal_in(&self, model: &Model) -> Result<Vec<f64>>;
}

impl SolutionItem for Variable {
    fn primal_in(&self, model: &Model) -> Result<Vec<f64>> {
        let solution = model.solution()?;
        solution
            .var_values
            .get(self.id.index())
            .cloned()
            .ok_or(ModelError::NotSolved)
    }
}

impl SolutionItem for Constraint {
    fn primal_in(&self, model: &Model) -> Result<Vec<f64>> {
        let solution = model.solution()?;
        solution
            .con_levels
            .get(self.id.0)
            .cloned()
            .ok_or(ModelError::NotSolved)
    }
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for crate::expr::Variable {}
    impl Sealed for super::Constraint {}
}
