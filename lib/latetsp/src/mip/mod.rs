//! A small, solver-agnostic MILP layer over `good_lp`'s algebra: the model is owned here and
//! handed to a [`MipSolver`] backend, which reports back through [`SolveReport`].  Lazy
//! constraints are injected from a [`Callback`] fired at every integer-feasible candidate.
use std::fmt;
use std::iter::FromIterator;
use std::time::Duration;
use anyhow::Result;
use good_lp::{variable, ProblemVariables, SolutionStatus};

use crate::Map;

pub mod backend;

pub use backend::{GoodLpSolver, Engine};
pub use good_lp::{constraint, Constraint, Expression, Variable, VariableDefinition};

/// Feasibility tolerance used when checking candidate values against constraints and bounds.
pub const FEAS_TOL: f64 = 1e-6;

/// Values of a model's variables at one point.  Variables never set read as zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Values(Map<Variable, f64>);

impl Values {
    #[inline]
    pub fn set(&mut self, v: Variable, x: f64) {
        self.0.insert(v, x);
    }

    #[inline]
    pub fn get(&self, v: Variable) -> f64 {
        self.0.get(&v).copied().unwrap_or(0.0)
    }

    pub fn eval(&self, expr: &Expression) -> f64 {
        expr.eval_with(self)
    }
}

impl FromIterator<(Variable, f64)> for Values {
    fn from_iter<I: IntoIterator<Item=(Variable, f64)>>(iter: I) -> Self {
        Values(iter.into_iter().collect())
    }
}

impl good_lp::Solution for Values {
    fn status(&self) -> SolutionStatus { SolutionStatus::Optimal }

    fn value(&self, variable: Variable) -> f64 { self.get(variable) }
}

/// Amount by which `values` violate `c`; zero when satisfied.
pub fn violation(c: &Constraint, values: &Values) -> f64 {
    // stored as `expr <= 0` or `expr == 0`
    let a = values.eval(c.expression());
    if c.is_equality() { a.abs() } else { a.max(0.0) }
}

/// Variables, named constraints and a linear minimisation objective.
#[derive(Clone)]
pub struct Model {
    name: String,
    vars: ProblemVariables,
    constrs: Vec<Constraint>,
    objective: Expression,
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("name", &self.name)
            .field("num_vars", &self.num_vars())
            .field("num_constrs", &self.num_constrs())
            .finish()
    }
}

impl Model {
    pub fn new(name: impl Into<String>) -> Self {
        Model { name: name.into(), vars: ProblemVariables::new(), constrs: Vec::new(), objective: Expression::default() }
    }

    #[inline]
    pub fn name(&self) -> &str { &self.name }

    pub fn add_binvar(&mut self, name: impl Into<String>) -> Variable {
        self.vars.add(variable().binary().name(name))
    }

    /// Continuous variable in `[lb, ub]`; infinite bounds are left open.
    pub fn add_ctsvar(&mut self, name: impl Into<String>, lb: f64, ub: f64) -> Variable {
        debug_assert!(lb <= ub);
        let mut def = variable().name(name);
        if lb.is_finite() { def = def.min(lb); }
        if ub.is_finite() { def = def.max(ub); }
        self.vars.add(def)
    }

    pub fn add_constr(&mut self, name: impl Into<String>, c: Constraint) -> usize {
        self.constrs.push(c.set_name(name.into()));
        self.constrs.len() - 1
    }

    pub fn set_objective(&mut self, obj: impl Into<Expression>) {
        self.objective = obj.into();
    }

    #[inline]
    pub fn vars(&self) -> &ProblemVariables { &self.vars }

    pub fn var(&self, v: Variable) -> Option<&VariableDefinition> {
        self.vars.iter_variables_with_def().find(|&(x, _)| x == v).map(|(_, d)| d)
    }

    #[inline]
    pub fn constrs(&self) -> &[Constraint] { &self.constrs }

    #[inline]
    pub fn objective(&self) -> &Expression { &self.objective }

    #[inline]
    pub fn num_vars(&self) -> usize { self.vars.len() }

    #[inline]
    pub fn num_constrs(&self) -> usize { self.constrs.len() }

    /// Render an expression or constraint with variable names.
    pub fn display<'a>(&'a self, x: &'a impl good_lp::variable::FormatWithVars) -> impl fmt::Display + 'a {
        self.vars.display(x)
    }

    /// Check bounds, integrality, the model's constraints and any `extra` (lazy) constraints.
    pub fn is_feasible(&self, values: &Values, extra: &[Constraint], tol: f64) -> bool {
        let vars_ok = self.vars.iter_variables_with_def().all(|(v, d)| {
            let x = values.get(v);
            x.is_finite()
                && x >= d.get_min() - tol
                && x <= d.get_max() + tol
                && (!d.is_integer() || (x - x.round()).abs() <= tol)
        });
        vars_ok && self.constrs.iter().chain(extra).all(|c| violation(c, values) <= tol)
    }
}

/// Terminal status of a solve.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Status {
    Optimal,
    Infeasible,
    TimeLimit,
    Unbounded,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Optimal => "optimal",
            Status::Infeasible => "infeasible",
            Status::TimeLimit => "time-limit",
            Status::Unbounded => "unbounded",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Params {
    /// Wall-clock limit for the whole solve, cut rounds included.
    pub time_limit: Option<Duration>,
    /// Return the best feasible incumbent when the time limit stops the search early.
    pub accept_incumbent: bool,
}

/// What the solver hands back after `optimize`.
#[derive(Debug, Clone)]
pub struct SolveReport {
    pub status: Status,
    /// Objective of the incumbent, if one exists.
    pub obj_val: Option<f64>,
    pub obj_bound: f64,
    pub runtime: Duration,
    pub mip_gap: f64,
    pub node_count: usize,
    pub lazy_constrs: usize,
    /// Values of the incumbent.
    pub values: Option<Values>,
}

impl SolveReport {
    pub fn without_incumbent(status: Status, obj_bound: f64, runtime: Duration, node_count: usize, lazy_constrs: usize) -> Self {
        SolveReport {
            status,
            obj_val: None,
            obj_bound,
            runtime,
            mip_gap: f64::INFINITY,
            node_count,
            lazy_constrs,
            values: None,
        }
    }

    #[inline]
    pub fn value(&self, v: Variable) -> Option<f64> {
        self.values.as_ref().map(|x| x.get(v))
    }
}

/// Relative gap between an objective value and a bound.
pub fn relative_gap(obj: f64, bound: f64) -> f64 {
    if obj == bound {
        return 0.0;
    }
    (obj - bound).abs() / obj.abs().max(1e-10)
}

/// Context of an integer-feasible candidate handed to a [`Callback`].
pub struct MipSolCtx<'a> {
    values: &'a Values,
    obj: f64,
    lazy: &'a mut Vec<Constraint>,
}

impl<'a> MipSolCtx<'a> {
    pub fn new(values: &'a Values, obj: f64, lazy: &'a mut Vec<Constraint>) -> Self {
        MipSolCtx { values, obj, lazy }
    }

    pub fn get_solution<I: IntoIterator<Item=Variable>>(&self, vars: I) -> Vec<f64> {
        vars.into_iter().map(|v| self.values.get(v)).collect()
    }

    #[inline]
    pub fn obj(&self) -> f64 { self.obj }

    /// Append a lazy constraint.  It applies to the rest of the search and is never removed.
    pub fn add_lazy(&mut self, c: Constraint) {
        self.lazy.push(c);
    }
}

pub enum Where<'a> {
    MipSol(MipSolCtx<'a>),
}

pub trait Callback {
    fn callback(&mut self, w: Where) -> Result<()>;
}

/// The capability surface required from a MILP engine.
pub trait MipSolver {
    fn optimize(&mut self, model: &Model, params: &Params, callback: Option<&mut dyn Callback>) -> Result<SolveReport>;
}


#[cfg(test)]
mod tests {
    use super::*;
    use good_lp::IntoAffineExpression;

    #[test]
    fn constraints_are_normalised() {
        let mut m = Model::new("t");
        let x = m.add_binvar("x");
        let t = m.add_ctsvar("t", 0.0, 10.0);
        let c = constraint::geq(t + 2.0, 5.0 * x + 1.0);
        // 5 x + 1 - t - 2 <= 0
        assert!(!c.is_equality());
        assert_eq!(c.expression().constant(), -1.0);

        let mut values = Values::default();
        values.set(x, 1.0);
        values.set(t, 2.0);
        assert_eq!(violation(&c, &values), 2.0);
        values.set(x, 0.0);
        assert_eq!(violation(&c, &values), 0.0);
        let shown = m.display(&c).to_string();
        assert!(shown.contains("x") && shown.contains("t"), "{}", shown);
    }

    #[test]
    fn feasibility_check() {
        let mut m = Model::new("t");
        let x = m.add_binvar("x");
        let y = m.add_binvar("y");
        m.add_constr("sum", constraint::eq(x + y, 1.0));
        assert_eq!(m.constrs()[0].name(), Some("sum"));
        assert_eq!(m.var(y).map(|d| d.get_name()), Some("y"));

        let point = |a: f64, b: f64| -> Values { vec![(x, a), (y, b)].into_iter().collect() };
        assert!(m.is_feasible(&point(1.0, 0.0), &[], FEAS_TOL));
        assert!(!m.is_feasible(&point(0.5, 0.5), &[], FEAS_TOL));
        assert!(!m.is_feasible(&point(1.0, 1.0), &[], FEAS_TOL));
        assert!(!m.is_feasible(&point(1.0, 0.0), &[constraint::leq(x, 0.0)], FEAS_TOL));
    }

    #[test]
    fn unset_values_read_as_zero() {
        let mut m = Model::new("t");
        let x = m.add_ctsvar("x", 0.0, f64::INFINITY);
        let y = m.add_ctsvar("y", 0.0, f64::INFINITY);
        m.set_objective(3.0 * x + y + 1.0);
        let mut values = Values::default();
        values.set(y, 2.0);
        assert_eq!(values.get(x), 0.0);
        assert_eq!(values.eval(m.objective()), 3.0);
        assert_eq!(values.eval(&(x + 0.0)), x.eval_with(&values));
    }

    #[test]
    fn gap() {
        assert_eq!(relative_gap(5.0, 5.0), 0.0);
        assert!((relative_gap(10.0, 8.0) - 0.2).abs() < 1e-12);
        assert_eq!(relative_gap(0.0, 0.0), 0.0);
    }
}
