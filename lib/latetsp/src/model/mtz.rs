use ndarray::Array2;
use tracing::*;

use crate::data::TspInstance;
use crate::mip::{constraint, Model, Variable};
use super::{build_core, CoreVars, LatenessObj};

/// Add an order variable `u[i]` in `[1, n]` for every stop and the constraints
/// `u[i] - u[j] + n x[i,j] <= n - 1` for every pair of distinct stops, where `n` is the number of
/// stops.  Any cycle avoiding the depot violates one of them.  Returns the order variables, with
/// `None` for the depot.
#[instrument(level = "debug", skip_all)]
pub fn add_order_constraints(model: &mut Model, vars: &CoreVars) -> Vec<Option<Variable>> {
    let n = (vars.n_nodes - 1) as f64;
    let mut order = vec![None];
    order.extend(vars.stops().map(|i| Some(model.add_ctsvar(format!("u[{}]", i), 1.0, n))));

    for &(i, j) in &vars.arcs {
        if let (Some(u_i), Some(u_j)) = (order[i], order[j]) {
            model.add_constr(
                format!("mtz[{},{}]", i, j),
                constraint::leq(u_i - u_j + n * vars.x[&(i, j)], n - 1.0),
            );
        }
    }
    order
}

/// The complete model, ready to be solved without a callback.
pub fn build(data: &TspInstance, dist: &Array2<f64>, objective: LatenessObj) -> (Model, CoreVars, Option<Variable>) {
    let (mut model, vars) = build_core(data, dist);
    add_order_constraints(&mut model, &vars);
    let max_late = objective.apply(&mut model, &vars);
    (model, vars, max_late)
}
