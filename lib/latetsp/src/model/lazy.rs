use anyhow::Result;
use bit_set::BitSet;
use itertools::Itertools;
use ndarray::Array2;
use tracing::*;

use crate::data::{Loc, TspInstance};
use crate::graph::{decompose_cycles, InvariantViolation};
use crate::mip::{constraint, Callback, Constraint, Expression, Model, Variable, Where};
use super::{build_core, CoreVars, LatenessObj};

/// The reduced model: the shared core plus the objective, with no subtour elimination rows.
/// It must be solved with a [`SubtourCb`] attached.
pub fn build(data: &TspInstance, dist: &Array2<f64>, objective: LatenessObj) -> (Model, CoreVars, Option<Variable>) {
    let (mut model, vars) = build_core(data, dist);
    let max_late = objective.apply(&mut model, &vars);
    (model, vars, max_late)
}

/// Arcs whose variable is set in `values` (one entry per [`CoreVars::arcs`]).
pub fn chosen_arcs(vars: &CoreVars, values: &[f64]) -> Vec<(Loc, Loc)> {
    vars.arcs.iter()
        .zip(values)
        .filter(|&(_, &v)| v > 0.5)
        .map(|(&a, _)| a)
        .collect()
}

/// `sum x[i,j] <= |S| - 1` over all arcs with both ends in the cycle `S`.
pub fn subtour_cut(vars: &CoreVars, cycle: &[Loc]) -> Constraint {
    let mut inside = BitSet::with_capacity(vars.n_nodes);
    inside.extend(cycle.iter().copied());
    let lhs: Expression = vars.arcs.iter()
        .filter(|&&(i, j)| inside.contains(i) && inside.contains(j))
        .map(|a| vars.x[a])
        .sum();
    constraint::leq(lhs, (cycle.len() - 1) as f64)
}

/// Cycles of an integer candidate given by its chosen arcs, with the cuts they call for.  A
/// single Hamiltonian cycle needs none; otherwise every cycle shorter than the full node count
/// gets one.
pub fn subtour_cuts(vars: &CoreVars, arcs: &[(Loc, Loc)]) -> Result<(Vec<Vec<Loc>>, Vec<Constraint>), InvariantViolation> {
    let cycles = decompose_cycles(vars.n_nodes, arcs)?;
    if cycles.len() <= 1 {
        return Ok((cycles, Vec::new()));
    }
    let cuts = cycles.iter()
        .filter(|c| c.len() < vars.n_nodes)
        .map(|c| subtour_cut(vars, c))
        .collect();
    Ok((cycles, cuts))
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct CbStats {
    /// Integer-feasible candidates inspected.
    pub n_calls: usize,
    /// Candidates made of more than one cycle.
    pub n_subtours: usize,
    pub n_cuts: usize,
}

/// Rejects integer candidates containing subtours by adding a cut for every offending cycle.
pub struct SubtourCb<'a> {
    vars: &'a CoreVars,
    pub stats: CbStats,
}

impl<'a> SubtourCb<'a> {
    pub fn new(vars: &'a CoreVars) -> Self {
        SubtourCb { vars, stats: CbStats::default() }
    }
}

impl<'a> Callback for SubtourCb<'a> {
    fn callback(&mut self, w: Where) -> Result<()> {
        match w {
            Where::MipSol(mut ctx) => {
                let _s = debug_span!("mipsol", call = self.stats.n_calls).entered();
                self.stats.n_calls += 1;
                let values = ctx.get_solution(self.vars.arc_vars());
                let arcs = chosen_arcs(self.vars, &values);
                trace!(obj = ctx.obj(), ?arcs);

                let (cycles, cuts) = subtour_cuts(self.vars, &arcs)
                    .map_err(|e| {
                        error!(%e, ?arcs, "candidate is not a union of cycles");
                        e
                    })?;

                if !cuts.is_empty() {
                    self.stats.n_subtours += 1;
                    self.stats.n_cuts += cuts.len();
                    debug!(cycles = %fmt_cycles(&cycles), n_cuts = cuts.len(), "subtours found");
                    for c in cuts {
                        trace!(cut = ?c);
                        ctx.add_lazy(c);
                    }
                }
            }
        }
        Ok(())
    }
}

fn fmt_cycles(cycles: &[Vec<Loc>]) -> String {
    cycles.iter().map(|c| c.iter().join("-")).join(" | ")
}
