//! [`MipSolver`] backed by `good_lp`.
//!
//! `good_lp` solves a model in one shot and exposes no hook into the branch-and-bound search, so
//! the lazy-constraint contract is honoured by row generation: every round solves the current
//! model (base constraints plus all lazy constraints so far) and offers the engine's answer to the
//! callback as the integer-feasible candidate.  A round the engine finished to optimality in which
//! the callback adds nothing ends the search with a proven optimum.
//!
//! The remaining wall-clock budget is handed to the engine at the start of every round, so a
//! single round never outlives the time limit by much.
use std::time::{Duration, Instant};
use anyhow::{anyhow, Result};
use good_lp::{ResolutionError, Solution, SolutionStatus, SolverModel, WithTimeLimit};
use tracing::*;

use super::*;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Engine {
    /// Pure-Rust simplex with branch-and-bound.
    MicroLp,
    #[cfg(feature = "highs")]
    Highs,
}

impl Default for Engine {
    #[cfg(feature = "highs")]
    fn default() -> Self { Engine::Highs }

    #[cfg(not(feature = "highs"))]
    fn default() -> Self { Engine::MicroLp }
}

#[derive(Debug, Clone, Default)]
pub struct GoodLpSolver {
    engine: Engine,
}

/// Outcome of a single round.
struct Round {
    values: Values,
    /// The engine proved `values` optimal, rather than stopping at its time limit.
    complete: bool,
}

impl GoodLpSolver {
    pub fn new(engine: Engine) -> Self {
        GoodLpSolver { engine }
    }

    #[inline]
    pub fn engine(&self) -> Engine { self.engine }

    /// Solve `model` with `lazy` appended, giving the engine at most `time_limit`.
    fn solve_round(&self, model: &Model, lazy: &[Constraint], time_limit: Option<Duration>) -> std::result::Result<Round, ResolutionError> {
        // variables are recreated in the same order, so the model's handles stay valid
        let unsolved = model.vars().clone().minimise(model.objective());
        let constraints = model.constrs().iter().chain(lazy).cloned();
        match self.engine {
            Engine::MicroLp => run_model(unsolved.using(good_lp::microlp), constraints, model, time_limit),
            #[cfg(feature = "highs")]
            Engine::Highs => run_model(unsolved.using(good_lp::highs), constraints, model, time_limit),
        }
    }
}

fn run_model<M>(
    mut problem: M,
    constraints: impl Iterator<Item=Constraint>,
    model: &Model,
    time_limit: Option<Duration>,
) -> std::result::Result<Round, ResolutionError>
    where
        M: SolverModel<Error = ResolutionError> + WithTimeLimit
{
    if let Some(limit) = time_limit {
        problem = problem.with_time_limit(limit.as_secs_f64());
    }
    for c in constraints {
        problem.add_constraint(c);
    }
    let solution = problem.solve()?;
    let complete = matches!(solution.status(), SolutionStatus::Optimal);
    let values = model.vars().iter_variables_with_def()
        .map(|(v, _)| (v, solution.value(v)))
        .collect();
    Ok(Round { values, complete })
}


impl MipSolver for GoodLpSolver {
    #[instrument(level = "debug", skip_all, fields(model = %model.name(), engine = ?self.engine))]
    fn optimize(&mut self, model: &Model, params: &Params, mut callback: Option<&mut dyn Callback>) -> Result<SolveReport> {
        let start = Instant::now();
        let timed_out = || params.time_limit.map_or(false, |l| start.elapsed() >= l);
        let mut lazy: Vec<Constraint> = Vec::new();
        let mut rounds = 0usize;
        let mut best_bound = f64::NEG_INFINITY;

        loop {
            if timed_out() {
                info!(rounds, "time limit reached between rounds");
                return Ok(SolveReport::without_incumbent(Status::TimeLimit, best_bound, start.elapsed(), rounds, lazy.len()));
            }

            rounds += 1;
            let remaining = params.time_limit.map(|l| l.saturating_sub(start.elapsed()));
            let Round { values, complete } = match self.solve_round(model, &lazy, remaining) {
                Ok(round) => round,
                Err(ResolutionError::Infeasible) => {
                    debug!(rounds, "infeasible");
                    return Ok(SolveReport::without_incumbent(Status::Infeasible, best_bound, start.elapsed(), rounds, lazy.len()));
                }
                Err(ResolutionError::Unbounded) => {
                    debug!(rounds, "unbounded");
                    return Ok(SolveReport::without_incumbent(Status::Unbounded, best_bound, start.elapsed(), rounds, lazy.len()));
                }
                // the engine ran out of time before finding anything feasible
                Err(e) if timed_out() => {
                    debug!(rounds, err=%e, "stopped by time limit");
                    return Ok(SolveReport::without_incumbent(Status::TimeLimit, best_bound, start.elapsed(), rounds, lazy.len()));
                }
                Err(e) => return Err(anyhow!("solver failed in round {}: {}", rounds, e)),
            };

            let obj = values.eval(model.objective());
            if complete {
                // every round solves a relaxation of the final model
                best_bound = best_bound.max(obj);
            }
            debug!(rounds, obj, complete, n_lazy = lazy.len(), "round solved");

            if let Some(cb) = callback.as_mut() {
                let before = lazy.len();
                cb.callback(Where::MipSol(MipSolCtx::new(&values, obj, &mut lazy)))?;
                if lazy.len() > before {
                    trace!(added = lazy.len() - before, "lazy constraints added");
                    continue;
                }
            }

            let runtime = start.elapsed();
            if complete {
                info!(rounds, obj, n_lazy = lazy.len(), ?runtime, "optimal");
                return Ok(SolveReport {
                    status: Status::Optimal,
                    obj_val: Some(obj),
                    obj_bound: obj,
                    runtime,
                    mip_gap: 0.0,
                    node_count: rounds,
                    lazy_constrs: lazy.len(),
                    values: Some(values),
                });
            }

            if !model.is_feasible(&values, &lazy, FEAS_TOL) {
                info!(rounds, "time limit reached without incumbent");
                return Ok(SolveReport::without_incumbent(Status::TimeLimit, best_bound, runtime, rounds, lazy.len()));
            }
            info!(rounds, obj, "time limit reached with incumbent");
            return Ok(SolveReport {
                status: Status::TimeLimit,
                obj_val: Some(obj),
                obj_bound: best_bound,
                runtime,
                mip_gap: relative_gap(obj, best_bound),
                node_count: rounds,
                lazy_constrs: lazy.len(),
                values: Some(values),
            });
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    /// Minimise `x + y` over binaries with a `>= 1` cut injected from the callback.
    struct AtLeastOne {
        x: Variable,
        y: Variable,
        calls: usize,
    }

    impl Callback for AtLeastOne {
        fn callback(&mut self, w: Where) -> Result<()> {
            match w {
                Where::MipSol(mut ctx) => {
                    self.calls += 1;
                    let vals = ctx.get_solution(vec![self.x, self.y]);
                    if vals[0] + vals[1] < 0.5 {
                        ctx.add_lazy(constraint::geq(self.x + self.y, 1.0));
                    }
                }
            }
            Ok(())
        }
    }

    /// Takes `delay` over every candidate, then behaves like [`AtLeastOne`].
    struct Slow {
        inner: AtLeastOne,
        delay: Duration,
    }

    impl Callback for Slow {
        fn callback(&mut self, w: Where) -> Result<()> {
            thread::sleep(self.delay);
            self.inner.callback(w)
        }
    }

    fn small_model() -> (Model, Variable, Variable) {
        let mut m = Model::new("small");
        let x = m.add_binvar("x");
        let y = m.add_binvar("y");
        m.set_objective(2.0 * x + y);
        (m, x, y)
    }

    fn limit(ms: u64) -> Params {
        Params { time_limit: Some(Duration::from_millis(ms)), accept_incumbent: false }
    }

    #[test]
    fn one_shot() -> Result<()> {
        let (mut m, x, y) = small_model();
        m.add_constr("cover", constraint::geq(x + y, 1.0));
        let report = GoodLpSolver::default().optimize(&m, &Params::default(), None)?;
        assert_eq!(report.status, Status::Optimal);
        assert!((report.obj_val.unwrap() - 1.0).abs() < 1e-6);
        assert!(report.value(y).unwrap() > 0.5);
        assert!(report.value(x).unwrap() < 0.5);
        assert_eq!(report.mip_gap, 0.0);
        assert_eq!(report.node_count, 1);
        Ok(())
    }

    #[test]
    fn lazy_rounds() -> Result<()> {
        let (m, x, y) = small_model();
        let mut cb = AtLeastOne { x, y, calls: 0 };
        let report = GoodLpSolver::default().optimize(&m, &Params::default(), Some(&mut cb))?;
        assert_eq!(report.status, Status::Optimal);
        assert!((report.obj_val.unwrap() - 1.0).abs() < 1e-6);
        assert_eq!(cb.calls, 2);
        assert_eq!(report.node_count, 2);
        assert_eq!(report.lazy_constrs, 1);
        Ok(())
    }

    #[test]
    fn infeasible() -> Result<()> {
        let (mut m, x, y) = small_model();
        m.add_constr("both", constraint::geq(x + y, 3.0));
        let report = GoodLpSolver::default().optimize(&m, &Params::default(), None)?;
        assert_eq!(report.status, Status::Infeasible);
        assert!(report.values.is_none());
        Ok(())
    }

    #[test]
    fn zero_time_limit() -> Result<()> {
        let (m, _, _) = small_model();
        let report = GoodLpSolver::default().optimize(&m, &limit(0), None)?;
        assert_eq!(report.status, Status::TimeLimit);
        assert_eq!(report.node_count, 0);
        Ok(())
    }

    #[test]
    fn finished_round_past_the_limit_is_optimal() -> Result<()> {
        // the second round is solved to optimality and accepted after the clock has run out
        let (m, x, y) = small_model();
        let mut cb = Slow { inner: AtLeastOne { x, y, calls: 0 }, delay: Duration::from_millis(40) };
        let report = GoodLpSolver::default().optimize(&m, &limit(60), Some(&mut cb))?;
        assert!(report.runtime >= Duration::from_millis(60));
        assert_eq!(report.status, Status::Optimal);
        assert!((report.obj_val.unwrap() - 1.0).abs() < 1e-6);
        assert_eq!(report.mip_gap, 0.0);
        assert_eq!(report.node_count, 2);
        Ok(())
    }

    #[test]
    fn cut_after_the_limit_stops_the_search() -> Result<()> {
        let (m, x, y) = small_model();
        let mut cb = Slow { inner: AtLeastOne { x, y, calls: 0 }, delay: Duration::from_millis(40) };
        let report = GoodLpSolver::default().optimize(&m, &limit(20), Some(&mut cb))?;
        assert_eq!(report.status, Status::TimeLimit);
        assert_eq!(cb.inner.calls, 1);
        assert_eq!(report.node_count, 1);
        assert_eq!(report.lazy_constrs, 1);
        assert!(report.values.is_none());
        // the first round was a complete relaxation
        assert_eq!(report.obj_bound, 0.0);
        Ok(())
    }
}
