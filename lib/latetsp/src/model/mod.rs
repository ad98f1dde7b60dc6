//! MILP formulations of the single-vehicle TSP with deadlines.
//!
//! Both formulations share the same core: an arc variable `x[i,j]` for every ordered pair of
//! distinct locations, an arrival time per location and a lateness per location, linked by
//! degree constraints, big-M time propagation and lateness definitions.  They differ only in how
//! subtours are excluded: [`mtz`] adds order variables up front, [`lazy`] cuts them off as they
//! appear in integer-feasible candidates.
use std::fmt;
use std::str::FromStr;
use anyhow::{bail, Context, Error, Result};
use ndarray::Array2;
use tracing::*;

use crate::Map;
use crate::data::{Loc, TspInstance, TspInstanceExt, DEPOT};
use crate::mip::{constraint, Expression, MipSolver, Model, Params, Variable};
use crate::solution::{self, Solution};

pub mod mtz;
pub mod lazy;
pub mod objective;

pub use objective::LatenessObj;

/// How subtours are excluded.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Formulation {
    /// Miller-Tucker-Zemlin order variables.
    Mtz,
    /// Subtour elimination cuts added from the solver callback.
    Lazy,
}

impl Default for Formulation {
    fn default() -> Self { Formulation::Mtz }
}

impl FromStr for Formulation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mtz" => Ok(Formulation::Mtz),
            "lazy" => Ok(Formulation::Lazy),
            _ => bail!("unknown formulation `{}` (expected `mtz` or `lazy`)", s),
        }
    }
}

impl fmt::Display for Formulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Formulation::Mtz => "mtz",
            Formulation::Lazy => "lazy",
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct SolveOptions {
    pub formulation: Formulation,
    pub objective: LatenessObj,
    pub params: Params,
}

/// Variables of the shared core model.
#[derive(Debug, Clone)]
pub struct CoreVars {
    pub n_nodes: usize,
    /// Ordered pairs `(i, j)`, `i != j`, in the order their variables were created.
    pub arcs: Vec<(Loc, Loc)>,
    pub x: Map<(Loc, Loc), Variable>,
    pub arrival: Vec<Variable>,
    pub lateness: Vec<Variable>,
    pub big_m: f64,
}

impl CoreVars {
    #[inline]
    pub fn stops(&self) -> impl Iterator<Item=Loc> {
        1..self.n_nodes
    }

    pub fn arc_vars(&self) -> impl Iterator<Item=Variable> + '_ {
        self.arcs.iter().map(move |a| self.x[a])
    }
}

/// Build the variables and constraints common to every formulation.  No objective is set.
#[instrument(level = "debug", skip(data, dist), fields(instance = %data.id))]
pub fn build_core(data: &TspInstance, dist: &Array2<f64>) -> (Model, CoreVars) {
    let n = data.num_locations();
    let big_m = data.big_m(dist);
    let mut model = Model::new(data.id.clone());

    let mut arcs = Vec::with_capacity(n * (n - 1));
    let mut x = Map::default();
    for i in 0..n {
        for j in 0..n {
            if i != j {
                x.insert((i, j), model.add_binvar(format!("x[{},{}]", i, j)));
                arcs.push((i, j));
            }
        }
    }

    // the tour leaves the depot at time zero and the depot is never late
    let arrival: Vec<_> = (0..n)
        .map(|i| {
            let ub = if i == DEPOT { 0.0 } else { big_m };
            model.add_ctsvar(format!("t[{}]", i), 0.0, ub)
        })
        .collect();
    let lateness: Vec<_> = (0..n)
        .map(|i| {
            let ub = if i == DEPOT { 0.0 } else { f64::INFINITY };
            model.add_ctsvar(format!("L[{}]", i), 0.0, ub)
        })
        .collect();

    for i in 0..n {
        let out_arcs: Expression = (0..n).filter(|&j| j != i).map(|j| x[&(i, j)]).sum();
        model.add_constr(format!("out[{}]", i), constraint::eq(out_arcs, 1.0));
        let in_arcs: Expression = (0..n).filter(|&j| j != i).map(|j| x[&(j, i)]).sum();
        model.add_constr(format!("in[{}]", i), constraint::eq(in_arcs, 1.0));
    }

    for &(i, j) in &arcs {
        if j == DEPOT {
            continue;
        }
        // t[j] >= t[i] + s[i] + d(i,j) - M (1 - x[i,j])
        let delay = data.locations[i].service_time + dist[[i, j]];
        model.add_constr(
            format!("time[{},{}]", i, j),
            constraint::geq(arrival[j], arrival[i] + (delay - big_m) + big_m * x[&(i, j)]),
        );
    }

    for i in 1..n {
        model.add_constr(
            format!("late[{}]", i),
            constraint::geq(lateness[i], arrival[i] - data.locations[i].deadline),
        );
    }

    debug!(n_vars = model.num_vars(), n_constrs = model.num_constrs(), big_m, "core model built");
    let vars = CoreVars { n_nodes: n, arcs, x, arrival, lateness, big_m };
    (model, vars)
}

/// Validate `data`, build the requested formulation and solve it.
///
/// Returns `Ok(None)` when the solver finishes without a solution that may be reported: anything
/// other than a proven optimum, unless `params.accept_incumbent` is set and the time limit stopped
/// the search with an incumbent in hand.  Malformed instances and broken solver invariants are
/// errors.
#[instrument(level = "info", skip_all, fields(instance = %data.id, formulation = %options.formulation, objective = %options.objective))]
pub fn solve(data: &TspInstance, options: &SolveOptions, solver: &mut impl MipSolver) -> Result<Option<Solution>> {
    data.validate().with_context(|| format!("instance {} cannot be modelled", data.id))?;
    let dist = data.distance_matrix();

    match options.formulation {
        Formulation::Mtz => {
            let (model, vars, max_late) = mtz::build(data, &dist, options.objective);
            let report = solver.optimize(&model, &options.params, None)?;
            solution::extract(data, &vars, max_late, &report, &options.params, None)
        }
        Formulation::Lazy => {
            let (model, vars, max_late) = lazy::build(data, &dist, options.objective);
            let mut cb = lazy::SubtourCb::new(&vars);
            let report = solver.optimize(&model, &options.params, Some(&mut cb))?;
            let stats = cb.stats;
            info!(n_calls = stats.n_calls, n_subtours = stats.n_subtours, n_cuts = stats.n_cuts, "lazy cut summary");
            solution::extract(data, &vars, max_late, &report, &options.params, Some(stats))
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use crate::data::{load_instance, Location, ModelError};
    use crate::mip::{GoodLpSolver, Status};
    use crate::schedule;

    const TOL: f64 = 1e-5;

    fn options(formulation: Formulation, objective: LatenessObj) -> SolveOptions {
        SolveOptions { formulation, objective, params: Params::default() }
    }

    fn solve_opt(data: &TspInstance, formulation: Formulation, objective: LatenessObj) -> Solution {
        let _ = crate::init_test_logging(None::<&str>);
        solve(data, &options(formulation, objective), &mut GoodLpSolver::default())
            .unwrap()
            .expect("tiny instances always solve to optimality")
    }

    const FORMULATIONS: [Formulation; 2] = [Formulation::Mtz, Formulation::Lazy];

    #[test]
    fn core_model_shape() {
        let data = load_instance("../../data/inst_3.txt").unwrap();
        let (model, vars) = build_core(&data, &data.distance_matrix());
        // 12 arcs, 4 arrival times, 4 lateness
        assert_eq!(model.num_vars(), 20);
        assert_eq!(vars.arcs.len(), 12);
        // degree, time (arcs not entering the depot) and lateness rows
        assert_eq!(model.num_constrs(), 8 + 9 + 3);
        assert_eq!(model.var(vars.arrival[DEPOT]).map(|d| d.get_max()), Some(0.0));
        assert_eq!(model.var(vars.lateness[DEPOT]).map(|d| d.get_max()), Some(0.0));
        assert_eq!(model.var(vars.lateness[1]).map(|d| d.get_max()), Some(f64::INFINITY));
    }

    #[test]
    fn single_stop() {
        let data = load_instance("../../data/inst_1.txt").unwrap();
        for &f in &FORMULATIONS {
            for &obj in &[LatenessObj::Total, LatenessObj::Max] {
                let sol = solve_opt(&data, f, obj);
                assert_eq!(sol.status, Status::Optimal);
                assert!((sol.obj_val - 5.0).abs() < TOL, "{} {}: {}", f, obj, sol.obj_val);
                assert_eq!(sol.mip_gap, 0.0);
                assert_eq!(sol.route, vec![(0, 1), (1, 0)]);
                assert_eq!(sol.tour().unwrap(), vec![0, 1, 0]);
                assert!((sol.lateness[1] - 5.0).abs() < TOL);
            }
        }
    }

    #[test]
    fn three_stops_total() {
        let data = load_instance("../../data/inst_3.txt").unwrap();
        for &f in &FORMULATIONS {
            let sol = solve_opt(&data, f, LatenessObj::Total);
            assert!((sol.obj_val - 18.0).abs() < TOL, "{}: {}", f, sol.obj_val);
            assert_eq!(sol.tour().unwrap(), vec![0, 1, 2, 3, 0]);
            for (l, expected) in sol.lateness.iter().zip(&[0.0, 5.0, 6.0, 7.0]) {
                assert!((l - expected).abs() < TOL, "{:?}", sol.lateness);
            }
            assert!(sol.max_lateness.is_none());
        }
    }

    #[test]
    fn three_stops_max() {
        let data = load_instance("../../data/inst_3.txt").unwrap();
        for &f in &FORMULATIONS {
            let sol = solve_opt(&data, f, LatenessObj::Max);
            assert!((sol.obj_val - 7.0).abs() < TOL, "{}: {}", f, sol.obj_val);
            let z = sol.max_lateness.unwrap();
            assert!((z - 7.0).abs() < TOL);
            let worst = sol.lateness.iter().cloned().fold(0.0, f64::max);
            assert!((worst - z).abs() < TOL);
        }
    }

    #[test]
    fn reported_schedule_is_consistent() {
        let data = load_instance("../../data/inst_5.txt").unwrap();
        let dist = data.distance_matrix();
        let total = solve_opt(&data, Formulation::Mtz, LatenessObj::Total);
        let tour = total.tour().unwrap();
        let early = schedule::get_early(&tour, &data, &dist);
        let late = schedule::lateness(&data, &early);
        // the optimal tour served as early as possible reaches the optimal objective
        assert!((late.iter().sum::<f64>() - total.obj_val).abs() < TOL);
        assert!(total.lateness.iter().all(|&l| l >= 0.0));
        for i in data.stops() {
            assert!(total.arrival[i] + TOL >= early[i]);
        }

        let lazy = solve_opt(&data, Formulation::Lazy, LatenessObj::Total);
        assert!((lazy.obj_val - total.obj_val).abs() < TOL);

        let mtz_max = solve_opt(&data, Formulation::Mtz, LatenessObj::Max);
        let lazy_max = solve_opt(&data, Formulation::Lazy, LatenessObj::Max);
        assert!((mtz_max.obj_val - lazy_max.obj_val).abs() < TOL);
        // the total-optimal tour is feasible for the max objective
        assert!(mtz_max.obj_val <= late.iter().cloned().fold(0.0, f64::max) + TOL);
    }

    #[test]
    fn invalid_instance() {
        let data = TspInstance::new("lonely", vec![Location::depot(0.0, 0.0)]);
        let err = solve(&data, &SolveOptions::default(), &mut GoodLpSolver::default()).unwrap_err();
        assert_eq!(err.downcast_ref::<ModelError>(), Some(&ModelError::TooFewLocations { count: 1 }));
    }

    #[test]
    fn zero_time_limit_gives_nothing() {
        let data = load_instance("../../data/inst_3.txt").unwrap();
        let mut opts = options(Formulation::Mtz, LatenessObj::Total);
        opts.params.time_limit = Some(std::time::Duration::from_secs(0));
        opts.params.accept_incumbent = true;
        assert!(solve(&data, &opts, &mut GoodLpSolver::default()).unwrap().is_none());
    }

    /// Seven stops scattered around the depot with deadlines no tour can meet.
    fn seven_stops() -> TspInstance {
        let stops = [
            (12.0, 3.0, 2.0, 9.0), (4.0, 17.0, 1.0, 14.0), (19.0, 11.0, 3.0, 12.0), (7.0, 25.0, 0.0, 20.0),
            (28.0, 6.0, 2.0, 16.0), (15.0, 22.0, 1.0, 11.0), (24.0, 19.0, 2.0, 18.0),
        ];
        let mut locations = vec![Location::depot(14.0, 14.0)];
        locations.extend(stops.iter().map(|&(x, y, s, d)| Location::new(x, y, s, d)));
        TspInstance::new("seven", locations)
    }

    #[test]
    fn time_limit_interrupts_a_round() {
        let _ = crate::init_test_logging(None::<&str>);
        let data = seven_stops();
        for &f in &FORMULATIONS {
            let mut opts = options(f, LatenessObj::Total);
            opts.params.time_limit = Some(std::time::Duration::from_millis(5));
            opts.params.accept_incumbent = true;
            let start = std::time::Instant::now();
            let sol = solve(&data, &opts, &mut GoodLpSolver::default()).unwrap();
            let elapsed = start.elapsed();
            assert!(elapsed < std::time::Duration::from_secs(2), "{}: ran for {:?}", f, elapsed);
            if let Some(sol) = sol {
                match sol.status {
                    Status::Optimal => assert_eq!(sol.mip_gap, 0.0),
                    Status::TimeLimit => assert_eq!(sol.tour().unwrap().len(), 9),
                    s => panic!("unexpected status {}", s),
                }
            }
        }
    }

    fn small_instance() -> impl Strategy<Value=TspInstance> {
        let stop = (0.0..30.0f64, 0.0..30.0f64, 0.0..3.0f64, 0.0..60.0f64)
            .prop_map(|(x, y, s, d)| Location::new(x.round(), y.round(), s.round(), d.round()));
        prop::collection::vec(stop, 1..=3).prop_map(|stops| {
            let mut locations = vec![Location::depot(15.0, 15.0)];
            locations.extend(stops);
            TspInstance::new("random", locations)
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(12))]
        #[test]
        fn formulations_agree(data in small_instance()) {
            for &obj in &[LatenessObj::Total, LatenessObj::Max] {
                let mtz = solve_opt(&data, Formulation::Mtz, obj);
                let lazy = solve_opt(&data, Formulation::Lazy, obj);
                prop_assert!((mtz.obj_val - lazy.obj_val).abs() < 1e-4, "{}: {} vs {}", obj, mtz.obj_val, lazy.obj_val);
                prop_assert_eq!(lazy.tour().unwrap().len(), data.num_locations() + 1);
                for sol in &[&mtz, &lazy] {
                    for i in data.stops() {
                        let expected = (sol.arrival[i] - data.locations[i].deadline).max(0.0);
                        prop_assert!(sol.lateness[i] >= 0.0);
                        prop_assert!((sol.lateness[i] - expected).abs() < 1e-4, "{:?} {:?}", sol.arrival, sol.lateness);
                    }
                    if let Some(z) = sol.max_lateness {
                        let worst = sol.lateness.iter().cloned().fold(0.0, f64::max);
                        prop_assert!((z - worst).abs() < 1e-4);
                    }
                }
            }
        }
    }
}
