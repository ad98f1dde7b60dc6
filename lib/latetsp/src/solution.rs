use std::time::Duration;
use anyhow::{Context, Result};
use tracing::*;

use crate::data::{Loc, Time, TspInstance, DEPOT};
use crate::graph::InvariantViolation;
use crate::mip::{Params, SolveReport, Status, Variable};
use crate::model::CoreVars;
use crate::model::lazy::CbStats;
use crate::schedule;

/// An optimal (or accepted incumbent) tour, with the solver's statistics.
#[derive(Debug, Clone)]
pub struct Solution {
    pub instance: String,
    pub status: Status,
    pub obj_val: f64,
    pub obj_bound: f64,
    pub mip_gap: f64,
    pub runtime: Duration,
    pub node_count: usize,
    pub lazy_constrs: usize,
    /// Arcs of the tour, in lexicographic order.
    pub route: Vec<(Loc, Loc)>,
    /// Arrival time at every location, indexed by location.
    pub arrival: Vec<Time>,
    /// Lateness of every location, indexed by location; the depot's is zero.
    pub lateness: Vec<Time>,
    /// Value of the max-lateness variable, when that objective was used.
    pub max_lateness: Option<Time>,
    pub cut_stats: Option<CbStats>,
}

impl Solution {
    /// Locations in visiting order, starting and ending at the depot.
    pub fn tour(&self) -> Result<Vec<Loc>, InvariantViolation> {
        schedule::tour_from_arcs(self.arrival.len(), &self.route)
    }

    pub fn total_lateness(&self) -> Time {
        self.lateness.iter().sum()
    }

    pub fn to_json_summary(&self) -> json::JsonValue {
        let mut obj = json::object! {
            instance: self.instance.clone(),
            status: self.status.to_string(),
            obj_val: self.obj_val,
            obj_bound: self.obj_bound,
            mip_gap: self.mip_gap,
            runtime: self.runtime.as_secs_f64(),
            node_count: self.node_count,
            lazy_constrs: self.lazy_constrs,
        };
        if let Some(stats) = self.cut_stats {
            obj["cuts"] = json::object! {
                calls: stats.n_calls,
                subtours: stats.n_subtours,
                cuts: stats.n_cuts,
            };
        }
        obj
    }

    pub fn to_json(&self) -> json::JsonValue {
        let mut obj = self.to_json_summary();
        let route: Vec<json::JsonValue> = self.route.iter()
            .map(|&(i, j)| json::array![i, j])
            .collect();
        obj["route"] = route.into();
        obj["tour"] = match self.tour() {
            Ok(tour) => tour.into(),
            Err(_) => json::Null,
        };
        obj["arrival"] = self.arrival.clone().into();
        obj["lateness"] = self.lateness.clone().into();
        obj["total_lateness"] = self.total_lateness().into();
        if let Some(z) = self.max_lateness {
            obj["max_lateness"] = z.into();
        }
        obj
    }
}

/// Turn a solver report into a [`Solution`], or `None` when the report carries nothing that may be
/// reported.  The chosen arcs must form a single tour.
#[instrument(level = "debug", skip_all, fields(instance = %data.id, status = %report.status))]
pub fn extract(
    data: &TspInstance,
    vars: &CoreVars,
    max_late: Option<Variable>,
    report: &SolveReport,
    params: &Params,
    cut_stats: Option<CbStats>,
) -> Result<Option<Solution>> {
    let accepted = match report.status {
        Status::Optimal => true,
        Status::TimeLimit => params.accept_incumbent,
        Status::Infeasible | Status::Unbounded => false,
    };
    let (values, obj_val) = match (&report.values, report.obj_val) {
        (Some(values), Some(obj)) if accepted => (values, obj),
        _ => {
            info!(has_incumbent = report.values.is_some(), "no solution to report");
            return Ok(None);
        }
    };

    let route: Vec<_> = vars.arcs.iter()
        .filter(|&a| values.get(vars.x[a]) > 0.5)
        .copied()
        .collect();
    schedule::tour_from_arcs(vars.n_nodes, &route)
        .with_context(|| format!("solution of {} is not a tour", data.id))?;

    let arrival: Vec<Time> = vars.arrival.iter()
        .map(|&v| values.get(v).max(0.0))
        .collect();

    let lateness = match max_late {
        // lateness variables are only bounded from below under the max objective
        Some(_) => schedule::lateness(data, &arrival),
        None => vars.lateness.iter()
            .enumerate()
            .map(|(i, &v)| if i == DEPOT { 0.0 } else { values.get(v).max(0.0) })
            .collect(),
    };
    let max_lateness = max_late.map(|z| values.get(z));

    debug!(obj_val, ?route, "solution extracted");
    Ok(Some(Solution {
        instance: data.id.clone(),
        status: report.status,
        obj_val,
        obj_bound: report.obj_bound,
        mip_gap: report.mip_gap,
        runtime: report.runtime,
        node_count: report.node_count,
        lazy_constrs: report.lazy_constrs,
        route,
        arrival,
        lateness,
        max_lateness,
        cut_stats,
    }))
}
