use itertools::Itertools;
use ndarray::Array2;
use tracing::*;

use crate::data::{Loc, Time, TspInstance, DEPOT};
use crate::graph::{decompose_cycles, InvariantViolation};

/// Order a Hamiltonian arc set into a tour which starts and ends at the depot.
pub fn tour_from_arcs(n_nodes: usize, arcs: &[(Loc, Loc)]) -> Result<Vec<Loc>, InvariantViolation> {
    let mut cycles = decompose_cycles(n_nodes, arcs)?;
    if cycles.len() != 1 {
        return Err(InvariantViolation::NotHamiltonian { n_cycles: cycles.len() });
    }
    let mut tour = cycles.pop().unwrap_or_default();
    debug_assert_eq!(tour[0], DEPOT);
    tour.push(DEPOT);
    Ok(tour)
}

/// Earliest arrival time at every location when `tour` is driven from the depot at time zero,
/// indexed by location.  `tour` must start at the depot; locations it skips get zero.
#[instrument(level = "trace", skip(data, dist))]
pub fn get_early(tour: &[Loc], data: &TspInstance, dist: &Array2<f64>) -> Vec<Time> {
    debug_assert_eq!(tour.first(), Some(&DEPOT));
    let mut arrival = vec![0.0; data.num_locations()];
    let mut t = 0.0;
    for (&i, &j) in tour.iter().tuple_windows() {
        t += data.locations[i].service_time + dist[[i, j]];
        if j != DEPOT {
            arrival[j] = t;
        }
    }
    arrival
}

/// Lateness of every location given its arrival time, indexed by location.  The depot is never late.
pub fn lateness(data: &TspInstance, arrival: &[Time]) -> Vec<Time> {
    data.locations.iter()
        .zip(arrival)
        .enumerate()
        .map(|(i, (l, &t))| if i == DEPOT { 0.0 } else { (t - l.deadline).max(0.0) })
        .collect()
}
