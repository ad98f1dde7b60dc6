use std::fmt;
use bit_vec::BitVec;
use tracing::*;

use crate::data::Loc;

/// A candidate arc set which is not a union of disjoint directed cycles.  Seeing one of these
/// means the degree constraints of the model are broken.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum InvariantViolation {
    NodeOutOfRange { node: Loc, n_nodes: usize },
    SelfLoop { node: Loc },
    DuplicateSuccessor { node: Loc },
    DuplicatePredecessor { node: Loc },
    MissingSuccessor { node: Loc },
    WalkOverflow { start: Loc, steps: usize },
    NotHamiltonian { n_cycles: usize },
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use InvariantViolation::*;
        match self {
            NodeOutOfRange { node, n_nodes } => write!(f, "arc endpoint {} is not one of the {} nodes", node, n_nodes),
            SelfLoop { node } => write!(f, "self-loop at node {}", node),
            DuplicateSuccessor { node } => write!(f, "node {} has more than one outgoing arc", node),
            DuplicatePredecessor { node } => write!(f, "node {} has more than one incoming arc", node),
            MissingSuccessor { node } => write!(f, "node {} has no outgoing arc", node),
            WalkOverflow { start, steps } => write!(f, "cycle walk from node {} did not close after {} steps", start, steps),
            NotHamiltonian { n_cycles } => write!(f, "expected a single tour, found {} cycles", n_cycles),
        }
    }
}

impl std::error::Error for InvariantViolation {}

/// Successor of every node, checking that each node has exactly one outgoing and one incoming arc.
pub fn successors(n_nodes: usize, arcs: &[(Loc, Loc)]) -> Result<Vec<Loc>, InvariantViolation> {
    let mut succ: Vec<Option<Loc>> = vec![None; n_nodes];
    let mut has_pred = BitVec::from_elem(n_nodes, false);

    for &(i, j) in arcs {
        if i >= n_nodes || j >= n_nodes {
            return Err(InvariantViolation::NodeOutOfRange { node: i.max(j), n_nodes });
        }
        if i == j {
            return Err(InvariantViolation::SelfLoop { node: i });
        }
        if succ[i].is_some() {
            return Err(InvariantViolation::DuplicateSuccessor { node: i });
        }
        if has_pred[j] {
            return Err(InvariantViolation::DuplicatePredecessor { node: j });
        }
        succ[i] = Some(j);
        has_pred.set(j, true);
    }

    succ.into_iter()
        .enumerate()
        .map(|(i, s)| s.ok_or(InvariantViolation::MissingSuccessor { node: i }))
        .collect()
}

/// Partition the nodes `0..n_nodes` into the directed cycles formed by `arcs`.  Each cycle is
/// listed in travel order, starting from its smallest node; cycles are ordered by that node, so the
/// cycle containing node `0` comes first.
#[instrument(level = "trace", skip(arcs))]
pub fn decompose_cycles(n_nodes: usize, arcs: &[(Loc, Loc)]) -> Result<Vec<Vec<Loc>>, InvariantViolation> {
    let succ = successors(n_nodes, arcs)?;
    let mut visited = BitVec::from_elem(n_nodes, false);
    let mut cycles = Vec::new();

    for start in 0..n_nodes {
        if visited[start] {
            continue;
        }
        let mut cycle = Vec::new();
        let mut node = start;
        loop {
            // a walk longer than the node count can only mean a corrupted successor list
            if cycle.len() >= n_nodes || visited[node] {
                error!(start, steps = cycle.len(), "cycle walk did not close");
                return Err(InvariantViolation::WalkOverflow { start, steps: cycle.len() });
            }
            visited.set(node, true);
            cycle.push(node);
            node = succ[node];
            if node == start {
                break;
            }
        }
        trace!(?cycle);
        cycles.push(cycle);
    }

    Ok(cycles)
}
