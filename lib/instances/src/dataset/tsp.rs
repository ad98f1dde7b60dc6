use super::*;
use crate::parsers::{ParseInstance, DeadlineFmt};
use crate::raw::deadline::DeadlineTsp;
use crate::raw::{
  metrics::{Euclidean, Metric},
  FromRaw
};
use tracing::warn;

pub use crate::raw::deadline::Time;

/// Index of a location within its instance.  The depot is always `0`.
pub type Loc = usize;

pub const DEPOT: Loc = 0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
  pub x: f64,
  pub y: f64,
  pub service_time: Time,
  pub deadline: Time,
}

impl Location {
  pub fn new(x: f64, y: f64, service_time: Time, deadline: Time) -> Self {
    Location { x, y, service_time, deadline }
  }

  pub fn depot(x: f64, y: f64) -> Self {
    Location { x, y, service_time: 0.0, deadline: 0.0 }
  }

  #[inline]
  pub fn coords(&self) -> (f64, f64) { (self.x, self.y) }
}

/// Euclidean travel time between two locations.
#[inline]
pub fn distance(a: &Location, b: &Location) -> f64 {
  Euclidean::compute(a.coords(), b.coords())
}

/// A depot followed by `n` customer stops.  Immutable once loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct TspInstance {
  pub id: String,
  pub locations: Vec<Location>,
}

impl TspInstance {
  pub fn new(id: impl Into<String>, locations: Vec<Location>) -> Self {
    TspInstance { id: id.into(), locations }
  }

  /// Number of customer stops (locations excluding the depot).
  #[inline]
  pub fn n(&self) -> usize { self.locations.len().saturating_sub(1) }

  #[inline]
  pub fn num_locations(&self) -> usize { self.locations.len() }

  #[inline]
  pub fn stops(&self) -> std::ops::Range<Loc> { 1..self.locations.len() }
}

fn is_depot_duplicate(depot: &Location, stop: &Location) -> bool {
  stop.coords() == depot.coords() && stop.service_time == 0.0 && stop.deadline == 0.0
}

impl FromRaw<DeadlineTsp> for TspInstance {
  fn from_raw(raw: DeadlineTsp, id: Cow<str>) -> TspInstance {
    let depot = Location::depot(raw.depot.0, raw.depot.1);
    let mut locations = Vec::with_capacity(raw.num_stops() + 1);
    locations.push(depot);
    for k in 0..raw.num_stops() {
      let (x, y) = raw.coords[k];
      locations.push(Location::new(x, y, raw.service_time[k], raw.deadline[k]));
    }

    if locations.len() > 2 && locations.last().map_or(false, |l| is_depot_duplicate(&depot, l)) {
      warn!(instance=%id, "last record duplicates the depot, dropping it");
      locations.pop();
    }

    TspInstance { id: id.into_owned(), locations }
  }
}

pub fn load_instance(path: impl AsRef<Path>) -> Result<TspInstance> {
  let path = path.as_ref();
  let id = path.file_stem()
    .map(|s| s.to_string_lossy())
    .unwrap_or_else(|| path.to_string_lossy());
  let raw = DeadlineTsp::parse(DeadlineFmt(path))?;
  Ok(TspInstance::from_raw(raw, id))
}

pub enum DeadlineTspDir {}

impl Dataset for DirLayout<DeadlineTspDir> {
  type Instance = TspInstance;

  fn load_instance(&self, idx: usize) -> Result<Self::Instance> {
    let path = self.path(idx)?;
    load_instance(path).context(format!("failed to load {:?}", path))
  }
}
