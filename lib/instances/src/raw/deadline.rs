pub type Time = f64;

/// Records of a deadline TSP instance file, exactly as written (depot excluded from the stop lists).
#[derive(Debug, Clone, PartialEq)]
pub struct DeadlineTsp {
  /// Record count from the header line, depot included.
  pub num_locations: usize,
  pub depot: (f64, f64),
  pub coords: Vec<(f64, f64)>,
  pub service_time: Vec<Time>,
  pub deadline: Vec<Time>,
}

impl DeadlineTsp {
  #[inline]
  pub fn num_stops(&self) -> usize { self.coords.len() }
}
