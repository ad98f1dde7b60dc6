use std::fmt;
use std::path::Path;
use anyhow::Result;
use ndarray::Array2;
use instances::dataset::DirLayout;

pub use instances::dataset::{Dataset, IdxNameMap, Subset};

pub use instances::dataset::tsp::{
    Location,
    TspInstance,
    DeadlineTspDir,
    Loc,
    Time,
    DEPOT,
    distance,
};

pub type TspDataset = DirLayout<DeadlineTspDir>;

pub fn load_instance(path: impl AsRef<Path>) -> Result<TspInstance> {
    instances::dataset::tsp::load_instance(path)
}

/// Every instance file in `path` matching `pattern` (or the single file `path`).
pub fn open_dataset(path: impl AsRef<Path>, pattern: &str) -> Result<TspDataset> {
    DirLayout::new(path, pattern)
}

pub fn load_all(dset: &impl Dataset<Instance=TspInstance>) -> Vec<Result<TspInstance>> {
    (0..dset.len()).map(|i| dset.load_instance(i)).collect()
}

/// A malformed instance, detected before any model is built.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelError {
    TooFewLocations { count: usize },
    NegativeServiceTime { loc: Loc, value: Time },
    NegativeDeadline { loc: Loc, value: Time },
    NonFiniteValue { loc: Loc },
    DepotNotZero { service_time: Time, deadline: Time },
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::TooFewLocations { count } =>
                write!(f, "an instance needs a depot and at least one stop, got {} location(s)", count),
            ModelError::NegativeServiceTime { loc, value } =>
                write!(f, "location {} has negative service time {}", loc, value),
            ModelError::NegativeDeadline { loc, value } =>
                write!(f, "location {} has negative deadline {}", loc, value),
            ModelError::NonFiniteValue { loc } =>
                write!(f, "location {} has a non-finite attribute", loc),
            ModelError::DepotNotZero { service_time, deadline } =>
                write!(f, "depot must have zero service time and deadline, got {} and {}", service_time, deadline),
        }
    }
}

impl std::error::Error for ModelError {}

pub trait TspInstanceExt {
    fn validate(&self) -> std::result::Result<(), ModelError>;
    fn distance_matrix(&self) -> Array2<f64>;
    fn big_m(&self, dist: &Array2<f64>) -> f64;
}

impl TspInstanceExt for TspInstance {
    fn validate(&self) -> std::result::Result<(), ModelError> {
        if self.num_locations() < 2 {
            return Err(ModelError::TooFewLocations { count: self.num_locations() });
        }
        for (i, l) in self.locations.iter().enumerate() {
            if !(l.x.is_finite() && l.y.is_finite() && l.service_time.is_finite() && l.deadline.is_finite()) {
                return Err(ModelError::NonFiniteValue { loc: i });
            }
            if l.service_time < 0.0 {
                return Err(ModelError::NegativeServiceTime { loc: i, value: l.service_time });
            }
            if l.deadline < 0.0 {
                return Err(ModelError::NegativeDeadline { loc: i, value: l.deadline });
            }
        }
        let depot = &self.locations[DEPOT];
        if depot.service_time != 0.0 || depot.deadline != 0.0 {
            return Err(ModelError::DepotNotZero { service_time: depot.service_time, deadline: depot.deadline });
        }
        Ok(())
    }

    /// Pairwise travel times, `dist[[i, j]]`.
    fn distance_matrix(&self) -> Array2<f64> {
        let n = self.num_locations();
        Array2::from_shape_fn((n, n), |(i, j)| distance(&self.locations[i], &self.locations[j]))
    }

    /// A constant large enough that every big-M time constraint is vacuous when its arc is unused:
    /// all pairwise travel times, plus all service times, plus all deadlines.
    fn big_m(&self, dist: &Array2<f64>) -> f64 {
        let travel: f64 = dist.sum();
        let service: f64 = self.locations.iter().map(|l| l.service_time).sum();
        let deadlines: f64 = self.locations.iter().map(|l| l.deadline).sum();
        travel + service + deadlines
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn line(n: usize) -> TspInstance {
        let mut locations = vec![Location::depot(0.0, 0.0)];
        locations.extend((1..=n).map(|i| Location::new(10.0 * i as f64, 0.0, 1.0, 5.0)));
        TspInstance::new("line", locations)
    }

    #[test]
    fn validate() {
        assert_eq!(line(2).validate(), Ok(()));
        assert_eq!(line(0).validate(), Err(ModelError::TooFewLocations { count: 1 }));

        let mut data = line(2);
        data.locations[2].service_time = -1.0;
        assert_eq!(data.validate(), Err(ModelError::NegativeServiceTime { loc: 2, value: -1.0 }));

        let mut data = line(2);
        data.locations[1].deadline = -0.5;
        assert_eq!(data.validate(), Err(ModelError::NegativeDeadline { loc: 1, value: -0.5 }));

        let mut data = line(2);
        data.locations[1].x = f64::NAN;
        assert_eq!(data.validate(), Err(ModelError::NonFiniteValue { loc: 1 }));

        let mut data = line(2);
        data.locations[0].deadline = 3.0;
        assert!(matches!(data.validate(), Err(ModelError::DepotNotZero { .. })));
    }

    #[test]
    fn distances_and_big_m() {
        let data = line(2);
        let dist = data.distance_matrix();
        assert_eq!(dist[[0, 2]], 20.0);
        assert_eq!(dist[[2, 1]], 10.0);
        assert_eq!(dist[[1, 1]], 0.0);
        // 2 * (10 + 20 + 10) + 2 * 1 + 2 * 5
        assert_eq!(data.big_m(&dist), 92.0);
    }

    #[test]
    fn dataset() -> Result<()> {
        let dset = open_dataset("../../data", "inst_*.txt")?;
        let loaded = load_all(&dset);
        assert_eq!(loaded.len(), dset.len());
        assert!(loaded.iter().all(|r| r.is_ok()));
        Ok(())
    }
}
