use std::fmt;
use std::str::FromStr;
use anyhow::{bail, Error};
use tracing::*;

use crate::mip::{constraint, Expression, Model, Variable};
use super::CoreVars;

/// Which lateness measure is minimised.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum LatenessObj {
    /// Sum of lateness over all stops.
    Total,
    /// Largest lateness of any stop.
    Max,
}

impl Default for LatenessObj {
    fn default() -> Self { LatenessObj::Total }
}

impl FromStr for LatenessObj {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "total" | "a" | "A" => Ok(LatenessObj::Total),
            "max" | "b" | "B" => Ok(LatenessObj::Max),
            _ => bail!("unknown objective `{}` (expected `total` or `max`)", s),
        }
    }
}

impl fmt::Display for LatenessObj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LatenessObj::Total => "total",
            LatenessObj::Max => "max",
        })
    }
}

impl LatenessObj {
    /// Install the objective on `model`.  For [`LatenessObj::Max`] this adds the auxiliary variable
    /// bounding every stop's lateness from above and returns it.
    #[instrument(level = "debug", skip(model, vars))]
    pub fn apply(&self, model: &mut Model, vars: &CoreVars) -> Option<Variable> {
        match self {
            LatenessObj::Total => {
                let obj: Expression = vars.stops().map(|i| vars.lateness[i]).sum();
                model.set_objective(obj);
                None
            }
            LatenessObj::Max => {
                let z = model.add_ctsvar("max_lateness", 0.0, f64::INFINITY);
                for i in vars.stops() {
                    model.add_constr(format!("max_late[{}]", i), constraint::geq(z, vars.lateness[i]));
                }
                model.set_objective(z);
                Some(z)
            }
        }
    }
}
