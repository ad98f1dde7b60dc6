pub use anyhow::Result;

use std::fmt;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Error {
  UnknownInstanceName,
  IndexOutOfRange,
  RecordCountMismatch { declared: usize, found: usize },
}


impl fmt::Display for Error {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Error::RecordCountMismatch { declared, found } =>
        write!(f, "header declares {} locations but {} records were read", declared, found),
      _ => fmt::Debug::fmt(self, f),
    }
  }
}

impl std::error::Error for Error {}


pub mod dataset;
pub mod raw;

mod parsers;
pub use parsers::{ParseInstance, DeadlineFmt, parse_deadline_tsp};
