use std::path::Path;
use anyhow::Context;
use crate::{Result, Error};
use crate::raw::deadline::*;
use super::{
  ParseInstance,
  nom_prelude::*,
};

#[derive(Debug, Copy, Clone)]
pub struct DeadlineFmt<P>(pub P);

impl<P: AsRef<Path>> ParseInstance<DeadlineFmt<P>> for DeadlineTsp {
  fn parse(input: DeadlineFmt<P>) -> Result<Self> {
    let path = input.0.as_ref();
    let data = std::fs::read_to_string(path)
      .with_context(|| format!("failed to read {:?}", path))?;
    parse_deadline_tsp(&data).with_context(|| format!("failed to parse {:?}", path))
  }
}

/// Parse the text of an instance file.  Blank lines and surrounding whitespace are ignored.
pub fn parse_deadline_tsp(text: &str) -> Result<DeadlineTsp> {
  let mut normalised = String::with_capacity(text.len() + 1);
  for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
    normalised.push_str(line);
    normalised.push('\n');
  }

  let raw = match parsers::deadline_tsp(&normalised).finish() {
    Ok((_, instance)) => instance,
    Err(e) => return Err(anyhow::Error::msg(e.to_string())),
  };

  let found = raw.num_stops() + 1;
  if raw.num_locations != found {
    return Err(Error::RecordCountMismatch { declared: raw.num_locations, found }.into());
  }
  Ok(raw)
}


mod parsers {
  use super::*;
  use super::super::common::*;

  pub fn deadline_tsp(input: &str) -> IResult<&str, DeadlineTsp, error::VerboseError<&str>> {
    let (input, num_locations) = error::context("header", usize_line)(input)?;
    let (input, depot) = error::context("depot", doubles_line(2))(input)?;
    let (input, stops) = error::context("stops", many0(doubles_line(4)))(input)?;
    let (input, _) = eof(input)?;

    let mut coords = Vec::with_capacity(stops.len());
    let mut service_time = Vec::with_capacity(stops.len());
    let mut deadline = Vec::with_capacity(stops.len());

    //  x y service_time deadline
    for s in stops {
      coords.push((s[0], s[1]));
      service_time.push(s[2]);
      deadline.push(s[3]);
    }

    Ok((input, DeadlineTsp {
      num_locations,
      depot: (depot[0], depot[1]),
      coords,
      service_time,
      deadline,
    }))
  }
}
