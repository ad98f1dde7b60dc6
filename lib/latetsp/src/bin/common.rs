use std::fmt::Display;
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::str::FromStr;
use anyhow::{Context, Result};
use structopt::StructOpt;

#[derive(Clone, Debug, StructOpt)]
pub struct OutputOptions {
  /// `json` reports tours and schedules, `json-summ` only solver statistics
  #[structopt(long="format", short="f", default_value="json-summ", possible_values=&["json", "json-summ"])]
  pub fmt: OutputFormat,
  /// Write results here instead of stdout.
  #[structopt(long="output", short="o")]
  pub file: Option<PathBuf>,
  /// Also write a JSON log to this file.
  #[structopt(long)]
  pub log: Option<PathBuf>,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum OutputFormat {
  Json,
  JsonSummary,
}

impl FromStr for OutputFormat {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "json" => Ok(OutputFormat::Json),
      "json-summ" => Ok(OutputFormat::JsonSummary),
      _ => Err(format!("invalid output format: {}", s)),
    }
  }
}

/// Argument validator accepting anything that parses as a `T` no smaller than `min`.
pub fn at_least<T>(min: T) -> impl Fn(String) -> Result<(), String>
  where
    T: FromStr + PartialOrd + Display + Copy,
    T::Err: Display
{
  move |val| {
    let x: T = val.parse().map_err(|e: T::Err| e.to_string())?;
    if x < min { Err(format!("must be at least {}", min)) } else { Ok(()) }
  }
}

pub fn write_output(options: &OutputOptions, root: &json::JsonValue) -> Result<()> {
  match options.file.as_ref() {
    Some(path) => {
      let file = File::create(path).with_context(|| format!("unable to create {:?}", path))?;
      let mut writer = io::BufWriter::new(file);
      root.write_pretty(&mut writer, 2)?;
      writer.flush()?;
    }
    None => {
      let stdout = io::stdout();
      let mut writer = stdout.lock();
      root.write_pretty(&mut writer, 2)?;
      writeln!(writer)?;
    }
  }
  Ok(())
}
