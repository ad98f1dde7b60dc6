use std::path::PathBuf;
use std::time::Duration;
use anyhow::{Context, Result};
use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use tracing::*;

use latetsp::*;
use latetsp::data::{open_dataset, Dataset, IdxNameMap, Subset};
use latetsp::mip::{GoodLpSolver, Params};

mod common;
use common::*;

use structopt::StructOpt;

#[derive(Debug, StructOpt)]
/// Minimise the lateness of a single vehicle visiting every stop once.
struct ClArgs {
    /// An instance file, or a directory of them
    dataset: PathBuf,
    /// Glob pattern selecting instance files inside a directory
    #[structopt(long, short="p", default_value="*.txt")]
    pattern: String,
    /// Solve only these instances, by position in the sorted dataset (repeatable)
    #[structopt(long="index", short="i")]
    indices: Vec<usize>,
    #[structopt(long, parse(try_from_str), possible_values=&["mtz", "lazy"], default_value="mtz")]
    formulation: Formulation,
    #[structopt(long, parse(try_from_str), possible_values=&["total", "max"], default_value="total")]
    objective: LatenessObj,
    /// Time limit per instance, in seconds
    #[structopt(long="time-limit", short="t", validator=at_least(0.0))]
    time_limit: Option<f64>,
    /// Report the best incumbent when the time limit is hit
    #[structopt(long="accept-incumbent")]
    accept_incumbent: bool,
    /// Instances solved in parallel; 0 uses one per physical core
    #[structopt(long, short="c", default_value="1", validator=at_least(0usize))]
    cpus: usize,
    #[structopt(flatten)]
    output: OutputOptions,
}

/// Outcome of one instance of the batch.
struct Record {
    name: String,
    result: Result<Option<Solution>>,
}

impl Record {
    fn to_json(&self, full: bool) -> json::JsonValue {
        match &self.result {
            Ok(Some(sol)) => if full { sol.to_json() } else { sol.to_json_summary() },
            Ok(None) => json::object! {
                instance: self.name.clone(),
                status: "no-solution",
            },
            Err(e) => json::object! {
                instance: self.name.clone(),
                status: "error",
                error: format!("{:#}", e),
            },
        }
    }
}

#[instrument(level="info", skip(dataset, options))]
fn solve_one(dataset: &impl Dataset<Instance=data::TspInstance>, idx: usize, options: &SolveOptions) -> Result<Option<Solution>> {
    let data = dataset.load_instance(idx)?;
    let mut solver = GoodLpSolver::default();
    solve(&data, options, &mut solver)
}

fn main() -> Result<()> {
    let args : ClArgs = StructOpt::from_args();
    let _g = init_logging(args.output.log.clone())?;
    debug!(?args);

    let cpus = if args.cpus == 0 { num_cpus::get_physical() } else { args.cpus };
    ThreadPoolBuilder::new().num_threads(cpus).build_global().context("failed to construct thread pool")?;

    let dataset = open_dataset(&args.dataset, &args.pattern)?;
    let indices = if args.indices.is_empty() { (0..dataset.len()).collect() } else { args.indices.clone() };
    let dataset = Subset::new(dataset, indices)?;
    info!(n_instances = dataset.len(), cpus, "dataset opened");

    let options = SolveOptions {
        formulation: args.formulation,
        objective: args.objective,
        params: Params {
            time_limit: args.time_limit.map(Duration::from_secs_f64),
            accept_incumbent: args.accept_incumbent,
        },
    };

    let records: Vec<Record> = (0..dataset.len())
        .into_par_iter()
        .map(|idx| {
            let name = dataset.index_to_name(idx).map(|n| n.into_owned()).unwrap_or_else(|_| idx.to_string());
            let result = solve_one(&dataset, idx, &options);
            match &result {
                Ok(Some(sol)) => info!(%name, obj = sol.obj_val, status = %sol.status, "solved"),
                Ok(None) => warn!(%name, "no solution"),
                Err(e) => error!(%name, err = %format!("{:#}", e), "failed"),
            }
            Record { name, result }
        })
        .collect();

    let full = args.output.fmt == OutputFormat::Json;
    let root: json::JsonValue = records.iter().map(|r| r.to_json(full)).collect::<Vec<_>>().into();
    write_output(&args.output, &root)
}
