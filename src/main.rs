//! Create a temporary MATLAB script for every line of standard input and submit each one as a
//! Torque/PBS job.
//!
//! Each input line holds the comma separated arguments for one call of the target function.

use std::env;
use std::fs::OpenOptions;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, LevelFilter};

use crate::backend::Backend;
use crate::config::JobConfig;
use crate::pbs::submit::{DryRun, Torque};
use crate::request::read::read_variables;

mod backend;
mod batch;
mod config;
mod matlab;
mod pbs;
mod request;

/// Run a MATLAB function once per line of standard input as cluster jobs
///
/// Standard input holds one job per line. Comma separate variables on a line to pass several
/// arguments to the function. The function doesn't need to return anything.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Name of the MATLAB function to run
    function: String,

    /// Comma separated list of MATLAB paths
    #[arg(short, long)]
    path: Option<String>,

    /// Number of cores to use for each job
    #[arg(long, default_value_t = 1)]
    cores: u32,

    /// PBS walltime
    #[arg(long)]
    walltime: Option<String>,

    /// Extra flags to pass to qsub, e.g. '-q long'
    #[arg(long = "pbs_flags", allow_hyphen_values = true)]
    pbs_flags: Option<String>,

    /// Where to store temporary scripts, defaults to the current directory
    #[arg(short, long = "tmp_path")]
    tmp_path: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Log file (append mode), defaults to standard error
    #[arg(short, long)]
    logfile: Option<PathBuf>,

    /// MATLAB executable used by the jobs
    #[arg(long, default_value = "matlab")]
    matlab: String,

    /// qsub executable
    #[arg(long, default_value = "qsub")]
    qsub: PathBuf,

    /// Submit with qsub, or print the jobs as JSON
    #[arg(long, value_enum, default_value_t = Backend::Torque)]
    backend: Backend,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose, args.logfile.as_deref())?;

    // errors reach stderr through main's return, only the log file needs them too
    let cwd = env::current_dir().context("can't determine current directory")?;
    run(&args, &cwd, io::stdin().lock()).map_err(|err| {
        if args.logfile.is_some() {
            error!("{:#}", err);
        }
        err
    })
}

/// Configuration is validated before `input` is read or any script is written
fn run<R: Read>(args: &Args, cwd: &Path, input: R) -> Result<()> {
    let config = JobConfig::resolve(args, cwd)?;

    let sets = read_variables(input)?;
    let jobs = batch::generate(&config, &sets)?;

    info!("Using {} backend", args.backend);
    match args.backend {
        Backend::Torque => {
            let mut torque = Torque { qsub: args.qsub.clone() };
            if let Some(queue) = batch::submit_batch(&mut torque, &jobs)? {
                for id in &queue.job_ids {
                    println!("{}", id);
                }
            }
        }
        Backend::DryRun => {
            let mut dry_run = DryRun { out: io::stdout().lock() };
            batch::submit_batch(&mut dry_run, &jobs)?;
        }
    }

    Ok(())
}

/// Warnings and errors by default, debug output with `--verbose`; `RUST_LOG` still wins
fn init_logging(verbose: bool, logfile: Option<&Path>) -> Result<()> {
    let level = match verbose {
        true => LevelFilter::Debug,
        false => LevelFilter::Warn,
    };

    let mut builder = env_logger::Builder::new();
    builder.filter_level(level).parse_default_env();

    if let Some(path) = logfile {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("can't open log file {}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }

    builder.try_init().context("logger already initialised")
}
