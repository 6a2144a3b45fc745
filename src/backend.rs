use std::fmt;
use clap::ValueEnum;

/// Where the batch goes once every script is written
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum Backend {
    /// Pipe each job to qsub
    Torque,
    /// Print the jobs as JSON on standard output
    DryRun,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Backend::Torque => write!(f, "torque"),
            Backend::DryRun => write!(f, "dry-run"),
        }
    }
}
