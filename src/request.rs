//! Turn standard input into the variable sets that drive one job each

/// Read raw input into variable sets
pub mod read;
/// A single job's positional arguments, parsed from one input line
pub mod variables;
