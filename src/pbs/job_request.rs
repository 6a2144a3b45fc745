use serde::{Deserialize, Serialize};

use crate::config::JobConfig;
use crate::matlab::script::{safe_name, TempScript};

/// Flags that keep MATLAB headless and fast to start on a compute node
const MATLAB_FLAGS: &str = "-nodisplay -nojvm -nosplash -nodesktop";

/// Older Torque releases refuse longer `-N` values
const MAX_JOB_NAME: usize = 15;

/// Everything the scheduler needs to queue one job
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct JobRequest {
    pub command: String,
    pub cores: u32,
    pub walltime: Option<String>,
    pub flags: Option<String>,
    pub name: String,
}

impl JobRequest {
    /// Run MATLAB non-interactively with `script` as its standard input
    ///
    /// `count` is the 1-based position of the variable set in the batch.
    pub fn new(config: &JobConfig, script: &TempScript, first_variable: &str, count: usize) -> JobRequest {
        JobRequest {
            command: format!(
                "{} {} < {}",
                config.matlab,
                MATLAB_FLAGS,
                shell_quote(&script.path.display().to_string())
            ),
            cores: config.cores,
            walltime: config.walltime.clone(),
            flags: config.flags.clone(),
            name: job_name(first_variable, count),
        }
    }
}

/// `<variable>_<count>`, starting with a letter and at most 15 characters long
///
/// The variable part is shortened first so the count always survives.
fn job_name(first_variable: &str, count: usize) -> String {
    let mut base = safe_name(first_variable);
    if !base.starts_with(|c: char| c.is_ascii_alphabetic()) {
        base.insert(0, 'j');
    }

    let suffix = format!("_{}", count);
    // safe_name only produces ASCII, so byte truncation is fine
    base.truncate(MAX_JOB_NAME.saturating_sub(suffix.len()).max(1));
    format!("{}{}", base, suffix)
}

/// Single quote a word for the job shell unless it's made of plain path characters
fn shell_quote(word: &str) -> String {
    let plain = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '.' | '_' | '-' | '+' | ':'));

    match plain {
        true => word.to_string(),
        false => format!("'{}'", word.replace('\'', "'\\''")),
    }
}
