use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use log::{debug, info, warn};
use serde::Serialize;
use tinytemplate::{format_unescaped, TinyTemplate};

use crate::pbs::job_request::JobRequest;

/// Anything that can accept a whole batch of jobs in one call
///
/// The batch is only ever submitted once; retrying or polling is left to the scheduler.
pub trait Scheduler {
    type Handle;

    fn submit(&mut self, jobs: &[JobRequest]) -> Result<Self::Handle>;
}

/// Torque/PBS submission through the `qsub` command
pub struct Torque {
    pub qsub: PathBuf,
}

/// Job ids printed by `qsub`, in submission order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Queue {
    pub job_ids: Vec<String>,
}

/// Rendering context for the PBS job script
#[derive(Serialize)]
struct PbsContext<'a> {
    name: &'a str,
    cores: u32,
    walltime: Option<&'a str>,
    time_now: String,
    command: &'a str,
}

impl Torque {
    /// Render the PBS job script using TinyTemplate
    fn render(&self, job: &JobRequest) -> Result<String> {
        /// included PBS job script template
        static PBS: &str =
            include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/templates/pbs.txt"));
        let mut tt = TinyTemplate::new();
        tt.set_default_formatter(&format_unescaped);
        tt.add_template("pbs", PBS).context("invalid PBS template")?;

        let context = PbsContext {
            name: &job.name,
            cores: job.cores,
            walltime: job.walltime.as_deref(),
            time_now: Utc::now().to_string(),
            command: &job.command,
        };
        tt.render("pbs", &context)
            .with_context(|| format!("can't render PBS script for {}", job.name))
    }

    /// Pipe one job script to qsub and return the job id it prints
    fn qsub(&self, job: &JobRequest) -> Result<String> {
        let script = self.render(job)?;

        let mut cmd = Command::new(&self.qsub);
        if let Some(flags) = &job.flags {
            cmd.args(flags.split_whitespace());
        }
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        debug!("{:?}", &cmd);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("failed to execute {}", self.qsub.display()))?;
        {
            let mut stdin = child
                .stdin
                .take()
                .ok_or_else(|| anyhow!("qsub stdin is not piped"))?;
            stdin
                .write_all(script.as_bytes())
                .context("can't write job script to qsub")?;
        }
        let output = child.wait_with_output().context("qsub didn't finish")?;

        if !output.status.success() {
            bail!(
                "qsub failed with status: {}\n{}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim_end()
            )
        }

        let job_id = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if job_id.is_empty() {
            bail!("qsub didn't print a job id for {}", job.name)
        }
        Ok(job_id)
    }
}

impl Scheduler for Torque {
    type Handle = Queue;

    fn submit(&mut self, jobs: &[JobRequest]) -> Result<Queue> {
        let mut job_ids = Vec::with_capacity(jobs.len());

        for job in jobs {
            info!("Submitting {}", job.name);
            match self.qsub(job) {
                Ok(id) => {
                    info!("PBS job id: {id}");
                    job_ids.push(id);
                }
                Err(err) => {
                    if !job_ids.is_empty() {
                        warn!("Already submitted: {}", job_ids.join(" "));
                    }
                    return Err(err.context(format!(
                        "submission of {} failed after {} of {} jobs were queued",
                        job.name,
                        job_ids.len(),
                        jobs.len()
                    )));
                }
            }
        }

        Ok(Queue { job_ids })
    }
}

/// Print the batch as JSON instead of submitting it
pub struct DryRun<W: Write> {
    pub out: W,
}

impl<W: Write> Scheduler for DryRun<W> {
    type Handle = usize;

    fn submit(&mut self, jobs: &[JobRequest]) -> Result<usize> {
        info!("Dry run, not submitting {} jobs", jobs.len());
        serde_json::to_writer_pretty(&mut self.out, jobs).context("can't serialise jobs")?;
        writeln!(self.out).context("can't write jobs")?;
        Ok(jobs.len())
    }
}
