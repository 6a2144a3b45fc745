//! Generate one script and job request per variable set, then submit the batch once
//!
//! Every script is written before anything is submitted. An error while writing aborts the whole
//! batch, so the scheduler never sees a partial one.

use anyhow::{Context, Result};
use log::{info, warn};

use crate::config::JobConfig;
use crate::matlab::script::Script;
use crate::pbs::job_request::JobRequest;
use crate::pbs::submit::Scheduler;
use crate::request::variables::VariableSet;

/// Write a temp script and build a job request for each variable set, in input order
pub fn generate(config: &JobConfig, sets: &[VariableSet]) -> Result<Vec<JobRequest>> {
    let mut jobs = Vec::with_capacity(sets.len());

    for (i, variables) in sets.iter().enumerate() {
        let count = i + 1;
        let script = Script::render(&config.paths, &config.function, variables)?;
        let temp = script
            .write(&config.tmp_path, variables.first(), count)
            .with_context(|| format!("can't write script for job {}", count))?;

        let job = JobRequest::new(config, &temp, variables.first(), count);
        info!("Created job {} with {} variables", &job.name, variables.len());
        jobs.push(job);
    }

    Ok(jobs)
}

/// Hand every job to `scheduler` in a single call
///
/// Returns `None` without touching the scheduler when there's nothing to submit.
pub fn submit_batch<S: Scheduler>(scheduler: &mut S, jobs: &[JobRequest]) -> Result<Option<S::Handle>> {
    if jobs.is_empty() {
        warn!("No jobs to submit");
        return Ok(None);
    }

    info!("Submitting {} jobs", jobs.len());
    let handle = scheduler.submit(jobs).context("batch submission failed")?;
    Ok(Some(handle))
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::{Path, PathBuf};

    use super::*;
    use crate::request::read::read_variables;

    /// Records every batch instead of submitting it
    #[derive(Default)]
    struct Recorder {
        batches: Vec<Vec<JobRequest>>,
    }

    impl Scheduler for Recorder {
        type Handle = usize;

        fn submit(&mut self, jobs: &[JobRequest]) -> Result<usize> {
            self.batches.push(jobs.to_vec());
            Ok(self.batches.len())
        }
    }

    struct Refuses;

    impl Scheduler for Refuses {
        type Handle = ();

        fn submit(&mut self, _jobs: &[JobRequest]) -> Result<()> {
            anyhow::bail!("qsub: cannot connect to server")
        }
    }

    fn config(tmp: &Path) -> JobConfig {
        JobConfig {
            function: "foo".to_string(),
            paths: vec!["/x".to_string()],
            cores: 4,
            walltime: Some("2:00:00".to_string()),
            flags: None,
            tmp_path: tmp.to_path_buf(),
            matlab: "matlab".to_string(),
        }
    }

    fn script_path(job: &JobRequest) -> PathBuf {
        let (_, path) = job.command.rsplit_once("< ").unwrap();
        PathBuf::from(path)
    }

    #[test]
    fn one_script_and_job_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let sets = read_variables("a,b\nc\n".as_bytes()).unwrap();

        let jobs = generate(&config(dir.path()), &sets).unwrap();

        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].name, "a_1");
        assert_eq!(jobs[1].name, "c_2");
        assert_eq!(
            fs::read_to_string(script_path(&jobs[0])).unwrap(),
            "addpath('/x')\nfoo(a,b)\n"
        );
        assert_eq!(
            fs::read_to_string(script_path(&jobs[1])).unwrap(),
            "addpath('/x')\nfoo(c)\n"
        );
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn resources_on_every_job() {
        let dir = tempfile::tempdir().unwrap();
        let sets = read_variables("1\n2\n3\n".as_bytes()).unwrap();

        let jobs = generate(&config(dir.path()), &sets).unwrap();

        assert_eq!(jobs.len(), 3);
        for job in &jobs {
            assert_eq!(job.cores, 4);
            assert_eq!(job.walltime.as_deref(), Some("2:00:00"));
        }
    }

    #[test]
    fn argument_count_and_order() {
        let dir = tempfile::tempdir().unwrap();
        let sets = read_variables("z,y,x,w,v\n".as_bytes()).unwrap();

        let jobs = generate(&config(dir.path()), &sets).unwrap();
        let content = fs::read_to_string(script_path(&jobs[0])).unwrap();
        assert_eq!(content.lines().last().unwrap(), "foo(z,y,x,w,v)");
    }

    #[test]
    fn unwritable_directory_aborts_before_submission() {
        let dir = tempfile::tempdir().unwrap();
        let sets = read_variables("a\n".as_bytes()).unwrap();

        let result = generate(&config(&dir.path().join("gone")), &sets);
        assert!(result.is_err());
    }

    #[test]
    fn whole_batch_in_one_call() {
        let dir = tempfile::tempdir().unwrap();
        let sets = read_variables("a\nb\n".as_bytes()).unwrap();
        let jobs = generate(&config(dir.path()), &sets).unwrap();

        let mut recorder = Recorder::default();
        let handle = submit_batch(&mut recorder, &jobs).unwrap();

        assert_eq!(handle, Some(1));
        assert_eq!(recorder.batches, vec![jobs]);
    }

    #[test]
    fn empty_batch_is_not_submitted() {
        let dir = tempfile::tempdir().unwrap();
        let sets = read_variables("".as_bytes()).unwrap();
        let jobs = generate(&config(dir.path()), &sets).unwrap();
        assert!(jobs.is_empty());

        let mut recorder = Recorder::default();
        assert_eq!(submit_batch(&mut recorder, &jobs).unwrap(), None);
        assert!(recorder.batches.is_empty());
    }

    #[test]
    fn scheduler_errors_are_returned() {
        let jobs = vec![JobRequest {
            command: "matlab < /tmp/a.m".to_string(),
            cores: 1,
            walltime: None,
            flags: None,
            name: "a_1".to_string(),
        }];

        let err = submit_batch(&mut Refuses, &jobs).unwrap_err();
        assert!(format!("{:#}", err).contains("cannot connect to server"));
    }
}
