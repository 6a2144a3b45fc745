//! Describe jobs for a Torque/PBS cluster and hand them to the scheduler

/// One job per variable set: command line, resources and name
pub mod job_request;

/// The scheduler seam and its qsub and dry run implementations
pub mod submit;
