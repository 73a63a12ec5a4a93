//! Asynchronous report jobs
//!
//! A trigger registers a job id and hands the computation to a background
//! task. The task is the only writer of that job's status; HTTP handlers only
//! read it.

pub mod registry;
pub mod runner;

pub use registry::{JobId, JobRegistry, JobStatus};
pub use runner::ReportRunner;
