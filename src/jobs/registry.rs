use dashmap::DashMap;
use serde::Serialize;
use std::path::PathBuf;
use uuid::Uuid;

pub type JobId = Uuid;

/// Lifecycle of one report job
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status")]
pub enum JobStatus {
    Running,
    Complete { path: PathBuf },
    Failed { error: String },
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Running)
    }
}

/// Concurrent map from job id to status.
///
/// Each job has a single writer (its worker) and any number of pollers.
/// A job leaves `Running` at most once; later transitions are ignored.
///
/// Entries are never evicted: a finished job stays queryable for the life of
/// the process, and its CSV stays in the report directory.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: DashMap<JobId, JobStatus>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fresh job in the `Running` state
    pub fn register(&self) -> JobId {
        let id = Uuid::new_v4();
        self.jobs.insert(id, JobStatus::Running);
        id
    }

    /// Move a running job to a terminal state. Returns false if the job is
    /// unknown, already finished, or `status` is not terminal.
    pub fn finish(&self, id: &JobId, status: JobStatus) -> bool {
        if !status.is_terminal() {
            return false;
        }

        match self.jobs.get_mut(id) {
            Some(mut entry) if !entry.is_terminal() => {
                *entry = status;
                true
            }
            _ => false,
        }
    }

    pub fn complete(&self, id: &JobId, path: PathBuf) -> bool {
        self.finish(id, JobStatus::Complete { path })
    }

    pub fn fail(&self, id: &JobId, error: impl Into<String>) -> bool {
        self.finish(
            id,
            JobStatus::Failed {
                error: error.into(),
            },
        )
    }

    pub fn status(&self, id: &JobId) -> Option<JobStatus> {
        self.jobs.get(id).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
