//! Jobs: submitted graphs with server-observed lifecycles.

use uuid::Uuid;

use super::Data;

/// Identifies a submitted job.
pub type JobId = Uuid;

/// Lifecycle state of a job as recorded in storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Canonical lowercase form stored in the `jobs.state` column.
    pub fn as_state_str(self) -> &'static str {
        match self {
            JobStatus::Running => "running",
            JobStatus::Succeeded => "success",
            JobStatus::Failed => "fail",
            JobStatus::Cancelled => "cancel",
        }
    }

    /// Parses the stored form; `None` for anything unknown.
    pub fn from_state_str(state: &str) -> Option<Self> {
        match state {
            "running" => Some(JobStatus::Running),
            "success" => Some(JobStatus::Succeeded),
            "fail" => Some(JobStatus::Failed),
            "cancel" => Some(JobStatus::Cancelled),
            _ => None,
        }
    }
}

/// One resolved output of a finished job, as read back from storage.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskResult {
    /// Inline value: the stored TDL type string plus wire-encoded payload.
    Value { tdl_type: String, payload: Vec<u8> },
    /// The output was materialised as a data object.
    Data(Data),
}

/// A submitted job. Status and results are cached from storage; once the
/// status leaves `Running`, both fields stay frozen on the client side.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub job_id: JobId,
    pub status: JobStatus,
    pub results: Option<Vec<TaskResult>>,
}

impl Job {
    /// A freshly submitted job: running, no results yet.
    pub fn new(job_id: JobId) -> Self {
        Job {
            job_id,
            status: JobStatus::Running,
            results: None,
        }
    }
}
