//! Storage backends: the relational face of the client.
//!
//! The [`Storage`] trait is the synchronous, transactional facade the
//! client surface talks to; [`MariaDbStorage`] is the shipped
//! implementation. One storage session belongs to exactly one caller at a
//! time — a process that wants concurrency opens one session per caller.

mod jdbc_url;
mod mariadb;

pub use jdbc_url::JdbcUrl;
pub use mariadb::MariaDbStorage;

use thiserror::Error;

use crate::core::{Data, DataId, DriverId, Job, JobId, JobStatus, TaskGraph, TaskId, TaskResult};

/// A failure inside the storage layer. Transactions roll back before the
/// error surfaces; no partial writes remain.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("failed to start the storage runtime: {0}")]
    Runtime(#[from] std::io::Error),

    #[error("no job found with id {0}")]
    JobNotFound(JobId),

    #[error("no data found with id {0}")]
    DataNotFound(DataId),

    #[error("unknown job state `{0}`")]
    UnknownJobState(String),

    #[error("task output ({task_id}, {position}) has neither a value nor a data id")]
    EmptyTaskOutput { task_id: TaskId, position: usize },

    #[error("task output ({task_id}, {position}) has both a value and a data id")]
    AmbiguousTaskOutput { task_id: TaskId, position: usize },

    #[error("id column holds {0} bytes, expected 16")]
    MalformedId(usize),

    #[error("stored payload is not valid msgpack: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
}

/// Transactional storage facade.
///
/// Implementations take `&self` and manage interior mutability so that the
/// driver and every job or data handle it produced can share one session.
pub trait Storage {
    /// Records a driver identity.
    fn create_driver(&self, driver_id: DriverId) -> Result<(), StorageError>;

    /// Materialises the prepared graphs as one atomic batch of rows,
    /// issuing fresh job and task ids. Returns one job per graph, in order.
    fn submit_jobs(
        &self,
        driver_id: DriverId,
        task_graphs: &[TaskGraph],
    ) -> Result<Vec<Job>, StorageError>;

    /// Reads a job's current state.
    fn get_job_status(&self, job_id: JobId) -> Result<JobStatus, StorageError>;

    /// Reads the ordered outputs of a job, or `None` while the job has not
    /// succeeded.
    fn get_job_results(&self, job_id: JobId) -> Result<Option<Vec<TaskResult>>, StorageError>;

    /// Registers a data object owned by a driver.
    fn create_data_with_driver_ref(
        &self,
        driver_id: DriverId,
        data: &Data,
    ) -> Result<(), StorageError>;

    /// Registers a data object owned by a task.
    fn create_data_with_task_ref(&self, task_id: TaskId, data: &Data) -> Result<(), StorageError>;

    /// Loads a data object with its localities.
    fn get_data(&self, data_id: DataId) -> Result<Data, StorageError>;
}
