//! Core data model shared between composition, submission, and storage.
//!
//! Everything here is a plain value type: graphs address their tasks by
//! index, storage addresses everything by id, and ids are only issued at
//! submission time.

mod data;
mod job;
mod task;
mod task_graph;

pub use data::{Data, DataId};
pub use job::{Job, JobId, JobStatus, TaskResult};
pub use task::{Task, TaskId, TaskInput, TaskInputValue, TaskOutput, TaskOutputSlot, TaskState};
pub use task_graph::{GraphError, InputOutputRef, TaskGraph};

/// Identifies a driver (one client process identity).
pub type DriverId = uuid::Uuid;
