//! The driver: owner of the storage session and the submitting identity.

use std::rc::Rc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::core::{DriverId, TaskGraph, TaskInputValue, TaskState};
use crate::error::{SpiderError, TypeError, ValueError};
use crate::storage::{JdbcUrl, MariaDbStorage, Storage};
use crate::types::{to_msgpack, TdlValue};

use super::{Data, Job};

/// One argument bound to a graph's input slot at submission.
///
/// Values are lowered and wire-encoded eagerly, carrying their TDL type
/// string; data objects are passed by id.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskArgument {
    /// A data-object reference.
    Data(crate::core::DataId),
    /// A wire-encoded inline value.
    Value { tdl_type: String, payload: Vec<u8> },
}

impl TaskArgument {
    /// Lowers and encodes a value argument.
    pub fn value<T: TdlValue>(value: &T) -> Result<Self, SpiderError> {
        let payload = to_msgpack(&value.to_serializable()).map_err(TypeError::from)?;
        Ok(TaskArgument::Value {
            tdl_type: T::tdl_type().type_str(),
            payload,
        })
    }

    /// References a data object by id.
    pub fn data(data: &Data) -> Self {
        TaskArgument::Data(data.id())
    }
}

impl From<&Data> for TaskArgument {
    fn from(data: &Data) -> Self {
        TaskArgument::data(data)
    }
}

/// Client-side owner of one storage session.
///
/// Every `Job` handle returned by this driver shares its session; the
/// session lives until the driver and all its handles are gone.
pub struct Driver {
    driver_id: DriverId,
    storage: Rc<dyn Storage>,
}

impl Driver {
    /// Connects to the storage behind a JDBC-style URL and records this
    /// driver's identity there.
    pub fn new(storage_url: &str) -> Result<Self, SpiderError> {
        let params = JdbcUrl::parse(storage_url)?;
        let storage = Rc::new(MariaDbStorage::connect(&params)?);
        Driver::with_storage(storage)
    }

    /// Builds a driver over an already-open storage session.
    pub fn with_storage(storage: Rc<dyn Storage>) -> Result<Self, SpiderError> {
        let driver_id = Uuid::new_v4();
        storage.create_driver(driver_id)?;
        info!(driver_id = %driver_id, "driver registered");
        Ok(Driver { driver_id, storage })
    }

    pub fn driver_id(&self) -> DriverId {
        self.driver_id
    }

    /// Submits one job per graph, binding each argument list to the
    /// matching graph's input-root inputs in order.
    ///
    /// All graphs land in storage atomically; the returned jobs follow the
    /// input order.
    pub fn submit_jobs(
        &self,
        task_graphs: &[TaskGraph],
        args: Vec<Vec<TaskArgument>>,
    ) -> Result<Vec<Job>, SpiderError> {
        if task_graphs.len() != args.len() {
            return Err(ValueError::ArgumentCountMismatch.into());
        }
        if task_graphs.is_empty() {
            return Ok(Vec::new());
        }

        let mut prepared = Vec::with_capacity(task_graphs.len());
        for (graph, job_args) in task_graphs.iter().zip(args) {
            prepared.push(prepare_graph(graph, job_args)?);
        }

        debug!(jobs = prepared.len(), "submitting jobs");
        let jobs = self.storage.submit_jobs(self.driver_id, &prepared)?;
        Ok(jobs
            .into_iter()
            .map(|job| Job::new(job, Rc::clone(&self.storage)))
            .collect())
    }

    /// Registers a data object in storage, referenced by this driver.
    pub fn create_data(&self, data: &Data) -> Result<(), SpiderError> {
        self.storage
            .create_data_with_driver_ref(self.driver_id, data.inner())?;
        Ok(())
    }
}

/// Deep-copies `graph` and binds `args` to its input-root inputs: every
/// task is reset to `Pending`, input roots become `Ready`, and arguments
/// are consumed in input order. The argument count must match the graph's
/// input slots exactly.
fn prepare_graph(graph: &TaskGraph, args: Vec<TaskArgument>) -> Result<TaskGraph, SpiderError> {
    let mut graph = graph.clone();
    graph.reset_states(TaskState::Pending);

    let mut remaining = args.into_iter();
    let input_indices = graph.input_task_indices.clone();
    for index in input_indices {
        let task = &mut graph.tasks[index];
        task.state = TaskState::Ready;
        for input in &mut task.task_inputs {
            let arg = remaining
                .next()
                .ok_or(ValueError::ArgumentCountMismatch)?;
            match arg {
                TaskArgument::Data(data_id) => {
                    input.tdl_type = Data::TDL_NAME.to_string();
                    input.value = Some(TaskInputValue::Data(data_id));
                }
                TaskArgument::Value { tdl_type, payload } => {
                    if tdl_type != input.tdl_type {
                        return Err(TypeError::ArgumentMismatch {
                            declared: input.tdl_type.clone(),
                            provided: tdl_type,
                        }
                        .into());
                    }
                    input.value = Some(TaskInputValue::Inline(payload));
                }
            }
        }
    }
    if remaining.next().is_some() {
        return Err(ValueError::ArgumentCountMismatch.into());
    }
    Ok(graph)
}
