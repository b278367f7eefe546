//! Tasks: units of deferred, typed computation.

use uuid::Uuid;

use super::DataId;

/// Identifies a task. Fresh ids are re-issued by storage at submission.
pub type TaskId = Uuid;

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Ready,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl TaskState {
    /// Canonical lowercase form stored in the `tasks.state` column.
    pub fn as_state_str(self) -> &'static str {
        match self {
            TaskState::Pending => "pending",
            TaskState::Ready => "ready",
            TaskState::Running => "running",
            TaskState::Succeeded => "success",
            TaskState::Failed => "fail",
            TaskState::Cancelled => "cancel",
        }
    }
}

/// The bound value of a task input.
///
/// Inputs sourced from another task's output are recorded on the graph as
/// [`InputOutputRef`](super::InputOutputRef)s, not here.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskInputValue {
    /// Client-serialised payload bytes.
    Inline(Vec<u8>),
    /// Reference to a storable data object.
    Data(DataId),
}

/// One input position of a task: a declared TDL type plus an optional
/// bound value (`None` until the driver binds an argument).
#[derive(Debug, Clone, PartialEq)]
pub struct TaskInput {
    pub tdl_type: String,
    pub value: Option<TaskInputValue>,
}

impl TaskInput {
    pub fn unbound(tdl_type: impl Into<String>) -> Self {
        TaskInput {
            tdl_type: tdl_type.into(),
            value: None,
        }
    }
}

/// The value slot of a task output, resolved by the executor.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutputSlot {
    /// Inline payload; empty until the task runs.
    Inline(Vec<u8>),
    /// Data-object reference; nil until the task runs.
    Data(DataId),
}

/// One output position of a task.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskOutput {
    pub tdl_type: String,
    pub slot: TaskOutputSlot,
}

impl TaskOutput {
    /// An output carried inline, with an empty slot.
    pub fn inline(tdl_type: impl Into<String>) -> Self {
        TaskOutput {
            tdl_type: tdl_type.into(),
            slot: TaskOutputSlot::Inline(Vec::new()),
        }
    }

    /// An output carried as a data reference, with a nil id placeholder.
    pub fn data(tdl_type: impl Into<String>) -> Self {
        TaskOutput {
            tdl_type: tdl_type.into(),
            slot: TaskOutputSlot::Data(Uuid::nil()),
        }
    }
}

/// A task: a fully-qualified function name, execution budget, and ordered
/// typed inputs and outputs.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub task_id: TaskId,
    pub function_name: String,
    pub state: TaskState,
    pub timeout: f32,
    pub max_retries: u32,
    pub task_inputs: Vec<TaskInput>,
    pub task_outputs: Vec<TaskOutput>,
}

impl Task {
    /// Creates a pending task with a fresh id and no inputs or outputs.
    pub fn new(function_name: impl Into<String>) -> Self {
        Task {
            task_id: Uuid::new_v4(),
            function_name: function_name.into(),
            state: TaskState::Pending,
            timeout: 0.0,
            max_retries: 0,
            task_inputs: Vec::new(),
            task_outputs: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_task_is_pending_with_fresh_id() {
        let a = Task::new("examples.tasks.double");
        let b = Task::new("examples.tasks.double");
        assert_eq!(a.state, TaskState::Pending);
        assert_eq!(a.timeout, 0.0);
        assert_eq!(a.max_retries, 0);
        assert_ne!(a.task_id, b.task_id);
    }

    #[test]
    fn state_strings_are_canonical() {
        assert_eq!(TaskState::Pending.as_state_str(), "pending");
        assert_eq!(TaskState::Ready.as_state_str(), "ready");
        assert_eq!(TaskState::Running.as_state_str(), "running");
        assert_eq!(TaskState::Succeeded.as_state_str(), "success");
        assert_eq!(TaskState::Failed.as_state_str(), "fail");
        assert_eq!(TaskState::Cancelled.as_state_str(), "cancel");
    }

    #[test]
    fn data_outputs_start_with_nil_placeholder() {
        let output = TaskOutput::data("spider.Data");
        assert_eq!(output.slot, TaskOutputSlot::Data(Uuid::nil()));

        let inline = TaskOutput::inline("int8");
        assert_eq!(inline.slot, TaskOutputSlot::Inline(Vec::new()));
    }
}
