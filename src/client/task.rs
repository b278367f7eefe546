//! Task declaration: typed signatures captured from plain functions.
//!
//! A task function takes `&mut TaskContext` first and TDL-convertible
//! parameters after it, and returns a `TaskReturn` type — one output, or a
//! fixed-arity tuple producing one output per element. Those rules are the
//! trait bounds on [`TaskFunction::new`], so an ill-typed task function is
//! rejected at compile time rather than at submission.

use std::rc::Rc;

use crate::core::{Task, TaskId, TaskInput, TaskOutput};
use crate::error::ValueError;
use crate::storage::{Storage, StorageError};
use crate::types::{is_dotted_identifier, TaskIo, TaskReturn, TdlType};

use super::Data;

/// Execution context handed to every task as its first argument.
///
/// Carries the executing task's identity and storage access so a task can
/// create data objects tied to itself.
pub struct TaskContext {
    task_id: TaskId,
    storage: Rc<dyn Storage>,
}

impl TaskContext {
    pub fn new(task_id: TaskId, storage: Rc<dyn Storage>) -> Self {
        TaskContext { task_id, storage }
    }

    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Registers a data object in storage, referenced by this task for
    /// garbage-collection bookkeeping.
    pub fn create_data(&self, data: &Data) -> Result<(), StorageError> {
        self.storage
            .create_data_with_task_ref(self.task_id, data.inner())
    }
}

/// A typed signature captured from a task function.
///
/// Implemented for every `Fn(&mut TaskContext, A1, .., An) -> R` with
/// TDL-convertible parameters and a valid return type; variadic shapes do
/// not exist in the language, so nothing further is rejected at runtime.
pub trait TaskSignature<Args, Ret> {
    /// Declared TDL types of the parameters after the context.
    fn input_types() -> Vec<TdlType>;

    /// Declared TDL type and data-reference flag of every output.
    fn output_types() -> Vec<(TdlType, bool)>;
}

macro_rules! impl_task_signature {
    ($($arg:ident),*) => {
        impl<F, R, $($arg),*> TaskSignature<($($arg,)*), R> for F
        where
            F: Fn(&mut TaskContext, $($arg),*) -> R,
            R: TaskReturn,
            $($arg: TaskIo,)*
        {
            fn input_types() -> Vec<TdlType> {
                vec![$(<$arg as TaskIo>::tdl_type()),*]
            }

            fn output_types() -> Vec<(TdlType, bool)> {
                <R as TaskReturn>::output_types()
            }
        }
    };
}

impl_task_signature!();
impl_task_signature!(A1);
impl_task_signature!(A1, A2);
impl_task_signature!(A1, A2, A3);
impl_task_signature!(A1, A2, A3, A4);
impl_task_signature!(A1, A2, A3, A4, A5);
impl_task_signature!(A1, A2, A3, A4, A5, A6);
impl_task_signature!(A1, A2, A3, A4, A5, A6, A7);
impl_task_signature!(A1, A2, A3, A4, A5, A6, A7, A8);

/// A named, typed task declaration ready for composition.
///
/// Cheap to clone; every use in a graph stamps out a fresh task.
#[derive(Debug, Clone)]
pub struct TaskFunction {
    name: String,
    input_types: Vec<String>,
    /// `(type_str, is_data)` per output.
    output_types: Vec<(String, bool)>,
    timeout: f32,
    max_retries: u32,
}

impl TaskFunction {
    /// Captures `f`'s signature under the given fully-qualified dotted
    /// name. The function value itself is only consulted for its type.
    pub fn new<Args, R, F>(name: impl Into<String>, _f: F) -> Result<Self, ValueError>
    where
        F: TaskSignature<Args, R>,
    {
        let name = name.into();
        if !is_dotted_identifier(&name) {
            return Err(ValueError::InvalidFunctionName(name));
        }
        Ok(TaskFunction {
            name,
            input_types: F::input_types().iter().map(TdlType::type_str).collect(),
            output_types: F::output_types()
                .into_iter()
                .map(|(tdl_type, is_data)| (tdl_type.type_str(), is_data))
                .collect(),
            timeout: 0.0,
            max_retries: 0,
        })
    }

    /// Sets the execution timeout in seconds (0 disables it). Negative
    /// values are treated as 0.
    pub fn with_timeout(mut self, timeout: f32) -> Self {
        self.timeout = timeout.max(0.0);
        self
    }

    /// Sets the retry budget recorded for the task.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stamps out a fresh task: unbound inputs, empty inline output slots,
    /// nil data-id placeholders for data outputs.
    pub(crate) fn to_task(&self) -> Task {
        let mut task = Task::new(self.name.clone());
        task.timeout = self.timeout;
        task.max_retries = self.max_retries;
        task.task_inputs = self
            .input_types
            .iter()
            .map(|tdl_type| TaskInput::unbound(tdl_type.clone()))
            .collect();
        task.task_outputs = self
            .output_types
            .iter()
            .map(|(tdl_type, is_data)| {
                if *is_data {
                    TaskOutput::data(tdl_type.clone())
                } else {
                    TaskOutput::inline(tdl_type.clone())
                }
            })
            .collect();
        task
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TaskOutputSlot;
    use crate::types::{Int8, Int64};
    use uuid::Uuid;

    fn double(_: &mut TaskContext, x: Int8) -> Int8 {
        Int8::new(i64::from(x) * 2).unwrap()
    }

    fn swap(_: &mut TaskContext, x: Int8, y: Int8) -> (Int8, Int8) {
        (y, x)
    }

    fn count(_: &mut TaskContext, arr: Vec<Int8>) -> Int64 {
        Int64::new(arr.len() as i64).unwrap()
    }

    fn produce(_: &mut TaskContext) -> (Int8, Data) {
        (Int8::new(0).unwrap(), Data::new(Vec::new()))
    }

    #[test]
    fn captures_single_output_signature() {
        let func = TaskFunction::new("examples.tasks.double", double).unwrap();
        assert_eq!(func.input_types, vec!["int8"]);
        assert_eq!(func.output_types, vec![("int8".to_string(), false)]);
    }

    #[test]
    fn captures_tuple_output_signature() {
        let func = TaskFunction::new("examples.tasks.swap", swap).unwrap();
        assert_eq!(func.input_types, vec!["int8", "int8"]);
        assert_eq!(func.output_types.len(), 2);
    }

    #[test]
    fn captures_collection_types() {
        let func = TaskFunction::new("examples.tasks.count", count).unwrap();
        assert_eq!(func.input_types, vec!["List<int8>"]);
        assert_eq!(func.output_types, vec![("int64".to_string(), false)]);
    }

    #[test]
    fn data_outputs_get_nil_placeholders() {
        let func = TaskFunction::new("examples.tasks.produce", produce).unwrap();
        let task = func.to_task();
        assert_eq!(task.task_outputs[0].slot, TaskOutputSlot::Inline(Vec::new()));
        assert_eq!(task.task_outputs[1].slot, TaskOutputSlot::Data(Uuid::nil()));
        assert_eq!(task.task_outputs[1].tdl_type, "spider.Data");
    }

    #[test]
    fn rejects_unqualified_names() {
        assert!(matches!(
            TaskFunction::new("not a name", double),
            Err(ValueError::InvalidFunctionName(_))
        ));
        assert!(TaskFunction::new("double", double).is_ok());
        assert!(TaskFunction::new("examples.tasks.double", double).is_ok());
    }

    #[test]
    fn builder_carries_budget() {
        let func = TaskFunction::new("examples.tasks.double", double)
            .unwrap()
            .with_timeout(30.0)
            .with_max_retries(3);
        let task = func.to_task();
        assert_eq!(task.timeout, 30.0);
        assert_eq!(task.max_retries, 3);
    }
}
