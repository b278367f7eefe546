//! Client handle over a storable data object.

use uuid::Uuid;

use crate::core::{self, DataId, TaskResult};
use crate::error::{SpiderError, TypeError};
use crate::types::{TaskIo, TaskReturn, TdlType};

/// A storable blob usable as a task input or output.
///
/// Data travels through the system by id: binding one as an argument
/// stores the id, and a `Data`-typed task output resolves to a fresh
/// object created by the executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Data {
    inner: core::Data,
}

impl Data {
    /// Canonical TDL class name for data references.
    pub const TDL_NAME: &'static str = "spider.Data";

    /// Creates an unregistered data object with a fresh id.
    pub fn new(value: Vec<u8>) -> Self {
        Data {
            inner: core::Data::new(Uuid::new_v4(), value),
        }
    }

    pub(crate) fn from_inner(inner: core::Data) -> Self {
        Data { inner }
    }

    pub(crate) fn inner(&self) -> &core::Data {
        &self.inner
    }

    pub fn id(&self) -> DataId {
        self.inner.id
    }

    pub fn value(&self) -> &[u8] {
        &self.inner.value
    }

    pub fn hard_locality(&self) -> bool {
        self.inner.hard_locality
    }

    /// Requires consumers to run at one of the listed localities.
    pub fn set_hard_locality(&mut self, hard: bool) {
        self.inner.hard_locality = hard;
    }

    pub fn localities(&self) -> &[String] {
        &self.inner.localities
    }

    /// Adds a node address holding a copy of the value.
    pub fn add_locality(&mut self, address: impl Into<String>) {
        self.inner.localities.push(address.into());
    }
}

impl TaskIo for Data {
    const IS_DATA: bool = true;

    fn tdl_type() -> TdlType {
        TdlType::Class(Self::TDL_NAME.to_string())
    }

    fn from_result(row: &TaskResult) -> Result<Self, SpiderError> {
        match row {
            TaskResult::Data(inner) => Ok(Data::from_inner(inner.clone())),
            TaskResult::Value { .. } => Err(TypeError::ResultShape {
                expected: "data reference",
                found: "value",
            }
            .into()),
        }
    }
}

impl TaskReturn for Data {
    fn output_types() -> Vec<(TdlType, bool)> {
        vec![(Self::tdl_type(), true)]
    }

    fn from_results(rows: &[TaskResult]) -> Result<Self, SpiderError> {
        crate::types::serde::single_result(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_data_has_unique_id() {
        let a = Data::new(b"a".to_vec());
        let b = Data::new(b"a".to_vec());
        assert_ne!(a.id(), b.id());
        assert_eq!(a.value(), b"a");
    }

    #[test]
    fn locality_bookkeeping() {
        let mut data = Data::new(Vec::new());
        data.add_locality("10.0.0.1");
        data.add_locality("10.0.0.2");
        data.set_hard_locality(true);
        assert_eq!(data.localities(), ["10.0.0.1", "10.0.0.2"]);
        assert!(data.hard_locality());
    }

    #[test]
    fn tdl_name_is_a_class() {
        assert_eq!(Data::tdl_type().type_str(), "spider.Data");
        assert!(Data::IS_DATA);
    }

    #[test]
    fn from_result_requires_data_row() {
        let row = TaskResult::Value {
            tdl_type: "int8".to_string(),
            payload: Vec::new(),
        };
        assert!(Data::from_result(&row).is_err());

        let inner = core::Data::new(Uuid::new_v4(), b"blob".to_vec());
        let row = TaskResult::Data(inner.clone());
        assert_eq!(Data::from_result(&row).unwrap().id(), inner.id);
    }
}
