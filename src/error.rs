//! Spider error types.
//!
//! One enum per failure class: `TypeError` for TDL and serde failures,
//! `ValueError` for rejected caller input, plus the top-level `SpiderError`
//! that wraps every class the client surface can raise.

use thiserror::Error;

use crate::executor::ExecutorError;
use crate::storage::StorageError;

/// A value or type description that does not fit the TDL type system.
#[derive(Debug, Error)]
pub enum TypeError {
    /// The string is not a well-formed TDL type.
    #[error("Cannot parse TDL type `{0}`")]
    Parse(String),

    /// Maps only accept integral primitives or `List<int8>` as keys.
    #[error("{0} is not a supported type for map key.")]
    UnsupportedMapKey(String),

    /// A serialized value does not match the declared TDL type.
    #[error("Cannot create a value of type `{expected}` from {found}")]
    Decode { expected: String, found: String },

    /// A stored type string disagrees with the type requested by the caller.
    #[error("TDL type `{found}` does not match expected type `{expected}`")]
    TypeStringMismatch { expected: String, found: String },

    /// A record payload carries a field the record does not declare.
    #[error("`{class}` has no field named `{field}`")]
    UnknownField { class: String, field: String },

    /// A record payload is missing a declared field.
    #[error("`{class}` payload is missing field `{field}`")]
    MissingField { class: String, field: String },

    /// `chain` wired a child input to a parent output of a different type.
    #[error("Task input type `{input}` does not match output type `{output}`")]
    InputOutputMismatch { input: String, output: String },

    /// `chain` ran out of parent outputs or child inputs before the other.
    #[error("Parent outputs size and child inputs size do not match.")]
    ChainArityMismatch,

    /// An argument bound at submission disagrees with the declared input type.
    #[error("Task input type `{declared}` does not match argument type `{provided}`")]
    ArgumentMismatch { declared: String, provided: String },

    /// The stored output row count does not match the requested result arity.
    #[error("job produced {found} outputs, but {expected} were requested")]
    ResultArity { expected: usize, found: usize },

    /// A result row holds the wrong shape (value where data was requested,
    /// or the other way around).
    #[error("job result is a {found}, expected a {expected}")]
    ResultShape {
        expected: &'static str,
        found: &'static str,
    },

    /// The wire codec rejected a lowered value.
    #[error("msgpack encode error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
}

impl TypeError {
    /// Builds a [`TypeError::Decode`] from the declared type and the
    /// offending wire value.
    pub(crate) fn decode(expected: &crate::types::TdlType, found: &rmpv::Value) -> Self {
        TypeError::Decode {
            expected: expected.type_str(),
            found: found.to_string(),
        }
    }
}

/// Caller input rejected before it reaches storage.
#[derive(Debug, Error)]
pub enum ValueError {
    /// A bounded integer landed outside its inclusive range.
    #[error("Bounded integer value ({value}) must be between {min} and {max}.")]
    OutOfRange { value: i64, min: i64, max: i64 },

    /// The storage URL is missing a required component.
    #[error("Invalid JDBC URL: {url}. Missing {part}.")]
    InvalidUrl { url: String, part: &'static str },

    /// The argument tuples handed to `submit_jobs` do not line up with the
    /// graphs' input slots.
    #[error("Number of job inputs does not match number of arguments")]
    ArgumentCountMismatch,

    /// Task function names must be dotted fully-qualified identifiers.
    #[error("`{0}` is not a fully-qualified function name")]
    InvalidFunctionName(String),
}

/// Top-level error for the Spider client surface.
///
/// Wraps the per-concern errors so `Driver`, `Job`, and `Data` operations
/// can report any failure class through one type.
#[derive(Debug, Error)]
pub enum SpiderError {
    #[error(transparent)]
    Type(#[from] TypeError),

    #[error(transparent)]
    Value(#[from] ValueError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Executor(#[from] ExecutorError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_arity_message_is_fixed() {
        assert_eq!(
            TypeError::ChainArityMismatch.to_string(),
            "Parent outputs size and child inputs size do not match."
        );
    }

    #[test]
    fn argument_count_message_is_fixed() {
        assert_eq!(
            ValueError::ArgumentCountMismatch.to_string(),
            "Number of job inputs does not match number of arguments"
        );
    }

    #[test]
    fn spider_error_is_transparent() {
        let err: SpiderError = TypeError::ChainArityMismatch.into();
        assert_eq!(
            err.to_string(),
            "Parent outputs size and child inputs size do not match."
        );
    }
}
