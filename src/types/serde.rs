//! Generic serialisation driven by TDL types.
//!
//! Values are lowered to self-describing [`rmpv::Value`] trees — records
//! become string-keyed maps, lists become arrays — and the wire codec packs
//! the lowered tree with MessagePack. Decoding runs the same path in
//! reverse against the declared TDL type.
//!
//! Three traits tie native types to TDL:
//!
//! - [`TaskIo`] — any type that can sit on a task boundary (including
//!   [`Data`](crate::client::Data), which travels by id, not by value).
//! - [`TdlValue`] — a `TaskIo` type with a value representation, i.e. one
//!   the wire codec can carry inline.
//! - [`TaskReturn`] — valid task return types: a single `TaskIo` type or a
//!   tuple of them, one task output per element.

use std::collections::HashMap;
use std::hash::Hash;

use crate::core::TaskResult;
use crate::error::{SpiderError, TypeError};
use crate::storage::StorageError;

use super::{Bytes, Double, Float, Int16, Int32, Int64, Int8, TdlType};

pub use rmpv::Value;

/// Packs a lowered value with the wire codec.
pub fn to_msgpack(value: &Value) -> Result<Vec<u8>, rmp_serde::encode::Error> {
    rmp_serde::to_vec(value)
}

/// Unpacks wire bytes into a lowered value.
pub fn from_msgpack(bytes: &[u8]) -> Result<Value, rmp_serde::decode::Error> {
    rmp_serde::from_slice(bytes)
}

/// A type that can appear as a task input or output.
pub trait TaskIo: Sized {
    /// Whether values of this type travel as data-object references.
    const IS_DATA: bool = false;

    /// The TDL type describing this native type.
    fn tdl_type() -> TdlType;

    /// Materialises this type from one stored job result row.
    fn from_result(row: &TaskResult) -> Result<Self, SpiderError>;
}

/// A `TaskIo` type the wire codec can carry inline.
pub trait TdlValue: TaskIo {
    /// Lowers the value to a tree of primitives, arrays, and maps.
    fn to_serializable(&self) -> Value;

    /// Rebuilds a value from its lowered form, checking it against the
    /// declared TDL type.
    fn from_serializable(value: &Value) -> Result<Self, TypeError>;
}

/// A valid task return type: one `TaskIo` type, or a fixed-arity tuple of
/// them producing one task output per element.
pub trait TaskReturn: Sized {
    /// TDL type and data-reference flag of each produced output, in order.
    fn output_types() -> Vec<(TdlType, bool)>;

    /// Rebuilds the full return value from the stored result rows.
    fn from_results(rows: &[TaskResult]) -> Result<Self, SpiderError>;
}

/// Marker for TDL map-key-eligible native types: the four integral widths
/// and `Vec<Int8>` (the canonical string).
pub trait TdlMapKey {}

impl TdlMapKey for Int8 {}
impl TdlMapKey for Int16 {}
impl TdlMapKey for Int32 {}
impl TdlMapKey for Int64 {}
impl TdlMapKey for Vec<Int8> {}

/// Decodes an inline result row as `T`, validating the stored type string.
#[doc(hidden)]
pub fn decode_value_result<T: TdlValue>(row: &TaskResult) -> Result<T, SpiderError> {
    match row {
        TaskResult::Value { tdl_type, payload } => {
            let stored = TdlType::parse(tdl_type)?;
            let expected = T::tdl_type();
            if stored != expected {
                return Err(TypeError::TypeStringMismatch {
                    expected: expected.type_str(),
                    found: stored.type_str(),
                }
                .into());
            }
            let lowered = from_msgpack(payload).map_err(StorageError::from)?;
            Ok(T::from_serializable(&lowered)?)
        }
        TaskResult::Data(_) => Err(TypeError::ResultShape {
            expected: "value",
            found: "data reference",
        }
        .into()),
    }
}

/// Decodes a single-output result set as `T`.
#[doc(hidden)]
pub fn single_result<T: TaskIo>(rows: &[TaskResult]) -> Result<T, SpiderError> {
    if rows.len() != 1 {
        return Err(TypeError::ResultArity {
            expected: 1,
            found: rows.len(),
        }
        .into());
    }
    T::from_result(&rows[0])
}

// ---------------------------------------------------------------------------
// Primitive implementations
// ---------------------------------------------------------------------------

macro_rules! value_task_io {
    ($native:ty, $tdl:expr) => {
        impl TaskIo for $native {
            fn tdl_type() -> TdlType {
                $tdl
            }

            fn from_result(row: &TaskResult) -> Result<Self, SpiderError> {
                decode_value_result(row)
            }
        }

        impl TaskReturn for $native {
            fn output_types() -> Vec<(TdlType, bool)> {
                vec![(<$native as TaskIo>::tdl_type(), false)]
            }

            fn from_results(rows: &[TaskResult]) -> Result<Self, SpiderError> {
                single_result(rows)
            }
        }
    };
}

macro_rules! int_tdl_value {
    ($native:ty, $tdl:expr) => {
        value_task_io!($native, $tdl);

        impl TdlValue for $native {
            fn to_serializable(&self) -> Value {
                Value::from(i64::from(*self))
            }

            fn from_serializable(value: &Value) -> Result<Self, TypeError> {
                let raw = value
                    .as_i64()
                    .ok_or_else(|| TypeError::decode(&Self::tdl_type(), value))?;
                Self::new(raw).map_err(|_| TypeError::decode(&Self::tdl_type(), value))
            }
        }
    };
}

int_tdl_value!(Int8, TdlType::Int8);
int_tdl_value!(Int16, TdlType::Int16);
int_tdl_value!(Int32, TdlType::Int32);
int_tdl_value!(Int64, TdlType::Int64);

value_task_io!(bool, TdlType::Bool);

impl TdlValue for bool {
    fn to_serializable(&self) -> Value {
        Value::Boolean(*self)
    }

    fn from_serializable(value: &Value) -> Result<Self, TypeError> {
        value
            .as_bool()
            .ok_or_else(|| TypeError::decode(&Self::tdl_type(), value))
    }
}

value_task_io!(Float, TdlType::Float);

impl TdlValue for Float {
    fn to_serializable(&self) -> Value {
        Value::F32(self.get())
    }

    fn from_serializable(value: &Value) -> Result<Self, TypeError> {
        match value {
            Value::F32(raw) => Ok(Float::new(*raw)),
            _ => Err(TypeError::decode(&Self::tdl_type(), value)),
        }
    }
}

value_task_io!(Double, TdlType::Double);

impl TdlValue for Double {
    fn to_serializable(&self) -> Value {
        Value::F64(self.get())
    }

    fn from_serializable(value: &Value) -> Result<Self, TypeError> {
        match value {
            Value::F64(raw) => Ok(Double::new(*raw)),
            _ => Err(TypeError::decode(&Self::tdl_type(), value)),
        }
    }
}

value_task_io!(Bytes, TdlType::Bytes);

impl TdlValue for Bytes {
    fn to_serializable(&self) -> Value {
        Value::Binary(self.as_slice().to_vec())
    }

    fn from_serializable(value: &Value) -> Result<Self, TypeError> {
        match value {
            Value::Binary(raw) => Ok(Bytes::new(raw.clone())),
            _ => Err(TypeError::decode(&Self::tdl_type(), value)),
        }
    }
}

// ---------------------------------------------------------------------------
// Collection implementations
// ---------------------------------------------------------------------------

impl<T: TdlValue> TaskIo for Vec<T> {
    fn tdl_type() -> TdlType {
        TdlType::list(T::tdl_type())
    }

    fn from_result(row: &TaskResult) -> Result<Self, SpiderError> {
        decode_value_result(row)
    }
}

impl<T: TdlValue> TdlValue for Vec<T> {
    fn to_serializable(&self) -> Value {
        Value::Array(self.iter().map(T::to_serializable).collect())
    }

    fn from_serializable(value: &Value) -> Result<Self, TypeError> {
        let items = value
            .as_array()
            .ok_or_else(|| TypeError::decode(&Self::tdl_type(), value))?;
        items.iter().map(T::from_serializable).collect()
    }
}

impl<T: TdlValue> TaskReturn for Vec<T> {
    fn output_types() -> Vec<(TdlType, bool)> {
        vec![(Self::tdl_type(), false)]
    }

    fn from_results(rows: &[TaskResult]) -> Result<Self, SpiderError> {
        single_result(rows)
    }
}

impl<K, V> TaskIo for HashMap<K, V>
where
    K: TdlValue + TdlMapKey + Eq + Hash,
    V: TdlValue,
{
    fn tdl_type() -> TdlType {
        // The marker bound guarantees key eligibility.
        TdlType::Map(Box::new(K::tdl_type()), Box::new(V::tdl_type()))
    }

    fn from_result(row: &TaskResult) -> Result<Self, SpiderError> {
        decode_value_result(row)
    }
}

impl<K, V> TdlValue for HashMap<K, V>
where
    K: TdlValue + TdlMapKey + Eq + Hash,
    V: TdlValue,
{
    fn to_serializable(&self) -> Value {
        Value::Map(
            self.iter()
                .map(|(key, value)| (key.to_serializable(), value.to_serializable()))
                .collect(),
        )
    }

    fn from_serializable(value: &Value) -> Result<Self, TypeError> {
        let entries = value
            .as_map()
            .ok_or_else(|| TypeError::decode(&Self::tdl_type(), value))?;
        entries
            .iter()
            .map(|(key, val)| Ok((K::from_serializable(key)?, V::from_serializable(val)?)))
            .collect()
    }
}

impl<K, V> TaskReturn for HashMap<K, V>
where
    K: TdlValue + TdlMapKey + Eq + Hash,
    V: TdlValue,
{
    fn output_types() -> Vec<(TdlType, bool)> {
        vec![(Self::tdl_type(), false)]
    }

    fn from_results(rows: &[TaskResult]) -> Result<Self, SpiderError> {
        single_result(rows)
    }
}

// ---------------------------------------------------------------------------
// Tuple returns (one task output per element)
// ---------------------------------------------------------------------------

macro_rules! tuple_task_return {
    ($($idx:tt => $name:ident),+) => {
        impl<$($name: TaskIo),+> TaskReturn for ($($name,)+) {
            fn output_types() -> Vec<(TdlType, bool)> {
                vec![$(($name::tdl_type(), $name::IS_DATA)),+]
            }

            fn from_results(rows: &[TaskResult]) -> Result<Self, SpiderError> {
                let expected = [$($idx),+].len();
                if rows.len() != expected {
                    return Err(TypeError::ResultArity {
                        expected,
                        found: rows.len(),
                    }
                    .into());
                }
                Ok(($($name::from_result(&rows[$idx])?,)+))
            }
        }
    };
}

tuple_task_return!(0 => T0);
tuple_task_return!(0 => T0, 1 => T1);
tuple_task_return!(0 => T0, 1 => T1, 2 => T2);
tuple_task_return!(0 => T0, 1 => T1, 2 => T2, 3 => T3);
tuple_task_return!(0 => T0, 1 => T1, 2 => T2, 3 => T3, 4 => T4);
tuple_task_return!(0 => T0, 1 => T1, 2 => T2, 3 => T3, 4 => T4, 5 => T5);
tuple_task_return!(0 => T0, 1 => T1, 2 => T2, 3 => T3, 4 => T4, 5 => T5, 6 => T6);
tuple_task_return!(0 => T0, 1 => T1, 2 => T2, 3 => T3, 4 => T4, 5 => T5, 6 => T6, 7 => T7);

// ---------------------------------------------------------------------------
// User-defined records
// ---------------------------------------------------------------------------

/// Declares a TDL record: a struct, its dotted qualified name, and its
/// fields, together with the `TaskIo`/`TdlValue`/`TaskReturn` impls that
/// lower it to a field-name-keyed map and decode it field-wise.
///
/// ```rust,ignore
/// spider::tdl_record! {
///     /// A point on the grid.
///     pub struct Point("examples.geo.Point") {
///         pub x: Int32,
///         pub y: Int32,
///     }
/// }
/// ```
#[macro_export]
macro_rules! tdl_record {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident ($qualified:literal) {
            $($(#[$fmeta:meta])* $fvis:vis $field:ident : $ftype:ty),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq)]
        $vis struct $name {
            $($(#[$fmeta])* $fvis $field: $ftype,)+
        }

        impl $crate::types::TaskIo for $name {
            fn tdl_type() -> $crate::types::TdlType {
                $crate::types::TdlType::Class(::std::string::String::from($qualified))
            }

            fn from_result(
                row: &$crate::core::TaskResult,
            ) -> ::std::result::Result<Self, $crate::error::SpiderError> {
                $crate::types::serde::decode_value_result(row)
            }
        }

        impl $crate::types::TdlValue for $name {
            fn to_serializable(&self) -> $crate::types::serde::Value {
                $crate::types::serde::Value::Map(::std::vec![
                    $((
                        $crate::types::serde::Value::from(::core::stringify!($field)),
                        $crate::types::TdlValue::to_serializable(&self.$field),
                    ),)+
                ])
            }

            fn from_serializable(
                value: &$crate::types::serde::Value,
            ) -> ::std::result::Result<Self, $crate::error::TypeError> {
                let entries = match value {
                    $crate::types::serde::Value::Map(entries) => entries,
                    _ => {
                        return ::std::result::Result::Err($crate::error::TypeError::Decode {
                            expected: ::std::string::String::from($qualified),
                            found: value.to_string(),
                        })
                    }
                };
                $(let mut $field: ::std::option::Option<$ftype> = ::std::option::Option::None;)+
                for (entry_key, entry_value) in entries {
                    let entry_name = entry_key.as_str().ok_or_else(|| {
                        $crate::error::TypeError::Decode {
                            expected: ::std::string::String::from($qualified),
                            found: entry_key.to_string(),
                        }
                    })?;
                    match entry_name {
                        $(::core::stringify!($field) => {
                            $field = ::std::option::Option::Some(
                                <$ftype as $crate::types::TdlValue>::from_serializable(
                                    entry_value,
                                )?,
                            );
                        })+
                        other => {
                            return ::std::result::Result::Err(
                                $crate::error::TypeError::UnknownField {
                                    class: ::std::string::String::from($qualified),
                                    field: ::std::string::String::from(other),
                                },
                            )
                        }
                    }
                }
                ::std::result::Result::Ok(Self {
                    $($field: $field.ok_or_else(|| $crate::error::TypeError::MissingField {
                        class: ::std::string::String::from($qualified),
                        field: ::std::string::String::from(::core::stringify!($field)),
                    })?,)+
                })
            }
        }

        impl $crate::types::TaskReturn for $name {
            fn output_types() -> ::std::vec::Vec<($crate::types::TdlType, bool)> {
                ::std::vec![(<$name as $crate::types::TaskIo>::tdl_type(), false)]
            }

            fn from_results(
                rows: &[$crate::core::TaskResult],
            ) -> ::std::result::Result<Self, $crate::error::SpiderError> {
                $crate::types::serde::single_result(rows)
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tdl_record;

    fn round_trip<T: TdlValue + PartialEq + std::fmt::Debug>(value: T) {
        let lowered = value.to_serializable();
        let packed = to_msgpack(&lowered).unwrap();
        let unpacked = from_msgpack(&packed).unwrap();
        assert_eq!(T::from_serializable(&unpacked).unwrap(), value);
    }

    tdl_record! {
        struct Point("tests.serde.Point") {
            x: Int8,
            y: Int8,
        }
    }

    tdl_record! {
        struct Segment("tests.serde.Segment") {
            start: Point,
            end: Point,
            weights: Vec<Double>,
        }
    }

    fn point(x: i64, y: i64) -> Point {
        Point {
            x: Int8::new(x).unwrap(),
            y: Int8::new(y).unwrap(),
        }
    }

    #[test]
    fn primitive_round_trips() {
        round_trip(true);
        round_trip(Int8::new(-128).unwrap());
        round_trip(Int16::new(32767).unwrap());
        round_trip(Int32::new(-40_000).unwrap());
        round_trip(Int64::new(i64::MAX).unwrap());
        round_trip(Float::new(2.5));
        round_trip(Double::new(-0.125));
        round_trip(Bytes::from(&b"\x00\xffspider"[..]));
    }

    #[test]
    fn collection_round_trips() {
        round_trip(vec![
            Int8::new(1).unwrap(),
            Int8::new(2).unwrap(),
            Int8::new(3).unwrap(),
        ]);
        round_trip(vec![vec![Int64::new(7).unwrap()], vec![]]);

        let mut by_id: HashMap<Int32, Vec<Double>> = HashMap::new();
        by_id.insert(Int32::new(1).unwrap(), vec![Double::new(0.5)]);
        by_id.insert(Int32::new(2).unwrap(), vec![]);
        round_trip(by_id);

        // String-keyed map (`List<int8>` keys).
        let mut by_name: HashMap<Vec<Int8>, bool> = HashMap::new();
        by_name.insert(vec![Int8::new(97).unwrap()], true);
        round_trip(by_name);
    }

    #[test]
    fn record_round_trips() {
        round_trip(point(1, -2));
        round_trip(Segment {
            start: point(0, 0),
            end: point(3, 4),
            weights: vec![Double::new(1.0), Double::new(0.25)],
        });
    }

    #[test]
    fn record_lowers_to_field_map() {
        let lowered = point(1, 2).to_serializable();
        let entries = lowered.as_map().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0.as_str(), Some("x"));
        assert_eq!(entries[1].0.as_str(), Some("y"));
    }

    #[test]
    fn record_tdl_type_is_class() {
        assert_eq!(Point::tdl_type().type_str(), "tests.serde.Point");
        assert_eq!(
            TdlType::parse("tests.serde.Point").unwrap(),
            Point::tdl_type()
        );
    }

    #[test]
    fn decode_rejects_wrong_shape() {
        assert!(bool::from_serializable(&Value::from(1i64)).is_err());
        assert!(Int8::from_serializable(&Value::Boolean(true)).is_err());
        assert!(Float::from_serializable(&Value::F64(1.0)).is_err());
        assert!(Vec::<Int8>::from_serializable(&Value::Binary(vec![1])).is_err());
        assert!(Point::from_serializable(&Value::Array(vec![])).is_err());
    }

    #[test]
    fn decode_rejects_out_of_range_integers() {
        let err = Int8::from_serializable(&Value::from(300i64)).unwrap_err();
        assert!(matches!(err, TypeError::Decode { .. }));
    }

    #[test]
    fn decode_rejects_unknown_and_missing_fields() {
        let unknown = Value::Map(vec![
            (Value::from("x"), Value::from(1i64)),
            (Value::from("y"), Value::from(2i64)),
            (Value::from("z"), Value::from(3i64)),
        ]);
        assert!(matches!(
            Point::from_serializable(&unknown),
            Err(TypeError::UnknownField { .. })
        ));

        let missing = Value::Map(vec![(Value::from("x"), Value::from(1i64))]);
        assert!(matches!(
            Point::from_serializable(&missing),
            Err(TypeError::MissingField { .. })
        ));
    }

    #[test]
    fn tuple_output_types_follow_elements() {
        let outputs = <(Int8, Vec<Double>)>::output_types();
        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0].0.type_str(), "int8");
        assert_eq!(outputs[1].0.type_str(), "List<double>");
        assert!(!outputs[0].1);
    }

    #[test]
    fn value_result_decoding_checks_stored_type() {
        let payload = to_msgpack(&Int8::new(5).unwrap().to_serializable()).unwrap();
        let row = TaskResult::Value {
            tdl_type: "int8".to_string(),
            payload: payload.clone(),
        };
        assert_eq!(
            decode_value_result::<Int8>(&row).unwrap(),
            Int8::new(5).unwrap()
        );

        let mismatched = TaskResult::Value {
            tdl_type: "int16".to_string(),
            payload,
        };
        assert!(decode_value_result::<Int8>(&mismatched).is_err());
    }
}
