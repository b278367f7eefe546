//! TDL — the type description language crossing process boundaries.
//!
//! Every task input and output carries a TDL type. The canonical textual
//! form produced by [`TdlType::type_str`] is the sole identity used across
//! processes and in storage; [`TdlType::parse`] is its inverse.

use std::fmt;

use crate::error::TypeError;

mod bounded;
mod parse;
pub mod serde;

pub use bounded::{Bytes, Double, Float, Int16, Int32, Int64, Int8};
pub use serde::{from_msgpack, to_msgpack, TaskIo, TaskReturn, TdlMapKey, TdlValue};

pub(crate) use parse::is_dotted_identifier;

/// A TDL type.
///
/// Primitives, homogeneous lists, maps with restricted key types, and
/// user-defined records identified by a dotted name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TdlType {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    Float,
    Double,
    Bytes,
    List(Box<TdlType>),
    Map(Box<TdlType>, Box<TdlType>),
    Class(String),
}

impl TdlType {
    /// Builds a `List<element>` type.
    pub fn list(element: TdlType) -> TdlType {
        TdlType::List(Box::new(element))
    }

    /// Builds a `Map<key,value>` type.
    ///
    /// Fails when `key` is not map-key-eligible (an integral primitive or
    /// `List<int8>`).
    pub fn map(key: TdlType, value: TdlType) -> Result<TdlType, TypeError> {
        if !key.is_map_key() {
            return Err(TypeError::UnsupportedMapKey(key.type_str()));
        }
        Ok(TdlType::Map(Box::new(key), Box::new(value)))
    }

    /// Builds a `Class<name>` type from a dotted qualified name.
    pub fn class(name: impl Into<String>) -> TdlType {
        TdlType::Class(name.into())
    }

    /// Parses a canonical TDL type string.
    pub fn parse(type_string: &str) -> Result<TdlType, TypeError> {
        parse::parse_tdl(type_string)
    }

    /// The canonical textual form of this type.
    pub fn type_str(&self) -> String {
        let mut out = String::new();
        self.write_type_str(&mut out);
        out
    }

    fn write_type_str(&self, out: &mut String) {
        match self {
            TdlType::Bool => out.push_str("bool"),
            TdlType::Int8 => out.push_str("int8"),
            TdlType::Int16 => out.push_str("int16"),
            TdlType::Int32 => out.push_str("int32"),
            TdlType::Int64 => out.push_str("int64"),
            TdlType::Float => out.push_str("float"),
            TdlType::Double => out.push_str("double"),
            TdlType::Bytes => out.push_str("bytes"),
            TdlType::List(element) => {
                out.push_str("List<");
                element.write_type_str(out);
                out.push('>');
            }
            TdlType::Map(key, value) => {
                out.push_str("Map<");
                key.write_type_str(out);
                out.push(',');
                value.write_type_str(out);
                out.push('>');
            }
            TdlType::Class(name) => out.push_str(name),
        }
    }

    /// Whether this is one of the four integral primitives.
    pub fn is_integral(&self) -> bool {
        matches!(
            self,
            TdlType::Int8 | TdlType::Int16 | TdlType::Int32 | TdlType::Int64
        )
    }

    /// Whether this is the canonical string type, `List<int8>`.
    pub fn is_string(&self) -> bool {
        matches!(self, TdlType::List(element) if **element == TdlType::Int8)
    }

    /// Whether this type may key a map.
    pub fn is_map_key(&self) -> bool {
        self.is_integral() || self.is_string()
    }
}

impl fmt::Display for TdlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.type_str())
    }
}
