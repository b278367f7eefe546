//! Length-prefixed msgpack frames carried over the executor pipes.
//!
//! Each frame is a 16-byte zero-padded ASCII-decimal length header
//! followed by a msgpack body of that many bytes. Bodies are arrays of
//! shape `[kind, payload]` in either direction.

use std::io::{Read, Write};

use rmpv::Value;
use thiserror::Error;

use crate::types::{from_msgpack, to_msgpack};

/// Size of the decimal length header, in bytes.
pub const HEADER_SIZE: usize = 16;

/// Kinds of messages sent to the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RequestKind {
    Unknown = 0,
    Arguments = 1,
    Resume = 2,
}

/// Kinds of messages sent by the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ResponseKind {
    Unknown = 0,
    Result = 1,
    Error = 2,
    Block = 3,
    Ready = 4,
    Cancel = 5,
}

/// A framing or protocol failure on the executor pipe. Fatal to the
/// executor invocation that hit it.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("pipe error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid frame header `{0}`")]
    InvalidHeader(String),

    #[error("message body ended before {expected} bytes")]
    TruncatedBody { expected: usize },

    #[error("message is not a msgpack array")]
    NotAnArray,

    #[error("message has {0} elements, expected 2")]
    WrongArity(usize),

    #[error("message kind or payload has the wrong shape")]
    MalformedPayload,

    #[error("message header is not an `Arguments` request: {0}")]
    UnexpectedKind(u64),

    #[error("message decode error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    #[error("message encode error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
}

/// Reads one frame and returns its body.
pub fn read_frame(pipe: &mut impl Read) -> Result<Vec<u8>, ExecutorError> {
    let mut header = [0u8; HEADER_SIZE];
    pipe.read_exact(&mut header)?;
    let header_str = std::str::from_utf8(&header)
        .map_err(|_| ExecutorError::InvalidHeader(format!("{header:?}")))?;
    let body_size: usize = header_str
        .parse()
        .map_err(|_| ExecutorError::InvalidHeader(header_str.to_string()))?;

    let mut body = vec![0u8; body_size];
    pipe.read_exact(&mut body).map_err(|err| {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            ExecutorError::TruncatedBody {
                expected: body_size,
            }
        } else {
            ExecutorError::Io(err)
        }
    })?;
    Ok(body)
}

/// Writes one frame: zero-padded decimal length header, then the body.
pub fn write_frame(pipe: &mut impl Write, body: &[u8]) -> Result<(), ExecutorError> {
    write!(pipe, "{:0width$}", body.len(), width = HEADER_SIZE)?;
    pipe.write_all(body)?;
    pipe.flush()?;
    Ok(())
}

/// Validates an `Arguments` request body and returns the argument array.
pub fn parse_arguments_request(body: &[u8]) -> Result<Vec<Value>, ExecutorError> {
    let message = from_msgpack(body)?;
    let items = message.as_array().ok_or(ExecutorError::NotAnArray)?;
    if items.len() != 2 {
        return Err(ExecutorError::WrongArity(items.len()));
    }
    let kind = items[0].as_u64().ok_or(ExecutorError::MalformedPayload)?;
    if kind != RequestKind::Arguments as u64 {
        return Err(ExecutorError::UnexpectedKind(kind));
    }
    items[1]
        .as_array()
        .cloned()
        .ok_or(ExecutorError::MalformedPayload)
}

/// Builds a `Result` response body carrying the task's lowered outputs.
pub fn result_response(outputs: &[Value]) -> Result<Vec<u8>, ExecutorError> {
    let mut body = Vec::with_capacity(outputs.len() + 1);
    body.push(Value::from(ResponseKind::Result as u64));
    body.extend(outputs.iter().cloned());
    Ok(to_msgpack(&Value::Array(body))?)
}
