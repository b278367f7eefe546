//! Task-executor boundary: the pipe protocol between worker and executor.

mod message;

pub use message::{
    parse_arguments_request, read_frame, result_response, write_frame, ExecutorError, RequestKind,
    ResponseKind, HEADER_SIZE,
};
