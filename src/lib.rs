//! # Spider client
//!
//! Client library for the Spider distributed task-execution framework.
//! Compose typed task graphs, bind concrete arguments, and submit the
//! resulting jobs to the shared storage backend that Spider's schedulers
//! and workers consume.
//!
//! ## Overview
//!
//! - **TDL** — the type description language. Native types map to a
//!   canonical textual form ([`TdlType`]) that is the sole type identity
//!   crossing process boundaries.
//! - **Composition** — [`group`] takes disjoint unions of task functions
//!   and graphs; [`chain`] splices a child graph's inputs onto a parent
//!   graph's outputs, position by position, with type checking.
//! - **Submission** — a [`Driver`] owns one storage session, binds
//!   argument tuples to a graph's input roots, and writes every submitted
//!   graph in a single transaction. [`Job`] handles read status and typed
//!   results back lazily.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use spider::{chain, group, Driver, Int8, TaskArgument, TaskContext, TaskFunction};
//!
//! fn double(_: &mut TaskContext, x: Int8) -> Int8 {
//!     Int8::new(i64::from(x) * 2).unwrap()
//! }
//!
//! fn sum(_: &mut TaskContext, x: Int8, y: Int8) -> Int8 {
//!     Int8::new(i64::from(x) + i64::from(y)).unwrap()
//! }
//!
//! let double_fn = TaskFunction::new("examples.tasks.double", double)?;
//! let sum_fn = TaskFunction::new("examples.tasks.sum", sum)?;
//! let graph = chain(group([&double_fn, &double_fn]), &sum_fn)?;
//!
//! let driver = Driver::new("jdbc:mariadb://127.0.0.1:3306/spider?user=spider")?;
//! let args = vec![vec![
//!     TaskArgument::value(&Int8::new(3)?)?,
//!     TaskArgument::value(&Int8::new(4)?)?,
//! ]];
//! let mut jobs = driver.submit_jobs(&[graph], args)?;
//! let result: Option<Int8> = jobs[0].get_results()?;
//! # Ok::<(), spider::SpiderError>(())
//! ```
//!
//! ## Modules
//!
//! - [`types`] — TDL model, parser, bounded primitives, generic serde
//! - [`core`] — tasks, graphs, jobs, and data as plain value types
//! - [`client`] — `Driver` / `Job` / `Data` surface and composition
//! - [`storage`] — the transactional relational facade and its MariaDB
//!   implementation
//! - [`executor`] — the worker/executor pipe protocol

pub mod client;
pub mod core;
pub mod error;
pub mod executor;
pub mod storage;
pub mod types;

pub use crate::client::{
    chain, group, Data, Driver, IntoTaskGraph, Job, TaskArgument, TaskContext, TaskFunction,
};
pub use crate::core::{JobStatus, TaskGraph, TaskState};
pub use crate::error::{SpiderError, TypeError, ValueError};
pub use crate::storage::{JdbcUrl, MariaDbStorage, Storage, StorageError};
pub use crate::types::{
    Bytes, Double, Float, Int16, Int32, Int64, Int8, TaskIo, TaskReturn, TdlType, TdlValue,
};
