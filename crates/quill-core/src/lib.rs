#![forbid(unsafe_code)]
//! quill-core library.
//!
//! Notes, their fragments, chunking, configuration, and the SQLite note store.
//!
//! # Conventions
//!
//! - **Errors**: engine-facing operations return [`error::Result`] with a
//!   [`error::QuillError`]; store and config I/O use `anyhow::Result`.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod chunk;
pub mod config;
pub mod db;
pub mod error;
pub mod model;

pub use error::{ErrorCode, QuillError, Result};
pub use model::{Fragment, FragmentId, Note, NoteLookup};
