//! # lode-core
//!
//! Core abstractions shared by the Lode external-table connector:
//!
//! - **Storage Backends**: an object-storage-shaped contract with conditional
//!   writes, plus in-memory and local-filesystem implementations
//! - **Locations**: parsed, normalized URIs for table storage locations
//! - **Error Types**: shared error definitions and result types
//! - **Observability**: logging initialization helpers
//!
//! ## Crate Boundary
//!
//! `lode-core` defines the primitives every other crate builds on. It knows
//! nothing about tables, catalogs, or SQL; those live in `lode-catalog` and
//! `lode-connector`.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod local_fs;
pub mod location;
pub mod observability;
pub mod storage;

pub use error::{Error, Result};
pub use local_fs::LocalFsBackend;
pub use location::{LocationUri, Scheme};
pub use observability::{init_logging, LogFormat};
pub use storage::{
    LocationState, MemoryBackend, ObjectMeta, StorageBackend, WritePrecondition, WriteResult,
};
