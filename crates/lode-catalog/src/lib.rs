//! # lode-catalog
//!
//! Table metadata model and the process-wide catalog.
//!
//! The catalog is shared state with an explicit lifecycle: constructed at
//! engine startup, mutated only through [`Catalog::register_table`] and
//! [`Catalog::drop_table`], torn down at shutdown. Registration is a single
//! atomic operation guarded by the catalog's name-uniqueness check, which is
//! what makes it safe to use as the commit point of a create-table attempt:
//! a table is either fully visible with all of its data files durable, or
//! not visible at all.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod catalog;
pub mod error;
pub mod metadata;

pub use catalog::Catalog;
pub use error::{CatalogError, Result};
pub use metadata::{
    columns_from_arrow_schema, ColumnDef, ColumnType, FileFormat, StorageDescriptor, TableMetadata,
};
