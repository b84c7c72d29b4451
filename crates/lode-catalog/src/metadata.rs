//! Table metadata records.
//!
//! These are the shapes the catalog owns after a successful commit. They are
//! deliberately stringly-typed at the serialization boundary (SQL type
//! spellings, location URIs as strings) and converted to arrow types only at
//! the read/write edges.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CatalogError, Result};

/// Column types supported by the external-table connector.
///
/// A closed set: every variant has a SQL spelling and an arrow
/// representation, and schema inference from query results must map into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    /// 64-bit signed integer (`bigint`).
    BigInt,
    /// 32-bit signed integer (`integer`).
    Integer,
    /// 64-bit floating point (`double`).
    Double,
    /// Variable-length UTF-8 string (`varchar`).
    Varchar,
    /// Boolean (`boolean`).
    Boolean,
    /// Microsecond-precision timestamp without a zone (`timestamp`).
    Timestamp,
}

impl ColumnType {
    /// Returns the SQL spelling of this type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::BigInt => "bigint",
            Self::Integer => "integer",
            Self::Double => "double",
            Self::Varchar => "varchar",
            Self::Boolean => "boolean",
            Self::Timestamp => "timestamp",
        }
    }

    /// Returns the arrow representation of this type.
    #[must_use]
    pub const fn arrow_type(&self) -> DataType {
        match self {
            Self::BigInt => DataType::Int64,
            Self::Integer => DataType::Int32,
            Self::Double => DataType::Float64,
            Self::Varchar => DataType::Utf8,
            Self::Boolean => DataType::Boolean,
            Self::Timestamp => DataType::Timestamp(TimeUnit::Microsecond, None),
        }
    }

    /// Maps an arrow type produced by the query executor into the catalog's
    /// type system.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::UnsupportedType`] for arrow types with no
    /// catalog representation.
    pub fn from_arrow(data_type: &DataType) -> Result<Self> {
        match data_type {
            DataType::Int64 => Ok(Self::BigInt),
            DataType::Int32 => Ok(Self::Integer),
            DataType::Float64 => Ok(Self::Double),
            DataType::Utf8 | DataType::LargeUtf8 => Ok(Self::Varchar),
            DataType::Boolean => Ok(Self::Boolean),
            DataType::Timestamp(_, None) => Ok(Self::Timestamp),
            other => Err(CatalogError::unsupported_type(format!(
                "no catalog type for arrow type {other}"
            ))),
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColumnType {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "bigint" => Ok(Self::BigInt),
            "integer" | "int" => Ok(Self::Integer),
            "double" => Ok(Self::Double),
            "varchar" | "string" => Ok(Self::Varchar),
            "boolean" => Ok(Self::Boolean),
            "timestamp" => Ok(Self::Timestamp),
            other => Err(CatalogError::unsupported_type(format!(
                "unknown column type '{other}'"
            ))),
        }
    }
}

/// A single column of a table schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    /// Column name.
    pub name: String,
    /// Column type.
    pub data_type: ColumnType,
    /// Whether the column admits nulls.
    pub nullable: bool,
}

impl ColumnDef {
    /// Creates a nullable column.
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: true,
        }
    }

    /// Marks the column non-nullable.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Converts this column to an arrow field.
    #[must_use]
    pub fn arrow_field(&self) -> Field {
        Field::new(&self.name, self.data_type.arrow_type(), self.nullable)
    }
}

/// File format of a table's data files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    /// Apache Parquet.
    Parquet,
}

impl FileFormat {
    /// Returns the file extension for data files of this format.
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Parquet => "parquet",
        }
    }
}

impl Default for FileFormat {
    fn default() -> Self {
        Self::Parquet
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parquet => f.write_str("parquet"),
        }
    }
}

/// Where and how a table's data is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageDescriptor {
    /// Location URI under which the data files reside.
    pub location: String,
    /// True for external tables: dropping the table leaves the data files
    /// untouched.
    pub external: bool,
    /// Data file format.
    pub format: FileFormat,
}

impl StorageDescriptor {
    /// Creates a descriptor for an external table at `location`.
    #[must_use]
    pub fn external(location: impl Into<String>, format: FileFormat) -> Self {
        Self {
            location: location.into(),
            external: true,
            format,
        }
    }
}

/// Catalog metadata for a single table.
///
/// Owned exclusively by the catalog after a successful commit; immutable
/// except for `drop_table`, which removes the whole entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMetadata {
    /// Table name, unique within the catalog.
    pub name: String,
    /// Ordered table schema.
    pub columns: Vec<ColumnDef>,
    /// Storage descriptor.
    pub storage: StorageDescriptor,
    /// Commit timestamp.
    pub created_at: DateTime<Utc>,
}

impl TableMetadata {
    /// Creates table metadata stamped at `created_at`.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        columns: Vec<ColumnDef>,
        storage: StorageDescriptor,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.into(),
            columns,
            storage,
            created_at,
        }
    }

    /// Builds the arrow schema for this table.
    #[must_use]
    pub fn arrow_schema(&self) -> SchemaRef {
        Arc::new(Schema::new(
            self.columns
                .iter()
                .map(ColumnDef::arrow_field)
                .collect::<Vec<_>>(),
        ))
    }
}

/// Derives catalog columns from an arrow schema produced by a query.
///
/// # Errors
///
/// Returns [`CatalogError::UnsupportedType`] if any field's type has no
/// catalog representation.
pub fn columns_from_arrow_schema(schema: &Schema) -> Result<Vec<ColumnDef>> {
    schema
        .fields()
        .iter()
        .map(|field| {
            Ok(ColumnDef {
                name: field.name().clone(),
                data_type: ColumnType::from_arrow(field.data_type())?,
                nullable: field.is_nullable(),
            })
        })
        .collect()
}
