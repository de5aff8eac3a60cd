//! Model descriptions, values and mapping for activerow.
//!
//! This crate defines everything about a persisted record type that does
//! not need a database:
//!
//! - [`Model`]: trait implemented by record types, a description plus
//!   by-name field access.
//! - [`SchemaBuilder`] / [`ModelSchema`]: declarative description of a
//!   model, validated once into table name, columns, primary key, default
//!   ordering and JSON key mapping.
//! - [`schema_of`] / [`register`]: process-wide registry caching each
//!   validated description.
//! - [`Value`]: scalar exchanged with rows, payloads and SQL parameters,
//!   with the coercion rules shared by every mapping path.
//! - [`ResultRow`] / [`objects_of`] / [`objects_of_with`]: row → instance mapping,
//!   optionally renaming columns to fields.
//! - [`from_json_value`] / [`from_json_array`] / [`to_json_object`]:
//!   transient JSON interchange.
//!
//! # Example
//!
//! ```
//! use activerow_core::*;
//!
//! let schema = SchemaBuilder::new("Account")
//!     .field_of::<i64>("id")
//!     .field_of::<String>("name")
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(schema.table_name(), "accounts");
//! assert_eq!(schema.primary_key_column_names(), vec!["id"]);
//!
//! // Declared types with no storage mapping are rejected up front.
//! let err = SchemaBuilder::new("Account")
//!     .field_of::<i64>("id")
//!     .field_of::<Vec<String>>("tags")
//!     .build()
//!     .unwrap_err();
//! assert!(matches!(err, SchemaError::UnmappableType { .. }));
//! ```

mod json;
mod model;
mod registry;
mod row;
mod schema;
mod types;
mod validate;
mod value;

pub use json::{from_json_array, from_json_object, from_json_value, to_json_object};
pub use model::Model;
pub use registry::{is_registered, register, schema_of};
pub use row::{MappingError, ResultRow, instantiate, instantiate_with, objects_of, objects_of_with};
pub use schema::{DEFAULT_PRIMARY_KEY, ModelSchema, SchemaBuilder, derive_table_name};
pub use types::*;
pub use validate::{SchemaError, is_valid_identifier};
pub use value::{ConversionError, FromValue, Value, timestamp_seconds};
