//! The [`Model`] trait implemented by every persisted record type.

use std::sync::Arc;

use crate::registry;
use crate::schema::{ModelSchema, SchemaBuilder};
use crate::types::ColumnDef;
use crate::validate::SchemaError;
use crate::value::Value;

/// A record type backed by one table.
///
/// Implementors describe their fields once in [`describe`](Self::describe)
/// and expose them by name through [`value_of`](Self::value_of) and
/// [`assign`](Self::assign). [`Default`] supplies the zero value of every
/// field, which is what fields missing from a row or payload keep.
///
/// # Examples
///
/// ```
/// use activerow_core::{FieldType, Model, SchemaBuilder, Value};
///
/// #[derive(Debug, Default, PartialEq)]
/// struct Account {
///     id: i64,
///     name: String,
/// }
///
/// impl Model for Account {
///     fn describe() -> SchemaBuilder {
///         SchemaBuilder::new("Account")
///             .field_of::<i64>("id")
///             .field("name", FieldType::Text)
///     }
///
///     fn value_of(&self, field: &str) -> Value {
///         match field {
///             "id" => self.id.into(),
///             "name" => self.name.as_str().into(),
///             _ => Value::Null,
///         }
///     }
///
///     fn assign(&mut self, field: &str, value: Value) {
///         match field {
///             "id" => self.id = value.decode(),
///             "name" => self.name = value.decode(),
///             _ => {}
///         }
///     }
/// }
///
/// assert_eq!(Account::table_name().unwrap(), "accounts");
/// assert_eq!(Account::primary_key_column_names().unwrap(), vec!["id"]);
/// ```
pub trait Model: Default + 'static {
    /// Declares the model's fields, keys and defaults.
    fn describe() -> SchemaBuilder;

    /// Returns the current value of `field`, or `Null` for unknown names.
    fn value_of(&self, field: &str) -> Value;

    /// Stores `value`, already coerced to the field's declared type.
    /// Unknown field names are ignored.
    fn assign(&mut self, field: &str, value: Value);

    /// Validated description from the process-wide registry.
    fn schema() -> Result<Arc<ModelSchema>, SchemaError> {
        registry::schema_of::<Self>()
    }

    fn table_name() -> Result<String, SchemaError> {
        Ok(Self::schema()?.table_name().to_string())
    }

    fn columns() -> Result<Vec<ColumnDef>, SchemaError> {
        Ok(Self::schema()?.columns())
    }

    fn column_names() -> Result<Vec<String>, SchemaError> {
        Ok(Self::schema()?
            .column_names()
            .into_iter()
            .map(String::from)
            .collect())
    }

    fn primary_key_columns() -> Result<Vec<ColumnDef>, SchemaError> {
        Ok(Self::schema()?.primary_key_columns())
    }

    fn primary_key_column_names() -> Result<Vec<String>, SchemaError> {
        Ok(Self::schema()?
            .primary_key_column_names()
            .into_iter()
            .map(String::from)
            .collect())
    }

    /// `(column, value)` pairs of the primary key, in key order.
    fn primary_key_values(&self) -> Result<Vec<(String, Value)>, SchemaError> {
        let schema = Self::schema()?;
        Ok(schema
            .primary_key_fields()
            .map(|f| (f.column.clone(), self.value_of(&f.name)))
            .collect())
    }

    /// `(column, value)` pairs of every column, in declaration order.
    fn column_values(&self) -> Result<Vec<(String, Value)>, SchemaError> {
        let schema = Self::schema()?;
        Ok(schema
            .fields()
            .iter()
            .map(|f| (f.column.clone(), self.value_of(&f.name)))
            .collect())
    }

    /// Values of the named fields, in the order given.
    fn values_for_fields(&self, fields: &[&str]) -> Vec<Value> {
        fields.iter().map(|f| self.value_of(f)).collect()
    }
}
