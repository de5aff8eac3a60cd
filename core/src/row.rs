//! Result rows and their mapping onto model instances.
//!
//! A [`ResultRow`] is the column-name → value mapping for one matched row.
//! It lives only long enough to be turned into a model: columns the model
//! does not declare are ignored, and declared fields absent from the row
//! keep their zero value.

use thiserror::Error;

use crate::model::Model;
use crate::schema::ModelSchema;
use crate::validate::SchemaError;
use crate::value::{ConversionError, Value};

/// Errors mapping rows or payloads onto model instances.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MappingError {
    /// The model description is invalid.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// A value could not be converted to its field's type.
    #[error("field {field}: {source}")]
    Field {
        field: String,
        #[source]
        source: ConversionError,
    },

    /// A payload (or array element at `index`) is not a JSON object.
    #[error("payload{} is not a JSON object", .index.map(|i| format!(" element {i}")).unwrap_or_default())]
    NotAnObject { index: Option<usize> },
}

/// Ordered column-name → value mapping for one row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultRow {
    columns: Vec<(String, Value)>,
}

impl ResultRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            columns: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, column: impl Into<String>, value: Value) {
        self.columns.push((column.into(), value));
    }

    /// Value of the first column named `column`.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn into_columns(self) -> Vec<(String, Value)> {
        self.columns
    }
}

impl FromIterator<(String, Value)> for ResultRow {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            columns: iter.into_iter().collect(),
        }
    }
}

/// Builds a model instance from a row using an already-resolved schema.
pub fn instantiate<M: Model>(schema: &ModelSchema, row: ResultRow) -> Result<M, MappingError> {
    instantiate_with(schema, row, &[])
}

/// Like [`instantiate`], but `mappings` routes row columns to fields by
/// name as `(column, field)` pairs, for result sets whose column names
/// differ from the table's. Unmapped columns resolve as usual; a mapping to
/// an undeclared field drops that column.
pub fn instantiate_with<M: Model>(
    schema: &ModelSchema,
    row: ResultRow,
    mappings: &[(&str, &str)],
) -> Result<M, MappingError> {
    let mut model = M::default();
    for (column, value) in row.into_columns() {
        let field = match mappings.iter().find(|(mapped, _)| *mapped == column) {
            Some((_, field)) => schema.field(field),
            None => schema.field_by_column(&column),
        };
        let Some(field) = field else {
            continue;
        };
        let value = value
            .coerce(field.field_type)
            .map_err(|source| MappingError::Field {
                field: field.name.clone(),
                source,
            })?;
        model.assign(&field.name, value);
    }
    Ok(model)
}

/// Builds one model instance per row, preserving row order.
///
/// # Examples
///
/// ```
/// use activerow_core::{objects_of, FieldType, Model, ResultRow, SchemaBuilder, Value};
///
/// #[derive(Default)]
/// struct Tag {
///     id: i64,
///     label: String,
/// }
///
/// impl Model for Tag {
///     fn describe() -> SchemaBuilder {
///         SchemaBuilder::new("Tag")
///             .field("id", FieldType::Integer)
///             .field("label", FieldType::Text)
///     }
///     fn value_of(&self, field: &str) -> Value {
///         match field {
///             "id" => self.id.into(),
///             "label" => self.label.as_str().into(),
///             _ => Value::Null,
///         }
///     }
///     fn assign(&mut self, field: &str, value: Value) {
///         match field {
///             "id" => self.id = value.decode(),
///             "label" => self.label = value.decode(),
///             _ => {}
///         }
///     }
/// }
///
/// let mut row = ResultRow::new();
/// row.push("id", Value::Text("7".into()));
/// row.push("label", Value::Text("rust".into()));
/// row.push("rank", Value::Integer(1));
///
/// let tags: Vec<Tag> = objects_of(vec![row]).unwrap();
/// assert_eq!((tags[0].id, tags[0].label.as_str()), (7, "rust"));
/// ```
pub fn objects_of<M: Model>(rows: impl IntoIterator<Item = ResultRow>) -> Result<Vec<M>, MappingError> {
    let schema = M::schema()?;
    rows.into_iter()
        .map(|row| instantiate(&schema, row))
        .collect()
}

/// [`objects_of`] with column → field `mappings`; see [`instantiate_with`].
pub fn objects_of_with<M: Model>(
    rows: impl IntoIterator<Item = ResultRow>,
    mappings: &[(&str, &str)],
) -> Result<Vec<M>, MappingError> {
    let schema = M::schema()?;
    rows.into_iter()
        .map(|row| instantiate_with(&schema, row, mappings))
        .collect()
}
