//! Model descriptions: declared fields, derived table layout and defaults.
//!
//! A model describes itself with a [`SchemaBuilder`]; [`SchemaBuilder::build`]
//! validates the description and produces an immutable [`ModelSchema`]
//! holding everything the query layer needs: table name, columns in
//! declaration order, primary-key columns, default ordering and the JSON key
//! mapping.
//!
//! # Example
//!
//! ```
//! use activerow_core::{Direction, FieldType, SchemaBuilder, StorageType};
//!
//! let schema = SchemaBuilder::new("MediaItem")
//!     .field("id", FieldType::Integer)
//!     .field_of::<String>("title")
//!     .field_of::<Option<f64>>("duration")
//!     .column_name("title", "item_title")
//!     .order_by("title", Direction::Asc)
//!     .json_key("mediaTitle", "title")
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(schema.table_name(), "media_items");
//! assert_eq!(schema.column_names(), vec!["id", "item_title", "duration"]);
//! assert_eq!(schema.primary_key_column_names(), vec!["id"]);
//! assert_eq!(schema.columns()[2].storage_type, StorageType::Real);
//! ```

use std::collections::{HashMap, HashSet};

use crate::types::{ColumnDef, Direction, FieldDef, FieldType, OrderBy, reverse_ordering};
use crate::validate::{SchemaError, check_identifier};

/// Field name assumed to be the primary key when none is declared.
pub const DEFAULT_PRIMARY_KEY: &str = "id";

#[derive(Debug, Clone)]
enum Declared {
    Known(FieldType),
    TypeName(String),
}

#[derive(Debug, Clone)]
struct PendingField {
    name: String,
    declared: Declared,
}

/// Declarative description of a model type, validated by [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    type_name: String,
    table_name: Option<String>,
    fields: Vec<PendingField>,
    column_overrides: Vec<(String, String)>,
    primary_key: Option<Vec<String>>,
    ordering: Vec<(String, Direction)>,
    json_keys: Vec<(String, String)>,
}

impl SchemaBuilder {
    /// Starts a description for the model type named `type_name`.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            table_name: None,
            fields: Vec::new(),
            column_overrides: Vec::new(),
            primary_key: None,
            ordering: Vec::new(),
            json_keys: Vec::new(),
        }
    }

    /// Declares a field with an explicit semantic type.
    pub fn field(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.fields.push(PendingField {
            name: name.into(),
            declared: Declared::Known(field_type),
        });
        self
    }

    /// Declares a field by its Rust type. The type is mapped when the
    /// description is built; a type with no storage mapping fails the build.
    pub fn field_of<T: ?Sized>(self, name: impl Into<String>) -> Self {
        self.declared_field(name, std::any::type_name::<T>())
    }

    /// Declares a field by type name, e.g. `"i64"` or `"Option<String>"`.
    pub fn declared_field(mut self, name: impl Into<String>, type_name: impl Into<String>) -> Self {
        self.fields.push(PendingField {
            name: name.into(),
            declared: Declared::TypeName(type_name.into()),
        });
        self
    }

    /// Overrides the derived table name.
    pub fn table_name(mut self, table: impl Into<String>) -> Self {
        self.table_name = Some(table.into());
        self
    }

    /// Stores `field` in a column named `column` instead of the field name.
    pub fn column_name(mut self, field: impl Into<String>, column: impl Into<String>) -> Self {
        self.column_overrides.push((field.into(), column.into()));
        self
    }

    /// Declares the primary-key fields, in positional key order.
    pub fn primary_key<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_key = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Appends an entry to the default ordering.
    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.ordering.push((field.into(), direction));
        self
    }

    /// Maps payload key `key` onto `field` for JSON interchange.
    pub fn json_key(mut self, key: impl Into<String>, field: impl Into<String>) -> Self {
        self.json_keys.push((key.into(), field.into()));
        self
    }

    /// Validates the description.
    ///
    /// # Errors
    ///
    /// Returns a [`SchemaError`] for an empty type name, invalid table or
    /// column names, duplicate fields or columns, unmappable field types, a
    /// missing primary key, or references to undeclared fields.
    pub fn build(self) -> Result<ModelSchema, SchemaError> {
        let model = self.type_name.trim().to_string();
        if model.is_empty() {
            return Err(SchemaError::EmptyTypeName);
        }

        let table_name = match self.table_name {
            Some(table) => table,
            None => derive_table_name(&model),
        };
        check_identifier("table", &table_name)?;

        let overrides: HashMap<&str, &str> = self
            .column_overrides
            .iter()
            .map(|(f, c)| (f.as_str(), c.as_str()))
            .collect();

        let mut fields = Vec::with_capacity(self.fields.len());
        let mut seen_fields = HashSet::new();
        let mut seen_columns = HashSet::new();
        for pending in &self.fields {
            if !seen_fields.insert(pending.name.as_str()) {
                return Err(SchemaError::DuplicateField {
                    model,
                    field: pending.name.clone(),
                });
            }
            let field_type = match &pending.declared {
                Declared::Known(field_type) => *field_type,
                Declared::TypeName(type_name) => FieldType::from_type_name(type_name).ok_or_else(|| {
                    SchemaError::UnmappableType {
                        model: model.clone(),
                        field: pending.name.clone(),
                        type_name: type_name.clone(),
                    }
                })?,
            };
            let column = overrides
                .get(pending.name.as_str())
                .map_or_else(|| pending.name.clone(), |c| c.to_string());
            check_identifier("column", &column)?;
            if !seen_columns.insert(column.clone()) {
                return Err(SchemaError::DuplicateColumn { model, column });
            }
            fields.push(FieldDef {
                name: pending.name.clone(),
                column,
                field_type,
            });
        }

        let index_of = |role: &'static str, name: &str| -> Result<usize, SchemaError> {
            fields
                .iter()
                .position(|f| f.name == name)
                .ok_or_else(|| SchemaError::UnknownField {
                    model: model.clone(),
                    role,
                    field: name.to_string(),
                })
        };

        for (field, _) in &self.column_overrides {
            index_of("column override", field)?;
        }

        let primary_key = match &self.primary_key {
            Some(names) => {
                let mut indexes = Vec::with_capacity(names.len());
                for name in names {
                    let index = index_of("primary key", name)?;
                    if !indexes.contains(&index) {
                        indexes.push(index);
                    }
                }
                indexes
            }
            None => fields
                .iter()
                .position(|f| f.name == DEFAULT_PRIMARY_KEY)
                .into_iter()
                .collect(),
        };
        if primary_key.is_empty() {
            return Err(SchemaError::NoPrimaryKey(model));
        }

        let mut default_ordering = Vec::with_capacity(self.ordering.len());
        for (name, direction) in &self.ordering {
            let index = index_of("ordering", name)?;
            default_ordering.push(OrderBy::new(fields[index].column.clone(), *direction));
        }
        if default_ordering.is_empty() {
            default_ordering = primary_key
                .iter()
                .map(|&i| OrderBy::asc(fields[i].column.clone()))
                .collect();
        }

        let mut json_keys = HashMap::with_capacity(self.json_keys.len());
        for (key, field) in &self.json_keys {
            let index = index_of("JSON mapping", field)?;
            json_keys.insert(key.clone(), index);
        }

        Ok(ModelSchema {
            type_name: model,
            table_name,
            fields,
            primary_key,
            default_ordering,
            json_keys,
        })
    }
}

/// Validated, immutable description of a model type.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSchema {
    type_name: String,
    table_name: String,
    fields: Vec<FieldDef>,
    primary_key: Vec<usize>,
    default_ordering: Vec<OrderBy>,
    json_keys: HashMap<String, usize>,
}

impl ModelSchema {
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Declared fields in declaration order.
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_by_column(&self, column: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.column == column)
    }

    /// Resolves a column or field name to the column it refers to.
    pub fn resolve_column(&self, name: &str) -> Option<&str> {
        self.field_by_column(name)
            .or_else(|| self.field(name))
            .map(|f| f.column.as_str())
    }

    /// Column layout in declaration order.
    pub fn columns(&self) -> Vec<ColumnDef> {
        self.fields
            .iter()
            .enumerate()
            .map(|(i, f)| ColumnDef {
                name: f.column.clone(),
                storage_type: f.field_type.storage_type(),
                primary_key: self.primary_key.contains(&i),
            })
            .collect()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.column.as_str()).collect()
    }

    /// Primary-key fields in positional key order.
    pub fn primary_key_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.primary_key.iter().map(|&i| &self.fields[i])
    }

    /// Primary-key columns in positional key order.
    pub fn primary_key_columns(&self) -> Vec<ColumnDef> {
        self.primary_key_fields()
            .map(|f| ColumnDef {
                name: f.column.clone(),
                storage_type: f.field_type.storage_type(),
                primary_key: true,
            })
            .collect()
    }

    pub fn primary_key_column_names(&self) -> Vec<&str> {
        self.primary_key_fields().map(|f| f.column.as_str()).collect()
    }

    pub fn is_primary_key_column(&self, column: &str) -> bool {
        self.primary_key_fields().any(|f| f.column == column)
    }

    /// Fields that are not part of the primary key.
    pub fn non_key_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields
            .iter()
            .enumerate()
            .filter(|(i, _)| !self.primary_key.contains(i))
            .map(|(_, f)| f)
    }

    /// Default ordering; ascending primary key unless the model declares one.
    pub fn default_ordering(&self) -> &[OrderBy] {
        &self.default_ordering
    }

    pub fn reverse_ordering(&self) -> Vec<OrderBy> {
        reverse_ordering(&self.default_ordering)
    }

    /// Field a payload key maps onto: an explicit mapping first, then a field
    /// with the same name.
    pub fn field_for_json_key(&self, key: &str) -> Option<&FieldDef> {
        match self.json_keys.get(key) {
            Some(&i) => Some(&self.fields[i]),
            None => self.field(key),
        }
    }

    /// Payload key used when writing `field` to JSON.
    pub fn json_key_for_field<'a>(&'a self, field: &'a str) -> &'a str {
        self.json_keys
            .iter()
            .find(|(_, i)| self.fields[**i].name == field)
            .map_or(field, |(key, _)| key.as_str())
    }
}

/// Derives a table name from a model type name: `CamelCase` becomes
/// `snake_case`, then the last word is pluralized.
///
/// # Examples
///
/// ```
/// use activerow_core::derive_table_name;
///
/// assert_eq!(derive_table_name("Account"), "accounts");
/// assert_eq!(derive_table_name("MediaItem"), "media_items");
/// assert_eq!(derive_table_name("Category"), "categories");
/// assert_eq!(derive_table_name("Box"), "boxes");
/// ```
pub fn derive_table_name(type_name: &str) -> String {
    let mut snake = String::with_capacity(type_name.len() + 4);
    let mut prev_lower = false;
    for c in type_name.trim().chars() {
        if c.is_uppercase() {
            if prev_lower {
                snake.push('_');
            }
            snake.extend(c.to_lowercase());
            prev_lower = false;
        } else {
            prev_lower = c.is_lowercase() || c.is_ascii_digit();
            snake.push(c);
        }
    }
    pluralize(&snake)
}

fn pluralize(word: &str) -> String {
    let ends_with_consonant_y = word.ends_with('y')
        && word
            .chars()
            .rev()
            .nth(1)
            .is_some_and(|c| !"aeiou".contains(c));
    if ends_with_consonant_y {
        format!("{}ies", &word[..word.len() - 1])
    } else if ["s", "x", "z", "ch", "sh"].iter().any(|s| word.ends_with(s)) {
        format!("{word}es")
    } else {
        format!("{word}s")
    }
}
