//! Model description validation.
//!
//! Every model description is validated once, when it is first registered.
//! A description that fails here can never be used: unmappable field types,
//! missing primary keys and bad identifiers are construction-time errors,
//! never silently defaulted.

use thiserror::Error;

/// Errors raised while building or registering a model description.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// Model type name is empty or whitespace-only.
    #[error("model type name cannot be empty")]
    EmptyTypeName,

    /// A table or column name contains characters outside `[A-Za-z0-9_]`
    /// or starts with a digit.
    #[error("invalid {kind} name '{name}': must contain only alphanumeric characters and underscores")]
    InvalidIdentifier { kind: &'static str, name: String },

    /// Two fields share a name.
    #[error("duplicate field in {model}: {field}")]
    DuplicateField { model: String, field: String },

    /// Two fields map onto the same column.
    #[error("duplicate column in {model}: {column}")]
    DuplicateColumn { model: String, column: String },

    /// A field was declared with a Rust type that has no storage mapping.
    #[error("field {field} of {model} has unmappable type {type_name}")]
    UnmappableType {
        model: String,
        field: String,
        type_name: String,
    },

    /// No primary key was declared and the model has no `id` field.
    #[error("model {0} has no primary key columns")]
    NoPrimaryKey(String),

    /// A primary key, ordering, column override or JSON mapping names a
    /// field the model does not declare.
    #[error("{role} of {model} refers to unknown field {field}")]
    UnknownField {
        model: String,
        role: &'static str,
        field: String,
    },
}

/// Returns `true` if `name` is usable as a table or column name.
///
/// Accepts ASCII alphanumerics and underscores, not starting with a digit.
///
/// # Examples
///
/// ```
/// use activerow_core::is_valid_identifier;
///
/// assert!(is_valid_identifier("media_items"));
/// assert!(!is_valid_identifier("drop;--"));
/// assert!(!is_valid_identifier("1st"));
/// ```
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub(crate) fn check_identifier(kind: &'static str, name: &str) -> Result<(), SchemaError> {
    if is_valid_identifier(name) {
        Ok(())
    } else {
        Err(SchemaError::InvalidIdentifier {
            kind,
            name: name.to_string(),
        })
    }
}
