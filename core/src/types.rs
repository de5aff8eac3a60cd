//! Field, column and ordering types for model descriptions.
//!
//! A model declares each field with a [`FieldType`]. Every field type maps
//! onto exactly one SQLite [`StorageType`], and the mapping is total: there
//! is no field type without a storage class. Fields can also be declared by
//! Rust type name (see [`FieldType::from_type_name`]), in which case an
//! unknown type name is rejected when the schema is built.

use serde::{Deserialize, Serialize};

/// SQLite storage class of a column.
///
/// # Examples
///
/// ```
/// use activerow_core::StorageType;
///
/// assert_eq!(StorageType::Integer.sql_name(), "INTEGER");
/// assert_eq!(StorageType::from_declared("VARCHAR(40)"), StorageType::Text);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageType {
    /// Signed 64-bit integer.
    Integer,
    /// 64-bit IEEE float.
    Real,
    /// UTF-8 text.
    Text,
    /// Opaque bytes.
    Blob,
}

impl StorageType {
    /// Returns the type name used in `CREATE TABLE` statements.
    pub fn sql_name(self) -> &'static str {
        match self {
            StorageType::Integer => "INTEGER",
            StorageType::Real => "REAL",
            StorageType::Text => "TEXT",
            StorageType::Blob => "BLOB",
        }
    }

    /// Resolves a declared SQL column type using SQLite's affinity rules.
    ///
    /// Used when reading column layouts back from a live database, where
    /// tables may have been created by hand with arbitrary type names.
    pub fn from_declared(declared: &str) -> Self {
        let upper = declared.to_ascii_uppercase();
        if upper.contains("INT") {
            StorageType::Integer
        } else if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") {
            StorageType::Text
        } else if upper.is_empty() || upper.contains("BLOB") {
            StorageType::Blob
        } else {
            StorageType::Real
        }
    }
}

/// Semantic type of a model field.
///
/// # Examples
///
/// ```
/// use activerow_core::{FieldType, StorageType};
///
/// assert_eq!(FieldType::Bool.storage_type(), StorageType::Integer);
/// assert_eq!(FieldType::Timestamp.storage_type(), StorageType::Real);
/// assert_eq!(FieldType::from_type_name("alloc::string::String"), Some(FieldType::Text));
/// assert_eq!(FieldType::from_type_name("Vec<String>"), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    /// Any integer width.
    Integer,
    /// Floating point.
    Real,
    /// Boolean stored as 0/1.
    Bool,
    /// String.
    Text,
    /// Raw bytes.
    Bytes,
    /// Point in time, stored as seconds since the Unix epoch.
    Timestamp,
}

impl FieldType {
    /// Returns the storage class this field type is persisted as.
    pub fn storage_type(self) -> StorageType {
        match self {
            FieldType::Integer | FieldType::Bool => StorageType::Integer,
            FieldType::Real | FieldType::Timestamp => StorageType::Real,
            FieldType::Text => StorageType::Text,
            FieldType::Bytes => StorageType::Blob,
        }
    }

    /// Maps a Rust type name onto a field type.
    ///
    /// Accepts both short names (`i64`, `String`) and the fully qualified
    /// names produced by [`std::any::type_name`]. `Option<T>` maps to the
    /// mapping of `T`. Returns `None` for types with no storage mapping.
    pub fn from_type_name(type_name: &str) -> Option<Self> {
        let name = strip_paths(type_name);
        if let Some(inner) = name
            .strip_prefix("Option<")
            .and_then(|rest| rest.strip_suffix('>'))
        {
            return Self::from_type_name(inner);
        }

        match name.as_str() {
            "i8" | "i16" | "i32" | "i64" | "isize" | "u8" | "u16" | "u32" | "u64" | "usize" => {
                Some(FieldType::Integer)
            }
            "f32" | "f64" => Some(FieldType::Real),
            "bool" => Some(FieldType::Bool),
            "String" | "str" | "&str" | "char" | "Box<str>" => Some(FieldType::Text),
            "Vec<u8>" | "[u8]" | "&[u8]" | "Box<[u8]>" => Some(FieldType::Bytes),
            "DateTime<Utc>" | "SystemTime" => Some(FieldType::Timestamp),
            _ => None,
        }
    }
}

/// Removes module paths from a type name (`alloc::vec::Vec<u8>` → `Vec<u8>`)
/// along with whitespace.
fn strip_paths(type_name: &str) -> String {
    let mut out = String::with_capacity(type_name.len());
    let mut ident = String::new();
    let mut chars = type_name.chars().peekable();

    while let Some(c) = chars.next() {
        if c.is_alphanumeric() || c == '_' {
            ident.push(c);
            continue;
        }
        if c == ':' && chars.peek() == Some(&':') {
            chars.next();
            ident.clear();
            continue;
        }
        out.push_str(&ident);
        ident.clear();
        if !c.is_whitespace() {
            out.push(c);
        }
    }
    out.push_str(&ident);
    out
}

/// A field declared by a model, with the column it is stored in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    /// Field name as the model knows it.
    pub name: String,
    /// Column name in the backing table (defaults to the field name).
    pub column: String,
    /// Declared semantic type.
    pub field_type: FieldType,
}

/// Column layout entry derived from a model description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    /// Column name.
    pub name: String,
    /// Storage class.
    pub storage_type: StorageType,
    /// Whether the column is part of the primary key.
    pub primary_key: bool,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn sql(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }

    pub fn reversed(self) -> Self {
        match self {
            Direction::Asc => Direction::Desc,
            Direction::Desc => Direction::Asc,
        }
    }
}

/// One `(column, direction)` entry of an ordering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub column: String,
    pub direction: Direction,
}

impl OrderBy {
    pub fn new(column: impl Into<String>, direction: Direction) -> Self {
        Self {
            column: column.into(),
            direction,
        }
    }

    pub fn asc(column: impl Into<String>) -> Self {
        Self::new(column, Direction::Asc)
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self::new(column, Direction::Desc)
    }

    /// Returns the same column with the opposite direction.
    pub fn reversed(&self) -> Self {
        Self::new(self.column.clone(), self.direction.reversed())
    }
}

/// Reverses every entry of an ordering.
pub fn reverse_ordering(ordering: &[OrderBy]) -> Vec<OrderBy> {
    ordering.iter().map(OrderBy::reversed).collect()
}
