//! Scalar values exchanged between models, result rows, JSON payloads and
//! SQL parameters.
//!
//! [`Value`] has one variant per SQLite storage class plus `Null`. Models
//! hand out values through [`Model::value_of`](crate::Model::value_of) and
//! receive them through [`Model::assign`](crate::Model::assign); before a
//! value reaches `assign` it has been coerced to the field's declared type
//! with [`Value::coerce`], so a model only needs [`Value::decode`] to unpack
//! it into its own field type.

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::types::{FieldType, StorageType};

/// A single scalar.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

/// Failure to coerce a value into a field's declared type.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionError {
    /// The value's storage class cannot represent the target type.
    #[error("cannot convert {found} value to {expected:?}")]
    Incompatible {
        expected: FieldType,
        found: &'static str,
    },

    /// Text that does not parse as the target type.
    #[error("cannot parse '{text}' as {expected:?}")]
    Unparsable { expected: FieldType, text: String },

    /// A real with a fractional part, or out of range, for an integer field.
    #[error("{value} is not an exact {expected:?}")]
    Inexact { expected: FieldType, value: f64 },
}

impl Value {
    /// Storage class of this value, or `None` for `Null`.
    pub fn storage_type(&self) -> Option<StorageType> {
        match self {
            Value::Null => None,
            Value::Integer(_) => Some(StorageType::Integer),
            Value::Real(_) => Some(StorageType::Real),
            Value::Text(_) => Some(StorageType::Text),
            Value::Blob(_) => Some(StorageType::Blob),
        }
    }

    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Integer(_) => "integer",
            Value::Real(_) => "real",
            Value::Text(_) => "text",
            Value::Blob(_) => "blob",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Coerces this value into the storage representation of `target`.
    ///
    /// `Null` always stays `Null`. Numeric text parses into numeric fields,
    /// numbers render into text fields, `Bool` fields normalize to `0`/`1`,
    /// and RFC 3339 text parses into `Timestamp` fields. Reals only enter
    /// `Integer` fields when they are whole numbers within `i64` range.
    ///
    /// # Examples
    ///
    /// ```
    /// use activerow_core::{FieldType, Value};
    ///
    /// assert_eq!(Value::from("42").coerce(FieldType::Integer).unwrap(), Value::Integer(42));
    /// assert_eq!(Value::Integer(7).coerce(FieldType::Bool).unwrap(), Value::Integer(1));
    /// assert_eq!(Value::Real(1.5).coerce(FieldType::Text).unwrap(), Value::from("1.5"));
    /// assert!(Value::from("abc").coerce(FieldType::Real).is_err());
    /// assert!(Value::Real(2.5).coerce(FieldType::Integer).is_err());
    /// ```
    pub fn coerce(self, target: FieldType) -> Result<Value, ConversionError> {
        if self.is_null() {
            return Ok(Value::Null);
        }
        match target {
            FieldType::Integer => self.coerce_integer(),
            FieldType::Bool => self.coerce_bool(),
            FieldType::Real => self.coerce_real(target),
            FieldType::Timestamp => match self {
                Value::Text(text) => parse_timestamp(&text)
                    .map(|dt| Value::Real(timestamp_seconds(&dt)))
                    .or_else(|| text.trim().parse::<f64>().ok().map(Value::Real))
                    .ok_or(ConversionError::Unparsable {
                        expected: target,
                        text,
                    }),
                other => other.coerce_real(target),
            },
            FieldType::Text => match self {
                Value::Integer(i) => Ok(Value::Text(i.to_string())),
                Value::Real(f) => Ok(Value::Text(f.to_string())),
                Value::Blob(bytes) => String::from_utf8(bytes).map(Value::Text).map_err(|_| {
                    ConversionError::Incompatible {
                        expected: target,
                        found: "non-UTF-8 blob",
                    }
                }),
                text => Ok(text),
            },
            FieldType::Bytes => match self {
                Value::Text(text) => Ok(Value::Blob(text.into_bytes())),
                Value::Blob(bytes) => Ok(Value::Blob(bytes)),
                other => Err(ConversionError::Incompatible {
                    expected: target,
                    found: other.kind(),
                }),
            },
        }
    }

    fn coerce_integer(self) -> Result<Value, ConversionError> {
        match self {
            Value::Integer(i) => Ok(Value::Integer(i)),
            Value::Real(f) => exact_integer(f).map(Value::Integer).ok_or(ConversionError::Inexact {
                expected: FieldType::Integer,
                value: f,
            }),
            Value::Text(text) => parse_integer(&text)
                .map(Value::Integer)
                .ok_or(ConversionError::Unparsable {
                    expected: FieldType::Integer,
                    text,
                }),
            other => Err(ConversionError::Incompatible {
                expected: FieldType::Integer,
                found: other.kind(),
            }),
        }
    }

    fn coerce_bool(self) -> Result<Value, ConversionError> {
        let truth = match self {
            Value::Integer(i) => i != 0,
            Value::Real(f) => f != 0.0,
            Value::Text(text) => match parse_bool(&text) {
                Some(b) => b,
                None => {
                    return Err(ConversionError::Unparsable {
                        expected: FieldType::Bool,
                        text,
                    });
                }
            },
            other => {
                return Err(ConversionError::Incompatible {
                    expected: FieldType::Bool,
                    found: other.kind(),
                });
            }
        };
        Ok(Value::Integer(i64::from(truth)))
    }

    fn coerce_real(self, target: FieldType) -> Result<Value, ConversionError> {
        match self {
            Value::Integer(i) => Ok(Value::Real(i as f64)),
            Value::Real(f) => Ok(Value::Real(f)),
            Value::Text(text) => match text.trim().parse::<f64>() {
                Ok(f) => Ok(Value::Real(f)),
                Err(_) => Err(ConversionError::Unparsable {
                    expected: target,
                    text,
                }),
            },
            other => Err(ConversionError::Incompatible {
                expected: target,
                found: other.kind(),
            }),
        }
    }

    /// Unpacks the value into a Rust field type, falling back to the type's
    /// zero value when the value is `Null` or cannot represent it.
    ///
    /// # Examples
    ///
    /// ```
    /// use activerow_core::Value;
    ///
    /// let id: i64 = Value::Integer(3).decode();
    /// let name: String = Value::Null.decode();
    /// let score: Option<f64> = Value::Null.decode();
    /// assert_eq!((id, name.as_str(), score), (3, "", None));
    /// ```
    pub fn decode<T: FromValue>(self) -> T {
        T::from_value(self)
    }

    /// Converts a JSON scalar into a value.
    ///
    /// Booleans become `0`/`1`, arrays of byte-sized integers (including the
    /// empty array) become blobs, and any other array or object is kept as
    /// its JSON text.
    pub fn from_json(json: &JsonValue) -> Value {
        match json {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Integer(i64::from(*b)),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => n.as_f64().map(Value::Real).unwrap_or(Value::Null),
            },
            JsonValue::String(s) => Value::Text(s.clone()),
            JsonValue::Array(items) => {
                let bytes: Option<Vec<u8>> = items
                    .iter()
                    .map(|item| item.as_u64().and_then(|b| u8::try_from(b).ok()))
                    .collect();
                match bytes {
                    Some(bytes) => Value::Blob(bytes),
                    None => Value::Text(json.to_string()),
                }
            }
            JsonValue::Object(_) => Value::Text(json.to_string()),
        }
    }

    /// Converts the value into JSON. Blobs become arrays of bytes; non-finite
    /// reals become `null`.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::Integer(i) => JsonValue::from(*i),
            Value::Real(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Value::Text(s) => JsonValue::String(s.clone()),
            Value::Blob(bytes) => JsonValue::Array(bytes.iter().map(|b| JsonValue::from(*b)).collect()),
        }
    }
}

/// `f` as an integer when it has no fractional part and fits in `i64`.
fn exact_integer(f: f64) -> Option<i64> {
    // i64::MAX as f64 rounds up to 2^63, which is already out of range.
    let in_range = f >= i64::MIN as f64 && f < i64::MAX as f64;
    (in_range && f.fract() == 0.0).then_some(f as i64)
}

fn parse_integer(text: &str) -> Option<i64> {
    let text = text.trim();
    text.parse::<i64>()
        .ok()
        .or_else(|| text.parse::<f64>().ok().and_then(exact_integer))
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "1" => Some(true),
        "false" | "no" | "n" | "0" | "" => Some(false),
        other => other.parse::<f64>().ok().map(|f| f != 0.0),
    }
}

fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Seconds since the Unix epoch, including the fractional part.
pub fn timestamp_seconds(dt: &DateTime<Utc>) -> f64 {
    dt.timestamp() as f64 + f64::from(dt.timestamp_subsec_nanos()) / 1e9
}

fn timestamp_from_seconds(seconds: f64) -> DateTime<Utc> {
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1e9).round().min(999_999_999.0) as u32;
    DateTime::from_timestamp(whole as i64, nanos).unwrap_or(DateTime::UNIX_EPOCH)
}

/// Conversion from a [`Value`] into a Rust field type.
///
/// Implementations never fail: `Null` and unrepresentable values produce the
/// type's zero value, matching how unset columns read back.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Self;
}

macro_rules! impl_integer_from_value {
    ($($ty:ty),*) => {
        $(
            impl FromValue for $ty {
                fn from_value(value: Value) -> Self {
                    let wide = match value {
                        Value::Integer(i) => i,
                        Value::Real(f) => f as i64,
                        Value::Text(text) => parse_integer(&text).unwrap_or_default(),
                        Value::Null | Value::Blob(_) => 0,
                    };
                    <$ty>::try_from(wide).unwrap_or_default()
                }
            }

            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    i64::try_from(v).map(Value::Integer).unwrap_or(Value::Real(v as f64))
                }
            }
        )*
    };
}

impl_integer_from_value!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl FromValue for f64 {
    fn from_value(value: Value) -> Self {
        match value {
            Value::Integer(i) => i as f64,
            Value::Real(f) => f,
            Value::Text(text) => text.trim().parse().unwrap_or_default(),
            Value::Null | Value::Blob(_) => 0.0,
        }
    }
}

impl FromValue for f32 {
    fn from_value(value: Value) -> Self {
        f64::from_value(value) as f32
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Self {
        match value {
            Value::Integer(i) => i != 0,
            Value::Real(f) => f != 0.0,
            Value::Text(text) => parse_bool(&text).unwrap_or_default(),
            Value::Null | Value::Blob(_) => false,
        }
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Self {
        match value {
            Value::Text(text) => text,
            Value::Integer(i) => i.to_string(),
            Value::Real(f) => f.to_string(),
            Value::Blob(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Value::Null => String::new(),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: Value) -> Self {
        match value {
            Value::Blob(bytes) => bytes,
            Value::Text(text) => text.into_bytes(),
            _ => Vec::new(),
        }
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: Value) -> Self {
        match value {
            Value::Real(f) => timestamp_from_seconds(f),
            Value::Integer(i) => DateTime::from_timestamp(i, 0).unwrap_or(DateTime::UNIX_EPOCH),
            Value::Text(text) => parse_timestamp(&text).unwrap_or(DateTime::UNIX_EPOCH),
            Value::Null | Value::Blob(_) => DateTime::UNIX_EPOCH,
        }
    }
}

impl FromValue for Value {
    fn from_value(value: Value) -> Self {
        value
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Self {
        match value {
            Value::Null => None,
            other => Some(T::from_value(other)),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Real(f64::from(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Text(v.clone())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Blob(v.to_vec())
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Real(timestamp_seconds(&v))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_coerce_null_stays_null() {
        for target in [
            FieldType::Integer,
            FieldType::Real,
            FieldType::Bool,
            FieldType::Text,
            FieldType::Bytes,
            FieldType::Timestamp,
        ] {
            assert_eq!(Value::Null.coerce(target).unwrap(), Value::Null);
        }
    }

    #[test]
    fn test_coerce_integer() {
        assert_eq!(Value::Real(3.0).coerce(FieldType::Integer).unwrap(), Value::Integer(3));
        assert_eq!(
            Value::Real(3.9).coerce(FieldType::Integer).unwrap_err(),
            ConversionError::Inexact {
                expected: FieldType::Integer,
                value: 3.9
            }
        );
        assert!(Value::Real(1e19).coerce(FieldType::Integer).is_err());
        assert!(Value::Real(f64::NAN).coerce(FieldType::Integer).is_err());
        assert_eq!(Value::from("4.0").coerce(FieldType::Integer).unwrap(), Value::Integer(4));
        assert!(Value::from("4.5").coerce(FieldType::Integer).is_err());
        assert_eq!(Value::from(" 12 ").coerce(FieldType::Integer).unwrap(), Value::Integer(12));
        assert!(Value::from("twelve").coerce(FieldType::Integer).is_err());
        assert!(Value::Blob(vec![1]).coerce(FieldType::Integer).is_err());
    }

    #[test]
    fn test_coerce_bool() {
        assert_eq!(Value::from("true").coerce(FieldType::Bool).unwrap(), Value::Integer(1));
        assert_eq!(Value::from("no").coerce(FieldType::Bool).unwrap(), Value::Integer(0));
        assert_eq!(Value::Integer(-4).coerce(FieldType::Bool).unwrap(), Value::Integer(1));
        assert!(Value::from("maybe").coerce(FieldType::Bool).is_err());
    }

    #[test]
    fn test_coerce_text_and_bytes() {
        assert_eq!(Value::Integer(5).coerce(FieldType::Text).unwrap(), Value::from("5"));
        assert_eq!(
            Value::from("hi").coerce(FieldType::Bytes).unwrap(),
            Value::Blob(b"hi".to_vec())
        );
        assert!(Value::Integer(1).coerce(FieldType::Bytes).is_err());
        assert!(Value::Blob(vec![0xff, 0xfe]).coerce(FieldType::Text).is_err());
    }

    #[test]
    fn test_coerce_timestamp_from_rfc3339() {
        let value = Value::from("1970-01-01T00:01:40Z")
            .coerce(FieldType::Timestamp)
            .unwrap();
        assert_eq!(value, Value::Real(100.0));
    }

    #[test]
    fn test_decode_defaults_to_zero_values() {
        assert_eq!(Value::Null.decode::<i64>(), 0);
        assert_eq!(Value::Null.decode::<String>(), "");
        assert!(!Value::Null.decode::<bool>());
        assert_eq!(Value::Null.decode::<Option<i64>>(), None);
        assert_eq!(Value::Integer(300).decode::<u8>(), 0);
        assert_eq!(Value::Integer(7).decode::<Option<i32>>(), Some(7));
    }

    #[test]
    fn test_timestamp_decode() {
        let dt = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let value = Value::from(dt);
        assert_eq!(value.decode::<DateTime<Utc>>(), dt);
    }

    #[test]
    fn test_from_json_scalars() {
        assert_eq!(Value::from_json(&json!(null)), Value::Null);
        assert_eq!(Value::from_json(&json!(true)), Value::Integer(1));
        assert_eq!(Value::from_json(&json!(12)), Value::Integer(12));
        assert_eq!(Value::from_json(&json!(1.25)), Value::Real(1.25));
        assert_eq!(Value::from_json(&json!("x")), Value::from("x"));
        assert_eq!(Value::from_json(&json!([1, 2, 255])), Value::Blob(vec![1, 2, 255]));
        assert_eq!(Value::from_json(&json!([])), Value::Blob(Vec::new()));
        assert_eq!(Value::from_json(&json!([1, 300])), Value::from("[1,300]"));
        assert_eq!(
            Value::from_json(&json!({"a": 1})),
            Value::Text("{\"a\":1}".to_string())
        );
    }

    #[test]
    fn test_to_json() {
        assert_eq!(Value::Integer(4).to_json(), json!(4));
        assert_eq!(Value::Real(f64::NAN).to_json(), json!(null));
        assert_eq!(Value::Blob(vec![9]).to_json(), json!([9]));
    }
}
