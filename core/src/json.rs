//! Transient JSON mapping between payloads and model instances.
//!
//! Payload keys are matched to fields through the model's JSON key mapping
//! (identity unless overridden with
//! [`SchemaBuilder::json_key`](crate::SchemaBuilder::json_key)). Unknown
//! keys are ignored, missing keys leave the field at its zero value, and
//! scalars are coerced with the same rules as result rows.
//!
//! Nothing here touches a database; the persistent forms live in the
//! storage crate and save the instance after building it.

use serde_json::{Map, Value as JsonValue};

use crate::model::Model;
use crate::row::MappingError;
use crate::value::Value;

/// Builds an instance from a JSON object.
pub fn from_json_object<M: Model>(payload: &Map<String, JsonValue>) -> Result<M, MappingError> {
    let schema = M::schema()?;
    let mut model = M::default();
    for (key, raw) in payload {
        let Some(field) = schema.field_for_json_key(key) else {
            continue;
        };
        let value = Value::from_json(raw)
            .coerce(field.field_type)
            .map_err(|source| MappingError::Field {
                field: field.name.clone(),
                source,
            })?;
        model.assign(&field.name, value);
    }
    Ok(model)
}

/// Builds an instance from a JSON value, which must be an object.
///
/// # Examples
///
/// ```
/// use activerow_core::{from_json_value, FieldType, Model, SchemaBuilder, Value};
/// use serde_json::json;
///
/// #[derive(Default)]
/// struct User {
///     id: i64,
///     login: String,
/// }
///
/// impl Model for User {
///     fn describe() -> SchemaBuilder {
///         SchemaBuilder::new("User")
///             .field("id", FieldType::Integer)
///             .field("login", FieldType::Text)
///             .json_key("userName", "login")
///     }
///     fn value_of(&self, field: &str) -> Value {
///         match field {
///             "id" => self.id.into(),
///             "login" => self.login.as_str().into(),
///             _ => Value::Null,
///         }
///     }
///     fn assign(&mut self, field: &str, value: Value) {
///         match field {
///             "id" => self.id = value.decode(),
///             "login" => self.login = value.decode(),
///             _ => {}
///         }
///     }
/// }
///
/// let user: User = from_json_value(&json!({"id": "12", "userName": "ada", "avatar": null})).unwrap();
/// assert_eq!((user.id, user.login.as_str()), (12, "ada"));
/// ```
pub fn from_json_value<M: Model>(payload: &JsonValue) -> Result<M, MappingError> {
    match payload {
        JsonValue::Object(object) => from_json_object(object),
        _ => Err(MappingError::NotAnObject { index: None }),
    }
}

/// Builds one instance per array element, preserving order.
pub fn from_json_array<M: Model>(items: &[JsonValue]) -> Result<Vec<M>, MappingError> {
    items
        .iter()
        .enumerate()
        .map(|(index, item)| match item {
            JsonValue::Object(object) => from_json_object(object),
            _ => Err(MappingError::NotAnObject { index: Some(index) }),
        })
        .collect()
}

/// Serializes an instance to a JSON object keyed by payload keys.
pub fn to_json_object<M: Model>(model: &M) -> Result<Map<String, JsonValue>, MappingError> {
    let schema = M::schema()?;
    Ok(schema
        .fields()
        .iter()
        .map(|f| {
            (
                schema.json_key_for_field(&f.name).to_string(),
                model.value_of(&f.name).to_json(),
            )
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaBuilder;
    use crate::types::FieldType;
    use serde_json::json;

    #[derive(Debug, Default, PartialEq)]
    struct Photo {
        id: i64,
        caption: String,
        public: bool,
        data: Vec<u8>,
    }

    impl Model for Photo {
        fn describe() -> SchemaBuilder {
            SchemaBuilder::new("Photo")
                .field("id", FieldType::Integer)
                .field("caption", FieldType::Text)
                .field("public", FieldType::Bool)
                .field("data", FieldType::Bytes)
                .json_key("photoCaption", "caption")
                .json_key("isPublic", "public")
        }

        fn value_of(&self, field: &str) -> Value {
            match field {
                "id" => self.id.into(),
                "caption" => self.caption.as_str().into(),
                "public" => self.public.into(),
                "data" => self.data.clone().into(),
                _ => Value::Null,
            }
        }

        fn assign(&mut self, field: &str, value: Value) {
            match field {
                "id" => self.id = value.decode(),
                "caption" => self.caption = value.decode(),
                "public" => self.public = value.decode(),
                "data" => self.data = value.decode(),
                _ => {}
            }
        }
    }

    #[test]
    fn test_from_json_object_with_mapping() {
        let payload = json!({
            "id": 5,
            "photoCaption": "sunset",
            "isPublic": true,
            "data": [1, 2, 3],
            "width": 1024
        });
        let photo: Photo = from_json_value(&payload).unwrap();
        assert_eq!(
            photo,
            Photo {
                id: 5,
                caption: "sunset".to_string(),
                public: true,
                data: vec![1, 2, 3],
            }
        );
    }

    #[test]
    fn test_missing_keys_keep_defaults() {
        let photo: Photo = from_json_value(&json!({"id": 1})).unwrap();
        assert_eq!(photo.caption, "");
        assert!(!photo.public);
    }

    #[test]
    fn test_unconvertible_scalar_is_error() {
        let err = from_json_value::<Photo>(&json!({"id": "not a number"})).unwrap_err();
        assert!(matches!(err, MappingError::Field { ref field, .. } if field == "id"));
    }

    #[test]
    fn test_from_json_array_preserves_order_and_rejects_non_objects() {
        let items = vec![json!({"id": 2}), json!({"id": 1})];
        let photos: Vec<Photo> = from_json_array(&items).unwrap();
        assert_eq!(photos.iter().map(|p| p.id).collect::<Vec<_>>(), vec![2, 1]);

        let items = vec![json!({"id": 2}), json!(3)];
        let err = from_json_array::<Photo>(&items).unwrap_err();
        assert_eq!(err, MappingError::NotAnObject { index: Some(1) });
        assert!(from_json_value::<Photo>(&json!([1])).is_err());
    }

    #[test]
    fn test_empty_bytes_survive_round_trip() {
        let photo = Photo {
            id: 3,
            caption: "blank".to_string(),
            public: true,
            data: Vec::new(),
        };
        let object = to_json_object(&photo).unwrap();
        assert_eq!(object.get("data"), Some(&json!([])));

        let back: Photo = from_json_object(&object).unwrap();
        assert_eq!(back, photo);
    }

    #[test]
    fn test_fractional_number_in_integer_field_is_error() {
        let err = from_json_value::<Photo>(&json!({"id": 3.9})).unwrap_err();
        assert!(matches!(err, MappingError::Field { ref field, .. } if field == "id"));
        let photo: Photo = from_json_value(&json!({"id": 4.0})).unwrap();
        assert_eq!(photo.id, 4);
    }

    #[test]
    fn test_to_json_object_uses_payload_keys() {
        let photo = Photo {
            id: 9,
            caption: "dawn".to_string(),
            public: false,
            data: vec![],
        };
        let object = to_json_object(&photo).unwrap();
        assert_eq!(object.get("photoCaption"), Some(&json!("dawn")));
        assert_eq!(object.get("isPublic"), Some(&json!(0)));
        assert_eq!(object.get("id"), Some(&json!(9)));
        assert!(object.get("caption").is_none());
    }
}
