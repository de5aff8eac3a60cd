//! Process-wide cache of validated model descriptions.
//!
//! Each model type is described once, validated once, and the resulting
//! [`ModelSchema`] is shared for the lifetime of the process. Entries are
//! never invalidated: model types are static. A description that fails
//! validation is not cached, so every later lookup reports the same error.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use tracing::debug;

use crate::model::Model;
use crate::schema::ModelSchema;
use crate::validate::SchemaError;

type Registry = RwLock<HashMap<TypeId, Arc<ModelSchema>>>;

fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Returns the validated description of `M`, building it on first use.
///
/// # Errors
///
/// Returns the [`SchemaError`] from [`SchemaBuilder::build`](crate::SchemaBuilder::build)
/// if the description is invalid.
pub fn schema_of<M: Model>() -> Result<Arc<ModelSchema>, SchemaError> {
    let key = TypeId::of::<M>();
    if let Some(schema) = registry()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&key)
    {
        return Ok(Arc::clone(schema));
    }

    let schema = Arc::new(M::describe().build()?);
    let mut entries = registry().write().unwrap_or_else(PoisonError::into_inner);
    let entry = entries.entry(key).or_insert_with(|| {
        debug!(
            model = schema.type_name(),
            table = schema.table_name(),
            columns = schema.fields().len(),
            "registered model"
        );
        Arc::clone(&schema)
    });
    Ok(Arc::clone(entry))
}

/// Registers `M` eagerly. Call at startup so invalid descriptions abort
/// before any data is touched.
pub fn register<M: Model>() -> Result<Arc<ModelSchema>, SchemaError> {
    schema_of::<M>()
}

/// Returns `true` if `M` has been registered successfully.
pub fn is_registered<M: Model>() -> bool {
    registry()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .contains_key(&TypeId::of::<M>())
}
