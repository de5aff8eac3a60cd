//! Active-record operations for every [`Model`].
//!
//! [`Record`] is implemented for all model types. Each operation comes in two
//! forms: a plain one that runs on the process-wide queue
//! ([`shared_queue`](crate::shared_queue)) and an `_in` form that takes an
//! explicit [`Db`] context, such as a queue of your own or the connection
//! held by an enclosing transaction.

use activerow_core::{ColumnDef, Model, ModelSchema, Value};
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::convert::execute;
use crate::database::shared_queue;
use crate::error::{Result, StoreError};
use crate::query::{Finder, Key};
use crate::queue::Db;
use crate::schema::{
    column_list, create_table_sql, drop_table_sql, is_rowid_key, live_columns, placeholders,
    quote_ident, table_exists,
};

/// Builds the single-statement upsert for a model.
///
/// Non-key columns are overwritten on a key conflict; a model made only of
/// key columns leaves the existing row alone.
pub(crate) fn upsert_sql(schema: &ModelSchema) -> String {
    let columns = schema.column_names();
    let conflict = column_list(schema.primary_key_column_names());
    let updates: Vec<String> = schema
        .non_key_fields()
        .map(|f| {
            let col = quote_ident(&f.column);
            format!("{col} = excluded.{col}")
        })
        .collect();
    let action = if updates.is_empty() {
        "DO NOTHING".to_string()
    } else {
        format!("DO UPDATE SET {}", updates.join(", "))
    };
    format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT ({conflict}) {action}",
        quote_ident(schema.table_name()),
        column_list(columns.iter().copied()),
        placeholders(columns.len()),
    )
}

fn key_of<M: Model>(model: &M) -> Result<Key> {
    Ok(Key::Columns(model.primary_key_values()?))
}

/// Table lifecycle, finders and instance persistence for a model type.
///
/// # Examples
///
/// ```
/// use activerow_core::{Model, SchemaBuilder, Value};
/// use activerow_sqlite::{DatabaseQueue, Record};
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
///             .field_of::<String>("name")
///     }
///     fn value_of(&self, field: &str) -> Value {
///         match field {
///             "id" => self.id.into(),
///             "name" => self.name.as_str().into(),
///             _ => Value::Null,
///         }
///     }
///     fn assign(&mut self, field: &str, value: Value) {
///         match field {
///             "id" => self.id = value.decode(),
///             "name" => self.name = value.decode(),
///             _ => {}
///         }
///     }
/// }
///
/// let queue = DatabaseQueue::open_in_memory().unwrap();
/// Account::create_table_in(&queue).unwrap();
///
/// let mut account = Account { id: 1, name: "a".into() };
/// account.save_in(&queue).unwrap();
/// account.name = "b".into();
/// account.save_in(&queue).unwrap();
///
/// let found: Option<Account> = Account::finder_in(&queue).find(1).unwrap();
/// assert_eq!(found, Some(Account { id: 1, name: "b".into() }));
///
/// assert!(account.remove_in(&queue).unwrap());
/// assert_eq!(Account::finder_in(&queue).count().unwrap(), 0);
/// ```
pub trait Record: Model {
    // --- table lifecycle ---

    /// Creates the model's table if it does not exist.
    fn create_table() -> Result<()> {
        Self::create_table_in(shared_queue())
    }

    fn create_table_in<'a>(db: impl Into<Db<'a>>) -> Result<()> {
        let schema = Self::schema()?;
        let sql = create_table_sql(&schema);
        db.into().run(|conn| Ok(conn.execute_batch(&sql)?))?;
        debug!(table = schema.table_name(), "created table");
        Ok(())
    }

    /// Drops the model's table if it exists.
    fn drop_table() -> Result<()> {
        Self::drop_table_in(shared_queue())
    }

    fn drop_table_in<'a>(db: impl Into<Db<'a>>) -> Result<()> {
        let schema = Self::schema()?;
        let sql = drop_table_sql(&schema);
        db.into().run(|conn| Ok(conn.execute_batch(&sql)?))?;
        debug!(table = schema.table_name(), "dropped table");
        Ok(())
    }

    fn table_exists() -> Result<bool> {
        Self::table_exists_in(shared_queue())
    }

    fn table_exists_in<'a>(db: impl Into<Db<'a>>) -> Result<bool> {
        let schema = Self::schema()?;
        db.into().run(|conn| table_exists(conn, schema.table_name()))
    }

    /// Column layout of the table as it exists in the database, which may
    /// differ from the declared layout before a migration has run.
    fn columns_in<'a>(db: impl Into<Db<'a>>) -> Result<Vec<ColumnDef>> {
        let schema = Self::schema()?;
        db.into().run(|conn| live_columns(conn, schema.table_name()))
    }

    /// Primary-key columns of the live table, in table order.
    fn primary_key_columns_in<'a>(db: impl Into<Db<'a>>) -> Result<Vec<ColumnDef>> {
        Ok(Self::columns_in(db)?
            .into_iter()
            .filter(|c| c.primary_key)
            .collect())
    }

    // --- finders ---

    /// A finder over the process-wide queue.
    fn finder() -> Finder<'static, Self> {
        Finder::new(shared_queue())
    }

    fn finder_in<'a>(db: impl Into<Db<'a>>) -> Finder<'a, Self> {
        Finder::new(db)
    }

    fn find(key: impl Into<Key>) -> Result<Option<Self>> {
        Self::finder().find(key)
    }

    fn find_all(key: impl Into<Key>) -> Result<Vec<Self>> {
        Self::finder().find_all(key)
    }

    fn find_by_sql(sql: &str, params: &[Value]) -> Result<Vec<Self>> {
        Self::finder().find_by_sql(sql, params)
    }

    fn find_by_sql_where(sql: &str, params: &[Value]) -> Result<Vec<Self>> {
        Self::finder().find_by_sql_where(sql, params)
    }

    fn all() -> Result<Vec<Self>> {
        Self::finder().all()
    }

    fn first() -> Result<Option<Self>> {
        Self::finder().first()
    }

    fn last() -> Result<Option<Self>> {
        Self::finder().last()
    }

    fn count() -> Result<u64> {
        Self::finder().count()
    }

    fn count_where(key: impl Into<Key>) -> Result<u64> {
        Self::finder().count_where(key)
    }

    fn count_where_sql(sql: &str, params: &[Value]) -> Result<u64> {
        Self::finder().count_where_sql(sql, params)
    }

    /// Deletes the rows matching `key`; returns how many were deleted.
    fn remove_by_key(key: impl Into<Key>) -> Result<usize> {
        Self::finder().remove(key)
    }

    // --- instance persistence ---

    /// Inserts the instance, or overwrites the row with the same primary
    /// key, in one statement.
    fn save(&self) -> Result<()> {
        self.save_in(shared_queue())
    }

    /// Saves in `db`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::QueryError`] if a primary-key field is `NULL`,
    /// unless the key is a single integer column that SQLite assigns.
    fn save_in<'a>(&self, db: impl Into<Db<'a>>) -> Result<()> {
        let schema = Self::schema()?;
        let nullable_key = is_rowid_key(&schema);
        let mut params = Vec::with_capacity(schema.fields().len());
        for field in schema.fields() {
            let value = self.value_of(&field.name).coerce(field.field_type)?;
            if value.is_null() && !nullable_key && schema.is_primary_key_column(&field.column) {
                return Err(StoreError::QueryError(format!(
                    "primary-key column '{}' of {} is NULL",
                    field.column,
                    schema.table_name()
                )));
            }
            params.push(value);
        }
        let sql = upsert_sql(&schema);
        db.into().run(|conn| execute(conn, &sql, &params))?;
        Ok(())
    }

    /// Deletes the instance's row. Returns `false` if there was none.
    fn remove(&self) -> Result<bool> {
        self.remove_in(shared_queue())
    }

    fn remove_in<'a>(&self, db: impl Into<Db<'a>>) -> Result<bool> {
        let removed = Finder::<Self>::new(db).remove(key_of(self)?)?;
        Ok(removed > 0)
    }

    /// Reloads every field from the row with the instance's primary key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::RecordNotFound`] if the row is gone.
    fn refresh(&mut self) -> Result<()> {
        self.refresh_in(shared_queue())
    }

    fn refresh_in<'a>(&mut self, db: impl Into<Db<'a>>) -> Result<()> {
        match Finder::<Self>::new(db).find(key_of(self)?)? {
            Some(fresh) => {
                *self = fresh;
                Ok(())
            }
            None => Err(StoreError::RecordNotFound {
                table: Self::table_name()?,
            }),
        }
    }

    // --- paging ---

    /// Up to `limit` rows that follow this instance under the default
    /// ordering.
    fn next_objects(&self, limit: i64) -> Result<Vec<Self>> {
        self.next_objects_in(shared_queue(), limit)
    }

    fn next_objects_in<'a>(&self, db: impl Into<Db<'a>>, limit: i64) -> Result<Vec<Self>> {
        Finder::new(db).after(self, limit)
    }

    /// Up to `limit` rows that precede this instance under the default
    /// ordering, in that ordering (the nearest row last).
    fn previous_objects(&self, limit: i64) -> Result<Vec<Self>> {
        self.previous_objects_in(shared_queue(), limit)
    }

    fn previous_objects_in<'a>(&self, db: impl Into<Db<'a>>, limit: i64) -> Result<Vec<Self>> {
        Finder::new(db).before(self, limit)
    }

    // --- JSON ---

    /// Builds an instance from a JSON object and saves it.
    fn from_json(payload: &JsonValue) -> Result<Self> {
        Self::from_json_in(shared_queue(), payload)
    }

    fn from_json_in<'a>(db: impl Into<Db<'a>>, payload: &JsonValue) -> Result<Self> {
        let model: Self = activerow_core::from_json_value(payload)?;
        model.save_in(db)?;
        Ok(model)
    }

    /// Builds one instance per array element and saves them all in one
    /// transaction, preserving order.
    fn from_json_array(items: &[JsonValue]) -> Result<Vec<Self>> {
        Self::from_json_array_in(shared_queue(), items)
    }

    fn from_json_array_in<'a>(db: impl Into<Db<'a>>, items: &[JsonValue]) -> Result<Vec<Self>> {
        let models: Vec<Self> = activerow_core::from_json_array(items)?;
        db.into().transaction(|conn| {
            for model in &models {
                model.save_in(conn)?;
            }
            Ok(())
        })?;
        Ok(models)
    }
}

impl<M: Model> Record for M {}

#[cfg(test)]
mod tests {
    use super::*;
    use activerow_core::{FieldType, SchemaBuilder};

    #[test]
    fn test_upsert_sql() {
        let schema = SchemaBuilder::new("Account")
            .field("id", FieldType::Integer)
            .field("name", FieldType::Text)
            .build()
            .unwrap();
        assert_eq!(
            upsert_sql(&schema),
            "INSERT INTO \"accounts\" (\"id\", \"name\") VALUES (?, ?) \
             ON CONFLICT (\"id\") DO UPDATE SET \"name\" = excluded.\"name\""
        );
    }

    #[test]
    fn test_upsert_sql_key_only_model() {
        let schema = SchemaBuilder::new("Follow")
            .field("follower", FieldType::Integer)
            .field("followee", FieldType::Integer)
            .primary_key(["follower", "followee"])
            .build()
            .unwrap();
        let sql = upsert_sql(&schema);
        assert!(sql.ends_with("ON CONFLICT (\"follower\", \"followee\") DO NOTHING"));
    }
}
