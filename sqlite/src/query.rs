//! Finder queries over a model's table.
//!
//! [`Finder`] builds parameterized `SELECT`, `SELECT COUNT(*)` and `DELETE`
//! statements for one model type and maps the result rows back onto
//! instances. A finder carries an execution context ([`Db`]), an optional
//! ordering (the model's default ordering otherwise) and optional paging.
//!
//! # Example
//!
//! ```
//! use activerow_core::{Direction, FieldType, Model, SchemaBuilder, Value};
//! use activerow_sqlite::{DatabaseQueue, Finder, Record};
//!
//! #[derive(Debug, Default)]
//! struct Song {
//!     id: i64,
//!     title: String,
//!     plays: i64,
//! }
//!
//! impl Model for Song {
//!     fn describe() -> SchemaBuilder {
//!         SchemaBuilder::new("Song")
//!             .field_of::<i64>("id")
//!             .field_of::<String>("title")
//!             .field_of::<i64>("plays")
//!     }
//!     fn value_of(&self, field: &str) -> Value {
//!         match field {
//!             "id" => self.id.into(),
//!             "title" => self.title.as_str().into(),
//!             "plays" => self.plays.into(),
//!             _ => Value::Null,
//!         }
//!     }
//!     fn assign(&mut self, field: &str, value: Value) {
//!         match field {
//!             "id" => self.id = value.decode(),
//!             "title" => self.title = value.decode(),
//!             "plays" => self.plays = value.decode(),
//!             _ => {}
//!         }
//!     }
//! }
//!
//! let queue = DatabaseQueue::open_in_memory().unwrap();
//! Song::create_table_in(&queue).unwrap();
//! for (id, plays) in [(1, 30), (2, 10), (3, 20)] {
//!     Song { id, title: format!("song {id}"), plays }.save_in(&queue).unwrap();
//! }
//!
//! let top: Vec<Song> = Finder::new(&queue)
//!     .order_by("plays", Direction::Desc)
//!     .limit(2)
//!     .all()
//!     .unwrap();
//! assert_eq!(top.iter().map(|s| s.id).collect::<Vec<_>>(), vec![1, 3]);
//!
//! let song: Option<Song> = Finder::new(&queue).find(2).unwrap();
//! assert_eq!(song.unwrap().plays, 10);
//!
//! let popular = Finder::<Song>::new(&queue)
//!     .count_where_sql("plays >= ?", &[Value::Integer(20)])
//!     .unwrap();
//! assert_eq!(popular, 2);
//! ```

use std::marker::PhantomData;

use activerow_core::{Direction, Model, ModelSchema, OrderBy, Value, objects_of};

use crate::convert::{execute, query_count, query_rows};
use crate::error::{Result, StoreError};
use crate::queue::Db;
use crate::schema::{column_list, quote_ident};

/// Lookup key for [`Finder::find`], [`Finder::find_all`] and friends.
///
/// `Primary` values are matched positionally against the declared
/// primary-key columns; `Columns` is an equality-AND mapping over any
/// declared columns, used for non-unique lookups.
#[derive(Debug, Clone, PartialEq)]
pub enum Key {
    Primary(Vec<Value>),
    Columns(Vec<(String, Value)>),
}

impl Key {
    /// A single-column primary key.
    pub fn primary(value: impl Into<Value>) -> Self {
        Key::Primary(vec![value.into()])
    }

    /// A composite primary key, in declared key order.
    pub fn composite<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Key::Primary(values.into_iter().map(Into::into).collect())
    }

    /// A single `column = value` predicate.
    pub fn column(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Key::Columns(vec![(column.into(), value.into())])
    }

    /// An equality-AND mapping over several columns.
    pub fn columns<I, C, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (C, V)>,
        C: Into<String>,
        V: Into<Value>,
    {
        Key::Columns(
            pairs
                .into_iter()
                .map(|(c, v)| (c.into(), v.into()))
                .collect(),
        )
    }
}

impl From<Value> for Key {
    fn from(value: Value) -> Self {
        Key::Primary(vec![value])
    }
}

impl From<Vec<Value>> for Key {
    fn from(values: Vec<Value>) -> Self {
        Key::Primary(values)
    }
}

macro_rules! key_from_scalar {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Key {
                fn from(value: $ty) -> Self {
                    Key::primary(value)
                }
            }
        )*
    };
}

key_from_scalar!(i64, i32, u32, u64, &str, String);

/// A `WHERE` clause body with its positional parameters.
#[derive(Debug, Default)]
pub(crate) struct Predicate {
    pub(crate) sql: String,
    pub(crate) params: Vec<Value>,
}

impl Predicate {
    fn raw(sql: &str, params: &[Value]) -> Self {
        Self {
            sql: sql.to_string(),
            params: params.to_vec(),
        }
    }

    fn where_clause(&self) -> String {
        if self.sql.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.sql)
        }
    }
}

fn resolve<'s>(schema: &'s ModelSchema, column: &str) -> Result<&'s str> {
    schema.resolve_column(column).ok_or_else(|| {
        StoreError::QueryError(format!(
            "no column '{column}' on {}",
            schema.table_name()
        ))
    })
}

fn equals(column: &str, value: Value, params: &mut Vec<Value>) -> String {
    if value.is_null() {
        format!("{} IS NULL", quote_ident(column))
    } else {
        params.push(value);
        format!("{} = ?", quote_ident(column))
    }
}

/// Builds the equality predicate for a key.
pub(crate) fn key_predicate(schema: &ModelSchema, key: Key) -> Result<Predicate> {
    let mut params = Vec::new();
    let terms: Vec<String> = match key {
        Key::Primary(values) => {
            let columns = schema.primary_key_column_names();
            if values.len() != columns.len() {
                return Err(StoreError::QueryError(format!(
                    "{} has {} primary-key column(s) but {} key value(s) were given",
                    schema.table_name(),
                    columns.len(),
                    values.len()
                )));
            }
            columns
                .into_iter()
                .zip(values)
                .map(|(column, value)| equals(column, value, &mut params))
                .collect()
        }
        Key::Columns(pairs) => {
            let mut terms = Vec::with_capacity(pairs.len());
            for (column, value) in pairs {
                let column = resolve(schema, &column)?;
                terms.push(equals(column, value, &mut params));
            }
            terms
        }
    };
    Ok(Predicate {
        sql: terms.join(" AND "),
        params,
    })
}

/// Condition that holds for rows strictly beyond `value` when sorting
/// `column` in `direction`. SQLite sorts NULL first ascending and last
/// descending.
fn beyond(column: &str, direction: Direction, value: &Value, params: &mut Vec<Value>) -> String {
    let col = quote_ident(column);
    match (direction, value.is_null()) {
        (Direction::Asc, true) => format!("{col} IS NOT NULL"),
        (Direction::Asc, false) => {
            params.push(value.clone());
            format!("{col} > ?")
        }
        (Direction::Desc, true) => "0".to_string(),
        (Direction::Desc, false) => {
            params.push(value.clone());
            format!("({col} < ? OR {col} IS NULL)")
        }
    }
}

/// Lexicographic seek predicate: rows that sort strictly after `anchor`
/// under `ordering`.
pub(crate) fn seek_predicate(ordering: &[OrderBy], anchor: &[Value]) -> Predicate {
    let mut params = Vec::new();
    let mut alternatives = Vec::with_capacity(ordering.len());
    for (i, order) in ordering.iter().enumerate() {
        let mut terms: Vec<String> = ordering[..i]
            .iter()
            .zip(anchor)
            .map(|(prefix, value)| {
                params.push(value.clone());
                format!("{} IS ?", quote_ident(&prefix.column))
            })
            .collect();
        terms.push(beyond(&order.column, order.direction, &anchor[i], &mut params));
        alternatives.push(format!("({})", terms.join(" AND ")));
    }
    Predicate {
        sql: alternatives.join(" OR "),
        params,
    }
}

/// `ORDER BY` plus `LIMIT`/`OFFSET`. A limit of zero or less is unbounded.
fn tail_sql(ordering: &[OrderBy], limit: i64, offset: i64) -> String {
    let mut sql = String::new();
    if !ordering.is_empty() {
        let terms: Vec<String> = ordering
            .iter()
            .map(|o| format!("{} {}", quote_ident(&o.column), o.direction.sql()))
            .collect();
        sql.push_str(" ORDER BY ");
        sql.push_str(&terms.join(", "));
    }
    let offset = offset.max(0);
    if limit > 0 {
        sql.push_str(&format!(" LIMIT {limit}"));
        if offset > 0 {
            sql.push_str(&format!(" OFFSET {offset}"));
        }
    } else if offset > 0 {
        sql.push_str(&format!(" LIMIT -1 OFFSET {offset}"));
    }
    sql
}

fn select_prefix(schema: &ModelSchema) -> String {
    format!(
        "SELECT {} FROM {}",
        column_list(schema.column_names()),
        quote_ident(schema.table_name())
    )
}

/// Query builder for one model type.
pub struct Finder<'a, M> {
    db: Db<'a>,
    ordering: Option<Vec<OrderBy>>,
    limit: i64,
    offset: i64,
    _model: PhantomData<fn() -> M>,
}

impl<'a, M: Model> Finder<'a, M> {
    /// Creates a finder running in `db`.
    pub fn new(db: impl Into<Db<'a>>) -> Self {
        Self {
            db: db.into(),
            ordering: None,
            limit: 0,
            offset: 0,
            _model: PhantomData,
        }
    }

    /// Appends an ordering entry. The first call replaces the model's
    /// default ordering. `column` may be a column or field name.
    pub fn order_by(mut self, column: impl Into<String>, direction: Direction) -> Self {
        self.ordering
            .get_or_insert_with(Vec::new)
            .push(OrderBy::new(column, direction));
        self
    }

    /// Replaces the ordering.
    pub fn ordering(mut self, ordering: impl IntoIterator<Item = OrderBy>) -> Self {
        self.ordering = Some(ordering.into_iter().collect());
        self
    }

    /// Maximum number of rows; zero or less means unbounded.
    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    /// Rows to skip before the first returned row.
    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }

    /// Resolved ordering: the explicit one or the model's default, with
    /// any primary-key columns it lacks appended ascending so ties always
    /// break the same way.
    fn effective_ordering(&self, schema: &ModelSchema) -> Result<Vec<OrderBy>> {
        let mut resolved = match &self.ordering {
            None => schema.default_ordering().to_vec(),
            Some(ordering) => {
                let mut resolved = Vec::with_capacity(ordering.len());
                for o in ordering {
                    resolved.push(OrderBy::new(resolve(schema, &o.column)?, o.direction));
                }
                resolved
            }
        };
        for column in schema.primary_key_column_names() {
            if !resolved.iter().any(|o| o.column == column) {
                resolved.push(OrderBy::asc(column));
            }
        }
        Ok(resolved)
    }

    fn select(
        &self,
        schema: &ModelSchema,
        predicate: Predicate,
        ordering: &[OrderBy],
        limit: i64,
    ) -> Result<Vec<M>> {
        let sql = format!(
            "{}{}{}",
            select_prefix(schema),
            predicate.where_clause(),
            tail_sql(ordering, limit, self.offset)
        );
        let rows = self
            .db
            .run(|conn| query_rows(conn, &sql, &predicate.params))?;
        Ok(objects_of(rows)?)
    }

    /// First row under the ordering, or `None` if the table is empty.
    pub fn first(&self) -> Result<Option<M>> {
        let schema = M::schema()?;
        let ordering = self.effective_ordering(&schema)?;
        Ok(self
            .select(&schema, Predicate::default(), &ordering, 1)?
            .into_iter()
            .next())
    }

    /// Last row under the ordering, or `None` if the table is empty.
    pub fn last(&self) -> Result<Option<M>> {
        let schema = M::schema()?;
        let ordering = activerow_core::reverse_ordering(&self.effective_ordering(&schema)?);
        Ok(self
            .select(&schema, Predicate::default(), &ordering, 1)?
            .into_iter()
            .next())
    }

    /// Every row, honoring ordering and paging.
    pub fn all(&self) -> Result<Vec<M>> {
        let schema = M::schema()?;
        let ordering = self.effective_ordering(&schema)?;
        self.select(&schema, Predicate::default(), &ordering, self.limit)
    }

    /// First row matching `key`.
    pub fn find(&self, key: impl Into<Key>) -> Result<Option<M>> {
        let schema = M::schema()?;
        let ordering = self.effective_ordering(&schema)?;
        let predicate = key_predicate(&schema, key.into())?;
        Ok(self
            .select(&schema, predicate, &ordering, 1)?
            .into_iter()
            .next())
    }

    /// Every row matching `key`, honoring ordering and paging.
    pub fn find_all(&self, key: impl Into<Key>) -> Result<Vec<M>> {
        let schema = M::schema()?;
        let ordering = self.effective_ordering(&schema)?;
        let predicate = key_predicate(&schema, key.into())?;
        self.select(&schema, predicate, &ordering, self.limit)
    }

    /// Runs a complete raw query and maps every row. Ordering and paging
    /// are not applied.
    pub fn find_by_sql(&self, sql: &str, params: &[Value]) -> Result<Vec<M>> {
        let rows = self.db.run(|conn| query_rows(conn, sql, params))?;
        Ok(objects_of(rows)?)
    }

    /// Runs `SELECT <columns> FROM <table> WHERE <sql>`.
    pub fn find_by_sql_where(&self, sql: &str, params: &[Value]) -> Result<Vec<M>> {
        let schema = M::schema()?;
        let full = format!("{} WHERE {sql}", select_prefix(&schema));
        self.find_by_sql(&full, params)
    }

    /// Rows sorting strictly after `anchor` under the ordering, at most
    /// `limit` of them (unbounded when `limit <= 0`).
    pub fn after(&self, anchor: &M, limit: i64) -> Result<Vec<M>> {
        let schema = M::schema()?;
        let ordering = self.effective_ordering(&schema)?;
        let predicate = seek_predicate(&ordering, &anchor_values(&schema, anchor, &ordering));
        self.select(&schema, predicate, &ordering, limit)
    }

    /// Rows sorting strictly before `anchor`, at most `limit` of them (the
    /// nearest ones), returned in ordering order.
    pub fn before(&self, anchor: &M, limit: i64) -> Result<Vec<M>> {
        let schema = M::schema()?;
        let reversed = activerow_core::reverse_ordering(&self.effective_ordering(&schema)?);
        let predicate = seek_predicate(&reversed, &anchor_values(&schema, anchor, &reversed));
        let mut rows = self.select(&schema, predicate, &reversed, limit)?;
        rows.reverse();
        Ok(rows)
    }

    /// Number of rows in the table.
    pub fn count(&self) -> Result<u64> {
        self.count_matching(Predicate::default())
    }

    /// Number of rows matching an equality-AND mapping (or primary key).
    pub fn count_where(&self, key: impl Into<Key>) -> Result<u64> {
        let schema = M::schema()?;
        self.count_matching(key_predicate(&schema, key.into())?)
    }

    /// Number of rows matching a raw `WHERE` clause body.
    pub fn count_where_sql(&self, sql: &str, params: &[Value]) -> Result<u64> {
        self.count_matching(Predicate::raw(sql, params))
    }

    fn count_matching(&self, predicate: Predicate) -> Result<u64> {
        let schema = M::schema()?;
        let sql = format!(
            "SELECT COUNT(*) FROM {}{}",
            quote_ident(schema.table_name()),
            predicate.where_clause()
        );
        self.db.run(|conn| query_count(conn, &sql, &predicate.params))
    }

    /// Deletes every row matching `key` and returns how many went away. An
    /// empty column mapping matches every row.
    pub fn remove(&self, key: impl Into<Key>) -> Result<usize> {
        let schema = M::schema()?;
        let predicate = key_predicate(&schema, key.into())?;
        let sql = format!(
            "DELETE FROM {}{}",
            quote_ident(schema.table_name()),
            predicate.where_clause()
        );
        self.db.run(|conn| execute(conn, &sql, &predicate.params))
    }
}

/// Values of `model` for each ordering column, coerced to storage form.
fn anchor_values<M: Model>(schema: &ModelSchema, model: &M, ordering: &[OrderBy]) -> Vec<Value> {
    ordering
        .iter()
        .map(|o| match schema.field_by_column(&o.column) {
            Some(field) => {
                let value = model.value_of(&field.name);
                value.clone().coerce(field.field_type).unwrap_or(value)
            }
            None => Value::Null,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use activerow_core::{FieldType, SchemaBuilder};

    fn schema() -> ModelSchema {
        SchemaBuilder::new("Entry")
            .field("feed", FieldType::Integer)
            .field("seq", FieldType::Integer)
            .field("title", FieldType::Text)
            .column_name("title", "headline")
            .primary_key(["feed", "seq"])
            .build()
            .unwrap()
    }

    #[test]
    fn test_primary_key_predicate_is_positional() {
        let p = key_predicate(&schema(), Key::composite([7, 2])).unwrap();
        assert_eq!(p.sql, "\"feed\" = ? AND \"seq\" = ?");
        assert_eq!(p.params, vec![Value::Integer(7), Value::Integer(2)]);
    }

    #[test]
    fn test_primary_key_arity_mismatch() {
        let err = key_predicate(&schema(), Key::primary(7)).unwrap_err();
        assert!(matches!(err, StoreError::QueryError(_)));
    }

    #[test]
    fn test_column_predicate_resolves_fields_and_nulls() {
        let key = Key::columns([("title", Value::Null), ("feed", Value::Integer(1))]);
        let p = key_predicate(&schema(), key).unwrap();
        assert_eq!(p.sql, "\"headline\" IS NULL AND \"feed\" = ?");
        assert_eq!(p.params, vec![Value::Integer(1)]);

        let err = key_predicate(&schema(), Key::column("missing", 1)).unwrap_err();
        assert!(matches!(err, StoreError::QueryError(ref m) if m.contains("missing")));
    }

    #[test]
    fn test_empty_column_mapping_matches_everything() {
        let p = key_predicate(&schema(), Key::Columns(Vec::new())).unwrap();
        assert_eq!(p.where_clause(), "");
    }

    #[test]
    fn test_tail_sql_paging() {
        let ordering = [OrderBy::asc("a"), OrderBy::desc("b")];
        assert_eq!(tail_sql(&ordering, 0, 0), " ORDER BY \"a\" ASC, \"b\" DESC");
        assert_eq!(tail_sql(&[], 5, 0), " LIMIT 5");
        assert_eq!(tail_sql(&[], 5, 10), " LIMIT 5 OFFSET 10");
        assert_eq!(tail_sql(&[], -1, 10), " LIMIT -1 OFFSET 10");
        assert_eq!(tail_sql(&[], 0, -3), "");
    }

    #[test]
    fn test_seek_predicate_is_lexicographic() {
        let ordering = [OrderBy::asc("feed"), OrderBy::desc("seq")];
        let p = seek_predicate(&ordering, &[Value::Integer(1), Value::Integer(5)]);
        assert_eq!(
            p.sql,
            "(\"feed\" > ?) OR (\"feed\" IS ? AND (\"seq\" < ? OR \"seq\" IS NULL))"
        );
        assert_eq!(
            p.params,
            vec![Value::Integer(1), Value::Integer(1), Value::Integer(5)]
        );
    }

    #[test]
    fn test_seek_predicate_null_anchor() {
        let p = seek_predicate(&[OrderBy::asc("title")], &[Value::Null]);
        assert_eq!(p.sql, "(\"title\" IS NOT NULL)");
        assert!(p.params.is_empty());

        let p = seek_predicate(&[OrderBy::desc("title")], &[Value::Null]);
        assert_eq!(p.sql, "(0)");
    }

    #[test]
    fn test_key_conversions() {
        assert_eq!(Key::from(3), Key::Primary(vec![Value::Integer(3)]));
        assert_eq!(Key::from("abc"), Key::Primary(vec![Value::from("abc")]));
        assert_eq!(
            Key::column("name", "b"),
            Key::Columns(vec![("name".to_string(), Value::from("b"))])
        );
    }
}
