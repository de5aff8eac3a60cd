//! Conversion between [`Value`] and SQLite values, and row extraction.
//!
//! Every statement the crate runs goes through [`query_rows`] or
//! [`execute`]: parameters are always bound positionally, and the statement
//! is checked before it runs so that malformed SQL or a parameter-count
//! mismatch surfaces as [`StoreError::QueryError`] rather than a generic
//! database error.

use activerow_core::{ResultRow, Value};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{Connection, Statement, params_from_iter};

use crate::error::{Result, StoreError};

/// Converts a [`Value`] into an owned SQLite value for binding.
pub(crate) fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Integer(i) => SqlValue::Integer(*i),
        Value::Real(f) => SqlValue::Real(*f),
        Value::Text(s) => SqlValue::Text(s.clone()),
        Value::Blob(b) => SqlValue::Blob(b.clone()),
    }
}

/// Converts a borrowed SQLite value into a [`Value`]. Invalid UTF-8 in a
/// text column is replaced rather than rejected.
pub(crate) fn from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Real(f),
        ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Blob(b.to_vec()),
    }
}

/// Prepares `sql` and checks it takes exactly `params.len()` parameters.
pub(crate) fn prepare_checked<'c>(
    conn: &'c Connection,
    sql: &str,
    params: &[Value],
) -> Result<Statement<'c>> {
    let stmt = conn
        .prepare(sql)
        .map_err(|e| StoreError::QueryError(format!("{e} (in `{sql}`)")))?;
    let expected = stmt.parameter_count();
    if expected != params.len() {
        return Err(StoreError::QueryError(format!(
            "statement expects {expected} parameter(s) but {} were supplied (in `{sql}`)",
            params.len()
        )));
    }
    Ok(stmt)
}

/// Runs a query and returns every matched row as a [`ResultRow`], keyed by
/// the result column names.
///
/// # Errors
///
/// Returns [`StoreError::QueryError`] if the SQL does not prepare or the
/// parameter count does not match, and [`StoreError::DatabaseError`] if
/// execution fails.
///
/// # Examples
///
/// ```
/// use activerow_core::Value;
/// use activerow_sqlite::query_rows;
/// use rusqlite::Connection;
///
/// let conn = Connection::open_in_memory().unwrap();
/// let rows = query_rows(&conn, "SELECT ? AS n, 'x' AS s", &[Value::Integer(5)]).unwrap();
/// assert_eq!(rows[0].get("n"), Some(&Value::Integer(5)));
/// assert_eq!(rows[0].get("s"), Some(&Value::Text("x".into())));
/// ```
pub fn query_rows(conn: &Connection, sql: &str, params: &[Value]) -> Result<Vec<ResultRow>> {
    let mut stmt = prepare_checked(conn, sql, params)?;
    let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let mut rows = stmt.query(params_from_iter(params.iter().map(to_sql)))?;

    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut result = ResultRow::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            result.push(name.clone(), from_sql(row.get_ref(i)?));
        }
        out.push(result);
    }
    Ok(out)
}

/// Executes a statement and returns the number of changed rows.
pub fn execute(conn: &Connection, sql: &str, params: &[Value]) -> Result<usize> {
    let mut stmt = prepare_checked(conn, sql, params)?;
    Ok(stmt.execute(params_from_iter(params.iter().map(to_sql)))?)
}

/// Runs a query whose first column is a count.
pub(crate) fn query_count(conn: &Connection, sql: &str, params: &[Value]) -> Result<u64> {
    let mut stmt = prepare_checked(conn, sql, params)?;
    let count: i64 = stmt.query_row(params_from_iter(params.iter().map(to_sql)), |row| row.get(0))?;
    Ok(u64::try_from(count).unwrap_or(0))
}
