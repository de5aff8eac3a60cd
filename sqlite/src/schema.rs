//! SQL generation for model tables.
//!
//! Produces `CREATE TABLE` and `DROP TABLE` statements from a validated
//! [`ModelSchema`] and reads the live column layout back from the database.
//! Identifiers are always double-quoted; they have already been restricted
//! to ASCII alphanumerics and underscores at registration.

use activerow_core::{ColumnDef, ModelSchema, StorageType};
use rusqlite::Connection;

use crate::error::Result;

/// Quotes an identifier for use in SQL.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Comma-separated list of `n` positional placeholders.
///
/// # Examples
///
/// ```
/// use activerow_sqlite::placeholders;
///
/// assert_eq!(placeholders(3), "?, ?, ?");
/// assert_eq!(placeholders(0), "");
/// ```
pub fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// Quoted, comma-separated column list.
pub(crate) fn column_list<'a>(columns: impl IntoIterator<Item = &'a str>) -> String {
    columns
        .into_iter()
        .map(quote_ident)
        .collect::<Vec<_>>()
        .join(", ")
}

/// `true` when the key is a single `INTEGER` column. SQLite stores such a
/// key as the rowid and assigns one when `NULL` is inserted.
pub(crate) fn is_rowid_key(schema: &ModelSchema) -> bool {
    let key = schema.primary_key_columns();
    key.len() == 1 && key[0].storage_type == StorageType::Integer
}

/// Generates the `CREATE TABLE IF NOT EXISTS` statement for a model.
///
/// Columns appear in declaration order with their storage types, followed by
/// a `PRIMARY KEY (...)` clause in key order. Key columns other than a rowid
/// key are `NOT NULL`, since SQLite never treats two `NULL`s as a conflict.
pub fn create_table_sql(schema: &ModelSchema) -> String {
    let not_null_key = !is_rowid_key(schema);
    let mut defs: Vec<String> = schema
        .columns()
        .iter()
        .map(|c| {
            let mut def = format!("{} {}", quote_ident(&c.name), c.storage_type.sql_name());
            if c.primary_key && not_null_key {
                def.push_str(" NOT NULL");
            }
            def
        })
        .collect();
    defs.push(format!(
        "PRIMARY KEY ({})",
        column_list(schema.primary_key_column_names())
    ));
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
        quote_ident(schema.table_name()),
        defs.join(",\n    ")
    )
}

/// Generates the `DROP TABLE IF EXISTS` statement for a model.
pub fn drop_table_sql(schema: &ModelSchema) -> String {
    format!("DROP TABLE IF EXISTS {}", quote_ident(schema.table_name()))
}

/// Returns `true` if a table named `table` exists.
pub fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Reads the column layout of `table` as it exists in the database.
///
/// Returns an empty list when the table does not exist.
pub fn live_columns(conn: &Connection, table: &str) -> Result<Vec<ColumnDef>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote_ident(table)))?;
    let rows = stmt.query_map([], |row| {
        let name: String = row.get("name")?;
        let declared: String = row.get("type")?;
        let pk: i64 = row.get("pk")?;
        Ok(ColumnDef {
            name,
            storage_type: StorageType::from_declared(&declared),
            primary_key: pk > 0,
        })
    })?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use activerow_core::{FieldType, SchemaBuilder};

    fn membership() -> ModelSchema {
        SchemaBuilder::new("Membership")
            .field("group_id", FieldType::Integer)
            .field("user_id", FieldType::Integer)
            .field("role", FieldType::Text)
            .field("joined", FieldType::Timestamp)
            .field("avatar", FieldType::Bytes)
            .primary_key(["user_id", "group_id"])
            .build()
            .unwrap()
    }

    #[test]
    fn test_create_table_sql() {
        let sql = create_table_sql(&membership());
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS \"memberships\""));
        assert!(sql.contains("\"group_id\" INTEGER"));
        assert!(sql.contains("\"role\" TEXT"));
        assert!(sql.contains("\"joined\" REAL"));
        assert!(sql.contains("\"avatar\" BLOB"));
        assert!(sql.contains("PRIMARY KEY (\"user_id\", \"group_id\")"));
        assert!(sql.contains("\"user_id\" INTEGER NOT NULL"));
        assert!(sql.contains("\"group_id\" INTEGER NOT NULL"));
        assert!(sql.contains("\"role\" TEXT,"));
    }

    #[test]
    fn test_rowid_key_stays_nullable() {
        let account = SchemaBuilder::new("Account")
            .field("id", FieldType::Integer)
            .field("name", FieldType::Text)
            .build()
            .unwrap();
        assert!(is_rowid_key(&account));
        assert!(!create_table_sql(&account).contains("NOT NULL"));

        let tag = SchemaBuilder::new("Tag")
            .field("slug", FieldType::Text)
            .primary_key(["slug"])
            .build()
            .unwrap();
        assert!(!is_rowid_key(&tag));
        assert!(create_table_sql(&tag).contains("\"slug\" TEXT NOT NULL"));
        assert!(!is_rowid_key(&membership()));
    }

    #[test]
    fn test_drop_table_sql() {
        assert_eq!(
            drop_table_sql(&membership()),
            "DROP TABLE IF EXISTS \"memberships\""
        );
    }

    #[test]
    fn test_quote_ident_escapes_quotes() {
        assert_eq!(quote_ident("name"), "\"name\"");
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn test_live_columns_match_declared() {
        let conn = Connection::open_in_memory().unwrap();
        let schema = membership();
        assert!(!table_exists(&conn, "memberships").unwrap());
        assert!(live_columns(&conn, "memberships").unwrap().is_empty());

        conn.execute_batch(&create_table_sql(&schema)).unwrap();
        assert!(table_exists(&conn, "memberships").unwrap());

        let live = live_columns(&conn, "memberships").unwrap();
        assert_eq!(live, schema.columns());
    }

    #[test]
    fn test_create_table_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        let sql = create_table_sql(&membership());
        conn.execute_batch(&sql).unwrap();
        conn.execute_batch(&sql).unwrap();
        conn.execute_batch(&drop_table_sql(&membership())).unwrap();
        conn.execute_batch(&drop_table_sql(&membership())).unwrap();
        assert!(!table_exists(&conn, "memberships").unwrap());
    }
}
