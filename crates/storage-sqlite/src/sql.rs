//! Raw SQL helpers for statements diesel's DSL cannot express (DDL, pragmas,
//! per-table copies driven by table names known only at runtime).

use diesel::prelude::*;
use diesel::sql_types::{BigInt, Integer, Nullable, Text};
use diesel::sqlite::SqliteConnection;

use rentdesk_core::errors::{DatabaseError, Error, Result};
use rentdesk_core::sync::SYNC_TABLES;

use crate::errors::StorageError;

pub(crate) fn escape_sqlite_str(value: &str) -> String {
    value.replace('\'', "''")
}

pub(crate) fn quote_identifier(value: &str) -> String {
    format!("`{}`", value.replace('`', "``"))
}

pub(crate) fn validate_sync_table(table: &str) -> Result<()> {
    if SYNC_TABLES.contains(&table) {
        return Ok(());
    }
    Err(Error::Database(DatabaseError::Internal(format!(
        "Unsupported sync table '{}'",
        table
    ))))
}

#[derive(QueryableByName)]
struct UserVersionRow {
    #[diesel(sql_type = Integer)]
    user_version: i32,
}

#[derive(QueryableByName)]
pub(crate) struct CountRow {
    #[diesel(sql_type = BigInt)]
    pub c: i64,
}

#[derive(QueryableByName)]
struct NameRow {
    #[diesel(sql_type = Text)]
    name: String,
}

#[derive(QueryableByName)]
struct SqlRow {
    #[diesel(sql_type = Nullable<Text>)]
    sql: Option<String>,
}

pub fn get_user_version(conn: &mut SqliteConnection) -> Result<i32> {
    let row = diesel::sql_query("PRAGMA user_version")
        .get_result::<UserVersionRow>(conn)
        .map_err(StorageError::from)?;
    Ok(row.user_version)
}

/// Pragmas cannot take bound parameters; `version` is an integer so it is
/// safe to format in.
pub fn set_user_version(conn: &mut SqliteConnection, version: i32) -> Result<()> {
    diesel::sql_query(format!("PRAGMA user_version = {}", version))
        .execute(conn)
        .map_err(StorageError::from)?;
    Ok(())
}

pub fn table_exists(conn: &mut SqliteConnection, table: &str) -> Result<bool> {
    let row = diesel::sql_query(
        "SELECT COUNT(*) AS c FROM sqlite_master WHERE type = 'table' AND name = ?",
    )
    .bind::<Text, _>(table)
    .get_result::<CountRow>(conn)
    .map_err(StorageError::from)?;
    Ok(row.c > 0)
}

pub fn count_rows(conn: &mut SqliteConnection, table: &str) -> Result<i64> {
    let row = diesel::sql_query(format!("SELECT COUNT(*) AS c FROM {}", quote_identifier(table)))
        .get_result::<CountRow>(conn)
        .map_err(StorageError::from)?;
    Ok(row.c)
}

/// Application tables, excluding SQLite internals.
pub fn user_tables(conn: &mut SqliteConnection) -> Result<Vec<String>> {
    let rows = diesel::sql_query(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )
    .load::<NameRow>(conn)
    .map_err(StorageError::from)?;
    Ok(rows.into_iter().map(|row| row.name).collect())
}

pub fn table_columns(conn: &mut SqliteConnection, table: &str) -> Result<Vec<String>> {
    let rows = diesel::sql_query(format!(
        "SELECT name FROM pragma_table_info('{}')",
        escape_sqlite_str(table)
    ))
    .load::<NameRow>(conn)
    .map_err(StorageError::from)?;
    Ok(rows.into_iter().map(|row| row.name).collect())
}

pub(crate) fn table_create_sql(conn: &mut SqliteConnection, table: &str) -> Result<Option<String>> {
    let row = diesel::sql_query("SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?")
        .bind::<Text, _>(table)
        .get_result::<SqlRow>(conn)
        .optional()
        .map_err(StorageError::from)?;
    Ok(row.and_then(|r| r.sql))
}

/// Explicit index definitions of `table`. Automatic indexes have no SQL.
pub(crate) fn index_create_sql(conn: &mut SqliteConnection, table: &str) -> Result<Vec<String>> {
    let rows = diesel::sql_query(
        "SELECT sql FROM sqlite_master WHERE type = 'index' AND tbl_name = ? AND sql IS NOT NULL ORDER BY name",
    )
    .bind::<Text, _>(table)
    .load::<SqlRow>(conn)
    .map_err(StorageError::from)?;
    Ok(rows.into_iter().filter_map(|r| r.sql).collect())
}

pub fn index_exists(conn: &mut SqliteConnection, index: &str) -> Result<bool> {
    let row = diesel::sql_query(
        "SELECT COUNT(*) AS c FROM sqlite_master WHERE type = 'index' AND name = ?",
    )
    .bind::<Text, _>(index)
    .get_result::<CountRow>(conn)
    .map_err(StorageError::from)?;
    Ok(row.c > 0)
}

pub(crate) fn execute_all(conn: &mut SqliteConnection, statements: &[&str]) -> Result<()> {
    for statement in statements {
        diesel::sql_query(*statement)
            .execute(conn)
            .map_err(StorageError::from)?;
    }
    Ok(())
}
