//! Shadow-table snapshots taken before a step alters a table.

use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use log::{debug, warn};

use rentdesk_core::errors::{Error, MigrationError, Result};

use crate::errors::StorageError;
use crate::sql::{
    count_rows, index_create_sql, quote_identifier, table_columns, table_create_sql, table_exists,
};

pub const SHADOW_SUFFIX: &str = "_backup";

pub fn shadow_name(table: &str) -> String {
    format!("{table}{SHADOW_SUFFIX}")
}

/// Everything needed to put one table back exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSnapshot {
    pub table: String,
    pub shadow: String,
    pub row_count: i64,
    pub columns: Vec<String>,
    pub create_sql: String,
    pub index_sql: Vec<String>,
}

/// Copies each existing table into `<table>_backup` in one committed
/// transaction. Tables that do not exist yet are skipped.
pub fn snapshot_tables(conn: &mut SqliteConnection, tables: &[&str]) -> Result<Vec<TableSnapshot>> {
    conn.immediate_transaction::<_, StorageError, _>(|tx| {
        let mut snapshots = Vec::with_capacity(tables.len());
        for table in tables {
            let Some(create_sql) = table_create_sql(tx, table)? else {
                debug!("[Migration] Table {} does not exist yet; no shadow copy", table);
                continue;
            };
            let shadow = shadow_name(table);
            diesel::sql_query(format!("DROP TABLE IF EXISTS {}", quote_identifier(&shadow)))
                .execute(tx)?;
            diesel::sql_query(format!(
                "CREATE TABLE {} AS SELECT * FROM {}",
                quote_identifier(&shadow),
                quote_identifier(table)
            ))
            .execute(tx)?;

            snapshots.push(TableSnapshot {
                table: table.to_string(),
                row_count: count_rows(tx, table)?,
                columns: table_columns(tx, table)?,
                index_sql: index_create_sql(tx, table)?,
                create_sql,
                shadow,
            });
        }
        Ok(snapshots)
    })
    .map_err(Error::from)
}

/// Fails closed unless every shadow exists and holds exactly the rows of its
/// source table.
pub fn verify_snapshots(conn: &mut SqliteConnection, snapshots: &[TableSnapshot]) -> Result<()> {
    for snapshot in snapshots {
        if !table_exists(conn, &snapshot.shadow)? {
            return Err(MigrationError::VerificationFailed {
                table: snapshot.table.clone(),
                expected: snapshot.row_count,
                found: -1,
            }
            .into());
        }
        for table in [&snapshot.shadow, &snapshot.table] {
            let found = count_rows(conn, table)?;
            if found != snapshot.row_count {
                return Err(MigrationError::VerificationFailed {
                    table: table.clone(),
                    expected: snapshot.row_count,
                    found,
                }
                .into());
            }
        }
    }
    Ok(())
}

/// Rebuilds each table from its captured definition and copies the shadow's
/// rows back. All tables are restored in one transaction; shadows are dropped
/// only once the copy is verified.
pub fn restore_snapshots(conn: &mut SqliteConnection, snapshots: &[TableSnapshot]) -> Result<()> {
    // Dropping a referenced table with enforcement on would cascade checks
    // into child tables. The pragma is a no-op inside a transaction.
    diesel::sql_query("PRAGMA foreign_keys = OFF")
        .execute(conn)
        .map_err(StorageError::from)?;

    let result = conn
        .immediate_transaction::<_, StorageError, _>(|tx| {
            for snapshot in snapshots {
                restore_one(tx, snapshot)?;
            }
            Ok(())
        })
        .map_err(Error::from);

    if let Err(e) = diesel::sql_query("PRAGMA foreign_keys = ON").execute(conn) {
        warn!("[Migration] Failed to re-enable foreign keys after restore: {}", e);
    }
    result
}

fn restore_one(tx: &mut SqliteConnection, snapshot: &TableSnapshot) -> std::result::Result<(), StorageError> {
    if !table_exists(tx, &snapshot.shadow)? {
        return Err(StorageError::Core(Error::Unexpected(format!(
            "shadow table {} is missing",
            snapshot.shadow
        ))));
    }

    let table = quote_identifier(&snapshot.table);
    let columns = snapshot
        .columns
        .iter()
        .map(|c| quote_identifier(c))
        .collect::<Vec<_>>()
        .join(", ");

    diesel::sql_query(format!("DROP TABLE IF EXISTS {table}")).execute(tx)?;
    diesel::sql_query(snapshot.create_sql.as_str()).execute(tx)?;
    diesel::sql_query(format!(
        "INSERT INTO {table} ({columns}) SELECT {columns} FROM {}",
        quote_identifier(&snapshot.shadow)
    ))
    .execute(tx)?;
    for index in &snapshot.index_sql {
        diesel::sql_query(index.as_str()).execute(tx)?;
    }

    let restored = count_rows(tx, &snapshot.table)?;
    if restored != snapshot.row_count {
        return Err(StorageError::from(MigrationError::VerificationFailed {
            table: snapshot.table.clone(),
            expected: snapshot.row_count,
            found: restored,
        }));
    }

    diesel::sql_query(format!("DROP TABLE {}", quote_identifier(&snapshot.shadow))).execute(tx)?;
    debug!(
        "[Migration] Restored {} ({} rows) from shadow copy",
        snapshot.table, restored
    );
    Ok(())
}

/// Removes shadow tables after a committed step.
pub fn drop_snapshots(conn: &mut SqliteConnection, snapshots: &[TableSnapshot]) -> Result<()> {
    for snapshot in snapshots {
        diesel::sql_query(format!(
            "DROP TABLE IF EXISTS {}",
            quote_identifier(&snapshot.shadow)
        ))
        .execute(conn)
        .map_err(StorageError::from)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use diesel::connection::SimpleConnection;

    fn conn_with_table() -> SqliteConnection {
        let mut conn = SqliteConnection::establish(":memory:").unwrap();
        conn.batch_execute(
            "CREATE TABLE items (id INTEGER PRIMARY KEY AUTOINCREMENT, label TEXT NOT NULL);
             CREATE INDEX idx_items_label ON items(label);
             INSERT INTO items (label) VALUES ('a'), ('b'), ('c');",
        )
        .unwrap();
        conn
    }

    #[test]
    fn snapshot_then_restore_rebuilds_table_and_indexes() {
        let mut conn = conn_with_table();
        let snapshots = snapshot_tables(&mut conn, &["items", "not_created_yet"]).unwrap();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].row_count, 3);
        verify_snapshots(&mut conn, &snapshots).unwrap();

        conn.batch_execute("DROP INDEX idx_items_label; ALTER TABLE items ADD COLUMN broken TEXT; DELETE FROM items WHERE id = 1;")
            .unwrap();

        restore_snapshots(&mut conn, &snapshots).unwrap();
        assert_eq!(count_rows(&mut conn, "items").unwrap(), 3);
        assert_eq!(table_columns(&mut conn, "items").unwrap(), vec!["id", "label"]);
        assert!(crate::sql::index_exists(&mut conn, "idx_items_label").unwrap());
        assert!(!table_exists(&mut conn, "items_backup").unwrap());
    }

    #[test]
    fn verification_fails_closed_when_source_changed() {
        let mut conn = conn_with_table();
        let snapshots = snapshot_tables(&mut conn, &["items"]).unwrap();
        conn.batch_execute("INSERT INTO items (label) VALUES ('late')").unwrap();

        let err = verify_snapshots(&mut conn, &snapshots).unwrap_err();
        assert!(matches!(
            err,
            Error::Migration(MigrationError::VerificationFailed { expected: 3, found: 4, .. })
        ));
    }

    #[test]
    fn restore_without_shadow_fails_and_keeps_damaged_table() {
        let mut conn = conn_with_table();
        let snapshots = snapshot_tables(&mut conn, &["items"]).unwrap();
        conn.batch_execute("DROP TABLE items_backup; DELETE FROM items;").unwrap();

        assert!(restore_snapshots(&mut conn, &snapshots).is_err());
        assert!(table_exists(&mut conn, "items").unwrap());
    }
}
