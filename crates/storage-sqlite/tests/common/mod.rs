#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::SqliteConnection;

use rentdesk_core::entities::{NewCustomer, NewReservation};
use rentdesk_core::sync::{RemoteStore, SyncEntity};
use rentdesk_storage_sqlite::config::StoreConfig;
use rentdesk_storage_sqlite::db::establish_connection;
use rentdesk_storage_sqlite::errors::StorageError;
use rentdesk_storage_sqlite::migrations::create_baseline_schema;

pub fn store_config(dir: &Path) -> StoreConfig {
    StoreConfig::new(dir.join("data")).with_backup_dir(dir.join("backups"))
}

pub fn files_in(dir: &Path) -> Vec<PathBuf> {
    match fs::read_dir(dir) {
        Ok(entries) => entries.filter_map(|e| e.ok()).map(|e| e.path()).collect(),
        Err(_) => Vec::new(),
    }
}

/// Writes a database as the oldest supported release left it.
pub fn seed_baseline_database(config: &StoreConfig) -> PathBuf {
    fs::create_dir_all(&config.data_dir).unwrap();
    let db_path = config.database_path();
    let mut conn = establish_connection(&db_path, 5_000).unwrap();
    conn.immediate_transaction::<_, StorageError, _>(|tx| Ok(create_baseline_schema(tx)?))
        .unwrap();
    diesel::sql_query(
        "INSERT INTO customers (id, first_name, last_name, id_number, created_at) VALUES
            (1, 'Noa', 'Cohen', '123456789', '2023-01-04T09:00:00Z'),
            (2, 'Avi', 'Levi', NULL, '2023-02-11T09:00:00Z'),
            (3, 'Maya', 'Peretz', '555000111', '2023-03-20T09:00:00Z')",
    )
    .execute(&mut conn)
    .unwrap();
    diesel::sql_query(
        "INSERT INTO reservations (id, customer_id, car_description, pickup_date, return_date, total_price, created_at) VALUES
            (1, 1, 'Toyota Corolla', '2023-01-10', '2023-01-15', 900.0, '2023-01-04T09:10:00Z'),
            (2, 3, 'Hyundai i20', '2099-06-01', '2099-06-08', 1200.0, '2023-03-20T09:10:00Z')",
    )
    .execute(&mut conn)
    .unwrap();
    diesel::sql_query(
        "INSERT INTO payments (id, reservation_id, amount, method, paid_at, created_at) VALUES
            (1, 1, 900.0, 'card', '2023-01-10', '2023-01-10T12:00:00Z')",
    )
    .execute(&mut conn)
    .unwrap();
    db_path
}

pub fn raw_connection(config: &StoreConfig) -> SqliteConnection {
    establish_connection(&config.database_path(), 5_000).unwrap()
}

pub fn customer(tenant: &str, first_name: &str, id_number: Option<&str>) -> NewCustomer {
    NewCustomer {
        tenant_id: Some(tenant.to_string()),
        first_name: first_name.to_string(),
        last_name: "Test".to_string(),
        id_number: id_number.map(str::to_string),
        ..Default::default()
    }
}

pub fn reservation(tenant: &str, customer_id: i64, contract: &str) -> NewReservation {
    NewReservation {
        tenant_id: Some(tenant.to_string()),
        customer_id,
        contract_number: Some(contract.to_string()),
        car_description: "Kia Picanto".to_string(),
        pickup_date: "2025-03-01".to_string(),
        return_date: "2025-03-05".to_string(),
        total_price: 640.0,
        ..Default::default()
    }
}

/// Remote store serving fixed collections for every tenant.
#[derive(Default)]
pub struct StaticRemote {
    pub collections: HashMap<SyncEntity, Vec<serde_json::Value>>,
}

#[async_trait]
impl RemoteStore for StaticRemote {
    async fn fetch_collection(
        &self,
        _tenant_id: &str,
        entity: SyncEntity,
    ) -> rentdesk_core::Result<Vec<serde_json::Value>> {
        Ok(self.collections.get(&entity).cloned().unwrap_or_default())
    }

    async fn put_document(
        &self,
        _tenant_id: &str,
        _entity: SyncEntity,
        _document_id: &str,
        _document: &serde_json::Value,
    ) -> rentdesk_core::Result<()> {
        Ok(())
    }
}
