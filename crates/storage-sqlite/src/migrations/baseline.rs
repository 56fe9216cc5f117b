//! Schema of the oldest supported release. Fresh installs start here and walk
//! the full chain, so new and upgraded devices end up with identical schemas.

use diesel::sqlite::SqliteConnection;

use rentdesk_core::errors::Result;

use crate::sql::{execute_all, set_user_version};

pub const BASELINE_VERSION: i32 = 18;

const BASELINE_STATEMENTS: &[&str] = &[
    "CREATE TABLE customers (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        first_name TEXT NOT NULL,
        last_name TEXT NOT NULL,
        id_number TEXT,
        phone TEXT,
        address TEXT,
        notes TEXT,
        created_at TEXT NOT NULL
    )",
    "CREATE INDEX idx_customers_name_legacy ON customers(first_name)",
    "CREATE TABLE reservations (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        customer_id INTEGER NOT NULL REFERENCES customers(id),
        car_description TEXT NOT NULL,
        pickup_date TEXT NOT NULL,
        return_date TEXT NOT NULL,
        total_price REAL NOT NULL DEFAULT 0,
        notes TEXT,
        created_at TEXT NOT NULL
    )",
    "CREATE INDEX idx_reservations_customer ON reservations(customer_id)",
    "CREATE TABLE payments (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        reservation_id INTEGER NOT NULL REFERENCES reservations(id),
        amount REAL NOT NULL,
        method TEXT NOT NULL,
        paid_at TEXT NOT NULL,
        created_at TEXT NOT NULL
    )",
    "CREATE INDEX idx_payments_reservation ON payments(reservation_id)",
];

/// Creates the baseline tables and stamps the version marker. The caller
/// wraps this in a transaction.
pub fn create_baseline_schema(conn: &mut SqliteConnection) -> Result<()> {
    execute_all(conn, BASELINE_STATEMENTS)?;
    set_user_version(conn, BASELINE_VERSION)
}
