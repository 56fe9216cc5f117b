//! Every schema change since the baseline, one entry per version.

use diesel::sqlite::SqliteConnection;

use rentdesk_core::errors::Result;
use rentdesk_core::migrations::RiskLevel;

use super::plan::{MigrationStep, StepMode};
use crate::sql::execute_all;

pub const LATEST_VERSION: i32 = 34;

const TRACKED: &[&str] = &["customers", "suppliers", "reservations", "payments"];

pub fn default_steps() -> Vec<MigrationStep> {
    vec![
        step(18, "customer email", &["customers"], RiskLevel::Low, add_customer_email),
        step(19, "suppliers table", &[], RiskLevel::Low, create_suppliers),
        step(20, "reservation supplier", &["reservations"], RiskLevel::Low, add_reservation_supplier),
        step(21, "reservation contract number", &["reservations"], RiskLevel::Low, add_contract_number),
        step(22, "supplier commission rate", &["suppliers"], RiskLevel::Low, add_commission_rate),
        step(
            23,
            "reservation commission amount",
            &["reservations"],
            RiskLevel::High,
            add_commission_amount,
        ),
        step(24, "payment receipts", &["payments"], RiskLevel::Low, add_payment_receipts),
        step(25, "tenant ownership", TRACKED, RiskLevel::High, add_tenant_ids),
        step(26, "tenant indexes", TRACKED, RiskLevel::Low, add_tenant_indexes),
        // Reserved: the release that used this version was abandoned.
        step(27, "reserved", &[], RiskLevel::Low, noop),
        step(28, "sync outbox", &[], RiskLevel::Low, create_sync_outbox),
        step(29, "updated_at columns", TRACKED, RiskLevel::High, add_updated_at),
        step(30, "customer name index", &["customers"], RiskLevel::Low, replace_customer_name_index),
        MigrationStep {
            mode: StepMode::Autocommit,
            ..step(
                31,
                "reservation status",
                &["reservations"],
                RiskLevel::High,
                rebuild_reservations_with_status,
            )
        },
        step(32, "supplier notes", &["suppliers"], RiskLevel::Low, add_supplier_notes),
        step(33, "outbox dirty index", &["sync_outbox"], RiskLevel::Low, add_outbox_dirty_index),
    ]
}

fn step(
    from: i32,
    name: &'static str,
    at_risk_tables: &'static [&'static str],
    risk: RiskLevel,
    apply: fn(&mut SqliteConnection) -> Result<()>,
) -> MigrationStep {
    MigrationStep {
        from,
        to: from + 1,
        name,
        at_risk_tables,
        risk,
        mode: StepMode::Transactional,
        apply,
    }
}

fn noop(_conn: &mut SqliteConnection) -> Result<()> {
    Ok(())
}

fn add_customer_email(conn: &mut SqliteConnection) -> Result<()> {
    execute_all(conn, &["ALTER TABLE customers ADD COLUMN email TEXT"])
}

fn create_suppliers(conn: &mut SqliteConnection) -> Result<()> {
    execute_all(
        conn,
        &["CREATE TABLE suppliers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            phone TEXT,
            email TEXT,
            address TEXT,
            created_at TEXT NOT NULL
        )"],
    )
}

fn add_reservation_supplier(conn: &mut SqliteConnection) -> Result<()> {
    execute_all(
        conn,
        &["ALTER TABLE reservations ADD COLUMN supplier_id INTEGER REFERENCES suppliers(id)"],
    )
}

fn add_contract_number(conn: &mut SqliteConnection) -> Result<()> {
    execute_all(
        conn,
        &[
            "ALTER TABLE reservations ADD COLUMN contract_number TEXT",
            "CREATE INDEX idx_reservations_contract_number ON reservations(contract_number)",
        ],
    )
}

fn add_commission_rate(conn: &mut SqliteConnection) -> Result<()> {
    execute_all(conn, &["ALTER TABLE suppliers ADD COLUMN commission_rate REAL"])
}

fn add_commission_amount(conn: &mut SqliteConnection) -> Result<()> {
    execute_all(
        conn,
        &[
            "ALTER TABLE reservations ADD COLUMN commission_amount REAL",
            "UPDATE reservations
                SET commission_amount = ROUND(total_price * (
                    SELECT commission_rate FROM suppliers WHERE suppliers.id = reservations.supplier_id
                ), 2)
              WHERE supplier_id IS NOT NULL AND commission_amount IS NULL",
        ],
    )
}

fn add_payment_receipts(conn: &mut SqliteConnection) -> Result<()> {
    execute_all(
        conn,
        &[
            "ALTER TABLE payments ADD COLUMN receipt_number TEXT",
            "ALTER TABLE payments ADD COLUMN notes TEXT",
        ],
    )
}

fn add_tenant_ids(conn: &mut SqliteConnection) -> Result<()> {
    execute_all(
        conn,
        &[
            "ALTER TABLE customers ADD COLUMN tenant_id TEXT",
            "ALTER TABLE suppliers ADD COLUMN tenant_id TEXT",
            "ALTER TABLE reservations ADD COLUMN tenant_id TEXT",
            "ALTER TABLE payments ADD COLUMN tenant_id TEXT",
        ],
    )
}

fn add_tenant_indexes(conn: &mut SqliteConnection) -> Result<()> {
    execute_all(
        conn,
        &[
            "CREATE INDEX idx_customers_tenant ON customers(tenant_id)",
            "CREATE INDEX idx_suppliers_tenant ON suppliers(tenant_id)",
            "CREATE INDEX idx_reservations_tenant ON reservations(tenant_id)",
            "CREATE INDEX idx_payments_tenant ON payments(tenant_id)",
        ],
    )
}

fn create_sync_outbox(conn: &mut SqliteConnection) -> Result<()> {
    execute_all(
        conn,
        &["CREATE TABLE sync_outbox (
            entity_type TEXT NOT NULL,
            entity_id INTEGER NOT NULL,
            is_dirty INTEGER NOT NULL DEFAULT 1,
            last_dirty_at INTEGER NOT NULL,
            last_sync_status TEXT NOT NULL DEFAULT 'pending'
                CHECK (last_sync_status IN ('pending', 'ok', 'error')),
            last_sync_error TEXT,
            PRIMARY KEY (entity_type, entity_id)
        )"],
    )
}

fn add_updated_at(conn: &mut SqliteConnection) -> Result<()> {
    for table in TRACKED {
        let add = format!("ALTER TABLE {table} ADD COLUMN updated_at TEXT NOT NULL DEFAULT ''");
        let fill = format!("UPDATE {table} SET updated_at = created_at WHERE updated_at = ''");
        execute_all(conn, &[add.as_str(), fill.as_str()])?;
    }
    Ok(())
}

fn replace_customer_name_index(conn: &mut SqliteConnection) -> Result<()> {
    execute_all(
        conn,
        &[
            "DROP INDEX IF EXISTS idx_customers_name_legacy",
            "CREATE INDEX idx_customers_name ON customers(last_name, first_name)",
            "CREATE INDEX idx_customers_id_number ON customers(id_number)",
        ],
    )
}

fn rebuild_reservations_with_status(conn: &mut SqliteConnection) -> Result<()> {
    execute_all(
        conn,
        &[
            "DROP TABLE IF EXISTS reservations_rebuild",
            "CREATE TABLE reservations_rebuild (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                customer_id INTEGER NOT NULL REFERENCES customers(id),
                car_description TEXT NOT NULL,
                pickup_date TEXT NOT NULL,
                return_date TEXT NOT NULL,
                total_price REAL NOT NULL DEFAULT 0,
                notes TEXT,
                created_at TEXT NOT NULL,
                supplier_id INTEGER REFERENCES suppliers(id),
                contract_number TEXT,
                commission_amount REAL,
                tenant_id TEXT,
                updated_at TEXT NOT NULL DEFAULT '',
                status TEXT NOT NULL DEFAULT 'pending'
                    CHECK (status IN ('pending', 'active', 'completed', 'cancelled'))
            )",
            "INSERT INTO reservations_rebuild (
                id, customer_id, car_description, pickup_date, return_date, total_price, notes,
                created_at, supplier_id, contract_number, commission_amount, tenant_id, updated_at, status
            )
            SELECT
                id, customer_id, car_description, pickup_date, return_date, total_price, notes,
                created_at, supplier_id, contract_number, commission_amount, tenant_id, updated_at,
                CASE
                    WHEN return_date < date('now') THEN 'completed'
                    WHEN pickup_date <= date('now') THEN 'active'
                    ELSE 'pending'
                END
            FROM reservations",
            "DROP TABLE reservations",
            "ALTER TABLE reservations_rebuild RENAME TO reservations",
            "CREATE INDEX idx_reservations_customer ON reservations(customer_id)",
            "CREATE INDEX idx_reservations_contract_number ON reservations(contract_number)",
            "CREATE INDEX idx_reservations_tenant ON reservations(tenant_id)",
            "CREATE INDEX idx_reservations_status ON reservations(status)",
        ],
    )
}

fn add_supplier_notes(conn: &mut SqliteConnection) -> Result<()> {
    execute_all(conn, &["ALTER TABLE suppliers ADD COLUMN notes TEXT"])
}

fn add_outbox_dirty_index(conn: &mut SqliteConnection) -> Result<()> {
    execute_all(
        conn,
        &["CREATE INDEX idx_sync_outbox_dirty ON sync_outbox(is_dirty, last_dirty_at)"],
    )
}
