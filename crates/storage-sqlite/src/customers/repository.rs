use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::SqliteConnection;

use rentdesk_core::entities::{
    check_tenant_change, Customer, CustomerRepositoryTrait, EntityRecord, NewCustomer,
};
use rentdesk_core::errors::{DatabaseError, Error, Result};
use rentdesk_core::sync::SyncEntity;

use super::model::{CustomerDB, NewCustomerDB};
use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::StorageError;
use crate::outbox::mark_dirty;
use crate::schema::customers;

pub struct CustomerRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl CustomerRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

#[async_trait]
impl CustomerRepositoryTrait for CustomerRepository {
    fn get_customer(&self, customer_id: i64) -> Result<Option<Customer>> {
        let mut conn = get_connection(&self.pool)?;
        let row = customers::table
            .find(customer_id)
            .select(CustomerDB::as_select())
            .first::<CustomerDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        Ok(row.map(Customer::from))
    }

    fn list_customers_for_tenant(&self, tenant_id: &str) -> Result<Vec<Customer>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = customers::table
            .filter(customers::tenant_id.eq(tenant_id))
            .order((customers::last_name.asc(), customers::first_name.asc()))
            .select(CustomerDB::as_select())
            .load::<CustomerDB>(&mut conn)
            .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(Customer::from).collect())
    }

    fn count_for_tenant(&self, tenant_id: &str) -> Result<i64> {
        let mut conn = get_connection(&self.pool)?;
        let count = customers::table
            .filter(customers::tenant_id.eq(tenant_id))
            .count()
            .get_result::<i64>(&mut conn)
            .map_err(StorageError::from)?;
        Ok(count)
    }

    async fn insert_customer(&self, new_customer: NewCustomer) -> Result<Customer> {
        new_customer.validate()?;
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<Customer> {
                let now = Utc::now();
                let row = NewCustomerDB::from_domain(new_customer, &now.to_rfc3339());
                let inserted = diesel::insert_into(customers::table)
                    .values(&row)
                    .returning(CustomerDB::as_returning())
                    .get_result(conn)
                    .map_err(StorageError::from)?;
                mark_dirty(conn, SyncEntity::Customer, inserted.id, now);
                Ok(Customer::from(inserted))
            })
            .await
    }

    async fn update_customer(&self, customer: Customer) -> Result<Customer> {
        customer.validate()?;
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<Customer> {
                let existing = customers::table
                    .find(customer.id)
                    .select(CustomerDB::as_select())
                    .first::<CustomerDB>(conn)
                    .optional()
                    .map_err(StorageError::from)?
                    .ok_or_else(|| {
                        Error::Database(DatabaseError::NotFound(format!("customer {}", customer.id)))
                    })?;
                check_tenant_change(existing.tenant_id.as_deref(), customer.tenant_id.as_deref())?;

                let now = Utc::now();
                let mut row = CustomerDB::from(customer);
                row.created_at = existing.created_at;
                row.updated_at = now.to_rfc3339();
                let updated = diesel::update(customers::table.find(row.id))
                    .set(&row)
                    .returning(CustomerDB::as_returning())
                    .get_result(conn)
                    .map_err(StorageError::from)?;
                mark_dirty(conn, SyncEntity::Customer, updated.id, now);
                Ok(Customer::from(updated))
            })
            .await
    }
}
