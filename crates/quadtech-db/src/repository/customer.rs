//! # Customer Repository

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use quadtech_core::validation::validate_name;
use quadtech_core::{Customer, NewCustomer};

const CUSTOMER_COLUMNS: &str =
    "id, name, contact_number, email, address, created_at, updated_at";

/// Repository for customer operations.
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    /// Lists customers ordered by name.
    pub async fn list(&self) -> DbResult<Vec<Customer>> {
        let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customers ORDER BY name");
        let customers = sqlx::query_as::<_, Customer>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(customers)
    }

    /// Searches customers by name or contact number substring.
    pub async fn search(&self, query: &str, limit: u32) -> DbResult<Vec<Customer>> {
        let pattern = format!("%{}%", query.trim());
        let sql = format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers
             WHERE name LIKE ?1 OR contact_number LIKE ?1
             ORDER BY name LIMIT ?2"
        );

        let customers = sqlx::query_as::<_, Customer>(&sql)
            .bind(pattern)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(customers)
    }

    /// Gets a customer by id.
    pub async fn get(&self, id: i64) -> DbResult<Option<Customer>> {
        let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = ?1");
        let customer = sqlx::query_as::<_, Customer>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(customer)
    }

    /// Creates a customer and returns it.
    pub async fn create(&self, input: &NewCustomer) -> DbResult<Customer> {
        validate_name("customer name", &input.name)?;
        debug!(name = %input.name, "Creating customer");

        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO customers (name, contact_number, email, address, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        )
        .bind(input.name.trim())
        .bind(&input.contact_number)
        .bind(&input.email)
        .bind(&input.address)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        self.get(id)
            .await?
            .ok_or_else(|| DbError::not_found("Customer", id))
    }

    /// Updates a customer's details.
    pub async fn update(&self, id: i64, input: &NewCustomer) -> DbResult<()> {
        validate_name("customer name", &input.name)?;

        let result = sqlx::query(
            "UPDATE customers SET name = ?2, contact_number = ?3, email = ?4,
                address = ?5, updated_at = ?6
             WHERE id = ?1",
        )
        .bind(id)
        .bind(input.name.trim())
        .bind(&input.contact_number)
        .bind(&input.email)
        .bind(&input.address)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Customer", id));
        }

        Ok(())
    }

    /// Deletes a customer. Fails while sales orders still reference it.
    pub async fn delete(&self, id: i64) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM customers WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Customer", id));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn test_customer_crud_and_search() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let customers = db.customers();

        customers
            .create(&NewCustomer {
                name: "Dana Reyes".into(),
                contact_number: Some("0917-555-0001".into()),
                email: None,
                address: None,
            })
            .await
            .unwrap();

        let hits = customers.search("0917", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Dana Reyes");

        let c = &hits[0];
        customers.delete(c.id).await.unwrap();
        assert!(customers.get(c.id).await.unwrap().is_none());
    }
}
