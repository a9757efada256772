//! # Supplier Repository

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use quadtech_core::validation::validate_name;
use quadtech_core::{NewSupplier, Supplier};

const SUPPLIER_COLUMNS: &str =
    "id, name, contact_person, phone, email, address, is_active, created_at, updated_at";

/// Repository for supplier operations.
#[derive(Debug, Clone)]
pub struct SupplierRepository {
    pool: SqlitePool,
}

impl SupplierRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SupplierRepository { pool }
    }

    /// Lists active suppliers ordered by name.
    pub async fn list_active(&self) -> DbResult<Vec<Supplier>> {
        let sql = format!(
            "SELECT {SUPPLIER_COLUMNS} FROM suppliers WHERE is_active = 1 ORDER BY name"
        );
        let suppliers = sqlx::query_as::<_, Supplier>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(suppliers)
    }

    /// Lists all suppliers.
    pub async fn list(&self) -> DbResult<Vec<Supplier>> {
        let sql = format!("SELECT {SUPPLIER_COLUMNS} FROM suppliers ORDER BY name");
        let suppliers = sqlx::query_as::<_, Supplier>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(suppliers)
    }

    /// Gets a supplier by id.
    pub async fn get(&self, id: i64) -> DbResult<Option<Supplier>> {
        let sql = format!("SELECT {SUPPLIER_COLUMNS} FROM suppliers WHERE id = ?1");
        let supplier = sqlx::query_as::<_, Supplier>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(supplier)
    }

    /// Creates a supplier and returns it.
    pub async fn create(&self, input: &NewSupplier) -> DbResult<Supplier> {
        validate_name("supplier name", &input.name)?;
        debug!(name = %input.name, "Creating supplier");

        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO suppliers (name, contact_person, phone, email, address, is_active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?6)",
        )
        .bind(input.name.trim())
        .bind(&input.contact_person)
        .bind(&input.phone)
        .bind(&input.email)
        .bind(&input.address)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        self.get(id)
            .await?
            .ok_or_else(|| DbError::not_found("Supplier", id))
    }

    /// Updates a supplier's details.
    pub async fn update(&self, id: i64, input: &NewSupplier) -> DbResult<()> {
        validate_name("supplier name", &input.name)?;

        let result = sqlx::query(
            "UPDATE suppliers SET name = ?2, contact_person = ?3, phone = ?4,
                email = ?5, address = ?6, updated_at = ?7
             WHERE id = ?1",
        )
        .bind(id)
        .bind(input.name.trim())
        .bind(&input.contact_person)
        .bind(&input.phone)
        .bind(&input.email)
        .bind(&input.address)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Supplier", id));
        }

        Ok(())
    }

    /// Deactivates a supplier. Purchase history keeps referencing it.
    pub async fn deactivate(&self, id: i64) -> DbResult<()> {
        let result =
            sqlx::query("UPDATE suppliers SET is_active = 0, updated_at = ?2 WHERE id = ?1")
                .bind(id)
                .bind(Utc::now())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Supplier", id));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn test_supplier_crud() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let suppliers = db.suppliers();

        let s = suppliers
            .create(&NewSupplier {
                name: "Aero Components Ltd".into(),
                contact_person: Some("Kim Park".into()),
                phone: None,
                email: Some("sales@aero.example".into()),
                address: None,
            })
            .await
            .unwrap();

        assert_eq!(suppliers.list_active().await.unwrap().len(), 1);

        suppliers
            .update(
                s.id,
                &NewSupplier {
                    name: "Aero Components".into(),
                    contact_person: None,
                    phone: None,
                    email: None,
                    address: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(
            suppliers.get(s.id).await.unwrap().unwrap().name,
            "Aero Components"
        );

        suppliers.deactivate(s.id).await.unwrap();
        assert!(suppliers.list_active().await.unwrap().is_empty());
    }
}
