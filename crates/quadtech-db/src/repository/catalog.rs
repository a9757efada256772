//! # Catalog Repositories
//!
//! Brands, categories, and named tax rates. Small lookup tables with
//! plain CRUD; products reference all three.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use quadtech_core::validation::validate_name;
use quadtech_core::{Brand, Category, Tax};

// =============================================================================
// Brands
// =============================================================================

/// Repository for brand operations.
#[derive(Debug, Clone)]
pub struct BrandRepository {
    pool: SqlitePool,
}

impl BrandRepository {
    pub fn new(pool: SqlitePool) -> Self {
        BrandRepository { pool }
    }

    /// Lists all brands ordered by name.
    pub async fn list(&self) -> DbResult<Vec<Brand>> {
        let brands = sqlx::query_as::<_, Brand>(
            "SELECT id, name, description, created_at FROM brands ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(brands)
    }

    /// Gets a brand by id.
    pub async fn get(&self, id: i64) -> DbResult<Option<Brand>> {
        let brand = sqlx::query_as::<_, Brand>(
            "SELECT id, name, description, created_at FROM brands WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(brand)
    }

    /// Creates a brand and returns it.
    pub async fn create(&self, name: &str, description: Option<&str>) -> DbResult<Brand> {
        validate_name("brand name", name)?;
        debug!(name = %name, "Creating brand");

        let now = Utc::now();
        let result =
            sqlx::query("INSERT INTO brands (name, description, created_at) VALUES (?1, ?2, ?3)")
                .bind(name.trim())
                .bind(description)
                .bind(now)
                .execute(&self.pool)
                .await?;

        Ok(Brand {
            id: result.last_insert_rowid(),
            name: name.trim().to_string(),
            description: description.map(str::to_string),
            created_at: now,
        })
    }

    /// Updates a brand's name and description.
    pub async fn update(&self, id: i64, name: &str, description: Option<&str>) -> DbResult<()> {
        validate_name("brand name", name)?;

        let result = sqlx::query("UPDATE brands SET name = ?2, description = ?3 WHERE id = ?1")
            .bind(id)
            .bind(name.trim())
            .bind(description)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Brand", id));
        }

        Ok(())
    }

    /// Deletes a brand. Fails with a foreign key violation while products
    /// still reference it.
    pub async fn delete(&self, id: i64) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM brands WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Brand", id));
        }

        Ok(())
    }
}

// =============================================================================
// Categories
// =============================================================================

/// Repository for category operations.
#[derive(Debug, Clone)]
pub struct CategoryRepository {
    pool: SqlitePool,
}

impl CategoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CategoryRepository { pool }
    }

    /// Lists all categories ordered by name.
    pub async fn list(&self) -> DbResult<Vec<Category>> {
        let categories = sqlx::query_as::<_, Category>(
            "SELECT id, name, description, created_at FROM categories ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(categories)
    }

    /// Gets a category by id.
    pub async fn get(&self, id: i64) -> DbResult<Option<Category>> {
        let category = sqlx::query_as::<_, Category>(
            "SELECT id, name, description, created_at FROM categories WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(category)
    }

    /// Creates a category and returns it.
    pub async fn create(&self, name: &str, description: Option<&str>) -> DbResult<Category> {
        validate_name("category name", name)?;
        debug!(name = %name, "Creating category");

        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO categories (name, description, created_at) VALUES (?1, ?2, ?3)",
        )
        .bind(name.trim())
        .bind(description)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(Category {
            id: result.last_insert_rowid(),
            name: name.trim().to_string(),
            description: description.map(str::to_string),
            created_at: now,
        })
    }

    /// Updates a category's name and description.
    pub async fn update(&self, id: i64, name: &str, description: Option<&str>) -> DbResult<()> {
        validate_name("category name", name)?;

        let result = sqlx::query("UPDATE categories SET name = ?2, description = ?3 WHERE id = ?1")
            .bind(id)
            .bind(name.trim())
            .bind(description)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Category", id));
        }

        Ok(())
    }

    /// Deletes a category.
    pub async fn delete(&self, id: i64) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM categories WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Category", id));
        }

        Ok(())
    }
}

// =============================================================================
// Taxes
// =============================================================================

/// Repository for tax rate operations.
///
/// Taxes are deactivated rather than deleted so historical order lines
/// keep their rate reference.
#[derive(Debug, Clone)]
pub struct TaxRepository {
    pool: SqlitePool,
}

impl TaxRepository {
    pub fn new(pool: SqlitePool) -> Self {
        TaxRepository { pool }
    }

    /// Lists active taxes ordered by name.
    pub async fn list_active(&self) -> DbResult<Vec<Tax>> {
        let taxes = sqlx::query_as::<_, Tax>(
            "SELECT id, name, rate_bps, is_active, created_at
             FROM taxes WHERE is_active = 1 ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(taxes)
    }

    /// Lists all taxes, active or not.
    pub async fn list(&self) -> DbResult<Vec<Tax>> {
        let taxes = sqlx::query_as::<_, Tax>(
            "SELECT id, name, rate_bps, is_active, created_at FROM taxes ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(taxes)
    }

    /// Gets a tax by id.
    pub async fn get(&self, id: i64) -> DbResult<Option<Tax>> {
        let tax = sqlx::query_as::<_, Tax>(
            "SELECT id, name, rate_bps, is_active, created_at FROM taxes WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(tax)
    }

    /// Creates a tax rate.
    pub async fn create(&self, name: &str, rate_bps: u32) -> DbResult<Tax> {
        validate_name("tax name", name)?;
        debug!(name = %name, rate_bps = rate_bps, "Creating tax");

        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO taxes (name, rate_bps, is_active, created_at) VALUES (?1, ?2, 1, ?3)",
        )
        .bind(name.trim())
        .bind(rate_bps)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(Tax {
            id: result.last_insert_rowid(),
            name: name.trim().to_string(),
            rate_bps,
            is_active: true,
            created_at: now,
        })
    }

    /// Updates a tax's name and rate.
    pub async fn update(&self, id: i64, name: &str, rate_bps: u32) -> DbResult<()> {
        validate_name("tax name", name)?;

        let result = sqlx::query("UPDATE taxes SET name = ?2, rate_bps = ?3 WHERE id = ?1")
            .bind(id)
            .bind(name.trim())
            .bind(rate_bps)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Tax", id));
        }

        Ok(())
    }

    /// Deactivates a tax (soft delete).
    pub async fn deactivate(&self, id: i64) -> DbResult<()> {
        let result = sqlx::query("UPDATE taxes SET is_active = 0 WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Tax", id));
        }

        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::pool::{Database, DbConfig};
    use crate::DbError;

    #[tokio::test]
    async fn test_brand_crud() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let brands = db.brands();

        let brand = brands.create("QuadTech", Some("House brand")).await.unwrap();
        assert!(brand.id > 0);

        brands.update(brand.id, "QuadTech Pro", None).await.unwrap();
        let fetched = brands.get(brand.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "QuadTech Pro");

        brands.delete(brand.id).await.unwrap();
        assert!(brands.get(brand.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_brand_duplicate_name() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let brands = db.brands();

        brands.create("Aero", None).await.unwrap();
        let err = brands.create("Aero", None).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_tax_deactivate() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let taxes = db.taxes();

        let tax = taxes.create("VAT", 1200).await.unwrap();
        assert_eq!(taxes.list_active().await.unwrap().len(), 1);

        taxes.deactivate(tax.id).await.unwrap();
        assert!(taxes.list_active().await.unwrap().is_empty());
        // Still present in the full listing
        assert_eq!(taxes.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_category_validation() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let err = db.categories().create("   ", None).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(_)));
    }
}
