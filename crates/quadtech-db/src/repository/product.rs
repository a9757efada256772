//! # Product Repository
//!
//! Database operations for products: search, CRUD, and guarded stock
//! adjustments. Inventory only ever moves through deltas —
//! `quantity = quantity + ?` — and the schema's CHECK constraint plus the
//! guarded WHERE clause keep it from going negative.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use quadtech_core::validation::{validate_name, validate_sku};
use quadtech_core::{CoreError, NewProduct, Product};

const PRODUCT_COLUMNS: &str = "p.id, p.brand_id, p.category_id, p.tax_id, p.name, p.sku, \
     p.model_number, p.cost_price_cents, p.sell_price_cents, p.quantity, p.is_active, \
     p.created_at, p.updated_at, \
     b.name AS brand_name, c.name AS category_name, t.name AS tax_name";

const PRODUCT_JOINS: &str = "FROM products p \
     LEFT JOIN brands b ON p.brand_id = b.id \
     LEFT JOIN categories c ON p.category_id = c.id \
     LEFT JOIN taxes t ON p.tax_id = t.id";

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Searches active products by name or SKU substring.
    ///
    /// An empty query lists active products sorted by name.
    pub async fn search(&self, query: &str, limit: u32) -> DbResult<Vec<Product>> {
        let query = query.trim();
        debug!(query = %query, limit = limit, "Searching products");

        if query.is_empty() {
            return self.list_active(limit).await;
        }

        let pattern = format!("%{query}%");
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} {PRODUCT_JOINS}
             WHERE p.is_active = 1 AND (p.name LIKE ?1 OR p.sku LIKE ?1)
             ORDER BY p.name LIMIT ?2"
        );

        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(pattern)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(products)
    }

    /// Lists active products sorted by name.
    pub async fn list_active(&self, limit: u32) -> DbResult<Vec<Product>> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} {PRODUCT_JOINS}
             WHERE p.is_active = 1 ORDER BY p.name LIMIT ?1"
        );

        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(products)
    }

    /// Gets a product by id.
    pub async fn get(&self, id: i64) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} {PRODUCT_JOINS} WHERE p.id = ?1");

        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Gets a product by SKU.
    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} {PRODUCT_JOINS} WHERE p.sku = ?1");

        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(sku)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Creates a product and returns it.
    pub async fn create(&self, input: &NewProduct) -> DbResult<Product> {
        validate_name("product name", &input.name)?;
        validate_sku(&input.sku)?;
        debug!(sku = %input.sku, "Creating product");

        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO products (
                brand_id, category_id, tax_id, name, sku, model_number,
                cost_price_cents, sell_price_cents, quantity, is_active,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 1, ?10, ?10)",
        )
        .bind(input.brand_id)
        .bind(input.category_id)
        .bind(input.tax_id)
        .bind(input.name.trim())
        .bind(input.sku.trim())
        .bind(&input.model_number)
        .bind(input.cost_price_cents)
        .bind(input.sell_price_cents)
        .bind(input.quantity)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        self.get(id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))
    }

    /// Updates a product's descriptive fields and prices.
    ///
    /// Quantity is deliberately not updatable here; stock only moves
    /// through [`adjust_stock`](Self::adjust_stock) and the workflows.
    pub async fn update(&self, id: i64, input: &NewProduct) -> DbResult<()> {
        validate_name("product name", &input.name)?;
        validate_sku(&input.sku)?;
        debug!(id = id, "Updating product");

        let result = sqlx::query(
            "UPDATE products SET
                brand_id = ?2, category_id = ?3, tax_id = ?4,
                name = ?5, sku = ?6, model_number = ?7,
                cost_price_cents = ?8, sell_price_cents = ?9,
                updated_at = ?10
             WHERE id = ?1",
        )
        .bind(id)
        .bind(input.brand_id)
        .bind(input.category_id)
        .bind(input.tax_id)
        .bind(input.name.trim())
        .bind(input.sku.trim())
        .bind(&input.model_number)
        .bind(input.cost_price_cents)
        .bind(input.sell_price_cents)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Adjusts stock by a delta (negative for issues, positive for
    /// receipts).
    ///
    /// Debits are guarded: the UPDATE only matches when enough stock is
    /// on hand, so a concurrent issue cannot take the quantity negative.
    pub async fn adjust_stock(&self, id: i64, delta: i64) -> DbResult<()> {
        debug!(id = id, delta = delta, "Adjusting stock");

        let result = sqlx::query(
            "UPDATE products
             SET quantity = quantity + ?2, updated_at = ?3
             WHERE id = ?1 AND quantity + ?2 >= 0",
        )
        .bind(id)
        .bind(delta)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // Either the product is missing or the debit would go negative.
            let product = self.get(id).await?;
            return match product {
                None => Err(DbError::not_found("Product", id)),
                Some(p) => Err(DbError::Domain(CoreError::InsufficientStock {
                    name: p.name,
                    available: p.quantity,
                    requested: -delta,
                })),
            };
        }

        Ok(())
    }

    /// Deactivates a product (soft delete).
    ///
    /// Historical order lines keep referencing it; it just stops showing
    /// up in searches.
    pub async fn deactivate(&self, id: i64) -> DbResult<()> {
        debug!(id = id, "Deactivating product");

        let result = sqlx::query("UPDATE products SET is_active = 0, updated_at = ?2 WHERE id = ?1")
            .bind(id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Lists active products at or below a stock threshold.
    pub async fn low_stock(&self, threshold: i64) -> DbResult<Vec<Product>> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} {PRODUCT_JOINS}
             WHERE p.is_active = 1 AND p.quantity <= ?1
             ORDER BY p.quantity, p.name"
        );

        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(threshold)
            .fetch_all(&self.pool)
            .await?;

        Ok(products)
    }

    /// Counts active products.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    fn sample_product(sku: &str) -> NewProduct {
        NewProduct {
            brand_id: None,
            category_id: None,
            tax_id: None,
            name: format!("Product {sku}"),
            sku: sku.to_string(),
            model_number: None,
            cost_price_cents: Some(4_000),
            sell_price_cents: 9_900,
            quantity: 10,
        }
    }

    #[tokio::test]
    async fn test_create_and_search() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let products = db.products();

        products.create(&sample_product("QX1-FRAME")).await.unwrap();
        products.create(&sample_product("QX1-PROP")).await.unwrap();

        let hits = products.search("QX1", 10).await.unwrap();
        assert_eq!(hits.len(), 2);

        let by_sku = products.get_by_sku("QX1-PROP").await.unwrap().unwrap();
        assert_eq!(by_sku.quantity, 10);

        assert_eq!(products.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_sku_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let products = db.products();

        products.create(&sample_product("DUP-1")).await.unwrap();
        let err = products.create(&sample_product("DUP-1")).await.unwrap_err();
        assert!(err.is_unique_violation_on("sku"));
    }

    #[tokio::test]
    async fn test_adjust_stock_guards_negative() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let products = db.products();

        let p = products.create(&sample_product("STK-1")).await.unwrap();

        products.adjust_stock(p.id, -4).await.unwrap();
        assert_eq!(products.get(p.id).await.unwrap().unwrap().quantity, 6);

        // Debit below zero is refused and leaves stock untouched
        let err = products.adjust_stock(p.id, -7).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InsufficientStock { available: 6, .. })
        ));
        assert_eq!(products.get(p.id).await.unwrap().unwrap().quantity, 6);
    }

    #[tokio::test]
    async fn test_deactivate_hides_from_search() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let products = db.products();

        let p = products.create(&sample_product("GONE-1")).await.unwrap();
        products.deactivate(p.id).await.unwrap();

        assert!(products.search("GONE", 10).await.unwrap().is_empty());
        // Still fetchable by id for history views
        assert!(!products.get(p.id).await.unwrap().unwrap().is_active);
    }

    #[tokio::test]
    async fn test_low_stock() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let products = db.products();

        let mut low = sample_product("LOW-1");
        low.quantity = 2;
        products.create(&low).await.unwrap();
        products.create(&sample_product("HIGH-1")).await.unwrap();

        let hits = products.low_stock(5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].sku, "LOW-1");
    }
}
