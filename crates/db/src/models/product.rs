use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;
use validator::Validate;

#[derive(
    Debug, Clone, Type, Serialize, Deserialize, PartialEq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "product_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ProductStatus {
    Draft,
    #[default]
    Active,
    Archived,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Product {
    pub id: Uuid,
    pub sku: String,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    /// Minor units of `currency`.
    pub price: i64,
    pub compare_at_price: Option<i64>,
    pub currency: String,
    pub category_id: Option<Uuid>,
    pub status: ProductStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct ProductVariant {
    pub id: Uuid,
    pub product_id: Uuid,
    pub sku: String,
    pub name: String,
    pub price_override: Option<i64>,
    pub inventory_quantity: i64,
    pub position: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductVariant {
    /// Effective unit price before offers are applied.
    pub fn unit_price(&self, product: &Product) -> i64 {
        self.price_override.unwrap_or(product.price)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, Validate)]
pub struct CreateProduct {
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: String,
    pub sku: Option<String>,
    pub description: Option<String>,
    #[validate(range(min = 0, message = "price must not be negative"))]
    pub price: i64,
    pub compare_at_price: Option<i64>,
    pub currency: Option<String>,
    pub category_id: Option<Uuid>,
    pub status: Option<ProductStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, Validate)]
pub struct UpdateProduct {
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: String,
    pub description: Option<String>,
    #[validate(range(min = 0, message = "price must not be negative"))]
    pub price: i64,
    pub compare_at_price: Option<i64>,
    pub category_id: Option<Uuid>,
    pub status: Option<ProductStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, Validate)]
pub struct CreateProductVariant {
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: String,
    pub sku: Option<String>,
    pub price_override: Option<i64>,
    #[validate(range(min = 0, message = "inventory must not be negative"))]
    pub inventory_quantity: Option<i64>,
    pub position: Option<i64>,
}

/// Filters accepted by the product list endpoint.
#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct ProductFilter {
    pub category: Option<Uuid>,
    pub status: Option<ProductStatus>,
    pub search: Option<String>,
}

impl Product {
    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>("SELECT * FROM products WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_slug(pool: &SqlitePool, slug: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>("SELECT * FROM products WHERE slug = $1")
            .bind(slug)
            .fetch_optional(pool)
            .await
    }

    /// Paginated listing. Archived products are excluded unless the filter
    /// asks for them explicitly.
    pub async fn list(
        pool: &SqlitePool,
        filter: &ProductFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let search = filter.search.as_ref().map(|s| format!("%{}%", s));
        sqlx::query_as::<_, Self>(
            r#"SELECT * FROM products
               WHERE ($1 IS NULL OR category_id = $1)
                 AND (($2 IS NULL AND status != 'archived') OR status = $2)
                 AND ($3 IS NULL OR name LIKE $3)
               ORDER BY created_at DESC
               LIMIT $4 OFFSET $5"#,
        )
        .bind(filter.category)
        .bind(&filter.status)
        .bind(&search)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
    }

    pub async fn count(pool: &SqlitePool, filter: &ProductFilter) -> Result<i64, sqlx::Error> {
        let search = filter.search.as_ref().map(|s| format!("%{}%", s));
        sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM products
               WHERE ($1 IS NULL OR category_id = $1)
                 AND (($2 IS NULL AND status != 'archived') OR status = $2)
                 AND ($3 IS NULL OR name LIKE $3)"#,
        )
        .bind(filter.category)
        .bind(&filter.status)
        .bind(&search)
        .fetch_one(pool)
        .await
    }

    pub async fn create(
        pool: &SqlitePool,
        id: Uuid,
        data: &CreateProduct,
        sku: &str,
        slug: &str,
    ) -> Result<Self, sqlx::Error> {
        let status = data.status.clone().unwrap_or_default();
        sqlx::query_as::<_, Self>(
            r#"INSERT INTO products
                   (id, sku, name, slug, description, price, compare_at_price, currency, category_id, status)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
               RETURNING *"#,
        )
        .bind(id)
        .bind(sku)
        .bind(&data.name)
        .bind(slug)
        .bind(&data.description)
        .bind(data.price)
        .bind(data.compare_at_price)
        .bind(data.currency.as_deref().unwrap_or("USD"))
        .bind(data.category_id)
        .bind(status)
        .fetch_one(pool)
        .await
    }

    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        data: &UpdateProduct,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"UPDATE products
               SET name = $2, description = $3, price = $4, compare_at_price = $5,
                   category_id = $6, status = COALESCE($7, status),
                   updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING *"#,
        )
        .bind(id)
        .bind(&data.name)
        .bind(&data.description)
        .bind(data.price)
        .bind(data.compare_at_price)
        .bind(data.category_id)
        .bind(&data.status)
        .fetch_optional(pool)
        .await
    }

    /// Soft delete: archived products disappear from default listings but
    /// stay referenceable from order history.
    pub async fn archive(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE products SET status = 'archived', updated_at = datetime('now', 'subsec') WHERE id = $1",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}

impl ProductVariant {
    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>("SELECT * FROM product_variants WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_product_id(
        pool: &SqlitePool,
        product_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM product_variants WHERE product_id = $1 ORDER BY position ASC, created_at ASC",
        )
        .bind(product_id)
        .fetch_all(pool)
        .await
    }

    pub async fn create(
        pool: &SqlitePool,
        id: Uuid,
        product_id: Uuid,
        data: &CreateProductVariant,
        sku: &str,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"INSERT INTO product_variants
                   (id, product_id, sku, name, price_override, inventory_quantity, position)
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               RETURNING *"#,
        )
        .bind(id)
        .bind(product_id)
        .bind(sku)
        .bind(&data.name)
        .bind(data.price_override)
        .bind(data.inventory_quantity.unwrap_or(0))
        .bind(data.position.unwrap_or(0))
        .fetch_one(pool)
        .await
    }

    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        data: &CreateProductVariant,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"UPDATE product_variants
               SET name = $2, price_override = $3, inventory_quantity = $4, position = $5,
                   updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING *"#,
        )
        .bind(id)
        .bind(&data.name)
        .bind(data.price_override)
        .bind(data.inventory_quantity.unwrap_or(0))
        .bind(data.position.unwrap_or(0))
        .fetch_optional(pool)
        .await
    }

    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM product_variants WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}
