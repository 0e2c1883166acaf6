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
#[sqlx(type_name = "cart_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CartStatus {
    #[default]
    Open,
    Converted,
    Abandoned,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Cart {
    pub id: Uuid,
    pub customer_id: Option<Uuid>,
    pub session_token: String,
    pub status: CartStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct CartItem {
    pub id: Uuid,
    pub cart_id: Uuid,
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub quantity: i64,
    /// Price snapshot taken when the line was last touched.
    pub unit_price: i64,
    pub created_at: DateTime<Utc>,
}

/// Line item joined with its product, the shape the cart view returns.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct CartLine {
    pub id: Uuid,
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub product_name: String,
    pub quantity: i64,
    pub unit_price: i64,
    pub line_total: i64,
}

impl CartLine {
    pub async fn find_by_cart_id(
        pool: &SqlitePool,
        cart_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"SELECT ci.id, ci.product_id, ci.variant_id, p.name AS product_name,
                      ci.quantity, ci.unit_price, ci.quantity * ci.unit_price AS line_total
               FROM cart_items ci
               JOIN products p ON p.id = ci.product_id
               WHERE ci.cart_id = $1
               ORDER BY ci.created_at ASC"#,
        )
        .bind(cart_id)
        .fetch_all(pool)
        .await
    }
}

/// Response for `GET /carts/{session_token}`.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CartView {
    #[serde(flatten)]
    #[ts(flatten)]
    pub cart: Cart,
    pub lines: Vec<CartLine>,
    pub subtotal: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, Validate)]
pub struct AddCartItem {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    #[validate(range(min = 1, message = "quantity must be at least 1"))]
    pub quantity: i64,
}

impl Cart {
    pub async fn find_by_session_token(
        pool: &SqlitePool,
        session_token: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>("SELECT * FROM carts WHERE session_token = $1")
            .bind(session_token)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_open_by_customer_id(
        pool: &SqlitePool,
        customer_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM carts WHERE customer_id = $1 AND status = 'open' ORDER BY created_at DESC LIMIT 1",
        )
        .bind(customer_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn create(
        pool: &SqlitePool,
        id: Uuid,
        session_token: &str,
        customer_id: Option<Uuid>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"INSERT INTO carts (id, session_token, customer_id)
               VALUES ($1, $2, $3)
               RETURNING *"#,
        )
        .bind(id)
        .bind(session_token)
        .bind(customer_id)
        .fetch_one(pool)
        .await
    }

    pub async fn update_status<'e, E>(
        executor: E,
        id: Uuid,
        status: CartStatus,
    ) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query(
            "UPDATE carts SET status = $2, updated_at = datetime('now', 'subsec') WHERE id = $1",
        )
        .bind(id)
        .bind(status)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn attach_customer<'e, E>(
        executor: E,
        id: Uuid,
        customer_id: Uuid,
    ) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query(
            "UPDATE carts SET customer_id = $2, updated_at = datetime('now', 'subsec') WHERE id = $1",
        )
        .bind(id)
        .bind(customer_id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }
}

impl CartItem {
    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>("SELECT * FROM cart_items WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_cart_id(
        pool: &SqlitePool,
        cart_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM cart_items WHERE cart_id = $1 ORDER BY created_at ASC",
        )
        .bind(cart_id)
        .fetch_all(pool)
        .await
    }

    /// Look up an existing line for the same product/variant pair. `IS`
    /// comparison makes the NULL-variant case match.
    pub async fn find_line(
        pool: &SqlitePool,
        cart_id: Uuid,
        product_id: Uuid,
        variant_id: Option<Uuid>,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM cart_items WHERE cart_id = $1 AND product_id = $2 AND variant_id IS $3",
        )
        .bind(cart_id)
        .bind(product_id)
        .bind(variant_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn create<'e, E>(
        executor: E,
        id: Uuid,
        cart_id: Uuid,
        data: &AddCartItem,
        unit_price: i64,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Self>(
            r#"INSERT INTO cart_items (id, cart_id, product_id, variant_id, quantity, unit_price)
               VALUES ($1, $2, $3, $4, $5, $6)
               RETURNING *"#,
        )
        .bind(id)
        .bind(cart_id)
        .bind(data.product_id)
        .bind(data.variant_id)
        .bind(data.quantity)
        .bind(unit_price)
        .fetch_one(executor)
        .await
    }

    pub async fn update_quantity<'e, E>(
        executor: E,
        id: Uuid,
        quantity: i64,
        unit_price: i64,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Self>(
            r#"UPDATE cart_items SET quantity = $2, unit_price = $3 WHERE id = $1 RETURNING *"#,
        )
        .bind(id)
        .bind(quantity)
        .bind(unit_price)
        .fetch_optional(executor)
        .await
    }

    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM cart_items WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete_by_cart_id<'e, E>(executor: E, cart_id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
            .bind(cart_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}
