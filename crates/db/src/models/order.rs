use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;
use validator::Validate;

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "order_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }
}

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "payment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Refunded,
    Failed,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub customer_id: Option<Uuid>,
    pub email: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub subtotal: i64,
    pub discount_total: i64,
    pub shipping_fee: i64,
    pub tax_total: i64,
    pub total: i64,
    pub currency: String,
    pub coupon_id: Option<Uuid>,
    pub shipping_address: serde_json::Value,
    pub billing_address: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub sku: String,
    pub name: String,
    pub quantity: i64,
    pub unit_price: i64,
    pub line_total: i64,
}

/// Order plus its line items, the shape `GET /orders/{id}` returns.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct OrderWithItems {
    #[serde(flatten)]
    #[ts(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, Validate)]
pub struct CreateOrderItem {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    #[validate(range(min = 1, message = "quantity must be at least 1"))]
    pub quantity: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, Validate)]
pub struct CreateOrder {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    pub customer_id: Option<Uuid>,
    /// Explicit line items; mutually exclusive with `session_token`.
    pub items: Option<Vec<CreateOrderItem>>,
    /// Build the order from an open cart instead.
    pub session_token: Option<String>,
    pub coupon_code: Option<String>,
    pub shipping_fee: Option<i64>,
    pub tax_total: Option<i64>,
    pub shipping_address: Option<serde_json::Value>,
    pub billing_address: Option<serde_json::Value>,
}

/// Filters accepted by the order list endpoint.
#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub customer: Option<Uuid>,
}

/// Column values computed by the order service before insertion.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_number: String,
    pub customer_id: Option<Uuid>,
    pub email: String,
    pub subtotal: i64,
    pub discount_total: i64,
    pub shipping_fee: i64,
    pub tax_total: i64,
    pub total: i64,
    pub currency: String,
    pub coupon_id: Option<Uuid>,
    pub shipping_address: serde_json::Value,
    pub billing_address: serde_json::Value,
}

impl Order {
    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Self>("SELECT * FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    pub async fn list(
        pool: &SqlitePool,
        filter: &OrderFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"SELECT * FROM orders
               WHERE ($1 IS NULL OR status = $1)
                 AND ($2 IS NULL OR customer_id = $2)
               ORDER BY created_at DESC
               LIMIT $3 OFFSET $4"#,
        )
        .bind(filter.status)
        .bind(filter.customer)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
    }

    pub async fn count(pool: &SqlitePool, filter: &OrderFilter) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM orders
               WHERE ($1 IS NULL OR status = $1)
                 AND ($2 IS NULL OR customer_id = $2)"#,
        )
        .bind(filter.status)
        .bind(filter.customer)
        .fetch_one(pool)
        .await
    }

    pub async fn create<'e, E>(executor: E, id: Uuid, data: &NewOrder) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Self>(
            r#"INSERT INTO orders
                   (id, order_number, customer_id, email, subtotal, discount_total, shipping_fee,
                    tax_total, total, currency, coupon_id, shipping_address, billing_address)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
               RETURNING *"#,
        )
        .bind(id)
        .bind(&data.order_number)
        .bind(data.customer_id)
        .bind(&data.email)
        .bind(data.subtotal)
        .bind(data.discount_total)
        .bind(data.shipping_fee)
        .bind(data.tax_total)
        .bind(data.total)
        .bind(&data.currency)
        .bind(data.coupon_id)
        .bind(&data.shipping_address)
        .bind(&data.billing_address)
        .fetch_one(executor)
        .await
    }

    pub async fn update_status<'e, E>(
        executor: E,
        id: Uuid,
        status: OrderStatus,
    ) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query(
            "UPDATE orders SET status = $2, updated_at = datetime('now', 'subsec') WHERE id = $1",
        )
        .bind(id)
        .bind(status)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn update_payment_status<'e, E>(
        executor: E,
        id: Uuid,
        payment_status: PaymentStatus,
    ) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query(
            "UPDATE orders SET payment_status = $2, updated_at = datetime('now', 'subsec') WHERE id = $1",
        )
        .bind(id)
        .bind(payment_status)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }
}

impl OrderItem {
    pub async fn find_by_order_id(
        pool: &SqlitePool,
        order_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>("SELECT * FROM order_items WHERE order_id = $1 ORDER BY name ASC")
            .bind(order_id)
            .fetch_all(pool)
            .await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn create<'e, E>(
        executor: E,
        id: Uuid,
        order_id: Uuid,
        product_id: Uuid,
        variant_id: Option<Uuid>,
        sku: &str,
        name: &str,
        quantity: i64,
        unit_price: i64,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Self>(
            r#"INSERT INTO order_items
                   (id, order_id, product_id, variant_id, sku, name, quantity, unit_price, line_total)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
               RETURNING *"#,
        )
        .bind(id)
        .bind(order_id)
        .bind(product_id)
        .bind(variant_id)
        .bind(sku)
        .bind(name)
        .bind(quantity)
        .bind(unit_price)
        .bind(quantity * unit_price)
        .fetch_one(executor)
        .await
    }
}
