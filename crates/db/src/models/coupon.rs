use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Type, Serialize, Deserialize, PartialEq, TS, EnumString, Display)]
#[sqlx(type_name = "discount_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DiscountType {
    /// `discount_value` is a percentage (0-100) of the subtotal.
    Percentage,
    /// `discount_value` is an amount in minor units, capped at the subtotal.
    Fixed,
}

#[derive(
    Debug, Clone, Type, Serialize, Deserialize, PartialEq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "coupon_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CouponStatus {
    #[default]
    Active,
    Disabled,
    Expired,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Coupon {
    pub id: Uuid,
    pub code: String,
    pub description: Option<String>,
    pub discount_type: DiscountType,
    pub discount_value: i64,
    pub min_order_total: Option<i64>,
    pub usage_limit: Option<i64>,
    pub per_customer_limit: Option<i64>,
    pub usage_count: i64,
    pub starts_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub status: CouponStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Coupon {
    /// Discount this coupon grants against `subtotal`, never exceeding it.
    pub fn discount_for(&self, subtotal: i64) -> i64 {
        let raw = match self.discount_type {
            DiscountType::Percentage => subtotal * self.discount_value / 100,
            DiscountType::Fixed => self.discount_value,
        };
        raw.clamp(0, subtotal)
    }
}

/// Response for `POST /coupons/validate`.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CouponQuote {
    pub coupon: Coupon,
    pub discount: i64,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct CouponUsage {
    pub id: Uuid,
    pub coupon_id: Uuid,
    pub order_id: Uuid,
    pub customer_id: Option<Uuid>,
    pub discount_applied: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, Validate)]
pub struct CreateCoupon {
    #[validate(length(min = 1, message = "code must not be empty"))]
    pub code: String,
    pub description: Option<String>,
    pub discount_type: DiscountType,
    #[validate(range(min = 1, message = "discount_value must be positive"))]
    pub discount_value: i64,
    pub min_order_total: Option<i64>,
    pub usage_limit: Option<i64>,
    pub per_customer_limit: Option<i64>,
    pub starts_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, Validate)]
pub struct UpdateCoupon {
    pub description: Option<String>,
    #[validate(range(min = 1, message = "discount_value must be positive"))]
    pub discount_value: i64,
    pub min_order_total: Option<i64>,
    pub usage_limit: Option<i64>,
    pub per_customer_limit: Option<i64>,
    pub starts_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub status: Option<CouponStatus>,
}

impl Coupon {
    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>("SELECT * FROM coupons WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_code(pool: &SqlitePool, code: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>("SELECT * FROM coupons WHERE code = $1")
            .bind(code.trim().to_ascii_uppercase())
            .fetch_optional(pool)
            .await
    }

    pub async fn list(pool: &SqlitePool, limit: i64, offset: i64) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>("SELECT * FROM coupons ORDER BY created_at DESC LIMIT $1 OFFSET $2")
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    pub async fn count(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM coupons")
            .fetch_one(pool)
            .await
    }

    pub async fn create(
        pool: &SqlitePool,
        id: Uuid,
        data: &CreateCoupon,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"INSERT INTO coupons
                   (id, code, description, discount_type, discount_value, min_order_total,
                    usage_limit, per_customer_limit, starts_at, expires_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
               RETURNING *"#,
        )
        .bind(id)
        .bind(data.code.trim().to_ascii_uppercase())
        .bind(&data.description)
        .bind(&data.discount_type)
        .bind(data.discount_value)
        .bind(data.min_order_total)
        .bind(data.usage_limit)
        .bind(data.per_customer_limit)
        .bind(data.starts_at)
        .bind(data.expires_at)
        .fetch_one(pool)
        .await
    }

    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        data: &UpdateCoupon,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"UPDATE coupons
               SET description = $2, discount_value = $3, min_order_total = $4,
                   usage_limit = $5, per_customer_limit = $6, starts_at = $7, expires_at = $8,
                   status = COALESCE($9, status),
                   updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING *"#,
        )
        .bind(id)
        .bind(&data.description)
        .bind(data.discount_value)
        .bind(data.min_order_total)
        .bind(data.usage_limit)
        .bind(data.per_customer_limit)
        .bind(data.starts_at)
        .bind(data.expires_at)
        .bind(&data.status)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM coupons WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    /// Atomically claim one use. Returns false when the usage limit is
    /// already exhausted.
    pub async fn increment_usage<'e, E>(executor: E, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query(
            r#"UPDATE coupons
               SET usage_count = usage_count + 1, updated_at = datetime('now', 'subsec')
               WHERE id = $1 AND (usage_limit IS NULL OR usage_count < usage_limit)"#,
        )
        .bind(id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn decrement_usage<'e, E>(executor: E, id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query(
            r#"UPDATE coupons
               SET usage_count = MAX(usage_count - 1, 0), updated_at = datetime('now', 'subsec')
               WHERE id = $1"#,
        )
        .bind(id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    /// Flip active coupons whose window has closed to `expired`.
    pub async fn expire_stale(pool: &SqlitePool, now: DateTime<Utc>) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"UPDATE coupons
               SET status = 'expired', updated_at = datetime('now', 'subsec')
               WHERE status = 'active' AND expires_at IS NOT NULL AND expires_at <= $1"#,
        )
        .bind(now)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}

impl CouponUsage {
    pub async fn create<'e, E>(
        executor: E,
        id: Uuid,
        coupon_id: Uuid,
        order_id: Uuid,
        customer_id: Option<Uuid>,
        discount_applied: i64,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Self>(
            r#"INSERT INTO coupon_usages (id, coupon_id, order_id, customer_id, discount_applied)
               VALUES ($1, $2, $3, $4, $5)
               RETURNING *"#,
        )
        .bind(id)
        .bind(coupon_id)
        .bind(order_id)
        .bind(customer_id)
        .bind(discount_applied)
        .fetch_one(executor)
        .await
    }

    pub async fn count_by_customer(
        pool: &SqlitePool,
        coupon_id: Uuid,
        customer_id: Uuid,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM coupon_usages WHERE coupon_id = $1 AND customer_id = $2",
        )
        .bind(coupon_id)
        .bind(customer_id)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_coupon_id(
        pool: &SqlitePool,
        coupon_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM coupon_usages WHERE coupon_id = $1 ORDER BY created_at DESC",
        )
        .bind(coupon_id)
        .fetch_all(pool)
        .await
    }

    pub async fn delete_by_order_id<'e, E>(executor: E, order_id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM coupon_usages WHERE order_id = $1")
            .bind(order_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coupon(discount_type: DiscountType, value: i64) -> Coupon {
        Coupon {
            id: Uuid::new_v4(),
            code: "TEST".to_string(),
            description: None,
            discount_type,
            discount_value: value,
            min_order_total: None,
            usage_limit: None,
            per_customer_limit: None,
            usage_count: 0,
            starts_at: None,
            expires_at: None,
            status: CouponStatus::Active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn percentage_discount_floors() {
        let c = coupon(DiscountType::Percentage, 15);
        assert_eq!(c.discount_for(999), 149);
    }

    #[test]
    fn fixed_discount_is_capped_at_subtotal() {
        let c = coupon(DiscountType::Fixed, 5000);
        assert_eq!(c.discount_for(1200), 1200);
        assert_eq!(c.discount_for(8000), 5000);
    }
}
