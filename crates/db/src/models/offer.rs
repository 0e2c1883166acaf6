use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;
use validator::Validate;

use super::coupon::DiscountType;

#[derive(
    Debug, Clone, Type, Serialize, Deserialize, PartialEq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "offer_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OfferStatus {
    #[default]
    Active,
    Disabled,
    Expired,
}

/// Time-boxed automatic discount scoped to a single product or a whole
/// category (exactly one of the two).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Offer {
    pub id: Uuid,
    pub name: String,
    pub discount_type: DiscountType,
    pub discount_value: i64,
    pub product_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub status: OfferStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, Validate)]
pub struct CreateOffer {
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: String,
    pub discount_type: DiscountType,
    #[validate(range(min = 1, message = "discount_value must be positive"))]
    pub discount_value: i64,
    pub product_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
}

impl Offer {
    /// Unit price after this offer is applied.
    pub fn apply(&self, unit_price: i64) -> i64 {
        let discount = match self.discount_type {
            DiscountType::Percentage => unit_price * self.discount_value / 100,
            DiscountType::Fixed => self.discount_value,
        };
        (unit_price - discount).max(0)
    }

    /// Best price for a product among candidate offers: product-scoped
    /// offers beat category-scoped ones; within a scope the cheapest
    /// resulting price wins. Falls back to `unit_price` with no candidates.
    pub fn best_price(unit_price: i64, offers: &[Offer]) -> i64 {
        let product_scoped = offers.iter().filter(|o| o.product_id.is_some());
        let best_product = product_scoped.map(|o| o.apply(unit_price)).min();
        if let Some(price) = best_product {
            return price;
        }
        offers
            .iter()
            .filter(|o| o.category_id.is_some())
            .map(|o| o.apply(unit_price))
            .min()
            .unwrap_or(unit_price)
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>("SELECT * FROM offers WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>("SELECT * FROM offers ORDER BY starts_at DESC")
            .fetch_all(pool)
            .await
    }

    /// Offers applicable to a product at `now`: active, inside their
    /// window, targeting the product or its category.
    pub async fn active_for_product(
        pool: &SqlitePool,
        product_id: Uuid,
        category_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"SELECT * FROM offers
               WHERE status = 'active'
                 AND starts_at <= $3
                 AND (ends_at IS NULL OR ends_at > $3)
                 AND (product_id = $1 OR ($2 IS NOT NULL AND category_id = $2))"#,
        )
        .bind(product_id)
        .bind(category_id)
        .bind(now)
        .fetch_all(pool)
        .await
    }

    pub async fn create(pool: &SqlitePool, id: Uuid, data: &CreateOffer) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"INSERT INTO offers
                   (id, name, discount_type, discount_value, product_id, category_id, starts_at, ends_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
               RETURNING *"#,
        )
        .bind(id)
        .bind(&data.name)
        .bind(&data.discount_type)
        .bind(data.discount_value)
        .bind(data.product_id)
        .bind(data.category_id)
        .bind(data.starts_at)
        .bind(data.ends_at)
        .fetch_one(pool)
        .await
    }

    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        data: &CreateOffer,
        status: Option<OfferStatus>,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"UPDATE offers
               SET name = $2, discount_type = $3, discount_value = $4, product_id = $5,
                   category_id = $6, starts_at = $7, ends_at = $8,
                   status = COALESCE($9, status),
                   updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING *"#,
        )
        .bind(id)
        .bind(&data.name)
        .bind(&data.discount_type)
        .bind(data.discount_value)
        .bind(data.product_id)
        .bind(data.category_id)
        .bind(data.starts_at)
        .bind(data.ends_at)
        .bind(status)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM offers WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    /// Flip active offers whose window has closed to `expired`.
    pub async fn expire_stale(pool: &SqlitePool, now: DateTime<Utc>) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"UPDATE offers
               SET status = 'expired', updated_at = datetime('now', 'subsec')
               WHERE status = 'active' AND ends_at IS NOT NULL AND ends_at <= $1"#,
        )
        .bind(now)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offer(
        discount_type: DiscountType,
        value: i64,
        product_id: Option<Uuid>,
        category_id: Option<Uuid>,
    ) -> Offer {
        Offer {
            id: Uuid::new_v4(),
            name: "test".to_string(),
            discount_type,
            discount_value: value,
            product_id,
            category_id,
            starts_at: Utc::now(),
            ends_at: None,
            status: OfferStatus::Active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn apply_never_goes_negative() {
        let o = offer(DiscountType::Fixed, 5000, Some(Uuid::new_v4()), None);
        assert_eq!(o.apply(1200), 0);
    }

    #[test]
    fn product_scope_beats_larger_category_discount() {
        let product = Uuid::new_v4();
        let category = Uuid::new_v4();
        let offers = vec![
            offer(DiscountType::Percentage, 10, Some(product), None),
            offer(DiscountType::Percentage, 50, None, Some(category)),
        ];
        assert_eq!(Offer::best_price(1000, &offers), 900);
    }

    #[test]
    fn cheapest_wins_within_scope() {
        let category = Uuid::new_v4();
        let offers = vec![
            offer(DiscountType::Percentage, 10, None, Some(category)),
            offer(DiscountType::Fixed, 300, None, Some(category)),
        ];
        assert_eq!(Offer::best_price(1000, &offers), 700);
    }

    #[test]
    fn no_offers_keeps_base_price() {
        assert_eq!(Offer::best_price(1000, &[]), 1000);
    }
}
