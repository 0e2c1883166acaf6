use chrono::{DateTime, Utc};
use db::models::coupon::{Coupon, CouponQuote, CouponStatus, CouponUsage, CreateCoupon};
use sqlx::SqlitePool;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum CouponError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("coupon not found")]
    NotFound,
    #[error("coupon code already exists")]
    CodeTaken,
    #[error("coupon is disabled")]
    Disabled,
    #[error("coupon is not active yet")]
    NotStarted,
    #[error("coupon has expired")]
    Expired,
    #[error("order subtotal is below the coupon minimum of {required}")]
    MinOrderNotMet { required: i64 },
    #[error("coupon usage limit reached")]
    Exhausted,
    #[error("coupon already used the maximum number of times by this customer")]
    CustomerLimitReached,
}

pub struct CouponService;

impl CouponService {
    pub async fn create(pool: &SqlitePool, data: &CreateCoupon) -> Result<Coupon, CouponError> {
        if Coupon::find_by_code(pool, &data.code).await?.is_some() {
            return Err(CouponError::CodeTaken);
        }
        Ok(Coupon::create(pool, Uuid::new_v4(), data).await?)
    }

    /// Check a code against a prospective order. Checks run in a fixed
    /// order so clients get the most specific failure: existence, status,
    /// time window, minimum subtotal, global limit, per-customer limit.
    pub async fn validate(
        pool: &SqlitePool,
        code: &str,
        customer_id: Option<Uuid>,
        subtotal: i64,
        now: DateTime<Utc>,
    ) -> Result<CouponQuote, CouponError> {
        let coupon = Coupon::find_by_code(pool, code)
            .await?
            .ok_or(CouponError::NotFound)?;
        match coupon.status {
            CouponStatus::Active => {}
            CouponStatus::Disabled => return Err(CouponError::Disabled),
            CouponStatus::Expired => return Err(CouponError::Expired),
        }
        if let Some(starts_at) = coupon.starts_at {
            if starts_at > now {
                return Err(CouponError::NotStarted);
            }
        }
        if let Some(expires_at) = coupon.expires_at {
            if expires_at <= now {
                return Err(CouponError::Expired);
            }
        }
        if let Some(required) = coupon.min_order_total {
            if subtotal < required {
                return Err(CouponError::MinOrderNotMet { required });
            }
        }
        if let Some(limit) = coupon.usage_limit {
            if coupon.usage_count >= limit {
                return Err(CouponError::Exhausted);
            }
        }
        if let (Some(limit), Some(customer_id)) = (coupon.per_customer_limit, customer_id) {
            let used = CouponUsage::count_by_customer(pool, coupon.id, customer_id).await?;
            if used >= limit {
                return Err(CouponError::CustomerLimitReached);
            }
        }

        let discount = coupon.discount_for(subtotal);
        Ok(CouponQuote { coupon, discount })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use chrono::Duration;
    use db::models::coupon::DiscountType;

    fn new_coupon(code: &str) -> CreateCoupon {
        CreateCoupon {
            code: code.to_string(),
            description: None,
            discount_type: DiscountType::Percentage,
            discount_value: 10,
            min_order_total: None,
            usage_limit: None,
            per_customer_limit: None,
            starts_at: None,
            expires_at: None,
        }
    }

    #[tokio::test]
    async fn code_is_stored_uppercase_and_unique() {
        let pool = memory_pool().await;
        let coupon = CouponService::create(&pool, &new_coupon("welcome10"))
            .await
            .unwrap();
        assert_eq!(coupon.code, "WELCOME10");

        let err = CouponService::create(&pool, &new_coupon("WELCOME10"))
            .await
            .unwrap_err();
        assert!(matches!(err, CouponError::CodeTaken));
    }

    #[tokio::test]
    async fn validate_rejects_below_min_order() {
        let pool = memory_pool().await;
        let mut data = new_coupon("BIG");
        data.min_order_total = Some(5000);
        CouponService::create(&pool, &data).await.unwrap();

        let err = CouponService::validate(&pool, "BIG", None, 4999, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, CouponError::MinOrderNotMet { required: 5000 }));

        let quote = CouponService::validate(&pool, "BIG", None, 5000, Utc::now())
            .await
            .unwrap();
        assert_eq!(quote.discount, 500);
    }

    #[tokio::test]
    async fn validate_rejects_outside_window() {
        let pool = memory_pool().await;
        let now = Utc::now();
        let mut data = new_coupon("SOON");
        data.starts_at = Some(now + Duration::hours(1));
        CouponService::create(&pool, &data).await.unwrap();
        let err = CouponService::validate(&pool, "SOON", None, 1000, now)
            .await
            .unwrap_err();
        assert!(matches!(err, CouponError::NotStarted));

        let mut data = new_coupon("GONE");
        data.expires_at = Some(now - Duration::hours(1));
        CouponService::create(&pool, &data).await.unwrap();
        let err = CouponService::validate(&pool, "GONE", None, 1000, now)
            .await
            .unwrap_err();
        assert!(matches!(err, CouponError::Expired));
    }

    #[tokio::test]
    async fn validate_enforces_per_customer_limit() {
        let pool = memory_pool().await;
        let customer = seed_customer(&pool).await;
        let mut data = new_coupon("ONCE");
        data.per_customer_limit = Some(1);
        let coupon = CouponService::create(&pool, &data).await.unwrap();

        let order = seed_order(&pool, Some(customer.id), 2000).await;
        CouponUsage::create(&pool, Uuid::new_v4(), coupon.id, order.id, Some(customer.id), 200)
            .await
            .unwrap();

        let err = CouponService::validate(&pool, "ONCE", Some(customer.id), 2000, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, CouponError::CustomerLimitReached));

        // A different customer is unaffected.
        let other = seed_customer(&pool).await;
        CouponService::validate(&pool, "ONCE", Some(other.id), 2000, Utc::now())
            .await
            .unwrap();
    }
}
