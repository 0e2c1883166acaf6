use std::time::Duration;

use chrono::Utc;
use db::models::coupon::Coupon;
use db::models::offer::Offer;
use sqlx::SqlitePool;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

const POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Background task that flips coupons and offers past their window to
/// `expired`. Read paths also check timestamps, so the sweep only keeps
/// the stored status and listings honest.
pub struct ExpirySweeper {
    pool: SqlitePool,
}

impl ExpirySweeper {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(POLL_INTERVAL);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if let Err(e) = self.sweep().await {
                    error!("expiry sweep failed: {e}");
                }
            }
        })
    }

    pub async fn sweep(&self) -> Result<(), sqlx::Error> {
        let now = Utc::now();
        let coupons = Coupon::expire_stale(&self.pool, now).await?;
        let offers = Offer::expire_stale(&self.pool, now).await?;
        if coupons + offers > 0 {
            info!(coupons, offers, "expired stale promotions");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use chrono::Duration;
    use db::models::coupon::{CouponStatus, CreateCoupon, DiscountType};
    use db::models::offer::{CreateOffer, OfferStatus};
    use uuid::Uuid;

    #[tokio::test]
    async fn sweep_expires_closed_windows_only() {
        let pool = memory_pool().await;
        let now = Utc::now();

        let stale = Coupon::create(
            &pool,
            Uuid::new_v4(),
            &CreateCoupon {
                code: "OLD".to_string(),
                description: None,
                discount_type: DiscountType::Fixed,
                discount_value: 100,
                min_order_total: None,
                usage_limit: None,
                per_customer_limit: None,
                starts_at: None,
                expires_at: Some(now - Duration::hours(1)),
            },
        )
        .await
        .unwrap();
        let fresh = Coupon::create(
            &pool,
            Uuid::new_v4(),
            &CreateCoupon {
                code: "FRESH".to_string(),
                description: None,
                discount_type: DiscountType::Fixed,
                discount_value: 100,
                min_order_total: None,
                usage_limit: None,
                per_customer_limit: None,
                starts_at: None,
                expires_at: Some(now + Duration::hours(1)),
            },
        )
        .await
        .unwrap();
        let product = seed_product(&pool, "Mug", 900).await;
        let ended = Offer::create(
            &pool,
            Uuid::new_v4(),
            &CreateOffer {
                name: "Flash sale".to_string(),
                discount_type: DiscountType::Percentage,
                discount_value: 20,
                product_id: Some(product.id),
                category_id: None,
                starts_at: now - Duration::hours(2),
                ends_at: Some(now - Duration::hours(1)),
            },
        )
        .await
        .unwrap();

        ExpirySweeper::new(pool.clone()).sweep().await.unwrap();

        let stale = Coupon::find_by_id(&pool, stale.id).await.unwrap().unwrap();
        assert_eq!(stale.status, CouponStatus::Expired);
        let fresh = Coupon::find_by_id(&pool, fresh.id).await.unwrap().unwrap();
        assert_eq!(fresh.status, CouponStatus::Active);
        let ended = Offer::find_by_id(&pool, ended.id).await.unwrap().unwrap();
        assert_eq!(ended.status, OfferStatus::Expired);
    }
}
