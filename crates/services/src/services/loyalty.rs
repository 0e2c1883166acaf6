use db::models::customer::Customer;
use db::models::loyalty::{
    CreateLoyaltyTier, LoyaltyAccount, LoyaltySummary, LoyaltyTier, LoyaltyTransaction,
    LoyaltyTransactionKind,
};
use db::models::order::Order;
use sqlx::{SqliteConnection, SqlitePool};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

/// Earn rate applied when no tier covers the account yet.
const DEFAULT_EARN_RATE_BPS: i64 = 100;

const SUMMARY_TRANSACTIONS: i64 = 20;

#[derive(Debug, Error)]
pub enum LoyaltyError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("customer not found")]
    CustomerNotFound,
    #[error("loyalty account not found")]
    AccountNotFound,
    #[error("tier not found")]
    TierNotFound,
    #[error("tier still has {0} accounts")]
    TierInUse(i64),
    #[error("points must be positive")]
    InvalidPoints,
    #[error("insufficient points: balance {balance}, requested {requested}")]
    InsufficientPoints { balance: i64, requested: i64 },
}

/// Points accrue on payment at the account's tier rate, in basis points
/// of the order subtotal, floored. Lifetime points only ever grow from
/// earning, so tiers are kept by redeeming.
pub struct LoyaltyService;

impl LoyaltyService {
    pub async fn get_or_create_account(
        pool: &SqlitePool,
        customer_id: Uuid,
    ) -> Result<LoyaltyAccount, LoyaltyError> {
        let mut conn = pool.acquire().await?;
        Self::account_on(&mut conn, customer_id).await
    }

    async fn account_on(
        conn: &mut SqliteConnection,
        customer_id: Uuid,
    ) -> Result<LoyaltyAccount, LoyaltyError> {
        Customer::find_by_id(&mut *conn, customer_id)
            .await?
            .ok_or(LoyaltyError::CustomerNotFound)?;
        if let Some(account) = LoyaltyAccount::find_by_customer_id(&mut *conn, customer_id).await? {
            return Ok(account);
        }
        let tier = LoyaltyTier::tier_for_points(&mut *conn, 0).await?;
        let account =
            LoyaltyAccount::create(&mut *conn, Uuid::new_v4(), customer_id, tier.map(|t| t.id))
                .await?;
        Ok(account)
    }

    pub async fn summary(
        pool: &SqlitePool,
        customer_id: Uuid,
    ) -> Result<LoyaltySummary, LoyaltyError> {
        let account = Self::get_or_create_account(pool, customer_id).await?;
        let tier = match account.tier_id {
            Some(tier_id) => LoyaltyTier::find_by_id(pool, tier_id).await?,
            None => None,
        };
        let transactions =
            LoyaltyTransaction::find_recent_by_account_id(pool, account.id, SUMMARY_TRANSACTIONS)
                .await?;
        Ok(LoyaltySummary {
            account,
            tier,
            transactions,
        })
    }

    /// Earn points for a paid order. Guest orders earn nothing. Returns
    /// the number of points granted.
    pub async fn accrue_for_order(pool: &SqlitePool, order: &Order) -> Result<i64, LoyaltyError> {
        let mut tx = pool.begin().await?;
        let points = Self::accrue_on(&mut tx, order).await?;
        tx.commit().await?;
        Ok(points)
    }

    /// Accrual on an open connection, for callers that bundle it with
    /// other writes in one transaction.
    pub async fn accrue_on(
        conn: &mut SqliteConnection,
        order: &Order,
    ) -> Result<i64, LoyaltyError> {
        let Some(customer_id) = order.customer_id else {
            return Ok(0);
        };
        let account = Self::account_on(&mut *conn, customer_id).await?;
        let rate = match account.tier_id {
            Some(tier_id) => LoyaltyTier::find_by_id(&mut *conn, tier_id)
                .await?
                .map(|t| t.earn_rate_bps)
                .unwrap_or(DEFAULT_EARN_RATE_BPS),
            None => DEFAULT_EARN_RATE_BPS,
        };
        let points = order.subtotal * rate / 10_000;
        if points <= 0 {
            return Ok(0);
        }
        let tiers = LoyaltyTier::find_all(&mut *conn).await?;

        LoyaltyTransaction::create(
            &mut *conn,
            Uuid::new_v4(),
            account.id,
            Some(order.id),
            LoyaltyTransactionKind::Earn,
            points,
            Some(format!("order {}", order.order_number)),
        )
        .await?;
        let updated = LoyaltyAccount::apply_points(&mut *conn, account.id, points, points)
            .await?
            .ok_or(LoyaltyError::AccountNotFound)?;
        let tier_id = best_tier(&tiers, updated.lifetime_points).map(|t| t.id);
        if tier_id != account.tier_id {
            LoyaltyAccount::update_tier(&mut *conn, account.id, tier_id).await?;
        }

        info!(customer_id = %customer_id, points, "accrued loyalty points");
        Ok(points)
    }

    /// Claw back points earned for a refunded order. The balance never
    /// goes negative even if some points were already spent.
    pub async fn reverse_for_order(pool: &SqlitePool, order: &Order) -> Result<i64, LoyaltyError> {
        let mut tx = pool.begin().await?;
        let earned = Self::reverse_on(&mut tx, order).await?;
        tx.commit().await?;
        Ok(earned)
    }

    /// Reversal on an open connection, mirroring [`Self::accrue_on`].
    pub async fn reverse_on(
        conn: &mut SqliteConnection,
        order: &Order,
    ) -> Result<i64, LoyaltyError> {
        let Some(customer_id) = order.customer_id else {
            return Ok(0);
        };
        let Some(account) = LoyaltyAccount::find_by_customer_id(&mut *conn, customer_id).await?
        else {
            return Ok(0);
        };
        let earned = LoyaltyTransaction::earned_for_order(&mut *conn, account.id, order.id).await?;
        if earned <= 0 {
            return Ok(0);
        }
        let balance_delta = -earned.min(account.points_balance);
        let tiers = LoyaltyTier::find_all(&mut *conn).await?;

        LoyaltyTransaction::create(
            &mut *conn,
            Uuid::new_v4(),
            account.id,
            Some(order.id),
            LoyaltyTransactionKind::Adjust,
            -earned,
            Some(format!("refund of order {}", order.order_number)),
        )
        .await?;
        let updated = LoyaltyAccount::apply_points(&mut *conn, account.id, balance_delta, -earned)
            .await?
            .ok_or(LoyaltyError::AccountNotFound)?;
        let tier_id = best_tier(&tiers, updated.lifetime_points).map(|t| t.id);
        if tier_id != account.tier_id {
            LoyaltyAccount::update_tier(&mut *conn, account.id, tier_id).await?;
        }
        Ok(earned)
    }

    /// Spend points. Lifetime points stay put, so redeeming never costs
    /// the customer their tier.
    pub async fn redeem(
        pool: &SqlitePool,
        customer_id: Uuid,
        points: i64,
        note: Option<String>,
    ) -> Result<LoyaltyAccount, LoyaltyError> {
        if points <= 0 {
            return Err(LoyaltyError::InvalidPoints);
        }
        let account = Self::get_or_create_account(pool, customer_id).await?;
        if account.points_balance < points {
            return Err(LoyaltyError::InsufficientPoints {
                balance: account.points_balance,
                requested: points,
            });
        }

        let mut tx = pool.begin().await?;
        LoyaltyTransaction::create(
            &mut *tx,
            Uuid::new_v4(),
            account.id,
            None,
            LoyaltyTransactionKind::Redeem,
            -points,
            note,
        )
        .await?;
        let updated = LoyaltyAccount::apply_points(&mut *tx, account.id, -points, 0)
            .await?
            .ok_or(LoyaltyError::AccountNotFound)?;
        tx.commit().await?;
        Ok(updated)
    }

    pub async fn create_tier(
        pool: &SqlitePool,
        data: &CreateLoyaltyTier,
    ) -> Result<LoyaltyTier, LoyaltyError> {
        Ok(LoyaltyTier::create(pool, Uuid::new_v4(), data).await?)
    }

    pub async fn update_tier(
        pool: &SqlitePool,
        id: Uuid,
        data: &CreateLoyaltyTier,
    ) -> Result<LoyaltyTier, LoyaltyError> {
        LoyaltyTier::update(pool, id, data)
            .await?
            .ok_or(LoyaltyError::TierNotFound)
    }

    pub async fn delete_tier(pool: &SqlitePool, id: Uuid) -> Result<(), LoyaltyError> {
        let accounts = LoyaltyTier::count_accounts(pool, id).await?;
        if accounts > 0 {
            return Err(LoyaltyError::TierInUse(accounts));
        }
        let rows = LoyaltyTier::delete(pool, id).await?;
        if rows == 0 {
            return Err(LoyaltyError::TierNotFound);
        }
        Ok(())
    }
}

/// Highest tier whose threshold is covered, or none when no tier fits.
fn best_tier(tiers: &[LoyaltyTier], lifetime_points: i64) -> Option<&LoyaltyTier> {
    tiers
        .iter()
        .filter(|t| t.min_points <= lifetime_points)
        .max_by_key(|t| t.min_points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;

    async fn seed_tier(
        pool: &SqlitePool,
        name: &str,
        min_points: i64,
        earn_rate_bps: i64,
    ) -> LoyaltyTier {
        LoyaltyService::create_tier(
            pool,
            &CreateLoyaltyTier {
                name: name.to_string(),
                min_points,
                earn_rate_bps,
                position: None,
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn accrue_uses_tier_rate_and_promotes() {
        let pool = memory_pool().await;
        let bronze = seed_tier(&pool, "Bronze", 0, 100).await;
        let silver = seed_tier(&pool, "Silver", 100, 200).await;
        let customer = seed_customer(&pool).await;

        // 12000 minor units at 100 bps -> 120 points, enough for Silver.
        let order = seed_order(&pool, Some(customer.id), 12_000).await;
        let points = LoyaltyService::accrue_for_order(&pool, &order).await.unwrap();
        assert_eq!(points, 120);

        let account = LoyaltyAccount::find_by_customer_id(&pool, customer.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(account.points_balance, 120);
        assert_eq!(account.lifetime_points, 120);
        assert_eq!(account.tier_id, Some(silver.id));
        assert_ne!(account.tier_id, Some(bronze.id));
    }

    #[tokio::test]
    async fn guest_orders_earn_nothing() {
        let pool = memory_pool().await;
        let order = seed_order(&pool, None, 10_000).await;
        assert_eq!(
            LoyaltyService::accrue_for_order(&pool, &order).await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn redeem_requires_sufficient_balance() {
        let pool = memory_pool().await;
        let customer = seed_customer(&pool).await;
        let order = seed_order(&pool, Some(customer.id), 10_000).await;
        LoyaltyService::accrue_for_order(&pool, &order).await.unwrap();

        let err = LoyaltyService::redeem(&pool, customer.id, 500, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LoyaltyError::InsufficientPoints {
                balance: 100,
                requested: 500
            }
        ));

        let account = LoyaltyService::redeem(&pool, customer.id, 40, None)
            .await
            .unwrap();
        assert_eq!(account.points_balance, 60);
        assert_eq!(account.lifetime_points, 100);
    }

    #[tokio::test]
    async fn reverse_clamps_balance_at_zero() {
        let pool = memory_pool().await;
        let customer = seed_customer(&pool).await;
        let order = seed_order(&pool, Some(customer.id), 10_000).await;
        LoyaltyService::accrue_for_order(&pool, &order).await.unwrap();
        LoyaltyService::redeem(&pool, customer.id, 80, None)
            .await
            .unwrap();

        let reversed = LoyaltyService::reverse_for_order(&pool, &order).await.unwrap();
        assert_eq!(reversed, 100);

        let account = LoyaltyAccount::find_by_customer_id(&pool, customer.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(account.points_balance, 0);
        assert_eq!(account.lifetime_points, 0);
    }

    #[tokio::test]
    async fn delete_tier_with_accounts_is_rejected() {
        let pool = memory_pool().await;
        let bronze = seed_tier(&pool, "Bronze", 0, 100).await;
        let customer = seed_customer(&pool).await;
        LoyaltyService::get_or_create_account(&pool, customer.id)
            .await
            .unwrap();

        let err = LoyaltyService::delete_tier(&pool, bronze.id)
            .await
            .unwrap_err();
        assert!(matches!(err, LoyaltyError::TierInUse(1)));
    }
}
