use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Type, Serialize, Deserialize, PartialEq, TS, EnumString, Display)]
#[sqlx(type_name = "loyalty_transaction_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LoyaltyTransactionKind {
    Earn,
    Redeem,
    Adjust,
}

/// Customer segment with a lifetime-points threshold and an earn rate in
/// basis points of the order subtotal.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct LoyaltyTier {
    pub id: Uuid,
    pub name: String,
    pub min_points: i64,
    pub earn_rate_bps: i64,
    pub position: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct LoyaltyAccount {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub points_balance: i64,
    pub lifetime_points: i64,
    pub tier_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct LoyaltyTransaction {
    pub id: Uuid,
    pub account_id: Uuid,
    pub order_id: Option<Uuid>,
    pub kind: LoyaltyTransactionKind,
    /// Signed: negative for redemptions and reversing adjustments.
    pub points: i64,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Response for `GET /customers/{id}/loyalty`.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct LoyaltySummary {
    pub account: LoyaltyAccount,
    pub tier: Option<LoyaltyTier>,
    pub transactions: Vec<LoyaltyTransaction>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, Validate)]
pub struct CreateLoyaltyTier {
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: String,
    #[validate(range(min = 0, message = "min_points must not be negative"))]
    pub min_points: i64,
    #[validate(range(min = 0, message = "earn_rate_bps must not be negative"))]
    pub earn_rate_bps: i64,
    pub position: Option<i64>,
}

impl LoyaltyTier {
    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Self>("SELECT * FROM loyalty_tiers WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    pub async fn find_all<'e, E>(executor: E) -> Result<Vec<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Self>("SELECT * FROM loyalty_tiers ORDER BY min_points ASC")
            .fetch_all(executor)
            .await
    }

    /// Highest tier whose threshold is covered by `lifetime_points`.
    pub async fn tier_for_points<'e, E>(
        executor: E,
        lifetime_points: i64,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM loyalty_tiers WHERE min_points <= $1 ORDER BY min_points DESC LIMIT 1",
        )
        .bind(lifetime_points)
        .fetch_optional(executor)
        .await
    }

    pub async fn create(
        pool: &SqlitePool,
        id: Uuid,
        data: &CreateLoyaltyTier,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"INSERT INTO loyalty_tiers (id, name, min_points, earn_rate_bps, position)
               VALUES ($1, $2, $3, $4, $5)
               RETURNING *"#,
        )
        .bind(id)
        .bind(&data.name)
        .bind(data.min_points)
        .bind(data.earn_rate_bps)
        .bind(data.position.unwrap_or(0))
        .fetch_one(pool)
        .await
    }

    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        data: &CreateLoyaltyTier,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"UPDATE loyalty_tiers
               SET name = $2, min_points = $3, earn_rate_bps = $4, position = $5
               WHERE id = $1
               RETURNING *"#,
        )
        .bind(id)
        .bind(&data.name)
        .bind(data.min_points)
        .bind(data.earn_rate_bps)
        .bind(data.position.unwrap_or(0))
        .fetch_optional(pool)
        .await
    }

    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM loyalty_tiers WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn count_accounts(pool: &SqlitePool, id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM loyalty_accounts WHERE tier_id = $1")
            .bind(id)
            .fetch_one(pool)
            .await
    }
}

impl LoyaltyAccount {
    pub async fn find_by_customer_id<'e, E>(
        executor: E,
        customer_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Self>("SELECT * FROM loyalty_accounts WHERE customer_id = $1")
            .bind(customer_id)
            .fetch_optional(executor)
            .await
    }

    pub async fn create<'e, E>(
        executor: E,
        id: Uuid,
        customer_id: Uuid,
        tier_id: Option<Uuid>,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Self>(
            r#"INSERT INTO loyalty_accounts (id, customer_id, tier_id)
               VALUES ($1, $2, $3)
               RETURNING *"#,
        )
        .bind(id)
        .bind(customer_id)
        .bind(tier_id)
        .fetch_one(executor)
        .await
    }

    /// Apply a signed balance delta. `lifetime_delta` moves the lifetime
    /// counter independently so redemptions leave it untouched.
    pub async fn apply_points<'e, E>(
        executor: E,
        id: Uuid,
        balance_delta: i64,
        lifetime_delta: i64,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Self>(
            r#"UPDATE loyalty_accounts
               SET points_balance = points_balance + $2,
                   lifetime_points = MAX(lifetime_points + $3, 0),
                   updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING *"#,
        )
        .bind(id)
        .bind(balance_delta)
        .bind(lifetime_delta)
        .fetch_optional(executor)
        .await
    }

    pub async fn update_tier<'e, E>(
        executor: E,
        id: Uuid,
        tier_id: Option<Uuid>,
    ) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query(
            "UPDATE loyalty_accounts SET tier_id = $2, updated_at = datetime('now', 'subsec') WHERE id = $1",
        )
        .bind(id)
        .bind(tier_id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }
}

impl LoyaltyTransaction {
    pub async fn create<'e, E>(
        executor: E,
        id: Uuid,
        account_id: Uuid,
        order_id: Option<Uuid>,
        kind: LoyaltyTransactionKind,
        points: i64,
        note: Option<String>,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Self>(
            r#"INSERT INTO loyalty_transactions (id, account_id, order_id, kind, points, note)
               VALUES ($1, $2, $3, $4, $5, $6)
               RETURNING *"#,
        )
        .bind(id)
        .bind(account_id)
        .bind(order_id)
        .bind(kind)
        .bind(points)
        .bind(note)
        .fetch_one(executor)
        .await
    }

    pub async fn find_recent_by_account_id(
        pool: &SqlitePool,
        account_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM loyalty_transactions WHERE account_id = $1 ORDER BY created_at DESC LIMIT $2",
        )
        .bind(account_id)
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    /// Points earned for an order (0 when no earn transaction exists).
    pub async fn earned_for_order<'e, E>(
        executor: E,
        account_id: Uuid,
        order_id: Uuid,
    ) -> Result<i64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_scalar(
            r#"SELECT COALESCE(SUM(points), 0) FROM loyalty_transactions
               WHERE account_id = $1 AND order_id = $2 AND kind = 'earn'"#,
        )
        .bind(account_id)
        .bind(order_id)
        .fetch_one(executor)
        .await
    }
}
