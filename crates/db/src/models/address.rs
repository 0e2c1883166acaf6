use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Address {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub label: Option<String>,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub region: Option<String>,
    pub postal_code: String,
    pub country: String,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, Validate)]
pub struct CreateAddress {
    pub label: Option<String>,
    #[validate(length(min = 1, message = "line1 must not be empty"))]
    pub line1: String,
    pub line2: Option<String>,
    #[validate(length(min = 1, message = "city must not be empty"))]
    pub city: String,
    pub region: Option<String>,
    #[validate(length(min = 1, message = "postal_code must not be empty"))]
    pub postal_code: String,
    #[validate(length(equal = 2, message = "country must be an ISO-3166 alpha-2 code"))]
    pub country: String,
    pub is_default: Option<bool>,
}

impl Address {
    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>("SELECT * FROM addresses WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_customer_id(
        pool: &SqlitePool,
        customer_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM addresses WHERE customer_id = $1 ORDER BY is_default DESC, created_at ASC",
        )
        .bind(customer_id)
        .fetch_all(pool)
        .await
    }

    pub async fn find_default(
        pool: &SqlitePool,
        customer_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM addresses WHERE customer_id = $1 AND is_default = 1",
        )
        .bind(customer_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn create<'e, E>(
        executor: E,
        id: Uuid,
        customer_id: Uuid,
        data: &CreateAddress,
        is_default: bool,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Self>(
            r#"INSERT INTO addresses
                   (id, customer_id, label, line1, line2, city, region, postal_code, country, is_default)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
               RETURNING *"#,
        )
        .bind(id)
        .bind(customer_id)
        .bind(&data.label)
        .bind(&data.line1)
        .bind(&data.line2)
        .bind(&data.city)
        .bind(&data.region)
        .bind(&data.postal_code)
        .bind(data.country.to_ascii_uppercase())
        .bind(is_default)
        .fetch_one(executor)
        .await
    }

    pub async fn update<'e, E>(
        executor: E,
        id: Uuid,
        data: &CreateAddress,
        is_default: bool,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Self>(
            r#"UPDATE addresses
               SET label = $2, line1 = $3, line2 = $4, city = $5, region = $6,
                   postal_code = $7, country = $8, is_default = $9,
                   updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING *"#,
        )
        .bind(id)
        .bind(&data.label)
        .bind(&data.line1)
        .bind(&data.line2)
        .bind(&data.city)
        .bind(&data.region)
        .bind(&data.postal_code)
        .bind(data.country.to_ascii_uppercase())
        .bind(is_default)
        .fetch_optional(executor)
        .await
    }

    /// Clear the default flag on every address of a customer.
    pub async fn clear_default<'e, E>(executor: E, customer_id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query(
            r#"UPDATE addresses
               SET is_default = 0, updated_at = datetime('now', 'subsec')
               WHERE customer_id = $1 AND is_default = 1"#,
        )
        .bind(customer_id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn set_default<'e, E>(executor: E, id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query(
            r#"UPDATE addresses
               SET is_default = 1, updated_at = datetime('now', 'subsec')
               WHERE id = $1"#,
        )
        .bind(id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM addresses WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}
