use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Favourite {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub product_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateFavourite {
    pub product_id: Uuid,
}

impl Favourite {
    pub async fn find_by_customer_id(
        pool: &SqlitePool,
        customer_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM favourites WHERE customer_id = $1 ORDER BY created_at DESC",
        )
        .bind(customer_id)
        .fetch_all(pool)
        .await
    }

    pub async fn find(
        pool: &SqlitePool,
        customer_id: Uuid,
        product_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM favourites WHERE customer_id = $1 AND product_id = $2",
        )
        .bind(customer_id)
        .bind(product_id)
        .fetch_optional(pool)
        .await
    }

    /// Idempotent: re-favouriting returns the existing row.
    pub async fn create(
        pool: &SqlitePool,
        id: Uuid,
        customer_id: Uuid,
        product_id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"INSERT INTO favourites (id, customer_id, product_id)
               VALUES ($1, $2, $3)
               ON CONFLICT (customer_id, product_id) DO UPDATE SET customer_id = excluded.customer_id
               RETURNING *"#,
        )
        .bind(id)
        .bind(customer_id)
        .bind(product_id)
        .fetch_one(pool)
        .await
    }

    pub async fn delete<'e, E>(
        executor: E,
        customer_id: Uuid,
        product_id: Uuid,
    ) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM favourites WHERE customer_id = $1 AND product_id = $2")
            .bind(customer_id)
            .bind(product_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}
