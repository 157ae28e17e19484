use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteExecutor};
use ts_rs::TS;
use uuid::Uuid;

/// A customer, keyed by normalized 10-digit phone number. Created lazily
/// on first check-in.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Customer {
    pub id: Uuid,
    pub phone: String,
    pub created_at: DateTime<Utc>,
}

impl Customer {
    pub async fn find_by_phone(
        executor: impl SqliteExecutor<'_>,
        phone: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as("SELECT id, phone, created_at FROM customers WHERE phone = $1")
            .bind(phone)
            .fetch_optional(executor)
            .await
    }

    /// Idempotent on phone: concurrent first check-ins for the same number
    /// resolve to a single row.
    pub async fn upsert(
        executor: impl SqliteExecutor<'_>,
        id: Uuid,
        phone: &str,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r#"INSERT INTO customers (id, phone)
               VALUES ($1, $2)
               ON CONFLICT(phone) DO UPDATE SET phone = excluded.phone
               RETURNING id, phone, created_at"#,
        )
        .bind(id)
        .bind(phone)
        .fetch_one(executor)
        .await
    }
}
