use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteExecutor, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

/// What a transaction row records.
#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display)]
#[sqlx(type_name = "transaction_type", rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum TransactionType {
    CheckIn,
    Redeem,
}

/// Append-only audit log entry. Amounts are signed deltas, so redeem rows
/// carry negative values and the log sums to the current balance.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Transaction {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub business_id: Uuid,
    pub transaction_type: TransactionType,
    pub points_earned: i64,
    pub visits_added: i64,
    pub created_at: DateTime<Utc>,
}

/// Transaction joined with the business name, for the activity feed.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct TransactionWithBusiness {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub business_id: Uuid,
    pub transaction_type: TransactionType,
    pub points_earned: i64,
    pub visits_added: i64,
    pub created_at: DateTime<Utc>,
    pub business_name: String,
}

impl Transaction {
    pub async fn create(
        executor: impl SqliteExecutor<'_>,
        id: Uuid,
        customer_id: Uuid,
        business_id: Uuid,
        transaction_type: TransactionType,
        points_earned: i64,
        visits_added: i64,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r#"INSERT INTO transactions
                   (id, customer_id, business_id, transaction_type, points_earned, visits_added)
               VALUES ($1, $2, $3, $4, $5, $6)
               RETURNING id, customer_id, business_id, transaction_type,
                         points_earned, visits_added, created_at"#,
        )
        .bind(id)
        .bind(customer_id)
        .bind(business_id)
        .bind(transaction_type)
        .bind(points_earned)
        .bind(visits_added)
        .fetch_one(executor)
        .await
    }

    pub async fn find_recent_by_customer(
        pool: &SqlitePool,
        customer_id: Uuid,
        limit: i64,
    ) -> Result<Vec<TransactionWithBusiness>, sqlx::Error> {
        sqlx::query_as(
            r#"SELECT t.id, t.customer_id, t.business_id, t.transaction_type,
                      t.points_earned, t.visits_added, t.created_at,
                      b.name AS business_name
               FROM transactions t
               JOIN businesses b ON t.business_id = b.id
               WHERE t.customer_id = $1
               ORDER BY t.created_at DESC
               LIMIT $2"#,
        )
        .bind(customer_id)
        .bind(limit)
        .fetch_all(pool)
        .await
    }
}
