use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

/// Accrual mode for a business. Every consumer matches exhaustively on
/// both variants.
#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display)]
#[sqlx(type_name = "loyalty_type", rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum LoyaltyType {
    VisitBased,
    PointsBased,
}

/// A participating business. Read-mostly reference data; rows are never
/// mutated by the application after seeding.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Business {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    pub address: String,
    pub phone: String,
    pub rating: f64,
    pub loyalty_type: LoyaltyType,
    pub reward_threshold: i64,
    pub next_reward: String,
    pub created_at: DateTime<Utc>,
}

/// Data for inserting a business.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateBusiness {
    pub name: String,
    pub category: String,
    pub address: String,
    pub phone: String,
    pub rating: f64,
    pub loyalty_type: LoyaltyType,
    pub reward_threshold: i64,
    pub next_reward: String,
}

impl Business {
    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"SELECT id, name, category, address, phone, rating, loyalty_type,
                      reward_threshold, next_reward, created_at
               FROM businesses
               ORDER BY name"#,
        )
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"SELECT id, name, category, address, phone, rating, loyalty_type,
                      reward_threshold, next_reward, created_at
               FROM businesses
               WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn create(
        pool: &SqlitePool,
        data: &CreateBusiness,
        id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r#"INSERT INTO businesses
                   (id, name, category, address, phone, rating, loyalty_type,
                    reward_threshold, next_reward)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
               RETURNING id, name, category, address, phone, rating, loyalty_type,
                         reward_threshold, next_reward, created_at"#,
        )
        .bind(id)
        .bind(&data.name)
        .bind(&data.category)
        .bind(&data.address)
        .bind(&data.phone)
        .bind(data.rating)
        .bind(data.loyalty_type)
        .bind(data.reward_threshold)
        .bind(&data.next_reward)
        .fetch_one(pool)
        .await
    }

    pub async fn count(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM businesses")
            .fetch_one(pool)
            .await
    }
}
