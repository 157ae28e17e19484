use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteExecutor, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

use super::business::LoyaltyType;

/// Per-(customer, business) accrual state. `current_*` counters reset on
/// redemption; `total_*` counters are monotonic.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct LoyaltyRecord {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub business_id: Uuid,
    pub current_visits: i64,
    pub current_points: i64,
    pub total_visits: i64,
    pub total_points: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LoyaltyRecord {
    /// Single idempotent upsert for a check-in: inserts the record with the
    /// granted amounts, or increments the existing one on conflict. The
    /// UNIQUE(customer_id, business_id) constraint makes concurrent
    /// check-ins safe without a prior read.
    pub async fn accrue(
        executor: impl SqliteExecutor<'_>,
        id: Uuid,
        customer_id: Uuid,
        business_id: Uuid,
        visits: i64,
        points: i64,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r#"INSERT INTO customer_loyalty
                   (id, customer_id, business_id, current_visits, current_points,
                    total_visits, total_points)
               VALUES ($1, $2, $3, $4, $5, $4, $5)
               ON CONFLICT(customer_id, business_id) DO UPDATE SET
                   current_visits = current_visits + excluded.current_visits,
                   current_points = current_points + excluded.current_points,
                   total_visits = total_visits + excluded.total_visits,
                   total_points = total_points + excluded.total_points,
                   updated_at = datetime('now', 'subsec')
               RETURNING id, customer_id, business_id, current_visits, current_points,
                         total_visits, total_points, created_at, updated_at"#,
        )
        .bind(id)
        .bind(customer_id)
        .bind(business_id)
        .bind(visits)
        .bind(points)
        .fetch_one(executor)
        .await
    }

    /// Subtract redeemed amounts from the current counters. Totals are
    /// untouched; they track lifetime accrual. The WHERE clause re-checks
    /// the balance, so a redeem racing on a stale eligibility read matches
    /// zero rows instead of driving a counter negative; `None` means the
    /// record no longer covers the amounts.
    pub async fn redeem(
        executor: impl SqliteExecutor<'_>,
        id: Uuid,
        visits: i64,
        points: i64,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"UPDATE customer_loyalty
               SET current_visits = current_visits - $2,
                   current_points = current_points - $3,
                   updated_at = datetime('now', 'subsec')
               WHERE id = $1 AND current_visits >= $2 AND current_points >= $3
               RETURNING id, customer_id, business_id, current_visits, current_points,
                         total_visits, total_points, created_at, updated_at"#,
        )
        .bind(id)
        .bind(visits)
        .bind(points)
        .fetch_optional(executor)
        .await
    }
}

/// A loyalty record joined with its business, the shape both the dashboard
/// and the directory render from.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct LoyaltyWithBusiness {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub business_id: Uuid,
    pub current_visits: i64,
    pub current_points: i64,
    pub total_visits: i64,
    pub total_points: i64,
    pub business_name: String,
    pub category: String,
    pub loyalty_type: LoyaltyType,
    pub reward_threshold: i64,
    pub next_reward: String,
}

impl LoyaltyWithBusiness {
    pub async fn find_by_phone(pool: &SqlitePool, phone: &str) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"SELECT cl.id, cl.customer_id, cl.business_id,
                      cl.current_visits, cl.current_points, cl.total_visits, cl.total_points,
                      b.name AS business_name, b.category, b.loyalty_type,
                      b.reward_threshold, b.next_reward
               FROM customer_loyalty cl
               JOIN customers c ON cl.customer_id = c.id
               JOIN businesses b ON cl.business_id = b.id
               WHERE c.phone = $1
               ORDER BY b.name"#,
        )
        .bind(phone)
        .fetch_all(pool)
        .await
    }

    pub async fn find_one(
        pool: &SqlitePool,
        customer_id: Uuid,
        business_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"SELECT cl.id, cl.customer_id, cl.business_id,
                      cl.current_visits, cl.current_points, cl.total_visits, cl.total_points,
                      b.name AS business_name, b.category, b.loyalty_type,
                      b.reward_threshold, b.next_reward
               FROM customer_loyalty cl
               JOIN businesses b ON cl.business_id = b.id
               WHERE cl.customer_id = $1 AND cl.business_id = $2"#,
        )
        .bind(customer_id)
        .bind(business_id)
        .fetch_optional(pool)
        .await
    }

    /// The counter that drives the reward for this business's loyalty type.
    pub fn current_amount(&self) -> i64 {
        match self.loyalty_type {
            LoyaltyType::VisitBased => self.current_visits,
            LoyaltyType::PointsBased => self.current_points,
        }
    }

    pub fn reward_ready(&self) -> bool {
        self.current_amount() >= self.reward_threshold
    }

    /// Progress toward the next reward, clamped to 0..=100 for display.
    pub fn progress_percent(&self) -> f64 {
        if self.reward_threshold <= 0 {
            return 0.0;
        }
        (self.current_amount() as f64 / self.reward_threshold as f64).min(1.0) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(loyalty_type: LoyaltyType, visits: i64, points: i64, threshold: i64) -> LoyaltyWithBusiness {
        LoyaltyWithBusiness {
            id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            business_id: Uuid::new_v4(),
            current_visits: visits,
            current_points: points,
            total_visits: visits,
            total_points: points,
            business_name: "Bella's Hair Studio".to_string(),
            category: "Salon".to_string(),
            loyalty_type,
            reward_threshold: threshold,
            next_reward: "Free haircut".to_string(),
        }
    }

    #[test]
    fn visit_based_progress_and_eligibility() {
        let seven_of_ten = record(LoyaltyType::VisitBased, 7, 0, 10);
        assert_eq!(seven_of_ten.progress_percent(), 70.0);
        assert!(!seven_of_ten.reward_ready());

        let ten_of_ten = record(LoyaltyType::VisitBased, 10, 0, 10);
        assert_eq!(ten_of_ten.progress_percent(), 100.0);
        assert!(ten_of_ten.reward_ready());
    }

    #[test]
    fn points_based_uses_points_counter() {
        let r = record(LoyaltyType::PointsBased, 3, 350, 500);
        assert_eq!(r.current_amount(), 350);
        assert_eq!(r.progress_percent(), 70.0);
        assert!(!r.reward_ready());
    }

    #[test]
    fn progress_is_clamped_past_the_threshold() {
        let r = record(LoyaltyType::VisitBased, 13, 0, 10);
        assert_eq!(r.progress_percent(), 100.0);
        assert!(r.reward_ready());
    }

    #[test]
    fn zero_threshold_reports_no_progress() {
        let r = record(LoyaltyType::VisitBased, 5, 0, 0);
        assert_eq!(r.progress_percent(), 0.0);
    }
}
