//! Loyalty accrual, aggregation, and redemption.

use std::collections::HashMap;

use db::models::{
    business::{Business, LoyaltyType},
    customer::Customer,
    loyalty::{LoyaltyRecord, LoyaltyWithBusiness},
    transaction::{Transaction, TransactionType, TransactionWithBusiness},
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::info;
use ts_rs::TS;
use utils::phone;
use uuid::Uuid;

/// Points granted per check-in at a points-based business. Fixed; there is
/// no per-business accrual rate.
pub const POINTS_PER_CHECK_IN: i64 = 50;
/// Visits granted per check-in at a visit-based business.
pub const VISITS_PER_CHECK_IN: i64 = 1;

#[derive(Debug, Error)]
pub enum LoyaltyError {
    #[error("database error: {0}")]
    Database(sqlx::Error),
    #[error("business not found")]
    BusinessNotFound,
    #[error("customer not found")]
    CustomerNotFound,
    #[error("no loyalty record for this customer and business")]
    RecordNotFound,
    #[error("a customer with this phone number already exists")]
    ConstraintViolation,
    #[error("reward threshold not reached yet")]
    RewardNotEarned,
    #[error("{0}")]
    InvalidInput(String),
}

impl From<sqlx::Error> for LoyaltyError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => Self::ConstraintViolation,
            _ => Self::Database(err),
        }
    }
}

/// Request body for a check-in.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CheckInRequest {
    pub phone: String,
    pub business_id: Uuid,
}

/// Request body for redeeming a reward.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct RedeemRequest {
    pub phone: String,
    pub business_id: Uuid,
}

/// Per-business loyalty state with display values precomputed.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct LoyaltyCard {
    pub record: LoyaltyWithBusiness,
    pub progress_percent: f64,
    pub reward_ready: bool,
}

impl From<LoyaltyWithBusiness> for LoyaltyCard {
    fn from(record: LoyaltyWithBusiness) -> Self {
        let progress_percent = record.progress_percent();
        let reward_ready = record.reward_ready();
        Self {
            record,
            progress_percent,
            reward_ready,
        }
    }
}

/// Result of a check-in: the updated card plus what this visit granted.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CheckInResult {
    pub loyalty: LoyaltyCard,
    pub points_earned: i64,
    pub visits_added: i64,
}

/// Result of a redemption: the updated card plus what was spent.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct RedeemResult {
    pub loyalty: LoyaltyCard,
    pub points_redeemed: i64,
    pub visits_redeemed: i64,
}

/// Aggregate view across all of a customer's loyalty records.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct LoyaltyDashboard {
    pub records: Vec<LoyaltyCard>,
    pub total_points: i64,
    pub total_visits: i64,
    pub rewards_available: i64,
}

/// A customer's standing at one business, attached to directory listings.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ProgressSnapshot {
    pub current_visits: i64,
    pub current_points: i64,
    pub progress_percent: f64,
    pub reward_ready: bool,
}

impl From<LoyaltyWithBusiness> for ProgressSnapshot {
    fn from(record: LoyaltyWithBusiness) -> Self {
        Self {
            current_visits: record.current_visits,
            current_points: record.current_points,
            progress_percent: record.progress_percent(),
            reward_ready: record.reward_ready(),
        }
    }
}

/// A directory entry: the business plus the caller's progress, if any.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct BusinessListing {
    pub business: Business,
    pub progress: Option<ProgressSnapshot>,
}

/// (visits, points) granted by one check-in, by loyalty type.
fn accrual_amounts(loyalty_type: LoyaltyType) -> (i64, i64) {
    match loyalty_type {
        LoyaltyType::VisitBased => (VISITS_PER_CHECK_IN, 0),
        LoyaltyType::PointsBased => (0, POINTS_PER_CHECK_IN),
    }
}

/// Pure reduction over a customer's loyalty records.
pub fn summarize(records: Vec<LoyaltyWithBusiness>) -> LoyaltyDashboard {
    let total_points = records.iter().map(|r| r.current_points).sum();
    let total_visits = records.iter().map(|r| r.current_visits).sum();
    let rewards_available = records.iter().filter(|r| r.reward_ready()).count() as i64;
    LoyaltyDashboard {
        records: records.into_iter().map(LoyaltyCard::from).collect(),
        total_points,
        total_visits,
        rewards_available,
    }
}

fn normalize_phone(raw: &str) -> Result<String, LoyaltyError> {
    let digits = phone::normalize(raw);
    if digits.len() != 10 {
        return Err(LoyaltyError::InvalidInput(
            "phone number must contain 10 digits".to_string(),
        ));
    }
    Ok(digits)
}

pub struct LoyaltyService;

impl LoyaltyService {
    /// The accrual operation behind the check-in form.
    ///
    /// Customer and loyalty rows are upserted rather than found-then-created,
    /// and the whole sequence runs in one SQL transaction, so concurrent
    /// check-ins cannot duplicate rows and a failure partway cannot leave
    /// counters and the audit log out of sync.
    pub async fn check_in(
        pool: &SqlitePool,
        payload: &CheckInRequest,
    ) -> Result<CheckInResult, LoyaltyError> {
        let digits = normalize_phone(&payload.phone)?;

        let business = Business::find_by_id(pool, payload.business_id)
            .await?
            .ok_or(LoyaltyError::BusinessNotFound)?;

        let (visits, points) = accrual_amounts(business.loyalty_type);

        let mut tx = pool.begin().await?;
        let customer = Customer::upsert(&mut *tx, Uuid::new_v4(), &digits).await?;
        let record = LoyaltyRecord::accrue(
            &mut *tx,
            Uuid::new_v4(),
            customer.id,
            business.id,
            visits,
            points,
        )
        .await?;
        Transaction::create(
            &mut *tx,
            Uuid::new_v4(),
            customer.id,
            business.id,
            TransactionType::CheckIn,
            points,
            visits,
        )
        .await?;
        tx.commit().await?;

        info!(
            business_id = %business.id,
            phone = %phone::last_four(&digits),
            current_visits = record.current_visits,
            current_points = record.current_points,
            "check-in recorded"
        );

        let record = LoyaltyWithBusiness::find_one(pool, customer.id, business.id)
            .await?
            .ok_or(LoyaltyError::RecordNotFound)?;

        Ok(CheckInResult {
            loyalty: record.into(),
            points_earned: points,
            visits_added: visits,
        })
    }

    /// Dashboard aggregation for one phone number. An unknown number simply
    /// has no records yet, so it gets an empty dashboard, not an error.
    pub async fn dashboard(
        pool: &SqlitePool,
        phone_raw: &str,
    ) -> Result<LoyaltyDashboard, LoyaltyError> {
        let digits = phone::normalize(phone_raw);
        let records = LoyaltyWithBusiness::find_by_phone(pool, &digits).await?;
        Ok(summarize(records))
    }

    /// Directory listing ordered by name, with the caller's per-business
    /// progress attached where a loyalty record exists.
    pub async fn directory(
        pool: &SqlitePool,
        phone_raw: Option<&str>,
    ) -> Result<Vec<BusinessListing>, LoyaltyError> {
        let businesses = Business::find_all(pool).await?;

        let mut progress: HashMap<Uuid, ProgressSnapshot> = HashMap::new();
        if let Some(raw) = phone_raw {
            let digits = phone::normalize(raw);
            if !digits.is_empty() {
                for record in LoyaltyWithBusiness::find_by_phone(pool, &digits).await? {
                    progress.insert(record.business_id, record.into());
                }
            }
        }

        Ok(businesses
            .into_iter()
            .map(|business| {
                let progress = progress.remove(&business.id);
                BusinessListing { business, progress }
            })
            .collect())
    }

    pub async fn business(pool: &SqlitePool, id: Uuid) -> Result<Business, LoyaltyError> {
        Business::find_by_id(pool, id)
            .await?
            .ok_or(LoyaltyError::BusinessNotFound)
    }

    /// Spend an earned reward: subtract the threshold from the driving
    /// counter and append a redeem row with negative deltas.
    pub async fn redeem(
        pool: &SqlitePool,
        payload: &RedeemRequest,
    ) -> Result<RedeemResult, LoyaltyError> {
        let digits = normalize_phone(&payload.phone)?;

        let customer = Customer::find_by_phone(pool, &digits)
            .await?
            .ok_or(LoyaltyError::CustomerNotFound)?;
        let record = LoyaltyWithBusiness::find_one(pool, customer.id, payload.business_id)
            .await?
            .ok_or(LoyaltyError::RecordNotFound)?;

        if !record.reward_ready() {
            return Err(LoyaltyError::RewardNotEarned);
        }

        let (visits, points) = match record.loyalty_type {
            LoyaltyType::VisitBased => (record.reward_threshold, 0),
            LoyaltyType::PointsBased => (0, record.reward_threshold),
        };

        let mut tx = pool.begin().await?;
        // The guarded UPDATE re-checks the balance; a concurrent redeem that
        // got there first leaves nothing to match and we bail out.
        LoyaltyRecord::redeem(&mut *tx, record.id, visits, points)
            .await?
            .ok_or(LoyaltyError::RewardNotEarned)?;
        Transaction::create(
            &mut *tx,
            Uuid::new_v4(),
            customer.id,
            record.business_id,
            TransactionType::Redeem,
            -points,
            -visits,
        )
        .await?;
        tx.commit().await?;

        info!(
            business_id = %record.business_id,
            phone = %phone::last_four(&digits),
            reward = %record.next_reward,
            "reward redeemed"
        );

        let record = LoyaltyWithBusiness::find_one(pool, customer.id, payload.business_id)
            .await?
            .ok_or(LoyaltyError::RecordNotFound)?;

        Ok(RedeemResult {
            loyalty: record.into(),
            points_redeemed: points,
            visits_redeemed: visits,
        })
    }

    /// Most recent transactions for a phone number, newest first. Unknown
    /// numbers have no activity.
    pub async fn recent_activity(
        pool: &SqlitePool,
        phone_raw: &str,
        limit: i64,
    ) -> Result<Vec<TransactionWithBusiness>, LoyaltyError> {
        let digits = phone::normalize(phone_raw);
        let Some(customer) = Customer::find_by_phone(pool, &digits).await? else {
            return Ok(Vec::new());
        };
        Ok(Transaction::find_recent_by_customer(pool, customer.id, limit).await?)
    }
}

#[cfg(test)]
mod tests {
    use db::{DBService, models::business::CreateBusiness};

    use super::*;

    async fn setup() -> DBService {
        DBService::new_in_memory().await.expect("in-memory db")
    }

    async fn create_business(
        pool: &SqlitePool,
        name: &str,
        loyalty_type: LoyaltyType,
        reward_threshold: i64,
    ) -> Business {
        Business::create(
            pool,
            &CreateBusiness {
                name: name.to_string(),
                category: "Salon".to_string(),
                address: "123 Main St, Downtown".to_string(),
                phone: "(555) 123-4567".to_string(),
                rating: 4.8,
                loyalty_type,
                reward_threshold,
                next_reward: "Free haircut".to_string(),
            },
            Uuid::new_v4(),
        )
        .await
        .expect("create business")
    }

    async fn check_in(pool: &SqlitePool, phone: &str, business_id: Uuid) -> CheckInResult {
        LoyaltyService::check_in(
            pool,
            &CheckInRequest {
                phone: phone.to_string(),
                business_id,
            },
        )
        .await
        .expect("check-in")
    }

    async fn table_count(pool: &SqlitePool, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(pool)
            .await
            .expect("count")
    }

    #[tokio::test]
    async fn first_check_in_creates_customer_record_and_transaction() {
        let db = setup().await;
        let business = create_business(&db.pool, "Bella's", LoyaltyType::VisitBased, 10).await;

        let result = check_in(&db.pool, "5551234567", business.id).await;

        assert_eq!(result.visits_added, 1);
        assert_eq!(result.points_earned, 0);
        assert_eq!(result.loyalty.record.current_visits, 1);
        assert_eq!(table_count(&db.pool, "customers").await, 1);
        assert_eq!(table_count(&db.pool, "customer_loyalty").await, 1);
        assert_eq!(table_count(&db.pool, "transactions").await, 1);
    }

    #[tokio::test]
    async fn second_check_in_increments_instead_of_duplicating() {
        let db = setup().await;
        let business = create_business(&db.pool, "Bella's", LoyaltyType::VisitBased, 10).await;

        check_in(&db.pool, "5551234567", business.id).await;
        let result = check_in(&db.pool, "5551234567", business.id).await;

        assert_eq!(result.loyalty.record.current_visits, 2);
        assert_eq!(result.loyalty.record.total_visits, 2);
        assert_eq!(table_count(&db.pool, "customers").await, 1);
        assert_eq!(table_count(&db.pool, "customer_loyalty").await, 1);
        assert_eq!(table_count(&db.pool, "transactions").await, 2);
    }

    #[tokio::test]
    async fn differently_formatted_phones_resolve_to_one_customer() {
        let db = setup().await;
        let business = create_business(&db.pool, "Bella's", LoyaltyType::VisitBased, 10).await;

        check_in(&db.pool, "(555) 123-4567", business.id).await;
        let result = check_in(&db.pool, "555.123.4567", business.id).await;

        assert_eq!(result.loyalty.record.current_visits, 2);
        assert_eq!(table_count(&db.pool, "customers").await, 1);
    }

    #[tokio::test]
    async fn visit_threshold_reached_after_exact_count() {
        let db = setup().await;
        let business = create_business(&db.pool, "Bella's", LoyaltyType::VisitBased, 3).await;

        for expected in 1..=2 {
            let result = check_in(&db.pool, "5551234567", business.id).await;
            assert_eq!(result.loyalty.record.current_visits, expected);
            assert!(!result.loyalty.reward_ready);
        }

        let result = check_in(&db.pool, "5551234567", business.id).await;
        assert_eq!(result.loyalty.record.current_visits, 3);
        assert!(result.loyalty.reward_ready);
        assert_eq!(result.loyalty.progress_percent, 100.0);
    }

    #[tokio::test]
    async fn points_business_grants_fifty_points_per_check_in() {
        let db = setup().await;
        let business = create_business(&db.pool, "Tony's", LoyaltyType::PointsBased, 500).await;

        let first = check_in(&db.pool, "5551234567", business.id).await;
        assert_eq!(first.points_earned, 50);
        assert_eq!(first.visits_added, 0);
        assert_eq!(first.loyalty.record.current_points, 50);

        let second = check_in(&db.pool, "5551234567", business.id).await;
        assert_eq!(second.loyalty.record.current_points, 100);
        assert_eq!(second.loyalty.record.current_visits, 0);
    }

    #[tokio::test]
    async fn check_in_rejects_invalid_phone() {
        let db = setup().await;
        let business = create_business(&db.pool, "Bella's", LoyaltyType::VisitBased, 10).await;

        for phone in ["", "555123"] {
            let err = LoyaltyService::check_in(
                &db.pool,
                &CheckInRequest {
                    phone: phone.to_string(),
                    business_id: business.id,
                },
            )
            .await
            .unwrap_err();
            assert!(matches!(err, LoyaltyError::InvalidInput(_)));
        }
        assert_eq!(table_count(&db.pool, "customers").await, 0);
    }

    #[tokio::test]
    async fn check_in_at_unknown_business_is_not_found() {
        let db = setup().await;

        let err = LoyaltyService::check_in(
            &db.pool,
            &CheckInRequest {
                phone: "5551234567".to_string(),
                business_id: Uuid::new_v4(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, LoyaltyError::BusinessNotFound));
    }

    #[tokio::test]
    async fn dashboard_sums_across_businesses() {
        let db = setup().await;
        let salon = create_business(&db.pool, "Bella's", LoyaltyType::VisitBased, 10).await;
        let barbershop = create_business(&db.pool, "Tony's", LoyaltyType::PointsBased, 100).await;

        for _ in 0..7 {
            check_in(&db.pool, "5551234567", salon.id).await;
        }
        for _ in 0..2 {
            check_in(&db.pool, "5551234567", barbershop.id).await;
        }

        let dashboard = LoyaltyService::dashboard(&db.pool, "(555) 123-4567")
            .await
            .expect("dashboard");

        assert_eq!(dashboard.records.len(), 2);
        assert_eq!(dashboard.total_visits, 7);
        assert_eq!(dashboard.total_points, 100);
        // Barbershop hit 100/100; salon sits at 7/10.
        assert_eq!(dashboard.rewards_available, 1);
        let salon_card = dashboard
            .records
            .iter()
            .find(|c| c.record.business_id == salon.id)
            .expect("salon card");
        assert_eq!(salon_card.progress_percent, 70.0);
        assert!(!salon_card.reward_ready);
    }

    #[tokio::test]
    async fn dashboard_for_unknown_phone_is_empty() {
        let db = setup().await;

        let dashboard = LoyaltyService::dashboard(&db.pool, "9998887777")
            .await
            .expect("dashboard");

        assert!(dashboard.records.is_empty());
        assert_eq!(dashboard.total_points, 0);
        assert_eq!(dashboard.total_visits, 0);
        assert_eq!(dashboard.rewards_available, 0);
    }

    #[tokio::test]
    async fn directory_attaches_progress_only_where_records_exist() {
        let db = setup().await;
        let salon = create_business(&db.pool, "Bella's", LoyaltyType::VisitBased, 10).await;
        create_business(&db.pool, "Tony's", LoyaltyType::PointsBased, 500).await;

        check_in(&db.pool, "5551234567", salon.id).await;

        let listings = LoyaltyService::directory(&db.pool, Some("5551234567"))
            .await
            .expect("directory");

        assert_eq!(listings.len(), 2);
        // Ordered by name: Bella's before Tony's.
        assert_eq!(listings[0].business.name, "Bella's");
        let progress = listings[0].progress.as_ref().expect("progress");
        assert_eq!(progress.current_visits, 1);
        assert!(listings[1].progress.is_none());

        let anonymous = LoyaltyService::directory(&db.pool, None)
            .await
            .expect("directory");
        assert!(anonymous.iter().all(|l| l.progress.is_none()));
    }

    #[tokio::test]
    async fn redeem_resets_counter_and_logs_transaction() {
        let db = setup().await;
        let business = create_business(&db.pool, "Bella's", LoyaltyType::VisitBased, 3).await;

        for _ in 0..4 {
            check_in(&db.pool, "5551234567", business.id).await;
        }

        let result = LoyaltyService::redeem(
            &db.pool,
            &RedeemRequest {
                phone: "5551234567".to_string(),
                business_id: business.id,
            },
        )
        .await
        .expect("redeem");

        assert_eq!(result.visits_redeemed, 3);
        assert_eq!(result.points_redeemed, 0);
        // 4 visits minus the threshold leaves 1 toward the next reward.
        assert_eq!(result.loyalty.record.current_visits, 1);
        assert_eq!(result.loyalty.record.total_visits, 4);
        assert!(!result.loyalty.reward_ready);

        let activity = LoyaltyService::recent_activity(&db.pool, "5551234567", 20)
            .await
            .expect("activity");
        assert_eq!(activity.len(), 5);
        let redeems: Vec<_> = activity
            .iter()
            .filter(|t| t.transaction_type == TransactionType::Redeem)
            .collect();
        assert_eq!(redeems.len(), 1);
        assert_eq!(redeems[0].visits_added, -3);
        assert_eq!(redeems[0].points_earned, 0);
    }

    #[tokio::test]
    async fn racing_redeems_cannot_overdraw_the_counter() {
        let db = setup().await;
        let business = create_business(&db.pool, "Bella's", LoyaltyType::VisitBased, 3).await;

        for _ in 0..3 {
            check_in(&db.pool, "5551234567", business.id).await;
        }
        let customer = Customer::find_by_phone(&db.pool, "5551234567")
            .await
            .expect("query")
            .expect("customer");

        // Both writers read the same eligible record; the first one commits.
        let stale = LoyaltyWithBusiness::find_one(&db.pool, customer.id, business.id)
            .await
            .expect("query")
            .expect("record");
        assert!(stale.reward_ready());

        LoyaltyService::redeem(
            &db.pool,
            &RedeemRequest {
                phone: "5551234567".to_string(),
                business_id: business.id,
            },
        )
        .await
        .expect("first redeem");

        // The second writer issues the update its stale read justified; the
        // balance guard must reject it rather than go negative.
        let outcome = LoyaltyRecord::redeem(&db.pool, stale.id, stale.reward_threshold, 0)
            .await
            .expect("query");
        assert!(outcome.is_none());

        let after = LoyaltyWithBusiness::find_one(&db.pool, customer.id, business.id)
            .await
            .expect("query")
            .expect("record");
        assert_eq!(after.current_visits, 0);
        assert_eq!(after.total_visits, 3);
    }

    #[tokio::test]
    async fn redeem_before_threshold_is_rejected() {
        let db = setup().await;
        let business = create_business(&db.pool, "Bella's", LoyaltyType::VisitBased, 3).await;

        check_in(&db.pool, "5551234567", business.id).await;

        let err = LoyaltyService::redeem(
            &db.pool,
            &RedeemRequest {
                phone: "5551234567".to_string(),
                business_id: business.id,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, LoyaltyError::RewardNotEarned));
    }

    #[tokio::test]
    async fn redeem_for_unknown_customer_is_not_found() {
        let db = setup().await;
        let business = create_business(&db.pool, "Bella's", LoyaltyType::VisitBased, 3).await;

        let err = LoyaltyService::redeem(
            &db.pool,
            &RedeemRequest {
                phone: "5551234567".to_string(),
                business_id: business.id,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, LoyaltyError::CustomerNotFound));
    }

    #[tokio::test]
    async fn recent_activity_is_newest_first_and_limited() {
        let db = setup().await;
        let business = create_business(&db.pool, "Tony's", LoyaltyType::PointsBased, 500).await;

        for _ in 0..5 {
            check_in(&db.pool, "5551234567", business.id).await;
        }

        let activity = LoyaltyService::recent_activity(&db.pool, "5551234567", 3)
            .await
            .expect("activity");
        assert_eq!(activity.len(), 3);
        assert!(activity.iter().all(|t| t.points_earned == 50));
        assert!(
            activity
                .windows(2)
                .all(|pair| pair[0].created_at >= pair[1].created_at)
        );
    }
}
