//! Routes for the customer loyalty dashboard.

use axum::{
    Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::transaction::TransactionWithBusiness;
use serde::{Deserialize, Serialize};
use services::services::loyalty::{LoyaltyDashboard, LoyaltyService, RedeemRequest, RedeemResult};
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::{AppState, error::ApiError};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ActivityQuery {
    pub limit: Option<i64>,
}

/// Aggregate loyalty state for a phone number: all records plus totals.
pub async fn get_dashboard(
    State(state): State<AppState>,
    Path(phone): Path<String>,
) -> Result<ResponseJson<ApiResponse<LoyaltyDashboard>>, ApiError> {
    let dashboard = LoyaltyService::dashboard(&state.db.pool, &phone).await?;
    Ok(ResponseJson(ApiResponse::success(dashboard)))
}

/// Recent transactions for a phone number, newest first.
pub async fn get_recent_activity(
    State(state): State<AppState>,
    Path(phone): Path<String>,
    Query(query): Query<ActivityQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<TransactionWithBusiness>>>, ApiError> {
    let limit = query.limit.unwrap_or(20);
    let activity = LoyaltyService::recent_activity(&state.db.pool, &phone, limit).await?;
    Ok(ResponseJson(ApiResponse::success(activity)))
}

/// Spend an earned reward, resetting the driving counter.
pub async fn redeem_reward(
    State(state): State<AppState>,
    axum::Json(payload): axum::Json<RedeemRequest>,
) -> Result<ResponseJson<ApiResponse<RedeemResult>>, ApiError> {
    let result = LoyaltyService::redeem(&state.db.pool, &payload).await?;

    let message = format!("Redeemed: {}", result.loyalty.record.next_reward);
    Ok(ResponseJson(ApiResponse::success_with_message(
        result, &message,
    )))
}

pub fn router() -> Router<AppState> {
    Router::new().nest(
        "/loyalty",
        Router::new()
            .route("/redeem", post(redeem_reward))
            .route("/{phone}", get(get_dashboard))
            .route("/{phone}/transactions", get(get_recent_activity)),
    )
}
