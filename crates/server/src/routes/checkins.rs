//! Check-in: the accrual operation behind the check-in form.

use axum::{Router, extract::State, response::Json as ResponseJson, routing::post};
use services::services::loyalty::{CheckInRequest, CheckInResult, LoyaltyService};
use utils::response::ApiResponse;

use crate::{AppState, error::ApiError};

/// Register a visit: upsert the customer and loyalty record, increment the
/// counters, and append an audit transaction.
pub async fn create_check_in(
    State(state): State<AppState>,
    axum::Json(payload): axum::Json<CheckInRequest>,
) -> Result<ResponseJson<ApiResponse<CheckInResult>>, ApiError> {
    let result = LoyaltyService::check_in(&state.db.pool, &payload).await?;

    let message = if result.visits_added > 0 {
        format!("+{} visit added to your loyalty card", result.visits_added)
    } else {
        format!("+{} points added to your account", result.points_earned)
    };

    Ok(ResponseJson(ApiResponse::success_with_message(
        result, &message,
    )))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/checkins", post(create_check_in))
}
