//! Routes for the business directory.

use axum::{
    Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::get,
};
use db::models::business::Business;
use serde::{Deserialize, Serialize};
use services::services::loyalty::{BusinessListing, LoyaltyService};
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct DirectoryQuery {
    /// Attach this customer's progress to each listing.
    pub phone: Option<String>,
}

/// List businesses ordered by name, with per-business progress for the
/// given phone number where a loyalty record exists.
pub async fn list_businesses(
    State(state): State<AppState>,
    Query(query): Query<DirectoryQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<BusinessListing>>>, ApiError> {
    let listings = LoyaltyService::directory(&state.db.pool, query.phone.as_deref()).await?;
    Ok(ResponseJson(ApiResponse::success(listings)))
}

/// Fetch a single business.
pub async fn get_business(
    State(state): State<AppState>,
    Path(business_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Business>>, ApiError> {
    let business = LoyaltyService::business(&state.db.pool, business_id).await?;
    Ok(ResponseJson(ApiResponse::success(business)))
}

pub fn router() -> Router<AppState> {
    Router::new().nest(
        "/businesses",
        Router::new()
            .route("/", get(list_businesses))
            .route("/{business_id}", get(get_business)),
    )
}
