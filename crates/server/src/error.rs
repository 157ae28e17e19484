use axum::{
    http::StatusCode,
    response::{IntoResponse, Json as ResponseJson, Response},
};
use services::services::loyalty::LoyaltyError;
use thiserror::Error;
use tracing::error;
use utils::response::ApiResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Loyalty(#[from] LoyaltyError),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Loyalty(LoyaltyError::BusinessNotFound)
            | ApiError::Loyalty(LoyaltyError::CustomerNotFound)
            | ApiError::Loyalty(LoyaltyError::RecordNotFound) => StatusCode::NOT_FOUND,
            ApiError::Loyalty(LoyaltyError::ConstraintViolation) => StatusCode::CONFLICT,
            ApiError::Loyalty(LoyaltyError::InvalidInput(_))
            | ApiError::Loyalty(LoyaltyError::RewardNotEarned) => StatusCode::BAD_REQUEST,
            ApiError::Loyalty(LoyaltyError::Database(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // Backend failures stay in the logs; clients get a generic message.
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("internal error: {self}");
            "Something went wrong. Please try again.".to_string()
        } else {
            self.to_string()
        };
        (status, ResponseJson(ApiResponse::<()>::error(&message))).into_response()
    }
}
