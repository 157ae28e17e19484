pub mod businesses;
pub mod checkins;
pub mod loyalty;

use axum::Router;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(businesses::router())
        .merge(checkins::router())
        .merge(loyalty::router())
}
