pub mod error;
pub mod routes;
pub mod seed;

use db::DBService;

/// Shared state handed to every route.
#[derive(Clone)]
pub struct AppState {
    pub db: DBService,
}
