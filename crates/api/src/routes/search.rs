use axum::routing::get;
use axum::Router;

use crate::handlers::search;
use crate::state::AppState;

/// Routes mounted at `/search`.
pub fn router() -> Router<AppState> {
    Router::new().route("/profiles", get(search::search_profiles))
}
