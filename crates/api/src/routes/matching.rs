//! Route definitions for the match service.

use axum::routing::{delete, get, post};
use axum::Router;

use crate::handlers::matching;
use crate::state::AppState;

/// ```text
/// GET    /discovery                 -> discover
/// POST   /swipes                    -> swipe
/// GET    /matches                   -> list_matches
/// DELETE /matches/{id}              -> unmatch
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/discovery", get(matching::discover))
        .route("/swipes", post(matching::swipe))
        .route("/matches", get(matching::list_matches))
        .route("/matches/{id}", delete(matching::unmatch))
}
