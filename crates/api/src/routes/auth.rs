//! Route definitions for `/auth` and `/api-keys`.

use axum::routing::{delete, get, post};
use axum::Router;

use crate::handlers::{api_keys, auth};
use crate::state::AppState;

/// Routes mounted at `/auth`.
///
/// ```text
/// POST   /register                  -> register (public)
/// POST   /login                     -> login (public)
/// POST   /refresh                   -> refresh (public)
/// POST   /logout                    -> logout
/// GET    /me                        -> me
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
}

/// Routes mounted at `/api-keys`.
///
/// ```text
/// GET    /                          -> list_api_keys
/// POST   /                          -> create_api_key
/// DELETE /{id}                      -> revoke_api_key
/// ```
pub fn api_keys_router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(api_keys::list_api_keys).post(api_keys::create_api_key),
        )
        .route("/{id}", delete(api_keys::revoke_api_key))
}
