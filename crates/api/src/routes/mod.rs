pub mod auth;
pub mod conversations;
pub mod health;
pub mod matching;
pub mod media;
pub mod notifications;
pub mod search;
pub mod users;

use axum::Router;

use crate::config::ServerConfig;
use crate::service::Service;
use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree for one service.
///
/// Route hierarchy:
///
/// ```text
/// auth           /auth/*, /api-keys/*
/// user           /users/me, /profiles/*, /subscriptions/*, /payments/me, /admin/*
/// media          /photos/*, /users/{id}/photos, /jobs/{id}
/// match          /discovery, /swipes, /matches/*
/// communication  /conversations/*, /ws
/// notification   /notifications/*
/// search         /search/profiles
/// ```
///
/// `/health` and `/api/docs` are mounted by [`crate::router`] for every service.
pub fn api_routes(service: Service, config: &ServerConfig) -> Router<AppState> {
    match service {
        Service::Auth => Router::new()
            .nest("/auth", auth::router())
            .nest("/api-keys", auth::api_keys_router()),
        Service::User => Router::new()
            .merge(users::router())
            .nest("/admin", users::admin_router()),
        Service::Media => media::router(config.media.max_upload_bytes),
        Service::Match => matching::router(),
        Service::Communication => Router::new()
            .route("/ws", axum::routing::get(ws::ws_handler))
            .nest("/conversations", conversations::router()),
        Service::Notification => Router::new().nest("/notifications", notifications::router()),
        Service::Search => Router::new().nest("/search", search::router()),
    }
}
