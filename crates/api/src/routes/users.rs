//! Route definitions for the user service: account, profiles,
//! subscriptions, payments and administration.

use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::{admin, profiles, subscriptions};
use crate::state::AppState;

/// ```text
/// GET    /users/me                  -> get_me
/// DELETE /users/me                  -> deactivate_me
/// PUT    /profiles/me               -> upsert_my_profile
/// GET    /profiles/{user_id}        -> get_profile
///
/// GET    /subscriptions/me          -> get_my_subscription
/// POST   /subscriptions             -> change_plan
/// POST   /subscriptions/me/cancel   -> cancel_my_subscription
/// GET    /payments/me               -> list_my_payments
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/users/me",
            get(profiles::get_me).delete(profiles::deactivate_me),
        )
        .route("/profiles/me", put(profiles::upsert_my_profile))
        .route("/profiles/{user_id}", get(profiles::get_profile))
        .route("/subscriptions", post(subscriptions::change_plan))
        .route("/subscriptions/me", get(subscriptions::get_my_subscription))
        .route(
            "/subscriptions/me/cancel",
            post(subscriptions::cancel_my_subscription),
        )
        .route("/payments/me", get(subscriptions::list_my_payments))
}

/// Routes mounted at `/admin`. Every handler requires the admin role.
///
/// ```text
/// GET    /users                     -> list_users
/// POST   /users/{id}/deactivate     -> deactivate_user
/// GET    /audit-logs                -> list_audit_logs
/// GET    /audit-logs/verify         -> verify_audit_chain
/// ```
pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/users", get(admin::list_users))
        .route("/users/{id}/deactivate", post(admin::deactivate_user))
        .route("/audit-logs", get(admin::list_audit_logs))
        .route("/audit-logs/verify", get(admin::verify_audit_chain))
}
