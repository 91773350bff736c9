//! Authentication extractor for Axum handlers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use kindred_core::api_keys::{hash_api_key, looks_like_api_key};
use kindred_core::types::DbId;
use kindred_db::repositories::{ApiKeyRepo, UserRepo};

use crate::auth::jwt::validate_token;
use crate::error::AppError;
use crate::state::AppState;

/// Header carrying a personal API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Authenticated caller.
///
/// Accepts `Authorization: Bearer <jwt>` or `X-Api-Key: <key>`. Either way the
/// account must still be active.
///
/// ```ignore
/// async fn my_handler(user: AuthUser) -> AppResult<Json<()>> {
///     tracing::info!(user_id = user.user_id, role = %user.role, "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: DbId,
    /// The user's role name (e.g. `"admin"`, `"member"`).
    pub role: String,
    /// Set when the request authenticated with an API key.
    pub api_key_id: Option<DbId>,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(key) = parts
            .headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            return authenticate_api_key(state, key.trim()).await;
        }

        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::unauthorized("Missing Authorization header"))?;

        let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
            AppError::unauthorized("Invalid Authorization format. Expected: Bearer <token>")
        })?;

        let user = authenticate_bearer(state, token).await?;
        Ok(user)
    }
}

/// Validate a JWT and confirm the account is still active.
pub async fn authenticate_bearer(state: &AppState, token: &str) -> Result<AuthUser, AppError> {
    let claims = validate_token(token, &state.config.jwt)
        .map_err(|_| AppError::unauthorized("Invalid or expired token"))?;

    if !UserRepo::is_active(&state.pool, claims.sub).await? {
        return Err(AppError::unauthorized("Account is no longer active"));
    }
    UserRepo::touch_last_active(&state.pool, claims.sub).await?;

    Ok(AuthUser {
        user_id: claims.sub,
        role: claims.role,
        api_key_id: None,
    })
}

async fn authenticate_api_key(state: &AppState, key: &str) -> Result<AuthUser, AppError> {
    if !looks_like_api_key(key) {
        return Err(AppError::unauthorized("Invalid API key"));
    }

    let owner = ApiKeyRepo::find_owner_by_hash(&state.pool, &hash_api_key(key))
        .await?
        .ok_or_else(|| AppError::unauthorized("Invalid, revoked or expired API key"))?;

    ApiKeyRepo::touch_last_used(&state.pool, owner.api_key_id).await?;
    UserRepo::touch_last_active(&state.pool, owner.user_id).await?;

    Ok(AuthUser {
        user_id: owner.user_id,
        role: owner.role,
        api_key_id: Some(owner.api_key_id),
    })
}
