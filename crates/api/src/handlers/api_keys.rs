//! Handlers for personal API keys.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use kindred_core::api_keys::{generate_api_key, MAX_KEY_LIFETIME_DAYS};
use kindred_core::audit::action_types;
use kindred_core::types::DbId;
use kindred_db::models::api_key::ApiKey;
use kindred_db::models::audit::CreateAuditLog;
use kindred_db::repositories::ApiKeyRepo;
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::handlers::record_audit;
use crate::middleware::auth::AuthUser;
use crate::middleware::client::ClientInfo;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateApiKeyRequest {
    #[validate(length(min = 1, max = 100, message = "name must be 1-100 characters"))]
    pub name: String,
    /// Lifetime in days; the key never expires when omitted.
    #[validate(range(min = 1, max = 365, message = "expires_in_days must be between 1 and 365"))]
    pub expires_in_days: Option<i64>,
}

/// A newly created key. `key` is only ever returned here.
#[derive(Debug, Serialize, ToSchema)]
pub struct CreatedApiKey {
    pub id: DbId,
    pub name: String,
    pub key: String,
    pub key_prefix: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[utoipa::path(
    post,
    path = "/api/v1/api-keys",
    tag = "api-keys",
    request_body = CreateApiKeyRequest,
    responses(
        (status = 201, description = "Key created; plaintext shown once", body = DataResponse<CreatedApiKey>),
        (status = 400, description = "Invalid name or lifetime"),
    ),
    security(("bearer" = []), ("api_key" = []))
)]
pub async fn create_api_key(
    State(state): State<AppState>,
    auth_user: AuthUser,
    client: ClientInfo,
    Json(input): Json<CreateApiKeyRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<CreatedApiKey>>)> {
    input.validate()?;
    let name = input.name.trim();
    if name.is_empty() {
        return Err(AppError::validation("name must not be blank"));
    }

    let expires_at = input
        .expires_in_days
        .map(|days| Utc::now() + chrono::Duration::days(days.min(MAX_KEY_LIFETIME_DAYS)));

    let generated = generate_api_key();
    let key = ApiKeyRepo::create(
        &state.pool,
        auth_user.user_id,
        name,
        &generated.hash,
        &generated.prefix,
        expires_at,
    )
    .await?;

    record_audit(
        &state,
        &client,
        CreateAuditLog::new(action_types::API_KEY_CREATE)
            .by_user(auth_user.user_id)
            .on_entity("api_key", key.id)
            .with_details(json!({ "name": key.name, "key_prefix": key.key_prefix })),
    )
    .await?;
    tracing::info!(user_id = auth_user.user_id, api_key_id = key.id, "API key created");

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: CreatedApiKey {
                id: key.id,
                name: key.name,
                key: generated.plaintext,
                key_prefix: key.key_prefix,
                expires_at: key.expires_at,
                created_at: key.created_at,
            },
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/api-keys",
    tag = "api-keys",
    responses((status = 200, description = "Caller's keys, newest first", body = DataResponse<Vec<ApiKey>>)),
    security(("bearer" = []), ("api_key" = []))
)]
pub async fn list_api_keys(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> AppResult<Json<DataResponse<Vec<ApiKey>>>> {
    let keys = ApiKeyRepo::list_for_user(&state.pool, auth_user.user_id).await?;
    Ok(Json(DataResponse { data: keys }))
}

#[utoipa::path(
    delete,
    path = "/api/v1/api-keys/{id}",
    tag = "api-keys",
    params(("id" = i64, Path, description = "API key id")),
    responses(
        (status = 204, description = "Key revoked"),
        (status = 404, description = "No active key with this id belongs to the caller"),
    ),
    security(("bearer" = []), ("api_key" = []))
)]
pub async fn revoke_api_key(
    State(state): State<AppState>,
    auth_user: AuthUser,
    client: ClientInfo,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    if !ApiKeyRepo::revoke(&state.pool, auth_user.user_id, id).await? {
        return Err(AppError::not_found("ApiKey", id));
    }

    record_audit(
        &state,
        &client,
        CreateAuditLog::new(action_types::API_KEY_REVOKE)
            .by_user(auth_user.user_id)
            .on_entity("api_key", id),
    )
    .await?;
    tracing::info!(user_id = auth_user.user_id, api_key_id = id, "API key revoked");

    Ok(StatusCode::NO_CONTENT)
}
