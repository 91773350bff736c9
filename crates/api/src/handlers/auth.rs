//! Handlers for the `/auth` resource (register, login, refresh, logout, me).

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use kindred_core::audit::action_types;
use kindred_core::roles::ROLE_MEMBER;
use kindred_core::types::DbId;
use kindred_db::models::audit::CreateAuditLog;
use kindred_db::models::session::CreateSession;
use kindred_db::models::user::{CreateUser, UserResponse};
use kindred_db::repositories::{RoleRepo, SessionRepo, SubscriptionRepo, UserRepo};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;
use validator::Validate;

use crate::auth::jwt::{generate_access_token, generate_refresh_token, hash_refresh_token};
use crate::auth::password::{
    hash_password, validate_password_strength, verify_password, MIN_PASSWORD_LENGTH,
};
use crate::error::{AppError, AppResult};
use crate::handlers::{record_audit, record_audit_in_tx};
use crate::middleware::auth::AuthUser;
use crate::middleware::client::ClientInfo;
use crate::response::DataResponse;
use crate::state::AppState;

/// Maximum consecutive failed login attempts before locking the account.
const MAX_FAILED_ATTEMPTS: i32 = 5;

/// Duration in minutes to lock an account after exceeding failed attempts.
const LOCK_DURATION_MINS: i64 = 15;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(email(message = "email must be a valid address"))]
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Successful authentication response returned by register, login and refresh.
#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    pub user: UserInfo,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserInfo {
    pub id: DbId,
    pub email: String,
    pub role: String,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Create a member account with a free subscription and sign it in.
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 400, description = "Invalid email or weak password"),
        (status = 409, description = "Email already registered"),
    )
)]
pub async fn register(
    State(state): State<AppState>,
    client: ClientInfo,
    Json(input): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    input.validate()?;
    validate_password_strength(&input.password, MIN_PASSWORD_LENGTH)
        .map_err(AppError::validation)?;

    let email = input.email.trim().to_lowercase();
    let password_hash = hash_password(&input.password)
        .map_err(|e| AppError::InternalError(format!("Password hashing error: {e}")))?;

    let role = RoleRepo::find_by_name(&state.pool, ROLE_MEMBER)
        .await?
        .ok_or_else(|| AppError::InternalError("member role is missing".into()))?;

    // Account, free plan and audit entry land together or not at all.
    let mut tx = state.pool.begin().await?;
    let user = UserRepo::create(
        &mut *tx,
        &CreateUser {
            email,
            password_hash,
            role_id: role.id,
        },
    )
    .await?;
    SubscriptionRepo::create_free(&mut *tx, user.id).await?;
    record_audit_in_tx(
        &mut tx,
        &client,
        CreateAuditLog::new(action_types::REGISTER)
            .by_user(user.id)
            .on_entity("user", user.id),
    )
    .await?;
    tx.commit().await?;
    tracing::info!(user_id = user.id, "Member registered");

    let response = create_auth_response(&state, &client, user.id, &user.email, &role.name).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Authenticate with email + password. Returns access and refresh tokens.
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = AuthResponse),
        (status = 401, description = "Invalid email or password"),
        (status = 403, description = "Account deactivated or locked"),
    )
)]
pub async fn login(
    State(state): State<AppState>,
    client: ClientInfo,
    Json(input): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let user = UserRepo::find_by_email(&state.pool, input.email.trim())
        .await?
        .ok_or_else(|| AppError::unauthorized("Invalid email or password"))?;

    if !user.is_active {
        return Err(AppError::forbidden("Account is deactivated"));
    }

    if let Some(locked_until) = user.locked_until {
        if locked_until > Utc::now() {
            return Err(AppError::forbidden(
                "Account is temporarily locked. Try again later.",
            ));
        }
    }

    let password_valid = verify_password(&input.password, &user.password_hash)
        .map_err(|e| AppError::InternalError(format!("Password verification error: {e}")))?;

    if !password_valid {
        let failed_count = UserRepo::increment_failed_login(&state.pool, user.id).await?;
        if failed_count >= MAX_FAILED_ATTEMPTS {
            let lock_until = Utc::now() + chrono::Duration::minutes(LOCK_DURATION_MINS);
            UserRepo::lock_account(&state.pool, user.id, lock_until).await?;
            tracing::warn!(user_id = user.id, failed_count, "Account locked after failed logins");
        }

        record_audit(
            &state,
            &client,
            CreateAuditLog::new(action_types::LOGIN_FAILED)
                .by_user(user.id)
                .on_entity("user", user.id)
                .with_details(json!({ "failed_count": failed_count })),
        )
        .await?;

        return Err(AppError::unauthorized("Invalid email or password"));
    }

    UserRepo::record_successful_login(&state.pool, user.id).await?;
    let role_name = RoleRepo::resolve_name(&state.pool, user.role_id).await?;

    record_audit(
        &state,
        &client,
        CreateAuditLog::new(action_types::LOGIN)
            .by_user(user.id)
            .on_entity("user", user.id),
    )
    .await?;

    let response = create_auth_response(&state, &client, user.id, &user.email, &role_name).await?;
    Ok(Json(response))
}

/// Exchange a valid refresh token for new access + refresh tokens.
///
/// The presented session is revoked; replaying it afterwards fails.
#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh",
    tag = "auth",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Tokens rotated", body = AuthResponse),
        (status = 401, description = "Invalid, expired or already used refresh token"),
    )
)]
pub async fn refresh(
    State(state): State<AppState>,
    client: ClientInfo,
    Json(input): Json<RefreshRequest>,
) -> AppResult<Json<AuthResponse>> {
    let token_hash = hash_refresh_token(&input.refresh_token);

    let user_id = SessionRepo::consume(&state.pool, &token_hash)
        .await?
        .ok_or_else(|| AppError::unauthorized("Invalid or expired refresh token"))?;

    let user = UserRepo::find_by_id(&state.pool, user_id)
        .await?
        .ok_or_else(|| AppError::unauthorized("User no longer exists"))?;

    if !user.is_active {
        return Err(AppError::forbidden("Account is deactivated"));
    }

    let role_name = RoleRepo::resolve_name(&state.pool, user.role_id).await?;
    let response = create_auth_response(&state, &client, user.id, &user.email, &role_name).await?;
    Ok(Json(response))
}

/// Revoke all sessions for the authenticated user.
#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    tag = "auth",
    responses((status = 204, description = "Signed out everywhere")),
    security(("bearer" = []), ("api_key" = []))
)]
pub async fn logout(
    State(state): State<AppState>,
    client: ClientInfo,
    auth_user: AuthUser,
) -> AppResult<StatusCode> {
    let revoked = SessionRepo::revoke_all_for_user(&state.pool, auth_user.user_id).await?;
    record_audit(
        &state,
        &client,
        CreateAuditLog::new(action_types::LOGOUT)
            .by_user(auth_user.user_id)
            .with_details(json!({ "sessions_revoked": revoked })),
    )
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// The authenticated account.
#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    tag = "auth",
    responses((status = 200, description = "Current user", body = DataResponse<UserResponse>)),
    security(("bearer" = []), ("api_key" = []))
)]
pub async fn me(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> AppResult<Json<DataResponse<UserResponse>>> {
    let user = UserRepo::find_by_id(&state.pool, auth_user.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User", auth_user.user_id))?;
    Ok(Json(DataResponse {
        data: UserResponse::from_user(&user, &auth_user.role),
    }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Generate access + refresh tokens, persist a session row, and build the response.
async fn create_auth_response(
    state: &AppState,
    client: &ClientInfo,
    user_id: DbId,
    email: &str,
    role: &str,
) -> AppResult<AuthResponse> {
    let access_token = generate_access_token(user_id, role, &state.config.jwt)
        .map_err(|e| AppError::InternalError(format!("Token generation error: {e}")))?;

    let (refresh_plaintext, refresh_hash) = generate_refresh_token();

    let expires_at =
        Utc::now() + chrono::Duration::days(state.config.jwt.refresh_token_expiry_days);

    let session_input = CreateSession {
        user_id,
        refresh_token_hash: refresh_hash,
        expires_at,
        user_agent: client.user_agent.clone(),
        ip_address: client.ip_address.clone(),
    };
    SessionRepo::open(&state.pool, &session_input).await?;

    Ok(AuthResponse {
        access_token,
        refresh_token: refresh_plaintext,
        expires_in: state.config.jwt.access_token_expiry_mins * 60,
        user: UserInfo {
            id: user_id,
            email: email.to_string(),
            role: role.to_string(),
        },
    })
}
