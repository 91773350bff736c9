//! Admin-only handlers: member management and the audit trail.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use kindred_core::types::DbId;
use kindred_db::models::audit::{AuditLog, AuditQuery, ChainVerification};
use kindred_db::models::user::UserListItem;
use kindred_db::repositories::{AuditRepo, UserRepo};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::error::{AppError, AppResult};
use crate::handlers::profiles::deactivate_account;
use crate::middleware::client::ClientInfo;
use crate::middleware::rbac::RequireAdmin;
use crate::query::PaginationParams;
use crate::response::{DataResponse, PageResponse};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct AuditLogParams {
    pub user_id: Option<DbId>,
    pub action_type: Option<String>,
    /// Inclusive lower bound (RFC 3339).
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper bound (RFC 3339).
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/users",
    tag = "admin",
    params(PaginationParams),
    responses(
        (status = 200, description = "All accounts, newest first", body = PageResponse<UserListItem>),
        (status = 403, description = "Admin role required"),
    ),
    security(("bearer" = []), ("api_key" = []))
)]
pub async fn list_users(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<PageResponse<UserListItem>>> {
    let (limit, offset) = params.resolve();
    let data = UserRepo::list_with_roles(&state.pool, limit, offset).await?;
    let total = UserRepo::count(&state.pool).await?;
    Ok(Json(PageResponse { data, total }))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/users/{id}/deactivate",
    tag = "admin",
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 204, description = "Account deactivated"),
        (status = 400, description = "Admins cannot deactivate themselves here"),
        (status = 404, description = "No such user"),
    ),
    security(("bearer" = []), ("api_key" = []))
)]
pub async fn deactivate_user(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    client: ClientInfo,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    if id == admin.user_id {
        return Err(AppError::BadRequest(
            "Use DELETE /api/v1/users/me to deactivate your own account".into(),
        ));
    }
    if UserRepo::find_by_id(&state.pool, id).await?.is_none() {
        return Err(AppError::not_found("User", id));
    }
    deactivate_account(&state, &client, admin.user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/audit-logs",
    tag = "admin",
    params(AuditLogParams),
    responses((status = 200, description = "Matching entries, newest first", body = PageResponse<AuditLog>)),
    security(("bearer" = []), ("api_key" = []))
)]
pub async fn list_audit_logs(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(params): Query<AuditLogParams>,
) -> AppResult<Json<PageResponse<AuditLog>>> {
    if let (Some(from), Some(to)) = (params.from, params.to) {
        if from > to {
            return Err(AppError::validation("from must not be after to"));
        }
    }
    let (limit, offset) = PaginationParams {
        limit: params.limit,
        offset: params.offset,
    }
    .resolve();

    let query = AuditQuery {
        user_id: params.user_id,
        action_type: params.action_type.filter(|a| !a.is_empty()),
        from: params.from,
        to: params.to,
        limit,
        offset,
    };
    let (data, total) = AuditRepo::query(&state.pool, &query).await?;
    Ok(Json(PageResponse { data, total }))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/audit-logs/verify",
    tag = "admin",
    responses((status = 200, description = "Hash chain verification result", body = DataResponse<ChainVerification>)),
    security(("bearer" = []), ("api_key" = []))
)]
pub async fn verify_audit_chain(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
) -> AppResult<Json<DataResponse<ChainVerification>>> {
    let result = AuditRepo::verify_chain(&state.pool).await?;
    if result.is_intact {
        tracing::info!(
            admin_id = admin.user_id,
            checked = result.entries_checked,
            "Audit chain intact"
        );
    } else {
        tracing::warn!(
            admin_id = admin.user_id,
            first_broken_id = ?result.first_broken_id,
            "Audit chain broken",
        );
    }
    Ok(Json(DataResponse { data: result }))
}
