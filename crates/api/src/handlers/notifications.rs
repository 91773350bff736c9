//! Handlers for the caller's in-app notifications.

use axum::extract::{Path, Query, State};
use axum::Json;
use kindred_core::types::DbId;
use kindred_db::models::notification::Notification;
use kindred_db::repositories::NotificationRepo;
use serde::Deserialize;
use utoipa::IntoParams;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::query::PaginationParams;
use crate::response::{CountResponse, DataResponse};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct NotificationListParams {
    #[serde(default)]
    pub unread_only: bool,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[utoipa::path(
    get,
    path = "/api/v1/notifications",
    tag = "notifications",
    params(NotificationListParams),
    responses((status = 200, description = "Notifications, newest first", body = DataResponse<Vec<Notification>>)),
    security(("bearer" = []), ("api_key" = []))
)]
pub async fn list_notifications(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(params): Query<NotificationListParams>,
) -> AppResult<Json<DataResponse<Vec<Notification>>>> {
    let (limit, offset) = PaginationParams {
        limit: params.limit,
        offset: params.offset,
    }
    .resolve();
    let items = NotificationRepo::list(
        &state.pool,
        auth_user.user_id,
        params.unread_only,
        limit,
        offset,
    )
    .await?;
    Ok(Json(DataResponse { data: items }))
}

#[utoipa::path(
    get,
    path = "/api/v1/notifications/unread-count",
    tag = "notifications",
    responses((status = 200, description = "Unread notifications", body = CountResponse)),
    security(("bearer" = []), ("api_key" = []))
)]
pub async fn unread_count(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> AppResult<Json<CountResponse>> {
    let count = NotificationRepo::unread_count(&state.pool, auth_user.user_id).await?;
    Ok(Json(CountResponse { count }))
}

#[utoipa::path(
    post,
    path = "/api/v1/notifications/{id}/read",
    tag = "notifications",
    params(("id" = i64, Path, description = "Notification id")),
    responses(
        (status = 200, description = "Notification marked read", body = DataResponse<Notification>),
        (status = 404, description = "Caller has no such notification"),
    ),
    security(("bearer" = []), ("api_key" = []))
)]
pub async fn mark_read(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Notification>>> {
    let notification = NotificationRepo::mark_read(&state.pool, auth_user.user_id, id)
        .await?
        .ok_or_else(|| AppError::not_found("Notification", id))?;
    Ok(Json(DataResponse { data: notification }))
}

#[utoipa::path(
    post,
    path = "/api/v1/notifications/read-all",
    tag = "notifications",
    responses((status = 200, description = "Notifications marked read", body = CountResponse)),
    security(("bearer" = []), ("api_key" = []))
)]
pub async fn mark_all_read(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> AppResult<Json<CountResponse>> {
    let count = NotificationRepo::mark_all_read(&state.pool, auth_user.user_id).await?;
    tracing::debug!(user_id = auth_user.user_id, count, "Notifications marked read");
    Ok(Json(CountResponse {
        count: count as i64,
    }))
}
