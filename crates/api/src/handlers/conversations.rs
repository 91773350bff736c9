//! Handlers for conversations. A conversation is an active match and its
//! message history.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use kindred_core::search::clamp_limit;
use kindred_core::types::DbId;
use kindred_db::models::matches::{ConversationListItem, Match};
use kindred_db::models::message::{Message, MAX_MESSAGE_LEN};
use kindred_db::repositories::{MatchRepo, MessageRepo};
use kindred_events::{event_types, PlatformEvent};
use serde::Deserialize;
use serde_json::json;
use utoipa::{IntoParams, ToSchema};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::query::PaginationParams;
use crate::response::{CountResponse, DataResponse};
use crate::state::AppState;

const DEFAULT_MESSAGE_PAGE: i64 = 50;
const MAX_MESSAGE_PAGE: i64 = 100;

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct MessagePageParams {
    /// Return messages with an id lower than this one.
    pub before: Option<DbId>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SendMessageRequest {
    pub body: String,
}

/// Trim a message body and check its length.
pub fn normalize_body(body: &str) -> Result<&str, AppError> {
    let body = body.trim();
    let len = body.chars().count();
    if len == 0 {
        return Err(AppError::validation("Message body must not be empty"));
    }
    if len > MAX_MESSAGE_LEN {
        return Err(AppError::validation(format!(
            "Message body must be at most {MAX_MESSAGE_LEN} characters"
        )));
    }
    Ok(body)
}

async fn participant_match(state: &AppState, match_id: DbId, user_id: DbId) -> AppResult<Match> {
    MatchRepo::find_for_participant(&state.pool, match_id, user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Conversation", match_id))
}

#[utoipa::path(
    get,
    path = "/api/v1/conversations",
    tag = "conversations",
    params(PaginationParams),
    responses((status = 200, description = "Conversations by last activity", body = DataResponse<Vec<ConversationListItem>>)),
    security(("bearer" = []), ("api_key" = []))
)]
pub async fn list_conversations(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<DataResponse<Vec<ConversationListItem>>>> {
    let (limit, offset) = params.resolve();
    let items =
        MatchRepo::list_conversations(&state.pool, auth_user.user_id, limit, offset).await?;
    Ok(Json(DataResponse { data: items }))
}

#[utoipa::path(
    get,
    path = "/api/v1/conversations/{match_id}/messages",
    tag = "conversations",
    params(("match_id" = i64, Path, description = "Match id"), MessagePageParams),
    responses(
        (status = 200, description = "Messages, newest first", body = DataResponse<Vec<Message>>),
        (status = 404, description = "Caller is not part of this match"),
    ),
    security(("bearer" = []), ("api_key" = []))
)]
pub async fn list_messages(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(match_id): Path<DbId>,
    Query(params): Query<MessagePageParams>,
) -> AppResult<Json<DataResponse<Vec<Message>>>> {
    participant_match(&state, match_id, auth_user.user_id).await?;
    let limit = clamp_limit(params.limit, DEFAULT_MESSAGE_PAGE, MAX_MESSAGE_PAGE);
    let messages = MessageRepo::list_page(&state.pool, match_id, params.before, limit).await?;
    Ok(Json(DataResponse { data: messages }))
}

#[utoipa::path(
    post,
    path = "/api/v1/conversations/{match_id}/messages",
    tag = "conversations",
    params(("match_id" = i64, Path, description = "Match id")),
    request_body = SendMessageRequest,
    responses(
        (status = 201, description = "Message stored", body = DataResponse<Message>),
        (status = 400, description = "Empty or oversized body"),
        (status = 404, description = "Caller is not part of this match"),
        (status = 409, description = "Match has ended"),
    ),
    security(("bearer" = []), ("api_key" = []))
)]
pub async fn send_message(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(match_id): Path<DbId>,
    Json(input): Json<SendMessageRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<Message>>)> {
    let body = normalize_body(&input.body)?;
    let conversation = participant_match(&state, match_id, auth_user.user_id).await?;
    if !conversation.is_active() {
        return Err(AppError::conflict(format!("Match {match_id} has ended")));
    }

    let message = MessageRepo::create(&state.pool, match_id, auth_user.user_id, body)
        .await?
        // Unmatched between the check and the insert.
        .ok_or_else(|| AppError::conflict(format!("Match {match_id} has ended")))?;
    let recipient_id = conversation.other_user(auth_user.user_id);

    state.event_bus.publish(
        PlatformEvent::new(event_types::MESSAGE_SENT)
            .with_source("message", message.id)
            .with_actor(auth_user.user_id)
            .with_payload(json!({
                "message_id": message.id,
                "match_id": match_id,
                "sender_id": auth_user.user_id,
                "recipient_id": recipient_id,
                "body": message.body,
                "created_at": message.created_at,
            })),
    );
    tracing::info!(
        match_id,
        message_id = message.id,
        sender_id = auth_user.user_id,
        recipient_id,
        "Message sent",
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: message })))
}

#[utoipa::path(
    post,
    path = "/api/v1/conversations/{match_id}/read",
    tag = "conversations",
    params(("match_id" = i64, Path, description = "Match id")),
    responses(
        (status = 200, description = "Messages marked read", body = CountResponse),
        (status = 404, description = "Caller is not part of this match"),
    ),
    security(("bearer" = []), ("api_key" = []))
)]
pub async fn mark_conversation_read(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(match_id): Path<DbId>,
) -> AppResult<Json<CountResponse>> {
    participant_match(&state, match_id, auth_user.user_id).await?;
    let count = MessageRepo::mark_read(&state.pool, match_id, auth_user.user_id).await?;
    Ok(Json(CountResponse {
        count: count as i64,
    }))
}
