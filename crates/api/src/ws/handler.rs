use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use kindred_core::types::DbId;
use serde::Deserialize;
use utoipa::IntoParams;

use crate::error::AppResult;
use crate::middleware::auth::authenticate_bearer;
use crate::state::AppState;
use crate::ws::manager::WsManager;

#[derive(Debug, Deserialize, IntoParams)]
pub struct WsParams {
    /// Access token. Browsers cannot set headers on WebSocket upgrades.
    pub token: String,
}

/// Upgrade to a WebSocket bound to the token's user.
///
/// The token is validated before the upgrade so bad tokens get a plain 401.
#[utoipa::path(
    get,
    path = "/api/v1/ws",
    tag = "conversations",
    params(WsParams),
    responses(
        (status = 101, description = "Switching protocols"),
        (status = 401, description = "Missing, invalid or expired token"),
    )
)]
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
) -> AppResult<impl IntoResponse> {
    let user = authenticate_bearer(&state, &params.token).await?;
    let manager = Arc::clone(&state.ws_manager);
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, manager, user.user_id)))
}

/// Manage a single WebSocket connection after upgrade.
///
/// Splits the socket, registers the connection, forwards manager messages
/// from a spawned sender task, and drains inbound frames until close.
async fn handle_socket(socket: WebSocket, ws_manager: Arc<WsManager>, user_id: DbId) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(conn_id = %conn_id, user_id, "WebSocket connected");

    let mut rx = ws_manager.add(conn_id.clone(), user_id).await;

    let (mut sink, mut stream) = socket.split();

    let sender_conn_id = conn_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if sink.send(msg).await.is_err() || closing {
                tracing::debug!(conn_id = %sender_conn_id, "WebSocket sink closed");
                break;
            }
        }
    });

    // Clients only send control frames; anything else is ignored.
    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                tracing::trace!(conn_id = %conn_id, "Pong received");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    ws_manager.remove(&conn_id).await;
    send_task.abort();
    tracing::info!(conn_id = %conn_id, user_id, "WebSocket disconnected");
}
