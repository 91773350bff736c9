//! Route definitions for `/conversations`.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::conversations;
use crate::state::AppState;

/// Routes mounted at `/conversations`.
///
/// ```text
/// GET    /                          -> list_conversations
/// GET    /{match_id}/messages       -> list_messages
/// POST   /{match_id}/messages       -> send_message
/// POST   /{match_id}/read           -> mark_conversation_read
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(conversations::list_conversations))
        .route(
            "/{match_id}/messages",
            get(conversations::list_messages).post(conversations::send_message),
        )
        .route("/{match_id}/read", post(conversations::mark_conversation_read))
}
