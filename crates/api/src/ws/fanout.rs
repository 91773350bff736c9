use std::sync::Arc;

use axum::extract::ws::Message;
use kindred_core::types::DbId;
use kindred_events::{event_types, PlatformEvent};
use serde_json::json;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::ws::manager::WsManager;

/// The recipient and text frame a socket should receive for `event`.
///
/// Only `message.sent` is pushed; notifications are read over HTTP.
pub fn frame_for(event: &PlatformEvent) -> Option<(DbId, String)> {
    if event.event_type != event_types::MESSAGE_SENT {
        return None;
    }
    let recipient = event.payload_id("recipient_id")?;
    let frame = json!({
        "type": event.event_type,
        "data": event.payload,
    });
    Some((recipient, frame.to_string()))
}

/// Forward bus events to the sockets of their recipients until `cancel`
/// fires or the bus closes.
pub fn start_fanout(
    ws_manager: Arc<WsManager>,
    mut receiver: broadcast::Receiver<PlatformEvent>,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                () = cancel.cancelled() => break,
                received = receiver.recv() => match received {
                    Ok(event) => event,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "WebSocket fan-out lagged behind the event bus");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            };

            if let Some((user_id, frame)) = frame_for(&event) {
                let delivered = ws_manager.send_to_user(user_id, Message::Text(frame.into())).await;
                tracing::debug!(user_id, delivered, "Pushed event to WebSocket clients");
            }
        }
    })
}
