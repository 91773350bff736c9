//! Notification writer.
//!
//! [`NotificationWriter`] subscribes to the [`EventBus`](crate::bus::EventBus)
//! and stores an in-app notification for every user an event concerns. It
//! runs as a long-lived background task until cancelled or the bus closes.

use kindred_db::models::notification::{CreateNotification, KIND_NEW_MATCH, KIND_NEW_MESSAGE};
use kindred_db::repositories::NotificationRepo;
use kindred_db::DbPool;
use serde_json::json;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::bus::{event_types, PlatformEvent};

/// Longest message excerpt copied into a notification body.
pub const PREVIEW_CHARS: usize = 80;

pub struct NotificationWriter;

impl NotificationWriter {
    /// Run the writer loop until `cancel` fires or the channel closes.
    pub async fn run(
        pool: DbPool,
        mut receiver: broadcast::Receiver<PlatformEvent>,
        cancel: CancellationToken,
    ) {
        loop {
            let received = tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Notification writer cancelled");
                    break;
                }
                received = receiver.recv() => received,
            };

            match received {
                Ok(event) => {
                    for notification in notifications_for(&event) {
                        if let Err(e) = NotificationRepo::create(&pool, &notification).await {
                            tracing::error!(
                                error = %e,
                                event_type = %event.event_type,
                                user_id = notification.user_id,
                                "Failed to store notification"
                            );
                        }
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Notification writer lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, notification writer shutting down");
                    break;
                }
            }
        }
    }
}

/// Notifications an event produces. Unknown or malformed events yield none.
pub fn notifications_for(event: &PlatformEvent) -> Vec<CreateNotification> {
    match event.event_type.as_str() {
        event_types::MATCH_CREATED => {
            let (Some(match_id), Some(a), Some(b)) = (
                event.payload_id("match_id"),
                event.payload_id("user_a_id"),
                event.payload_id("user_b_id"),
            ) else {
                return Vec::new();
            };
            [(a, b), (b, a)]
                .into_iter()
                .map(|(user_id, other_user_id)| CreateNotification {
                    user_id,
                    kind: KIND_NEW_MATCH.to_string(),
                    title: "It's a match!".to_string(),
                    body: Some("You have a new match. Say hello.".to_string()),
                    payload: json!({ "match_id": match_id, "other_user_id": other_user_id }),
                })
                .collect()
        }
        event_types::MESSAGE_SENT => {
            let (Some(message_id), Some(match_id), Some(sender_id), Some(recipient_id)) = (
                event.payload_id("message_id"),
                event.payload_id("match_id"),
                event.payload_id("sender_id"),
                event.payload_id("recipient_id"),
            ) else {
                return Vec::new();
            };
            let body = event
                .payload
                .get("body")
                .and_then(serde_json::Value::as_str)
                .map(preview);
            vec![CreateNotification {
                user_id: recipient_id,
                kind: KIND_NEW_MESSAGE.to_string(),
                title: "New message".to_string(),
                body,
                payload: json!({
                    "match_id": match_id,
                    "message_id": message_id,
                    "sender_id": sender_id,
                }),
            }]
        }
        _ => Vec::new(),
    }
}

fn preview(body: &str) -> String {
    let mut chars = body.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}…")
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_created_notifies_both_users() {
        let event = PlatformEvent::new(event_types::MATCH_CREATED)
            .with_payload(json!({"match_id": 9, "user_a_id": 1, "user_b_id": 2}));
        let out = notifications_for(&event);

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].user_id, 1);
        assert_eq!(out[0].payload["other_user_id"], 2);
        assert_eq!(out[1].user_id, 2);
        assert_eq!(out[1].payload["other_user_id"], 1);
        assert!(out.iter().all(|n| n.kind == KIND_NEW_MATCH));
    }

    #[test]
    fn message_sent_notifies_recipient_only() {
        let event = PlatformEvent::new(event_types::MESSAGE_SENT).with_payload(json!({
            "message_id": 5, "match_id": 9, "sender_id": 1, "recipient_id": 2, "body": "hey"
        }));
        let out = notifications_for(&event);

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].user_id, 2);
        assert_eq!(out[0].kind, KIND_NEW_MESSAGE);
        assert_eq!(out[0].body.as_deref(), Some("hey"));
    }

    #[test]
    fn long_messages_are_truncated() {
        let long = "x".repeat(PREVIEW_CHARS + 5);
        let p = preview(&long);
        assert_eq!(p.chars().count(), PREVIEW_CHARS + 1);
        assert!(p.ends_with('…'));
    }

    #[test]
    fn malformed_or_unknown_events_are_ignored() {
        let missing = PlatformEvent::new(event_types::MATCH_CREATED)
            .with_payload(json!({"match_id": 9}));
        assert!(notifications_for(&missing).is_empty());
        assert!(notifications_for(&PlatformEvent::new("user.updated")).is_empty());
    }
}
