//! In-app notification model.

use chrono::{DateTime, Utc};
use kindred_core::types::DbId;
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;

pub const KIND_NEW_MATCH: &str = "new_match";
pub const KIND_NEW_MESSAGE: &str = "new_message";

/// A row from the `notifications` table.
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct Notification {
    pub id: DbId,
    pub user_id: DbId,
    pub kind: String,
    pub title: String,
    pub body: Option<String>,
    #[schema(value_type = Object)]
    pub payload: serde_json::Value,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// DTO for inserting a notification.
#[derive(Debug, Clone)]
pub struct CreateNotification {
    pub user_id: DbId,
    pub kind: String,
    pub title: String,
    pub body: Option<String>,
    pub payload: serde_json::Value,
}
