//! Chat message model.

use chrono::{DateTime, Utc};
use kindred_core::types::DbId;
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;

/// Maximum message length in characters.
pub const MAX_MESSAGE_LEN: usize = 2000;

/// A row from the `messages` table.
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct Message {
    pub id: DbId,
    pub match_id: DbId,
    pub sender_id: DbId,
    pub body: String,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
