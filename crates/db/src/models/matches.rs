//! Match model and listing views.

use chrono::{DateTime, Utc};
use kindred_core::types::DbId;
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;

pub const MATCH_STATUS_ACTIVE: &str = "active";
pub const MATCH_STATUS_UNMATCHED: &str = "unmatched";

/// A row from the `matches` table. `user_a_id < user_b_id` always holds.
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct Match {
    pub id: DbId,
    pub user_a_id: DbId,
    pub user_b_id: DbId,
    pub status: String,
    pub unmatched_by: Option<DbId>,
    pub unmatched_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Match {
    pub fn involves(&self, user_id: DbId) -> bool {
        self.user_a_id == user_id || self.user_b_id == user_id
    }

    /// The participant that is not `user_id`.
    pub fn other_user(&self, user_id: DbId) -> DbId {
        if self.user_a_id == user_id {
            self.user_b_id
        } else {
            self.user_a_id
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == MATCH_STATUS_ACTIVE
    }
}

/// Order a pair of user ids the way the `matches` table stores them.
pub fn ordered_pair(a: DbId, b: DbId) -> (DbId, DbId) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// One active match from the caller's perspective.
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct MatchListItem {
    pub match_id: DbId,
    pub matched_at: DateTime<Utc>,
    pub other_user_id: DbId,
    pub display_name: Option<String>,
    pub primary_photo_id: Option<DbId>,
}

/// One conversation row: an active match plus message activity.
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct ConversationListItem {
    pub match_id: DbId,
    pub other_user_id: DbId,
    pub display_name: Option<String>,
    pub primary_photo_id: Option<DbId>,
    pub last_message_body: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub last_message_sender_id: Option<DbId>,
    pub unread_count: i64,
    pub last_activity_at: DateTime<Utc>,
}
