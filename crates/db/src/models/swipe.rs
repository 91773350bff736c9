//! Swipe model.

use chrono::{DateTime, Utc};
use kindred_core::types::DbId;
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::models::matches::Match;

pub const DIRECTION_LIKE: &str = "like";
pub const DIRECTION_PASS: &str = "pass";

/// A row from the `swipes` table.
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct Swipe {
    pub id: DbId,
    pub swiper_id: DbId,
    pub target_id: DbId,
    pub direction: String,
    pub created_at: DateTime<Utc>,
}

/// What recording a swipe produced.
#[derive(Debug, Clone)]
pub struct SwipeOutcome {
    pub swipe: Swipe,
    /// Set when this like completed a mutual pair.
    pub new_match: Option<Match>,
}

/// A daily like allowance, counted from `since`.
#[derive(Debug, Clone, Copy)]
pub struct LikeQuota {
    pub limit: i64,
    pub since: DateTime<Utc>,
}

/// Result of a like recorded against a [`LikeQuota`].
#[derive(Debug, Clone)]
pub enum QuotaSwipe {
    Recorded(SwipeOutcome),
    /// The swiper had already used the whole allowance; nothing was written.
    LimitReached { likes_today: i64 },
}
