//! Subscription model.

use chrono::{DateTime, Utc};
use kindred_core::types::DbId;
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;

/// A row from the `subscriptions` table.
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct Subscription {
    pub id: DbId,
    pub user_id: DbId,
    pub plan: String,
    /// `active`, `canceled` or `expired`.
    pub status: String,
    pub current_period_start: DateTime<Utc>,
    /// `None` for the free plan, which never lapses.
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
