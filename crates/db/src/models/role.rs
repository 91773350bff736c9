//! Role lookup model.

use kindred_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from the `roles` lookup table.
#[derive(Debug, Clone, FromRow)]
pub struct Role {
    pub id: DbId,
    pub name: String,
    pub description: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
