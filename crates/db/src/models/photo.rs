//! Photo model and DTOs.

use chrono::{DateTime, Utc};
use kindred_core::types::DbId;
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;

/// A row from the `photos` table.
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct Photo {
    pub id: DbId,
    pub user_id: DbId,
    #[serde(skip_serializing)]
    pub storage_key: String,
    pub content_type: String,
    pub byte_size: i64,
    pub width: Option<i32>,
    pub height: Option<i32>,
    /// `pending`, `ready` or `rejected`.
    pub status: String,
    pub is_primary: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// DTO for inserting a freshly uploaded photo.
#[derive(Debug)]
pub struct CreatePhoto {
    pub user_id: DbId,
    pub storage_key: String,
    pub content_type: String,
    pub byte_size: i64,
}
