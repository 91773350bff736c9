//! API key model.

use chrono::{DateTime, Utc};
use kindred_core::types::DbId;
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;

/// A row from the `api_keys` table.
///
/// `key_hash` is never serialized to responses. The `key_prefix` field is
/// used for human-readable identification.
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct ApiKey {
    pub id: DbId,
    pub user_id: DbId,
    pub name: String,
    #[serde(skip_serializing)]
    pub key_hash: String,
    pub key_prefix: String,
    pub is_active: bool,
    pub last_used_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Key owner resolved during API-key authentication.
#[derive(Debug, Clone, FromRow)]
pub struct ApiKeyOwner {
    pub api_key_id: DbId,
    pub user_id: DbId,
    pub role: String,
}
