//! Audit log entity models and DTOs.
//!
//! Audit logs have no `updated_at` field (immutable records).

use chrono::{DateTime, Utc};
use kindred_core::types::DbId;
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;

/// A single audit log entry. Immutable once created.
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct AuditLog {
    pub id: DbId,
    pub timestamp: DateTime<Utc>,
    pub user_id: Option<DbId>,
    pub action_type: String,
    pub entity_type: Option<String>,
    pub entity_id: Option<DbId>,
    #[schema(value_type = Option<Object>)]
    pub details_json: Option<serde_json::Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub integrity_hash: String,
    pub created_at: DateTime<Utc>,
}

/// DTO for appending an audit log entry.
///
/// All fields except `action_type` are optional. `details_json` is redacted
/// by the repository before storage.
#[derive(Debug, Clone, Default)]
pub struct CreateAuditLog {
    pub user_id: Option<DbId>,
    pub action_type: String,
    pub entity_type: Option<String>,
    pub entity_id: Option<DbId>,
    pub details_json: Option<serde_json::Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl CreateAuditLog {
    pub fn new(action_type: &str) -> Self {
        Self {
            action_type: action_type.to_string(),
            ..Self::default()
        }
    }

    pub fn by_user(mut self, user_id: DbId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn on_entity(mut self, entity_type: &str, entity_id: DbId) -> Self {
        self.entity_type = Some(entity_type.to_string());
        self.entity_id = Some(entity_id);
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details_json = Some(details);
        self
    }

    pub fn from_client(mut self, ip_address: Option<String>, user_agent: Option<String>) -> Self {
        self.ip_address = ip_address;
        self.user_agent = user_agent;
        self
    }
}

/// Filter parameters for querying audit logs.
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    pub user_id: Option<DbId>,
    pub action_type: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: i64,
    pub offset: i64,
}

/// Result of re-walking the audit hash chain.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ChainVerification {
    pub entries_checked: i64,
    pub is_intact: bool,
    /// Id of the first entry whose stored hash does not match.
    pub first_broken_id: Option<DbId>,
}
