//! HTTP handlers, one module per resource.
//!
//! Handlers validate input, call repositories, append audit entries, and
//! publish events. Persistence rules live in `kindred_db`, scoring and
//! validation rules in `kindred_core`.

pub mod admin;
pub mod api_keys;
pub mod auth;
pub mod conversations;
pub mod matching;
pub mod notifications;
pub mod photos;
pub mod profiles;
pub mod search;
pub mod subscriptions;

use kindred_db::models::audit::CreateAuditLog;
use kindred_db::repositories::AuditRepo;
use sqlx::{Postgres, Transaction};

use crate::error::AppResult;
use crate::middleware::client::ClientInfo;
use crate::state::AppState;

/// Append an audit entry stamped with the caller's address and user agent.
///
/// A failed append fails the request; the chain must not silently skip entries.
pub(crate) async fn record_audit(
    state: &AppState,
    client: &ClientInfo,
    entry: CreateAuditLog,
) -> AppResult<()> {
    let entry = entry.from_client(client.ip_address.clone(), client.user_agent.clone());
    AuditRepo::append(&state.pool, &entry).await?;
    Ok(())
}

/// Like [`record_audit`], inside the transaction making the audited change.
pub(crate) async fn record_audit_in_tx(
    tx: &mut Transaction<'_, Postgres>,
    client: &ClientInfo,
    entry: CreateAuditLog,
) -> AppResult<()> {
    let entry = entry.from_client(client.ip_address.clone(), client.user_agent.clone());
    AuditRepo::append_in_tx(tx, &entry).await?;
    Ok(())
}
