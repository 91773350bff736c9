//! Audit logging constants and utility functions.
//!
//! Entries form a hash chain: each row's `integrity_hash` covers the previous
//! row's hash plus its own canonical content, so edits or deletions are
//! detectable by re-walking the chain.

use serde::Serialize;

use crate::hashing;
use crate::types::{DbId, Timestamp};

/// Known action types for audit log entries.
pub mod action_types {
    pub const REGISTER: &str = "register";
    pub const LOGIN: &str = "login";
    pub const LOGIN_FAILED: &str = "login_failed";
    pub const LOGOUT: &str = "logout";
    pub const PROFILE_UPDATE: &str = "profile_update";
    pub const ACCOUNT_DEACTIVATE: &str = "account_deactivate";
    pub const API_KEY_CREATE: &str = "api_key_create";
    pub const API_KEY_REVOKE: &str = "api_key_revoke";
    pub const SUBSCRIPTION_CHANGE: &str = "subscription_change";
    pub const PHOTO_UPLOAD: &str = "photo_upload";
    pub const PHOTO_DELETE: &str = "photo_delete";
    pub const UNMATCH: &str = "unmatch";
}

/// Known seed value for the first entry in the hash chain.
const CHAIN_SEED: &str = "KINDRED_AUDIT_CHAIN_SEED_V1";

/// The fields of an entry covered by its integrity hash.
#[derive(Debug, Serialize)]
pub struct AuditEntryData<'a> {
    pub timestamp: Timestamp,
    pub user_id: Option<DbId>,
    pub action_type: &'a str,
    pub entity_type: Option<&'a str>,
    pub entity_id: Option<DbId>,
    pub details_json: Option<&'a serde_json::Value>,
}

impl AuditEntryData<'_> {
    /// Canonical string form fed into [`compute_integrity_hash`].
    ///
    /// Timestamps are rendered at microsecond precision to match what
    /// PostgreSQL `TIMESTAMPTZ` stores.
    pub fn canonical(&self) -> String {
        let ts = self
            .timestamp
            .to_rfc3339_opts(chrono::SecondsFormat::Micros, true);
        let details = self
            .details_json
            .map(|v| v.to_string())
            .unwrap_or_default();
        format!(
            "{ts}|{}|{}|{}|{}|{details}",
            self.user_id.map(|v| v.to_string()).unwrap_or_default(),
            self.action_type,
            self.entity_type.unwrap_or_default(),
            self.entity_id.map(|v| v.to_string()).unwrap_or_default(),
        )
    }
}

/// Compute the SHA-256 integrity hash for an audit log entry.
///
/// `prev_hash` is the integrity_hash of the previous entry, or `None` for the
/// first entry in the chain (which uses a known seed value).
pub fn compute_integrity_hash(prev_hash: Option<&str>, entry_data: &str) -> String {
    let prev = prev_hash.unwrap_or(CHAIN_SEED);
    let combined = format!("{prev}|{entry_data}");
    hashing::sha256_hex(combined.as_bytes())
}

/// Key fragments whose values are replaced before storage.
pub const SENSITIVE_FIELDS: &[&str] = &[
    "password",
    "token",
    "secret",
    "api_key",
    "authorization",
    "credential",
];

/// Redact sensitive fields from a JSON value, recursing into objects and arrays.
pub fn redact_sensitive_fields(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut redacted = serde_json::Map::new();
            for (key, val) in map {
                let lower_key = key.to_lowercase();
                if SENSITIVE_FIELDS.iter().any(|f| lower_key.contains(f)) {
                    redacted.insert(
                        key.clone(),
                        serde_json::Value::String("[REDACTED]".to_string()),
                    );
                } else {
                    redacted.insert(key.clone(), redact_sensitive_fields(val));
                }
            }
            serde_json::Value::Object(redacted)
        }
        serde_json::Value::Array(arr) => {
            serde_json::Value::Array(arr.iter().map(redact_sensitive_fields).collect())
        }
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn entry(details: &serde_json::Value) -> AuditEntryData<'_> {
        AuditEntryData {
            timestamp: chrono::Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
            user_id: Some(7),
            action_type: action_types::LOGIN,
            entity_type: Some("user"),
            entity_id: Some(7),
            details_json: Some(details),
        }
    }

    #[test]
    fn chain_depends_on_previous_hash() {
        let details = json!({"ip": "127.0.0.1"});
        let data = entry(&details).canonical();
        let first = compute_integrity_hash(None, &data);
        let second = compute_integrity_hash(Some(&first), &data);
        assert_ne!(first, second);
        assert_eq!(first, compute_integrity_hash(None, &data));
    }

    #[test]
    fn canonical_form_is_stable() {
        let details = json!({"a": 1});
        assert_eq!(
            entry(&details).canonical(),
            "2026-03-01T12:00:00.000000Z|7|login|user|7|{\"a\":1}"
        );
    }

    #[test]
    fn redacts_nested_sensitive_keys() {
        let input = json!({
            "email": "a@b.c",
            "new_password": "hunter2",
            "nested": {"refresh_token": "abc", "ok": true},
            "list": [{"api_key": "k"}]
        });
        let out = redact_sensitive_fields(&input);
        assert_eq!(out["email"], "a@b.c");
        assert_eq!(out["new_password"], "[REDACTED]");
        assert_eq!(out["nested"]["refresh_token"], "[REDACTED]");
        assert_eq!(out["nested"]["ok"], true);
        assert_eq!(out["list"][0]["api_key"], "[REDACTED]");
    }
}
