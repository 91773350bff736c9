//! Repository for the `api_keys` table.

use kindred_core::types::{DbId, Timestamp};
use sqlx::{PgExecutor, PgPool};

use crate::models::api_key::{ApiKey, ApiKeyOwner};

const COLUMNS: &str = "id, user_id, name, key_hash, key_prefix, is_active, last_used_at, \
                       expires_at, revoked_at, created_at, updated_at";

/// Provides CRUD operations for API keys.
pub struct ApiKeyRepo;

impl ApiKeyRepo {
    pub async fn create(
        pool: &PgPool,
        user_id: DbId,
        name: &str,
        key_hash: &str,
        key_prefix: &str,
        expires_at: Option<Timestamp>,
    ) -> Result<ApiKey, sqlx::Error> {
        let query = format!(
            "INSERT INTO api_keys (user_id, name, key_hash, key_prefix, expires_at)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ApiKey>(&query)
            .bind(user_id)
            .bind(name)
            .bind(key_hash)
            .bind(key_prefix)
            .bind(expires_at)
            .fetch_one(pool)
            .await
    }

    pub async fn list_for_user(pool: &PgPool, user_id: DbId) -> Result<Vec<ApiKey>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM api_keys WHERE user_id = $1 ORDER BY created_at DESC");
        sqlx::query_as::<_, ApiKey>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    /// Revoke one of the user's keys. Returns `false` if no active key matched.
    pub async fn revoke(pool: &PgPool, user_id: DbId, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE api_keys SET is_active = FALSE, revoked_at = NOW()
             WHERE id = $1 AND user_id = $2 AND is_active",
        )
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn revoke_all_for_user<'e>(
        executor: impl PgExecutor<'e>,
        user_id: DbId,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE api_keys SET is_active = FALSE, revoked_at = NOW()
             WHERE user_id = $1 AND is_active",
        )
        .bind(user_id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    /// Resolve a usable key to its owner.
    ///
    /// The key must be active and unexpired, and its owner must be active.
    pub async fn find_owner_by_hash(
        pool: &PgPool,
        key_hash: &str,
    ) -> Result<Option<ApiKeyOwner>, sqlx::Error> {
        sqlx::query_as::<_, ApiKeyOwner>(
            "SELECT k.id AS api_key_id, u.id AS user_id, r.name AS role
             FROM api_keys k
             JOIN users u ON u.id = k.user_id
             JOIN roles r ON r.id = u.role_id
             WHERE k.key_hash = $1
               AND k.is_active
               AND (k.expires_at IS NULL OR k.expires_at > NOW())
               AND u.is_active",
        )
        .bind(key_hash)
        .fetch_optional(pool)
        .await
    }

    pub async fn touch_last_used(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE api_keys SET last_used_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }
}
