//! Refresh-token sessions.
//!
//! A session row is the server half of one refresh token. Tokens are single
//! use: refreshing consumes the presented session and the caller opens a new
//! one with the rotated token.

use kindred_core::types::DbId;
use sqlx::{PgExecutor, PgPool};

use crate::models::session::{CreateSession, UserSession};

const COLUMNS: &str = "id, user_id, refresh_token_hash, expires_at, is_revoked, \
                       user_agent, ip_address, created_at, updated_at";

pub struct SessionRepo;

impl SessionRepo {
    /// Open a session for a newly issued refresh token.
    pub async fn open(pool: &PgPool, input: &CreateSession) -> Result<UserSession, sqlx::Error> {
        let query = format!(
            "INSERT INTO user_sessions
                 (user_id, refresh_token_hash, expires_at, user_agent, ip_address)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, UserSession>(&query)
            .bind(input.user_id)
            .bind(&input.refresh_token_hash)
            .bind(input.expires_at)
            .bind(&input.user_agent)
            .bind(&input.ip_address)
            .fetch_one(pool)
            .await
    }

    /// Consume the live session for `refresh_token_hash`, returning its owner.
    ///
    /// Lookup and revoke are one statement, so a token replayed concurrently
    /// is accepted at most once. Unknown, expired and already used tokens all
    /// come back as `None`.
    pub async fn consume(
        pool: &PgPool,
        refresh_token_hash: &str,
    ) -> Result<Option<DbId>, sqlx::Error> {
        sqlx::query_scalar(
            "UPDATE user_sessions SET is_revoked = true
             WHERE refresh_token_hash = $1
               AND NOT is_revoked
               AND expires_at > NOW()
             RETURNING user_id",
        )
        .bind(refresh_token_hash)
        .fetch_optional(pool)
        .await
    }

    /// Revoke every live session of a user. Used by logout and deactivation,
    /// the latter inside its own transaction.
    pub async fn revoke_all_for_user<'e>(
        executor: impl PgExecutor<'e>,
        user_id: DbId,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE user_sessions SET is_revoked = true
             WHERE user_id = $1 AND NOT is_revoked",
        )
        .bind(user_id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }
}
