//! Repository for the `messages` table.

use kindred_core::types::DbId;
use sqlx::PgPool;

use crate::models::matches::MATCH_STATUS_ACTIVE;
use crate::models::message::Message;

const COLUMNS: &str = "id, match_id, sender_id, body, read_at, created_at";

pub struct MessageRepo;

impl MessageRepo {
    /// Store a message while the match is active and `sender_id` takes part
    /// in it, otherwise `None`.
    ///
    /// The match row is share-locked by the insert itself, so an unmatch
    /// either commits first and blocks the message or waits for it.
    pub async fn create(
        pool: &PgPool,
        match_id: DbId,
        sender_id: DbId,
        body: &str,
    ) -> Result<Option<Message>, sqlx::Error> {
        let query = format!(
            "INSERT INTO messages (match_id, sender_id, body)
             SELECT m.id, $2, $3 FROM matches m
             WHERE m.id = $1 AND m.status = $4 AND (m.user_a_id = $2 OR m.user_b_id = $2)
             FOR SHARE
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Message>(&query)
            .bind(match_id)
            .bind(sender_id)
            .bind(body)
            .bind(MATCH_STATUS_ACTIVE)
            .fetch_optional(pool)
            .await
    }

    /// One page of a conversation, newest first. `before` is an exclusive
    /// message-id cursor.
    pub async fn list_page(
        pool: &PgPool,
        match_id: DbId,
        before: Option<DbId>,
        limit: i64,
    ) -> Result<Vec<Message>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM messages
             WHERE match_id = $1 AND ($2::BIGINT IS NULL OR id < $2)
             ORDER BY id DESC
             LIMIT $3"
        );
        sqlx::query_as::<_, Message>(&query)
            .bind(match_id)
            .bind(before)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Mark every unread message sent to `reader_id` in the match as read.
    pub async fn mark_read(
        pool: &PgPool,
        match_id: DbId,
        reader_id: DbId,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE messages SET read_at = NOW()
             WHERE match_id = $1 AND sender_id <> $2 AND read_at IS NULL",
        )
        .bind(match_id)
        .bind(reader_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
