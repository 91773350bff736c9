//! Repository for the `matches` table and the views built on it.

use kindred_core::types::DbId;
use sqlx::PgPool;

use crate::models::matches::{
    ConversationListItem, Match, MatchListItem, MATCH_STATUS_ACTIVE, MATCH_STATUS_UNMATCHED,
};

const COLUMNS: &str = "id, user_a_id, user_b_id, status, unmatched_by, unmatched_at, \
                       created_at, updated_at";

/// Active matches of `$1` whose other participant is still active.
const MINE_CTE: &str = "WITH mine AS (
        SELECT m.id, m.created_at,
               CASE WHEN m.user_a_id = $1 THEN m.user_b_id ELSE m.user_a_id END AS other_user_id
        FROM matches m
        WHERE (m.user_a_id = $1 OR m.user_b_id = $1) AND m.status = $2
    )";

pub struct MatchRepo;

impl MatchRepo {
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Match>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM matches WHERE id = $1");
        sqlx::query_as::<_, Match>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// The match, only if `user_id` takes part in it.
    pub async fn find_for_participant(
        pool: &PgPool,
        id: DbId,
        user_id: DbId,
    ) -> Result<Option<Match>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM matches WHERE id = $1 AND (user_a_id = $2 OR user_b_id = $2)"
        );
        sqlx::query_as::<_, Match>(&query)
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Active matches with the other user's summary, newest first.
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: DbId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<MatchListItem>, sqlx::Error> {
        let query = format!(
            "{MINE_CTE}
             SELECT mine.id AS match_id, mine.created_at AS matched_at, mine.other_user_id,
                    p.display_name, ph.id AS primary_photo_id
             FROM mine
             JOIN users u ON u.id = mine.other_user_id AND u.is_active
             LEFT JOIN profiles p ON p.user_id = mine.other_user_id
             LEFT JOIN photos ph ON ph.user_id = mine.other_user_id AND ph.is_primary
             ORDER BY mine.created_at DESC, mine.id DESC
             LIMIT $3 OFFSET $4"
        );
        sqlx::query_as::<_, MatchListItem>(&query)
            .bind(user_id)
            .bind(MATCH_STATUS_ACTIVE)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Active matches with their latest message and unread count, most
    /// recently active first.
    pub async fn list_conversations(
        pool: &PgPool,
        user_id: DbId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ConversationListItem>, sqlx::Error> {
        let query = format!(
            "{MINE_CTE}
             SELECT mine.id AS match_id, mine.other_user_id, p.display_name,
                    ph.id AS primary_photo_id,
                    lm.body AS last_message_body,
                    lm.created_at AS last_message_at,
                    lm.sender_id AS last_message_sender_id,
                    (SELECT COUNT(*) FROM messages um
                     WHERE um.match_id = mine.id AND um.sender_id <> $1 AND um.read_at IS NULL
                    ) AS unread_count,
                    COALESCE(lm.created_at, mine.created_at) AS last_activity_at
             FROM mine
             JOIN users u ON u.id = mine.other_user_id AND u.is_active
             LEFT JOIN profiles p ON p.user_id = mine.other_user_id
             LEFT JOIN photos ph ON ph.user_id = mine.other_user_id AND ph.is_primary
             LEFT JOIN LATERAL (
                 SELECT body, created_at, sender_id FROM messages
                 WHERE match_id = mine.id
                 ORDER BY id DESC
                 LIMIT 1
             ) lm ON TRUE
             ORDER BY last_activity_at DESC, match_id DESC
             LIMIT $3 OFFSET $4"
        );
        sqlx::query_as::<_, ConversationListItem>(&query)
            .bind(user_id)
            .bind(MATCH_STATUS_ACTIVE)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// End an active match. Returns `None` unless `user_id` takes part and
    /// the match is still active.
    pub async fn unmatch(
        pool: &PgPool,
        id: DbId,
        user_id: DbId,
    ) -> Result<Option<Match>, sqlx::Error> {
        let query = format!(
            "UPDATE matches SET status = $3, unmatched_by = $2, unmatched_at = NOW()
             WHERE id = $1 AND (user_a_id = $2 OR user_b_id = $2) AND status = $4
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Match>(&query)
            .bind(id)
            .bind(user_id)
            .bind(MATCH_STATUS_UNMATCHED)
            .bind(MATCH_STATUS_ACTIVE)
            .fetch_optional(pool)
            .await
    }
}
