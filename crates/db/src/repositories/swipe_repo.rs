//! Repository for the `swipes` table and match creation.

use kindred_core::types::DbId;
use sqlx::{PgPool, Postgres, Transaction};

use crate::models::matches::{ordered_pair, Match};
use crate::models::swipe::{LikeQuota, QuotaSwipe, Swipe, SwipeOutcome, DIRECTION_LIKE};

const COLUMNS: &str = "id, swiper_id, target_id, direction, created_at";

const MATCH_COLUMNS: &str = "id, user_a_id, user_b_id, status, unmatched_by, unmatched_at, \
                             created_at, updated_at";

pub struct SwipeRepo;

impl SwipeRepo {
    /// Record a swipe. A like answering an earlier like from the target
    /// creates the match in the same transaction.
    ///
    /// A repeated swipe fails with the `uq_swipes_pair` unique violation.
    pub async fn record(
        pool: &PgPool,
        swiper_id: DbId,
        target_id: DbId,
        direction: &str,
    ) -> Result<SwipeOutcome, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let outcome = insert_swipe(&mut tx, swiper_id, target_id, direction).await?;
        tx.commit().await?;
        Ok(outcome)
    }

    /// Record a like only while the swiper is under `quota`.
    ///
    /// The count and the insert share one transaction holding a per-swiper
    /// advisory lock, so concurrent likes at different targets cannot
    /// overshoot the allowance.
    pub async fn record_like_within_quota(
        pool: &PgPool,
        swiper_id: DbId,
        target_id: DbId,
        quota: LikeQuota,
    ) -> Result<QuotaSwipe, sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(format!("likes:{swiper_id}"))
            .execute(&mut *tx)
            .await?;

        let likes_today: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM swipes
             WHERE swiper_id = $1 AND direction = $2 AND created_at >= $3",
        )
        .bind(swiper_id)
        .bind(DIRECTION_LIKE)
        .bind(quota.since)
        .fetch_one(&mut *tx)
        .await?;

        if likes_today >= quota.limit {
            tx.rollback().await?;
            return Ok(QuotaSwipe::LimitReached { likes_today });
        }

        let outcome = insert_swipe(&mut tx, swiper_id, target_id, DIRECTION_LIKE).await?;
        tx.commit().await?;
        Ok(QuotaSwipe::Recorded(outcome))
    }
}

async fn insert_swipe(
    tx: &mut Transaction<'_, Postgres>,
    swiper_id: DbId,
    target_id: DbId,
    direction: &str,
) -> Result<SwipeOutcome, sqlx::Error> {
    let (user_a, user_b) = ordered_pair(swiper_id, target_id);

    // Serialize concurrent swipes within the same pair.
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
        .bind(format!("swipe:{user_a}:{user_b}"))
        .execute(&mut **tx)
        .await?;

    let query = format!(
        "INSERT INTO swipes (swiper_id, target_id, direction)
         VALUES ($1, $2, $3)
         RETURNING {COLUMNS}"
    );
    let swipe = sqlx::query_as::<_, Swipe>(&query)
        .bind(swiper_id)
        .bind(target_id)
        .bind(direction)
        .fetch_one(&mut **tx)
        .await?;

    let mut new_match = None;
    if direction == DIRECTION_LIKE {
        let reciprocal: bool = sqlx::query_scalar(
            "SELECT EXISTS(
                 SELECT 1 FROM swipes
                 WHERE swiper_id = $1 AND target_id = $2 AND direction = $3
             )",
        )
        .bind(target_id)
        .bind(swiper_id)
        .bind(DIRECTION_LIKE)
        .fetch_one(&mut **tx)
        .await?;

        if reciprocal {
            let query = format!(
                "INSERT INTO matches (user_a_id, user_b_id)
                 VALUES ($1, $2)
                 ON CONFLICT (user_a_id, user_b_id) DO NOTHING
                 RETURNING {MATCH_COLUMNS}"
            );
            new_match = sqlx::query_as::<_, Match>(&query)
                .bind(user_a)
                .bind(user_b)
                .fetch_optional(&mut **tx)
                .await?;
        }
    }

    Ok(SwipeOutcome { swipe, new_match })
}
