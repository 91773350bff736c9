//! Repository for the `photos` table.

use kindred_core::media::{
    JOB_TYPE_PHOTO_METADATA, PHOTO_STATUS_PENDING, PHOTO_STATUS_READY, PHOTO_STATUS_REJECTED,
};
use kindred_core::types::DbId;
use sqlx::{PgConnection, PgPool};

use crate::models::photo::{CreatePhoto, Photo};
use crate::models::processing_job::ProcessingJob;

const COLUMNS: &str = "id, user_id, storage_key, content_type, byte_size, width, height, \
                       status, is_primary, created_at, updated_at";

const JOB_COLUMNS: &str = "id, photo_id, job_type, status, attempts, max_attempts, last_error, \
                           run_after, started_at, finished_at, created_at, updated_at";

pub struct PhotoRepo;

impl PhotoRepo {
    /// Insert a pending photo and queue its metadata job in one transaction.
    ///
    /// Returns `None` without writing when the owner already has
    /// `max_active` non-rejected photos. The count runs under the owner's
    /// photo lock, so concurrent uploads cannot overshoot the cap.
    pub async fn create_with_job(
        pool: &PgPool,
        input: &CreatePhoto,
        max_attempts: i32,
        max_active: i64,
    ) -> Result<Option<(Photo, ProcessingJob)>, sqlx::Error> {
        let mut tx = pool.begin().await?;
        lock_owner(&mut tx, input.user_id).await?;

        // Rejected photos do not count against the cap.
        let active: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM photos WHERE user_id = $1 AND status <> $2")
                .bind(input.user_id)
                .bind(PHOTO_STATUS_REJECTED)
                .fetch_one(&mut *tx)
                .await?;
        if active >= max_active {
            tx.rollback().await?;
            return Ok(None);
        }

        let query = format!(
            "INSERT INTO photos (user_id, storage_key, content_type, byte_size, status)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        );
        let photo = sqlx::query_as::<_, Photo>(&query)
            .bind(input.user_id)
            .bind(&input.storage_key)
            .bind(&input.content_type)
            .bind(input.byte_size)
            .bind(PHOTO_STATUS_PENDING)
            .fetch_one(&mut *tx)
            .await?;

        let query = format!(
            "INSERT INTO processing_jobs (photo_id, job_type, max_attempts)
             VALUES ($1, $2, $3)
             RETURNING {JOB_COLUMNS}"
        );
        let job = sqlx::query_as::<_, ProcessingJob>(&query)
            .bind(photo.id)
            .bind(JOB_TYPE_PHOTO_METADATA)
            .bind(max_attempts)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some((photo, job)))
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Photo>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM photos WHERE id = $1");
        sqlx::query_as::<_, Photo>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// All of a user's photos, primary first then oldest first.
    pub async fn list_for_user(pool: &PgPool, user_id: DbId) -> Result<Vec<Photo>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM photos WHERE user_id = $1
             ORDER BY is_primary DESC, id ASC"
        );
        sqlx::query_as::<_, Photo>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    /// Photos other members may see.
    pub async fn list_ready_for_user(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Vec<Photo>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM photos WHERE user_id = $1 AND status = $2
             ORDER BY is_primary DESC, id ASC"
        );
        sqlx::query_as::<_, Photo>(&query)
            .bind(user_id)
            .bind(PHOTO_STATUS_READY)
            .fetch_all(pool)
            .await
    }

    /// Make a ready photo the user's only primary photo.
    ///
    /// Returns `None` when the photo is missing, not owned by `user_id`,
    /// or not ready.
    pub async fn set_primary(
        pool: &PgPool,
        user_id: DbId,
        photo_id: DbId,
    ) -> Result<Option<Photo>, sqlx::Error> {
        let mut tx = pool.begin().await?;
        lock_owner(&mut tx, user_id).await?;

        let eligible: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM photos WHERE id = $1 AND user_id = $2 AND status = $3)",
        )
        .bind(photo_id)
        .bind(user_id)
        .bind(PHOTO_STATUS_READY)
        .fetch_one(&mut *tx)
        .await?;
        if !eligible {
            return Ok(None);
        }

        sqlx::query("UPDATE photos SET is_primary = FALSE WHERE user_id = $1 AND is_primary")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let query =
            format!("UPDATE photos SET is_primary = TRUE WHERE id = $1 RETURNING {COLUMNS}");
        let photo = sqlx::query_as::<_, Photo>(&query)
            .bind(photo_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(photo))
    }

    /// Delete a user's photo, returning the removed row.
    pub async fn delete(
        pool: &PgPool,
        user_id: DbId,
        photo_id: DbId,
    ) -> Result<Option<Photo>, sqlx::Error> {
        let query =
            format!("DELETE FROM photos WHERE id = $1 AND user_id = $2 RETURNING {COLUMNS}");
        sqlx::query_as::<_, Photo>(&query)
            .bind(photo_id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Record decoded dimensions and mark the photo ready.
    ///
    /// The photo becomes primary when its owner has no primary photo yet.
    /// The owner's photo lock keeps two jobs finishing together from both
    /// claiming primary.
    pub async fn mark_ready(
        pool: &PgPool,
        photo_id: DbId,
        width: i32,
        height: i32,
    ) -> Result<Option<Photo>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let owner: Option<DbId> = sqlx::query_scalar("SELECT user_id FROM photos WHERE id = $1")
            .bind(photo_id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(owner) = owner else {
            return Ok(None);
        };
        lock_owner(&mut tx, owner).await?;

        let query = format!(
            "UPDATE photos SET status = $2, width = $3, height = $4,
                is_primary = NOT EXISTS (
                    SELECT 1 FROM photos other
                    WHERE other.user_id = photos.user_id
                      AND other.is_primary
                      AND other.id <> photos.id
                )
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        let photo = sqlx::query_as::<_, Photo>(&query)
            .bind(photo_id)
            .bind(PHOTO_STATUS_READY)
            .bind(width)
            .bind(height)
            .fetch_optional(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(photo)
    }

    pub async fn mark_rejected(pool: &PgPool, photo_id: DbId) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE photos SET status = $2, is_primary = FALSE WHERE id = $1")
                .bind(photo_id)
                .bind(PHOTO_STATUS_REJECTED)
                .execute(pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// Serialize writes that depend on the set of one owner's photos.
async fn lock_owner(conn: &mut PgConnection, user_id: DbId) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
        .bind(format!("photos:{user_id}"))
        .execute(conn)
        .await?;
    Ok(())
}
