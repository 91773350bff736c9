//! Repository for the `processing_jobs` queue.
//!
//! Workers claim jobs with `FOR UPDATE SKIP LOCKED`, so several worker
//! processes can poll the same table without double-processing.

use kindred_core::media::{
    JOB_STATUS_FAILED, JOB_STATUS_QUEUED, JOB_STATUS_RUNNING, JOB_STATUS_SUCCEEDED,
};
use kindred_core::types::DbId;
use sqlx::PgPool;

use crate::models::processing_job::ProcessingJob;

const COLUMNS: &str = "id, photo_id, job_type, status, attempts, max_attempts, last_error, \
                       run_after, started_at, finished_at, created_at, updated_at";

pub struct ProcessingJobRepo;

impl ProcessingJobRepo {
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<ProcessingJob>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM processing_jobs WHERE id = $1");
        sqlx::query_as::<_, ProcessingJob>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// A job, only if its photo belongs to `user_id`.
    pub async fn find_for_owner(
        pool: &PgPool,
        job_id: DbId,
        user_id: DbId,
    ) -> Result<Option<ProcessingJob>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM processing_jobs j
             JOIN photos p ON p.id = j.photo_id
             WHERE j.id = $1 AND p.user_id = $2",
            prefixed("j")
        );
        sqlx::query_as::<_, ProcessingJob>(&query)
            .bind(job_id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Claim the oldest due job, marking it running and counting the attempt.
    pub async fn claim_next(pool: &PgPool) -> Result<Option<ProcessingJob>, sqlx::Error> {
        let query = format!(
            "UPDATE processing_jobs SET status = $1, attempts = attempts + 1,
                started_at = NOW(), finished_at = NULL
             WHERE id = (
                 SELECT id FROM processing_jobs
                 WHERE status = $2 AND run_after <= NOW()
                 ORDER BY run_after, id
                 LIMIT 1
                 FOR UPDATE SKIP LOCKED
             )
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ProcessingJob>(&query)
            .bind(JOB_STATUS_RUNNING)
            .bind(JOB_STATUS_QUEUED)
            .fetch_optional(pool)
            .await
    }

    /// Finish a job. `note` records why a photo was rejected.
    pub async fn mark_succeeded(
        pool: &PgPool,
        id: DbId,
        note: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE processing_jobs SET status = $2, last_error = $3, finished_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .bind(JOB_STATUS_SUCCEEDED)
        .bind(note)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Put a job back in the queue after a transient failure.
    pub async fn schedule_retry(
        pool: &PgPool,
        id: DbId,
        error: &str,
        delay_secs: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE processing_jobs
             SET status = $2, last_error = $3,
                 run_after = NOW() + make_interval(secs => $4::double precision)
             WHERE id = $1",
        )
        .bind(id)
        .bind(JOB_STATUS_QUEUED)
        .bind(error)
        .bind(delay_secs as f64)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn mark_failed(pool: &PgPool, id: DbId, error: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE processing_jobs SET status = $2, last_error = $3, finished_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .bind(JOB_STATUS_FAILED)
        .bind(error)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Requeue jobs left running by a worker that died mid-job.
    pub async fn requeue_stale(pool: &PgPool, older_than_secs: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE processing_jobs SET status = $1, run_after = NOW()
             WHERE status = $2
               AND started_at < NOW() - make_interval(secs => $3::double precision)",
        )
        .bind(JOB_STATUS_QUEUED)
        .bind(JOB_STATUS_RUNNING)
        .bind(older_than_secs as f64)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}

fn prefixed(alias: &str) -> String {
    COLUMNS
        .split(", ")
        .map(|c| format!("{alias}.{}", c.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}
