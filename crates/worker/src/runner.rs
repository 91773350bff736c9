//! Polling loop around [`process_job`].

use std::path::Path;

use kindred_db::repositories::ProcessingJobRepo;
use kindred_db::DbPool;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::config::WorkerConfig;
use crate::processor::{process_job, JobOutcome};

/// Claim and process one due job. `None` when the queue has nothing due.
pub async fn run_once(
    pool: &DbPool,
    storage_root: &Path,
) -> Result<Option<(i64, JobOutcome)>, sqlx::Error> {
    let Some(job) = ProcessingJobRepo::claim_next(pool).await? else {
        return Ok(None);
    };
    tracing::debug!(
        job_id = job.id,
        photo_id = job.photo_id,
        attempt = job.attempts,
        "Claimed job"
    );
    let outcome = process_job(pool, storage_root, &job).await?;
    Ok(Some((job.id, outcome)))
}

/// Process due jobs until the queue is empty or `cancel` fires.
async fn drain(pool: &DbPool, config: &WorkerConfig, cancel: &CancellationToken) -> usize {
    let mut processed = 0;
    while !cancel.is_cancelled() {
        match run_once(pool, &config.storage_root).await {
            Ok(Some(_)) => processed += 1,
            Ok(None) => break,
            Err(e) => {
                tracing::error!(error = %e, "Job processing hit a database error");
                break;
            }
        }
    }
    processed
}

/// Run the worker until `cancel` fires.
pub async fn run(pool: DbPool, config: WorkerConfig, cancel: CancellationToken) {
    let mut poll = tokio::time::interval(config.poll_interval);
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut stale = tokio::time::interval(config.stale_check_interval);
    stale.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(
        storage_root = %config.storage_root.display(),
        poll_ms = config.poll_interval.as_millis() as u64,
        "Photo worker started"
    );

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = stale.tick() => {
                match ProcessingJobRepo::requeue_stale(&pool, config.stale_after_secs).await {
                    Ok(0) => {}
                    Ok(count) => tracing::warn!(count, "Requeued abandoned jobs"),
                    Err(e) => tracing::error!(error = %e, "Failed to requeue abandoned jobs"),
                }
            }
            _ = poll.tick() => {
                let processed = drain(&pool, &config, &cancel).await;
                if processed > 0 {
                    tracing::debug!(processed, "Drained job queue");
                }
            }
        }
    }

    tracing::info!("Photo worker stopped");
}
