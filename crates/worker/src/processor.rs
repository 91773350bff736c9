//! Processing of a single claimed job.

use std::path::{Path, PathBuf};

use kindred_core::media::{is_safe_storage_key, job_retry_delay_secs, validate_dimensions};
use kindred_db::models::processing_job::ProcessingJob;
use kindred_db::repositories::{PhotoRepo, ProcessingJobRepo};
use kindred_db::DbPool;

/// Why a stored upload could not be measured.
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("storage key '{0}' is not a safe relative path")]
    UnsafeKey(String),

    #[error("failed to read stored photo: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to decode image header: {0}")]
    Decode(#[from] image::ImageError),
}

impl ReadError {
    /// Whether another attempt could succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::UnsafeKey(_))
    }
}

/// What happened to a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Ready { width: u32, height: u32 },
    Rejected { reason: String },
    Retrying { delay_secs: i64 },
    Failed { reason: String },
}

/// Read width and height from the image header under `root`.
pub fn read_dimensions(root: &Path, key: &str) -> Result<(u32, u32), ReadError> {
    if !is_safe_storage_key(key) {
        return Err(ReadError::UnsafeKey(key.to_string()));
    }
    let reader = image::ImageReader::open(root.join(key))?.with_guessed_format()?;
    Ok(reader.into_dimensions()?)
}

async fn read_dimensions_blocking(root: PathBuf, key: String) -> Result<(u32, u32), ReadError> {
    tokio::task::spawn_blocking(move || read_dimensions(&root, &key))
        .await
        .map_err(|e| ReadError::Io(std::io::Error::other(e)))?
}

/// Run one claimed job to its next state.
///
/// `job.attempts` already counts this attempt.
pub async fn process_job(
    pool: &DbPool,
    storage_root: &Path,
    job: &ProcessingJob,
) -> Result<JobOutcome, sqlx::Error> {
    let Some(photo) = PhotoRepo::find_by_id(pool, job.photo_id).await? else {
        let reason = format!("photo {} no longer exists", job.photo_id);
        ProcessingJobRepo::mark_failed(pool, job.id, &reason).await?;
        return Ok(JobOutcome::Failed { reason });
    };

    let read =
        read_dimensions_blocking(storage_root.to_path_buf(), photo.storage_key.clone()).await;

    match read {
        Ok((width, height)) => match validate_dimensions(width, height) {
            Ok(()) => {
                PhotoRepo::mark_ready(pool, photo.id, width as i32, height as i32).await?;
                ProcessingJobRepo::mark_succeeded(pool, job.id, None).await?;
                tracing::info!(job_id = job.id, photo_id = photo.id, width, height, "Photo ready");
                Ok(JobOutcome::Ready { width, height })
            }
            Err(e) => {
                let reason = e.to_string();
                PhotoRepo::mark_rejected(pool, photo.id).await?;
                ProcessingJobRepo::mark_succeeded(pool, job.id, Some(&reason)).await?;
                tracing::info!(job_id = job.id, photo_id = photo.id, %reason, "Photo rejected");
                Ok(JobOutcome::Rejected { reason })
            }
        },
        Err(e) if e.is_retryable() && job.attempts < job.max_attempts => {
            let delay_secs = job_retry_delay_secs(job.attempts);
            ProcessingJobRepo::schedule_retry(pool, job.id, &e.to_string(), delay_secs).await?;
            tracing::warn!(
                job_id = job.id,
                photo_id = photo.id,
                attempt = job.attempts,
                delay_secs,
                error = %e,
                "Photo processing failed, retrying"
            );
            Ok(JobOutcome::Retrying { delay_secs })
        }
        Err(e) => {
            let reason = e.to_string();
            ProcessingJobRepo::mark_failed(pool, job.id, &reason).await?;
            PhotoRepo::mark_rejected(pool, photo.id).await?;
            tracing::error!(
                job_id = job.id,
                photo_id = photo.id,
                attempts = job.attempts,
                error = %reason,
                "Photo processing failed permanently"
            );
            Ok(JobOutcome::Failed { reason })
        }
    }
}
