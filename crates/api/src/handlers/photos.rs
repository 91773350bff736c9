//! Handlers for profile photo upload, management and retrieval.

use axum::body::Body;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use kindred_core::audit::action_types;
use kindred_core::media::{storage_key, PhotoFormat, DEFAULT_JOB_MAX_ATTEMPTS, PHOTO_STATUS_READY};
use kindred_core::types::DbId;
use kindred_db::models::audit::CreateAuditLog;
use kindred_db::models::photo::{CreatePhoto, Photo};
use kindred_db::models::processing_job::ProcessingJob;
use kindred_db::repositories::{PhotoRepo, ProcessingJobRepo, UserRepo};
use serde::Serialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};
use crate::handlers::record_audit;
use crate::middleware::auth::AuthUser;
use crate::middleware::client::ClientInfo;
use crate::response::DataResponse;
use crate::state::AppState;
use crate::storage::StorageError;

/// Multipart field carrying the image.
const FILE_FIELD: &str = "file";

/// Accepted upload: the pending photo and the job that will process it.
#[derive(Debug, Serialize, ToSchema)]
pub struct UploadAccepted {
    pub photo: Photo,
    pub job_id: DbId,
}

/// Multipart request body, documented for the OpenAPI schema only.
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct PhotoUpload {
    /// JPEG, PNG or WebP image.
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}

fn storage_failure(err: StorageError) -> AppError {
    match err {
        StorageError::NotFound(key) => {
            tracing::warn!(storage_key = %key, "Stored photo is missing");
            AppError::InternalError("Stored photo is missing".into())
        }
        other => AppError::InternalError(other.to_string()),
    }
}

fn multipart_failure(err: axum::extract::multipart::MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("Upload exceeds the size limit".into())
    } else {
        AppError::BadRequest(err.body_text())
    }
}

/// Pull the `file` field out of the form, enforcing the byte limit.
async fn read_file_field(multipart: &mut Multipart, max_bytes: usize) -> AppResult<Vec<u8>> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_failure)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let data = field.bytes().await.map_err(multipart_failure)?;
        if data.len() > max_bytes {
            return Err(AppError::PayloadTooLarge(format!(
                "Upload is {} bytes; the limit is {max_bytes}",
                data.len()
            )));
        }
        if data.is_empty() {
            return Err(AppError::BadRequest("Uploaded file is empty".into()));
        }
        return Ok(data.to_vec());
    }
    Err(AppError::BadRequest(format!(
        "Missing required '{FILE_FIELD}' field"
    )))
}

/// Remove a stored file whose row was never written.
async fn discard_upload(state: &AppState, key: &str) {
    if let Err(err) = state.storage.delete(key).await {
        tracing::warn!(storage_key = %key, error = %err, "Orphaned upload not removed");
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/photos",
    tag = "photos",
    request_body(content = PhotoUpload, content_type = "multipart/form-data"),
    responses(
        (status = 202, description = "Photo stored and queued for processing", body = DataResponse<UploadAccepted>),
        (status = 400, description = "Missing file or unsupported image type"),
        (status = 409, description = "Photo limit reached"),
        (status = 413, description = "Upload too large"),
    ),
    security(("bearer" = []), ("api_key" = []))
)]
pub async fn upload_photo(
    State(state): State<AppState>,
    auth_user: AuthUser,
    client: ClientInfo,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<DataResponse<UploadAccepted>>)> {
    let media = &state.config.media;
    let data = read_file_field(&mut multipart, media.max_upload_bytes).await?;

    let format = PhotoFormat::sniff(&data).ok_or_else(|| {
        AppError::BadRequest("Unsupported image type. Supported: JPEG, PNG, WebP".into())
    })?;

    let key = storage_key(
        auth_user.user_id,
        &uuid::Uuid::new_v4().simple().to_string(),
        format,
    );
    state.storage.put(&key, &data).await.map_err(storage_failure)?;

    let input = CreatePhoto {
        user_id: auth_user.user_id,
        storage_key: key.clone(),
        content_type: format.content_type().to_string(),
        byte_size: data.len() as i64,
    };
    let created = PhotoRepo::create_with_job(
        &state.pool,
        &input,
        DEFAULT_JOB_MAX_ATTEMPTS,
        media.max_photos_per_user,
    )
    .await;
    let (photo, job) = match created {
        Ok(Some(created)) => created,
        Ok(None) => {
            discard_upload(&state, &key).await;
            return Err(AppError::conflict(format!(
                "Photo limit of {} reached",
                media.max_photos_per_user
            )));
        }
        Err(err) => {
            discard_upload(&state, &key).await;
            return Err(err.into());
        }
    };

    record_audit(
        &state,
        &client,
        CreateAuditLog::new(action_types::PHOTO_UPLOAD)
            .by_user(auth_user.user_id)
            .on_entity("photo", photo.id)
            .with_details(json!({
                "content_type": photo.content_type,
                "byte_size": photo.byte_size,
                "job_id": job.id,
            })),
    )
    .await?;
    tracing::info!(
        user_id = auth_user.user_id,
        photo_id = photo.id,
        job_id = job.id,
        byte_size = photo.byte_size,
        "Photo uploaded",
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: UploadAccepted {
                photo,
                job_id: job.id,
            },
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/photos/me",
    tag = "photos",
    responses((status = 200, description = "All of the caller's photos, primary first", body = DataResponse<Vec<Photo>>)),
    security(("bearer" = []), ("api_key" = []))
)]
pub async fn list_my_photos(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> AppResult<Json<DataResponse<Vec<Photo>>>> {
    let photos = PhotoRepo::list_for_user(&state.pool, auth_user.user_id).await?;
    Ok(Json(DataResponse { data: photos }))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/{id}/photos",
    tag = "photos",
    params(("id" = i64, Path, description = "Member id")),
    responses(
        (status = 200, description = "The member's ready photos", body = DataResponse<Vec<Photo>>),
        (status = 404, description = "No such active member"),
    ),
    security(("bearer" = []), ("api_key" = []))
)]
pub async fn list_user_photos(
    State(state): State<AppState>,
    _auth_user: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Vec<Photo>>>> {
    if !UserRepo::is_active(&state.pool, id).await? {
        return Err(AppError::not_found("User", id));
    }
    let photos = PhotoRepo::list_ready_for_user(&state.pool, id).await?;
    Ok(Json(DataResponse { data: photos }))
}

#[utoipa::path(
    put,
    path = "/api/v1/photos/{id}/primary",
    tag = "photos",
    params(("id" = i64, Path, description = "Photo id")),
    responses(
        (status = 200, description = "Photo is now primary", body = DataResponse<Photo>),
        (status = 404, description = "Caller has no such photo"),
        (status = 409, description = "Photo is not ready"),
    ),
    security(("bearer" = []), ("api_key" = []))
)]
pub async fn set_primary_photo(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Photo>>> {
    let photo = PhotoRepo::find_by_id(&state.pool, id)
        .await?
        .filter(|p| p.user_id == auth_user.user_id)
        .ok_or_else(|| AppError::not_found("Photo", id))?;
    if photo.status != PHOTO_STATUS_READY {
        return Err(AppError::conflict(format!(
            "Photo {id} is {}; only ready photos can be primary",
            photo.status
        )));
    }

    let photo = PhotoRepo::set_primary(&state.pool, auth_user.user_id, id)
        .await?
        // Rejected or deleted between the check and the update.
        .ok_or_else(|| AppError::conflict(format!("Photo {id} is no longer ready")))?;
    tracing::info!(user_id = auth_user.user_id, photo_id = id, "Primary photo changed");

    Ok(Json(DataResponse { data: photo }))
}

#[utoipa::path(
    delete,
    path = "/api/v1/photos/{id}",
    tag = "photos",
    params(("id" = i64, Path, description = "Photo id")),
    responses(
        (status = 204, description = "Photo and stored file removed"),
        (status = 404, description = "Caller has no such photo"),
    ),
    security(("bearer" = []), ("api_key" = []))
)]
pub async fn delete_photo(
    State(state): State<AppState>,
    auth_user: AuthUser,
    client: ClientInfo,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    let photo = PhotoRepo::delete(&state.pool, auth_user.user_id, id)
        .await?
        .ok_or_else(|| AppError::not_found("Photo", id))?;

    // The row is gone; a leftover file is only wasted space.
    if let Err(err) = state.storage.delete(&photo.storage_key).await {
        tracing::warn!(photo_id = id, error = %err, "Stored photo not removed");
    }

    record_audit(
        &state,
        &client,
        CreateAuditLog::new(action_types::PHOTO_DELETE)
            .by_user(auth_user.user_id)
            .on_entity("photo", id)
            .with_details(json!({ "was_primary": photo.is_primary })),
    )
    .await?;
    tracing::info!(user_id = auth_user.user_id, photo_id = id, "Photo deleted");

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/v1/jobs/{id}",
    tag = "photos",
    params(("id" = i64, Path, description = "Processing job id")),
    responses(
        (status = 200, description = "Job status", body = DataResponse<ProcessingJob>),
        (status = 404, description = "No such job for the caller's photos"),
    ),
    security(("bearer" = []), ("api_key" = []))
)]
pub async fn get_job(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<ProcessingJob>>> {
    let job = ProcessingJobRepo::find_for_owner(&state.pool, id, auth_user.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("ProcessingJob", id))?;
    Ok(Json(DataResponse { data: job }))
}

#[utoipa::path(
    get,
    path = "/api/v1/photos/{id}/content",
    tag = "photos",
    params(("id" = i64, Path, description = "Photo id")),
    responses(
        (status = 200, description = "Image bytes", content_type = "application/octet-stream"),
        (status = 404, description = "No ready photo of an active member with this id"),
    ),
    security(("bearer" = []), ("api_key" = []))
)]
pub async fn get_photo_content(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<Response> {
    let photo = PhotoRepo::find_by_id(&state.pool, id)
        .await?
        .filter(|p| p.status == PHOTO_STATUS_READY)
        .ok_or_else(|| AppError::not_found("Photo", id))?;
    // Deactivated members drop out of every read, their photos included.
    let own = photo.user_id == auth_user.user_id;
    if !own && !UserRepo::is_active(&state.pool, photo.user_id).await? {
        return Err(AppError::not_found("Photo", id));
    }

    let bytes = state
        .storage
        .get(&photo.storage_key)
        .await
        .map_err(storage_failure)?;

    Ok((
        [
            (header::CONTENT_TYPE, photo.content_type),
            (header::CACHE_CONTROL, "private, max-age=3600".to_string()),
        ],
        Body::from(bytes),
    )
        .into_response())
}
