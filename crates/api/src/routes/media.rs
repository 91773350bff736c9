//! Route definitions for the media service.

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post, put};
use axum::Router;

use crate::handlers::photos;
use crate::state::AppState;

/// Room for multipart boundaries and headers on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// ```text
/// POST   /photos                    -> upload_photo (multipart)
/// GET    /photos/me                 -> list_my_photos
/// PUT    /photos/{id}/primary       -> set_primary_photo
/// DELETE /photos/{id}               -> delete_photo
/// GET    /photos/{id}/content       -> get_photo_content
/// GET    /users/{id}/photos         -> list_user_photos
/// GET    /jobs/{id}                 -> get_job
/// ```
pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    let upload = Router::new()
        .route("/photos", post(photos::upload_photo))
        .layer(DefaultBodyLimit::max(
            max_upload_bytes.saturating_add(MULTIPART_OVERHEAD_BYTES),
        ));

    Router::new()
        .merge(upload)
        .route("/photos/me", get(photos::list_my_photos))
        .route("/photos/{id}", delete(photos::delete_photo))
        .route("/photos/{id}/primary", put(photos::set_primary_photo))
        .route("/photos/{id}/content", get(photos::get_photo_content))
        .route("/users/{id}/photos", get(photos::list_user_photos))
        .route("/jobs/{id}", get(photos::get_job))
}
