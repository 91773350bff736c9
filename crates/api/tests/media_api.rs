//! HTTP-level integration tests for the media service: photo upload,
//! listing, primary selection, deletion, job status and content serving.
//!
//! Processing is simulated with `PhotoRepo::mark_ready`; the worker has its
//! own tests.

mod common;

use std::io::Cursor;

use axum::http::{header, StatusCode};
use common::{
    body_bytes, body_json, build_test_app, build_test_app_with, create_member, delete_auth,
    get_auth, post_multipart_auth, put_auth, TestApp, TestUser,
};
use kindred_api::service::Service;
use kindred_db::repositories::{PhotoRepo, UserRepo};
use sqlx::PgPool;

fn png(width: u32, height: u32) -> Vec<u8> {
    let image = image::RgbImage::from_pixel(width, height, image::Rgb([200, 80, 40]));
    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, image::ImageFormat::Png)
        .expect("PNG encoding should succeed");
    out.into_inner()
}

async fn upload(app: &TestApp, user: &TestUser, bytes: &[u8]) -> axum::response::Response {
    post_multipart_auth(
        app.router(),
        "/api/v1/photos",
        &user.token,
        "file",
        "photo.png",
        "image/png",
        bytes,
    )
    .await
}

/// Upload a PNG and return `(photo_id, job_id)`.
async fn upload_ok(app: &TestApp, user: &TestUser) -> (i64, i64) {
    let response = upload(app, user, &png(320, 240)).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = body_json(response).await;
    (
        json["data"]["photo"]["id"].as_i64().unwrap(),
        json["data"]["job_id"].as_i64().unwrap(),
    )
}

// ---------------------------------------------------------------------------
// Upload
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_upload_stores_file_and_queues_job(pool: PgPool) {
    let user = create_member(&pool, "snap@example.com").await;
    let app = build_test_app(pool.clone(), Service::Media);

    let response = upload(&app, &user, &png(320, 240)).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = body_json(response).await;
    let photo = &json["data"]["photo"];
    assert_eq!(photo["status"], "pending");
    assert_eq!(photo["content_type"], "image/png");
    assert_eq!(photo["is_primary"], false);
    assert!(photo["storage_key"].is_null(), "storage key stays internal");

    let photo_id = photo["id"].as_i64().unwrap();
    let stored = PhotoRepo::find_by_id(&pool, photo_id).await.unwrap().unwrap();
    assert!(stored.storage_key.starts_with(&format!("{}/", user.id)));
    assert!(app.storage_root().join(&stored.storage_key).is_file());

    let job_id = json["data"]["job_id"].as_i64().unwrap();
    let job = body_json(
        get_auth(app.router(), &format!("/api/v1/jobs/{job_id}"), &user.token).await,
    )
    .await;
    assert_eq!(job["data"]["status"], "queued");
    assert_eq!(job["data"]["photo_id"], photo_id);
    assert_eq!(job["data"]["attempts"], 0);
    app.cleanup();
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_upload_rejects_non_images_and_missing_field(pool: PgPool) {
    let user = create_member(&pool, "text@example.com").await;
    let app = build_test_app(pool, Service::Media);

    let response = upload(&app, &user, b"just some text, not a picture").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = post_multipart_auth(
        app.router(),
        "/api/v1/photos",
        &user.token,
        "avatar",
        "photo.png",
        "image/png",
        &png(300, 300),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    app.cleanup();
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_upload_over_size_limit_is_413(pool: PgPool) {
    let user = create_member(&pool, "huge@example.com").await;
    let app = build_test_app_with(pool, Service::Media, |config| {
        config.media.max_upload_bytes = 64;
    });

    let response = upload(&app, &user, &png(300, 300)).await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body_json(response).await["code"], "PAYLOAD_TOO_LARGE");
    app.cleanup();
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_upload_cap_per_user(pool: PgPool) {
    let user = create_member(&pool, "many@example.com").await;
    let app = build_test_app_with(pool, Service::Media, |config| {
        config.media.max_photos_per_user = 2;
    });

    upload_ok(&app, &user).await;
    upload_ok(&app, &user).await;
    let response = upload(&app, &user, &png(320, 240)).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    app.cleanup();
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_concurrent_uploads_never_exceed_cap(pool: PgPool) {
    let user = create_member(&pool, "burst@example.com").await;
    let app = build_test_app_with(pool.clone(), Service::Media, |config| {
        config.media.max_photos_per_user = 3;
    });
    let bytes = png(320, 240);

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let router = app.router();
            let token = user.token.clone();
            let bytes = bytes.clone();
            tokio::spawn(async move {
                post_multipart_auth(
                    router,
                    "/api/v1/photos",
                    &token,
                    "file",
                    "photo.png",
                    "image/png",
                    &bytes,
                )
                .await
                .status()
            })
        })
        .collect();

    let (mut accepted, mut refused) = (0, 0);
    for handle in handles {
        match handle.await.unwrap() {
            StatusCode::ACCEPTED => accepted += 1,
            StatusCode::CONFLICT => refused += 1,
            other => panic!("unexpected upload status {other}"),
        }
    }
    assert_eq!((accepted, refused), (3, 7));
    assert_eq!(PhotoRepo::list_for_user(&pool, user.id).await.unwrap().len(), 3);

    // Refused uploads leave no files behind.
    let files = std::fs::read_dir(app.storage_root().join(user.id.to_string()))
        .unwrap()
        .count();
    assert_eq!(files, 3);
    app.cleanup();
}

// ---------------------------------------------------------------------------
// Listing, primary, content
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_first_ready_photo_becomes_primary_and_can_be_switched(pool: PgPool) {
    let user = create_member(&pool, "primary@example.com").await;
    let app = build_test_app(pool.clone(), Service::Media);

    let (first, _) = upload_ok(&app, &user).await;
    let (second, _) = upload_ok(&app, &user).await;

    // Pending photos cannot be primary.
    let response =
        put_auth(app.router(), &format!("/api/v1/photos/{second}/primary"), &user.token).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let ready = PhotoRepo::mark_ready(&pool, first, 320, 240).await.unwrap().unwrap();
    assert!(ready.is_primary);
    let ready = PhotoRepo::mark_ready(&pool, second, 320, 240).await.unwrap().unwrap();
    assert!(!ready.is_primary);

    let response =
        put_auth(app.router(), &format!("/api/v1/photos/{second}/primary"), &user.token).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["is_primary"], true);

    let mine = body_json(get_auth(app.router(), "/api/v1/photos/me", &user.token).await).await;
    let primaries: Vec<i64> = mine["data"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|p| p["is_primary"] == true)
        .map(|p| p["id"].as_i64().unwrap())
        .collect();
    assert_eq!(primaries, vec![second]);
    app.cleanup();
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_others_see_only_ready_photos(pool: PgPool) {
    let owner = create_member(&pool, "owner@example.com").await;
    let viewer = create_member(&pool, "viewer@example.com").await;
    let app = build_test_app(pool.clone(), Service::Media);

    let (ready, _) = upload_ok(&app, &owner).await;
    let (pending, _) = upload_ok(&app, &owner).await;
    PhotoRepo::mark_ready(&pool, ready, 320, 240).await.unwrap();

    let listed = body_json(
        get_auth(app.router(), &format!("/api/v1/users/{}/photos", owner.id), &viewer.token).await,
    )
    .await;
    let ids: Vec<i64> = listed["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![ready]);

    let content =
        get_auth(app.router(), &format!("/api/v1/photos/{ready}/content"), &viewer.token).await;
    assert_eq!(content.status(), StatusCode::OK);
    assert_eq!(content.headers()[header::CONTENT_TYPE], "image/png");
    let bytes = body_bytes(content).await;
    assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");

    let hidden =
        get_auth(app.router(), &format!("/api/v1/photos/{pending}/content"), &viewer.token).await;
    assert_eq!(hidden.status(), StatusCode::NOT_FOUND);

    let unknown = get_auth(app.router(), "/api/v1/users/999999/photos", &viewer.token).await;
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
    app.cleanup();
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_photo_content_of_deactivated_owner_is_hidden(pool: PgPool) {
    let owner = create_member(&pool, "leaving@example.com").await;
    let viewer = create_member(&pool, "looker@example.com").await;
    let app = build_test_app(pool.clone(), Service::Media);

    let (photo_id, _) = upload_ok(&app, &owner).await;
    PhotoRepo::mark_ready(&pool, photo_id, 320, 240).await.unwrap();
    let uri = format!("/api/v1/photos/{photo_id}/content");
    assert_eq!(get_auth(app.router(), &uri, &viewer.token).await.status(), StatusCode::OK);

    UserRepo::deactivate(&pool, owner.id).await.unwrap();

    let hidden = get_auth(app.router(), &uri, &viewer.token).await;
    assert_eq!(hidden.status(), StatusCode::NOT_FOUND);
    app.cleanup();
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_delete_removes_row_and_file(pool: PgPool) {
    let user = create_member(&pool, "delete@example.com").await;
    let other = create_member(&pool, "other@example.com").await;
    let app = build_test_app(pool.clone(), Service::Media);

    let (photo_id, job_id) = upload_ok(&app, &user).await;
    let key = PhotoRepo::find_by_id(&pool, photo_id).await.unwrap().unwrap().storage_key;
    let path = app.storage_root().join(key);
    assert!(path.is_file());

    let foreign =
        delete_auth(app.router(), &format!("/api/v1/photos/{photo_id}"), &other.token).await;
    assert_eq!(foreign.status(), StatusCode::NOT_FOUND);
    let foreign_job = get_auth(app.router(), &format!("/api/v1/jobs/{job_id}"), &other.token).await;
    assert_eq!(foreign_job.status(), StatusCode::NOT_FOUND);

    let response =
        delete_auth(app.router(), &format!("/api/v1/photos/{photo_id}"), &user.token).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(!path.exists());
    assert!(PhotoRepo::find_by_id(&pool, photo_id).await.unwrap().is_none());

    let job = get_auth(app.router(), &format!("/api/v1/jobs/{job_id}"), &user.token).await;
    assert_eq!(job.status(), StatusCode::NOT_FOUND);
    app.cleanup();
}
