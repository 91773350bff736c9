use std::time::Duration;

use kindred_db::models::user::CreateUser;
use kindred_db::repositories::{NotificationRepo, UserRepo};
use kindred_events::{event_types, EventBus, NotificationWriter, PlatformEvent};
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

async fn new_user(pool: &PgPool, email: &str) -> i64 {
    UserRepo::create(
        pool,
        &CreateUser {
            email: email.to_string(),
            password_hash: "x".to_string(),
            role_id: 3,
        },
    )
    .await
    .unwrap()
    .id
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_writer_stores_match_notifications(pool: PgPool) {
    let a = new_user(&pool, "a@example.com").await;
    let b = new_user(&pool, "b@example.com").await;

    let bus = EventBus::default();
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(NotificationWriter::run(
        pool.clone(),
        bus.subscribe(),
        cancel.clone(),
    ));

    bus.publish(
        PlatformEvent::new(event_types::MATCH_CREATED)
            .with_payload(serde_json::json!({"match_id": 1, "user_a_id": a, "user_b_id": b})),
    );

    // Poll until the background task has written both rows.
    let mut stored = 0;
    for _ in 0..50 {
        stored = NotificationRepo::unread_count(&pool, a).await.unwrap()
            + NotificationRepo::unread_count(&pool, b).await.unwrap();
        if stored == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(stored, 2);

    cancel.cancel();
    handle.await.unwrap();
}
