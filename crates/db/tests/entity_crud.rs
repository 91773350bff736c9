//! Repository integration tests against a real database.
//!
//! Covers the multi-statement operations (photo upload, mutual likes,
//! plan changes, the audit chain) and the unique constraints the API
//! maps to 409 responses.

use assert_matches::assert_matches;
use chrono::{Duration, NaiveDate, Utc};
use kindred_core::audit::action_types;
use kindred_core::subscription::Plan;
use kindred_db::models::audit::{AuditQuery, CreateAuditLog};
use kindred_db::models::matches::MATCH_STATUS_UNMATCHED;
use kindred_db::models::notification::{CreateNotification, KIND_NEW_MATCH};
use kindred_db::models::payment::CreatePayment;
use kindred_db::models::photo::CreatePhoto;
use kindred_db::models::profile::{ProfileSearch, UpsertProfile};
use kindred_db::models::swipe::{LikeQuota, QuotaSwipe, DIRECTION_LIKE, DIRECTION_PASS};
use kindred_db::models::user::CreateUser;
use kindred_db::repositories::{
    AuditRepo, MatchRepo, MessageRepo, NotificationRepo, PaymentRepo, PhotoRepo,
    ProcessingJobRepo, ProfileRepo, SubscriptionRepo, SwipeRepo, UserRepo,
};
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const MEMBER_ROLE_ID: i64 = 3;

async fn new_user(pool: &PgPool, email: &str) -> i64 {
    UserRepo::create(
        pool,
        &CreateUser {
            email: email.to_string(),
            password_hash: "not-a-real-hash".to_string(),
            role_id: MEMBER_ROLE_ID,
        },
    )
    .await
    .unwrap()
    .id
}

fn profile(name: &str, gender: &str, interested_in: &[&str]) -> UpsertProfile {
    UpsertProfile {
        display_name: name.to_string(),
        birthdate: NaiveDate::from_ymd_opt(1995, 6, 15).unwrap(),
        gender: gender.to_string(),
        interested_in: interested_in.iter().map(|s| s.to_string()).collect(),
        bio: Some(format!("{name} likes long walks")),
        city: Some("Lisbon".to_string()),
        latitude: Some(38.72),
        longitude: Some(-9.14),
        interests: vec!["hiking".to_string(), "jazz".to_string()],
        min_age_pref: 18,
        max_age_pref: 120,
        max_distance_km: 50,
    }
}

fn unique_violation(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
            db.constraint().map(str::to_string)
        }
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_duplicate_email_violates_uq_users_email(pool: PgPool) {
    new_user(&pool, "ana@example.com").await;
    let err = UserRepo::create(
        &pool,
        &CreateUser {
            email: "ana@example.com".to_string(),
            password_hash: "x".to_string(),
            role_id: MEMBER_ROLE_ID,
        },
    )
    .await
    .unwrap_err();
    assert_eq!(unique_violation(&err).as_deref(), Some("uq_users_email"));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_find_by_email_is_case_insensitive(pool: PgPool) {
    let id = new_user(&pool, "bea@example.com").await;
    let found = UserRepo::find_by_email(&pool, "BEA@Example.com").await.unwrap();
    assert_eq!(found.map(|u| u.id), Some(id));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_failed_logins_then_success_resets(pool: PgPool) {
    let id = new_user(&pool, "cy@example.com").await;
    assert_eq!(UserRepo::increment_failed_login(&pool, id).await.unwrap(), 1);
    assert_eq!(UserRepo::increment_failed_login(&pool, id).await.unwrap(), 2);
    UserRepo::lock_account(&pool, id, Utc::now() + Duration::minutes(15))
        .await
        .unwrap();

    UserRepo::record_successful_login(&pool, id).await.unwrap();
    let user = UserRepo::find_by_id(&pool, id).await.unwrap().unwrap();
    assert_eq!(user.failed_login_count, 0);
    assert!(user.locked_until.is_none());
    assert!(user.last_login_at.is_some());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_deactivate_is_idempotent(pool: PgPool) {
    let id = new_user(&pool, "dee@example.com").await;
    assert!(UserRepo::deactivate(&pool, id).await.unwrap());
    assert!(!UserRepo::deactivate(&pool, id).await.unwrap());
    assert!(!UserRepo::is_active(&pool, id).await.unwrap());
}

// ---------------------------------------------------------------------------
// Profiles and discovery
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_profile_upsert_replaces_fields(pool: PgPool) {
    let id = new_user(&pool, "eli@example.com").await;
    ProfileRepo::upsert(&pool, id, &profile("Eli", "man", &["woman"]))
        .await
        .unwrap();

    let mut changed = profile("Eli R", "man", &["woman", "nonbinary"]);
    changed.city = None;
    changed.latitude = None;
    changed.longitude = None;
    let saved = ProfileRepo::upsert(&pool, id, &changed).await.unwrap();

    assert_eq!(saved.display_name, "Eli R");
    assert_eq!(saved.interested_in, vec!["woman", "nonbinary"]);
    assert!(saved.city.is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_discovery_pool_excludes_swiped_and_incompatible(pool: PgPool) {
    let seeker = new_user(&pool, "seeker@example.com").await;
    let fits = new_user(&pool, "fits@example.com").await;
    let swiped = new_user(&pool, "swiped@example.com").await;
    let wrong_gender = new_user(&pool, "wrong@example.com").await;
    let inactive = new_user(&pool, "inactive@example.com").await;

    ProfileRepo::upsert(&pool, seeker, &profile("Seeker", "woman", &["man"])).await.unwrap();
    ProfileRepo::upsert(&pool, fits, &profile("Fits", "man", &["woman"])).await.unwrap();
    ProfileRepo::upsert(&pool, swiped, &profile("Swiped", "man", &["woman"])).await.unwrap();
    ProfileRepo::upsert(&pool, wrong_gender, &profile("Wrong", "woman", &["man"]))
        .await
        .unwrap();
    ProfileRepo::upsert(&pool, inactive, &profile("Gone", "man", &["woman"])).await.unwrap();

    SwipeRepo::record(&pool, seeker, swiped, DIRECTION_PASS).await.unwrap();
    UserRepo::deactivate(&pool, inactive).await.unwrap();

    let row = ProfileRepo::find_discovery_row(&pool, seeker).await.unwrap().unwrap();
    let pool_rows = ProfileRepo::discovery_pool(&pool, &row, 100).await.unwrap();
    let ids: Vec<i64> = pool_rows.iter().map(|r| r.user_id).collect();
    assert_eq!(ids, vec![fits]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_search_filters_and_counts(pool: PgPool) {
    let caller = new_user(&pool, "caller@example.com").await;
    let a = new_user(&pool, "a@example.com").await;
    let b = new_user(&pool, "b@example.com").await;

    ProfileRepo::upsert(&pool, caller, &profile("Caller", "woman", &["man"])).await.unwrap();
    ProfileRepo::upsert(&pool, a, &profile("Alex", "man", &["woman"])).await.unwrap();
    let mut other = profile("Bo_100%", "nonbinary", &["woman"]);
    other.city = Some("Porto".to_string());
    other.interests = vec!["chess".to_string()];
    ProfileRepo::upsert(&pool, b, &other).await.unwrap();

    let (rows, total) = ProfileRepo::search(
        &pool,
        &ProfileSearch {
            exclude_user_id: caller,
            city: Some("LISBON".to_string()),
            limit: 20,
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(total, 1);
    assert_eq!(rows[0].user_id, a);

    let (rows, _) = ProfileRepo::search(
        &pool,
        &ProfileSearch {
            exclude_user_id: caller,
            interests: vec!["chess".to_string(), "golf".to_string()],
            limit: 20,
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(rows.iter().map(|r| r.user_id).collect::<Vec<_>>(), vec![b]);

    // `%` and `_` in the query match literally.
    let (_, total) = ProfileRepo::search(
        &pool,
        &ProfileSearch {
            exclude_user_id: caller,
            text: Some("o_100%".to_string()),
            limit: 20,
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(total, 1);

    let (_, total) = ProfileRepo::search(
        &pool,
        &ProfileSearch {
            exclude_user_id: caller,
            text: Some("%".to_string()),
            limit: 20,
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(total, 1);
}

// ---------------------------------------------------------------------------
// Photos and processing jobs
// ---------------------------------------------------------------------------

fn new_photo(user_id: i64, key: &str) -> CreatePhoto {
    CreatePhoto {
        user_id,
        storage_key: key.to_string(),
        content_type: "image/png".to_string(),
        byte_size: 1024,
    }
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_photo_upload_queues_job_and_first_ready_becomes_primary(pool: PgPool) {
    let user = new_user(&pool, "pics@example.com").await;
    let (first, job) = PhotoRepo::create_with_job(&pool, &new_photo(user, "1/a.png"), 3, 6)
        .await
        .unwrap()
        .unwrap();
    let (second, _) = PhotoRepo::create_with_job(&pool, &new_photo(user, "1/b.png"), 3, 6)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.status, "pending");
    assert_eq!(job.photo_id, first.id);
    assert_eq!(job.status, "queued");

    let claimed = ProcessingJobRepo::claim_next(&pool).await.unwrap().unwrap();
    assert_eq!(claimed.id, job.id);
    assert_eq!(claimed.status, "running");
    assert_eq!(claimed.attempts, 1);

    let ready = PhotoRepo::mark_ready(&pool, first.id, 640, 480).await.unwrap().unwrap();
    assert!(ready.is_primary);
    let ready_second = PhotoRepo::mark_ready(&pool, second.id, 640, 480)
        .await
        .unwrap()
        .unwrap();
    assert!(!ready_second.is_primary);

    let switched = PhotoRepo::set_primary(&pool, user, second.id).await.unwrap().unwrap();
    assert!(switched.is_primary);
    let first_again = PhotoRepo::find_by_id(&pool, first.id).await.unwrap().unwrap();
    assert!(!first_again.is_primary);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_set_primary_rejects_pending_and_foreign_photos(pool: PgPool) {
    let owner = new_user(&pool, "owner@example.com").await;
    let other = new_user(&pool, "other@example.com").await;
    let (photo, _) = PhotoRepo::create_with_job(&pool, &new_photo(owner, "2/a.png"), 3, 6)
        .await
        .unwrap()
        .unwrap();

    assert!(PhotoRepo::set_primary(&pool, owner, photo.id).await.unwrap().is_none());
    PhotoRepo::mark_ready(&pool, photo.id, 300, 300).await.unwrap();
    assert!(PhotoRepo::set_primary(&pool, other, photo.id).await.unwrap().is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_retry_defers_job_until_run_after(pool: PgPool) {
    let user = new_user(&pool, "retry@example.com").await;
    let (_, job) = PhotoRepo::create_with_job(&pool, &new_photo(user, "3/a.png"), 3, 6)
        .await
        .unwrap()
        .unwrap();

    ProcessingJobRepo::claim_next(&pool).await.unwrap().unwrap();
    ProcessingJobRepo::schedule_retry(&pool, job.id, "disk hiccup", 60)
        .await
        .unwrap();

    assert!(ProcessingJobRepo::claim_next(&pool).await.unwrap().is_none());
    let stored = ProcessingJobRepo::find_by_id(&pool, job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, "queued");
    assert_eq!(stored.last_error.as_deref(), Some("disk hiccup"));

    let owned = ProcessingJobRepo::find_for_owner(&pool, job.id, user).await.unwrap();
    assert!(owned.is_some());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_rejected_photos_do_not_count_against_cap(pool: PgPool) {
    let user = new_user(&pool, "cap@example.com").await;
    let (a, _) = PhotoRepo::create_with_job(&pool, &new_photo(user, "4/a.png"), 3, 2)
        .await
        .unwrap()
        .unwrap();
    PhotoRepo::create_with_job(&pool, &new_photo(user, "4/b.png"), 3, 2)
        .await
        .unwrap()
        .unwrap();
    let over = PhotoRepo::create_with_job(&pool, &new_photo(user, "4/c.png"), 3, 2)
        .await
        .unwrap();
    assert!(over.is_none());

    PhotoRepo::mark_rejected(&pool, a.id).await.unwrap();
    let after_reject = PhotoRepo::create_with_job(&pool, &new_photo(user, "4/c.png"), 3, 2)
        .await
        .unwrap();
    assert!(after_reject.is_some());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_photo_cap_holds_under_concurrent_uploads(pool: PgPool) {
    let user = new_user(&pool, "burst@example.com").await;
    let handles: Vec<_> = (0..10)
        .map(|i| {
            let pool = pool.clone();
            tokio::spawn(async move {
                PhotoRepo::create_with_job(&pool, &new_photo(user, &format!("5/{i}.png")), 3, 4)
                    .await
                    .unwrap()
                    .is_some()
            })
        })
        .collect();

    let mut created = 0;
    for handle in handles {
        if handle.await.unwrap() {
            created += 1;
        }
    }
    assert_eq!(created, 4);
    assert_eq!(PhotoRepo::list_for_user(&pool, user).await.unwrap().len(), 4);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_concurrent_ready_photos_leave_one_primary(pool: PgPool) {
    let user = new_user(&pool, "race@example.com").await;
    let mut ids = Vec::new();
    for i in 0..6 {
        let (photo, _) =
            PhotoRepo::create_with_job(&pool, &new_photo(user, &format!("6/{i}.png")), 3, 6)
                .await
                .unwrap()
                .unwrap();
        ids.push(photo.id);
    }

    let handles: Vec<_> = ids
        .into_iter()
        .map(|id| {
            let pool = pool.clone();
            tokio::spawn(async move { PhotoRepo::mark_ready(&pool, id, 640, 480).await.unwrap() })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    let primaries = PhotoRepo::list_for_user(&pool, user)
        .await
        .unwrap()
        .into_iter()
        .filter(|p| p.is_primary)
        .count();
    assert_eq!(primaries, 1);
}

// ---------------------------------------------------------------------------
// Subscriptions and payments
// ---------------------------------------------------------------------------

fn payment(reference: &str) -> CreatePayment {
    CreatePayment {
        amount_cents: Plan::Premium.price_cents(),
        currency: "EUR".to_string(),
        provider: "manual".to_string(),
        provider_reference: reference.to_string(),
    }
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_change_plan_closes_old_and_records_payment(pool: PgPool) {
    let user = new_user(&pool, "sub@example.com").await;
    let free = SubscriptionRepo::create_free(&pool, user).await.unwrap();
    assert!(free.current_period_end.is_none());

    let (premium, paid) =
        SubscriptionRepo::change_plan(&pool, user, Plan::Premium, Some(&payment("ref-1")))
            .await
            .unwrap();
    assert_eq!(premium.plan, "premium");
    assert!(premium.current_period_end.is_some());
    assert_eq!(paid.unwrap().subscription_id, Some(premium.id));

    let active = SubscriptionRepo::find_active(&pool, user).await.unwrap().unwrap();
    assert_eq!(active.id, premium.id);
    assert_eq!(PaymentRepo::count_for_user(&pool, user).await.unwrap(), 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_reused_payment_reference_rolls_back(pool: PgPool) {
    let user = new_user(&pool, "dup@example.com").await;
    SubscriptionRepo::create_free(&pool, user).await.unwrap();
    SubscriptionRepo::change_plan(&pool, user, Plan::Premium, Some(&payment("ref-2")))
        .await
        .unwrap();

    let err = SubscriptionRepo::change_plan(&pool, user, Plan::Premium, Some(&payment("ref-2")))
        .await
        .unwrap_err();
    assert_eq!(
        unique_violation(&err).as_deref(),
        Some("uq_payments_provider_reference")
    );

    // The failed transaction left the previous subscription active.
    assert!(SubscriptionRepo::find_active(&pool, user).await.unwrap().is_some());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_lapsed_subscription_falls_back_to_free(pool: PgPool) {
    let user = new_user(&pool, "lapse@example.com").await;
    SubscriptionRepo::change_plan(&pool, user, Plan::Premium, Some(&payment("ref-3")))
        .await
        .unwrap();
    sqlx::query("UPDATE subscriptions SET current_period_end = NOW() - INTERVAL '1 day'")
        .execute(&pool)
        .await
        .unwrap();

    let free = SubscriptionRepo::expire_if_lapsed(&pool, user).await.unwrap().unwrap();
    assert_eq!(free.plan, "free");
    assert!(SubscriptionRepo::expire_if_lapsed(&pool, user).await.unwrap().is_none());
}

// ---------------------------------------------------------------------------
// Audit chain
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_audit_chain_verifies_and_detects_tampering(pool: PgPool) {
    let user = new_user(&pool, "audit@example.com").await;
    for action in [action_types::REGISTER, action_types::LOGIN, action_types::LOGOUT] {
        AuditRepo::append(
            &pool,
            &CreateAuditLog::new(action)
                .by_user(user)
                .on_entity("user", user)
                .with_details(serde_json::json!({"password": "hunter2", "ip": "10.0.0.1"})),
        )
        .await
        .unwrap();
    }

    let report = AuditRepo::verify_chain(&pool).await.unwrap();
    assert!(report.is_intact);
    assert_eq!(report.entries_checked, 3);

    let (rows, total) = AuditRepo::query(
        &pool,
        &AuditQuery {
            action_type: Some(action_types::LOGIN.to_string()),
            limit: 10,
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(total, 1);
    let details = rows[0].details_json.as_ref().unwrap();
    assert_eq!(details["password"], "[REDACTED]");
    assert_eq!(details["ip"], "10.0.0.1");

    sqlx::query("UPDATE audit_logs SET action_type = 'forged' WHERE id = $1")
        .bind(rows[0].id)
        .execute(&pool)
        .await
        .unwrap();
    let report = AuditRepo::verify_chain(&pool).await.unwrap();
    assert!(!report.is_intact);
    assert_eq!(report.first_broken_id, Some(rows[0].id));
}

// ---------------------------------------------------------------------------
// Swipes, matches, messages
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_mutual_like_creates_ordered_match(pool: PgPool) {
    let a = new_user(&pool, "a1@example.com").await;
    let b = new_user(&pool, "b1@example.com").await;

    let first = SwipeRepo::record(&pool, b, a, DIRECTION_LIKE).await.unwrap();
    assert!(first.new_match.is_none());

    let second = SwipeRepo::record(&pool, a, b, DIRECTION_LIKE).await.unwrap();
    let matched = second.new_match.unwrap();
    assert!(matched.user_a_id < matched.user_b_id);
    assert!(matched.involves(a) && matched.involves(b));

    let err = SwipeRepo::record(&pool, a, b, DIRECTION_LIKE).await.unwrap_err();
    assert_eq!(unique_violation(&err).as_deref(), Some("uq_swipes_pair"));

    let likes: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM swipes WHERE swiper_id = $1 AND direction = 'like'",
    )
    .bind(a)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(likes, 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_like_quota_holds_under_concurrent_likes(pool: PgPool) {
    let swiper = new_user(&pool, "quota@example.com").await;
    let mut targets = Vec::new();
    for i in 0..8 {
        targets.push(new_user(&pool, &format!("quota-target{i}@example.com")).await);
    }
    let quota = LikeQuota {
        limit: 3,
        since: Utc::now() - Duration::hours(1),
    };

    let handles: Vec<_> = targets
        .into_iter()
        .map(|target| {
            let pool = pool.clone();
            tokio::spawn(async move {
                SwipeRepo::record_like_within_quota(&pool, swiper, target, quota)
                    .await
                    .unwrap()
            })
        })
        .collect();

    let (mut recorded, mut refused) = (0, 0);
    for handle in handles {
        match handle.await.unwrap() {
            QuotaSwipe::Recorded(_) => recorded += 1,
            QuotaSwipe::LimitReached { likes_today } => {
                assert_eq!(likes_today, 3);
                refused += 1;
            }
        }
    }
    assert_eq!((recorded, refused), (3, 5));

    let stored: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM swipes WHERE swiper_id = $1")
        .bind(swiper)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(stored, 3);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_like_quota_ignores_likes_before_the_window(pool: PgPool) {
    let swiper = new_user(&pool, "window@example.com").await;
    let old = new_user(&pool, "old-like@example.com").await;
    let fresh = new_user(&pool, "fresh-like@example.com").await;
    SwipeRepo::record(&pool, swiper, old, DIRECTION_LIKE).await.unwrap();
    sqlx::query("UPDATE swipes SET created_at = NOW() - INTERVAL '2 days' WHERE swiper_id = $1")
        .bind(swiper)
        .execute(&pool)
        .await
        .unwrap();

    let quota = LikeQuota {
        limit: 1,
        since: Utc::now() - Duration::hours(1),
    };
    let result = SwipeRepo::record_like_within_quota(&pool, swiper, fresh, quota)
        .await
        .unwrap();
    assert_matches!(result, QuotaSwipe::Recorded(_));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_like_then_pass_does_not_match(pool: PgPool) {
    let a = new_user(&pool, "a2@example.com").await;
    let b = new_user(&pool, "b2@example.com").await;
    SwipeRepo::record(&pool, a, b, DIRECTION_LIKE).await.unwrap();
    let outcome = SwipeRepo::record(&pool, b, a, DIRECTION_PASS).await.unwrap();
    assert!(outcome.new_match.is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_conversations_track_last_message_and_unread(pool: PgPool) {
    let a = new_user(&pool, "a3@example.com").await;
    let b = new_user(&pool, "b3@example.com").await;
    ProfileRepo::upsert(&pool, b, &profile("Bee", "man", &["woman"])).await.unwrap();
    SwipeRepo::record(&pool, a, b, DIRECTION_LIKE).await.unwrap();
    let matched = SwipeRepo::record(&pool, b, a, DIRECTION_LIKE)
        .await
        .unwrap()
        .new_match
        .unwrap();

    MessageRepo::create(&pool, matched.id, b, "hi").await.unwrap().unwrap();
    let latest = MessageRepo::create(&pool, matched.id, b, "there?")
        .await
        .unwrap()
        .unwrap();

    let convos = MatchRepo::list_conversations(&pool, a, 20, 0).await.unwrap();
    assert_eq!(convos.len(), 1);
    assert_eq!(convos[0].other_user_id, b);
    assert_eq!(convos[0].display_name.as_deref(), Some("Bee"));
    assert_eq!(convos[0].last_message_body.as_deref(), Some("there?"));
    assert_eq!(convos[0].unread_count, 2);

    let older = MessageRepo::list_page(&pool, matched.id, Some(latest.id), 10)
        .await
        .unwrap();
    assert_eq!(older.len(), 1);
    assert_eq!(older[0].body, "hi");

    // The sender's own messages are never "unread" for them.
    assert_eq!(MessageRepo::mark_read(&pool, matched.id, b).await.unwrap(), 0);
    assert_eq!(MessageRepo::mark_read(&pool, matched.id, a).await.unwrap(), 2);

    let ended = MatchRepo::unmatch(&pool, matched.id, a).await.unwrap().unwrap();
    assert_eq!(ended.status, MATCH_STATUS_UNMATCHED);
    assert_eq!(ended.unmatched_by, Some(a));
    assert!(MatchRepo::list_for_user(&pool, b, 20, 0).await.unwrap().is_empty());
    assert!(MatchRepo::unmatch(&pool, matched.id, b).await.unwrap().is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_messages_need_an_active_match_and_a_participant(pool: PgPool) {
    let a = new_user(&pool, "a4@example.com").await;
    let b = new_user(&pool, "b4@example.com").await;
    let outsider = new_user(&pool, "c4@example.com").await;
    SwipeRepo::record(&pool, a, b, DIRECTION_LIKE).await.unwrap();
    let matched = SwipeRepo::record(&pool, b, a, DIRECTION_LIKE)
        .await
        .unwrap()
        .new_match
        .unwrap();

    let intruding = MessageRepo::create(&pool, matched.id, outsider, "hey").await.unwrap();
    assert!(intruding.is_none());

    MatchRepo::unmatch(&pool, matched.id, a).await.unwrap().unwrap();
    let late = MessageRepo::create(&pool, matched.id, b, "still there?").await.unwrap();
    assert!(late.is_none());
    assert!(MessageRepo::list_page(&pool, matched.id, None, 10).await.unwrap().is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_no_message_lands_after_a_concurrent_unmatch(pool: PgPool) {
    let a = new_user(&pool, "a5@example.com").await;
    let b = new_user(&pool, "b5@example.com").await;
    SwipeRepo::record(&pool, a, b, DIRECTION_LIKE).await.unwrap();
    let matched = SwipeRepo::record(&pool, b, a, DIRECTION_LIKE)
        .await
        .unwrap()
        .new_match
        .unwrap();

    let mut sends = Vec::new();
    for i in 0..10 {
        let pool = pool.clone();
        sends.push(tokio::spawn(async move {
            MessageRepo::create(&pool, matched.id, b, &format!("msg {i}")).await.unwrap()
        }));
    }
    let unmatch = {
        let pool = pool.clone();
        tokio::spawn(async move { MatchRepo::unmatch(&pool, matched.id, a).await.unwrap() })
    };

    let mut stored = 0;
    for send in sends {
        if send.await.unwrap().is_some() {
            stored += 1;
        }
    }
    assert!(unmatch.await.unwrap().is_some());
    let listed = MessageRepo::list_page(&pool, matched.id, None, 50).await.unwrap();
    assert_eq!(listed.len(), stored);

    // Once the unmatch is visible nothing else gets in.
    let after = MessageRepo::create(&pool, matched.id, b, "too late").await.unwrap();
    assert!(after.is_none());
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_notifications_read_state(pool: PgPool) {
    let user = new_user(&pool, "notes@example.com").await;
    let stranger = new_user(&pool, "stranger@example.com").await;
    let mut ids = Vec::new();
    for n in 0..3 {
        let row = NotificationRepo::create(
            &pool,
            &CreateNotification {
                user_id: user,
                kind: KIND_NEW_MATCH.to_string(),
                title: format!("Match {n}"),
                body: None,
                payload: serde_json::json!({"match_id": n}),
            },
        )
        .await
        .unwrap();
        ids.push(row.id);
    }

    assert_eq!(NotificationRepo::unread_count(&pool, user).await.unwrap(), 3);
    assert!(NotificationRepo::mark_read(&pool, stranger, ids[0]).await.unwrap().is_none());
    assert!(NotificationRepo::mark_read(&pool, user, ids[0]).await.unwrap().is_some());

    let unread = NotificationRepo::list(&pool, user, true, 10, 0).await.unwrap();
    assert_eq!(unread.len(), 2);
    assert_eq!(unread[0].id, ids[2]);

    assert_eq!(NotificationRepo::mark_all_read(&pool, user).await.unwrap(), 2);
    assert_eq!(NotificationRepo::unread_count(&pool, user).await.unwrap(), 0);
}
