//! Integration tests for the health check, docs, and the shared middleware
//! stack every service runs behind.

mod common;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use common::{body_json, build_test_app, build_test_app_with, get, lazy_pool};
use kindred_api::service::Service;
use sqlx::PgPool;
use tower::ServiceExt;

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn health_check_reports_ok_with_database(pool: PgPool) {
    let app = build_test_app(pool, Service::Search);
    let response = get(app.router(), "/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["service"], "search");
    assert!(json["version"].is_string());
    assert_eq!(json["db_healthy"], true);
    app.cleanup();
}

#[tokio::test]
async fn health_check_degrades_without_database() {
    let app = build_test_app(lazy_pool(), Service::Communication);
    let response = get(app.router(), "/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "degraded");
    assert_eq!(json["service"], "communication");
    assert_eq!(json["db_healthy"], false);
    app.cleanup();
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let app = build_test_app(lazy_pool(), Service::Auth);
    let response = get(app.router(), "/this-route-does-not-exist").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    app.cleanup();
}

#[tokio::test]
async fn other_services_routes_are_not_mounted() {
    let app = build_test_app(lazy_pool(), Service::Search);
    let response = get(app.router(), "/api/v1/conversations").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    app.cleanup();
}

// ---------------------------------------------------------------------------
// Middleware
// ---------------------------------------------------------------------------

#[tokio::test]
async fn responses_carry_request_id_and_security_headers() {
    let app = build_test_app(lazy_pool(), Service::Match);
    let response = get(app.router(), "/api/docs/openapi.json").await;

    let headers = response.headers();
    assert!(headers.contains_key("x-request-id"));
    assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    assert_eq!(headers[header::X_FRAME_OPTIONS], "DENY");
    assert_eq!(headers[header::REFERRER_POLICY], "no-referrer");
    assert_eq!(headers["cross-origin-opener-policy"], "same-origin");
    app.cleanup();
}

#[tokio::test]
async fn incoming_request_id_is_propagated() {
    let app = build_test_app(lazy_pool(), Service::Match);
    let request = Request::builder()
        .uri("/api/docs/openapi.json")
        .header("x-request-id", "req-abc-123")
        .body(Body::empty())
        .unwrap();
    let response = app.router().oneshot(request).await.unwrap();
    assert_eq!(response.headers()["x-request-id"], "req-abc-123");
    app.cleanup();
}

#[tokio::test]
async fn cors_preflight_allows_configured_origin() {
    let app = build_test_app(lazy_pool(), Service::User);
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/v1/users/me")
        .header(header::ORIGIN, "http://localhost:5173")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "x-api-key")
        .body(Body::empty())
        .unwrap();
    let response = app.router().oneshot(request).await.unwrap();

    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://localhost:5173"
    );
    app.cleanup();
}

#[tokio::test]
async fn protected_route_without_credentials_is_401() {
    let app = build_test_app(lazy_pool(), Service::Notification);
    let response = get(app.router(), "/api/v1/notifications").await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["code"], "UNAUTHORIZED");
    assert!(json["error"].is_string());
    app.cleanup();
}

#[tokio::test]
async fn malformed_bearer_token_is_401() {
    let app = build_test_app(lazy_pool(), Service::Match);
    let response = common::get_auth(app.router(), "/api/v1/matches", "not-a-jwt").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    app.cleanup();
}

#[tokio::test]
async fn malformed_api_key_is_401() {
    let app = build_test_app(lazy_pool(), Service::Search);
    let response = common::get_with_header(
        app.router(),
        "/api/v1/search/profiles",
        "x-api-key",
        "definitely-not-a-key",
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    app.cleanup();
}

// ---------------------------------------------------------------------------
// Rate limiting
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rate_limit_rejects_after_window_budget() {
    let app = build_test_app_with(lazy_pool(), Service::Communication, |config| {
        config.rate_limit.enabled = true;
        config.rate_limit.max_requests = 2;
    });

    for remaining in ["1", "0"] {
        let response = get(app.router(), "/api/docs/openapi.json").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["ratelimit-limit"], "2");
        assert_eq!(response.headers()["ratelimit-remaining"], remaining);
    }

    let response = get(app.router(), "/api/docs/openapi.json").await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key(header::RETRY_AFTER));
    let json = body_json(response).await;
    assert_eq!(json["code"], "RATE_LIMITED");
    app.cleanup();
}

#[tokio::test]
async fn health_is_exempt_from_rate_limit() {
    let app = build_test_app_with(lazy_pool(), Service::Auth, |config| {
        config.rate_limit.enabled = true;
        config.rate_limit.max_requests = 1;
    });

    for _ in 0..3 {
        let response = get(app.router(), "/health").await;
        assert_eq!(response.status(), StatusCode::OK);
    }
    app.cleanup();
}

#[tokio::test]
async fn forwarded_clients_get_separate_budgets_when_trusted() {
    let app = build_test_app_with(lazy_pool(), Service::Auth, |config| {
        config.rate_limit.enabled = true;
        config.rate_limit.max_requests = 1;
        config.rate_limit.trust_forwarded_for = true;
    });

    for ip in ["203.0.113.1", "203.0.113.2"] {
        let response = common::get_with_header(
            app.router(),
            "/api/docs/openapi.json",
            "x-forwarded-for",
            ip,
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK, "first request from {ip}");
    }

    let response = common::get_with_header(
        app.router(),
        "/api/docs/openapi.json",
        "x-forwarded-for",
        "203.0.113.1",
    )
    .await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    app.cleanup();
}

// ---------------------------------------------------------------------------
// OpenAPI
// ---------------------------------------------------------------------------

#[tokio::test]
async fn openapi_document_lists_service_paths() {
    let app = build_test_app(lazy_pool(), Service::Communication);
    let response = get(app.router(), "/api/docs/openapi.json").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json["openapi"].as_str().unwrap().starts_with("3."));
    assert!(json["paths"]["/api/v1/conversations"].is_object());
    assert!(json["paths"]["/api/v1/ws"].is_object());
    assert!(json["paths"]["/api/v1/auth/login"].is_null());
    assert!(json["components"]["securitySchemes"]["bearer"].is_object());
    app.cleanup();
}

#[tokio::test]
async fn swagger_page_is_html() {
    let app = build_test_app(lazy_pool(), Service::Auth);
    let response = get(app.router(), "/api/docs").await;

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap();
    assert!(content_type.starts_with("text/html"));
    let body = common::body_bytes(response).await;
    let page = String::from_utf8(body).unwrap();
    assert!(page.contains("/api/docs/openapi.json"));
    app.cleanup();
}
