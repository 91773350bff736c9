//! OpenAPI documents and the Swagger UI page.
//!
//! Each service publishes only its own operations. `/api/docs` serves a
//! Swagger UI page that loads `/api/docs/openapi.json`.

use axum::extract::State;
use axum::response::Html;
use axum::routing::get;
use axum::{Json, Router};
use utoipa::openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::handlers::{
    admin, api_keys, auth, conversations, matching, notifications, photos, profiles, search,
    subscriptions,
};
use crate::middleware::auth::API_KEY_HEADER;
use crate::routes::health;
use crate::service::Service;
use crate::state::AppState;
use crate::ws;

pub const DOCS_PATH: &str = "/api/docs";
pub const OPENAPI_JSON_PATH: &str = "/api/docs/openapi.json";

/// Registers the two accepted credentials: a bearer JWT or an API key header.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
        components.add_security_scheme(
            "api_key",
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(API_KEY_HEADER))),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    info(title = "Kindred auth service", description = "Registration, sessions and API keys."),
    paths(
        health::health_check,
        auth::register,
        auth::login,
        auth::refresh,
        auth::logout,
        auth::me,
        api_keys::create_api_key,
        api_keys::list_api_keys,
        api_keys::revoke_api_key,
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Registration, login and token refresh"),
        (name = "api-keys", description = "Personal API keys"),
    )
)]
struct AuthApi;

#[derive(OpenApi)]
#[openapi(
    info(title = "Kindred user service", description = "Accounts, profiles, subscriptions and administration."),
    paths(
        health::health_check,
        profiles::get_me,
        profiles::upsert_my_profile,
        profiles::get_profile,
        profiles::deactivate_me,
        subscriptions::get_my_subscription,
        subscriptions::change_plan,
        subscriptions::cancel_my_subscription,
        subscriptions::list_my_payments,
        admin::list_users,
        admin::deactivate_user,
        admin::list_audit_logs,
        admin::verify_audit_chain,
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "users", description = "The caller's account and member profiles"),
        (name = "subscriptions", description = "Plans and payments"),
        (name = "admin", description = "Admin-only management and audit trail"),
    )
)]
struct UserApi;

#[derive(OpenApi)]
#[openapi(
    info(title = "Kindred media service", description = "Profile photo upload and processing."),
    paths(
        health::health_check,
        photos::upload_photo,
        photos::list_my_photos,
        photos::list_user_photos,
        photos::set_primary_photo,
        photos::delete_photo,
        photos::get_job,
        photos::get_photo_content,
    ),
    modifiers(&SecurityAddon),
    tags((name = "photos", description = "Photos and their processing jobs"))
)]
struct MediaApi;

#[derive(OpenApi)]
#[openapi(
    info(title = "Kindred match service", description = "Discovery, swipes and matches."),
    paths(
        health::health_check,
        matching::discover,
        matching::swipe,
        matching::list_matches,
        matching::unmatch,
    ),
    modifiers(&SecurityAddon),
    tags((name = "matching", description = "Discovery, swipes and matches"))
)]
struct MatchApi;

#[derive(OpenApi)]
#[openapi(
    info(title = "Kindred communication service", description = "Conversations between matched members."),
    paths(
        health::health_check,
        conversations::list_conversations,
        conversations::list_messages,
        conversations::send_message,
        conversations::mark_conversation_read,
        ws::handler::ws_handler,
    ),
    modifiers(&SecurityAddon),
    tags((name = "conversations", description = "Messages and live delivery"))
)]
struct CommunicationApi;

#[derive(OpenApi)]
#[openapi(
    info(title = "Kindred notification service", description = "In-app notifications."),
    paths(
        health::health_check,
        notifications::list_notifications,
        notifications::unread_count,
        notifications::mark_read,
        notifications::mark_all_read,
    ),
    modifiers(&SecurityAddon),
    tags((name = "notifications", description = "The caller's notifications"))
)]
struct NotificationApi;

#[derive(OpenApi)]
#[openapi(
    info(title = "Kindred search service", description = "Profile search."),
    paths(health::health_check, search::search_profiles),
    modifiers(&SecurityAddon),
    tags((name = "search", description = "Profile search"))
)]
struct SearchApi;

/// The OpenAPI document for one service.
pub fn openapi_for(service: Service) -> utoipa::openapi::OpenApi {
    match service {
        Service::Auth => AuthApi::openapi(),
        Service::User => UserApi::openapi(),
        Service::Media => MediaApi::openapi(),
        Service::Match => MatchApi::openapi(),
        Service::Communication => CommunicationApi::openapi(),
        Service::Notification => NotificationApi::openapi(),
        Service::Search => SearchApi::openapi(),
    }
}

async fn openapi_json(State(state): State<AppState>) -> Json<utoipa::openapi::OpenApi> {
    Json(openapi_for(state.config.service))
}

async fn swagger_ui(State(state): State<AppState>) -> Html<String> {
    Html(swagger_page(state.config.service))
}

fn swagger_page(service: Service) -> String {
    format!(
        r##"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <title>Kindred {service} API</title>
  <link rel="stylesheet" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css" />
</head>
<body>
  <div id="swagger-ui"></div>
  <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js" crossorigin></script>
  <script>
    window.onload = () => {{
      window.ui = SwaggerUIBundle({{ url: "{OPENAPI_JSON_PATH}", dom_id: "#swagger-ui" }});
    }};
  </script>
</body>
</html>
"##
    )
}

/// Mount `/api/docs` and `/api/docs/openapi.json`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(DOCS_PATH, get(swagger_ui))
        .route(OPENAPI_JSON_PATH, get(openapi_json))
}
