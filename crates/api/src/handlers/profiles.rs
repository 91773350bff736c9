//! Handlers for the caller's account and member profiles.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, NaiveDate, Utc};
use kindred_core::audit::action_types;
use kindred_core::geo::GeoPoint;
use kindred_core::profile::{
    age_on, normalize_bio, normalize_display_name, normalize_interested_in, normalize_interests,
    validate_age_preference, validate_birthdate, validate_max_distance, Gender,
    DEFAULT_MAX_DISTANCE_KM, MAX_MEMBER_AGE, MIN_MEMBER_AGE,
};
use kindred_core::types::DbId;
use kindred_db::models::audit::CreateAuditLog;
use kindred_db::models::profile::{Profile, ProfileSummary, UpsertProfile};
use kindred_db::models::user::UserResponse;
use kindred_db::repositories::{ApiKeyRepo, ProfileRepo, SessionRepo, UserRepo};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};
use crate::handlers::{record_audit, record_audit_in_tx};
use crate::middleware::auth::AuthUser;
use crate::middleware::client::ClientInfo;
use crate::response::DataResponse;
use crate::state::AppState;

/// Longest accepted city name.
const MAX_CITY_LEN: usize = 100;

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpsertProfileRequest {
    pub display_name: String,
    pub birthdate: NaiveDate,
    /// `woman`, `man` or `nonbinary`.
    #[schema(value_type = String)]
    pub gender: Gender,
    #[schema(value_type = Vec<String>)]
    pub interested_in: Vec<Gender>,
    pub bio: Option<String>,
    pub city: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[serde(default)]
    pub interests: Vec<String>,
    pub min_age_pref: Option<i32>,
    pub max_age_pref: Option<i32>,
    pub max_distance_km: Option<i32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AccountView {
    pub user: UserResponse,
    /// `null` until the member creates a profile.
    pub profile: Option<Profile>,
}

/// What other members see. Birthdates are reduced to an age.
#[derive(Debug, Serialize, ToSchema)]
pub struct PublicProfile {
    pub user_id: DbId,
    pub display_name: String,
    pub age: i32,
    pub gender: String,
    pub city: Option<String>,
    pub bio: Option<String>,
    pub interests: Vec<String>,
    pub primary_photo_id: Option<DbId>,
    pub last_active_at: Option<DateTime<Utc>>,
}

impl PublicProfile {
    pub fn from_summary(summary: ProfileSummary, today: NaiveDate) -> Self {
        Self {
            age: age_on(summary.birthdate, today),
            user_id: summary.user_id,
            display_name: summary.display_name,
            gender: summary.gender,
            city: summary.city,
            bio: summary.bio,
            interests: summary.interests,
            primary_photo_id: summary.primary_photo_id,
            last_active_at: summary.last_active_at,
        }
    }
}

/// Apply the profile rules and produce the row to store.
pub fn normalize_profile(
    input: &UpsertProfileRequest,
    today: NaiveDate,
) -> Result<UpsertProfile, AppError> {
    let display_name = normalize_display_name(&input.display_name)?;
    validate_birthdate(input.birthdate, today)?;
    let interested_in = normalize_interested_in(&input.interested_in)?;
    let bio = normalize_bio(input.bio.as_deref())?;
    let interests = normalize_interests(&input.interests)?;

    let city = input
        .city
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string);
    if city.as_ref().is_some_and(|c| c.chars().count() > MAX_CITY_LEN) {
        return Err(AppError::validation(format!(
            "city must be at most {MAX_CITY_LEN} characters"
        )));
    }

    let location = match (input.latitude, input.longitude) {
        (Some(lat), Some(lon)) => Some(GeoPoint::new(lat, lon)?),
        (None, None) => None,
        _ => {
            return Err(AppError::validation(
                "latitude and longitude must be provided together",
            ))
        }
    };

    let min_age_pref = input.min_age_pref.unwrap_or(MIN_MEMBER_AGE);
    let max_age_pref = input.max_age_pref.unwrap_or(MAX_MEMBER_AGE);
    validate_age_preference(min_age_pref, max_age_pref)?;
    let max_distance_km = input.max_distance_km.unwrap_or(DEFAULT_MAX_DISTANCE_KM);
    validate_max_distance(max_distance_km)?;

    Ok(UpsertProfile {
        display_name,
        birthdate: input.birthdate,
        gender: input.gender.as_str().to_string(),
        interested_in: interested_in.iter().map(|g| g.as_str().to_string()).collect(),
        bio,
        city,
        latitude: location.map(|p| p.latitude),
        longitude: location.map(|p| p.longitude),
        interests,
        min_age_pref,
        max_age_pref,
        max_distance_km,
    })
}

#[utoipa::path(
    get,
    path = "/api/v1/users/me",
    tag = "users",
    responses((status = 200, description = "Account and profile", body = DataResponse<AccountView>)),
    security(("bearer" = []), ("api_key" = []))
)]
pub async fn get_me(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> AppResult<Json<DataResponse<AccountView>>> {
    let user = UserRepo::find_by_id(&state.pool, auth_user.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User", auth_user.user_id))?;
    let profile = ProfileRepo::find_by_user(&state.pool, user.id).await?;

    Ok(Json(DataResponse {
        data: AccountView {
            user: UserResponse::from_user(&user, &auth_user.role),
            profile,
        },
    }))
}

#[utoipa::path(
    put,
    path = "/api/v1/profiles/me",
    tag = "users",
    request_body = UpsertProfileRequest,
    responses(
        (status = 200, description = "Profile stored", body = DataResponse<Profile>),
        (status = 400, description = "Profile rules violated"),
    ),
    security(("bearer" = []), ("api_key" = []))
)]
pub async fn upsert_my_profile(
    State(state): State<AppState>,
    auth_user: AuthUser,
    client: ClientInfo,
    Json(input): Json<UpsertProfileRequest>,
) -> AppResult<Json<DataResponse<Profile>>> {
    let row = normalize_profile(&input, Utc::now().date_naive())?;
    let profile = ProfileRepo::upsert(&state.pool, auth_user.user_id, &row).await?;

    record_audit(
        &state,
        &client,
        CreateAuditLog::new(action_types::PROFILE_UPDATE)
            .by_user(auth_user.user_id)
            .on_entity("profile", auth_user.user_id)
            .with_details(json!({
                "display_name": profile.display_name,
                "city": profile.city,
                "interests": profile.interests,
            })),
    )
    .await?;
    tracing::info!(user_id = auth_user.user_id, "Profile updated");

    Ok(Json(DataResponse { data: profile }))
}

#[utoipa::path(
    get,
    path = "/api/v1/profiles/{user_id}",
    tag = "users",
    params(("user_id" = i64, Path, description = "Member id")),
    responses(
        (status = 200, description = "Public profile", body = DataResponse<PublicProfile>),
        (status = 404, description = "No profile, or the account is deactivated"),
    ),
    security(("bearer" = []), ("api_key" = []))
)]
pub async fn get_profile(
    State(state): State<AppState>,
    _auth_user: AuthUser,
    Path(user_id): Path<DbId>,
) -> AppResult<Json<DataResponse<PublicProfile>>> {
    let summary = ProfileRepo::find_public_summary(&state.pool, user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Profile", user_id))?;
    Ok(Json(DataResponse {
        data: PublicProfile::from_summary(summary, Utc::now().date_naive()),
    }))
}

/// Deactivate the caller's account and revoke every credential.
#[utoipa::path(
    delete,
    path = "/api/v1/users/me",
    tag = "users",
    responses((status = 204, description = "Account deactivated")),
    security(("bearer" = []), ("api_key" = []))
)]
pub async fn deactivate_me(
    State(state): State<AppState>,
    auth_user: AuthUser,
    client: ClientInfo,
) -> AppResult<StatusCode> {
    deactivate_account(&state, &client, auth_user.user_id, auth_user.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Shared by self-service and admin deactivation. Returns `false` when the
/// account was already inactive.
///
/// The flag, both credential revocations and the audit entry commit together.
pub(crate) async fn deactivate_account(
    state: &AppState,
    client: &ClientInfo,
    actor_id: DbId,
    user_id: DbId,
) -> AppResult<bool> {
    let mut tx = state.pool.begin().await?;
    let changed = UserRepo::deactivate(&mut *tx, user_id).await?;
    let sessions = SessionRepo::revoke_all_for_user(&mut *tx, user_id).await?;
    let keys = ApiKeyRepo::revoke_all_for_user(&mut *tx, user_id).await?;

    if changed {
        record_audit_in_tx(
            &mut tx,
            client,
            CreateAuditLog::new(action_types::ACCOUNT_DEACTIVATE)
                .by_user(actor_id)
                .on_entity("user", user_id)
                .with_details(json!({ "sessions_revoked": sessions, "api_keys_revoked": keys })),
        )
        .await?;
    }
    tx.commit().await?;

    if changed {
        tracing::info!(user_id, actor_id, "Account deactivated");
    }
    Ok(changed)
}
