//! Handlers for discovery, swiping and matches.

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Days, NaiveDate, Utc};
use kindred_core::audit::action_types;
use kindred_core::geo::GeoPoint;
use kindred_core::matching::{
    rank_candidates, MatchCandidate, DEFAULT_DISCOVERY_LIMIT, MAX_DISCOVERY_LIMIT,
};
use kindred_core::profile::{age_on, Gender};
use kindred_core::search::clamp_limit;
use kindred_core::subscription::Plan;
use kindred_core::types::DbId;
use kindred_db::models::audit::CreateAuditLog;
use kindred_db::models::matches::{Match, MatchListItem};
use kindred_db::models::profile::{DiscoveryRow, ProfileSummary};
use kindred_db::models::swipe::{LikeQuota, QuotaSwipe, Swipe, DIRECTION_LIKE, DIRECTION_PASS};
use kindred_db::repositories::profile_repo::DISCOVERY_POOL_SIZE;
use kindred_db::repositories::{MatchRepo, ProfileRepo, SwipeRepo, UserRepo};
use kindred_events::{event_types, PlatformEvent};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::{IntoParams, ToSchema};

use crate::error::{is_unique_violation, AppError, AppResult};
use crate::handlers::profiles::PublicProfile;
use crate::handlers::record_audit;
use crate::handlers::subscriptions::current_subscription;
use crate::middleware::auth::AuthUser;
use crate::middleware::client::ClientInfo;
use crate::query::PaginationParams;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct DiscoveryParams {
    /// Candidates to return (default 20, max 50).
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DiscoveryCandidate {
    pub profile: PublicProfile,
    /// Compatibility score in `[0, 100]`.
    pub score: f64,
    /// Present when both members shared a location.
    pub distance_km: Option<f64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SwipeRequest {
    pub target_id: DbId,
    /// `like` or `pass`.
    pub direction: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SwipeResponse {
    pub swipe: Swipe,
    /// The match this like completed, if any.
    #[serde(rename = "match")]
    pub new_match: Option<Match>,
}

/// Build the scorer's view of a discovery row.
///
/// Rows with a gender value the scorer does not know are skipped.
pub fn to_candidate(row: &DiscoveryRow, today: NaiveDate) -> Option<MatchCandidate> {
    let gender = Gender::parse(&row.gender).ok()?;
    let interested_in = Gender::parse_all(&row.interested_in).ok()?;
    Some(MatchCandidate {
        user_id: row.user_id,
        age: age_on(row.birthdate, today),
        gender,
        interested_in,
        min_age_pref: row.min_age_pref,
        max_age_pref: row.max_age_pref,
        max_distance_km: row.max_distance_km,
        location: GeoPoint::from_columns(row.latitude, row.longitude),
        interests: row.interests.clone(),
        last_active_at: row.last_active_at,
        has_photo: row.primary_photo_id.is_some(),
        has_bio: row.bio.as_deref().is_some_and(|b| !b.is_empty()),
    })
}

fn summary_of(row: DiscoveryRow) -> ProfileSummary {
    ProfileSummary {
        user_id: row.user_id,
        display_name: row.display_name,
        birthdate: row.birthdate,
        gender: row.gender,
        city: row.city,
        bio: row.bio,
        interests: row.interests,
        primary_photo_id: row.primary_photo_id,
        last_active_at: row.last_active_at,
    }
}

/// Start of the UTC day containing `now`, and seconds until the next one.
pub fn utc_day_bounds(now: DateTime<Utc>) -> (DateTime<Utc>, u64) {
    let today = now.date_naive();
    let start = today.and_time(chrono::NaiveTime::MIN).and_utc();
    let next = today
        .checked_add_days(Days::new(1))
        .map(|d| d.and_time(chrono::NaiveTime::MIN).and_utc())
        .unwrap_or(now);
    let until_reset = (next - now).num_seconds().max(1) as u64;
    (start, until_reset)
}

#[utoipa::path(
    get,
    path = "/api/v1/discovery",
    tag = "matching",
    params(DiscoveryParams),
    responses(
        (status = 200, description = "Ranked candidates", body = DataResponse<Vec<DiscoveryCandidate>>),
        (status = 409, description = "Caller has no profile yet"),
    ),
    security(("bearer" = []), ("api_key" = []))
)]
pub async fn discover(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(params): Query<DiscoveryParams>,
) -> AppResult<Json<DataResponse<Vec<DiscoveryCandidate>>>> {
    let limit = clamp_limit(params.limit, DEFAULT_DISCOVERY_LIMIT, MAX_DISCOVERY_LIMIT) as usize;
    let now = Utc::now();
    let today = now.date_naive();

    let seeker_row = ProfileRepo::find_discovery_row(&state.pool, auth_user.user_id)
        .await?
        .ok_or_else(|| AppError::conflict("Create a profile before using discovery"))?;
    let seeker = to_candidate(&seeker_row, today)
        .ok_or_else(|| AppError::InternalError("Stored profile has an unknown gender".into()))?;

    let rows = ProfileRepo::discovery_pool(&state.pool, &seeker_row, DISCOVERY_POOL_SIZE).await?;
    let candidates: Vec<MatchCandidate> =
        rows.iter().filter_map(|row| to_candidate(row, today)).collect();
    let ranked = rank_candidates(&seeker, &candidates, now, limit);

    let mut by_id: HashMap<DbId, DiscoveryRow> =
        rows.into_iter().map(|row| (row.user_id, row)).collect();
    let data = ranked
        .into_iter()
        .filter_map(|scored| {
            let row = by_id.remove(&scored.user_id)?;
            Some(DiscoveryCandidate {
                profile: PublicProfile::from_summary(summary_of(row), today),
                score: scored.score,
                distance_km: scored.distance_km,
            })
        })
        .collect::<Vec<_>>();

    tracing::debug!(
        user_id = auth_user.user_id,
        pool_size = candidates.len(),
        returned = data.len(),
        "Discovery ranked",
    );
    Ok(Json(DataResponse { data }))
}

#[utoipa::path(
    post,
    path = "/api/v1/swipes",
    tag = "matching",
    request_body = SwipeRequest,
    responses(
        (status = 201, description = "Swipe recorded", body = DataResponse<SwipeResponse>),
        (status = 400, description = "Self-swipe or unknown direction"),
        (status = 404, description = "Target missing or deactivated"),
        (status = 409, description = "Target already swiped"),
        (status = 429, description = "Daily like limit reached"),
    ),
    security(("bearer" = []), ("api_key" = []))
)]
pub async fn swipe(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(input): Json<SwipeRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<SwipeResponse>>)> {
    let direction = match input.direction.trim() {
        DIRECTION_LIKE => DIRECTION_LIKE,
        DIRECTION_PASS => DIRECTION_PASS,
        other => {
            return Err(AppError::validation(format!(
                "Unknown direction '{other}'. Must be one of: like, pass"
            )))
        }
    };
    if input.target_id == auth_user.user_id {
        return Err(AppError::validation("You cannot swipe on yourself"));
    }
    if !UserRepo::is_active(&state.pool, input.target_id).await? {
        return Err(AppError::not_found("User", input.target_id));
    }

    let quota = if direction == DIRECTION_LIKE {
        let subscription = current_subscription(&state.pool, auth_user.user_id).await?;
        let plan = Plan::parse(&subscription.plan)?;
        plan.daily_like_limit().map(|limit| (plan, limit))
    } else {
        None
    };

    let recorded = match quota {
        Some((plan, limit)) => {
            let (day_start, until_reset) = utc_day_bounds(Utc::now());
            let quota = LikeQuota {
                limit,
                since: day_start,
            };
            SwipeRepo::record_like_within_quota(
                &state.pool,
                auth_user.user_id,
                input.target_id,
                quota,
            )
            .await
            .map(|result| match result {
                QuotaSwipe::Recorded(outcome) => Ok(outcome),
                QuotaSwipe::LimitReached { likes_today } => {
                    tracing::debug!(user_id = auth_user.user_id, likes_today, "Like limit reached");
                    Err(AppError::TooManyRequests {
                        message: format!(
                            "Daily like limit of {limit} reached for the {} plan",
                            plan.as_str()
                        ),
                        retry_after_secs: until_reset,
                    })
                }
            })
        }
        None => SwipeRepo::record(&state.pool, auth_user.user_id, input.target_id, direction)
            .await
            .map(Ok),
    };

    let outcome = recorded.map_err(|err| {
        if is_unique_violation(&err, "uq_swipes_pair") {
            AppError::conflict(format!("You already swiped on user {}", input.target_id))
        } else {
            err.into()
        }
    })??;

    if let Some(new_match) = &outcome.new_match {
        state.event_bus.publish(
            PlatformEvent::new(event_types::MATCH_CREATED)
                .with_source("match", new_match.id)
                .with_actor(auth_user.user_id)
                .with_payload(json!({
                    "match_id": new_match.id,
                    "user_a_id": new_match.user_a_id,
                    "user_b_id": new_match.user_b_id,
                })),
        );
        tracing::info!(
            match_id = new_match.id,
            user_a_id = new_match.user_a_id,
            user_b_id = new_match.user_b_id,
            "Match created",
        );
    }

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: SwipeResponse {
                swipe: outcome.swipe,
                new_match: outcome.new_match,
            },
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/matches",
    tag = "matching",
    params(PaginationParams),
    responses((status = 200, description = "Active matches, newest first", body = DataResponse<Vec<MatchListItem>>)),
    security(("bearer" = []), ("api_key" = []))
)]
pub async fn list_matches(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<DataResponse<Vec<MatchListItem>>>> {
    let (limit, offset) = params.resolve();
    let matches = MatchRepo::list_for_user(&state.pool, auth_user.user_id, limit, offset).await?;
    Ok(Json(DataResponse { data: matches }))
}

#[utoipa::path(
    delete,
    path = "/api/v1/matches/{id}",
    tag = "matching",
    params(("id" = i64, Path, description = "Match id")),
    responses(
        (status = 204, description = "Match ended"),
        (status = 404, description = "Caller is not part of this match"),
        (status = 409, description = "Match already ended"),
    ),
    security(("bearer" = []), ("api_key" = []))
)]
pub async fn unmatch(
    State(state): State<AppState>,
    auth_user: AuthUser,
    client: ClientInfo,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    MatchRepo::find_for_participant(&state.pool, id, auth_user.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Match", id))?;
    let ended = MatchRepo::unmatch(&state.pool, id, auth_user.user_id)
        .await?
        .ok_or_else(|| AppError::conflict(format!("Match {id} has already ended")))?;

    record_audit(
        &state,
        &client,
        CreateAuditLog::new(action_types::UNMATCH)
            .by_user(auth_user.user_id)
            .on_entity("match", id)
            .with_details(json!({ "other_user_id": ended.other_user(auth_user.user_id) })),
    )
    .await?;
    tracing::info!(user_id = auth_user.user_id, match_id = id, "Unmatched");

    Ok(StatusCode::NO_CONTENT)
}
