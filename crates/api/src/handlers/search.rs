//! Profile search.

use axum::extract::{Query, State};
use axum::Json;
use chrono::{Months, NaiveDate, Utc};
use kindred_core::profile::{Gender, MAX_MEMBER_AGE, MIN_MEMBER_AGE};
use kindred_core::search::{
    clamp_limit, clamp_offset, parse_csv_list, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT,
};
use kindred_db::models::profile::ProfileSearch;
use kindred_db::repositories::ProfileRepo;
use serde::Deserialize;
use utoipa::IntoParams;

use crate::error::{AppError, AppResult};
use crate::handlers::profiles::PublicProfile;
use crate::middleware::auth::AuthUser;
use crate::response::PageResponse;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ProfileSearchParams {
    /// Case-insensitive match on display name or bio.
    pub q: Option<String>,
    pub min_age: Option<i32>,
    pub max_age: Option<i32>,
    pub gender: Option<String>,
    pub city: Option<String>,
    /// Comma-separated; any overlap matches.
    pub interests: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

fn years_before(today: NaiveDate, years: i32) -> Option<NaiveDate> {
    today.checked_sub_months(Months::new(years as u32 * 12))
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

/// Translate query parameters into a repository filter.
///
/// An age range becomes birthdate bounds: at least `min_age` means born on or
/// before `today - min_age`, at most `max_age` means born after
/// `today - (max_age + 1)`.
pub fn build_search(
    params: &ProfileSearchParams,
    caller_id: kindred_core::types::DbId,
    today: NaiveDate,
) -> Result<ProfileSearch, AppError> {
    for age in [params.min_age, params.max_age].into_iter().flatten() {
        if !(MIN_MEMBER_AGE..=MAX_MEMBER_AGE).contains(&age) {
            return Err(AppError::validation(format!(
                "ages must be between {MIN_MEMBER_AGE} and {MAX_MEMBER_AGE}, got {age}"
            )));
        }
    }
    if let (Some(min), Some(max)) = (params.min_age, params.max_age) {
        if min > max {
            return Err(AppError::validation("min_age must not exceed max_age"));
        }
    }

    let gender = non_blank(params.gender.as_deref())
        .map(|g| Gender::parse(&g.to_lowercase()))
        .transpose()?
        .map(|g| g.as_str().to_string());

    Ok(ProfileSearch {
        exclude_user_id: caller_id,
        text: non_blank(params.q.as_deref()),
        gender,
        city: non_blank(params.city.as_deref()),
        interests: parse_csv_list(params.interests.as_deref()),
        born_on_or_before: params.min_age.and_then(|age| years_before(today, age)),
        born_after: params.max_age.and_then(|age| years_before(today, age + 1)),
        limit: clamp_limit(params.limit, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT),
        offset: clamp_offset(params.offset),
    })
}

#[utoipa::path(
    get,
    path = "/api/v1/search/profiles",
    tag = "search",
    params(ProfileSearchParams),
    responses(
        (status = 200, description = "Matching profiles, most recently active first", body = PageResponse<PublicProfile>),
        (status = 400, description = "Invalid age range or gender"),
    ),
    security(("bearer" = []), ("api_key" = []))
)]
pub async fn search_profiles(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(params): Query<ProfileSearchParams>,
) -> AppResult<Json<PageResponse<PublicProfile>>> {
    let today = Utc::now().date_naive();
    let filter = build_search(&params, auth_user.user_id, today)?;
    let (rows, total) = ProfileRepo::search(&state.pool, &filter).await?;
    let data = rows
        .into_iter()
        .map(|row| PublicProfile::from_summary(row, today))
        .collect();
    Ok(Json(PageResponse { data, total }))
}
