//! Member profile model and DTOs.

use chrono::{DateTime, NaiveDate, Utc};
use kindred_core::types::DbId;
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;

/// A row from the `profiles` table. One per user, keyed by `user_id`.
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct Profile {
    pub user_id: DbId,
    pub display_name: String,
    pub birthdate: NaiveDate,
    pub gender: String,
    pub interested_in: Vec<String>,
    pub bio: Option<String>,
    pub city: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub interests: Vec<String>,
    pub min_age_pref: i32,
    pub max_age_pref: i32,
    pub max_distance_km: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Profile joined with account activity, used for discovery scoring.
#[derive(Debug, Clone, FromRow)]
pub struct DiscoveryRow {
    pub user_id: DbId,
    pub display_name: String,
    pub birthdate: NaiveDate,
    pub gender: String,
    pub interested_in: Vec<String>,
    pub bio: Option<String>,
    pub city: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub interests: Vec<String>,
    pub min_age_pref: i32,
    pub max_age_pref: i32,
    pub max_distance_km: i32,
    pub last_active_at: Option<DateTime<Utc>>,
    pub primary_photo_id: Option<DbId>,
}

/// Public subset of a profile returned by search and match listings.
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct ProfileSummary {
    pub user_id: DbId,
    pub display_name: String,
    pub birthdate: NaiveDate,
    pub gender: String,
    pub city: Option<String>,
    pub bio: Option<String>,
    pub interests: Vec<String>,
    pub primary_photo_id: Option<DbId>,
    pub last_active_at: Option<DateTime<Utc>>,
}

/// Validated, normalized input for
/// [`ProfileRepo::upsert`](crate::repositories::ProfileRepo::upsert).
#[derive(Debug, Clone)]
pub struct UpsertProfile {
    pub display_name: String,
    pub birthdate: NaiveDate,
    pub gender: String,
    pub interested_in: Vec<String>,
    pub bio: Option<String>,
    pub city: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub interests: Vec<String>,
    pub min_age_pref: i32,
    pub max_age_pref: i32,
    pub max_distance_km: i32,
}

/// Filters for profile search. Age bounds are pre-converted to birthdates.
#[derive(Debug, Clone, Default)]
pub struct ProfileSearch {
    pub exclude_user_id: DbId,
    /// Raw search text, LIKE-escaped by the repository.
    pub text: Option<String>,
    pub gender: Option<String>,
    pub city: Option<String>,
    pub interests: Vec<String>,
    /// Born on or before this date (minimum age).
    pub born_on_or_before: Option<NaiveDate>,
    /// Born after this date (maximum age).
    pub born_after: Option<NaiveDate>,
    pub limit: i64,
    pub offset: i64,
}
