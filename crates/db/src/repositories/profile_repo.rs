//! Repository for the `profiles` table, discovery pools, and profile search.

use kindred_core::search::escape_like;
use kindred_core::types::DbId;
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::models::profile::{DiscoveryRow, Profile, ProfileSearch, ProfileSummary, UpsertProfile};

const COLUMNS: &str = "user_id, display_name, birthdate, gender, interested_in, bio, city, \
                       latitude, longitude, interests, min_age_pref, max_age_pref, \
                       max_distance_km, created_at, updated_at";

/// Profile columns plus activity and primary photo, aliased `p` / `u`.
const DISCOVERY_SELECT: &str = "SELECT p.user_id, p.display_name, p.birthdate, p.gender, \
       p.interested_in, p.bio, p.city, p.latitude, p.longitude, p.interests, \
       p.min_age_pref, p.max_age_pref, p.max_distance_km, u.last_active_at, \
       (SELECT ph.id FROM photos ph \
        WHERE ph.user_id = p.user_id AND ph.is_primary) AS primary_photo_id \
     FROM profiles p JOIN users u ON u.id = p.user_id";

const SUMMARY_SELECT: &str = "SELECT p.user_id, p.display_name, p.birthdate, p.gender, p.city, \
       p.bio, p.interests, \
       (SELECT ph.id FROM photos ph \
        WHERE ph.user_id = p.user_id AND ph.is_primary) AS primary_photo_id, \
       u.last_active_at \
     FROM profiles p JOIN users u ON u.id = p.user_id";

/// Upper bound on rows loaded for in-process ranking.
pub const DISCOVERY_POOL_SIZE: i64 = 500;

pub struct ProfileRepo;

impl ProfileRepo {
    pub async fn find_by_user(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Option<Profile>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM profiles WHERE user_id = $1");
        sqlx::query_as::<_, Profile>(&query)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Insert or replace the caller's profile.
    pub async fn upsert(
        pool: &PgPool,
        user_id: DbId,
        input: &UpsertProfile,
    ) -> Result<Profile, sqlx::Error> {
        let query = format!(
            "INSERT INTO profiles (user_id, display_name, birthdate, gender, interested_in, bio,
                                   city, latitude, longitude, interests, min_age_pref,
                                   max_age_pref, max_distance_km)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
             ON CONFLICT (user_id) DO UPDATE SET
                display_name = EXCLUDED.display_name,
                birthdate = EXCLUDED.birthdate,
                gender = EXCLUDED.gender,
                interested_in = EXCLUDED.interested_in,
                bio = EXCLUDED.bio,
                city = EXCLUDED.city,
                latitude = EXCLUDED.latitude,
                longitude = EXCLUDED.longitude,
                interests = EXCLUDED.interests,
                min_age_pref = EXCLUDED.min_age_pref,
                max_age_pref = EXCLUDED.max_age_pref,
                max_distance_km = EXCLUDED.max_distance_km
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Profile>(&query)
            .bind(user_id)
            .bind(&input.display_name)
            .bind(input.birthdate)
            .bind(&input.gender)
            .bind(&input.interested_in)
            .bind(&input.bio)
            .bind(&input.city)
            .bind(input.latitude)
            .bind(input.longitude)
            .bind(&input.interests)
            .bind(input.min_age_pref)
            .bind(input.max_age_pref)
            .bind(input.max_distance_km)
            .fetch_one(pool)
            .await
    }

    /// Public summary of an active user's profile.
    pub async fn find_public_summary(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Option<ProfileSummary>, sqlx::Error> {
        let query = format!("{SUMMARY_SELECT} WHERE p.user_id = $1 AND u.is_active");
        sqlx::query_as::<_, ProfileSummary>(&query)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// The seeker's own discovery row.
    pub async fn find_discovery_row(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Option<DiscoveryRow>, sqlx::Error> {
        let query = format!("{DISCOVERY_SELECT} WHERE p.user_id = $1");
        sqlx::query_as::<_, DiscoveryRow>(&query)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Coarse candidate pool for `seeker`: active members with a profile,
    /// mutually gender-compatible, not yet swiped by the seeker.
    ///
    /// Age and distance rules are applied by the ranking step.
    pub async fn discovery_pool(
        pool: &PgPool,
        seeker: &DiscoveryRow,
        limit: i64,
    ) -> Result<Vec<DiscoveryRow>, sqlx::Error> {
        let query = format!(
            "{DISCOVERY_SELECT}
             WHERE u.is_active
               AND p.user_id <> $1
               AND p.gender = ANY($2)
               AND $3 = ANY(p.interested_in)
               AND NOT EXISTS (
                   SELECT 1 FROM swipes s WHERE s.swiper_id = $1 AND s.target_id = p.user_id
               )
             ORDER BY u.last_active_at DESC NULLS LAST, p.user_id
             LIMIT $4"
        );
        sqlx::query_as::<_, DiscoveryRow>(&query)
            .bind(seeker.user_id)
            .bind(&seeker.interested_in)
            .bind(&seeker.gender)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Filtered profile search. Returns one page and the total match count.
    pub async fn search(
        pool: &PgPool,
        filter: &ProfileSearch,
    ) -> Result<(Vec<ProfileSummary>, i64), sqlx::Error> {
        let mut count_qb = QueryBuilder::<Postgres>::new(
            "SELECT COUNT(*) FROM profiles p JOIN users u ON u.id = p.user_id",
        );
        push_search_filters(&mut count_qb, filter);
        let total: i64 = count_qb.build_query_scalar().fetch_one(pool).await?;

        let mut qb = QueryBuilder::<Postgres>::new(SUMMARY_SELECT);
        push_search_filters(&mut qb, filter);
        qb.push(" ORDER BY u.last_active_at DESC NULLS LAST, p.user_id LIMIT ");
        qb.push_bind(filter.limit);
        qb.push(" OFFSET ");
        qb.push_bind(filter.offset);
        let rows = qb.build_query_as::<ProfileSummary>().fetch_all(pool).await?;

        Ok((rows, total))
    }
}

fn push_search_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &ProfileSearch) {
    qb.push(" WHERE u.is_active AND p.user_id <> ");
    qb.push_bind(filter.exclude_user_id);

    if let Some(text) = &filter.text {
        let pattern = format!("%{}%", escape_like(text));
        qb.push(" AND (p.display_name ILIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" OR p.bio ILIKE ");
        qb.push_bind(pattern);
        qb.push(")");
    }
    if let Some(gender) = &filter.gender {
        qb.push(" AND p.gender = ");
        qb.push_bind(gender.clone());
    }
    if let Some(city) = &filter.city {
        qb.push(" AND LOWER(p.city) = LOWER(");
        qb.push_bind(city.clone());
        qb.push(")");
    }
    if !filter.interests.is_empty() {
        qb.push(" AND p.interests && ");
        qb.push_bind(filter.interests.clone());
    }
    if let Some(date) = filter.born_on_or_before {
        qb.push(" AND p.birthdate <= ");
        qb.push_bind(date);
    }
    if let Some(date) = filter.born_after {
        qb.push(" AND p.birthdate > ");
        qb.push_bind(date);
    }
}
