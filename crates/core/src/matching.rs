//! Candidate compatibility filtering and scoring for discovery.
//!
//! The repository layer loads a coarse candidate pool (active users with a
//! profile that the seeker has not yet swiped); this module applies the
//! mutual-preference rules and ranks what remains.

use std::collections::HashSet;

use crate::geo::{haversine_km, GeoPoint};
use crate::profile::Gender;
use crate::types::{DbId, Timestamp};

/// Score weights; they sum to 100.
pub const WEIGHT_INTERESTS: f64 = 45.0;
pub const WEIGHT_DISTANCE: f64 = 25.0;
pub const WEIGHT_ACTIVITY: f64 = 20.0;
pub const WEIGHT_COMPLETENESS: f64 = 10.0;

/// Activity counts fully for this many hours.
const ACTIVITY_FULL_HOURS: f64 = 24.0;

/// Activity contributes nothing after this many days.
const ACTIVITY_ZERO_DAYS: f64 = 30.0;

/// Default and maximum discovery page sizes.
pub const DEFAULT_DISCOVERY_LIMIT: i64 = 20;
pub const MAX_DISCOVERY_LIMIT: i64 = 50;

/// Everything the scorer needs to know about one member.
#[derive(Debug, Clone)]
pub struct MatchCandidate {
    pub user_id: DbId,
    pub age: i32,
    pub gender: Gender,
    pub interested_in: Vec<Gender>,
    pub min_age_pref: i32,
    pub max_age_pref: i32,
    pub max_distance_km: i32,
    pub location: Option<GeoPoint>,
    pub interests: Vec<String>,
    pub last_active_at: Option<Timestamp>,
    pub has_photo: bool,
    pub has_bio: bool,
}

/// A candidate that passed filtering, with its score.
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub user_id: DbId,
    pub score: f64,
    pub distance_km: Option<f64>,
}

/// Distance between two members, when both shared a location.
pub fn distance_between(a: &MatchCandidate, b: &MatchCandidate) -> Option<f64> {
    match (a.location, b.location) {
        (Some(pa), Some(pb)) => Some(haversine_km(pa, pb)),
        _ => None,
    }
}

fn accepts(who: &MatchCandidate, other: &MatchCandidate) -> bool {
    who.interested_in.contains(&other.gender)
        && (who.min_age_pref..=who.max_age_pref).contains(&other.age)
}

/// Whether the two members are acceptable to each other.
///
/// Gender and age preferences must hold in both directions. When both
/// members have a location the distance must be inside both radii; a
/// missing location never excludes anyone.
pub fn is_compatible(seeker: &MatchCandidate, candidate: &MatchCandidate) -> bool {
    if seeker.user_id == candidate.user_id {
        return false;
    }
    if !accepts(seeker, candidate) || !accepts(candidate, seeker) {
        return false;
    }
    match distance_between(seeker, candidate) {
        Some(d) => {
            d <= f64::from(seeker.max_distance_km) && d <= f64::from(candidate.max_distance_km)
        }
        None => true,
    }
}

fn normalized_set(items: &[String]) -> HashSet<String> {
    items
        .iter()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Jaccard similarity of two interest lists, compared case-insensitively.
pub fn interest_similarity(a: &[String], b: &[String]) -> f64 {
    let left = normalized_set(a);
    let right = normalized_set(b);
    let union = left.union(&right).count();
    if union == 0 {
        return 0.0;
    }
    left.intersection(&right).count() as f64 / union as f64
}

/// Recency factor in `[0, 1]`.
pub fn activity_factor(last_active_at: Option<Timestamp>, now: Timestamp) -> f64 {
    let Some(last) = last_active_at else {
        return 0.0;
    };
    let hours = (now - last).num_seconds().max(0) as f64 / 3600.0;
    if hours <= ACTIVITY_FULL_HOURS {
        return 1.0;
    }
    let zero_hours = ACTIVITY_ZERO_DAYS * 24.0;
    if hours >= zero_hours {
        return 0.0;
    }
    1.0 - (hours - ACTIVITY_FULL_HOURS) / (zero_hours - ACTIVITY_FULL_HOURS)
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Compatibility score in `[0, 100]`, rounded to two decimals.
pub fn compatibility_score(
    seeker: &MatchCandidate,
    candidate: &MatchCandidate,
    now: Timestamp,
) -> f64 {
    let interests = interest_similarity(&seeker.interests, &candidate.interests);

    let distance = match distance_between(seeker, candidate) {
        Some(d) if seeker.max_distance_km > 0 => {
            (1.0 - d / f64::from(seeker.max_distance_km)).clamp(0.0, 1.0)
        }
        Some(_) => 0.0,
        None => 0.5,
    };

    let activity = activity_factor(candidate.last_active_at, now);

    let completeness = if candidate.has_photo { 0.6 } else { 0.0 }
        + if candidate.has_bio { 0.4 } else { 0.0 };

    let score = interests * WEIGHT_INTERESTS
        + distance * WEIGHT_DISTANCE
        + activity * WEIGHT_ACTIVITY
        + completeness * WEIGHT_COMPLETENESS;

    round2(score.clamp(0.0, 100.0))
}

/// Filter, score, and order candidates for `seeker`.
///
/// Ordering is score descending with ties broken by ascending user id so
/// pages are stable.
pub fn rank_candidates(
    seeker: &MatchCandidate,
    candidates: &[MatchCandidate],
    now: Timestamp,
    limit: usize,
) -> Vec<ScoredCandidate> {
    let mut scored: Vec<ScoredCandidate> = candidates
        .iter()
        .filter(|c| is_compatible(seeker, c))
        .map(|c| ScoredCandidate {
            user_id: c.user_id,
            score: compatibility_score(seeker, c, now),
            distance_km: distance_between(seeker, c).map(round2),
        })
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.user_id.cmp(&b.user_id))
    });
    scored.truncate(limit);
    scored
}
