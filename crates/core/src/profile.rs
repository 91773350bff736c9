//! Member profile rules: genders, age computation, and field validation.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Minimum age to hold a profile.
pub const MIN_MEMBER_AGE: i32 = 18;

/// Upper bound for ages and age preferences.
pub const MAX_MEMBER_AGE: i32 = 120;

/// Default discovery radius.
pub const DEFAULT_MAX_DISTANCE_KM: i32 = 50;

/// Largest allowed discovery radius.
pub const MAX_DISTANCE_KM: i32 = 500;

pub const MAX_DISPLAY_NAME_LEN: usize = 50;
pub const MAX_BIO_LEN: usize = 500;
pub const MAX_INTERESTS: usize = 10;
pub const MAX_INTEREST_LEN: usize = 30;

/// Gender identity used for mutual preference matching.
///
/// Stored as lower-case text in `profiles.gender` and `profiles.interested_in`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Woman,
    Man,
    Nonbinary,
}

impl Gender {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Woman => "woman",
            Self::Man => "man",
            Self::Nonbinary => "nonbinary",
        }
    }

    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value {
            "woman" => Ok(Self::Woman),
            "man" => Ok(Self::Man),
            "nonbinary" => Ok(Self::Nonbinary),
            other => Err(CoreError::Validation(format!(
                "Unknown gender '{other}'. Must be one of: woman, man, nonbinary"
            ))),
        }
    }

    /// Parse a stored text array, failing on the first unknown value.
    pub fn parse_all(values: &[String]) -> Result<Vec<Self>, CoreError> {
        values.iter().map(|v| Self::parse(v)).collect()
    }
}

/// Age in whole years on `today` for someone born on `birthdate`.
pub fn age_on(birthdate: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - birthdate.year();
    if (today.month(), today.day()) < (birthdate.month(), birthdate.day()) {
        age -= 1;
    }
    age
}

/// Reject birthdates that make the member younger than [`MIN_MEMBER_AGE`]
/// or older than [`MAX_MEMBER_AGE`].
pub fn validate_birthdate(birthdate: NaiveDate, today: NaiveDate) -> Result<i32, CoreError> {
    let age = age_on(birthdate, today);
    if age < MIN_MEMBER_AGE {
        return Err(CoreError::Validation(format!(
            "Members must be at least {MIN_MEMBER_AGE} years old"
        )));
    }
    if age > MAX_MEMBER_AGE {
        return Err(CoreError::Validation("Birthdate is not plausible".into()));
    }
    Ok(age)
}

/// Validate an age preference range.
pub fn validate_age_preference(min_age: i32, max_age: i32) -> Result<(), CoreError> {
    if min_age < MIN_MEMBER_AGE || max_age > MAX_MEMBER_AGE || min_age > max_age {
        return Err(CoreError::Validation(format!(
            "Age preference must satisfy {MIN_MEMBER_AGE} <= min <= max <= {MAX_MEMBER_AGE}"
        )));
    }
    Ok(())
}

pub fn validate_max_distance(km: i32) -> Result<(), CoreError> {
    if !(1..=MAX_DISTANCE_KM).contains(&km) {
        return Err(CoreError::Validation(format!(
            "max_distance_km must be between 1 and {MAX_DISTANCE_KM}"
        )));
    }
    Ok(())
}

/// Trim and length-check a display name.
pub fn normalize_display_name(name: &str) -> Result<String, CoreError> {
    let trimmed = name.trim();
    let len = trimmed.chars().count();
    if len == 0 || len > MAX_DISPLAY_NAME_LEN {
        return Err(CoreError::Validation(format!(
            "display_name must be between 1 and {MAX_DISPLAY_NAME_LEN} characters"
        )));
    }
    Ok(trimmed.to_string())
}

/// Trim a bio; empty bios become `None`.
pub fn normalize_bio(bio: Option<&str>) -> Result<Option<String>, CoreError> {
    let Some(bio) = bio.map(str::trim).filter(|b| !b.is_empty()) else {
        return Ok(None);
    };
    if bio.chars().count() > MAX_BIO_LEN {
        return Err(CoreError::Validation(format!(
            "bio must be at most {MAX_BIO_LEN} characters"
        )));
    }
    Ok(Some(bio.to_string()))
}

/// Trim, lowercase, and deduplicate interests keeping first-seen order.
pub fn normalize_interests(interests: &[String]) -> Result<Vec<String>, CoreError> {
    let mut out: Vec<String> = Vec::with_capacity(interests.len());
    for raw in interests {
        let interest = raw.trim().to_lowercase();
        if interest.is_empty() {
            continue;
        }
        if interest.chars().count() > MAX_INTEREST_LEN {
            return Err(CoreError::Validation(format!(
                "Interest '{interest}' exceeds {MAX_INTEREST_LEN} characters"
            )));
        }
        if !out.contains(&interest) {
            out.push(interest);
        }
    }
    if out.len() > MAX_INTERESTS {
        return Err(CoreError::Validation(format!(
            "At most {MAX_INTERESTS} interests are allowed"
        )));
    }
    Ok(out)
}

/// Deduplicate and require at least one gender preference.
pub fn normalize_interested_in(genders: &[Gender]) -> Result<Vec<Gender>, CoreError> {
    let mut out = Vec::with_capacity(genders.len());
    for g in genders {
        if !out.contains(g) {
            out.push(*g);
        }
    }
    if out.is_empty() {
        return Err(CoreError::Validation(
            "interested_in must contain at least one gender".into(),
        ));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn age_counts_birthday_not_yet_reached() {
        assert_eq!(age_on(date(2000, 6, 15), date(2026, 6, 14)), 25);
        assert_eq!(age_on(date(2000, 6, 15), date(2026, 6, 15)), 26);
    }

    #[test]
    fn leap_day_birthdays() {
        assert_eq!(age_on(date(2004, 2, 29), date(2022, 2, 28)), 17);
        assert_eq!(age_on(date(2004, 2, 29), date(2022, 3, 1)), 18);
    }

    #[test]
    fn minors_are_rejected() {
        let today = date(2026, 1, 1);
        assert_matches!(
            validate_birthdate(date(2008, 1, 2), today),
            Err(CoreError::Validation(_))
        );
        assert_eq!(validate_birthdate(date(2008, 1, 1), today).unwrap(), 18);
    }

    #[test]
    fn age_preference_bounds() {
        assert!(validate_age_preference(18, 120).is_ok());
        assert!(validate_age_preference(30, 30).is_ok());
        assert!(validate_age_preference(17, 30).is_err());
        assert!(validate_age_preference(40, 30).is_err());
        assert!(validate_age_preference(30, 121).is_err());
    }

    #[test]
    fn interests_are_normalized() {
        let raw = vec![
            " Hiking ".to_string(),
            "hiking".to_string(),
            "".to_string(),
            "Jazz".to_string(),
        ];
        assert_eq!(normalize_interests(&raw).unwrap(), vec!["hiking", "jazz"]);
    }

    #[test]
    fn too_many_interests_rejected() {
        let raw: Vec<String> = (0..11).map(|i| format!("interest{i}")).collect();
        assert!(normalize_interests(&raw).is_err());
    }

    #[test]
    fn display_name_is_trimmed_and_bounded() {
        assert_eq!(normalize_display_name("  Sam ").unwrap(), "Sam");
        assert!(normalize_display_name("   ").is_err());
        assert!(normalize_display_name(&"x".repeat(51)).is_err());
    }

    #[test]
    fn empty_bio_becomes_none() {
        assert_eq!(normalize_bio(Some("   ")).unwrap(), None);
        assert_eq!(normalize_bio(Some(" hi ")).unwrap().as_deref(), Some("hi"));
        assert!(normalize_bio(Some(&"b".repeat(501))).is_err());
    }

    #[test]
    fn gender_round_trips_through_text() {
        for g in [Gender::Woman, Gender::Man, Gender::Nonbinary] {
            assert_eq!(Gender::parse(g.as_str()).unwrap(), g);
        }
        assert!(Gender::parse("robot").is_err());
    }

    #[test]
    fn interested_in_must_not_be_empty() {
        assert!(normalize_interested_in(&[]).is_err());
        assert_eq!(
            normalize_interested_in(&[Gender::Man, Gender::Man]).unwrap(),
            vec![Gender::Man]
        );
    }
}
