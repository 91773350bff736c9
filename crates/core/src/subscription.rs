//! Subscription plans, pricing, and like allowances.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

pub const STATUS_ACTIVE: &str = "active";
pub const STATUS_CANCELED: &str = "canceled";
pub const STATUS_EXPIRED: &str = "expired";

pub const PAYMENT_STATUS_SUCCEEDED: &str = "succeeded";

/// Length of one billing period.
pub const PERIOD_DAYS: i64 = 30;

/// Likes per UTC day on the free plan.
pub const FREE_DAILY_LIKES: i64 = 50;

/// Premium price per period.
pub const PREMIUM_PRICE_CENTS: i64 = 999;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Free,
    Premium,
}

impl Plan {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Premium => "premium",
        }
    }

    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value {
            "free" => Ok(Self::Free),
            "premium" => Ok(Self::Premium),
            other => Err(CoreError::Validation(format!(
                "Unknown plan '{other}'. Must be one of: free, premium"
            ))),
        }
    }

    pub fn price_cents(self) -> i64 {
        match self {
            Self::Free => 0,
            Self::Premium => PREMIUM_PRICE_CENTS,
        }
    }

    /// Likes allowed per UTC day; `None` means unlimited.
    pub fn daily_like_limit(self) -> Option<i64> {
        match self {
            Self::Free => Some(FREE_DAILY_LIKES),
            Self::Premium => None,
        }
    }
}

/// Validate a three-letter upper-case ISO 4217 code.
pub fn validate_currency(code: &str) -> Result<(), CoreError> {
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_uppercase()) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "currency must be a three-letter upper-case ISO code, got '{code}'"
        )))
    }
}

/// Check that a payment covers the plan's price exactly.
pub fn validate_payment_amount(plan: Plan, amount_cents: i64) -> Result<(), CoreError> {
    if amount_cents != plan.price_cents() {
        return Err(CoreError::Validation(format!(
            "Plan '{}' costs {} cents, got {amount_cents}",
            plan.as_str(),
            plan.price_cents()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_plan_caps_likes() {
        assert_eq!(Plan::Free.daily_like_limit(), Some(FREE_DAILY_LIKES));
    }

    #[test]
    fn premium_is_unlimited() {
        assert_eq!(Plan::Premium.daily_like_limit(), None);
    }

    #[test]
    fn currency_codes() {
        assert!(validate_currency("EUR").is_ok());
        assert!(validate_currency("eur").is_err());
        assert!(validate_currency("EURO").is_err());
    }

    #[test]
    fn payment_must_match_price() {
        assert!(validate_payment_amount(Plan::Premium, PREMIUM_PRICE_CENTS).is_ok());
        assert!(validate_payment_amount(Plan::Premium, 1).is_err());
        assert!(validate_payment_amount(Plan::Free, 0).is_ok());
    }

    #[test]
    fn plan_parsing() {
        assert_eq!(Plan::parse("premium").unwrap(), Plan::Premium);
        assert!(Plan::parse("gold").is_err());
    }
}
