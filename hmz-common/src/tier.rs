//! Subscription tiers and their word limits
//!
//! The limit table is static: four tiers, each with a per-request cap and a
//! per-calendar-month cap, both counted in words.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Named subscription level
///
/// `Free` is the default tier for users with no paid record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Free,
    Basic,
    Pro,
    Premium,
}

/// Word caps for one tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TierLimits {
    /// Maximum words accepted in a single request
    pub per_request: u64,
    /// Maximum words billed in one calendar month
    pub per_month: u64,
}

impl Tier {
    /// All tiers, lowest first
    pub const ALL: [Tier; 4] = [Tier::Free, Tier::Basic, Tier::Pro, Tier::Premium];

    /// Word caps for this tier
    pub const fn limits(self) -> TierLimits {
        match self {
            Tier::Free => TierLimits { per_request: 250, per_month: 250 },
            Tier::Basic => TierLimits { per_request: 1_000, per_month: 10_000 },
            Tier::Pro => TierLimits { per_request: 2_000, per_month: 20_000 },
            Tier::Premium => TierLimits { per_request: 5_000, per_month: 35_000 },
        }
    }

    /// Lowercase name as stored in the database and sent on the wire
    pub const fn as_str(self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Basic => "basic",
            Tier::Pro => "pro",
            Tier::Premium => "premium",
        }
    }

    /// Map an active subscription's monthly amount (in cents) to a paid tier
    ///
    /// Returns `None` when the amount is below the cheapest paid plan.
    pub fn from_subscription_amount(amount_cents: i64) -> Option<Tier> {
        if amount_cents >= 1999 {
            Some(Tier::Premium)
        } else if amount_cents >= 999 {
            Some(Tier::Pro)
        } else if amount_cents >= 499 {
            Some(Tier::Basic)
        } else {
            None
        }
    }

    /// Parse a stored tier name, falling back to `Free` for anything unknown
    pub fn from_stored(value: Option<&str>) -> Tier {
        value.and_then(|v| v.parse().ok()).unwrap_or_default()
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string names no known tier
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown tier: {0}")]
pub struct UnknownTier(pub String);

impl FromStr for Tier {
    type Err = UnknownTier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free" => Ok(Tier::Free),
            "basic" => Ok(Tier::Basic),
            "pro" => Ok(Tier::Pro),
            "premium" => Ok(Tier::Premium),
            other => Err(UnknownTier(other.to_string())),
        }
    }
}
