//! Tier resolution and quota admission
//!
//! Admission runs before any remote call: it resolves the caller's tier,
//! sums this month's billed words and compares both against the tier's
//! caps. No result is cached; every request re-queries the database.

use chrono::{DateTime, Utc};
use hmz_common::config::UsageLookupFailure;
use hmz_common::db::subscriptions::active_subscription;
use hmz_common::db::usage::period_word_usage;
use hmz_common::db::users::get_user_tier;
use hmz_common::db::UsageLookup;
use hmz_common::time::{now, start_of_month};
use hmz_common::{Result, Tier, TierLimits};
use serde::Serialize;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{debug, warn};

/// Where a resolved tier came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TierSource {
    /// Active paid subscription, mapped by amount
    Subscription,
    /// Tier stored on the user profile
    Profile,
    /// No record at all, or lookup failed
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TierResolution {
    pub tier: Tier,
    pub source: TierSource,
}

impl TierResolution {
    fn fallback() -> Self {
        Self { tier: Tier::Free, source: TierSource::Default }
    }
}

/// Request refused because it would exceed a word cap
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuotaError {
    #[error("Text exceeds {limit} word limit for {tier} plan")]
    PerRequest { limit: u64, tier: Tier },

    #[error("Monthly limit of {limit} words exceeded")]
    PerMonth { limit: u64, tier: Tier },
}

impl QuotaError {
    pub fn tier(&self) -> Tier {
        match self {
            QuotaError::PerRequest { tier, .. } | QuotaError::PerMonth { tier, .. } => *tier,
        }
    }
}

/// Why admission refused a request
#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error(transparent)]
    Quota(#[from] QuotaError),

    /// Usage could not be read and the policy is to refuse
    #[error("Usage lookup failed: {0}")]
    UsageUnavailable(#[source] hmz_common::Error),
}

/// Accepted request, with the figures the response needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    pub tier: Tier,
    pub limits: TierLimits,
    /// Words billed this month before this request
    pub prior_usage: u64,
}

impl Admission {
    /// Monthly usage once `word_count` more words are billed
    pub fn usage_after(&self, word_count: u64) -> u64 {
        self.prior_usage + word_count
    }
}

/// Compare a request against a tier's caps
pub fn check_admission(
    tier: Tier,
    limits: TierLimits,
    usage: u64,
    word_count: u64,
) -> std::result::Result<(), QuotaError> {
    if word_count > limits.per_request {
        return Err(QuotaError::PerRequest { limit: limits.per_request, tier });
    }
    if usage.saturating_add(word_count) > limits.per_month {
        return Err(QuotaError::PerMonth { limit: limits.per_month, tier });
    }
    Ok(())
}

/// Tier and usage lookups against the local database
#[derive(Clone)]
pub struct QuotaService {
    db: SqlitePool,
    on_usage_failure: UsageLookupFailure,
}

impl QuotaService {
    pub fn new(db: SqlitePool, on_usage_failure: UsageLookupFailure) -> Self {
        Self { db, on_usage_failure }
    }

    /// Resolve a user's tier
    ///
    /// An active subscription wins (mapped by monthly amount), then the
    /// profile's stored tier, then `Free`. Unknown stored names are `Free`.
    pub async fn resolve_tier(&self, user_id: &str) -> Result<TierResolution> {
        if let Some(subscription) = active_subscription(&self.db, user_id).await? {
            if let Some(tier) = Tier::from_subscription_amount(subscription.amount) {
                return Ok(TierResolution { tier, source: TierSource::Subscription });
            }
        }

        match get_user_tier(&self.db, user_id).await? {
            Some(stored) => Ok(TierResolution {
                tier: Tier::from_stored(Some(&stored)),
                source: TierSource::Profile,
            }),
            None => Ok(TierResolution::fallback()),
        }
    }

    /// Billed words since `period_start`
    pub async fn resolve_usage(
        &self,
        user_id: &str,
        period_start: DateTime<Utc>,
    ) -> Result<UsageLookup> {
        period_word_usage(&self.db, user_id, period_start).await
    }

    /// Tier resolution that never fails; errors degrade to `Free`
    pub async fn tier_or_free(&self, user_id: &str) -> TierResolution {
        match self.resolve_tier(user_id).await {
            Ok(resolution) => resolution,
            Err(e) => {
                warn!("Tier lookup failed for user {}, using free tier: {}", user_id, e);
                TierResolution::fallback()
            }
        }
    }

    /// Current-month usage with the configured failure policy applied
    pub async fn current_usage(&self, user_id: &str) -> std::result::Result<u64, AdmissionError> {
        let period_start = start_of_month(now());
        match self.resolve_usage(user_id, period_start).await {
            Ok(lookup) => Ok(lookup.words()),
            Err(e) => match self.on_usage_failure {
                UsageLookupFailure::Reject => Err(AdmissionError::UsageUnavailable(e)),
                UsageLookupFailure::AssumeZero => {
                    warn!("Usage lookup failed for user {}, assuming zero: {}", user_id, e);
                    Ok(0)
                }
            },
        }
    }

    /// Full admission decision for `word_count` new words
    pub async fn admit(
        &self,
        user_id: &str,
        word_count: u64,
    ) -> std::result::Result<Admission, AdmissionError> {
        let resolution = self.tier_or_free(user_id).await;
        let prior_usage = self.current_usage(user_id).await?;
        let limits = resolution.tier.limits();

        debug!(
            user_id = %user_id,
            tier = %resolution.tier,
            prior_usage,
            word_count,
            "Checking quota ({}/{})",
            limits.per_request,
            limits.per_month
        );

        check_admission(resolution.tier, limits, prior_usage, word_count)?;

        Ok(Admission { tier: resolution.tier, limits, prior_usage })
    }
}
