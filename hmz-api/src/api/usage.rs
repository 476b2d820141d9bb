//! Usage summary for the dashboard

use axum::{extract::State, Json};
use hmz_common::db::usage::recent_usage_records;
use hmz_common::db::{Outcome, UsageRecord};
use hmz_common::text::preview;
use hmz_common::Tier;
use serde::Serialize;

use super::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::services::{new_request_id, TierSource};
use crate::AppState;

const RECENT_LIMIT: i64 = 10;
const PREVIEW_CHARS: usize = 80;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSummary {
    pub tier: Tier,
    pub tier_source: TierSource,
    pub monthly_usage: u64,
    pub monthly_limit: u64,
    pub per_request_limit: u64,
    pub remaining: u64,
    pub recent: Vec<RecentAttempt>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentAttempt {
    pub id: i64,
    pub word_count: i64,
    pub outcome: Outcome,
    pub created_at: String,
    pub input_preview: String,
}

impl From<UsageRecord> for RecentAttempt {
    fn from(record: UsageRecord) -> Self {
        Self {
            id: record.id,
            word_count: record.word_count,
            outcome: record.outcome,
            created_at: record.created_at,
            input_preview: preview(&record.input_text, PREVIEW_CHARS),
        }
    }
}

/// GET /api/usage
pub async fn get_usage(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<UsageSummary>> {
    let quota = state.quota();
    let resolution = quota.tier_or_free(&user.id).await;
    let monthly_usage = quota
        .current_usage(&user.id)
        .await
        .map_err(|e| ApiError::from_admission(e, &new_request_id("usage")))?;
    let limits = resolution.tier.limits();

    let recent = recent_usage_records(&state.db, &user.id, RECENT_LIMIT)
        .await?
        .into_iter()
        .map(RecentAttempt::from)
        .collect();

    Ok(Json(UsageSummary {
        tier: resolution.tier,
        tier_source: resolution.source,
        monthly_usage,
        monthly_limit: limits.per_month,
        per_request_limit: limits.per_request,
        remaining: limits.per_month.saturating_sub(monthly_usage),
        recent,
    }))
}
