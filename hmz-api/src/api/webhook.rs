//! Payment provider webhook
//!
//! Maps the paid plan to a tier and stores it on the user's profile. When a
//! webhook secret is configured, the raw body must carry a valid
//! `X-Webhook-Signature`: lowercase hex of `SHA-256(secret || body)`.

use axum::{body::Bytes, extract::State, http::HeaderMap, Json};
use hmz_common::db::users::set_user_tier;
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::{info, warn};

use crate::error::{ApiError, ApiResult};
use crate::AppState;

pub const SIGNATURE_HEADER: &str = "x-webhook-signature";

#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub data: Option<WebhookData>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookData {
    #[serde(default)]
    pub metadata: Option<WebhookMetadata>,
    #[serde(default)]
    pub plan_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookMetadata {
    #[serde(default, alias = "supabase_uid")]
    pub user_id: Option<String>,
}

impl WebhookPayload {
    /// `(user_id, plan_id)` when both are present and non-empty
    fn target(&self) -> Option<(&str, &str)> {
        let data = self.data.as_ref()?;
        let user_id = data.metadata.as_ref()?.user_id.as_deref()?;
        let plan_id = data.plan_id.as_deref()?;
        if user_id.is_empty() || plan_id.is_empty() {
            return None;
        }
        Some((user_id, plan_id))
    }
}

/// Lowercase hex SHA-256 of `secret` followed by `body`
pub fn sign(secret: &str, body: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update(body);
    format!("{:x}", hasher.finalize())
}

fn verify_signature(secret: &str, headers: &HeaderMap, body: &[u8]) -> Result<(), ApiError> {
    let provided = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .ok_or_else(|| ApiError::Unauthorized("Missing webhook signature".to_string()))?;

    let provided = provided.to_ascii_lowercase();
    let expected = sign(secret, body);
    if !bool::from(provided.as_bytes().ct_eq(expected.as_bytes())) {
        warn!("Webhook signature mismatch");
        return Err(ApiError::Unauthorized("Invalid webhook signature".to_string()));
    }
    Ok(())
}

/// POST /api/webhooks/payment
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    if let Some(secret) = state.config.billing.webhook_secret.as_deref() {
        verify_signature(secret, &headers, &body)?;
    }

    let payload: WebhookPayload = serde_json::from_slice(&body).map_err(|e| {
        warn!("Malformed webhook payload: {}", e);
        ApiError::BadRequest("Invalid webhook payload".to_string())
    })?;

    let Some((user_id, plan_id)) = payload.target() else {
        warn!("Webhook missing user_id or plan_id");
        return Err(ApiError::BadRequest("Missing user_id or plan_id".to_string()));
    };

    let tier = state.config.billing.tier_for_plan(plan_id);
    info!(
        "Webhook {}: plan {} -> tier {} for user {}",
        payload.event.as_deref().unwrap_or("(none)"),
        plan_id,
        tier,
        user_id
    );

    if !set_user_tier(&state.db, user_id, tier, tier.as_str()).await? {
        return Err(ApiError::NotFound(format!("Unknown user: {}", user_id)));
    }

    Ok(Json(json!({ "received": true, "tier": tier })))
}
