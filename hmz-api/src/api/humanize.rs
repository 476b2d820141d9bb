//! Non-streaming humanize endpoint and the admission shared with the
//! streaming one

use axum::{
    extract::{rejection::JsonRejection, State},
    http::HeaderMap,
    Json,
};
use hmz_common::text::word_count;
use hmz_common::Tier;
use serde::{Deserialize, Serialize};
use tracing::{error, info, info_span, Instrument};

use super::auth::authenticate;
use crate::error::{ApiError, ApiResult};
use crate::services::rewriter::clamp_dial;
use crate::services::{new_request_id, HumanizeJob, Pipeline, RewriteResult};
use crate::AppState;

/// Dial used when the request omits `strength`
pub const DEFAULT_STRENGTH: f64 = 50.0;

/// Body of both humanize endpoints
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HumanizeRequest {
    #[serde(default)]
    pub input_text: Option<String>,
    #[serde(default)]
    pub strength: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HumanizeResponse {
    pub success: bool,
    pub output_text: String,
    pub word_count: u64,
    pub tier: Tier,
    pub monthly_usage: u64,
    pub monthly_limit: u64,
    pub initial_detection_score: u8,
    pub final_detection_score: u8,
    pub request_id: String,
}

impl HumanizeResponse {
    fn from_result(result: RewriteResult, request_id: String) -> Self {
        Self {
            success: true,
            output_text: result.output_text,
            word_count: result.word_count,
            tier: result.tier,
            monthly_usage: result.monthly_usage,
            monthly_limit: result.monthly_limit,
            initial_detection_score: result.initial_score,
            final_detection_score: result.final_score,
            request_id,
        }
    }
}

/// Admission checks shared by both humanize endpoints
///
/// Order: input, authentication, quota, model availability. Nothing remote
/// is called before all of them pass.
pub(crate) async fn admit(
    state: &AppState,
    headers: &HeaderMap,
    body: Result<Json<HumanizeRequest>, JsonRejection>,
    request_id: &str,
) -> ApiResult<(Pipeline, HumanizeJob)> {
    let Json(request) = body.map_err(|rejection| {
        info!("Rejected request body: {}", rejection.body_text());
        ApiError::BadRequest("Invalid request body".to_string())
    })?;

    let input_text = match request.input_text {
        Some(text) if !text.trim().is_empty() => text,
        _ => {
            info!("Rejected: input text is required");
            return Err(ApiError::BadRequest("Input text is required".to_string()));
        }
    };

    let user = authenticate(state, headers).await?;
    info!("User authenticated: {}", user.id);

    let words = word_count(&input_text);
    let admission = state
        .quota()
        .admit(&user.id, words)
        .await
        .map_err(|e| ApiError::from_admission(e, request_id))?;
    info!(
        "Admitted: tier {}, monthly usage {}, word count {}",
        admission.tier, admission.prior_usage, words
    );

    let Some(pipeline) = state.pipeline() else {
        error!("No LLM API key configured");
        return Err(ApiError::unavailable());
    };

    let job = HumanizeJob {
        request_id: request_id.to_string(),
        user_id: user.id,
        input_text,
        word_count: words,
        dial: clamp_dial(request.strength.unwrap_or(DEFAULT_STRENGTH)),
        admission,
    };
    Ok((pipeline, job))
}

/// POST /api/humanize
///
/// Runs the whole rewrite and answers with one JSON object. The work runs
/// in its own task so a dropped connection still finishes and records the
/// attempt.
pub async fn humanize(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<HumanizeRequest>, JsonRejection>,
) -> ApiResult<Json<HumanizeResponse>> {
    let request_id = new_request_id("req");
    let span = info_span!("humanize", request_id = %request_id);

    async move {
        info!("Starting humanization request");
        let (pipeline, job) = admit(&state, &headers, body, &request_id).await?;

        let task = tokio::spawn(async move { pipeline.run_once(&job).await }.in_current_span());
        match task.await {
            Ok(Ok(result)) => {
                info!("Humanization completed, {} chars", result.output_text.len());
                Ok(Json(HumanizeResponse::from_result(result, request_id)))
            }
            Ok(Err(e)) => Err(ApiError::Upstream {
                message: e.user_message().to_string(),
                request_id,
            }),
            Err(e) => Err(ApiError::Internal(format!("Humanize task failed: {}", e))),
        }
    }
    .instrument(span)
    .await
}
