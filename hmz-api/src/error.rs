//! Error types for hmz-api
//!
//! Every error response is a JSON object with an `error` field; quota and
//! upstream errors add the fields browser clients switch on.

use crate::services::{AdmissionError, QuotaError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use hmz_common::Tier;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Message shown whenever the service cannot currently take requests
pub const UNAVAILABLE_MESSAGE: &str = "Service temporarily unavailable. Please try again later.";

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("{0}")]
    BadRequest(String),

    /// Missing or unknown session (401)
    #[error("{0}")]
    Unauthorized(String),

    /// Over a tier cap (400 with `needsUpgrade`)
    #[error("{message}")]
    Quota { message: String, tier: Tier },

    /// Resource not found (404)
    #[error("{0}")]
    NotFound(String),

    /// Dependency missing or failing (503)
    #[error("{message}")]
    Unavailable { message: String, request_id: Option<String> },

    /// Model provider failed (502)
    #[error("{message}")]
    Upstream { message: String, request_id: String },

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// hmz-common error
    #[error("Common error: {0}")]
    Common(#[from] hmz_common::Error),
}

impl From<QuotaError> for ApiError {
    fn from(e: QuotaError) -> Self {
        ApiError::Quota { tier: e.tier(), message: e.to_string() }
    }
}

impl ApiError {
    /// Map an admission refusal, tagging 503s with the request id
    pub fn from_admission(e: AdmissionError, request_id: &str) -> Self {
        match e {
            AdmissionError::Quota(quota) => quota.into(),
            AdmissionError::UsageUnavailable(source) => {
                error!("[{}] Usage lookup failed: {}", request_id, source);
                ApiError::Unavailable {
                    message: UNAVAILABLE_MESSAGE.to_string(),
                    request_id: Some(request_id.to_string()),
                }
            }
        }
    }

    pub fn unavailable() -> Self {
        ApiError::Unavailable { message: UNAVAILABLE_MESSAGE.to_string(), request_id: None }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, json!({ "error": msg })),
            ApiError::Quota { message, tier } => (
                StatusCode::BAD_REQUEST,
                json!({
                    "error": message,
                    "needsUpgrade": true,
                    "currentTier": tier,
                }),
            ),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            ApiError::Unavailable { message, request_id: Some(id) } => (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({ "error": message, "requestId": id }),
            ),
            ApiError::Unavailable { message, request_id: None } => {
                (StatusCode::SERVICE_UNAVAILABLE, json!({ "error": message }))
            }
            ApiError::Upstream { message, request_id } => (
                StatusCode::BAD_GATEWAY,
                json!({
                    "success": false,
                    "error": message,
                    "requestId": request_id,
                }),
            ),
            ApiError::Internal(msg) => {
                error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": "Failed to process request" }))
            }
            ApiError::Common(err) => {
                error!("Common error: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": "Failed to process request" }))
            }
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
