//! hmz-api library - metered humanize service
//!
//! Rewrites user text through an OpenAI-compatible model, streams the result
//! as server-sent events, scores input and output for AI detection, and
//! meters usage in words against the caller's subscription tier.

use axum::http::{header, Method};
use axum::routing::{get, post};
use axum::Router;
use chrono::{DateTime, Utc};
use hmz_common::config::ServiceConfig;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;
pub mod llm;
pub mod services;

pub use error::{ApiError, ApiResult};

use llm::CompletionProvider;
use services::{Pipeline, QuotaService};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Model provider; `None` when no API key is configured
    pub llm: Option<Arc<dyn CompletionProvider>>,
    pub config: Arc<ServiceConfig>,
    /// Server startup timestamp (for uptime calculation)
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    /// Create new application state
    pub fn new(db: SqlitePool, llm: Option<Arc<dyn CompletionProvider>>, config: ServiceConfig) -> Self {
        Self { db, llm, config: Arc::new(config), startup_time: Utc::now() }
    }

    pub fn quota(&self) -> QuotaService {
        QuotaService::new(self.db.clone(), self.config.quota.usage_lookup_failure)
    }

    /// Humanize pipeline, or `None` if no model provider is configured
    pub fn pipeline(&self) -> Option<Pipeline> {
        self.llm
            .as_ref()
            .map(|provider| Pipeline::new(provider.clone(), &self.config.llm, self.db.clone()))
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    // Browser clients call the humanize routes cross-origin with a bearer token
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    let api = Router::new()
        .route("/api/humanize-stream", post(api::humanize_stream))
        .route("/api/humanize", post(api::humanize))
        .route("/api/usage", get(api::get_usage))
        .route("/api/webhooks/payment", post(api::payment_webhook))
        .route("/api/buildinfo", get(api::get_build_info))
        .layer(cors);

    let public = Router::new()
        .route("/billing/checkout/:plan", get(api::checkout_redirect))
        .route("/billing/portal", get(api::portal_redirect))
        .merge(api::health_routes());

    Router::new()
        .merge(api)
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
