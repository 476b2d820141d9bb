//! Checkout and customer-portal redirects
//!
//! The payment provider hosts both flows; these routes only send the
//! browser to the configured URLs.

use axum::{
    extract::{Path, State},
    response::Redirect,
};
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// GET /billing/checkout/:plan
pub async fn checkout_redirect(
    State(state): State<AppState>,
    Path(plan): Path<String>,
) -> ApiResult<Redirect> {
    let url = state
        .config
        .billing
        .checkout_urls
        .get(&plan)
        .ok_or_else(|| ApiError::NotFound(format!("Unknown plan: {}", plan)))?;

    debug!("Checkout redirect for plan {}", plan);
    Ok(Redirect::to(url))
}

/// GET /billing/portal
pub async fn portal_redirect(State(state): State<AppState>) -> ApiResult<Redirect> {
    state
        .config
        .billing
        .portal_url
        .as_deref()
        .map(Redirect::to)
        .ok_or_else(|| ApiError::NotFound("Customer portal is not configured".to_string()))
}
