//! Bearer session authentication
//!
//! Sessions are issued by the external auth provider and mirrored in the
//! `sessions` table; a request is authenticated when its
//! `Authorization: Bearer <token>` names an unexpired session.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use hmz_common::db::users::find_session_user;
use hmz_common::db::SessionUser;
use hmz_common::time::now;
use tracing::debug;

use crate::error::ApiError;
use crate::AppState;

pub const AUTH_REQUIRED: &str = "Authentication required";

/// Token from an `Authorization: Bearer` header, if well-formed
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Resolve the caller of a request, or fail with 401
pub async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<SessionUser, ApiError> {
    let Some(token) = bearer_token(headers) else {
        debug!("Request without bearer token");
        return Err(ApiError::Unauthorized(AUTH_REQUIRED.to_string()));
    };

    match find_session_user(&state.db, token, now()).await? {
        Some(user) => Ok(user),
        None => {
            debug!("Unknown or expired session token");
            Err(ApiError::Unauthorized(AUTH_REQUIRED.to_string()))
        }
    }
}

/// Extractor for handlers that need an authenticated caller
pub struct AuthUser(pub SessionUser);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        authenticate(state, &parts.headers).await.map(AuthUser)
    }
}
