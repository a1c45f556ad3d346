//! services/api/src/web/middleware.rs
//!
//! Authentication and onboarding middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use study_planner_core::onboarding::require_profile;
use study_planner_core::ports::PortError;
use tracing::{debug, error};
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::state::AppState;

pub const ONBOARDING_REQUIRED: &str = "Onboarding must be completed first";

/// Reads the `session` cookie value out of a `Cookie` header.
pub fn session_cookie(cookie_header: &str) -> Option<&str> {
    cookie_header
        .split(';')
        .find_map(|c| c.trim().strip_prefix("session="))
        .filter(|value| !value.is_empty())
}

/// Middleware that validates the auth session cookie and extracts the user_id.
///
/// If valid, inserts the user_id into request extensions for handlers to use.
/// If invalid or missing, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let not_authenticated = || ApiError::Unauthorized("Not authenticated".to_string());

    // 1. Extract the session ID from the cookie header
    let auth_session_id = req
        .headers()
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(session_cookie)
        .ok_or_else(not_authenticated)?;

    // 2. Validate auth session in database, get user_id
    let user_id = state
        .db
        .validate_auth_session(auth_session_id)
        .await
        .map_err(|e| {
            if !matches!(e, PortError::Unauthorized) {
                error!("Failed to validate auth session: {:?}", e);
            }
            not_authenticated()
        })?;

    // 3. Insert user_id into request extensions and continue
    req.extensions_mut().insert(user_id);
    Ok(next.run(req).await)
}

/// Middleware that runs after `require_auth` and loads the completed profile.
///
/// Requests from users who have not finished onboarding get 403.
pub async fn require_onboarding(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user_id = req
        .extensions()
        .get::<Uuid>()
        .copied()
        .ok_or_else(|| ApiError::Unauthorized("Not authenticated".to_string()))?;

    let profile = require_profile(state.db.as_ref(), user_id)
        .await
        .map_err(|e| match e {
            PortError::NotFound(_) => {
                debug!("User {} has not completed onboarding", user_id);
                ApiError::Forbidden(ONBOARDING_REQUIRED.to_string())
            }
            other => ApiError::Port(other),
        })?;

    req.extensions_mut().insert(profile);
    Ok(next.run(req).await)
}
