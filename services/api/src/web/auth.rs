//! services/api/src/web/auth.rs
//!
//! Authentication endpoints for user signup, login, and logout.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use study_planner_core::domain::User;
use study_planner_core::ports::PortError;
use tracing::{error, info};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::middleware::session_cookie;
use crate::web::state::AppState;

const INVALID_CREDENTIALS: &str = "Incorrect email or password";

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct AuthResponse {
    pub user_id: Uuid,
    pub email: String,
    pub full_name: String,
}

impl From<User> for AuthResponse {
    fn from(user: User) -> Self {
        Self {
            user_id: user.user_id,
            email: user.email,
            full_name: user.full_name,
        }
    }
}

//=========================================================================================
// Session helpers
//=========================================================================================

/// Creates a server-side session and returns the `Set-Cookie` value for it.
async fn start_session(state: &AppState, user_id: Uuid) -> Result<String, ApiError> {
    let auth_session_id = Uuid::new_v4().to_string();
    let ttl = Duration::days(state.config.session_ttl_days);

    state
        .db
        .create_auth_session(&auth_session_id, user_id, Utc::now() + ttl)
        .await?;

    Ok(format!(
        "session={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        auth_session_id,
        ttl.num_seconds()
    ))
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /api/auth/signup - Create a new user account
#[utoipa::path(
    post,
    path = "/api/auth/signup",
    tag = "Authentication",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "User created successfully", body = AuthResponse),
        (status = 400, description = "Email already registered or invalid request"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = normalize_email(&req.email);
    if email.is_empty() || req.password.is_empty() || req.full_name.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "Email, password and full name are required".to_string(),
        ));
    }

    // 1. Hash the password
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            ApiError::Internal("Failed to hash password".to_string())
        })?
        .to_string();

    // 2. Create user in database
    let user = state
        .db
        .create_user(&email, &password_hash, req.full_name.trim())
        .await
        .map_err(|e| match e {
            PortError::Conflict(_) => ApiError::BadRequest("Email already registered".to_string()),
            other => ApiError::Port(other),
        })?;
    info!("New account created for user {}", user.user_id);

    // 3. Create the auth session and cookie
    let cookie = start_session(&state, user.user_id).await?;

    Ok((
        StatusCode::CREATED,
        [(header::SET_COOKIE, cookie)],
        Json(AuthResponse::from(user)),
    ))
}

/// POST /api/auth/login - Login with existing account
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "Authentication",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // 1. Get user by email
    let user_creds = state
        .db
        .get_user_by_email(&normalize_email(&req.email))
        .await
        .map_err(|e| match e {
            PortError::NotFound(_) => ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()),
            other => ApiError::Port(other),
        })?;

    // 2. Verify password
    let parsed_hash = PasswordHash::new(&user_creds.hashed_password).map_err(|e| {
        error!("Failed to parse password hash: {:?}", e);
        ApiError::Internal("Authentication error".to_string())
    })?;

    if Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .is_err()
    {
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    }

    // 3. Create the auth session and cookie
    let cookie = start_session(&state, user_creds.user.user_id).await?;

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(AuthResponse::from(user_creds.user)),
    ))
}

/// POST /api/auth/logout - Logout and invalidate session
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "Authentication",
    responses(
        (status = 200, description = "Logout successful"),
        (status = 401, description = "No active session")
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    // 1. Extract the session ID from the cookie header
    let auth_session_id = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(session_cookie)
        .ok_or_else(|| ApiError::Unauthorized("No session found".to_string()))?;

    // 2. Delete auth session from database
    state.db.delete_auth_session(auth_session_id).await?;

    // 3. Clear cookie
    let cookie = "session=; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=0";

    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie.to_string())]))
}
