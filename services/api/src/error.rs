//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service and how it is
//! rendered to HTTP clients.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::config::ConfigError;
use study_planner_core::domain::ProfileError;
use study_planner_core::onboarding::OnboardingError;
use study_planner_core::counsellor::HistoryLimitError;
use study_planner_core::planner::PlannerError;
use study_planner_core::ports::PortError;
use study_planner_core::recommend::LimitError;
use study_planner_core::todos::TodoError;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Port(PortError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Port(PortError::Conflict(_)) => StatusCode::BAD_REQUEST,
            ApiError::Port(PortError::Unauthorized) => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The message shown to clients. Server-side failures are not described.
    fn detail(&self) -> String {
        match self.status() {
            StatusCode::INTERNAL_SERVER_ERROR => "Internal server error".to_string(),
            _ => match self {
                ApiError::Port(PortError::NotFound(_)) => "Not found".to_string(),
                other => other.to_string(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {:?}", self);
        }
        (status, Json(json!({ "detail": self.detail() }))).into_response()
    }
}

impl From<PlannerError> for ApiError {
    fn from(err: PlannerError) -> Self {
        match err {
            PlannerError::AlreadyListed | PlannerError::NotShortlisted => {
                ApiError::BadRequest(err.to_string())
            }
            PlannerError::UniversityNotFound
            | PlannerError::NotLocked
            | PlannerError::NotInShortlist => ApiError::NotFound(err.to_string()),
            PlannerError::ProfileMissing => ApiError::Forbidden(err.to_string()),
            PlannerError::Port(port) => ApiError::Port(port),
        }
    }
}

impl From<TodoError> for ApiError {
    fn from(err: TodoError) -> Self {
        match err {
            TodoError::BlankTitle => ApiError::BadRequest(err.to_string()),
            TodoError::Port(PortError::NotFound(_)) => {
                ApiError::NotFound("Todo not found".to_string())
            }
            TodoError::Port(port) => ApiError::Port(port),
        }
    }
}

impl From<ProfileError> for ApiError {
    fn from(err: ProfileError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<OnboardingError> for ApiError {
    fn from(err: OnboardingError) -> Self {
        match err {
            OnboardingError::Invalid(invalid) => invalid.into(),
            OnboardingError::Port(port) => ApiError::Port(port),
        }
    }
}

impl From<LimitError> for ApiError {
    fn from(err: LimitError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<HistoryLimitError> for ApiError {
    fn from(err: HistoryLimitError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}
