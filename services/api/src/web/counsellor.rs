//! services/api/src/web/counsellor.rs
//!
//! The AI counsellor: chat, transcript and a provider health check.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use study_planner_core::counsellor::{history_limit, Counsellor};
use study_planner_core::domain::{ChatEntry, Profile};
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Serialize, ToSchema)]
pub struct ChatResponse {
    pub message: String,
    /// The actions the counsellor proposed, as sent by the model.
    #[schema(value_type = Vec<Object>)]
    pub actions: Vec<Value>,
    pub suggested_questions: Vec<String>,
    /// One line per executed action, in order.
    pub action_results: Vec<String>,
}

#[derive(Serialize, ToSchema)]
pub struct ChatEntryResponse {
    pub id: Uuid,
    #[schema(example = "assistant")]
    pub role: String,
    pub message: String,
    #[schema(value_type = Option<Object>)]
    pub actions: Option<Value>,
    pub suggested_questions: Option<Vec<String>>,
    pub created_at: DateTime<Utc>,
}

impl From<ChatEntry> for ChatEntryResponse {
    fn from(entry: ChatEntry) -> Self {
        Self {
            id: entry.id,
            role: entry.role.to_string(),
            message: entry.message,
            actions: entry.actions,
            suggested_questions: entry.suggested_questions,
            created_at: entry.created_at,
        }
    }
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HistoryParams {
    /// Newest entries to return, oldest first. Between 1 and 200; defaults to 50.
    pub limit: Option<i64>,
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    #[schema(example = "gemini")]
    pub ai_service: String,
    pub gemini_key_configured: bool,
    pub openai_key_configured: bool,
    pub status: String,
}

//=========================================================================================
// Handlers
//=========================================================================================

#[utoipa::path(
    get,
    path = "/api/counsellor/health",
    tag = "Counsellor",
    responses(
        (status = 200, description = "Which provider is configured", body = HealthResponse)
    )
)]
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let config = &state.config;
    Json(HealthResponse {
        ai_service: config.ai_service.to_string(),
        gemini_key_configured: config.gemini_api_key.is_some(),
        openai_key_configured: config.openai_api_key.is_some(),
        status: "healthy".to_string(),
    })
}

/// Send one message to the counsellor. Any actions in the reply are applied
/// to the user's plan before the response is returned.
#[utoipa::path(
    post,
    path = "/api/counsellor/chat",
    tag = "Counsellor",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "The counsellor's reply and action results", body = ChatResponse),
        (status = 400, description = "Empty message"),
        (status = 403, description = "Onboarding must be completed first")
    )
)]
pub async fn chat_handler(
    State(state): State<Arc<AppState>>,
    Extension(profile): Extension<Profile>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let message = req.message.trim();
    if message.is_empty() {
        return Err(ApiError::BadRequest("Message cannot be empty".to_string()));
    }

    let counsellor = Counsellor::new(
        state.db.as_ref(),
        state.store.as_ref(),
        state.counsellor_model.as_ref(),
    );
    let reply = counsellor.chat(&profile, message).await?;
    if !reply.report.outcomes.is_empty() {
        info!(
            "Counsellor applied {}/{} actions for user {}",
            reply.report.applied(),
            reply.report.outcomes.len(),
            profile.user_id
        );
    }

    Ok(Json(ChatResponse {
        message: reply.message,
        actions: reply.actions,
        suggested_questions: reply.suggested_questions,
        action_results: reply.action_results,
    }))
}

#[utoipa::path(
    get,
    path = "/api/counsellor/history",
    tag = "Counsellor",
    params(HistoryParams),
    responses(
        (status = 200, description = "Transcript, oldest first", body = [ChatEntryResponse]),
        (status = 400, description = "Limit out of range")
    )
)]
pub async fn history_handler(
    State(state): State<Arc<AppState>>,
    Extension(profile): Extension<Profile>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<ChatEntryResponse>>, ApiError> {
    let limit = history_limit(params.limit)?;
    let counsellor = Counsellor::new(
        state.db.as_ref(),
        state.store.as_ref(),
        state.counsellor_model.as_ref(),
    );
    let entries = counsellor.history(profile.user_id, limit).await?;
    Ok(Json(entries.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    delete,
    path = "/api/counsellor/history",
    tag = "Counsellor",
    responses(
        (status = 204, description = "Transcript cleared")
    )
)]
pub async fn clear_history_handler(
    State(state): State<Arc<AppState>>,
    Extension(profile): Extension<Profile>,
) -> Result<StatusCode, ApiError> {
    let counsellor = Counsellor::new(
        state.db.as_ref(),
        state.store.as_ref(),
        state.counsellor_model.as_ref(),
    );
    counsellor.clear_history(profile.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
