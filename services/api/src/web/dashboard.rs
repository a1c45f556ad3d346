//! services/api/src/web/dashboard.rs

use axum::{extract::State, Extension, Json};
use serde::Serialize;
use std::sync::Arc;
use study_planner_core::dashboard::build_dashboard;
use study_planner_core::domain::Profile;
use study_planner_core::stage::StageInfo;
use study_planner_core::strength::ProfileStrength;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::web::state::AppState;
use crate::web::todos::TodoResponse;

#[derive(Serialize, ToSchema)]
pub struct ProfileStrengthResponse {
    #[schema(example = "strong")]
    pub academic: String,
    #[schema(example = "in_progress")]
    pub exams: String,
    #[schema(example = "draft")]
    pub sop: String,
    pub overall_score: u8,
}

impl From<ProfileStrength> for ProfileStrengthResponse {
    fn from(strength: ProfileStrength) -> Self {
        Self {
            academic: strength.academic.as_str().to_string(),
            exams: strength.exams.as_str().to_string(),
            sop: strength.sop.as_str().to_string(),
            overall_score: strength.overall_score,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct StageInfoResponse {
    pub current_stage: u8,
    pub stage_name: String,
    pub stage_description: String,
    pub is_locked: bool,
    pub next_action: String,
}

impl From<StageInfo> for StageInfoResponse {
    fn from(info: StageInfo) -> Self {
        Self {
            current_stage: info.current_stage,
            stage_name: info.stage_name.to_string(),
            stage_description: info.stage_description.to_string(),
            is_locked: info.is_locked,
            next_action: info.next_action.to_string(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct DashboardResponse {
    pub profile_strength: ProfileStrengthResponse,
    pub stage_info: StageInfoResponse,
    /// The ten most pressing todos.
    pub todos: Vec<TodoResponse>,
    pub shortlisted_count: i64,
    pub locked_count: i64,
}

#[utoipa::path(
    get,
    path = "/api/dashboard",
    tag = "Dashboard",
    responses(
        (status = 200, description = "Strength, stage and top todos", body = DashboardResponse),
        (status = 403, description = "Onboarding must be completed first")
    )
)]
pub async fn dashboard_handler(
    State(state): State<Arc<AppState>>,
    Extension(profile): Extension<Profile>,
) -> Result<Json<DashboardResponse>, ApiError> {
    let dashboard = build_dashboard(state.db.as_ref(), &profile).await?;
    Ok(Json(DashboardResponse {
        profile_strength: dashboard.profile_strength.into(),
        stage_info: dashboard.stage_info.into(),
        todos: dashboard.todos.into_iter().map(TodoResponse::from).collect(),
        shortlisted_count: dashboard.shortlisted_count,
        locked_count: dashboard.locked_count,
    }))
}
