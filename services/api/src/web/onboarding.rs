//! services/api/src/web/onboarding.rs
//!
//! Onboarding endpoints. These sit behind authentication only, since they are
//! how a user gets past the onboarding gate in the first place.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use study_planner_core::domain::{ExamRecord, Profile, UnknownLabel};
use study_planner_core::onboarding::{onboarding_status, submit_onboarding};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

/// The onboarding form. Enumerated fields are lowercase labels such as
/// `masters`, `in_progress` or `self_funded`.
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
pub struct ProfilePayload {
    pub education_level: Option<String>,
    pub degree: Option<String>,
    pub major: Option<String>,
    pub graduation_year: Option<i32>,
    pub gpa: Option<f64>,

    #[schema(example = "masters")]
    pub intended_degree: String,
    pub field_of_study: Option<String>,
    pub target_intake_year: Option<i32>,
    #[serde(default)]
    pub preferred_countries: Vec<String>,

    pub budget_min: Option<i32>,
    pub budget_max: Option<i32>,
    pub funding_type: Option<String>,

    pub ielts_status: Option<String>,
    pub ielts_score: Option<f64>,
    pub toefl_status: Option<String>,
    pub toefl_score: Option<i32>,
    pub gre_status: Option<String>,
    pub gre_score: Option<i32>,
    pub gmat_status: Option<String>,
    pub gmat_score: Option<i32>,
    pub sop_status: Option<String>,

    #[serde(default, skip_deserializing)]
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Serialize, ToSchema)]
pub struct OnboardingStatusResponse {
    pub is_complete: bool,
    pub exists: bool,
}

fn parse_optional<T: FromStr<Err = UnknownLabel>>(
    value: Option<&str>,
) -> Result<Option<T>, UnknownLabel> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::parse)
        .transpose()
}

fn exam<S>(status: Option<&str>, score: Option<S>) -> Result<ExamRecord<S>, UnknownLabel> {
    Ok(ExamRecord {
        status: parse_optional(status)?,
        score,
    })
}

impl ProfilePayload {
    /// Parses every label into the domain profile. Range checks are left to
    /// `Profile::validate`.
    pub fn into_profile(self, user_id: Uuid) -> Result<Profile, ApiError> {
        let bad_label = |e: UnknownLabel| ApiError::BadRequest(e.to_string());
        Ok(Profile {
            user_id,
            education_level: self.education_level,
            degree: self.degree,
            major: self.major,
            graduation_year: self.graduation_year,
            gpa: self.gpa,
            intended_degree: self.intended_degree.parse().map_err(bad_label)?,
            field_of_study: self.field_of_study,
            target_intake_year: self.target_intake_year,
            preferred_countries: self.preferred_countries,
            budget_min: self.budget_min,
            budget_max: self.budget_max,
            funding_type: parse_optional(self.funding_type.as_deref()).map_err(bad_label)?,
            ielts: exam(self.ielts_status.as_deref(), self.ielts_score).map_err(bad_label)?,
            toefl: exam(self.toefl_status.as_deref(), self.toefl_score).map_err(bad_label)?,
            gre: exam(self.gre_status.as_deref(), self.gre_score).map_err(bad_label)?,
            gmat: exam(self.gmat_status.as_deref(), self.gmat_score).map_err(bad_label)?,
            sop_status: parse_optional(self.sop_status.as_deref()).map_err(bad_label)?,
            completed_at: None,
        })
    }
}

fn label<T: ToString>(value: Option<T>) -> Option<String> {
    value.map(|v| v.to_string())
}

impl From<Profile> for ProfilePayload {
    fn from(profile: Profile) -> Self {
        Self {
            education_level: profile.education_level,
            degree: profile.degree,
            major: profile.major,
            graduation_year: profile.graduation_year,
            gpa: profile.gpa,
            intended_degree: profile.intended_degree.to_string(),
            field_of_study: profile.field_of_study,
            target_intake_year: profile.target_intake_year,
            preferred_countries: profile.preferred_countries,
            budget_min: profile.budget_min,
            budget_max: profile.budget_max,
            funding_type: label(profile.funding_type),
            ielts_status: label(profile.ielts.status),
            ielts_score: profile.ielts.score,
            toefl_status: label(profile.toefl.status),
            toefl_score: profile.toefl.score,
            gre_status: label(profile.gre.status),
            gre_score: profile.gre.score,
            gmat_status: label(profile.gmat.status),
            gmat_score: profile.gmat.score,
            sop_status: label(profile.sop_status),
            completed_at: profile.completed_at,
        }
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// Submit (or resubmit) the onboarding profile.
#[utoipa::path(
    post,
    path = "/api/onboarding",
    tag = "Onboarding",
    request_body = ProfilePayload,
    responses(
        (status = 201, description = "Profile stored and marked complete", body = ProfilePayload),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn submit_onboarding_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(payload): Json<ProfilePayload>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = payload.into_profile(user_id)?;
    let stored = submit_onboarding(state.db.as_ref(), user_id, profile).await?;
    Ok((StatusCode::CREATED, Json(ProfilePayload::from(stored))))
}

#[utoipa::path(
    get,
    path = "/api/onboarding",
    tag = "Onboarding",
    responses(
        (status = 200, description = "The stored profile", body = ProfilePayload),
        (status = 404, description = "No profile yet")
    )
)]
pub async fn get_onboarding_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<Json<ProfilePayload>, ApiError> {
    let profile = state
        .db
        .get_profile(user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Profile not found".to_string()))?;
    Ok(Json(profile.into()))
}

#[utoipa::path(
    get,
    path = "/api/onboarding/status",
    tag = "Onboarding",
    responses(
        (status = 200, description = "Whether onboarding is done", body = OnboardingStatusResponse)
    )
)]
pub async fn onboarding_status_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<Json<OnboardingStatusResponse>, ApiError> {
    let status = onboarding_status(state.db.as_ref(), user_id).await?;
    Ok(Json(OnboardingStatusResponse {
        is_complete: status.is_complete,
        exists: status.exists,
    }))
}
