//! services/api/src/web/universities.rs
//!
//! Catalogue browsing, recommendations and the direct shortlist/lock
//! lifecycle. Every handler here runs behind the onboarding gate, so the
//! completed `Profile` is available as a request extension.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use study_planner_core::domain::{
    Category, ListedUniversity, Profile, University, UniversityStatus,
};
use study_planner_core::planner::Planner;
use study_planner_core::recommend::{
    discover_universities, recommend_universities, Recommendation, ResultLimit,
};
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::state::AppState;

const UNLOCK_WARNING: &str = "You may need to review your application tasks";

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UniversityResponse {
    pub id: Uuid,
    pub name: String,
    pub country: String,
    #[schema(example = "masters")]
    pub degree_type: String,
    pub field_of_study: Option<String>,
    pub cost_level: Option<String>,
    pub estimated_cost_min: Option<i32>,
    pub estimated_cost_max: Option<i32>,
    pub competitiveness: Option<String>,
    pub avg_gpa_required: Option<f64>,
    pub min_ielts_required: Option<f64>,
    pub min_toefl_required: Option<i32>,
    pub min_gre_required: Option<i32>,
    pub description: Option<String>,
    pub website: Option<String>,
    pub ranking: Option<i32>,
}

impl From<University> for UniversityResponse {
    fn from(u: University) -> Self {
        Self {
            id: u.id,
            name: u.name,
            country: u.country,
            degree_type: u.degree_type.to_string(),
            field_of_study: u.field_of_study,
            cost_level: u.cost_level.map(|level| level.to_string()),
            estimated_cost_min: u.estimated_cost_min,
            estimated_cost_max: u.estimated_cost_max,
            competitiveness: u.competitiveness.map(|level| level.to_string()),
            avg_gpa_required: u.avg_gpa_required,
            min_ielts_required: u.min_ielts_required,
            min_toefl_required: u.min_toefl_required,
            min_gre_required: u.min_gre_required,
            description: u.description,
            website: u.website,
            ranking: u.ranking,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct RecommendationResponse {
    pub university: UniversityResponse,
    #[schema(example = "target")]
    pub category: String,
    #[schema(example = "medium")]
    pub acceptance_likelihood: String,
    pub fit_reason: String,
    pub risk_factors: String,
}

impl From<Recommendation> for RecommendationResponse {
    fn from(rec: Recommendation) -> Self {
        Self {
            university: rec.university.into(),
            category: rec.category.to_string(),
            acceptance_likelihood: rec.acceptance_likelihood.to_string(),
            fit_reason: rec.fit_reason,
            risk_factors: rec.risk_factors,
        }
    }
}

/// A shortlisted or locked university with its cached analysis.
#[derive(Serialize, ToSchema)]
pub struct UserUniversityResponse {
    pub id: Uuid,
    pub university_id: Uuid,
    #[schema(example = "shortlisted")]
    pub status: String,
    pub category: String,
    pub acceptance_likelihood: String,
    pub fit_reason: String,
    pub risk_factors: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub university: UniversityResponse,
}

impl From<ListedUniversity> for UserUniversityResponse {
    fn from(listed: ListedUniversity) -> Self {
        let entry = listed.entry;
        Self {
            id: entry.id,
            university_id: entry.university_id,
            status: entry.status.to_string(),
            category: entry.category.to_string(),
            acceptance_likelihood: entry.acceptance_likelihood.to_string(),
            fit_reason: entry.fit_reason,
            risk_factors: entry.risk_factors,
            created_at: entry.created_at,
            updated_at: entry.updated_at,
            university: listed.university.into(),
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct ShortlistRequest {
    pub university_id: Uuid,
    /// `dream`, `target` or `safe`. Omitted or unrecognised values fall back
    /// to the computed category.
    pub category: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct LockRequest {
    pub university_id: Uuid,
}

#[derive(Serialize, ToSchema)]
pub struct LockResponse {
    pub message: String,
    pub university: UniversityResponse,
}

#[derive(Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct CountsResponse {
    pub shortlisted: i64,
    pub locked: i64,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DiscoverParams {
    /// 1 to 50, default 20.
    pub limit: Option<i64>,
    pub country: Option<String>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LimitParams {
    /// 1 to 50, default 20.
    pub limit: Option<i64>,
}

//=========================================================================================
// Handlers
//=========================================================================================

#[utoipa::path(
    get,
    path = "/api/universities/discover",
    tag = "Universities",
    params(DiscoverParams),
    responses(
        (status = 200, description = "Programs of the intended degree", body = [UniversityResponse]),
        (status = 400, description = "Limit out of range")
    )
)]
pub async fn discover_handler(
    State(state): State<Arc<AppState>>,
    Extension(profile): Extension<Profile>,
    Query(params): Query<DiscoverParams>,
) -> Result<Json<Vec<UniversityResponse>>, ApiError> {
    let limit = ResultLimit::from_param(params.limit)?;
    let universities =
        discover_universities(state.db.as_ref(), &profile, params.country.as_deref(), limit)
            .await?;
    Ok(Json(universities.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/api/universities/recommendations",
    tag = "Universities",
    params(LimitParams),
    responses(
        (status = 200, description = "Scored candidates, safe first and dream last", body = [RecommendationResponse]),
        (status = 400, description = "Limit out of range")
    )
)]
pub async fn recommendations_handler(
    State(state): State<Arc<AppState>>,
    Extension(profile): Extension<Profile>,
    Query(params): Query<LimitParams>,
) -> Result<Json<Vec<RecommendationResponse>>, ApiError> {
    let limit = ResultLimit::from_param(params.limit)?;
    let recommendations = recommend_universities(state.db.as_ref(), &profile, limit).await?;
    Ok(Json(recommendations.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    post,
    path = "/api/universities/shortlist",
    tag = "Universities",
    request_body = ShortlistRequest,
    responses(
        (status = 201, description = "University shortlisted", body = UserUniversityResponse),
        (status = 400, description = "Already in the list"),
        (status = 404, description = "University not found")
    )
)]
pub async fn shortlist_handler(
    State(state): State<Arc<AppState>>,
    Extension(profile): Extension<Profile>,
    Json(req): Json<ShortlistRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let category = lenient_category(req.category.as_deref());
    let listed = Planner::new(state.store.as_ref())
        .shortlist(profile.user_id, req.university_id, category)
        .await?;
    info!(
        "User {} shortlisted {} as {}",
        profile.user_id, listed.university.name, listed.entry.category
    );
    Ok((StatusCode::CREATED, Json(UserUniversityResponse::from(listed))))
}

#[utoipa::path(
    get,
    path = "/api/universities/shortlisted",
    tag = "Universities",
    responses(
        (status = 200, description = "Shortlisted universities", body = [UserUniversityResponse])
    )
)]
pub async fn shortlisted_handler(
    State(state): State<Arc<AppState>>,
    Extension(profile): Extension<Profile>,
) -> Result<Json<Vec<UserUniversityResponse>>, ApiError> {
    listed(&state, profile.user_id, UniversityStatus::Shortlisted).await
}

#[utoipa::path(
    get,
    path = "/api/universities/locked",
    tag = "Universities",
    responses(
        (status = 200, description = "Locked universities", body = [UserUniversityResponse])
    )
)]
pub async fn locked_handler(
    State(state): State<Arc<AppState>>,
    Extension(profile): Extension<Profile>,
) -> Result<Json<Vec<UserUniversityResponse>>, ApiError> {
    listed(&state, profile.user_id, UniversityStatus::Locked).await
}

async fn listed(
    state: &AppState,
    user_id: Uuid,
    status: UniversityStatus,
) -> Result<Json<Vec<UserUniversityResponse>>, ApiError> {
    let rows = state.db.list_user_universities(user_id, status).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    post,
    path = "/api/universities/lock",
    tag = "Universities",
    request_body = LockRequest,
    responses(
        (status = 200, description = "University locked", body = LockResponse),
        (status = 400, description = "University must be shortlisted first")
    )
)]
pub async fn lock_handler(
    State(state): State<Arc<AppState>>,
    Extension(profile): Extension<Profile>,
    Json(req): Json<LockRequest>,
) -> Result<Json<LockResponse>, ApiError> {
    let university = Planner::new(state.store.as_ref())
        .lock(profile.user_id, req.university_id)
        .await?;
    Ok(Json(LockResponse {
        message: format!("Locked {}", university.name),
        university: university.into(),
    }))
}

#[utoipa::path(
    post,
    path = "/api/universities/unlock/{university_id}",
    tag = "Universities",
    params(("university_id" = Uuid, Path, description = "The locked university")),
    responses(
        (status = 200, description = "Returned to the shortlist", body = MessageResponse),
        (status = 404, description = "Locked university not found")
    )
)]
pub async fn unlock_handler(
    State(state): State<Arc<AppState>>,
    Extension(profile): Extension<Profile>,
    Path(university_id): Path<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    Planner::new(state.store.as_ref())
        .unlock(profile.user_id, university_id)
        .await?;
    Ok(Json(MessageResponse {
        message: "University unlocked".to_string(),
        warning: Some(UNLOCK_WARNING.to_string()),
    }))
}

#[utoipa::path(
    delete,
    path = "/api/universities/remove/{university_id}",
    tag = "Universities",
    params(("university_id" = Uuid, Path, description = "The shortlisted university")),
    responses(
        (status = 200, description = "Removed from the shortlist", body = MessageResponse),
        (status = 404, description = "Shortlisted university not found")
    )
)]
pub async fn remove_handler(
    State(state): State<Arc<AppState>>,
    Extension(profile): Extension<Profile>,
    Path(university_id): Path<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    Planner::new(state.store.as_ref())
        .remove(profile.user_id, university_id)
        .await?;
    Ok(Json(MessageResponse {
        message: "University removed from shortlist".to_string(),
        warning: None,
    }))
}

#[utoipa::path(
    get,
    path = "/api/universities/counts",
    tag = "Universities",
    responses(
        (status = 200, description = "Shortlisted and locked counts", body = CountsResponse)
    )
)]
pub async fn counts_handler(
    State(state): State<Arc<AppState>>,
    Extension(profile): Extension<Profile>,
) -> Result<Json<CountsResponse>, ApiError> {
    let counts = state.db.count_user_universities(profile.user_id).await?;
    Ok(Json(CountsResponse {
        shortlisted: counts.shortlisted,
        locked: counts.locked,
    }))
}

/// Unknown labels are treated as absent.
fn lenient_category(label: Option<&str>) -> Option<Category> {
    label.and_then(|l| l.parse::<Category>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requested_category_is_lenient() {
        assert_eq!(lenient_category(Some("Dream")), Some(Category::Dream));
        assert_eq!(lenient_category(Some("reach")), None);
        assert_eq!(lenient_category(None), None);
    }
}
